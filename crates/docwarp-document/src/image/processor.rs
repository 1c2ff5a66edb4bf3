// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — skew correction with canvas expansion, white border
// padding, and minimum-size upscaling.

use docwarp_core::config::{CorrectionConfig, FinishConfig};
use docwarp_core::error::Result;
use docwarp_core::types::{ProcessingPath, RasterImage};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Pixel, Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::{debug, instrument};

/// Chainable operations over a single raster.
///
/// Each method consumes `self` and returns a new processor wrapping the
/// transformed image.
///
/// ```ignore
/// let finished = ImageProcessor::new(crop)
///     .rotate_expanding(-2.5, 255)
///     .pad(30, 255)
///     .ensure_min_side(600)
///     .into_raster()?;
/// ```
pub struct ImageProcessor {
    image: DynamicImage,
}

impl ImageProcessor {
    pub fn new(image: RasterImage) -> Self {
        Self {
            image: image.into_dynamic(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Rotate clockwise (on screen) by `degrees` about the centre with bicubic
    /// interpolation. The canvas grows to hold the whole rotated image and is
    /// never smaller than the input; exposed corners take `fill`.
    pub fn rotate_expanding(self, degrees: f64, fill: u8) -> Self {
        let (w, h) = (self.image.width(), self.image.height());
        let radians = degrees.to_radians();
        let (sin, cos) = (radians.sin().abs(), radians.cos().abs());
        let new_w = ((w as f64 * cos + h as f64 * sin).ceil() as u32).max(w);
        let new_h = ((w as f64 * sin + h as f64 * cos).ceil() as u32).max(h);

        let projection = Projection::translate(new_w as f32 / 2.0, new_h as f32 / 2.0)
            * Projection::rotate(radians as f32)
            * Projection::translate(-(w as f32) / 2.0, -(h as f32) / 2.0);

        let image = match &self.image {
            DynamicImage::ImageLuma8(gray) => {
                DynamicImage::ImageLuma8(warp_canvas(gray, &projection, Luma([fill]), new_w, new_h))
            }
            other => {
                let rgb = other.to_rgb8();
                DynamicImage::ImageRgb8(warp_canvas(&rgb, &projection, Rgb([fill; 3]), new_w, new_h))
            }
        };
        debug!(degrees, new_w, new_h, "Rotated with canvas expansion");
        Self { image }
    }

    /// Surround the image with a `padding`-pixel border of `fill`.
    pub fn pad(self, padding: u32, fill: u8) -> Self {
        if padding == 0 {
            return self;
        }
        let (w, h) = (self.image.width(), self.image.height());
        let (new_w, new_h) = (w + 2 * padding, h + 2 * padding);
        let image = match &self.image {
            DynamicImage::ImageLuma8(gray) => {
                let mut canvas = GrayImage::from_pixel(new_w, new_h, Luma([fill]));
                imageops::overlay(&mut canvas, gray, padding as i64, padding as i64);
                DynamicImage::ImageLuma8(canvas)
            }
            other => {
                let mut canvas = RgbImage::from_pixel(new_w, new_h, Rgb([fill; 3]));
                imageops::overlay(&mut canvas, &other.to_rgb8(), padding as i64, padding as i64);
                DynamicImage::ImageRgb8(canvas)
            }
        };
        Self { image }
    }

    /// Upscale, preserving aspect ratio, until both sides are at least
    /// `min_side`. Zero disables; images already large enough are untouched.
    pub fn ensure_min_side(self, min_side: u32) -> Self {
        let (w, h) = (self.image.width(), self.image.height());
        if min_side == 0 || (w >= min_side && h >= min_side) {
            return self;
        }
        let scale = (min_side as f64 / w as f64).max(min_side as f64 / h as f64);
        let new_w = (w as f64 * scale).round() as u32;
        let new_h = (h as f64 * scale).round() as u32;
        debug!(from_w = w, from_h = h, new_w, new_h, "Upscaling to minimum side");
        Self {
            image: self.image.resize_exact(new_w, new_h, FilterType::CatmullRom),
        }
    }

    pub fn into_raster(self) -> Result<RasterImage> {
        RasterImage::from_dynamic(self.image)
    }
}

fn warp_canvas<P>(
    image: &ImageBuffer<P, Vec<u8>>,
    projection: &Projection,
    fill: P,
    width: u32,
    height: u32,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + Send + Sync + 'static,
{
    let mut out = ImageBuffer::from_pixel(width, height, fill);
    warp_into(image, projection, Interpolation::Bicubic, fill, &mut out);
    out
}

/// Rotate `image` by the negation of the detected skew `angle` (degrees).
///
/// Angles below the configured threshold return an identical copy.
#[instrument(skip(image, config), fields(width = image.width(), height = image.height()))]
pub fn correct_skew(image: &RasterImage, angle: f64, config: &CorrectionConfig) -> Result<RasterImage> {
    if angle.abs() < config.threshold_angle {
        debug!("Skew below correction threshold; copying");
        return Ok(image.clone());
    }
    ImageProcessor::new(image.clone())
        .rotate_expanding(-angle, config.fill)
        .into_raster()
}

/// Add the path-specific white border and apply the minimum size.
pub fn finish(image: RasterImage, path: ProcessingPath, config: &FinishConfig) -> Result<RasterImage> {
    let padding = match path {
        ProcessingPath::Document => config.padding_document,
        ProcessingPath::FullFrame => config.padding_full_frame,
    };
    ImageProcessor::new(image)
        .pad(padding, 255)
        .ensure_min_side(config.min_side)
        .into_raster()
}
