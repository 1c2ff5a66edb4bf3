// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Preprocessing — grayscale, Gaussian smoothing, and local-mean adaptive
// thresholding of a decoded frame.

use docwarp_core::config::PreprocessConfig;
use docwarp_core::error::{DocError, Result};
use docwarp_core::types::RasterImage;
use image::{GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;
use tracing::{debug, instrument};

/// Analysis-ready derivatives of one frame. Each buffer is owned.
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// 8-bit luma.
    pub gray: GrayImage,
    /// `gray` after Gaussian smoothing.
    pub blurred: GrayImage,
    /// Binary (0 / 255) local-mean threshold of `gray`.
    pub threshold: GrayImage,
}

impl Preprocessed {
    pub fn width(&self) -> u32 {
        self.gray.width()
    }

    pub fn height(&self) -> u32 {
        self.gray.height()
    }
}

/// Produce the grayscale, blurred, and thresholded derivatives of `image`.
#[instrument(skip_all, fields(width = image.width(), height = image.height()))]
pub fn preprocess(image: &RasterImage, config: &PreprocessConfig) -> Result<Preprocessed> {
    let gray = image.to_gray();
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return Err(DocError::InvalidImage { width, height });
    }

    let blurred = gaussian_blur_f32(&gray, config.blur_sigma);
    let threshold = adaptive_threshold(&gray, config.threshold_radius, config.threshold_offset);
    debug!(
        sigma = config.blur_sigma,
        radius = config.threshold_radius,
        "Preprocessing complete"
    );

    Ok(Preprocessed {
        gray,
        blurred,
        threshold,
    })
}

/// Local-mean adaptive threshold.
///
/// A pixel becomes white when it is brighter than the mean of its
/// `(2 * radius + 1)^2` neighbourhood minus `offset`, black otherwise.
pub fn adaptive_threshold(gray: &GrayImage, radius: u32, offset: i32) -> GrayImage {
    let sums = SummedArea::new(gray);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let cutoff = sums.window_mean(x, y, radius) - offset as f64;
        if gray.get_pixel(x, y).0[0] as f64 > cutoff {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Summed-area table of a grayscale image, padded with a zero row and column.
struct SummedArea {
    table: Vec<u64>,
    width: u32,
    height: u32,
}

impl SummedArea {
    fn new(gray: &GrayImage) -> Self {
        let (width, height) = gray.dimensions();
        let stride = width as usize + 1;
        let mut table = vec![0u64; stride * (height as usize + 1)];
        for (x, y, pixel) in gray.enumerate_pixels() {
            let (col, row) = (x as usize + 1, y as usize + 1);
            table[row * stride + col] = pixel.0[0] as u64 + table[(row - 1) * stride + col]
                + table[row * stride + col - 1]
                - table[(row - 1) * stride + col - 1];
        }
        Self { table, width, height }
    }

    /// Sum over the half-open rectangle `[x0, x1) x [y0, y1)`.
    fn sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> u64 {
        let stride = self.width as usize + 1;
        self.table[y1 * stride + x1] + self.table[y0 * stride + x0]
            - self.table[y0 * stride + x1]
            - self.table[y1 * stride + x0]
    }

    /// Mean of the square window of `radius` around (x, y), clipped to the image.
    fn window_mean(&self, x: u32, y: u32, radius: u32) -> f64 {
        let x0 = x.saturating_sub(radius) as usize;
        let y0 = y.saturating_sub(radius) as usize;
        let x1 = (x.saturating_add(radius).saturating_add(1)).min(self.width) as usize;
        let y1 = (y.saturating_add(radius).saturating_add(1)).min(self.height) as usize;
        let area = (x1 - x0) * (y1 - y0);
        self.sum(x0, y0, x1, y1) as f64 / area as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    #[test]
    fn derivatives_share_input_dimensions() {
        let rgb = RgbImage::from_pixel(64, 48, Rgb([90, 120, 200]));
        let raster = RasterImage::from_dynamic(DynamicImage::ImageRgb8(rgb)).unwrap();
        let pre = preprocess(&raster, &PreprocessConfig::default()).unwrap();
        assert_eq!(pre.gray.dimensions(), (64, 48));
        assert_eq!(pre.blurred.dimensions(), (64, 48));
        assert_eq!(pre.threshold.dimensions(), (64, 48));
    }

    #[test]
    fn adaptive_threshold_flat_image_is_white() {
        let gray = GrayImage::from_pixel(20, 20, Luma([100u8]));
        let binary = adaptive_threshold(&gray, 5, 2);
        assert!(binary.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn adaptive_threshold_marks_dark_side_of_step() {
        let mut gray = GrayImage::from_pixel(40, 10, Luma([30u8]));
        for y in 0..10 {
            for x in 20..40 {
                gray.put_pixel(x, y, Luma([220u8]));
            }
        }
        let binary = adaptive_threshold(&gray, 5, 2);
        // Just left of the step the local mean is pulled up by the bright side.
        assert_eq!(binary.get_pixel(18, 5).0[0], 0);
        // Far from the step both sides are locally flat.
        assert_eq!(binary.get_pixel(2, 5).0[0], 255);
        assert_eq!(binary.get_pixel(37, 5).0[0], 255);
    }

    #[test]
    fn window_mean_clips_at_corner() {
        let gray = GrayImage::from_fn(4, 4, |x, y| Luma([(x + 4 * y) as u8]));
        let sums = SummedArea::new(&gray);
        // Window around (0, 0) with radius 1 covers levels 0, 1, 4, 5.
        assert!((sums.window_mean(0, 0, 1) - 2.5).abs() < 1e-9);
        assert!((sums.window_mean(1, 1, 8) - 7.5).abs() < 1e-9);
    }
}
