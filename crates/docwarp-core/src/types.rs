// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the docwarp pipeline.

use std::time::Duration;

use image::{ColorType, DynamicImage, GrayImage, ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{DocError, Result};

/// Width and height of an image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel count as f64, convenient for area ratios.
    pub fn area(&self) -> f64 {
        self.width as f64 * self.height as f64
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// -- RasterImage --------------------------------------------------------------

/// An owned, immutable 8-bit raster with one (gray) or three (RGB) channels.
///
/// Every pipeline stage that "changes" an image returns a new `RasterImage`;
/// nothing mutates a raster after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    image: DynamicImage,
}

impl RasterImage {
    /// Decode encoded bytes (JPEG, PNG, ...) into a raster.
    ///
    /// Undecodable input yields `DocError::Decode`; a decoded image without
    /// pixels yields `DocError::InvalidImage`.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(data)
            .map_err(|err| DocError::Decode(err.to_string()))?;
        Self::from_dynamic(image)
    }

    /// Wrap an already-decoded image, normalising it to 8-bit gray or RGB.
    pub fn from_dynamic(image: DynamicImage) -> Result<Self> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(DocError::InvalidImage { width, height });
        }
        let image = match image.color() {
            ColorType::L8 | ColorType::Rgb8 => image,
            ColorType::La8 | ColorType::L16 | ColorType::La16 => {
                DynamicImage::ImageLuma8(image.to_luma8())
            }
            _ => DynamicImage::ImageRgb8(image.to_rgb8()),
        };
        Ok(Self { image })
    }

    /// Wrap a grayscale buffer.
    pub fn from_gray(gray: GrayImage) -> Result<Self> {
        Self::from_dynamic(DynamicImage::ImageLuma8(gray))
    }

    /// Wrap an RGB buffer.
    pub fn from_rgb(rgb: RgbImage) -> Result<Self> {
        Self::from_dynamic(DynamicImage::ImageRgb8(rgb))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width(), self.height())
    }

    /// Number of channels: 1 for gray, 3 for RGB.
    pub fn channels(&self) -> u8 {
        self.image.color().channel_count()
    }

    /// Borrow the underlying `DynamicImage` (always `ImageLuma8` or `ImageRgb8`).
    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    /// A fresh single-channel copy of this raster.
    pub fn to_gray(&self) -> GrayImage {
        self.image.to_luma8()
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the raster as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        encode_to_format(&self.image, ImageFormat::Png)
    }

    /// Write the raster to a file. The format is inferred from the extension.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        self.image.save(path.as_ref()).map_err(|err| {
            DocError::Encode(format!(
                "failed to save image to {}: {}",
                path.as_ref().display(),
                err
            ))
        })
    }
}

/// Encode a `DynamicImage` into the specified format, returning the raw bytes.
fn encode_to_format(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image
        .write_to(&mut cursor, format)
        .map_err(|err| DocError::Encode(err.to_string()))?;
    Ok(buffer)
}

// -- Geometry -----------------------------------------------------------------

/// A 2D point in image coordinates (x right, y down).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Exactly four points. No ordering is implied until [`Quadrilateral::normalized`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quadrilateral {
    pub points: [Point; 4],
}

impl Quadrilateral {
    pub fn new(points: [Point; 4]) -> Self {
        Self { points }
    }

    /// Reorder the corners as `[top_left, top_right, bottom_right, bottom_left]`.
    ///
    /// Top-left has the smallest `x + y`, bottom-right the largest; top-right
    /// has the largest `x - y`, bottom-left the smallest. Ties resolve to the
    /// first point in the current order. For strongly rotated inputs two roles
    /// can land on the same point; callers must check [`Self::has_distinct_corners`].
    pub fn normalized(&self) -> Self {
        let sums = self.points.map(|p| p.x + p.y);
        let diffs = self.points.map(|p| p.x - p.y);

        let top_left = self.points[arg_extreme(&sums, false)];
        let bottom_right = self.points[arg_extreme(&sums, true)];
        let top_right = self.points[arg_extreme(&diffs, true)];
        let bottom_left = self.points[arg_extreme(&diffs, false)];

        Self {
            points: [top_left, top_right, bottom_right, bottom_left],
        }
    }

    /// True when no two corners coincide.
    pub fn has_distinct_corners(&self) -> bool {
        for i in 0..4 {
            for j in (i + 1)..4 {
                if self.points[i] == self.points[j] {
                    return false;
                }
            }
        }
        true
    }

    /// Polygon area via the shoelace formula (vertices in order, CW or CCW).
    pub fn area(&self) -> f64 {
        polygon_area(&self.points)
    }

    /// Edge lengths in vertex order: `[p0p1, p1p2, p2p3, p3p0]`.
    pub fn edge_lengths(&self) -> [f64; 4] {
        let p = &self.points;
        [
            p[0].distance(&p[1]),
            p[1].distance(&p[2]),
            p[2].distance(&p[3]),
            p[3].distance(&p[0]),
        ]
    }

    /// Interior angle at each vertex, in degrees.
    pub fn interior_angles(&self) -> [f64; 4] {
        let mut angles = [0.0; 4];
        for (i, angle) in angles.iter_mut().enumerate() {
            let prev = self.points[(i + 3) % 4];
            let cur = self.points[i];
            let next = self.points[(i + 1) % 4];
            let (ax, ay) = ((prev.x - cur.x) as f64, (prev.y - cur.y) as f64);
            let (bx, by) = ((next.x - cur.x) as f64, (next.y - cur.y) as f64);
            let norm = (ax.hypot(ay)) * (bx.hypot(by));
            *angle = if norm <= f64::EPSILON {
                0.0
            } else {
                ((ax * bx + ay * by) / norm).clamp(-1.0, 1.0).acos().to_degrees()
            };
        }
        angles
    }
}

/// Index of the smallest (or largest) value; the first index wins ties.
fn arg_extreme(values: &[f32; 4], largest: bool) -> usize {
    let mut best = 0;
    for i in 1..4 {
        let better = if largest {
            values[i] > values[best]
        } else {
            values[i] < values[best]
        };
        if better {
            best = i;
        }
    }
    best
}

/// Area of a simple polygon given by its vertices in order.
pub fn polygon_area(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0f64;
    for i in 0..n {
        let j = (i + 1) % n;
        twice_area += points[i].x as f64 * points[j].y as f64;
        twice_area -= points[j].x as f64 * points[i].y as f64;
    }
    twice_area.abs() / 2.0
}

// -- Detection ----------------------------------------------------------------

/// The edge map configuration that produced a quadrilateral candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Canny at standard thresholds on the blurred grayscale.
    Standard,
    /// Canny at higher thresholds (fewer edges) on the blurred grayscale.
    Conservative,
    /// Canny on the adaptively thresholded derivative.
    Threshold,
}

impl std::fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Standard => "standard",
            Self::Conservative => "conservative",
            Self::Threshold => "threshold",
        };
        f.write_str(name)
    }
}

/// The accepted document outline, as reported in a result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectedDocument {
    /// Corners ordered top-left, top-right, bottom-right, bottom-left.
    pub corners: Quadrilateral,
    pub score: f64,
    pub method: DetectionMethod,
}

// -- Results ------------------------------------------------------------------

/// Which branch of the pipeline produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingPath {
    /// A document was found, rectified, and de-skewed.
    Document,
    /// No usable outline; the full frame was de-skewed without cropping.
    FullFrame,
}

/// Sharpness and exposure metrics of the input frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Variance of the Laplacian; low values mean a blurry frame.
    pub blur_score: f64,
    /// Mean gray level, 0-255.
    pub brightness: f64,
    pub usable: bool,
}

/// The immutable outcome of processing one image.
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// Rotation in degrees that was detected (the image was rotated by its negation).
    pub angle: f64,
    pub image: RasterImage,
    pub original_size: Dimensions,
    pub final_size: Dimensions,
    pub elapsed: Duration,
    pub path: ProcessingPath,
    /// Skew estimated on the whole frame; authoritative only on the fallback path.
    pub full_frame_angle: f64,
    pub document: Option<DetectedDocument>,
    pub quality: QualityReport,
}

impl ProcessingResult {
    /// Serializable view of everything except the pixels.
    pub fn summary(&self) -> ProcessingSummary {
        ProcessingSummary {
            rotation_angle: self.angle,
            processing_time_ms: self.elapsed.as_secs_f64() * 1000.0,
            original_size: self.original_size,
            final_size: self.final_size,
            path: self.path,
            full_frame_angle: self.full_frame_angle,
            document: self.document,
            quality: self.quality,
        }
    }
}

/// Pixel-free projection of a [`ProcessingResult`], for JSON output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingSummary {
    pub rotation_angle: f64,
    pub processing_time_ms: f64,
    pub original_size: Dimensions,
    pub final_size: Dimensions,
    pub path: ProcessingPath,
    pub full_frame_angle: f64,
    pub document: Option<DetectedDocument>,
    pub quality: QualityReport,
}
