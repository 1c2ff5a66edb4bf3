// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text-line skew strategy: smear dark ink horizontally into line blobs and
// read each blob's orientation from its second-order moments.

use docwarp_core::config::SkewConfig;
use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use tracing::debug;

use super::combine::weighted_median;
use super::levels::LevelHistogram;
use super::{AngleEstimate, SkewStrategy};

/// Blobs tilted more than this are not text lines.
const MAX_LINE_ANGLE: f64 = 25.0;
/// Major/minor axis variance ratio a blob needs to count as a line.
const MIN_ELONGATION: f64 = 9.0;
/// Blobs covering more than this share of the image are background.
const MAX_AREA_SHARE: f64 = 0.25;
/// Lines within this many degrees of the estimate count as agreeing.
const AGREEMENT_WINDOW: f64 = 2.0;
/// This many agreeing lines give full confidence.
const FULL_CONFIDENCE_LINES: f64 = 5.0;

#[derive(Debug, Default, Clone, Copy)]
struct Moments {
    n: f64,
    sx: f64,
    sy: f64,
    sxx: f64,
    syy: f64,
    sxy: f64,
}

impl Moments {
    fn add(&mut self, x: f64, y: f64) {
        self.n += 1.0;
        self.sx += x;
        self.sy += y;
        self.sxx += x * x;
        self.syy += y * y;
        self.sxy += x * y;
    }

    /// Orientation of the major axis in degrees and the axis variance ratio.
    fn orientation(&self) -> (f64, f64) {
        let (mx, my) = (self.sx / self.n, self.sy / self.n);
        let mu20 = self.sxx / self.n - mx * mx;
        let mu02 = self.syy / self.n - my * my;
        let mu11 = self.sxy / self.n - mx * my;

        let angle = 0.5 * (2.0 * mu11).atan2(mu20 - mu02);
        let half_sum = (mu20 + mu02) / 2.0;
        let spread = (((mu20 - mu02) / 2.0).powi(2) + mu11 * mu11).sqrt();
        let (major, minor) = (half_sum + spread, half_sum - spread);
        let elongation = if minor <= f64::EPSILON {
            f64::INFINITY
        } else {
            major / minor
        };
        (angle.to_degrees(), elongation)
    }
}

/// Estimate skew from the orientation of smeared text lines.
pub fn estimate(gray: &GrayImage, config: &SkewConfig) -> Option<AngleEstimate> {
    let ink = smear_rows(&binarize_ink(gray)?, config.text_smear);
    let labels = connected_components(&ink, Connectivity::Eight, Luma([0u8]));

    let max_label = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0) as usize;
    if max_label == 0 {
        return None;
    }
    let mut moments = vec![Moments::default(); max_label + 1];
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label.0[0] as usize;
        if label != 0 {
            moments[label].add(x as f64, y as f64);
        }
    }

    let max_pixels = gray.width() as f64 * gray.height() as f64 * MAX_AREA_SHARE;
    let lines: Vec<(f64, f64)> = moments
        .iter()
        .skip(1)
        .filter(|m| m.n >= config.text_min_pixels as f64 && m.n <= max_pixels)
        .filter_map(|m| {
            let (angle, elongation) = m.orientation();
            (elongation >= MIN_ELONGATION && angle.abs() <= MAX_LINE_ANGLE).then_some((angle, m.n))
        })
        .collect();

    let angle = weighted_median(&lines)?;
    let agreeing = lines
        .iter()
        .filter(|(a, _)| (a - angle).abs() <= AGREEMENT_WINDOW)
        .count() as f64;
    let confidence =
        (agreeing / lines.len() as f64) * (agreeing / FULL_CONFIDENCE_LINES).min(1.0);

    debug!(angle, confidence, lines = lines.len(), "Text-line estimate");
    Some(AngleEstimate {
        strategy: SkewStrategy::TextLines,
        angle,
        confidence,
    })
}

/// White (255) where the pixel is at or below the Otsu level, i.e. ink.
/// `None` for a single-level image, which holds no ink.
fn binarize_ink(gray: &GrayImage) -> Option<GrayImage> {
    let threshold = LevelHistogram::of(gray).otsu_level()?;
    Some(GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y).0[0] <= threshold {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    }))
}

/// Fill horizontal background gaps no longer than `max_gap` between ink pixels.
fn smear_rows(ink: &GrayImage, max_gap: u32) -> GrayImage {
    let mut out = ink.clone();
    for y in 0..ink.height() {
        let mut last_ink: Option<u32> = None;
        for x in 0..ink.width() {
            if ink.get_pixel(x, y).0[0] == 0 {
                continue;
            }
            if let Some(prev) = last_ink {
                let gap = x - prev - 1;
                if gap > 0 && gap <= max_gap {
                    for fill in (prev + 1)..x {
                        out.put_pixel(fill, y, Luma([255u8]));
                    }
                }
            }
            last_ink = Some(x);
        }
    }
    out
}
