// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Hough-line skew strategy: a fine angular accumulator over near-horizontal
// and near-vertical line families.

use docwarp_core::config::SkewConfig;
use image::GrayImage;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use tracing::debug;

use super::combine::weighted_median;
use super::{AngleEstimate, SkewStrategy};

/// Minimum votes for a line, and as a fraction of the shorter image side.
const MIN_LINE_SUPPORT: u32 = 30;
const MIN_LINE_LENGTH_RATIO: f64 = 0.3;
/// Peaks within this many degrees of the median are refined into the estimate.
const REFINE_WINDOW: f64 = 0.5;
/// Peaks within this many degrees of the estimate count as agreeing.
const AGREEMENT_WINDOW: f64 = 1.0;

/// Estimate skew from the dominant straight edges in `gray`.
pub fn estimate(gray: &GrayImage, config: &SkewConfig) -> Option<AngleEstimate> {
    let edges = canny(&gaussian_blur_f32(gray, 1.0), 50.0, 150.0);
    let peaks = line_peaks(&edges, config.max_angle, config.hough_resolution.max(0.01));
    if peaks.is_empty() {
        debug!("Hough: no line reached the vote threshold");
        return None;
    }

    let center = weighted_median(&peaks)?;
    let (sum, weight) = peaks
        .iter()
        .filter(|(angle, _)| (angle - center).abs() <= REFINE_WINDOW)
        .fold((0.0, 0.0), |(s, w), (angle, votes)| (s + angle * votes, w + votes));
    let angle = if weight > 0.0 { sum / weight } else { center };

    let total: f64 = peaks.iter().map(|(_, votes)| votes).sum();
    let agreeing: f64 = peaks
        .iter()
        .filter(|(a, _)| (a - angle).abs() <= AGREEMENT_WINDOW)
        .map(|(_, votes)| votes)
        .sum();
    let confidence = (agreeing / total).clamp(0.0, 1.0);

    debug!(angle, confidence, peaks = peaks.len(), "Hough estimate");
    Some(AngleEstimate {
        strategy: SkewStrategy::HoughLines,
        angle,
        confidence,
    })
}

/// Local maxima of the accumulator as `(skew angle, votes)` pairs.
///
/// Both families share the skew axis: a horizontal line skewed by `a` has
/// its normal at `90 + a` degrees, a vertical one at `a`.
fn line_peaks(edges: &GrayImage, max_angle: f64, resolution: f64) -> Vec<(f64, f64)> {
    let (width, height) = edges.dimensions();
    let diagonal = ((width as f64).powi(2) + (height as f64).powi(2)).sqrt().ceil() as i64;
    let rho_bins = (2 * diagonal + 1) as usize;
    let steps = (2.0 * max_angle / resolution).round() as usize + 1;
    let offsets: Vec<f64> = (0..steps).map(|i| -max_angle + i as f64 * resolution).collect();

    // Row k of the accumulator: family k / steps, offset k % steps.
    let trig: Vec<(f64, f64)> = [90.0, 0.0]
        .iter()
        .flat_map(|base| {
            offsets.iter().map(move |offset| {
                let (sin, cos) = (base + offset).to_radians().sin_cos();
                (cos, sin)
            })
        })
        .collect();

    let mut accumulator = vec![0u32; trig.len() * rho_bins];
    for (x, y, pixel) in edges.enumerate_pixels() {
        if pixel.0[0] == 0 {
            continue;
        }
        let (fx, fy) = (x as f64, y as f64);
        for (row, (cos, sin)) in trig.iter().enumerate() {
            let rho = (fx * cos + fy * sin).round() as i64 + diagonal;
            accumulator[row * rho_bins + rho as usize] += 1;
        }
    }

    let min_votes =
        MIN_LINE_SUPPORT.max((width.min(height) as f64 * MIN_LINE_LENGTH_RATIO) as u32);
    let mut peaks = Vec::new();
    for row in 0..trig.len() {
        let step = row % steps;
        for rho in 0..rho_bins {
            let votes = accumulator[row * rho_bins + rho];
            if votes < min_votes || !is_local_max(&accumulator, row, rho, steps, rho_bins) {
                continue;
            }
            peaks.push((offsets[step], votes as f64));
        }
    }
    peaks
}

/// True when no 8-neighbour within the same family has more votes.
fn is_local_max(acc: &[u32], row: usize, rho: usize, steps: usize, rho_bins: usize) -> bool {
    let value = acc[row * rho_bins + rho];
    let family_start = row - row % steps;
    for dr in [-1i64, 0, 1] {
        let r = row as i64 + dr;
        if r < family_start as i64 || r >= (family_start + steps) as i64 {
            continue;
        }
        for dp in [-1i64, 0, 1] {
            let p = rho as i64 + dp;
            if (dr == 0 && dp == 0) || p < 0 || p >= rho_bins as i64 {
                continue;
            }
            if acc[r as usize * rho_bins + p as usize] > value {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn recovers_text_page_angle() {
        let page = fixtures::text_page(400, 300, 4.0).to_gray();
        let estimate = estimate(&page, &SkewConfig::default()).unwrap();
        assert!((estimate.angle - 4.0).abs() < 0.5, "angle {}", estimate.angle);
        assert!(estimate.confidence > 0.3);
    }

    #[test]
    fn recovers_negative_angle() {
        let page = fixtures::text_page(400, 300, -6.0).to_gray();
        let estimate = estimate(&page, &SkewConfig::default()).unwrap();
        assert!((estimate.angle + 6.0).abs() < 0.5, "angle {}", estimate.angle);
    }

    #[test]
    fn blank_image_has_no_lines() {
        let blank = GrayImage::from_pixel(100, 80, image::Luma([200u8]));
        assert!(estimate(&blank, &SkewConfig::default()).is_none());
    }
}
