// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Frame quality assessment: sharpness (variance of the Laplacian) and exposure.

use docwarp_core::config::QualityConfig;
use docwarp_core::types::QualityReport;
use image::GrayImage;
use tracing::debug;

/// Score sharpness and brightness of a grayscale frame.
pub fn assess_quality(gray: &GrayImage, config: &QualityConfig) -> QualityReport {
    let blur_score = laplacian_variance(gray);
    let brightness = mean_brightness(gray);
    let usable = blur_score >= config.min_blur_score
        && brightness >= config.min_brightness
        && brightness <= config.max_brightness;

    debug!(blur_score, brightness, usable, "Frame quality assessed");

    QualityReport {
        blur_score,
        brightness,
        usable,
    }
}

/// Variance of the 4-neighbour Laplacian over the interior pixels.
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 {
        return 0.0;
    }

    let px = |x: u32, y: u32| gray.get_pixel(x, y).0[0] as f64;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut count = 0.0;

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let lap = px(x - 1, y) + px(x + 1, y) + px(x, y - 1) + px(x, y + 1) - 4.0 * px(x, y);
            sum += lap;
            sum_sq += lap * lap;
            count += 1.0;
        }
    }

    let mean = sum / count;
    (sum_sq / count - mean * mean).max(0.0)
}

fn mean_brightness(gray: &GrayImage) -> f64 {
    let total: u64 = gray.pixels().map(|p| p.0[0] as u64).sum();
    let count = gray.width() as u64 * gray.height() as u64;
    if count == 0 {
        return 0.0;
    }
    total as f64 / count as f64
}
