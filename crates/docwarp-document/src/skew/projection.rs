// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Projection-profile skew strategy: the angle whose row-wise ink projection
// is most sharply peaked.

use docwarp_core::config::SkewConfig;
use image::GrayImage;
use tracing::debug;

use super::combine::median;
use super::levels::LevelHistogram;
use super::{AngleEstimate, SkewStrategy};

const FINE_STEP: f64 = 0.1;
const FINE_STEPS: i32 = 10;
/// Ink samples kept after subsampling.
const MAX_SAMPLES: usize = 200_000;
/// Share of pixels at or below the paper level.
const PAPER_PERCENTILE: f64 = 0.9;
/// Below this the peak is indistinguishable from the typical angle.
const MIN_CONFIDENCE: f64 = 0.01;

/// Estimate skew by sweeping candidate angles over the ink projection.
///
/// A coarse 1-degree sweep over the configured range is refined with a
/// 0.1-degree sweep around its best angle. The sharpness of a profile is the
/// sum of squared bin totals, which for a fixed amount of ink ranks angles
/// exactly like the profile variance.
///
/// Ink is darkness below the paper level, so a frame without contrast has no
/// samples. A sweep whose scores do not single out an angle yields `None`.
pub fn estimate(gray: &GrayImage, config: &SkewConfig) -> Option<AngleEstimate> {
    let samples = ink_samples(gray);
    if samples.is_empty() {
        return None;
    }
    let (width, height) = gray.dimensions();
    let offset = ((width as f64).hypot(height as f64) / 2.0).ceil() + 1.0;
    let bins = (2.0 * offset) as usize + 1;
    let energy = |angle: f64| profile_energy(&samples, angle, offset, bins);

    let range = config.projection_range.round().max(1.0) as i32;
    let limit = range as f64;
    let mut coarse_scores = Vec::with_capacity((2 * range + 1) as usize);
    let mut best_coarse = (0.0, f64::NEG_INFINITY);
    for k in -range..=range {
        let angle = k as f64;
        let score = energy(angle);
        coarse_scores.push(score);
        if score > best_coarse.1 {
            best_coarse = (angle, score);
        }
    }

    let mut best = best_coarse;
    for j in -FINE_STEPS..=FINE_STEPS {
        if j == 0 {
            continue;
        }
        let angle = best_coarse.0 + j as f64 * FINE_STEP;
        if angle.abs() > limit + 1e-9 {
            continue;
        }
        let score = energy(angle);
        if score > best.1 {
            best = (angle, score);
        }
    }

    let lowest = coarse_scores.iter().copied().fold(f64::INFINITY, f64::min);
    if best.1 <= 0.0 || best_coarse.1 - lowest <= f64::EPSILON * best_coarse.1 {
        debug!("Projection profile is flat");
        return None;
    }
    let confidence = ((best.1 - median(&coarse_scores)) / best.1).clamp(0.0, 1.0);
    if confidence < MIN_CONFIDENCE {
        debug!(confidence, "Projection peak too weak");
        return None;
    }

    debug!(angle = best.0, confidence, "Projection-profile estimate");
    Some(AngleEstimate {
        strategy: SkewStrategy::ProjectionProfile,
        angle: best.0,
        confidence,
    })
}

/// Centred coordinates and ink weight (paper level - gray) of every pixel
/// darker than the paper.
fn ink_samples(gray: &GrayImage) -> Vec<(f64, f64, f64)> {
    let Some(paper) = LevelHistogram::of(gray).percentile(PAPER_PERCENTILE) else {
        return Vec::new();
    };
    let (width, height) = gray.dimensions();
    let pixels = width as usize * height as usize;
    let stride = ((pixels as f64 / MAX_SAMPLES as f64).sqrt().ceil() as u32).max(1);
    let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);

    let mut samples = Vec::new();
    for y in (0..height).step_by(stride as usize) {
        for x in (0..width).step_by(stride as usize) {
            let ink = paper.saturating_sub(gray.get_pixel(x, y).0[0]);
            if ink > 0 {
                samples.push((x as f64 - cx, y as f64 - cy, ink as f64));
            }
        }
    }
    samples
}

/// Sum of squared row totals after projecting along `angle` degrees.
fn profile_energy(samples: &[(f64, f64, f64)], angle: f64, offset: f64, bins: usize) -> f64 {
    let (sin, cos) = angle.to_radians().sin_cos();
    let mut profile = vec![0.0f64; bins];
    for (dx, dy, ink) in samples {
        let row = (-dx * sin + dy * cos + offset).round() as usize;
        if let Some(bin) = profile.get_mut(row) {
            *bin += ink;
        }
    }
    profile.iter().map(|v| v * v).sum()
}
