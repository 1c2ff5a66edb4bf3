// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Skew estimation — three independent strategies, combined by a weighted,
// outlier-rejecting average.

pub mod combine;
pub mod hough;
pub mod levels;
pub mod projection;
pub mod text_lines;

use docwarp_core::config::{SkewConfig, SkewWeights};
use image::GrayImage;
use image::imageops::{self, FilterType};
use tracing::{debug, instrument};

pub use combine::{WeightedAngle, combine_estimates};

/// The strategy that produced an angle estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkewStrategy {
    HoughLines,
    TextLines,
    ProjectionProfile,
}

impl SkewStrategy {
    /// Configured base weight of this strategy.
    pub fn base_weight(&self, weights: &SkewWeights) -> f64 {
        match self {
            Self::HoughLines => weights.hough_lines,
            Self::TextLines => weights.text_lines,
            Self::ProjectionProfile => weights.projection_profile,
        }
    }
}

impl std::fmt::Display for SkewStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::HoughLines => "hough_lines",
            Self::TextLines => "text_lines",
            Self::ProjectionProfile => "projection_profile",
        };
        f.write_str(name)
    }
}

/// One strategy's opinion: angle in degrees and confidence in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleEstimate {
    pub strategy: SkewStrategy,
    pub angle: f64,
    pub confidence: f64,
}

/// Combined skew of an image and the estimates it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct SkewEstimate {
    /// Degrees in (-45, 45], rounded to 0.01. Zero when no strategy answered.
    pub angle: f64,
    /// Estimates that passed the magnitude filter.
    pub estimates: Vec<AngleEstimate>,
}

/// Estimate the rotational skew of `gray`.
///
/// Positive angles mean the content's lines descend to the right.
#[instrument(skip_all, fields(width = gray.width(), height = gray.height()))]
pub fn estimate_skew(gray: &GrayImage, config: &SkewConfig) -> SkewEstimate {
    let working = working_copy(gray, config.working_size);

    let estimates: Vec<AngleEstimate> = [
        hough::estimate(&working, config),
        text_lines::estimate(&working, config),
        projection::estimate(&working, config),
    ]
    .into_iter()
    .flatten()
    .filter(|e| e.angle.is_finite() && e.angle.abs() <= config.max_angle)
    .collect();

    let weighted: Vec<WeightedAngle> = estimates
        .iter()
        .map(|e| WeightedAngle {
            angle: e.angle,
            weight: e.strategy.base_weight(&config.weights) * e.confidence,
        })
        .collect();

    let angle = combine_estimates(&weighted, config.outlier_threshold)
        .map(normalize_angle)
        .unwrap_or(0.0);

    for e in &estimates {
        debug!(strategy = %e.strategy, angle = e.angle, confidence = e.confidence, "Skew estimate");
    }
    debug!(angle, estimates = estimates.len(), "Skew combined");

    SkewEstimate { angle, estimates }
}

/// Fold an angle into (-45, 45] and round it to 0.01 degrees.
pub fn normalize_angle(degrees: f64) -> f64 {
    let rounded = round_hundredths(degrees);
    let folded = rounded.rem_euclid(90.0);
    let folded = if folded > 45.0 { folded - 90.0 } else { folded };
    round_hundredths(folded)
}

fn round_hundredths(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    // Avoid reporting -0.0.
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Downscale so the long side is at most `max_side`.
fn working_copy(gray: &GrayImage, max_side: u32) -> GrayImage {
    let (w, h) = gray.dimensions();
    let long_side = w.max(h);
    if long_side <= max_side {
        return gray.clone();
    }
    let scale = max_side as f64 / long_side as f64;
    let nw = ((w as f64 * scale).round() as u32).max(1);
    let nh = ((h as f64 * scale).round() as u32).max(1);
    imageops::resize(gray, nw, nh, FilterType::Triangle)
}
