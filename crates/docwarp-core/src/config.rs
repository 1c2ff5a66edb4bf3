// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Processor configuration. Every tunable constant of the pipeline lives here so
// it can be calibrated against labelled samples without touching code.

use serde::{Deserialize, Serialize};

use crate::error::{DocError, Result};
use crate::types::DetectionMethod;

const MIN_WORKING_SIZE: u32 = 64;
const MAX_WORKING_SIZE: u32 = 2000;
const MIN_HOUGH_RESOLUTION: f64 = 0.05;
const MAX_HOUGH_RESOLUTION: f64 = 1.0;

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub preprocess: PreprocessConfig,
    pub detection: DetectionConfig,
    pub skew: SkewConfig,
    pub correction: CorrectionConfig,
    pub quality: QualityConfig,
    pub finish: FinishConfig,
    pub batch: BatchConfig,
}

impl ProcessorConfig {
    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let d = &self.detection;
        if d.strategies.is_empty() {
            return Err(DocError::Config("detection.strategies must not be empty".into()));
        }
        if !(0.0..1.0).contains(&d.min_area_ratio) || d.min_area_ratio >= d.max_area_ratio {
            return Err(DocError::Config(format!(
                "detection area band [{}, {}] is not a valid sub-range of [0, 1]",
                d.min_area_ratio, d.max_area_ratio
            )));
        }
        if d.max_area_ratio > 1.0 {
            return Err(DocError::Config("detection.max_area_ratio must be <= 1".into()));
        }
        if d.epsilon_factors.is_empty() || d.epsilon_factors.iter().any(|e| *e <= 0.0) {
            return Err(DocError::Config(
                "detection.epsilon_factors must be non-empty and positive".into(),
            ));
        }
        if d.weights.total() <= 0.0 || d.weights.has_negative() {
            return Err(DocError::Config("detection.weights must be non-negative with a positive sum".into()));
        }
        for strategy in &d.strategies {
            if strategy.low_threshold <= 0.0 || strategy.high_threshold < strategy.low_threshold {
                return Err(DocError::Config(format!(
                    "edge strategy {} has invalid Canny thresholds {}/{}",
                    strategy.method, strategy.low_threshold, strategy.high_threshold
                )));
            }
        }
        let s = &self.skew;
        if s.max_angle <= 0.0 || s.max_angle > 45.0 {
            return Err(DocError::Config("skew.max_angle must be in (0, 45]".into()));
        }
        if s.outlier_threshold <= 0.0 {
            return Err(DocError::Config("skew.outlier_threshold must be positive".into()));
        }
        if !(MIN_WORKING_SIZE..=MAX_WORKING_SIZE).contains(&s.working_size) {
            return Err(DocError::Config(format!(
                "skew.working_size must be in [{MIN_WORKING_SIZE}, {MAX_WORKING_SIZE}]"
            )));
        }
        // Accumulator size grows with max_angle / hough_resolution.
        if !(MIN_HOUGH_RESOLUTION..=MAX_HOUGH_RESOLUTION).contains(&s.hough_resolution) {
            return Err(DocError::Config(format!(
                "skew.hough_resolution must be in [{MIN_HOUGH_RESOLUTION}, {MAX_HOUGH_RESOLUTION}] degrees"
            )));
        }
        if !(1.0..=45.0).contains(&s.projection_range) {
            return Err(DocError::Config("skew.projection_range must be in [1, 45]".into()));
        }
        if self.preprocess.blur_sigma <= 0.0 {
            return Err(DocError::Config("preprocess.blur_sigma must be positive".into()));
        }
        if self.batch.workers == Some(0) {
            return Err(DocError::Config("batch.workers must be at least 1".into()));
        }
        Ok(())
    }
}

// -- Preprocessing ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Gaussian sigma; 1.1 matches a 5x5 kernel.
    pub blur_sigma: f32,
    /// Adaptive threshold window radius (window side = 2r + 1).
    pub threshold_radius: u32,
    /// Constant subtracted from the local mean.
    pub threshold_offset: i32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.1,
            threshold_radius: 5,
            threshold_offset: 2,
        }
    }
}

// -- Detection ----------------------------------------------------------------

/// Which preprocessed derivative an edge strategy runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeSource {
    Blurred,
    Threshold,
}

/// One edge-map configuration in the ordered detector list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeStrategy {
    pub method: DetectionMethod,
    pub source: EdgeSource,
    pub low_threshold: f32,
    pub high_threshold: f32,
}

/// Relative weights of the composite candidate score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub area: f64,
    pub aspect: f64,
    pub angle: f64,
}

impl ScoreWeights {
    pub fn total(&self) -> f64 {
        self.area + self.aspect + self.angle
    }

    fn has_negative(&self) -> bool {
        self.area < 0.0 || self.aspect < 0.0 || self.angle < 0.0
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            area: 0.4,
            aspect: 0.2,
            angle: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Edge maps, evaluated in order.
    pub strategies: Vec<EdgeStrategy>,
    /// Morphological closing passes applied to each edge map.
    pub close_passes: u32,
    /// Contours examined per edge map, largest first.
    pub max_contours: usize,
    pub min_area_ratio: f64,
    pub max_area_ratio: f64,
    /// Polygon simplification tolerances, as fractions of the perimeter.
    pub epsilon_factors: Vec<f64>,
    pub weights: ScoreWeights,
    /// Minimum composite score for a candidate to count as a document.
    pub acceptance_threshold: f64,
    /// Minimum contour area / convex hull area.
    pub min_solidity: f64,
    /// Short side / long side below which the shape scores zero for aspect.
    pub min_aspect: f64,
    /// Short side / long side at and above which the aspect scores fully.
    pub plausible_aspect: f64,
    /// Distance from the frame (px) under which the border penalty applies.
    pub border_margin: f64,
    /// Score multiplier for candidates hugging the frame.
    pub border_penalty: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            strategies: vec![
                EdgeStrategy {
                    method: DetectionMethod::Standard,
                    source: EdgeSource::Blurred,
                    low_threshold: 50.0,
                    high_threshold: 150.0,
                },
                EdgeStrategy {
                    method: DetectionMethod::Conservative,
                    source: EdgeSource::Blurred,
                    low_threshold: 75.0,
                    high_threshold: 225.0,
                },
                EdgeStrategy {
                    method: DetectionMethod::Threshold,
                    source: EdgeSource::Threshold,
                    low_threshold: 50.0,
                    high_threshold: 150.0,
                },
            ],
            close_passes: 2,
            max_contours: 8,
            min_area_ratio: 0.10,
            max_area_ratio: 0.90,
            epsilon_factors: vec![0.01, 0.015, 0.02, 0.025, 0.03, 0.04],
            weights: ScoreWeights::default(),
            acceptance_threshold: 0.6,
            min_solidity: 0.75,
            min_aspect: 0.25,
            plausible_aspect: 0.5,
            border_margin: 20.0,
            border_penalty: 0.9,
        }
    }
}

// -- Skew estimation ------------------------------------------------------------

/// Base weights of the skew strategies, scaled by each estimate's confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkewWeights {
    pub hough_lines: f64,
    pub text_lines: f64,
    pub projection_profile: f64,
}

impl Default for SkewWeights {
    fn default() -> Self {
        Self {
            hough_lines: 0.6,
            text_lines: 0.3,
            projection_profile: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkewConfig {
    /// Estimates with a larger magnitude (degrees) are discarded.
    pub max_angle: f64,
    /// Estimates further than this (degrees) from the median are outliers.
    pub outlier_threshold: f64,
    pub weights: SkewWeights,
    /// Long side (px) the image is reduced to before estimation.
    pub working_size: u32,
    /// Hough accumulator angular resolution (degrees).
    pub hough_resolution: f64,
    /// Half-width (degrees) of the projection-profile coarse sweep.
    pub projection_range: f64,
    /// Horizontal gap (px) bridged when smearing text into lines.
    pub text_smear: u32,
    /// Minimum pixel count of a text-line component.
    pub text_min_pixels: u32,
}

impl Default for SkewConfig {
    fn default() -> Self {
        Self {
            max_angle: 30.0,
            outlier_threshold: 10.0,
            weights: SkewWeights::default(),
            working_size: 1000,
            hough_resolution: 0.1,
            projection_range: 15.0,
            text_smear: 20,
            text_min_pixels: 50,
        }
    }
}

// -- Correction, quality, finishing ---------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Angles with a smaller magnitude (degrees) are not applied.
    pub threshold_angle: f64,
    /// Gray level of newly exposed canvas.
    pub fill: u8,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            threshold_angle: 0.01,
            fill: 255,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub min_blur_score: f64,
    pub min_brightness: f64,
    pub max_brightness: f64,
    /// Send unusable frames straight to the full-frame path.
    pub skip_detection_when_unusable: bool,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_blur_score: 50.0,
            min_brightness: 20.0,
            max_brightness: 240.0,
            skip_detection_when_unusable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinishConfig {
    /// White border (px) around a rectified document.
    pub padding_document: u32,
    /// White border (px) around a full-frame result.
    pub padding_full_frame: u32,
    /// Upscale results whose shorter side is below this; 0 disables.
    pub min_side: u32,
}

impl Default for FinishConfig {
    fn default() -> Self {
        Self {
            padding_document: 30,
            padding_full_frame: 40,
            min_side: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Worker threads; `None` uses one per available core.
    pub workers: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        ProcessorConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ProcessorConfig::from_json_str(
            r#"{ "detection": { "acceptance_threshold": 0.7 }, "finish": { "min_side": 600 } }"#,
        )
        .unwrap();
        assert_eq!(config.detection.acceptance_threshold, 0.7);
        assert_eq!(config.detection.max_contours, 8);
        assert_eq!(config.detection.strategies.len(), 3);
        assert_eq!(config.finish.min_side, 600);
        assert_eq!(config.finish.padding_document, 30);
    }

    #[test]
    fn rejects_inverted_area_band() {
        let err = ProcessorConfig::from_json_str(
            r#"{ "detection": { "min_area_ratio": 0.8, "max_area_ratio": 0.5 } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, DocError::Config(_)));
    }

    #[test]
    fn rejects_zero_workers() {
        let err = ProcessorConfig::from_json_str(r#"{ "batch": { "workers": 0 } }"#).unwrap_err();
        assert!(matches!(err, DocError::Config(_)));
    }

    #[test]
    fn rejects_oversized_skew_searches() {
        for json in [
            r#"{ "skew": { "hough_resolution": 0.01, "max_angle": 45 } }"#,
            r#"{ "skew": { "hough_resolution": 0.0 } }"#,
            r#"{ "skew": { "projection_range": 90 } }"#,
            r#"{ "skew": { "projection_range": 0 } }"#,
            r#"{ "skew": { "working_size": 20000 } }"#,
        ] {
            let err = ProcessorConfig::from_json_str(json).unwrap_err();
            assert!(matches!(err, DocError::Config(_)), "{json}: {err}");
        }
        let fine = ProcessorConfig::from_json_str(
            r#"{ "skew": { "hough_resolution": 0.05, "projection_range": 45 } }"#,
        )
        .unwrap();
        assert_eq!(fine.skew.hough_resolution, 0.05);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = ProcessorConfig::default().to_json_pretty().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        let loaded = ProcessorConfig::from_json_file(file.path()).unwrap();
        assert_eq!(loaded, ProcessorConfig::default());
    }

    #[test]
    fn malformed_json_is_a_serialization_error() {
        let err = ProcessorConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, DocError::Serialization(_)));
    }
}
