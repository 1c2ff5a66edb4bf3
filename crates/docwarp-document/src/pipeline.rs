// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Orchestrator — runs one image through detection, rectification, and skew
// correction, falling back to full-frame de-skewing when no document outline
// can be used.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use docwarp_core::config::ProcessorConfig;
use docwarp_core::error::{DocError, Result};
use docwarp_core::types::{
    DetectedDocument, ProcessingPath, ProcessingResult, QualityReport, RasterImage,
};
use tracing::{debug, info, instrument, warn};

use crate::image::processor::{correct_skew, finish};
use crate::scan::boundary::{Detection, detect_boundary};
use crate::scan::preprocess::preprocess;
use crate::scan::quality::assess_quality;
use crate::scan::rectify::rectify;
use crate::skew::estimate_skew;

/// States of a single processing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Preprocessed,
    DetectionAttempted,
    Rectified,
    SkewEstimated,
    Corrected,
    SkewEstimatedFullFrame,
    CorrectedFullFrame,
    Done,
    Failed,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Preprocessed => "preprocessed",
            Self::DetectionAttempted => "detection_attempted",
            Self::Rectified => "rectified",
            Self::SkewEstimated => "skew_estimated",
            Self::Corrected => "corrected",
            Self::SkewEstimatedFullFrame => "skew_estimated_full_frame",
            Self::CorrectedFullFrame => "corrected_full_frame",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks the current stage and logs every transition.
struct StageTracker {
    current: Stage,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            current: Stage::Init,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug!(from = %self.current, to = %next, "Stage transition");
        self.current = next;
    }
}

/// Stateless document processor. One instance can serve many threads.
#[derive(Debug, Clone, Default)]
pub struct DocumentProcessor {
    config: ProcessorConfig,
}

impl DocumentProcessor {
    /// Build a processor after validating `config`.
    pub fn new(config: ProcessorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Decode and process encoded image bytes.
    ///
    /// Undecodable bytes yield `DocError::Decode`. A panic anywhere in the
    /// pipeline is caught and reported as `DocError::Internal`.
    #[instrument(skip(self, data), fields(data_len = data.len()))]
    pub fn process(&self, data: &[u8]) -> Result<ProcessingResult> {
        let start = Instant::now();
        guard(|| {
            let image = RasterImage::decode(data)?;
            self.run(image, start)
        })
    }

    /// Process an already-decoded image.
    #[instrument(
        skip_all,
        fields(width = image.width(), height = image.height(), channels = image.channels())
    )]
    pub fn process_image(&self, image: RasterImage) -> Result<ProcessingResult> {
        let start = Instant::now();
        guard(|| self.run(image, start))
    }

    fn run(&self, image: RasterImage, start: Instant) -> Result<ProcessingResult> {
        let config = &self.config;
        let mut stage = StageTracker::new();

        let pre = match preprocess(&image, &config.preprocess) {
            Ok(pre) => pre,
            Err(err) => {
                stage.advance(Stage::Failed);
                return Err(err);
            }
        };
        stage.advance(Stage::Preprocessed);

        let quality = assess_quality(&pre.gray, &config.quality);
        let full_frame = estimate_skew(&pre.gray, &config.skew);

        let detection = if quality.usable || !config.quality.skip_detection_when_unusable {
            detect_boundary(&pre, &config.detection)
        } else {
            debug!("Frame quality unusable; skipping boundary detection");
            Detection::NotFound
        };
        stage.advance(Stage::DetectionAttempted);

        let frame = FrameAnalysis {
            quality,
            full_frame_angle: full_frame.angle,
        };
        self.complete(image, detection, frame, &mut stage, start)
    }

    /// Everything after detection: rectify and de-skew the document, or fall
    /// back to the full frame when there is none or it cannot be rectified.
    fn complete(
        &self,
        image: RasterImage,
        detection: Detection,
        frame: FrameAnalysis,
        stage: &mut StageTracker,
        start: Instant,
    ) -> Result<ProcessingResult> {
        let config = &self.config;
        let original_size = image.dimensions();

        let rectified = match detection {
            Detection::Found(candidate) => match rectify(&image, &candidate.quad) {
                Ok(crop) => Some((candidate, crop)),
                Err(err) => {
                    warn!(error = %err, "Rectification failed; using full frame");
                    None
                }
            },
            Detection::NotFound => None,
        };

        let (angle, corrected, path, document) = match rectified {
            Some((candidate, crop)) => {
                stage.advance(Stage::Rectified);
                let angle = estimate_skew(&crop.to_gray(), &config.skew).angle;
                stage.advance(Stage::SkewEstimated);
                let corrected = correct_skew(&crop, angle, &config.correction)?;
                stage.advance(Stage::Corrected);
                let document = DetectedDocument {
                    corners: candidate.quad.normalized(),
                    score: candidate.score,
                    method: candidate.method,
                };
                (angle, corrected, ProcessingPath::Document, Some(document))
            }
            None => {
                let angle = frame.full_frame_angle;
                stage.advance(Stage::SkewEstimatedFullFrame);
                let corrected = correct_skew(&image, angle, &config.correction)?;
                stage.advance(Stage::CorrectedFullFrame);
                (angle, corrected, ProcessingPath::FullFrame, None)
            }
        };

        let finished = finish(corrected, path, &config.finish)?;
        let final_size = finished.dimensions();
        stage.advance(Stage::Done);

        let elapsed = start.elapsed();
        info!(
            angle,
            path = ?path,
            original = %original_size,
            final_size = %final_size,
            elapsed_ms = elapsed.as_millis() as u64,
            "Image processed"
        );

        Ok(ProcessingResult {
            angle,
            image: finished,
            original_size,
            final_size,
            elapsed,
            path,
            full_frame_angle: frame.full_frame_angle,
            document,
            quality: frame.quality,
        })
    }
}

/// Whole-frame measurements taken before detection.
struct FrameAnalysis {
    quality: QualityReport,
    full_frame_angle: f64,
}

/// Run `f`, converting a panic into `DocError::Internal`.
fn guard<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        warn!(%message, "Pipeline panicked");
        Err(DocError::Internal(message))
    })
}
