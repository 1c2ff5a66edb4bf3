// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docwarp-document — Document detection and de-skewing pipeline.
//
// Provides the scanning stages (preprocessing, quality assessment, boundary
// detection, perspective rectification), multi-strategy skew estimation, skew
// correction and finishing, the per-image orchestrator, and a parallel batch
// runner.

pub mod batch;
pub mod image;
pub mod pipeline;
pub mod scan;
pub mod skew;

#[cfg(test)]
pub(crate) mod fixtures;

// Re-export the primary entry points so callers can use `docwarp_document::DocumentProcessor` etc.
pub use batch::{BatchItem, BatchReport, ItemOutcome, process_batch};
pub use crate::image::processor::{ImageProcessor, correct_skew};
pub use pipeline::{DocumentProcessor, Stage};
pub use scan::boundary::{Candidate, Detection, detect_boundary};
pub use scan::rectify::rectify;
pub use skew::{AngleEstimate, SkewEstimate, SkewStrategy, estimate_skew};
