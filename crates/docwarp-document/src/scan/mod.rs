// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanning stages — preprocessing, quality assessment, document boundary
// detection, and perspective rectification.

pub mod boundary;
pub mod preprocess;
pub mod quality;
pub mod rectify;

pub use boundary::{Candidate, Detection, ScoreBreakdown, detect_boundary, score_quadrilateral};
pub use preprocess::{Preprocessed, preprocess};
pub use quality::assess_quality;
pub use rectify::rectify;
