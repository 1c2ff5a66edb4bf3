// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for docwarp.

use thiserror::Error;

/// Top-level error type for all docwarp operations.
#[derive(Debug, Error)]
pub enum DocError {
    // -- Per-item pipeline errors --
    #[error("image could not be decoded: {0}")]
    Decode(String),

    #[error("image has zero area ({width}x{height})")]
    InvalidImage { width: u32, height: u32 },

    #[error("quadrilateral cannot be rectified: {0}")]
    DegenerateQuadrilateral(String),

    #[error("internal processing fault: {0}")]
    Internal(String),

    // -- Output --
    #[error("image encoding failed: {0}")]
    Encode(String),

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DocError {
    /// Short machine-friendly label, reported in JSON failure records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::InvalidImage { .. } => "invalid_image",
            Self::DegenerateQuadrilateral(_) => "degenerate_quadrilateral",
            Self::Internal(_) => "internal",
            Self::Encode(_) => "encode",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable_labels() {
        assert_eq!(DocError::Decode("bad header".into()).kind(), "decode");
        assert_eq!(
            DocError::DegenerateQuadrilateral("collinear".into()).kind(),
            "degenerate_quadrilateral"
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(DocError::from(io).kind(), "io");
    }

    #[test]
    fn display_includes_dimensions() {
        let err = DocError::InvalidImage { width: 0, height: 12 };
        assert_eq!(err.to_string(), "image has zero area (0x12)");
        assert_eq!(err.kind(), "invalid_image");
    }
}
