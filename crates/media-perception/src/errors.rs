//! Error types for media perception operations

use thiserror::Error;

/// Errors surfaced by the perception engine and its stages.
///
/// Stage errors degrade the affected field to its default; only input-level
/// problems (undecodable frames) surface to callers.
#[derive(Debug, Error, Clone)]
pub enum PerceptionError {
    /// Frame bytes could not be decoded into an image
    #[error("frame decode failed: {0}")]
    DecodeFailed(String),

    /// A single analysis stage failed
    #[error("stage '{stage}' failed: {message}")]
    StageFailed { stage: &'static str, message: String },

    /// A capability (OCR, face detection) reported an internal error
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// Frames passed to a diff have mismatched dimensions
    #[error("frame dimensions do not match: {0}")]
    DimensionMismatch(String),
}

impl PerceptionError {
    pub fn stage(stage: &'static str, message: impl Into<String>) -> Self {
        Self::StageFailed {
            stage,
            message: message.into(),
        }
    }
}
