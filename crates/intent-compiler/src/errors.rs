//! Error types for intent compilation

use thiserror::Error;

use spectra_core_types::SpectraError;

#[derive(Debug, Error, Clone)]
pub enum CompileError {
    /// Instruction text is empty after trimming
    #[error("empty intent text")]
    EmptyIntent,

    /// Instruction text exceeds the input bound
    #[error("intent text too long: {actual} bytes exceeds {limit}")]
    TooLong { actual: usize, limit: usize },

    /// No actionable verb found; no plan derivable
    #[error("no actionable instruction found in: {0}")]
    Unresolved(String),
}

impl CompileError {
    pub fn to_spectra(&self) -> SpectraError {
        SpectraError::IntentUnresolved(self.to_string())
    }
}
