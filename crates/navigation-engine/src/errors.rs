//! Error types for navigation operations

use thiserror::Error;

use spectra_core_types::SpectraError;

/// Errors surfaced by the driver boundary and the step executor.
#[derive(Debug, Error, Clone)]
pub enum NavError {
    /// Operation exceeded its deadline
    #[error("navigation timeout: {0}")]
    Timeout(String),

    /// Selector did not resolve to an element
    #[error("element not found: {0}")]
    ElementNotFound(String),

    /// Driver rejected or failed the command
    #[error("driver failure: {0}")]
    DriverFailure(String),

    /// Driver (and fallback) failed to initialize
    #[error("driver init failure: {0}")]
    InitFailure(String),

    /// Operation was cancelled through its token
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    /// Malformed step input (bad URL, missing parameter)
    #[error("invalid step input: {0}")]
    InvalidInput(String),
}

impl NavError {
    /// Map into the cross-component taxonomy for the controller.
    pub fn to_spectra(&self) -> SpectraError {
        match self {
            NavError::Timeout(msg) => SpectraError::NavigationTimeout(msg.clone()),
            NavError::InitFailure(msg) => SpectraError::DriverInitFailure(msg.clone()),
            NavError::ElementNotFound(msg)
            | NavError::DriverFailure(msg)
            | NavError::Cancelled(msg)
            | NavError::InvalidInput(msg) => SpectraError::NavigationFailure(msg.clone()),
        }
    }
}
