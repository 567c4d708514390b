//! Error types for session management

use thiserror::Error;

use spectra_core_types::SpectraError;

#[derive(Debug, Error, Clone)]
pub enum SessionError {
    /// Session TTL elapsed; surfaced verbatim, never silently retried
    #[error("session expired: {0}")]
    Expired(String),

    /// No session with the given id
    #[error("session not found: {0}")]
    NotFound(String),

    /// The backing store failed
    #[error("storage unavailable: {0}")]
    Storage(String),

    /// Encryption or decryption failed
    #[error("crypto failure: {0}")]
    Crypto(String),

    /// Stored blob could not be decoded
    #[error("corrupt session record: {0}")]
    Corrupt(String),
}

impl SessionError {
    pub fn to_spectra(&self) -> SpectraError {
        match self {
            SessionError::Expired(id) => SpectraError::SessionExpired(id.clone()),
            SessionError::NotFound(msg)
            | SessionError::Storage(msg)
            | SessionError::Crypto(msg)
            | SessionError::Corrupt(msg) => SpectraError::StorageUnavailable(msg.clone()),
        }
    }
}
