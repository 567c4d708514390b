//! Spectra library
//!
//! Exposes the Core Controller and its ambient surface for integration
//! testing.

pub mod config;
pub mod controller;
pub mod health;
pub mod metrics;

// Re-export commonly used types for external use
pub use config::SpectraConfig;
pub use controller::{ExecutionPhase, ExecutionResult, SpectraCore};
pub use health::{ComponentHealth, ComponentStatus, HealthRegistry};
