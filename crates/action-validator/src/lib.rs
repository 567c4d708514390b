//! Action Validator - multi-signal success validation
//!
//! Combines three independent signals per executed step:
//! - DOM/state diff against the step's expected outcome
//! - Visual diff of before/after screenshots (structural similarity)
//! - Network-activity heuristics
//!
//! Success requires at least two signals to agree above their individual
//! thresholds. Failure is reported, never retried here; retry policy
//! belongs to the Core Controller.

pub mod signals;
pub mod validator;

pub use signals::{agreement, SignalKind, SignalScore, Verdict};
pub use validator::{ActionValidator, ValidationReport, ValidatorConfig};
