//! Shared primitives for the Spectra intent execution pipeline.
//!
//! Every component crate depends on this one and nothing else in the
//! workspace, so the types here stay small: newtype identifiers, the closed
//! action vocabulary, and the cross-component error taxonomy.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Identifier of a browsing session (durable across intents).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one compiled intent.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct IntentId(pub String);

impl IntentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one step inside an intent's action plan.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct StepId(pub String);

impl StepId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one execution attempt of a step.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct AttemptId(pub String);

impl AttemptId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// The closed set of browser actions a plan may contain.
///
/// Adding a variant is a compile-time-checked change: every consumption site
/// matches exhaustively.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Navigate,
    Click,
    Type,
    Scroll,
    Extract,
    Wait,
}

impl ActionType {
    /// Whether re-executing this action after a partial failure cannot
    /// produce an unintended duplicate side effect. `click` and `type` can
    /// double-submit, so they are excluded.
    pub fn is_retry_safe(&self) -> bool {
        match self {
            ActionType::Navigate | ActionType::Extract | ActionType::Scroll | ActionType::Wait => {
                true
            }
            ActionType::Click | ActionType::Type => false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActionType::Navigate => "navigate",
            ActionType::Click => "click",
            ActionType::Type => "type",
            ActionType::Scroll => "scroll",
            ActionType::Extract => "extract",
            ActionType::Wait => "wait",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One atomic browser operation inside an intent's action plan.
///
/// Never mutated after compilation; execution status lives in the
/// `ExecutionAttempt` records that reference it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionStep {
    pub id: StepId,
    pub action_type: ActionType,

    /// CSS selector or scroll target, when the action addresses one
    pub selector: Option<String>,

    /// Typed parameters: url for navigate, text for type, seconds for wait
    pub parameters: std::collections::HashMap<String, String>,

    /// Optional post-condition the validator checks against observed state
    pub expected_outcome: Option<String>,
}

impl ActionStep {
    pub fn new(action_type: ActionType) -> Self {
        Self {
            id: StepId::new(),
            action_type,
            selector: None,
            parameters: std::collections::HashMap::new(),
            expected_outcome: None,
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_expected_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.expected_outcome = Some(outcome.into());
        self
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }
}

/// Terminal outcome of one execution attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    Success,
    Failure,
    Timeout,
}

/// Record of one attempt at executing a step. A step may accumulate
/// several of these under retry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionAttempt {
    pub id: AttemptId,
    pub step_id: StepId,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
    pub outcome: AttemptOutcome,

    /// Aggregate validator confidence for this attempt (0.0 when the
    /// attempt failed before validation)
    pub validator_confidence: f64,

    pub error: Option<String>,
}

/// Cross-component error taxonomy.
///
/// Component crates carry their own richer error enums; this is the shape
/// the Core Controller reasons about when deciding whether to retry, fall
/// back, or abort.
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
pub enum SpectraError {
    /// No actionable plan could be derived from the intent text.
    #[error("intent unresolved: {0}")]
    IntentUnresolved(String),

    /// Multiple equally-scored targets; resolved deterministically by the
    /// compiler, surfaced only through metadata.
    #[error("ambiguous target: {0}")]
    AmbiguousTarget(String),

    /// A navigation operation exceeded its deadline.
    #[error("navigation timeout: {0}")]
    NavigationTimeout(String),

    /// Driver-level failure executing a navigation operation.
    #[error("navigation failure: {0}")]
    NavigationFailure(String),

    /// The validator's signals did not concur on success.
    #[error("validation disagreement: {0}")]
    ValidationDisagreement(String),

    /// The browsing session's TTL elapsed.
    #[error("session expired: {0}")]
    SessionExpired(String),

    /// The durable store behind the session manager is unreachable.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The browser driver failed to initialize, including the fallback.
    #[error("driver init failure: {0}")]
    DriverInitFailure(String),
}

impl SpectraError {
    /// Fatal errors abort the run immediately and are surfaced verbatim,
    /// never silently retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SpectraError::SessionExpired(_) | SpectraError::StorageUnavailable(_)
        )
    }

    /// Whether the controller's retry state machine may recover this error
    /// locally (subject to the step's retry-safety).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SpectraError::NavigationTimeout(_)
                | SpectraError::NavigationFailure(_)
                | SpectraError::ValidationDisagreement(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_safety_boundary() {
        assert!(ActionType::Navigate.is_retry_safe());
        assert!(ActionType::Extract.is_retry_safe());
        assert!(ActionType::Scroll.is_retry_safe());
        assert!(ActionType::Wait.is_retry_safe());
        assert!(!ActionType::Click.is_retry_safe());
        assert!(!ActionType::Type.is_retry_safe());
    }

    #[test]
    fn action_type_serde_round_trip() {
        let json = serde_json::to_string(&ActionType::Navigate).unwrap();
        assert_eq!(json, "\"navigate\"");
        let back: ActionType = serde_json::from_str("\"extract\"").unwrap();
        assert_eq!(back, ActionType::Extract);
    }

    #[test]
    fn fatal_errors_are_not_retryable() {
        let expired = SpectraError::SessionExpired("s-1".into());
        assert!(expired.is_fatal());
        assert!(!expired.is_retryable());

        let timeout = SpectraError::NavigationTimeout("nav".into());
        assert!(!timeout.is_fatal());
        assert!(timeout.is_retryable());
    }
}
