//! Data models for compiled intents

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use spectra_core_types::{ActionStep, IntentId};

/// A named entity extracted from the instruction text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,

    /// Entity class: URL, EMAIL, PHONE, DATE, TIME, PRICE, QUANTITY
    pub label: String,

    pub confidence: f64,

    /// Byte span in the preprocessed text
    pub start: usize,
    pub end: usize,
}

/// Compilation bookkeeping kept for observability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentMetadata {
    /// Candidates that lost a deterministic ambiguity resolution,
    /// formatted as "field: rejected-value"
    pub alternatives: Vec<String>,

    /// Verb classes that matched, in text order
    pub matched_verbs: Vec<String>,
}

/// A compiled, ordered plan of action steps.
///
/// Immutable once compiled; owned by the execution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub id: IntentId,
    pub raw_text: String,
    pub goal_entities: Vec<Entity>,

    /// Primary domain the plan operates on, when one is known
    pub target_domain: Option<String>,

    pub action_plan: Vec<ActionStep>,

    /// Classification confidence of the leading verb match
    pub confidence: f64,

    pub compiled_at: DateTime<Utc>,
    pub metadata: IntentMetadata,
}
