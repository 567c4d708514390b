//! Data models for browsing sessions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use spectra_core_types::{ActionType, SessionId};

/// Lifecycle state of a browsing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Active,
    Suspended,
    Expired,
}

/// A stored credential. The secret is ciphertext produced by the session
/// cipher before it ever reaches this struct; callers holding a
/// `BrowsingSession` never see plaintext.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub domain: String,
    pub username: String,

    /// AES-256-GCM sealed secret (version || nonce || ciphertext)
    pub sealed_secret: Vec<u8>,

    pub stored_at: DateTime<Utc>,
}

/// One recorded step of an executed workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub description: String,
    pub action_type: ActionType,
    pub parameters: std::collections::HashMap<String, String>,
    pub completed: bool,
}

/// Ordered record of one intent execution, owned by exactly one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub description: String,
    pub steps: Vec<WorkflowStep>,
    pub created_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            description: description.into(),
            steps: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_step(mut self, step: WorkflowStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn completed_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.completed).count()
    }
}

/// The durable container for a user's credentials and workflow history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowsingSession {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub state: SessionState,

    pub credentials: Vec<Credential>,
    pub workflows: Vec<Workflow>,

    /// Identifies the key material used to seal this session's secrets
    pub encryption_key_ref: String,
}

impl BrowsingSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.state == SessionState::Expired || now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn expiry_is_inclusive_of_the_deadline() {
        let now = Utc::now();
        let session = BrowsingSession {
            id: SessionId::new(),
            created_at: now,
            expires_at: now + Duration::seconds(3600),
            state: SessionState::Active,
            credentials: Vec::new(),
            workflows: Vec::new(),
            encryption_key_ref: "default".into(),
        };

        assert!(!session.is_expired_at(now + Duration::seconds(3599)));
        assert!(session.is_expired_at(now + Duration::seconds(3600)));
        assert!(session.is_expired_at(now + Duration::seconds(3601)));
    }

    #[test]
    fn workflow_tracks_completion() {
        let workflow = Workflow::new("checkout")
            .with_step(WorkflowStep {
                description: "navigate".into(),
                action_type: ActionType::Navigate,
                parameters: Default::default(),
                completed: true,
            })
            .with_step(WorkflowStep {
                description: "click buy".into(),
                action_type: ActionType::Click,
                parameters: Default::default(),
                completed: false,
            });

        assert_eq!(workflow.completed_steps(), 1);
        assert_eq!(workflow.steps.len(), 2);
    }
}
