//! The session manager
//!
//! Serializes concurrent writers per session, lazy-checks expiry on every
//! access, and runs an active sweep at a fixed interval. All persistence
//! goes through the store boundary as sealed JSON blobs.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use spectra_core_types::SessionId;

use crate::crypto::SessionCipher;
use crate::errors::SessionError;
use crate::models::{BrowsingSession, Credential, SessionState, Workflow};
use crate::store::SessionStore;

pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 3600;
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    /// TTL applied to new sessions
    pub session_timeout: Duration,

    /// Interval of the background expiry sweep
    pub cleanup_interval: Duration,

    /// Passphrase the sealing key is derived from
    pub passphrase: String,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            session_timeout: Duration::from_secs(DEFAULT_SESSION_TIMEOUT_SECS),
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
            passphrase: "spectra-session-key".to_string(),
        }
    }
}

const KEY_SALT: &[u8] = b"spectra-session-store";

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    cipher: SessionCipher,
    locks: DashMap<String, Arc<Mutex<()>>>,
    config: SessionManagerConfig,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        config: SessionManagerConfig,
    ) -> Result<Self, SessionError> {
        let cipher = SessionCipher::derive(&config.passphrase, KEY_SALT)?;
        Ok(Self {
            store,
            cipher,
            locks: DashMap::new(),
            config,
        })
    }

    /// Create and persist a fresh session with the configured TTL.
    pub async fn create_session(&self) -> Result<BrowsingSession, SessionError> {
        let now = Utc::now();
        let session = BrowsingSession {
            id: SessionId::new(),
            created_at: now,
            expires_at: now
                + chrono::Duration::from_std(self.config.session_timeout)
                    .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_SESSION_TIMEOUT_SECS as i64)),
            state: SessionState::Active,
            credentials: Vec::new(),
            workflows: Vec::new(),
            encryption_key_ref: "hkdf-sha256/v1".to_string(),
        };

        self.persist(&session).await?;
        info!(session_id = %session.id, expires_at = %session.expires_at, "session created");
        Ok(session)
    }

    /// Load a session, lazily expiring it when its TTL has elapsed.
    pub async fn get_session(&self, id: &SessionId) -> Result<BrowsingSession, SessionError> {
        let mut session = self.load(id).await?;

        if session.is_expired_at(Utc::now()) {
            if session.state != SessionState::Expired {
                session.state = SessionState::Expired;
                self.persist(&session).await?;
                debug!(session_id = %id, "session lazily expired on access");
            }
            return Err(SessionError::Expired(id.to_string()));
        }

        Ok(session)
    }

    /// Seal and store a credential. The plaintext secret exists only in
    /// this call frame; what is persisted is ciphertext.
    pub async fn store_credentials(
        &self,
        id: &SessionId,
        domain: &str,
        username: &str,
        secret: &str,
    ) -> Result<(), SessionError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut session = self.checked_load(id).await?;
        let sealed_secret = self.cipher.seal(secret.as_bytes())?;
        session.credentials.push(Credential {
            domain: domain.to_string(),
            username: username.to_string(),
            sealed_secret,
            stored_at: Utc::now(),
        });

        self.persist(&session).await?;
        info!(session_id = %id, domain, "credential stored");
        Ok(())
    }

    /// Unseal a stored credential secret for use at the driver boundary.
    pub async fn open_credential(
        &self,
        id: &SessionId,
        domain: &str,
    ) -> Result<Option<String>, SessionError> {
        let session = self.get_session(id).await?;
        let Some(credential) = session.credentials.iter().find(|c| c.domain == domain) else {
            return Ok(None);
        };
        let plaintext = self.cipher.open(&credential.sealed_secret)?;
        String::from_utf8(plaintext)
            .map(Some)
            .map_err(|_| SessionError::Corrupt("credential is not valid utf-8".into()))
    }

    /// Append a workflow record. Concurrent writers to the same session
    /// serialize through the per-session lock; no lost updates.
    pub async fn append_workflow(
        &self,
        id: &SessionId,
        workflow: Workflow,
    ) -> Result<(), SessionError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut session = self.checked_load(id).await?;
        session.workflows.push(workflow);
        self.persist(&session).await?;
        Ok(())
    }

    /// Mark a session expired and persist the terminal state.
    pub async fn expire_session(&self, id: &SessionId) -> Result<(), SessionError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut session = self.load(id).await?;
        session.state = SessionState::Expired;
        self.persist(&session).await?;
        info!(session_id = %id, "session expired");
        Ok(())
    }

    /// Spawn the background sweep that actively expires overdue sessions.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let interval = manager.config.cleanup_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                manager.sweep_expired().await;
            }
        })
    }

    /// One sweep pass; public so tests can drive it without the task.
    pub async fn sweep_expired(&self) {
        let ids = match self.store.list().await {
            Ok(ids) => ids,
            Err(err) => {
                warn!(error = %err, "sweep could not list sessions");
                return;
            }
        };

        let now = Utc::now();
        let mut swept = 0usize;
        for raw_id in ids {
            let id = SessionId(raw_id);
            let Ok(mut session) = self.load(&id).await else {
                continue;
            };
            if session.state != SessionState::Expired && session.is_expired_at(now) {
                session.state = SessionState::Expired;
                if self.persist(&session).await.is_ok() {
                    swept += 1;
                }
            }
        }
        if swept > 0 {
            info!(swept, "expiry sweep complete");
        }
    }

    fn lock_for(&self, id: &SessionId) -> Arc<Mutex<()>> {
        self.locks
            .entry(id.0.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Load and enforce expiry, for mutating operations.
    async fn checked_load(&self, id: &SessionId) -> Result<BrowsingSession, SessionError> {
        let session = self.load(id).await?;
        if session.is_expired_at(Utc::now()) {
            return Err(SessionError::Expired(id.to_string()));
        }
        Ok(session)
    }

    async fn load(&self, id: &SessionId) -> Result<BrowsingSession, SessionError> {
        let blob = self
            .store
            .get(&id.0)
            .await?
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        serde_json::from_slice(&blob)
            .map_err(|e| SessionError::Corrupt(format!("session {}: {}", id, e)))
    }

    async fn persist(&self, session: &BrowsingSession) -> Result<(), SessionError> {
        let blob = serde_json::to_vec(session)
            .map_err(|e| SessionError::Corrupt(format!("serialize {}: {}", session.id, e)))?;
        self.store.put(&session.id.0, blob).await
    }
}
