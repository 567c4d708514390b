//! Step executor
//!
//! Executes one `ActionStep` against the driver with a deadline and a
//! cancellation token, then captures the observed page state. The executor
//! is the sole writer of the dispatch transition:
//! `Idle -> Dispatched -> {Completed, Failed, TimedOut}`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use spectra_core_types::{ActionStep, ActionType};

use crate::driver::BrowserDriver;
use crate::errors::NavError;

/// Dispatch state of one step execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Dispatched,
    Completed,
    Failed,
    TimedOut,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchState::Idle => "idle",
            DispatchState::Dispatched => "dispatched",
            DispatchState::Completed => "completed",
            DispatchState::Failed => "failed",
            DispatchState::TimedOut => "timed_out",
        };
        f.write_str(name)
    }
}

/// Page state captured through the driver boundary after an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservedState {
    pub url: String,
    pub title: String,

    /// SHA-256 over the serialized DOM, for cheap change detection
    pub dom_digest: String,

    /// Raw screenshot bytes, when the driver produced one
    pub screenshot: Option<Vec<u8>>,

    /// Data produced by an extract step
    pub extracted: Option<String>,

    /// Resource requests the page has issued so far, oldest first
    pub network_requests: Vec<String>,

    pub observed_at: DateTime<Utc>,
}

/// Executes steps sequentially against one driver handle.
pub struct StepExecutor {
    driver: Arc<dyn BrowserDriver>,
}

impl StepExecutor {
    pub fn new(driver: Arc<dyn BrowserDriver>) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> Arc<dyn BrowserDriver> {
        Arc::clone(&self.driver)
    }

    /// Execute one step within `deadline`, honoring `cancel`.
    ///
    /// On deadline or cancellation the pending browser command gets a
    /// best-effort `window.stop()` so the driver is not left mid-load.
    pub async fn execute(
        &self,
        step: &ActionStep,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<ObservedState, NavError> {
        let mut state = DispatchState::Idle;
        self.transition(step, &mut state, DispatchState::Dispatched);

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.cancel_pending().await;
                self.transition(step, &mut state, DispatchState::Failed);
                return Err(NavError::Cancelled(format!(
                    "step {} cancelled before completion",
                    step.id
                )));
            }
            result = timeout(deadline, self.dispatch(step)) => result,
        };

        match outcome {
            Ok(Ok(extracted)) => {
                let mut observed = self.observe().await?;
                observed.extracted = extracted;
                self.transition(step, &mut state, DispatchState::Completed);
                Ok(observed)
            }
            Ok(Err(err)) => {
                self.transition(step, &mut state, DispatchState::Failed);
                Err(err)
            }
            Err(_) => {
                self.cancel_pending().await;
                self.transition(step, &mut state, DispatchState::TimedOut);
                Err(NavError::Timeout(format!(
                    "step {} ({}) exceeded {:?}",
                    step.id, step.action_type, deadline
                )))
            }
        }
    }

    /// Capture the current page state without executing anything.
    pub async fn observe(&self) -> Result<ObservedState, NavError> {
        let url = self
            .driver
            .evaluate("window.location.href")
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string();
        let title = self
            .driver
            .evaluate("document.title")
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string();

        let dom = self
            .driver
            .evaluate("document.documentElement.outerHTML")
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string();
        let dom_digest = format!("{:x}", Sha256::digest(dom.as_bytes()));

        let network_requests = self
            .driver
            .evaluate("performance.getEntriesByType('resource').map(e => e.name)")
            .await?
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let screenshot = match self.driver.screenshot().await {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                warn!(error = %err, "screenshot capture failed; observing without frame");
                None
            }
        };

        Ok(ObservedState {
            url,
            title,
            dom_digest,
            screenshot,
            extracted: None,
            network_requests,
            observed_at: Utc::now(),
        })
    }

    async fn dispatch(&self, step: &ActionStep) -> Result<Option<String>, NavError> {
        match step.action_type {
            ActionType::Navigate => {
                let url = step
                    .parameter("url")
                    .ok_or_else(|| NavError::InvalidInput("navigate requires a url".into()))?;
                validate_url(url)?;
                self.driver.navigate(url).await?;
                Ok(None)
            }
            ActionType::Click => {
                let selector = step
                    .selector
                    .as_deref()
                    .ok_or_else(|| NavError::InvalidInput("click requires a selector".into()))?;
                let element = self.driver.find(selector).await?;
                self.driver.click(&element).await?;
                Ok(None)
            }
            ActionType::Type => {
                let selector = step
                    .selector
                    .as_deref()
                    .ok_or_else(|| NavError::InvalidInput("type requires a selector".into()))?;
                let text = step
                    .parameter("text")
                    .ok_or_else(|| NavError::InvalidInput("type requires text".into()))?;
                let element = self.driver.find(selector).await?;
                self.driver.type_text(&element, text).await?;
                Ok(None)
            }
            ActionType::Scroll => {
                let target = step
                    .selector
                    .as_deref()
                    .or_else(|| step.parameter("target"))
                    .unwrap_or("down");
                self.driver.scroll(target).await?;
                Ok(None)
            }
            ActionType::Extract => {
                let target = step
                    .selector
                    .as_deref()
                    .or_else(|| step.parameter("target"))
                    .unwrap_or("body");
                if target == "screenshot" {
                    let bytes = self.driver.screenshot().await?;
                    Ok(Some(format!("screenshot:{}-bytes", bytes.len())))
                } else {
                    let value = self
                        .driver
                        .evaluate(&format!("document.querySelector('{}').textContent", target))
                        .await?;
                    match value.as_str() {
                        Some(text) => Ok(Some(text.to_string())),
                        None => Err(NavError::ElementNotFound(format!(
                            "nothing to extract at '{}'",
                            target
                        ))),
                    }
                }
            }
            ActionType::Wait => {
                let seconds: f64 = step
                    .parameter("seconds")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1.0);
                tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
                Ok(None)
            }
        }
    }

    async fn cancel_pending(&self) {
        if let Err(err) = self.driver.evaluate("window.stop()").await {
            warn!(error = %err, "best-effort cancel of pending command failed");
        }
    }

    fn transition(&self, step: &ActionStep, state: &mut DispatchState, next: DispatchState) {
        debug!(
            step_id = %step.id,
            action = %step.action_type,
            from = %state,
            to = %next,
            "dispatch transition"
        );
        if next == DispatchState::Completed {
            info!(step_id = %step.id, action = %step.action_type, "step completed");
        }
        *state = next;
    }
}

fn validate_url(url: &str) -> Result<(), NavError> {
    if url.starts_with("http://") || url.starts_with("https://") || url.starts_with("file://") {
        Ok(())
    } else {
        Err(NavError::InvalidInput(format!(
            "unsupported url scheme: {}",
            url
        )))
    }
}
