//! Browser driver boundary
//!
//! The pipeline executes against this trait; Playwright-style and
//! Selenium-style adapters both fit behind it. Initialization retries the
//! primary factory with backoff, then tries the fallback factory once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::errors::NavError;

/// Opaque handle to a located element, valid until the next navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    pub selector: String,
}

/// The externally supplied browser driver surface.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), NavError>;

    async fn find(&self, selector: &str) -> Result<ElementHandle, NavError>;

    async fn click(&self, element: &ElementHandle) -> Result<(), NavError>;

    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<(), NavError>;

    async fn scroll(&self, target: &str) -> Result<(), NavError>;

    async fn screenshot(&self) -> Result<Vec<u8>, NavError>;

    async fn evaluate(&self, script: &str) -> Result<Value, NavError>;

    /// Driver name for logs and health reporting.
    fn name(&self) -> &'static str;
}

/// Launches driver instances; the engine owns retry/fallback policy.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn BrowserDriver>, NavError>;

    fn name(&self) -> &'static str;
}

const INIT_ATTEMPTS: u32 = 3;
const INIT_BACKOFF_START: Duration = Duration::from_secs(2);

/// Initialize a driver: three attempts against the primary factory with
/// exponential backoff, then one attempt against the fallback.
pub async fn init_driver(
    primary: &dyn DriverFactory,
    fallback: Option<&dyn DriverFactory>,
) -> Result<Arc<dyn BrowserDriver>, NavError> {
    let mut backoff = INIT_BACKOFF_START;
    let mut last_error = None;

    for attempt in 1..=INIT_ATTEMPTS {
        match primary.launch().await {
            Ok(driver) => {
                info!(driver = driver.name(), attempt, "driver initialized");
                return Ok(driver);
            }
            Err(err) => {
                warn!(
                    factory = primary.name(),
                    attempt,
                    error = %err,
                    "driver launch failed"
                );
                last_error = Some(err);
                if attempt < INIT_ATTEMPTS {
                    sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    if let Some(fallback) = fallback {
        warn!(factory = fallback.name(), "falling back to secondary driver");
        match fallback.launch().await {
            Ok(driver) => {
                info!(driver = driver.name(), "fallback driver initialized");
                return Ok(driver);
            }
            Err(err) => {
                return Err(NavError::InitFailure(format!(
                    "primary '{}' failed after {} attempts, fallback '{}' failed: {}",
                    primary.name(),
                    INIT_ATTEMPTS,
                    fallback.name(),
                    err
                )));
            }
        }
    }

    Err(NavError::InitFailure(format!(
        "driver '{}' failed after {} attempts: {}",
        primary.name(),
        INIT_ATTEMPTS,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FailingFactory {
        attempts: AtomicU32,
    }

    #[async_trait]
    impl DriverFactory for FailingFactory {
        async fn launch(&self) -> Result<Arc<dyn BrowserDriver>, NavError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(NavError::DriverFailure("no browser binary".into()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn init_exhausts_primary_then_fails_without_fallback() {
        let factory = FailingFactory {
            attempts: AtomicU32::new(0),
        };
        let result = init_driver(&factory, None).await;
        assert!(matches!(result, Err(NavError::InitFailure(_))));
        assert_eq!(factory.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn init_uses_fallback_after_primary_exhaustion() {
        let primary = FailingFactory {
            attempts: AtomicU32::new(0),
        };
        let fallback = crate::stub::StubDriverFactory::default();

        let driver = init_driver(&primary, Some(&fallback)).await.unwrap();
        assert_eq!(driver.name(), "stub");
        assert_eq!(primary.attempts.load(Ordering::SeqCst), 3);
    }
}
