//! In-memory stub driver
//!
//! A scriptable page model behind the full `BrowserDriver` surface. Serves
//! as the built-in fallback driver and as the test double for every
//! pipeline test: pages, links, and latency are configured up front and
//! every mutation bumps a revision that feeds the DOM digest.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::driver::{BrowserDriver, DriverFactory, ElementHandle};
use crate::errors::NavError;

/// One scripted page in the stub browser.
#[derive(Debug, Clone, Default)]
pub struct StubPage {
    pub title: String,

    /// Selectors that resolve on this page
    pub elements: Vec<String>,

    /// Text content returned for extraction, keyed by selector
    pub text_content: HashMap<String, String>,

    /// Click targets: selector -> destination URL
    pub links: HashMap<String, String>,
}

impl StubPage {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_element(mut self, selector: impl Into<String>) -> Self {
        self.elements.push(selector.into());
        self
    }

    pub fn with_text(mut self, selector: impl Into<String>, text: impl Into<String>) -> Self {
        let selector = selector.into();
        self.elements.push(selector.clone());
        self.text_content.insert(selector, text.into());
        self
    }

    pub fn with_link(mut self, selector: impl Into<String>, target: impl Into<String>) -> Self {
        let selector = selector.into();
        self.elements.push(selector.clone());
        self.links.insert(selector, target.into());
        self
    }
}

#[derive(Debug, Default)]
struct StubState {
    current_url: String,
    pages: HashMap<String, StubPage>,
    typed: HashMap<String, String>,
    scroll_offset: i64,
    requests: Vec<String>,
    revision: u64,
}

impl StubState {
    fn current_page(&self) -> StubPage {
        self.pages.get(&self.current_url).cloned().unwrap_or_else(|| {
            // Unscripted URLs resolve to a synthetic page titled by host.
            let title = Url::parse(&self.current_url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
                .unwrap_or_else(|| "about:blank".to_string());
            StubPage::new(title)
        })
    }
}

/// Scriptable in-memory browser driver.
pub struct StubDriver {
    state: Mutex<StubState>,

    /// Artificial latency injected before every operation
    latency: Duration,
}

impl StubDriver {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StubState {
                current_url: "about:blank".to_string(),
                ..Default::default()
            }),
            latency: Duration::ZERO,
        }
    }

    pub fn with_page(self, url: impl Into<String>, page: StubPage) -> Self {
        self.state.lock().pages.insert(url.into(), page);
        self
    }

    /// Inject latency before every driver call, for deadline tests.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Text typed so far into a selector, for double-submit assertions.
    pub fn typed_text(&self, selector: &str) -> Option<String> {
        self.state.lock().typed.get(selector).cloned()
    }

    /// Full request log, newest last.
    pub fn request_log(&self) -> Vec<String> {
        self.state.lock().requests.clone()
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl Default for StubDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserDriver for StubDriver {
    async fn navigate(&self, url: &str) -> Result<(), NavError> {
        self.pause().await;
        Url::parse(url).map_err(|e| NavError::InvalidInput(format!("bad url '{}': {}", url, e)))?;

        let mut state = self.state.lock();
        state.requests.push(url.to_string());
        state.current_url = url.to_string();
        state.typed.clear();
        state.scroll_offset = 0;
        state.revision += 1;
        debug!(url, "stub navigate");
        Ok(())
    }

    async fn find(&self, selector: &str) -> Result<ElementHandle, NavError> {
        self.pause().await;
        let state = self.state.lock();
        if state.current_page().elements.iter().any(|s| s == selector) {
            Ok(ElementHandle {
                selector: selector.to_string(),
            })
        } else {
            Err(NavError::ElementNotFound(format!(
                "selector '{}' not present on {}",
                selector, state.current_url
            )))
        }
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), NavError> {
        self.pause().await;
        let mut state = self.state.lock();
        let page = state.current_page();
        state
            .requests
            .push(format!("click:{}", element.selector));
        if let Some(target) = page.links.get(&element.selector) {
            state.current_url = target.clone();
            state.requests.push(target.clone());
        }
        state.revision += 1;
        Ok(())
    }

    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<(), NavError> {
        self.pause().await;
        let mut state = self.state.lock();
        // Repeated type calls append, which is what makes a blind retry of
        // `type` produce a duplicated value.
        state
            .typed
            .entry(element.selector.clone())
            .or_default()
            .push_str(text);
        state.revision += 1;
        Ok(())
    }

    async fn scroll(&self, target: &str) -> Result<(), NavError> {
        self.pause().await;
        let mut state = self.state.lock();
        state.scroll_offset += match target {
            "up" => -600,
            _ => 600,
        };
        state.revision += 1;
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, NavError> {
        self.pause().await;
        let state = self.state.lock();
        // Deterministic per (url, revision); not a decodable image, which
        // exercises the validator's degraded-visual path.
        Ok(format!("stub-frame:{}:{}", state.current_url, state.revision).into_bytes())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, NavError> {
        self.pause().await;
        let state = self.state.lock();
        let page = state.current_page();

        if script == "window.location.href" {
            return Ok(json!(state.current_url));
        }
        if script == "document.title" {
            return Ok(json!(page.title));
        }
        if script == "document.documentElement.outerHTML" {
            // A synthetic DOM that changes with every mutation.
            return Ok(json!(format!(
                "<html data-rev=\"{}\"><head><title>{}</title></head><body>{:?} typed={:?} scroll={}</body></html>",
                state.revision, page.title, page.elements, state.typed, state.scroll_offset
            )));
        }
        if script == "performance.getEntriesByType('resource').map(e => e.name)" {
            return Ok(json!(state.requests));
        }
        if script == "window.stop()" {
            return Ok(Value::Null);
        }
        if let Some(selector) = script
            .strip_prefix("document.querySelector('")
            .and_then(|rest| rest.strip_suffix("').textContent"))
        {
            return Ok(page
                .text_content
                .get(selector)
                .map(|text| json!(text))
                .unwrap_or(Value::Null));
        }

        Ok(Value::Null)
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Factory for the stub driver; always succeeds.
#[derive(Debug, Default)]
pub struct StubDriverFactory {
    pages: Mutex<Vec<(String, StubPage)>>,
}

impl StubDriverFactory {
    pub fn with_page(self, url: impl Into<String>, page: StubPage) -> Self {
        self.pages.lock().push((url.into(), page));
        self
    }
}

#[async_trait]
impl DriverFactory for StubDriverFactory {
    async fn launch(&self) -> Result<Arc<dyn BrowserDriver>, NavError> {
        let mut driver = StubDriver::new();
        for (url, page) in self.pages.lock().iter() {
            driver = driver.with_page(url.clone(), page.clone());
        }
        Ok(Arc::new(driver))
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}
