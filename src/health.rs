//! Per-component health tracking
//!
//! The controller records each component's state after every run; the
//! registry snapshot rides along in `ExecutionResult.final_state` and the
//! metrics endpoint.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Health classification of one pipeline component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    Degraded,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub updated_at: DateTime<Utc>,
}

impl ComponentHealth {
    fn healthy() -> Self {
        Self {
            status: ComponentStatus::Healthy,
            last_error: None,
            consecutive_failures: 0,
            updated_at: Utc::now(),
        }
    }
}

/// Known component names, used as registry keys.
pub const COMPONENTS: &[&str] = &[
    "intent_compiler",
    "navigation_engine",
    "action_validator",
    "media_perception",
    "session_manager",
];

#[derive(Default)]
pub struct HealthRegistry {
    components: DashMap<String, ComponentHealth>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        let registry = Self::default();
        for name in COMPONENTS {
            registry
                .components
                .insert(name.to_string(), ComponentHealth::healthy());
        }
        registry
    }

    pub fn mark_healthy(&self, component: &str) {
        self.components
            .insert(component.to_string(), ComponentHealth::healthy());
    }

    pub fn mark_degraded(&self, component: &str, error: impl Into<String>) {
        self.update(component, ComponentStatus::Degraded, Some(error.into()));
    }

    pub fn mark_failed(&self, component: &str, error: impl Into<String>) {
        self.update(component, ComponentStatus::Failed, Some(error.into()));
    }

    pub fn status_of(&self, component: &str) -> Option<ComponentStatus> {
        self.components.get(component).map(|h| h.status)
    }

    /// Snapshot for result payloads and the metrics endpoint.
    pub fn snapshot(&self) -> std::collections::BTreeMap<String, ComponentHealth> {
        self.components
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    fn update(&self, component: &str, status: ComponentStatus, error: Option<String>) {
        let mut entry = self
            .components
            .entry(component.to_string())
            .or_insert_with(ComponentHealth::healthy);
        let failures = if status == ComponentStatus::Healthy {
            0
        } else {
            entry.consecutive_failures + 1
        };
        *entry = ComponentHealth {
            status,
            last_error: error,
            consecutive_failures: failures,
            updated_at: Utc::now(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_starts_all_healthy() {
        let registry = HealthRegistry::new();
        for name in COMPONENTS {
            assert_eq!(registry.status_of(name), Some(ComponentStatus::Healthy));
        }
    }

    #[test]
    fn failures_accumulate_until_recovery() {
        let registry = HealthRegistry::new();
        registry.mark_degraded("navigation_engine", "timeout");
        registry.mark_failed("navigation_engine", "driver gone");

        let snapshot = registry.snapshot();
        let nav = &snapshot["navigation_engine"];
        assert_eq!(nav.status, ComponentStatus::Failed);
        assert_eq!(nav.consecutive_failures, 2);

        registry.mark_healthy("navigation_engine");
        assert_eq!(
            registry.status_of("navigation_engine"),
            Some(ComponentStatus::Healthy)
        );
    }
}
