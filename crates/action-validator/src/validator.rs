//! Validator: scores the three signals for one executed step
//!
//! Pre/post states come from the Navigation Engine's observer; the visual
//! signal goes through Media Perception's frame comparison. Signals that
//! cannot be computed (no screenshot, undecodable frame) degrade to an
//! explicit "unavailable" score of zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use media_perception::compare_frames;
use navigation_engine::ObservedState;
use spectra_core_types::{ActionStep, ActionType};

use crate::signals::{agreement, SignalKind, SignalScore};

/// Validator tunables.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Structural similarity above which two frames count as "same page"
    /// (spec default 0.95).
    pub screenshot_comparison_threshold: f64,

    /// Pass thresholds per signal, in normalized score space.
    pub dom_threshold: f64,
    pub visual_threshold: f64,
    pub network_threshold: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            screenshot_comparison_threshold: 0.95,
            dom_threshold: 0.6,
            visual_threshold: 0.5,
            network_threshold: 0.5,
        }
    }
}

/// Full validation outcome for one attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub success: bool,
    pub confidence: f64,
    pub reasons: Vec<String>,

    /// Per-signal evidence, retained for observability
    pub signals: Vec<SignalScore>,

    pub validated_at: DateTime<Utc>,
}

pub struct ActionValidator {
    config: ValidatorConfig,
}

impl ActionValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Score all three signals and apply the agreement rule.
    pub fn validate(
        &self,
        step: &ActionStep,
        pre: &ObservedState,
        post: &ObservedState,
    ) -> ValidationReport {
        let signals = vec![
            self.dom_signal(step, pre, post),
            self.visual_signal(step, pre, post),
            self.network_signal(step, pre, post),
        ];

        let verdict = agreement(&signals);
        debug!(
            step_id = %step.id,
            action = %step.action_type,
            success = verdict.success,
            confidence = verdict.confidence,
            "validation verdict"
        );

        ValidationReport {
            success: verdict.success,
            confidence: verdict.confidence,
            reasons: verdict.reasons,
            signals,
            validated_at: Utc::now(),
        }
    }

    /// DOM/state diff. An explicit expected outcome dominates; otherwise
    /// the score reflects the state change appropriate to the action.
    fn dom_signal(&self, step: &ActionStep, pre: &ObservedState, post: &ObservedState) -> SignalScore {
        let threshold = self.config.dom_threshold;

        if let Some(expected) = &step.expected_outcome {
            let matched = post.url.contains(expected.as_str())
                || post.title.contains(expected.as_str())
                || post
                    .extracted
                    .as_deref()
                    .map(|data| data.contains(expected.as_str()))
                    .unwrap_or(false);
            return if matched {
                SignalScore::new(
                    SignalKind::Dom,
                    1.0,
                    threshold,
                    format!("expected outcome '{}' observed", expected),
                )
            } else {
                SignalScore::new(
                    SignalKind::Dom,
                    0.0,
                    threshold,
                    format!("expected outcome '{}' not observed", expected),
                )
            };
        }

        match step.action_type {
            ActionType::Navigate => {
                // Target match, not change: re-navigating an already-loaded
                // page must still validate (idempotence).
                if let Some(target) = step.parameter("url") {
                    if same_resource(&post.url, target) {
                        return SignalScore::new(
                            SignalKind::Dom,
                            1.0,
                            threshold,
                            format!("url matches target {}", target),
                        );
                    }
                }
                if post.url != pre.url {
                    SignalScore::new(SignalKind::Dom, 0.9, threshold, "url changed")
                } else {
                    SignalScore::new(SignalKind::Dom, 0.0, threshold, "url did not change")
                }
            }
            ActionType::Click | ActionType::Type | ActionType::Scroll => {
                if post.url != pre.url {
                    SignalScore::new(SignalKind::Dom, 0.9, threshold, "url changed")
                } else if post.dom_digest != pre.dom_digest {
                    SignalScore::new(SignalKind::Dom, 0.8, threshold, "dom structure changed")
                } else if post.title != pre.title {
                    SignalScore::new(SignalKind::Dom, 0.7, threshold, "title changed")
                } else {
                    SignalScore::new(SignalKind::Dom, 0.0, threshold, "no state change observed")
                }
            }
            ActionType::Extract => match post.extracted.as_deref() {
                Some(data) if !data.is_empty() => SignalScore::new(
                    SignalKind::Dom,
                    1.0,
                    threshold,
                    format!("extracted {} bytes", data.len()),
                ),
                _ => SignalScore::new(SignalKind::Dom, 0.0, threshold, "nothing extracted"),
            },
            ActionType::Wait => {
                SignalScore::new(SignalKind::Dom, 1.0, threshold, "wait elapsed")
            }
        }
    }

    /// Visual diff of before/after frames via Media Perception.
    fn visual_signal(
        &self,
        step: &ActionStep,
        pre: &ObservedState,
        post: &ObservedState,
    ) -> SignalScore {
        let threshold = self.config.visual_threshold;
        let (before, after) = match (&pre.screenshot, &post.screenshot) {
            (Some(before), Some(after)) => (before, after),
            _ => return SignalScore::unavailable(SignalKind::Visual, threshold, "no screenshot pair"),
        };

        let diff = match compare_frames(before, after) {
            Ok(diff) => diff,
            Err(err) => {
                return SignalScore::unavailable(SignalKind::Visual, threshold, err.to_string())
            }
        };

        let similarity_floor = self.config.screenshot_comparison_threshold;
        let detail = format!("structural similarity {:.3}", diff.structural_similarity);

        if expects_visual_change(step.action_type) {
            // Dissimilarity relative to the "same page" floor.
            let needed = (1.0 - similarity_floor).max(f64::EPSILON);
            let score = ((1.0 - diff.structural_similarity) / needed).min(1.0);
            SignalScore::new(SignalKind::Visual, score, threshold, detail)
        } else {
            // Stability: the page should still look the same.
            let score = if diff.structural_similarity >= similarity_floor {
                1.0
            } else {
                diff.structural_similarity / similarity_floor
            };
            SignalScore::new(SignalKind::Visual, score, threshold, detail)
        }
    }

    /// Network-activity heuristics over requests issued since the
    /// pre-state observation.
    fn network_signal(
        &self,
        step: &ActionStep,
        pre: &ObservedState,
        post: &ObservedState,
    ) -> SignalScore {
        let threshold = self.config.network_threshold;
        let new_requests: Vec<&str> = post
            .network_requests
            .iter()
            .skip(pre.network_requests.len())
            .map(String::as_str)
            .collect();

        match step.action_type {
            ActionType::Navigate => {
                let target_host = step
                    .parameter("url")
                    .and_then(|u| Url::parse(u).ok())
                    .and_then(|u| u.host_str().map(str::to_string));
                if let Some(host) = target_host {
                    if new_requests.iter().any(|r| r.contains(&host)) {
                        return SignalScore::new(
                            SignalKind::Network,
                            1.0,
                            threshold,
                            format!("request issued to {}", host),
                        );
                    }
                }
                if new_requests.is_empty() {
                    SignalScore::new(SignalKind::Network, 0.0, threshold, "no network activity")
                } else {
                    SignalScore::new(
                        SignalKind::Network,
                        0.6,
                        threshold,
                        format!("{} new requests", new_requests.len()),
                    )
                }
            }
            ActionType::Click => {
                let selector = step.selector.as_deref().unwrap_or("");
                if !selector.is_empty() && new_requests.iter().any(|r| r.contains(selector)) {
                    SignalScore::new(
                        SignalKind::Network,
                        1.0,
                        threshold,
                        format!("request matching '{}'", selector),
                    )
                } else if !new_requests.is_empty() {
                    SignalScore::new(
                        SignalKind::Network,
                        0.7,
                        threshold,
                        format!("{} new requests", new_requests.len()),
                    )
                } else {
                    SignalScore::new(SignalKind::Network, 0.0, threshold, "no network activity")
                }
            }
            ActionType::Type | ActionType::Scroll | ActionType::Extract | ActionType::Wait => {
                // These actions should not kick off navigation-level
                // traffic; quiescence is the expected shape.
                if new_requests.is_empty() {
                    SignalScore::new(SignalKind::Network, 1.0, threshold, "network quiet")
                } else {
                    SignalScore::new(
                        SignalKind::Network,
                        0.3,
                        threshold,
                        format!("{} unexpected requests", new_requests.len()),
                    )
                }
            }
        }
    }
}

fn expects_visual_change(action: ActionType) -> bool {
    match action {
        ActionType::Navigate | ActionType::Click | ActionType::Type | ActionType::Scroll => true,
        ActionType::Extract | ActionType::Wait => false,
    }
}

/// URL equivalence that tolerates trailing-slash differences.
fn same_resource(observed: &str, target: &str) -> bool {
    if observed == target {
        return true;
    }
    observed.trim_end_matches('/') == target.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use image::{ImageBuffer, Rgb};
    use spectra_core_types::ActionStep;

    fn observed(url: &str, digest: &str, requests: &[&str]) -> ObservedState {
        ObservedState {
            url: url.to_string(),
            title: "Title".to_string(),
            dom_digest: digest.to_string(),
            screenshot: None,
            extracted: None,
            network_requests: requests.iter().map(|s| s.to_string()).collect(),
            observed_at: Utc::now(),
        }
    }

    fn encode(pixel: Rgb<u8>) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(40, 40, pixel);
        let mut buf = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut buf),
            image::ImageFormat::Png,
        )
        .unwrap();
        buf
    }

    #[test]
    fn navigate_with_matching_url_and_request_succeeds() {
        let validator = ActionValidator::new(ValidatorConfig::default());
        let step = ActionStep::new(ActionType::Navigate).with_parameter("url", "https://example.com");

        let pre = observed("about:blank", "d0", &[]);
        let post = observed("https://example.com", "d1", &["https://example.com"]);

        let report = validator.validate(&step, &pre, &post);
        assert!(report.success);
        assert!(report.confidence > 0.5);
    }

    #[test]
    fn renavigating_an_unchanged_page_still_succeeds() {
        // Idempotence: identical parameters, page already loaded.
        let validator = ActionValidator::new(ValidatorConfig::default());
        let step = ActionStep::new(ActionType::Navigate).with_parameter("url", "https://example.com");

        let pre = observed("https://example.com", "d1", &["https://example.com"]);
        let post = observed(
            "https://example.com",
            "d1",
            &["https://example.com", "https://example.com"],
        );

        let report = validator.validate(&step, &pre, &post);
        assert!(report.success);
    }

    #[test]
    fn dom_change_alone_is_not_success() {
        let validator = ActionValidator::new(ValidatorConfig::default());
        let step = ActionStep::new(ActionType::Click).with_selector("#submit");

        // DOM digest changed for unrelated reasons; no network, no frames.
        let pre = observed("https://example.com", "d1", &[]);
        let post = observed("https://example.com", "d2", &[]);

        let report = validator.validate(&step, &pre, &post);
        assert!(!report.success);
        assert!(!report.reasons.is_empty());
    }

    #[test]
    fn extract_with_data_and_quiet_network_succeeds() {
        let validator = ActionValidator::new(ValidatorConfig::default());
        let step = ActionStep::new(ActionType::Extract).with_parameter("target", "screenshot");

        let pre = observed("https://example.com", "d1", &["https://example.com"]);
        let mut post = observed("https://example.com", "d1", &["https://example.com"]);
        post.extracted = Some("screenshot:1024-bytes".to_string());

        let report = validator.validate(&step, &pre, &post);
        assert!(report.success);
    }

    #[test]
    fn visual_signal_scores_change_for_navigate() {
        let validator = ActionValidator::new(ValidatorConfig::default());
        let step = ActionStep::new(ActionType::Navigate).with_parameter("url", "https://example.com");

        let mut pre = observed("about:blank", "d0", &[]);
        let mut post = observed("https://example.com", "d1", &["https://example.com"]);
        pre.screenshot = Some(encode(Rgb([255, 255, 255])));
        post.screenshot = Some(encode(Rgb([30, 30, 30])));

        let report = validator.validate(&step, &pre, &post);
        let visual = report
            .signals
            .iter()
            .find(|s| s.kind == SignalKind::Visual)
            .unwrap();
        assert!(visual.passed(), "large frame change should pass: {:?}", visual);
        assert!(report.success);
    }

    #[test]
    fn missing_screenshots_degrade_the_visual_signal() {
        let validator = ActionValidator::new(ValidatorConfig::default());
        let step = ActionStep::new(ActionType::Wait);

        let pre = observed("https://example.com", "d1", &[]);
        let post = observed("https://example.com", "d1", &[]);

        let report = validator.validate(&step, &pre, &post);
        let visual = report
            .signals
            .iter()
            .find(|s| s.kind == SignalKind::Visual)
            .unwrap();
        assert!(visual.detail.contains("unavailable"));
        // Wait still succeeds on dom + quiet network.
        assert!(report.success);
    }

    #[test]
    fn expected_outcome_mismatch_fails_the_dom_signal() {
        let validator = ActionValidator::new(ValidatorConfig::default());
        let step = ActionStep::new(ActionType::Navigate)
            .with_parameter("url", "https://example.com")
            .with_expected_outcome("checkout-complete");

        let pre = observed("about:blank", "d0", &[]);
        let post = observed("https://example.com", "d1", &["https://example.com"]);

        let report = validator.validate(&step, &pre, &post);
        let dom = report
            .signals
            .iter()
            .find(|s| s.kind == SignalKind::Dom)
            .unwrap();
        assert!(!dom.passed());
    }
}
