//! The compiler: clause splitting, verb classification, plan assembly

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tracing::{debug, info};
use url::Url;

use spectra_core_types::{ActionStep, ActionType, IntentId};

use crate::errors::CompileError;
use crate::models::{Entity, Intent, IntentMetadata};
use crate::patterns::{
    CLAUSE_SPLIT, ENTITY_PATTERNS, IMPLICIT_TARGET, SCREENSHOT, SEARCH, VERB_PATTERNS,
};

/// Maximum accepted instruction length in bytes.
pub const MAX_INTENT_BYTES: usize = 8 * 1024;

/// Browsing context the compiler resolves implicit targets against.
#[derive(Debug, Clone, Default)]
pub struct CompileContext {
    pub current_url: Option<String>,
    pub current_domain: Option<String>,
}

/// One candidate interpretation of a clause.
#[derive(Debug, Clone)]
struct Candidate {
    action: ActionType,
    position: usize,
    confidence: f64,
    capture: Option<String>,
    template: Template,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Template {
    Plain,
    Screenshot,
    Search,
}

pub struct IntentCompiler {
    compilations: AtomicU64,
    failures: AtomicU64,
}

impl IntentCompiler {
    pub fn new() -> Self {
        Self {
            compilations: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn compilation_count(&self) -> u64 {
        self.compilations.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Compile instruction text into an ordered plan.
    ///
    /// Pure with respect to the compiler: the only inputs are the text and
    /// the supplied context.
    pub fn compile(&self, text: &str, ctx: &CompileContext) -> Result<Intent, CompileError> {
        match self.compile_inner(text, ctx) {
            Ok(intent) => {
                self.compilations.fetch_add(1, Ordering::Relaxed);
                info!(
                    intent_id = %intent.id,
                    steps = intent.action_plan.len(),
                    confidence = intent.confidence,
                    "intent compiled"
                );
                Ok(intent)
            }
            Err(err) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                Err(err)
            }
        }
    }

    fn compile_inner(&self, text: &str, ctx: &CompileContext) -> Result<Intent, CompileError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(CompileError::EmptyIntent);
        }
        if trimmed.len() > MAX_INTENT_BYTES {
            return Err(CompileError::TooLong {
                actual: trimmed.len(),
                limit: MAX_INTENT_BYTES,
            });
        }

        let normalized = normalize_whitespace(trimmed);
        let entities = extract_entities(&normalized);
        let mut metadata = IntentMetadata::default();
        let mut plan: Vec<ActionStep> = Vec::new();
        let mut confidence: f64 = 0.0;

        for clause in CLAUSE_SPLIT.split(&normalized) {
            let clause = clause.trim();
            if clause.is_empty() {
                continue;
            }

            let Some(winner) = classify_clause(clause, &mut metadata) else {
                debug!(clause, "no actionable verb in clause");
                continue;
            };

            metadata.matched_verbs.push(winner.action.name().to_string());
            confidence = confidence.max(winner.confidence);

            match winner.template {
                Template::Screenshot => {
                    plan.push(
                        ActionStep::new(ActionType::Extract)
                            .with_parameter("target", "screenshot"),
                    );
                }
                Template::Search => {
                    let query = winner.capture.clone().unwrap_or_default();
                    let search_input = "input[type=\"search\"]";
                    plan.push(ActionStep::new(ActionType::Click).with_selector(search_input));
                    plan.push(
                        ActionStep::new(ActionType::Type)
                            .with_selector(search_input)
                            .with_parameter("text", strip_quotes(&query)),
                    );
                    plan.push(ActionStep::new(ActionType::Extract).with_selector("body"));
                }
                Template::Plain => {
                    if let Some(step) = build_step(&winner, clause, ctx) {
                        plan.push(step);
                    } else {
                        debug!(clause, action = winner.action.name(), "clause had no usable target");
                    }
                }
            }
        }

        if plan.is_empty() {
            return Err(CompileError::Unresolved(truncate(&normalized, 120)));
        }

        let target_domain = entities
            .iter()
            .find(|e| e.label == "URL")
            .and_then(|e| Url::parse(&e.text).ok())
            .and_then(|u| u.host_str().map(str::to_string))
            .or_else(|| ctx.current_domain.clone());

        Ok(Intent {
            id: IntentId::new(),
            raw_text: text.to_string(),
            goal_entities: entities,
            target_domain,
            action_plan: plan,
            confidence,
            compiled_at: Utc::now(),
            metadata,
        })
    }
}

impl Default for IntentCompiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick the winning interpretation of a clause.
///
/// Deterministic resolution: earliest match in the clause wins; ties go to
/// the higher confidence, then to the lexicographically smaller action
/// name. Losing candidates are recorded for observability, never errored.
fn classify_clause(clause: &str, metadata: &mut IntentMetadata) -> Option<Candidate> {
    let mut candidates: Vec<Candidate> = Vec::new();

    if let Some(m) = SCREENSHOT.find(clause) {
        candidates.push(Candidate {
            action: ActionType::Extract,
            position: m.start(),
            confidence: 0.95,
            capture: None,
            template: Template::Screenshot,
        });
    }

    if let Some(caps) = SEARCH.captures(clause) {
        candidates.push(Candidate {
            action: ActionType::Type,
            position: caps.get(0).map(|m| m.start()).unwrap_or(0),
            confidence: 0.85,
            capture: caps.get(1).map(|m| m.as_str().to_string()),
            template: Template::Search,
        });
    }

    for pattern in VERB_PATTERNS.iter() {
        if let Some(caps) = pattern.regex.captures(clause) {
            candidates.push(Candidate {
                action: pattern.action,
                position: caps.get(0).map(|m| m.start()).unwrap_or(0),
                confidence: pattern.confidence,
                capture: caps.get(1).map(|m| m.as_str().to_string()),
                template: Template::Plain,
            });
        }
    }

    candidates.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then(
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(a.action.name().cmp(b.action.name()))
    });

    let mut iter = candidates.into_iter();
    let winner = iter.next()?;
    for loser in iter {
        metadata
            .alternatives
            .push(format!("{}: {}", loser.action.name(), truncate(clause, 60)));
    }
    Some(winner)
}

fn build_step(candidate: &Candidate, clause: &str, ctx: &CompileContext) -> Option<ActionStep> {
    match candidate.action {
        ActionType::Navigate => {
            let target = navigation_target(candidate, clause, ctx)?;
            Some(ActionStep::new(ActionType::Navigate).with_parameter("url", target))
        }
        ActionType::Click => {
            let target = candidate.capture.as_deref().unwrap_or("");
            Some(ActionStep::new(ActionType::Click).with_selector(derive_selector(target)))
        }
        ActionType::Type => {
            let capture = candidate.capture.as_deref().unwrap_or("");
            let (text, field) = split_type_target(capture);
            let selector = field
                .map(derive_selector)
                .unwrap_or_else(|| "input".to_string());
            Some(
                ActionStep::new(ActionType::Type)
                    .with_selector(selector)
                    .with_parameter("text", strip_quotes(text)),
            )
        }
        ActionType::Scroll => {
            let direction = match candidate.capture.as_deref() {
                Some(dir) if dir.eq_ignore_ascii_case("up") => "up",
                _ => "down",
            };
            Some(ActionStep::new(ActionType::Scroll).with_parameter("target", direction))
        }
        ActionType::Extract => {
            let target = candidate.capture.as_deref().unwrap_or("body");
            let selector = if IMPLICIT_TARGET.is_match(target) {
                "body".to_string()
            } else {
                derive_extract_selector(target)
            };
            Some(ActionStep::new(ActionType::Extract).with_selector(selector))
        }
        ActionType::Wait => {
            let seconds = candidate
                .capture
                .as_deref()
                .and_then(|s| s.parse::<f64>().ok())
                .unwrap_or(1.0);
            Some(ActionStep::new(ActionType::Wait).with_parameter("seconds", seconds.to_string()))
        }
    }
}

fn navigation_target(candidate: &Candidate, clause: &str, ctx: &CompileContext) -> Option<String> {
    // A URL entity inside the clause is the strongest evidence.
    let (_, url_re) = &ENTITY_PATTERNS[0];
    if let Some(m) = url_re.find(clause) {
        return Some(trim_trailing_punctuation(m.as_str()).to_string());
    }

    let capture = candidate.capture.as_deref().unwrap_or("");
    if IMPLICIT_TARGET.is_match(capture) || capture.is_empty() {
        return ctx.current_url.clone();
    }

    // Bare domains get a scheme; anything else is not navigable.
    let cleaned = trim_trailing_punctuation(strip_quotes(capture).as_str()).to_string();
    if cleaned.contains('.') && !cleaned.contains(char::is_whitespace) {
        Some(format!("https://{}", cleaned))
    } else {
        ctx.current_url.clone()
    }
}

/// Map a natural-language target description to a best-effort selector.
fn derive_selector(target: &str) -> String {
    let cleaned = strip_quotes(target.trim());
    let lower = cleaned.to_lowercase();

    if cleaned.starts_with('#') || cleaned.starts_with('.') || cleaned.starts_with('[') {
        return cleaned;
    }
    if lower.contains("search") {
        return "input[type=\"search\"]".to_string();
    }
    if lower.contains("password") {
        return "input[type=\"password\"]".to_string();
    }
    if lower.contains("button") || lower.contains("submit") {
        return "button".to_string();
    }
    if lower.contains("link") {
        return "a".to_string();
    }
    format!("[aria-label*=\"{}\"]", cleaned)
}

fn derive_extract_selector(target: &str) -> String {
    let cleaned = strip_quotes(target.trim());
    let lower = cleaned.to_lowercase();
    if cleaned.starts_with('#') || cleaned.starts_with('.') || cleaned.starts_with('[') {
        return cleaned;
    }
    if lower.contains("link") {
        return "a".to_string();
    }
    if lower.contains("title") {
        return "h1".to_string();
    }
    "body".to_string()
}

/// "type 'hello' into the search box" -> ("'hello'", Some("the search box"))
fn split_type_target(capture: &str) -> (&str, Option<&str>) {
    for separator in [" into ", " in ", " to "] {
        if let Some(idx) = capture.find(separator) {
            let (text, rest) = capture.split_at(idx);
            return (text.trim(), Some(rest[separator.len()..].trim()));
        }
    }
    (capture.trim(), None)
}

fn strip_quotes(text: &str) -> String {
    text.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string()
}

fn trim_trailing_punctuation(text: &str) -> &str {
    text.trim_end_matches(|c| matches!(c, '.' | ',' | ';' | '!' | '?'))
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let cut = text
        .char_indices()
        .take_while(|(i, _)| *i <= limit)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(0);
    format!("{}...", &text[..cut])
}

fn extract_entities(text: &str) -> Vec<Entity> {
    let mut entities = Vec::new();
    for (label, regex) in ENTITY_PATTERNS.iter() {
        for m in regex.find_iter(text) {
            // Skip spans already claimed by an earlier (higher-priority)
            // entity class, e.g. digits inside a URL.
            let overlaps = entities
                .iter()
                .any(|e: &Entity| m.start() < e.end && e.start < m.end());
            if overlaps {
                continue;
            }
            entities.push(Entity {
                text: trim_trailing_punctuation(m.as_str()).to_string(),
                label: label.to_string(),
                confidence: 0.9,
                start: m.start(),
                end: m.end(),
            });
        }
    }
    entities.sort_by_key(|e| e.start);
    entities
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(text: &str) -> Result<Intent, CompileError> {
        IntentCompiler::new().compile(text, &CompileContext::default())
    }

    #[test]
    fn navigate_and_screenshot_compiles_to_two_steps() {
        let intent = compile("Navigate to https://example.com and take a screenshot").unwrap();

        assert_eq!(intent.action_plan.len(), 2);
        assert_eq!(intent.action_plan[0].action_type, ActionType::Navigate);
        assert_eq!(
            intent.action_plan[0].parameter("url"),
            Some("https://example.com")
        );
        assert_eq!(intent.action_plan[1].action_type, ActionType::Extract);
        assert_eq!(intent.action_plan[1].parameter("target"), Some("screenshot"));
        assert_eq!(intent.target_domain.as_deref(), Some("example.com"));
    }

    #[test]
    fn empty_text_is_rejected() {
        assert!(matches!(compile("   "), Err(CompileError::EmptyIntent)));
    }

    #[test]
    fn oversized_text_is_rejected() {
        let text = "go to https://example.com ".repeat(1000);
        assert!(matches!(compile(&text), Err(CompileError::TooLong { .. })));
    }

    #[test]
    fn no_actionable_verb_is_unresolved() {
        let err = compile("the weather is lovely today").unwrap_err();
        assert!(matches!(err, CompileError::Unresolved(_)));
    }

    #[test]
    fn plan_is_never_empty_on_success() {
        for text in [
            "click the submit button",
            "scroll down",
            "wait 3 seconds",
            "extract the links from this page",
        ] {
            let intent = compile(text).unwrap();
            assert!(!intent.action_plan.is_empty(), "empty plan for: {}", text);
        }
    }

    #[test]
    fn search_expands_to_template() {
        let intent = compile("search for rust tutorials").unwrap();
        let actions: Vec<ActionType> =
            intent.action_plan.iter().map(|s| s.action_type).collect();
        assert_eq!(
            actions,
            vec![ActionType::Click, ActionType::Type, ActionType::Extract]
        );
        assert_eq!(
            intent.action_plan[1].parameter("text"),
            Some("rust tutorials")
        );
    }

    #[test]
    fn implicit_target_resolves_against_context() {
        let ctx = CompileContext {
            current_url: Some("https://example.com/dashboard".to_string()),
            current_domain: Some("example.com".to_string()),
        };
        let intent = IntentCompiler::new()
            .compile("open this page and scroll down", &ctx)
            .unwrap();

        assert_eq!(intent.action_plan[0].action_type, ActionType::Navigate);
        assert_eq!(
            intent.action_plan[0].parameter("url"),
            Some("https://example.com/dashboard")
        );
    }

    #[test]
    fn ambiguity_is_resolved_deterministically_with_alternatives_recorded() {
        // "click get started": click wins on position; the extract
        // interpretation of "get" is recorded, not errored.
        let first = compile("click get started").unwrap();
        let second = compile("click get started").unwrap();

        assert_eq!(first.action_plan[0].action_type, ActionType::Click);
        assert_eq!(
            first.action_plan[0].action_type,
            second.action_plan[0].action_type
        );
        assert!(!first.metadata.alternatives.is_empty());
    }

    #[test]
    fn typed_text_lands_in_parameters() {
        let intent = compile("type 'hello world' into the search box").unwrap();
        let step = &intent.action_plan[0];
        assert_eq!(step.action_type, ActionType::Type);
        assert_eq!(step.parameter("text"), Some("hello world"));
        assert_eq!(step.selector.as_deref(), Some("input[type=\"search\"]"));
    }

    #[test]
    fn entities_are_extracted_with_spans() {
        let intent =
            compile("go to https://shop.example.com and wait 2 seconds").unwrap();
        let url = intent
            .goal_entities
            .iter()
            .find(|e| e.label == "URL")
            .unwrap();
        assert_eq!(url.text, "https://shop.example.com");
        assert!(url.end > url.start);
    }

    #[test]
    fn compilation_counters_track_outcomes() {
        let compiler = IntentCompiler::new();
        let ctx = CompileContext::default();
        compiler.compile("go to https://example.com", &ctx).unwrap();
        compiler.compile("gibberish", &ctx).unwrap_err();

        assert_eq!(compiler.compilation_count(), 1);
        assert_eq!(compiler.failure_count(), 1);
    }
}
