//! Static pattern tables for verb classification and entity extraction
//!
//! Compiled once via `once_cell`; the verb table covers the closed action
//! set plus two composite templates (screenshot capture and search) that
//! expand to multi-step plans.

use once_cell::sync::Lazy;
use regex::Regex;

use spectra_core_types::ActionType;

/// One verb class mapped to an action type.
pub struct VerbPattern {
    pub action: ActionType,
    pub regex: Regex,
    pub confidence: f64,
}

/// Verb classes in priority order. Confidence mirrors pattern specificity:
/// exact action verbs score 0.9, looser synonyms 0.7.
pub static VERB_PATTERNS: Lazy<Vec<VerbPattern>> = Lazy::new(|| {
    vec![
        VerbPattern {
            action: ActionType::Navigate,
            regex: Regex::new(r"(?i)\b(?:go to|navigate to|visit|browse to|open|load)\s+(\S+)")
                .unwrap(),
            confidence: 0.9,
        },
        VerbPattern {
            action: ActionType::Click,
            regex: Regex::new(r"(?i)\b(?:click|press|tap)\s+(?:on\s+)?(.+)").unwrap(),
            confidence: 0.9,
        },
        VerbPattern {
            action: ActionType::Click,
            regex: Regex::new(r"(?i)\b(?:select|choose|activate)\s+(.+)").unwrap(),
            confidence: 0.7,
        },
        VerbPattern {
            action: ActionType::Type,
            regex: Regex::new(r"(?i)\b(?:type|enter|input|fill in|fill)\s+(.+)").unwrap(),
            confidence: 0.9,
        },
        VerbPattern {
            action: ActionType::Scroll,
            regex: Regex::new(r"(?i)\bscroll\b(?:\s+(up|down))?").unwrap(),
            confidence: 0.9,
        },
        VerbPattern {
            action: ActionType::Extract,
            regex: Regex::new(r"(?i)\b(?:extract|scrape|collect|gather|harvest)\s+(.+)").unwrap(),
            confidence: 0.9,
        },
        VerbPattern {
            action: ActionType::Extract,
            regex: Regex::new(r"(?i)\bget\s+(.+)").unwrap(),
            confidence: 0.7,
        },
        VerbPattern {
            action: ActionType::Wait,
            regex: Regex::new(
                r"(?i)\b(?:wait|pause)(?:\s+for)?(?:\s+(\d+(?:\.\d+)?)\s*(?:seconds?|secs?|s)?)?",
            )
            .unwrap(),
            confidence: 0.9,
        },
        VerbPattern {
            action: ActionType::Wait,
            regex: Regex::new(r"(?i)\b(?:monitor|watch|observe)\s+(.+)").unwrap(),
            confidence: 0.7,
        },
    ]
});

/// "take a screenshot" is an extract step in disguise.
pub static SCREENSHOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:take|capture|grab)\s+(?:a\s+)?screenshot\b").unwrap());

/// "search for X" expands to the click/type/extract search template.
pub static SEARCH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:search for|search|look for|find)\s+(.+)").unwrap());

/// Clause separators for compound instructions.
pub static CLAUSE_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+(?:and then|and|then)\s+|\s*[;,]\s*").unwrap());

/// Entity classes extracted alongside verbs.
pub static ENTITY_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("URL", Regex::new(r"https?://[^\s]+").unwrap()),
        (
            "EMAIL",
            Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap(),
        ),
        ("PHONE", Regex::new(r"\+?[1-9][\d\s\-()]{7,14}\d").unwrap()),
        ("DATE", Regex::new(r"\d{1,2}[-/]\d{1,2}[-/]\d{2,4}").unwrap()),
        (
            "TIME",
            Regex::new(r"\d{1,2}:\d{2}(?::\d{2})?(?:\s*[AaPp][Mm])?").unwrap(),
        ),
        ("PRICE", Regex::new(r"\$\d+(?:\.\d{2})?").unwrap()),
        (
            "QUANTITY",
            Regex::new(r"\b\d+\s*(?:items?|pieces?|units?)\b").unwrap(),
        ),
    ]
});

/// Phrases resolving to the current navigation context.
pub static IMPLICIT_TARGET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:this page|the page|current page|here)\b").unwrap());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigate_verbs_match() {
        let pattern = &VERB_PATTERNS[0];
        assert_eq!(pattern.action, ActionType::Navigate);
        for text in [
            "go to https://example.com",
            "Navigate to https://example.com",
            "visit example.com",
            "open the dashboard",
        ] {
            assert!(pattern.regex.is_match(text), "should match: {}", text);
        }
    }

    #[test]
    fn screenshot_phrase_matches() {
        assert!(SCREENSHOT.is_match("take a screenshot"));
        assert!(SCREENSHOT.is_match("please capture a screenshot now"));
        assert!(!SCREENSHOT.is_match("take a look"));
    }

    #[test]
    fn clause_split_handles_conjunctions() {
        let clauses: Vec<&str> = CLAUSE_SPLIT
            .split("go to https://example.com and take a screenshot")
            .collect();
        assert_eq!(clauses.len(), 2);
        assert!(clauses[0].contains("example.com"));
        assert!(clauses[1].contains("screenshot"));
    }

    #[test]
    fn url_entity_matches() {
        let (label, regex) = &ENTITY_PATTERNS[0];
        assert_eq!(*label, "URL");
        let m = regex.find("go to https://example.com/path now").unwrap();
        assert_eq!(m.as_str(), "https://example.com/path");
    }
}
