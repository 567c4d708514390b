//! Named validation signals and the agreement rule
//!
//! The agreement function is pure and unit-testable in isolation from the
//! browser: it sees only scores and thresholds.

use serde::{Deserialize, Serialize};

/// The three independent success signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Dom,
    Visual,
    Network,
}

impl SignalKind {
    pub fn name(&self) -> &'static str {
        match self {
            SignalKind::Dom => "dom",
            SignalKind::Visual => "visual",
            SignalKind::Network => "network",
        }
    }
}

/// One signal's scored opinion about a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalScore {
    pub kind: SignalKind,

    /// Evidence strength in [0, 1]
    pub score: f64,

    /// The signal passes when `score >= threshold`
    pub threshold: f64,

    /// Human-readable evidence summary
    pub detail: String,
}

impl SignalScore {
    pub fn new(kind: SignalKind, score: f64, threshold: f64, detail: impl Into<String>) -> Self {
        Self {
            kind,
            score: score.clamp(0.0, 1.0),
            threshold,
            detail: detail.into(),
        }
    }

    /// A degraded signal: input unavailable, never counts toward success.
    pub fn unavailable(kind: SignalKind, threshold: f64, reason: impl Into<String>) -> Self {
        Self {
            kind,
            score: 0.0,
            threshold,
            detail: format!("signal unavailable: {}", reason.into()),
        }
    }

    pub fn passed(&self) -> bool {
        self.score >= self.threshold
    }
}

/// Outcome of applying the agreement rule to a set of signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub success: bool,

    /// Mean of all signal scores, monotone in each signal
    pub confidence: f64,

    /// On failure, leads with the lowest-scoring signal
    pub reasons: Vec<String>,
}

/// Minimum number of passing signals for success.
pub const AGREEMENT_QUORUM: usize = 2;

/// The anti-false-positive rule: success only when at least two signals
/// clear their own thresholds. A single passing heuristic (e.g. the DOM
/// changed for unrelated reasons) is never sufficient.
pub fn agreement(signals: &[SignalScore]) -> Verdict {
    let passing = signals.iter().filter(|s| s.passed()).count();
    let confidence = if signals.is_empty() {
        0.0
    } else {
        signals.iter().map(|s| s.score).sum::<f64>() / signals.len() as f64
    };

    if passing >= AGREEMENT_QUORUM {
        let reasons = signals
            .iter()
            .filter(|s| s.passed())
            .map(|s| format!("{}: {}", s.kind.name(), s.detail))
            .collect();
        return Verdict {
            success: true,
            confidence,
            reasons,
        };
    }

    // Name the weakest signal first so the terminal error leads with it.
    let mut ranked: Vec<&SignalScore> = signals.iter().collect();
    ranked.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal));
    let reasons = ranked
        .iter()
        .map(|s| format!("{}: {}", s.kind.name(), s.detail))
        .collect();

    Verdict {
        success: false,
        confidence,
        reasons,
    }
}
