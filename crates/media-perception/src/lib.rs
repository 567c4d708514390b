//! Media Perception Engine - frame analysis for the Spectra pipeline
//!
//! This crate analyzes screenshots and DOM renders, producing:
//! - UI element detection (edge/contour heuristics)
//! - Text extraction through an injected recognizer capability
//! - Accessibility scan (contrast + text-size heuristics)
//! - Dominant color analysis (k-means)
//! - Face presence, quality scoring, and a CAPTCHA heuristic
//!
//! All stages run concurrently against the same decoded frame and degrade
//! independently; results are memoized in a bounded LRU cache keyed by a
//! content hash.

pub mod cache;
pub mod capability;
pub mod diff;
pub mod engine;
pub mod errors;
pub mod models;
pub mod stages;

// Re-exports
pub use cache::AnalysisCache;
pub use diff::compare_frames;
pub use capability::{FaceDetector, NoopFaceDetector, NoopTextRecognizer, TextRecognizer};
pub use engine::{MediaPerceptionEngine, PerceptionConfig};
pub use errors::PerceptionError;
pub use models::*;
