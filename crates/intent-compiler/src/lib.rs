//! Intent Compiler - free-form text to ordered action plans
//!
//! A pure function of the instruction text plus the caller-supplied
//! browsing context: no live browser state, no side effects. Verb
//! classification and entity extraction run off static pattern tables;
//! ambiguous targets are resolved deterministically with the losing
//! candidates recorded in metadata.

pub mod compiler;
pub mod errors;
pub mod models;
pub mod patterns;

pub use compiler::{CompileContext, IntentCompiler};
pub use errors::CompileError;
pub use models::{Entity, Intent, IntentMetadata};
