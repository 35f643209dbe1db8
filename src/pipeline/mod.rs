//! Classification pipeline.
//!
//! Every fetched post flows through:
//! 1. `normalize()`: lower-case, `ё` → `е`
//! 2. `Classifier::classify()`: city, categories, event, exclusions
//! 3. `DecisionEngine::decide()`: forward or skip
//! 4. `format::build_payload()`: text handed to the delivery port
//!
//! Nothing in here performs I/O.

pub mod classifier;
pub mod decision;
pub mod format;
pub mod normalize;
pub mod pattern;
pub mod rules;
pub mod types;

pub use classifier::Classifier;
pub use decision::DecisionEngine;
pub use types::{ClassificationResult, Decision, Message, SkipReason, SourceRef};
