//! Semantic Perceiver - instruction understanding and element scoring
//!
//! This crate interprets the user's instruction and scores elements against it:
//! - Keyword extraction and whole-word matching
//! - Action verbs, their element families and conflict terms
//! - Accessibility, text, attribute, fuzzy and relevance scorers
pub mod intent;
pub mod keywords;
pub mod scoring;

// Re-exports
pub use intent::{ActionFamily, ActionVerb, IntentProfile};
pub use keywords::KeywordExtractor;
pub use scoring::{
    family_compatible, IntentRanker, PageContext, Scorer, ScoringThresholds, ScoringWeights,
};
