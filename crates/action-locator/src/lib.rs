//! Multi-strategy element resolution
//!
//! This crate turns a workflow step into a concrete page element with:
//! - Learned pattern lookup (consulted first)
//! - Author-supplied selector hints
//! - Accessibility and text-content scoring, confidence-gated
//! - Optional attribute and fuzzy keyword matching
//! - AI disambiguation over ranked candidates as the last resort
//! - Manual teach-in and success/failure feedback

pub mod disambiguator;
pub mod errors;
pub mod resolver;
pub mod strategies;
pub mod types;

pub use disambiguator::{parse_reply, AiVerdict, ParsedReply};
pub use errors::*;
pub use resolver::*;
pub use strategies::*;
pub use types::*;
