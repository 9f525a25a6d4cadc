//! Structural perception over DOM snapshots.
//!
//! This crate owns everything that looks at the page without interpreting
//! the user's intent:
//! - Snapshot model and document handles
//! - CSS selector evaluation
//! - Visibility and interactability judges
//! - Element facts (role, accessible name, editability)
//! - Candidate collection with signature deduplication
//! - Unique selector generation

pub mod collector;
pub mod document;
pub mod errors;
pub mod facts;
pub mod generate;
pub mod judges;
pub mod model;
pub mod selector;

pub use collector::{Candidate, CandidateCollector, CollectorConfig, RelevanceRanker};
pub use document::{DocumentHandle, LiveDocument, StaticDocument};
pub use errors::{SelectorError, SelectorResult};
pub use facts::ElementFacts;
pub use generate::unique_selector;
pub use judges::{interactable, is_interactable, is_visible, visible, JudgeReport};
pub use model::{ComputedStyle, DomNode, DomSnapshot, NodeId, NodeSpec, PageSpec, Rect, Viewport};
pub use selector::{query_selector, query_selector_all, SelectorList};
