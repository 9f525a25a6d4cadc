//! Shared primitives for the guidepath engine.
//!
//! Step intents, pattern scopes and the step clock live here so every
//! crate in the workspace agrees on how a step is described and when a
//! resolution result has gone stale.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

/// Errors raised while parsing shared primitives.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid scope '{0}': expected 'page' or 'company/page'")]
    InvalidScope(String),
}

/// What the author wants the user to do in one workflow step.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepIntent {
    pub id: String,
    pub instruction: String,
    #[cfg_attr(feature = "serde-full", serde(default))]
    pub target: Option<String>,
    #[cfg_attr(feature = "serde-full", serde(default))]
    pub selector_hints: Vec<String>,
}

impl StepIntent {
    pub fn new(id: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            instruction: instruction.into(),
            target: None,
            selector_hints: Vec::new(),
        }
    }

    /// Build an intent with a generated id, for ad-hoc resolutions.
    pub fn adhoc(instruction: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4().to_string(), instruction)
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_hint(mut self, selector: impl Into<String>) -> Self {
        self.selector_hints.push(selector.into());
        self
    }

    /// Normalized instruction used as the pattern cache key.
    pub fn cache_key(&self) -> String {
        normalize_intent(&self.instruction)
    }

    pub fn target(&self) -> Option<&str> {
        self.target
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// Lowercase, trim and collapse whitespace.
pub fn normalize_intent(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Context under which a learned pattern is valid.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternScope {
    #[cfg_attr(feature = "serde-full", serde(default))]
    pub company: Option<String>,
    pub page: String,
}

impl PatternScope {
    pub const ANY_PAGE: &'static str = "*";

    pub fn new(company: Option<String>, page: impl Into<String>) -> Self {
        Self {
            company: company.filter(|value| !value.trim().is_empty()),
            page: page.into(),
        }
    }

    pub fn global() -> Self {
        Self::new(None, Self::ANY_PAGE)
    }

    pub fn for_page(page: impl Into<String>) -> Self {
        Self::new(None, page)
    }

    /// Parse `page` or `company/page`.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(CoreError::InvalidScope(raw.to_string()));
        }
        match raw.split_once('/') {
            Some((company, page)) if !page.trim().is_empty() => Ok(Self::new(
                Some(company.trim().to_string()),
                page.trim().to_string(),
            )),
            Some(_) => Err(CoreError::InvalidScope(raw.to_string())),
            None => Ok(Self::for_page(raw)),
        }
    }

    /// Stable key used by stores and the backend query string.
    pub fn key(&self) -> String {
        match &self.company {
            Some(company) => format!("{company}/{}", self.page),
            None => self.page.clone(),
        }
    }
}

impl Default for PatternScope {
    fn default() -> Self {
        Self::global()
    }
}

impl fmt::Display for PatternScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Where the current step sits inside its workflow.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkflowContext {
    #[cfg_attr(feature = "serde-full", serde(default))]
    pub workflow_name: Option<String>,
    #[cfg_attr(feature = "serde-full", serde(default))]
    pub previous_steps: Vec<String>,
    pub current_step: String,
    #[cfg_attr(feature = "serde-full", serde(default))]
    pub next_step: Option<String>,
}

/// Monotonic counter bumped whenever the workflow moves to another step.
///
/// Clones share the same counter.
#[derive(Clone, Debug, Default)]
pub struct StepClock {
    generation: Arc<AtomicU64>,
}

impl StepClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Move to the next generation and return it.
    pub fn advance(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn ticket(&self, step_id: impl Into<String>) -> ResolutionTicket {
        ResolutionTicket {
            step_id: step_id.into(),
            generation: self.current(),
            clock: self.clone(),
        }
    }
}

/// Snapshot of the step clock taken when a resolution starts.
#[derive(Clone, Debug)]
pub struct ResolutionTicket {
    step_id: String,
    generation: u64,
    clock: StepClock,
}

impl ResolutionTicket {
    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// False once the workflow has moved on since the ticket was issued.
    pub fn is_current(&self) -> bool {
        self.clock.current() == self.generation
    }
}
