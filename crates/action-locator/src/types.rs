//! Core types for locator system

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use guidepath_core_types::{PatternScope, ResolutionTicket, StepIntent, WorkflowContext};
use perceiver_semantic::IntentProfile;
use perceiver_structural::{DocumentHandle, DomSnapshot, ElementFacts, NodeId};
use serde::{Deserialize, Serialize};

use crate::errors::LocatorError;

/// Locator strategy enumeration, in the order they may appear in a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Learned pattern lookup
    PatternCache,
    /// Author-supplied selector hints
    DirectSelector,
    /// Role, accessible name and action-family scoring
    Accessibility,
    /// Visible text scoring
    Text,
    /// Identifying attribute keyword match
    AttributeMatch,
    /// Keyword coverage over combined text
    FuzzyKeyword,
    /// External model disambiguation
    Ai,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 7] = [
        StrategyKind::PatternCache,
        StrategyKind::DirectSelector,
        StrategyKind::Accessibility,
        StrategyKind::Text,
        StrategyKind::AttributeMatch,
        StrategyKind::FuzzyKeyword,
        StrategyKind::Ai,
    ];

    /// Get strategy name as string
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::PatternCache => "pattern_cache",
            StrategyKind::DirectSelector => "direct_selector",
            StrategyKind::Accessibility => "accessibility",
            StrategyKind::Text => "text",
            StrategyKind::AttributeMatch => "attribute_match",
            StrategyKind::FuzzyKeyword => "fuzzy_keyword",
            StrategyKind::Ai => "ai",
        }
    }

    /// Default fallback order; attribute and fuzzy matching are opt-in.
    pub fn default_chain() -> Vec<StrategyKind> {
        vec![
            StrategyKind::PatternCache,
            StrategyKind::DirectSelector,
            StrategyKind::Accessibility,
            StrategyKind::Text,
            StrategyKind::Ai,
        ]
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = LocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        StrategyKind::ALL
            .into_iter()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| LocatorError::Internal(format!("unknown strategy '{s}'")))
    }
}

/// What a caller needs to highlight or act on the resolved element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRef {
    pub node: NodeId,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub accessible_name: String,
    /// Visible text, truncated.
    pub text: String,
}

impl ElementRef {
    const TEXT_LIMIT: usize = 80;

    pub fn from_facts(facts: &ElementFacts) -> Self {
        Self {
            node: facts.node,
            tag: facts.tag.clone(),
            role: facts.role.clone(),
            accessible_name: facts.accessible_name.clone(),
            text: truncate_chars(&facts.text, Self::TEXT_LIMIT),
        }
    }
}

/// Outcome of one resolution call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolutionResult {
    NotFound {
        /// Free-text help from the AI strategy, if it offered any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        guidance: Option<String>,
    },
    Found {
        element: ElementRef,
        selector: String,
        strategy: StrategyKind,
        /// Strategy-local score; only comparable within one strategy.
        confidence: f64,
        /// Learned pattern backing this result, when one was hit or recorded.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern_id: Option<String>,
    },
}

impl ResolutionResult {
    pub fn not_found() -> Self {
        ResolutionResult::NotFound { guidance: None }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, ResolutionResult::Found { .. })
    }

    pub fn selector(&self) -> Option<&str> {
        match self {
            ResolutionResult::Found { selector, .. } => Some(selector),
            ResolutionResult::NotFound { .. } => None,
        }
    }

    pub fn strategy(&self) -> Option<StrategyKind> {
        match self {
            ResolutionResult::Found { strategy, .. } => Some(*strategy),
            ResolutionResult::NotFound { .. } => None,
        }
    }

    pub fn confidence(&self) -> Option<f64> {
        match self {
            ResolutionResult::Found { confidence, .. } => Some(*confidence),
            ResolutionResult::NotFound { .. } => None,
        }
    }

    pub fn guidance(&self) -> Option<&str> {
        match self {
            ResolutionResult::NotFound { guidance } => guidance.as_deref(),
            ResolutionResult::Found { .. } => None,
        }
    }

    pub fn pattern_id(&self) -> Option<&str> {
        match self {
            ResolutionResult::Found { pattern_id, .. } => pattern_id.as_deref(),
            ResolutionResult::NotFound { .. } => None,
        }
    }
}

/// How one strategy fared during a resolution pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Matched { confidence: f64 },
    Missed,
    BelowThreshold { score: f64 },
    Fault { reason: String },
    Stale,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyAttempt {
    pub strategy: StrategyKind,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionReport {
    pub result: ResolutionResult,
    pub attempts: Vec<StrategyAttempt>,
}

/// One resolution request: the step, the document and optional context.
#[derive(Clone)]
pub struct ResolveRequest {
    pub intent: StepIntent,
    pub document: Arc<dyn DocumentHandle>,
    pub context: Option<WorkflowContext>,
    pub scope: PatternScope,
    /// Captured before the request starts; results are discarded once stale.
    pub ticket: Option<ResolutionTicket>,
}

impl ResolveRequest {
    pub fn new(intent: StepIntent, document: Arc<dyn DocumentHandle>) -> Self {
        Self {
            intent,
            document,
            context: None,
            scope: PatternScope::global(),
            ticket: None,
        }
    }

    pub fn with_context(mut self, context: WorkflowContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_scope(mut self, scope: PatternScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_ticket(mut self, ticket: ResolutionTicket) -> Self {
        self.ticket = Some(ticket);
        self
    }
}

impl fmt::Debug for ResolveRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolveRequest")
            .field("intent", &self.intent)
            .field("url", &self.document.url())
            .field("scope", &self.scope)
            .finish()
    }
}

/// Per-pass state shared by every strategy in the chain.
pub struct ResolutionContext {
    pub intent: StepIntent,
    pub profile: IntentProfile,
    pub document: Arc<dyn DocumentHandle>,
    /// Snapshot taken when the pass started.
    pub snapshot: Arc<DomSnapshot>,
    pub workflow: Option<WorkflowContext>,
    pub scope: PatternScope,
    pub ticket: Option<ResolutionTicket>,
}

impl ResolutionContext {
    pub fn new(request: ResolveRequest) -> Self {
        let snapshot = request.document.snapshot();
        Self {
            profile: IntentProfile::analyze(&request.intent),
            intent: request.intent,
            document: request.document,
            snapshot,
            workflow: request.context,
            scope: request.scope,
            ticket: request.ticket,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.ticket.as_ref().map_or(false, |ticket| !ticket.is_current())
    }
}

/// Raw result of a single strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    Match(StrategyMatch),
    Miss { guidance: Option<String> },
    BelowThreshold { score: f64 },
    Stale,
}

impl StrategyOutcome {
    pub fn miss() -> Self {
        StrategyOutcome::Miss { guidance: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyMatch {
    pub node: NodeId,
    /// Selector that produced the match, if the strategy worked from one.
    pub selector: Option<String>,
    pub confidence: f64,
    pub pattern_id: Option<String>,
    /// Facts read from a fresher snapshot than the one the resolution
    /// started with; the resolver prefers these over its own.
    pub facts: Option<ElementFacts>,
}

impl StrategyMatch {
    pub fn scored(node: NodeId, confidence: f64) -> Self {
        Self {
            node,
            selector: None,
            confidence,
            pattern_id: None,
            facts: None,
        }
    }

    /// Pin the match to facts and a selector taken from a re-read document.
    pub fn confirmed(mut self, facts: ElementFacts, selector: String) -> Self {
        self.node = facts.node;
        self.facts = Some(facts);
        self.selector = Some(selector);
        self
    }
}

pub(crate) fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_names_round_trip() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.name().parse::<StrategyKind>().unwrap(), kind);
        }
        assert_eq!("Pattern-Cache".parse::<StrategyKind>().unwrap(), StrategyKind::PatternCache);
        assert!("telepathy".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn default_chain_leaves_optional_strategies_out() {
        let chain = StrategyKind::default_chain();
        assert_eq!(chain.first(), Some(&StrategyKind::PatternCache));
        assert_eq!(chain.last(), Some(&StrategyKind::Ai));
        assert!(!chain.contains(&StrategyKind::FuzzyKeyword));
    }

    #[test]
    fn result_serializes_with_status_tag() {
        let json = serde_json::to_value(ResolutionResult::not_found()).unwrap();
        assert_eq!(json, serde_json::json!({"status": "not_found"}));

        let attempt = StrategyAttempt {
            strategy: StrategyKind::Text,
            outcome: AttemptOutcome::BelowThreshold { score: 4.0 },
            elapsed_ms: 1,
        };
        let json = serde_json::to_value(&attempt).unwrap();
        assert_eq!(json["outcome"], "below_threshold");
        assert_eq!(json["score"], 4.0);
    }

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 5), "hi");
    }
}
