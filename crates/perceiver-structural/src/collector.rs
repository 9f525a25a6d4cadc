//! Candidate enumeration and deduplication.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::facts::ElementFacts;
use crate::judges;
use crate::model::{DomNode, DomSnapshot, NodeId};

/// Tags collected regardless of attributes.
const CANDIDATE_TAGS: &[&str] = &["button", "a", "input", "select", "textarea", "summary"];

/// Attributes that pull any other element into the candidate pool.
const CANDIDATE_ATTRIBUTES: &[&str] = &[
    "contenteditable",
    "role",
    "tabindex",
    "onclick",
    "aria-label",
];

/// Equivalent to `button, a, input, select, textarea, summary,
/// [contenteditable], [role], [tabindex], [onclick], [aria-label]`.
pub fn is_candidate_node(node: &DomNode) -> bool {
    CANDIDATE_TAGS.contains(&node.tag.as_str())
        || CANDIDATE_ATTRIBUTES.iter().any(|attr| node.has_attr(attr))
}

/// Ranks a candidate before deduplication and capping.
pub trait RelevanceRanker {
    fn relevance(&self, facts: &ElementFacts) -> f64;
}

impl<F> RelevanceRanker for F
where
    F: Fn(&ElementFacts) -> f64,
{
    fn relevance(&self, facts: &ElementFacts) -> f64 {
        self(facts)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// `candidate_<n>`, stable within one collection pass.
    pub id: String,
    pub node: NodeId,
    pub facts: ElementFacts,
    pub relevance: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub max_candidates: usize,
    pub signature_text_len: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_candidates: 30,
            signature_text_len: 30,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CandidateCollector {
    config: CollectorConfig,
}

impl CandidateCollector {
    pub fn new(config: CollectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Visible candidates, ranked when a ranker is supplied, deduplicated by
    /// structural signature and capped.
    ///
    /// An empty result is a normal outcome.
    pub fn collect(
        &self,
        snapshot: &DomSnapshot,
        ranker: Option<&dyn RelevanceRanker>,
    ) -> Vec<Candidate> {
        let mut pool: Vec<(ElementFacts, f64)> = snapshot
            .nodes()
            .filter(|node| is_candidate_node(node))
            .map(|node| node.id)
            .filter(|node| judges::is_visible(snapshot, *node))
            .filter_map(|node| ElementFacts::derive(snapshot, node))
            .map(|facts| {
                let score = ranker.map_or(0.0, |r| r.relevance(&facts));
                (facts, score)
            })
            .collect();
        let visible = pool.len();

        if ranker.is_some() {
            // Stable sort keeps document order among equal scores.
            pool.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        }

        let mut seen = HashSet::new();
        let candidates: Vec<Candidate> = pool
            .into_iter()
            .filter(|(facts, _)| seen.insert(self.signature(facts)))
            .take(self.config.max_candidates)
            .enumerate()
            .map(|(index, (facts, relevance))| Candidate {
                id: format!("candidate_{index}"),
                node: facts.node,
                facts,
                relevance,
            })
            .collect();

        debug!(
            visible,
            kept = candidates.len(),
            "collected resolution candidates"
        );
        candidates
    }

    /// `tag|aria-label|id|name` when any identifying attribute exists,
    /// otherwise `tag|<truncated text>`.
    pub fn signature(&self, facts: &ElementFacts) -> String {
        let aria = facts.aria_label.as_deref().unwrap_or("");
        let id = facts.element_id.as_deref().unwrap_or("");
        let name = facts.name.as_deref().unwrap_or("");
        if !aria.is_empty() || !id.is_empty() || !name.is_empty() {
            format!("{}|{aria}|{id}|{name}", facts.tag)
        } else {
            let text: String = facts
                .text
                .chars()
                .take(self.config.signature_text_len)
                .collect();
            format!("{}|{text}", facts.tag)
        }
    }
}
