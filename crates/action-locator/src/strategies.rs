//! Element resolution strategies
//!
//! Each strategy looks at the same [`ResolutionContext`] and either
//! produces a gated match or steps aside for the next one in the chain.

use std::sync::Arc;

use async_trait::async_trait;
use llm_provider::{CompletionOptions, CompletionProvider};
use memory_center::PatternCache;
use perceiver_semantic::{PageContext, Scorer, ScoringThresholds};
use perceiver_structural::collector::is_candidate_node;
use perceiver_structural::{
    is_interactable, is_visible, query_selector_all, unique_selector, Candidate,
    CandidateCollector, DomSnapshot, ElementFacts, RelevanceRanker,
};
use tracing::{debug, warn};

use crate::disambiguator::{build_prompt, parse_reply, ParsedReply};
use crate::errors::{LocatorError, Result};
use crate::types::{ResolutionContext, StrategyKind, StrategyMatch, StrategyOutcome};

/// Strategy trait for element resolution
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Attempt to resolve the step using this strategy
    async fn resolve(&self, ctx: &ResolutionContext) -> Result<StrategyOutcome>;

    /// Get strategy type
    fn kind(&self) -> StrategyKind;

    /// Get strategy name
    fn name(&self) -> &'static str {
        self.kind().name()
    }
}

/// Learned pattern lookup, gated on stored confidence and a visible hit.
pub struct PatternCacheStrategy {
    cache: Arc<PatternCache>,
    min_confidence: f64,
}

impl PatternCacheStrategy {
    pub fn new(cache: Arc<PatternCache>, min_confidence: f64) -> Self {
        Self {
            cache,
            min_confidence,
        }
    }
}

#[async_trait]
impl Strategy for PatternCacheStrategy {
    async fn resolve(&self, ctx: &ResolutionContext) -> Result<StrategyOutcome> {
        let patterns = self.cache.fetch(&ctx.intent.cache_key(), &ctx.scope).await;
        if patterns.is_empty() {
            return Ok(StrategyOutcome::miss());
        }

        let mut best_rejected: Option<f64> = None;
        for pattern in &patterns {
            if pattern.confidence < self.min_confidence {
                let score = best_rejected.map_or(pattern.confidence, |b| b.max(pattern.confidence));
                best_rejected = Some(score);
                continue;
            }
            let nodes = match query_selector_all(&ctx.snapshot, &pattern.selector) {
                Ok(nodes) => nodes,
                Err(err) => {
                    debug!(pattern = %pattern.id, error = %err, "stored selector does not parse");
                    continue;
                }
            };
            if let Some(node) = nodes.into_iter().find(|n| is_visible(&ctx.snapshot, *n)) {
                return Ok(StrategyOutcome::Match(StrategyMatch {
                    node,
                    selector: Some(pattern.selector.clone()),
                    confidence: pattern.confidence,
                    pattern_id: Some(pattern.id.clone()),
                    facts: None,
                }));
            }
            debug!(pattern = %pattern.id, selector = %pattern.selector, "stored selector has no visible match");
        }

        Ok(match best_rejected {
            Some(score) => StrategyOutcome::BelowThreshold { score },
            None => StrategyOutcome::miss(),
        })
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::PatternCache
    }
}

/// Author-supplied selector hints, tried verbatim in order.
#[derive(Default)]
pub struct DirectSelectorStrategy;

#[async_trait]
impl Strategy for DirectSelectorStrategy {
    async fn resolve(&self, ctx: &ResolutionContext) -> Result<StrategyOutcome> {
        let hints: Vec<&str> = ctx
            .intent
            .selector_hints
            .iter()
            .map(|h| h.trim())
            .filter(|h| !h.is_empty())
            .collect();

        let mut invalid: Option<LocatorError> = None;
        let mut parsed_any = false;
        for hint in &hints {
            match query_selector_all(&ctx.snapshot, hint) {
                Ok(nodes) => {
                    parsed_any = true;
                    if let Some(node) = nodes.into_iter().find(|n| is_visible(&ctx.snapshot, *n)) {
                        return Ok(StrategyOutcome::Match(StrategyMatch {
                            node,
                            selector: Some(hint.to_string()),
                            confidence: 1.0,
                            pattern_id: None,
                            facts: None,
                        }));
                    }
                }
                Err(err) => {
                    warn!(selector = %hint, error = %err, "selector hint does not parse");
                    invalid = Some(err.into());
                }
            }
        }

        match invalid {
            Some(err) if !parsed_any => Err(err),
            _ => Ok(StrategyOutcome::miss()),
        }
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::DirectSelector
    }
}

/// Interactable candidate nodes with derived facts, in document order.
fn candidate_pool(snapshot: &DomSnapshot, include_text_nodes: bool) -> Vec<ElementFacts> {
    snapshot
        .nodes()
        .filter(|node| {
            is_candidate_node(node) || (include_text_nodes && !node.text.trim().is_empty())
        })
        .map(|node| node.id)
        .filter(|id| is_interactable(snapshot, *id))
        .filter_map(|id| ElementFacts::derive(snapshot, id))
        .collect()
}

/// Highest score wins; ties go to interactive tags, then document order.
fn pick_best<F>(pool: &[ElementFacts], mut score: F) -> Option<(&ElementFacts, f64)>
where
    F: FnMut(&ElementFacts) -> f64,
{
    let mut best: Option<(&ElementFacts, f64)> = None;
    for facts in pool {
        let value = score(facts);
        let better = match best {
            None => true,
            Some((current, current_score)) => {
                value > current_score
                    || (value == current_score
                        && facts.is_interactive_tag()
                        && !current.is_interactive_tag())
            }
        };
        if better {
            best = Some((facts, value));
        }
    }
    best
}

fn gate(best: Option<(&ElementFacts, f64)>, threshold: f64, strict: bool) -> StrategyOutcome {
    match best {
        Some((facts, score)) if (strict && score > threshold) || (!strict && score >= threshold) => {
            StrategyOutcome::Match(StrategyMatch::scored(facts.node, score))
        }
        Some((_, score)) if score > 0.0 => StrategyOutcome::BelowThreshold { score },
        _ => StrategyOutcome::miss(),
    }
}

/// Role, accessible name and action-family scoring.
pub struct AccessibilityStrategy {
    scorer: Arc<Scorer>,
    threshold: f64,
}

impl AccessibilityStrategy {
    pub fn new(scorer: Arc<Scorer>, thresholds: &ScoringThresholds) -> Self {
        Self {
            scorer,
            threshold: thresholds.accessibility,
        }
    }
}

#[async_trait]
impl Strategy for AccessibilityStrategy {
    async fn resolve(&self, ctx: &ResolutionContext) -> Result<StrategyOutcome> {
        if ctx.profile.primary().is_none() {
            debug!("no action verb in instruction; accessibility scoring skipped");
            return Ok(StrategyOutcome::miss());
        }
        let pool = candidate_pool(&ctx.snapshot, false);
        let page = PageContext::from_candidates(&ctx.profile, &pool);
        let best = pick_best(&pool, |facts| {
            self.scorer.accessibility(facts, &ctx.profile, &page)
        });
        Ok(gate(best, self.threshold, false))
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Accessibility
    }
}

/// Visible text scoring over candidates and text-bearing elements.
pub struct TextStrategy {
    scorer: Arc<Scorer>,
    threshold: f64,
}

impl TextStrategy {
    pub fn new(scorer: Arc<Scorer>, thresholds: &ScoringThresholds) -> Self {
        Self {
            scorer,
            threshold: thresholds.text,
        }
    }
}

#[async_trait]
impl Strategy for TextStrategy {
    async fn resolve(&self, ctx: &ResolutionContext) -> Result<StrategyOutcome> {
        let pool = candidate_pool(&ctx.snapshot, true);
        let best = pick_best(&pool, |facts| self.scorer.text(facts, &ctx.profile));
        Ok(gate(best, self.threshold, false))
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Text
    }
}

/// Keyword hits on identifying attributes.
pub struct AttributeMatchStrategy {
    scorer: Arc<Scorer>,
    threshold: f64,
}

impl AttributeMatchStrategy {
    pub fn new(scorer: Arc<Scorer>, thresholds: &ScoringThresholds) -> Self {
        Self {
            scorer,
            threshold: thresholds.attribute,
        }
    }
}

#[async_trait]
impl Strategy for AttributeMatchStrategy {
    async fn resolve(&self, ctx: &ResolutionContext) -> Result<StrategyOutcome> {
        let pool = candidate_pool(&ctx.snapshot, false);
        let best = pick_best(&pool, |facts| self.scorer.attribute(facts, &ctx.profile));
        Ok(gate(best, self.threshold, false))
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::AttributeMatch
    }
}

/// Keyword coverage over combined element text.
pub struct FuzzyKeywordStrategy {
    scorer: Arc<Scorer>,
    threshold: f64,
}

impl FuzzyKeywordStrategy {
    pub fn new(scorer: Arc<Scorer>, thresholds: &ScoringThresholds) -> Self {
        Self {
            scorer,
            threshold: thresholds.fuzzy,
        }
    }
}

#[async_trait]
impl Strategy for FuzzyKeywordStrategy {
    async fn resolve(&self, ctx: &ResolutionContext) -> Result<StrategyOutcome> {
        let pool = candidate_pool(&ctx.snapshot, false);
        let best = pick_best(&pool, |facts| self.scorer.fuzzy(facts, &ctx.profile));
        Ok(gate(best, self.threshold, true))
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::FuzzyKeyword
    }
}

/// Last resort: let an external model pick among ranked candidates.
pub struct AiStrategy {
    provider: Arc<dyn CompletionProvider>,
    options: CompletionOptions,
    collector: CandidateCollector,
    scorer: Arc<Scorer>,
}

impl AiStrategy {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        options: CompletionOptions,
        collector: CandidateCollector,
        scorer: Arc<Scorer>,
    ) -> Self {
        Self {
            provider,
            options,
            collector,
            scorer,
        }
    }

    /// Find the picked candidate again in `fresh`.
    ///
    /// Node ids are arena positions, so a re-render can put a different
    /// element at the same id. A node only counts as the same element when
    /// its signature, accessible name and text all agree. The original
    /// position wins ties; otherwise the match must be unique.
    fn reconfirm(
        &self,
        fresh: &DomSnapshot,
        candidate: &Candidate,
    ) -> Option<(ElementFacts, String)> {
        let wanted = self.collector.signature(&candidate.facts);
        let mut matches: Vec<ElementFacts> = fresh
            .nodes()
            .filter(|node| is_candidate_node(node))
            .map(|node| node.id)
            .filter(|node| is_visible(fresh, *node))
            .filter_map(|node| ElementFacts::derive(fresh, node))
            .filter(|facts| {
                self.collector.signature(facts) == wanted
                    && facts.accessible_name == candidate.facts.accessible_name
                    && facts.text == candidate.facts.text
            })
            .collect();

        let facts = match matches.iter().position(|f| f.node == candidate.node) {
            Some(index) => matches.swap_remove(index),
            None if matches.len() == 1 => matches.pop()?,
            None => return None,
        };
        let selector = unique_selector(fresh, facts.node)?;
        Some((facts, selector))
    }
}

#[async_trait]
impl Strategy for AiStrategy {
    async fn resolve(&self, ctx: &ResolutionContext) -> Result<StrategyOutcome> {
        let ranker = self.scorer.ranker(&ctx.profile);
        let candidates = self
            .collector
            .collect(&ctx.snapshot, Some(&ranker as &dyn RelevanceRanker));
        if candidates.is_empty() {
            debug!("no candidates to offer the model");
            return Ok(StrategyOutcome::miss());
        }

        let prompt = build_prompt(ctx, &candidates);
        debug!(
            provider = self.provider.name(),
            candidates = candidates.len(),
            "asking model to disambiguate"
        );
        let reply = self.provider.complete(&prompt, &self.options).await?;

        if ctx.is_stale() {
            debug!("workflow advanced while the model was thinking; reply discarded");
            return Ok(StrategyOutcome::Stale);
        }

        let verdict = match parse_reply(&reply) {
            ParsedReply::Verdict(verdict) => verdict,
            ParsedReply::Unparsed { guidance } => {
                debug!("model reply was not structured; using it as guidance");
                return Ok(StrategyOutcome::Miss {
                    guidance: Some(guidance),
                });
            }
        };

        let guidance = Some(verdict.guidance_or_default());
        let Some(candidate_id) = verdict.candidate_id.as_deref() else {
            return Ok(StrategyOutcome::Miss { guidance });
        };
        let Some(candidate) = candidates.iter().find(|c| c.id == candidate_id) else {
            debug!(candidate = candidate_id, "model picked an unknown candidate");
            return Ok(StrategyOutcome::Miss { guidance });
        };

        let fresh = ctx.document.snapshot();
        let Some((facts, selector)) = self.reconfirm(&fresh, candidate) else {
            debug!(candidate = candidate_id, "picked element vanished before it could be used");
            return Ok(StrategyOutcome::Miss { guidance });
        };

        Ok(StrategyOutcome::Match(
            StrategyMatch::scored(candidate.node, verdict.confidence).confirmed(facts, selector),
        ))
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Ai
    }
}
