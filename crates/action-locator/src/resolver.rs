//! Element resolver with fallback chain orchestration

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use guidepath_core_types::{PatternScope, StepIntent};
use llm_provider::{CompletionOptions, CompletionProvider};
use memory_center::{LearnedPattern, PatternCache, SOURCE_MANUAL};
use perceiver_semantic::{Scorer, ScoringThresholds, ScoringWeights};
use perceiver_structural::{
    query_selector_all, unique_selector, CandidateCollector, CollectorConfig, DocumentHandle,
    ElementFacts, NodeId,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::{LocatorError, Result};
use crate::strategies::*;
use crate::types::*;

/// Everything needed to assemble a strategy chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorSettings {
    pub order: Vec<StrategyKind>,
    pub thresholds: ScoringThresholds,
    pub weights: ScoringWeights,
    /// Candidates offered to the model.
    pub max_candidates: usize,
    pub ai_options: CompletionOptions,
}

impl Default for LocatorSettings {
    fn default() -> Self {
        Self {
            order: StrategyKind::default_chain(),
            thresholds: ScoringThresholds::default(),
            weights: ScoringWeights::default(),
            max_candidates: CollectorConfig::default().max_candidates,
            ai_options: CompletionOptions::default(),
        }
    }
}

/// Resolution entry point: runs the chain in order and closes the
/// learning loop through the pattern cache.
pub struct ElementLocator {
    chain: Vec<Arc<dyn Strategy>>,
    cache: Arc<PatternCache>,
}

impl ElementLocator {
    /// Build the chain described by `settings`.
    ///
    /// The AI strategy is left out when no provider is supplied.
    pub fn new(
        settings: &LocatorSettings,
        cache: Arc<PatternCache>,
        provider: Option<Arc<dyn CompletionProvider>>,
    ) -> Self {
        let scorer = Arc::new(Scorer::new(settings.weights.clone()));
        let thresholds = &settings.thresholds;
        let mut chain: Vec<Arc<dyn Strategy>> = Vec::with_capacity(settings.order.len());

        for kind in &settings.order {
            let strategy: Arc<dyn Strategy> = match kind {
                StrategyKind::PatternCache => Arc::new(PatternCacheStrategy::new(
                    Arc::clone(&cache),
                    thresholds.min_pattern_confidence,
                )),
                StrategyKind::DirectSelector => Arc::new(DirectSelectorStrategy),
                StrategyKind::Accessibility => {
                    Arc::new(AccessibilityStrategy::new(Arc::clone(&scorer), thresholds))
                }
                StrategyKind::Text => Arc::new(TextStrategy::new(Arc::clone(&scorer), thresholds)),
                StrategyKind::AttributeMatch => {
                    Arc::new(AttributeMatchStrategy::new(Arc::clone(&scorer), thresholds))
                }
                StrategyKind::FuzzyKeyword => {
                    Arc::new(FuzzyKeywordStrategy::new(Arc::clone(&scorer), thresholds))
                }
                StrategyKind::Ai => match provider.as_ref() {
                    Some(provider) => Arc::new(AiStrategy::new(
                        Arc::clone(provider),
                        settings.ai_options.clone(),
                        CandidateCollector::new(CollectorConfig {
                            max_candidates: settings.max_candidates,
                            ..CollectorConfig::default()
                        }),
                        Arc::clone(&scorer),
                    )),
                    None => {
                        info!("no completion provider configured; AI strategy disabled");
                        continue;
                    }
                },
            };
            chain.push(strategy);
        }

        Self { chain, cache }
    }

    /// Use an explicit chain, e.g. custom strategies in tests.
    pub fn from_strategies(chain: Vec<Arc<dyn Strategy>>, cache: Arc<PatternCache>) -> Self {
        Self { chain, cache }
    }

    pub fn chain(&self) -> Vec<StrategyKind> {
        self.chain.iter().map(|s| s.kind()).collect()
    }

    pub fn cache(&self) -> &Arc<PatternCache> {
        &self.cache
    }

    /// Resolve one step; expected failures come back as `NotFound`.
    pub async fn resolve(&self, request: ResolveRequest) -> Result<ResolutionResult> {
        Ok(self.resolve_detailed(request).await?.result)
    }

    /// Like [`resolve`](Self::resolve), with a per-strategy attempt log.
    pub async fn resolve_detailed(&self, request: ResolveRequest) -> Result<ResolutionReport> {
        if self.chain.is_empty() {
            return Err(LocatorError::Internal("strategy chain is empty".to_string()));
        }

        let ctx = ResolutionContext::new(request);
        info!(
            step = %ctx.intent.id,
            instruction = %ctx.intent.instruction,
            url = %ctx.snapshot.url,
            "resolving step"
        );

        let mut attempts = Vec::with_capacity(self.chain.len());
        let mut guidance: Option<String> = None;

        for strategy in &self.chain {
            let kind = strategy.kind();
            let started = Instant::now();
            let outcome = AssertUnwindSafe(strategy.resolve(&ctx)).catch_unwind().await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            let mut attempt = |outcome: AttemptOutcome| {
                attempts.push(StrategyAttempt {
                    strategy: kind,
                    outcome,
                    elapsed_ms,
                })
            };

            let outcome = match outcome {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(err)) => {
                    warn!(strategy = kind.name(), error = %err, "strategy failed");
                    attempt(AttemptOutcome::Fault {
                        reason: err.to_string(),
                    });
                    continue;
                }
                Err(payload) => {
                    let fault = LocatorError::StrategyFault {
                        strategy: kind.name().to_string(),
                        reason: panic_message(payload.as_ref()),
                    };
                    warn!(strategy = kind.name(), error = %fault, "strategy panicked");
                    attempt(AttemptOutcome::Fault {
                        reason: fault.to_string(),
                    });
                    continue;
                }
            };

            match outcome {
                StrategyOutcome::Match(mut found) => {
                    let facts = found
                        .facts
                        .take()
                        .or_else(|| ElementFacts::derive(&ctx.snapshot, found.node));
                    let Some(facts) = facts else {
                        debug!(strategy = kind.name(), "matched node missing from snapshot");
                        attempt(AttemptOutcome::Missed);
                        continue;
                    };
                    let selector = found
                        .selector
                        .clone()
                        .or_else(|| unique_selector(&ctx.snapshot, found.node));
                    let Some(selector) = selector else {
                        debug!(strategy = kind.name(), "no selector for matched node");
                        attempt(AttemptOutcome::Missed);
                        continue;
                    };
                    attempt(AttemptOutcome::Matched {
                        confidence: found.confidence,
                    });

                    let pattern_id = if kind == StrategyKind::PatternCache {
                        found.pattern_id
                    } else {
                        let pattern = self
                            .cache
                            .record_synced(
                                &ctx.intent.cache_key(),
                                &selector,
                                &ctx.scope,
                                kind.name(),
                            )
                            .await;
                        Some(pattern.id)
                    };

                    info!(
                        strategy = kind.name(),
                        confidence = found.confidence,
                        selector = %selector,
                        "step resolved"
                    );
                    return Ok(ResolutionReport {
                        result: ResolutionResult::Found {
                            element: ElementRef::from_facts(&facts),
                            selector,
                            strategy: kind,
                            confidence: found.confidence,
                            pattern_id,
                        },
                        attempts,
                    });
                }
                StrategyOutcome::Miss { guidance: offered } => {
                    debug!(strategy = kind.name(), "strategy found nothing");
                    if offered.is_some() {
                        guidance = offered;
                    }
                    attempt(AttemptOutcome::Missed);
                }
                StrategyOutcome::BelowThreshold { score } => {
                    debug!(strategy = kind.name(), score, "best candidate below threshold");
                    attempt(AttemptOutcome::BelowThreshold { score });
                }
                StrategyOutcome::Stale => {
                    debug!(strategy = kind.name(), "result discarded; step is no longer current");
                    attempt(AttemptOutcome::Stale);
                    return Ok(ResolutionReport {
                        result: ResolutionResult::not_found(),
                        attempts,
                    });
                }
            }
        }

        info!(step = %ctx.intent.id, "no strategy resolved the step");
        Ok(ResolutionReport {
            result: ResolutionResult::NotFound { guidance },
            attempts,
        })
    }

    /// Record the element a person pointed at as a manual pattern.
    pub async fn teach(
        &self,
        intent: &StepIntent,
        document: &dyn DocumentHandle,
        node: NodeId,
        scope: &PatternScope,
    ) -> Result<LearnedPattern> {
        let snapshot = document.snapshot();
        let selector = unique_selector(&snapshot, node)
            .ok_or_else(|| LocatorError::NotFound(format!("node {} is not in the document", node.0)))?;
        Ok(self.record_manual(intent, &selector, scope).await)
    }

    /// Record a selector supplied by a person; it must match the document.
    pub async fn teach_selector(
        &self,
        intent: &StepIntent,
        document: &dyn DocumentHandle,
        selector: &str,
        scope: &PatternScope,
    ) -> Result<LearnedPattern> {
        let snapshot = document.snapshot();
        if query_selector_all(&snapshot, selector)?.is_empty() {
            return Err(LocatorError::NotFound(format!(
                "selector '{selector}' matches nothing"
            )));
        }
        Ok(self.record_manual(intent, selector, scope).await)
    }

    /// Close the learning loop for a pattern used by the caller.
    pub fn feedback(&self, pattern_id: &str, success: bool) -> Result<LearnedPattern> {
        Ok(self.cache.feedback(pattern_id, success)?)
    }

    async fn record_manual(
        &self,
        intent: &StepIntent,
        selector: &str,
        scope: &PatternScope,
    ) -> LearnedPattern {
        let pattern = self
            .cache
            .record_synced(&intent.cache_key(), selector, scope, SOURCE_MANUAL)
            .await;
        info!(pattern = %pattern.id, selector, "taught pattern");
        pattern
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}
