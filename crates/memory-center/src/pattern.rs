use chrono::{DateTime, Utc};
use guidepath_core_types::{normalize_intent, PatternScope};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Source label for patterns recorded from a human click.
pub const SOURCE_MANUAL: &str = "manual";
/// Source label for patterns pulled in through import or the remote store.
pub const SOURCE_IMPORTED: &str = "imported";

/// A durable (intent, selector) association with its running track record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LearnedPattern {
    pub id: String,
    /// Normalized instruction text.
    pub intent: String,
    pub selector: String,
    #[serde(default)]
    pub scope: PatternScope,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub failure_count: u64,
    /// Strategy or channel that produced the pattern.
    #[serde(default)]
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LearnedPattern {
    pub fn new(
        intent: &str,
        selector: impl Into<String>,
        scope: PatternScope,
        source: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            intent: normalize_intent(intent),
            selector: selector.into(),
            scope,
            confidence: laplace_confidence(0, 0),
            success_count: 0,
            failure_count: 0,
            source: source.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply one feedback event and recompute confidence.
    pub fn apply_feedback(&mut self, success: bool) {
        if success {
            self.success_count = self.success_count.saturating_add(1);
        } else {
            self.failure_count = self.failure_count.saturating_add(1);
        }
        self.confidence = laplace_confidence(self.success_count, self.failure_count);
        self.updated_at = Utc::now();
    }

    pub fn total_uses(&self) -> u64 {
        self.success_count + self.failure_count
    }

    pub(crate) fn same_slot(&self, other: &LearnedPattern) -> bool {
        self.intent == other.intent && self.selector == other.selector && self.scope == other.scope
    }

    /// Fold another record for the same slot into this one.
    pub(crate) fn absorb(&mut self, other: &LearnedPattern) {
        self.success_count = self.success_count.saturating_add(other.success_count);
        self.failure_count = self.failure_count.saturating_add(other.failure_count);
        self.confidence = laplace_confidence(self.success_count, self.failure_count);
        self.created_at = self.created_at.min(other.created_at);
        self.updated_at = self.updated_at.max(other.updated_at);
    }
}

/// `s / (s + f + 1)`: optimistic smoothing that starts at zero.
pub fn laplace_confidence(successes: u64, failures: u64) -> f64 {
    successes as f64 / (successes + failures + 1) as f64
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    NeedsMoreData,
    HighlyEffective,
    Effective,
    Moderate,
    NeedsImprovement,
}

impl Recommendation {
    pub const MIN_USES: u64 = 5;

    pub fn classify(success_rate: f64, total_uses: u64) -> Self {
        if total_uses < Self::MIN_USES {
            Recommendation::NeedsMoreData
        } else if success_rate > 0.9 {
            Recommendation::HighlyEffective
        } else if success_rate > 0.7 {
            Recommendation::Effective
        } else if success_rate > 0.5 {
            Recommendation::Moderate
        } else {
            Recommendation::NeedsImprovement
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatternEffectiveness {
    pub pattern_id: String,
    pub intent: String,
    pub selector: String,
    /// Plain `successes / uses`, zero when unused.
    pub success_rate: f64,
    pub total_uses: u64,
    pub recommendation: Recommendation,
}

impl PatternEffectiveness {
    pub fn of(pattern: &LearnedPattern) -> Self {
        let total_uses = pattern.total_uses();
        let success_rate = if total_uses == 0 {
            0.0
        } else {
            pattern.success_count as f64 / total_uses as f64
        };
        Self {
            pattern_id: pattern.id.clone(),
            intent: pattern.intent.clone(),
            selector: pattern.selector.clone(),
            success_rate,
            total_uses,
            recommendation: Recommendation::classify(success_rate, total_uses),
        }
    }
}

/// Portable bundle produced by `export` and consumed by `import`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatternExport {
    #[serde(default)]
    pub scope: Option<PatternScope>,
    pub exported_at: DateTime<Utc>,
    pub patterns: Vec<LearnedPattern>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub merged: usize,
    pub total: usize,
}
