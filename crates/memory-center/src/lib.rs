//! Pattern cache: learned (intent, selector) associations.
//!
//! The cache is the sole owner of pattern counters. It is bounded
//! (oldest-first eviction), keyed by scope, optionally mirrored to a JSON
//! file and optionally backed by a remote [`PatternStore`].

pub mod errors;
pub mod pattern;
pub mod store;

use chrono::{Duration, Utc};
use dashmap::DashMap;
use guidepath_core_types::{normalize_intent, PatternScope};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub use errors::{PatternError, Result};
pub use pattern::{
    laplace_confidence, ImportSummary, LearnedPattern, PatternEffectiveness, PatternExport,
    Recommendation, SOURCE_IMPORTED, SOURCE_MANUAL,
};
pub use store::PatternStore;

pub const DEFAULT_CAPACITY: usize = 100;
pub const LOOKUP_LIMIT: usize = 50;
pub const DEFAULT_PRUNE_DAYS: i64 = 90;
pub const DEFAULT_PRUNE_MIN_SUCCESSES: u64 = 5;

struct Slot {
    seq: u64,
    pattern: LearnedPattern,
}

pub struct PatternCache {
    inner: DashMap<String, Vec<Slot>>,
    capacity: usize,
    next_seq: AtomicU64,
    storage_path: Option<PathBuf>,
    remote: Option<Arc<dyn PatternStore>>,
    metrics: PatternMetrics,
}

#[derive(Default)]
struct PatternMetrics {
    lookups: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    recorded: AtomicU64,
    feedback_events: AtomicU64,
    evictions: AtomicU64,
    remote_failures: AtomicU64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternStats {
    pub total_patterns: u64,
    pub scopes: u64,
    pub capacity: u64,
    pub total_lookups: u64,
    pub hit_lookups: u64,
    pub miss_lookups: u64,
    pub hit_rate: f64,
    pub recorded_patterns: u64,
    pub feedback_events: u64,
    pub evictions: u64,
    pub remote_failures: u64,
    pub average_confidence: f64,
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl PatternCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: DashMap::new(),
            capacity: capacity.max(1),
            next_seq: AtomicU64::new(0),
            storage_path: None,
            remote: None,
            metrics: PatternMetrics::default(),
        }
    }

    /// Load patterns from `path` (if present) and mirror every change back to it.
    pub fn with_persistence(path: impl Into<PathBuf>, capacity: usize) -> Result<Self> {
        let path = path.into();
        let mut cache = Self::new(capacity);

        if path.exists() {
            let bytes = fs::read(&path)?;
            if !bytes.is_empty() {
                let patterns: Vec<LearnedPattern> = serde_json::from_slice(&bytes)?;
                for pattern in patterns {
                    cache.insert_or_absorb(pattern);
                }
            }
        }

        cache.storage_path = Some(path);
        Ok(cache)
    }

    pub fn with_remote(mut self, store: Arc<dyn PatternStore>) -> Self {
        self.remote = Some(store);
        self
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Patterns for `intent` under exactly `scope`: confidence desc, then
    /// success count desc, at most [`LOOKUP_LIMIT`].
    pub fn lookup(&self, intent: &str, scope: &PatternScope) -> Vec<LearnedPattern> {
        let found = self.collect(intent, scope);
        self.metrics.record_lookup(!found.is_empty());
        found
    }

    /// Local lookup, falling back to the remote store on a miss.
    ///
    /// Remote hits are adopted locally so the next lookup is served from
    /// memory. Remote failures degrade to an empty result.
    pub async fn fetch(&self, intent: &str, scope: &PatternScope) -> Vec<LearnedPattern> {
        let local = self.lookup(intent, scope);
        if !local.is_empty() {
            return local;
        }
        let Some(remote) = self.remote.as_ref() else {
            return local;
        };

        match remote.find(&normalize_intent(intent), scope).await {
            Ok(patterns) if patterns.is_empty() => Vec::new(),
            Ok(patterns) => {
                debug!(count = patterns.len(), scope = %scope, "adopting remote patterns");
                for mut pattern in patterns {
                    pattern.intent = normalize_intent(&pattern.intent);
                    pattern.scope = scope.clone();
                    self.insert_or_absorb(pattern);
                }
                self.persist_logged("remote adopt");
                self.collect(intent, scope)
            }
            Err(err) => {
                self.metrics.remote_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, "remote pattern lookup failed");
                Vec::new()
            }
        }
    }

    /// Upsert on (intent, scope, selector).
    ///
    /// A new pattern starts with zero counters; an existing one keeps its
    /// counters and only has its timestamp refreshed.
    pub fn record(
        &self,
        intent: &str,
        selector: &str,
        scope: &PatternScope,
        source: &str,
    ) -> LearnedPattern {
        let candidate = LearnedPattern::new(intent, selector, scope.clone(), source);
        let key = scope.key();

        if let Some(mut slots) = self.inner.get_mut(&key) {
            if let Some(slot) = slots
                .iter_mut()
                .find(|slot| slot.pattern.same_slot(&candidate))
            {
                slot.pattern.updated_at = Utc::now();
                let existing = slot.pattern.clone();
                drop(slots);
                self.persist_logged("record");
                return existing;
            }
        }

        self.insert_new(candidate.clone());
        self.metrics.recorded.fetch_add(1, Ordering::Relaxed);
        debug!(pattern = %candidate.id, selector = %candidate.selector, scope = %scope, "recorded pattern");
        self.persist_logged("record");
        candidate
    }

    /// [`record`](Self::record), then push the pattern to the remote store.
    pub async fn record_synced(
        &self,
        intent: &str,
        selector: &str,
        scope: &PatternScope,
        source: &str,
    ) -> LearnedPattern {
        let pattern = self.record(intent, selector, scope, source);
        if let Some(remote) = self.remote.as_ref() {
            if let Err(err) = remote.save(&pattern).await {
                self.metrics.remote_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, pattern = %pattern.id, "remote pattern save failed");
            }
        }
        pattern
    }

    /// Apply one success/failure event to the pattern with `id`.
    pub fn feedback(&self, id: &str, success: bool) -> Result<LearnedPattern> {
        let mut updated: Option<LearnedPattern> = None;
        for mut entry in self.inner.iter_mut() {
            if let Some(slot) = entry.value_mut().iter_mut().find(|s| s.pattern.id == id) {
                slot.pattern.apply_feedback(success);
                updated = Some(slot.pattern.clone());
                break;
            }
        }

        let pattern = updated.ok_or_else(|| PatternError::NotFound(id.to_string()))?;
        self.metrics.feedback_events.fetch_add(1, Ordering::Relaxed);
        debug!(pattern = %id, success, confidence = pattern.confidence, "pattern feedback");
        self.persist_logged("feedback");
        Ok(pattern)
    }

    pub fn get(&self, id: &str) -> Option<LearnedPattern> {
        self.inner.iter().find_map(|entry| {
            entry
                .value()
                .iter()
                .find(|slot| slot.pattern.id == id)
                .map(|slot| slot.pattern.clone())
        })
    }

    pub fn remove(&self, id: &str) -> Option<LearnedPattern> {
        let mut removed: Option<(String, LearnedPattern)> = None;
        for mut entry in self.inner.iter_mut() {
            if let Some(pos) = entry.value().iter().position(|slot| slot.pattern.id == id) {
                let slot = entry.value_mut().remove(pos);
                removed = Some((entry.key().clone(), slot.pattern));
                break;
            }
        }

        let (key, pattern) = removed?;
        self.inner.remove_if(&key, |_, slots| slots.is_empty());
        self.persist_logged("remove");
        Some(pattern)
    }

    /// All patterns, optionally limited to one scope, best first.
    pub fn list(&self, scope: Option<&PatternScope>) -> Vec<LearnedPattern> {
        let mut patterns: Vec<LearnedPattern> = match scope {
            Some(scope) => self
                .inner
                .get(&scope.key())
                .map(|slots| slots.iter().map(|slot| slot.pattern.clone()).collect())
                .unwrap_or_default(),
            None => self
                .inner
                .iter()
                .flat_map(|entry| {
                    entry
                        .value()
                        .iter()
                        .map(|slot| slot.pattern.clone())
                        .collect::<Vec<_>>()
                })
                .collect(),
        };
        sort_best_first(&mut patterns);
        patterns
    }

    /// Drop patterns idle for longer than `max_age` that never reached
    /// `min_successes`. Returns the number removed.
    pub fn prune(&self, max_age: Duration, min_successes: u64) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut removed = 0;
        for mut entry in self.inner.iter_mut() {
            let before = entry.value().len();
            entry.value_mut().retain(|slot| {
                slot.pattern.updated_at >= cutoff || slot.pattern.success_count >= min_successes
            });
            removed += before - entry.value().len();
        }
        self.inner.retain(|_, slots| !slots.is_empty());

        if removed > 0 {
            debug!(removed, "pruned stale patterns");
            self.persist_logged("prune");
        }
        removed
    }

    pub fn export(&self, scope: Option<&PatternScope>) -> PatternExport {
        PatternExport {
            scope: scope.cloned(),
            exported_at: Utc::now(),
            patterns: self.list(scope),
        }
    }

    /// Adopt exported patterns, optionally re-scoping them into `into`.
    ///
    /// Patterns colliding with an existing (intent, scope, selector) slot
    /// have their counters folded in.
    pub fn import(&self, export: PatternExport, into: Option<&PatternScope>) -> ImportSummary {
        let mut summary = ImportSummary {
            total: export.patterns.len(),
            ..ImportSummary::default()
        };
        for mut pattern in export.patterns {
            if let Some(scope) = into {
                pattern.scope = scope.clone();
            }
            pattern.intent = normalize_intent(&pattern.intent);
            if pattern.selector.trim().is_empty() || pattern.intent.is_empty() {
                warn!(pattern = %pattern.id, "skipping imported pattern without intent or selector");
                continue;
            }
            if self.insert_or_absorb(pattern) {
                summary.merged += 1;
            } else {
                summary.imported += 1;
            }
        }
        self.persist_logged("import");
        summary
    }

    /// Move every pattern from one scope into another. Returns the number moved.
    pub fn merge(&self, from: &PatternScope, into: &PatternScope) -> usize {
        if from == into {
            return 0;
        }
        let Some((_, slots)) = self.inner.remove(&from.key()) else {
            return 0;
        };
        let moved = slots.len();
        for slot in slots {
            let mut pattern = slot.pattern;
            pattern.scope = into.clone();
            self.insert_or_absorb(pattern);
        }
        debug!(moved, from = %from, into = %into, "merged pattern scopes");
        self.persist_logged("merge");
        moved
    }

    pub fn effectiveness(&self, id: &str) -> Option<PatternEffectiveness> {
        self.get(id).map(|pattern| PatternEffectiveness::of(&pattern))
    }

    /// Effectiveness of every pattern for `intent` in `scope`, best rate first.
    pub fn analyze(&self, intent: &str, scope: &PatternScope) -> Vec<PatternEffectiveness> {
        let mut reports: Vec<PatternEffectiveness> = self
            .collect(intent, scope)
            .iter()
            .map(PatternEffectiveness::of)
            .collect();
        reports.sort_by(|a, b| b.success_rate.total_cmp(&a.success_rate));
        reports
    }

    pub fn stats(&self) -> PatternStats {
        let total_lookups = self.metrics.lookups.load(Ordering::Relaxed);
        let hit_lookups = self.metrics.hits.load(Ordering::Relaxed);
        let miss_lookups = self.metrics.misses.load(Ordering::Relaxed);
        let hit_rate = if total_lookups == 0 {
            0.0
        } else {
            hit_lookups as f64 / total_lookups as f64
        };
        let (total, confidence_sum) = self.inner.iter().fold((0u64, 0.0), |(n, sum), entry| {
            entry.value().iter().fold((n, sum), |(n, sum), slot| {
                (n + 1, sum + slot.pattern.confidence)
            })
        });
        PatternStats {
            total_patterns: total,
            scopes: self.inner.len() as u64,
            capacity: self.capacity as u64,
            total_lookups,
            hit_lookups,
            miss_lookups,
            hit_rate,
            recorded_patterns: self.metrics.recorded.load(Ordering::Relaxed),
            feedback_events: self.metrics.feedback_events.load(Ordering::Relaxed),
            evictions: self.metrics.evictions.load(Ordering::Relaxed),
            remote_failures: self.metrics.remote_failures.load(Ordering::Relaxed),
            average_confidence: if total == 0 {
                0.0
            } else {
                confidence_sum / total as f64
            },
        }
    }

    pub fn persist_now(&self) -> Result<()> {
        self.persist_to_disk()
    }

    fn collect(&self, intent: &str, scope: &PatternScope) -> Vec<LearnedPattern> {
        let intent = normalize_intent(intent);
        let mut found: Vec<LearnedPattern> = self
            .inner
            .get(&scope.key())
            .map(|slots| {
                slots
                    .iter()
                    .filter(|slot| slot.pattern.intent == intent)
                    .map(|slot| slot.pattern.clone())
                    .collect()
            })
            .unwrap_or_default();
        sort_best_first(&mut found);
        found.truncate(LOOKUP_LIMIT);
        found
    }

    /// Returns `true` when the pattern was folded into an existing slot.
    fn insert_or_absorb(&self, mut pattern: LearnedPattern) -> bool {
        let key = pattern.scope.key();
        if let Some(mut slots) = self.inner.get_mut(&key) {
            if let Some(slot) = slots
                .iter_mut()
                .find(|slot| slot.pattern.same_slot(&pattern))
            {
                slot.pattern.absorb(&pattern);
                return true;
            }
        }
        if self.get(&pattern.id).is_some() {
            pattern.id = Uuid::new_v4().to_string();
        }
        self.insert_new(pattern);
        false
    }

    fn insert_new(&self, pattern: LearnedPattern) {
        while self.len() >= self.capacity {
            if !self.evict_oldest() {
                break;
            }
        }
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.inner
            .entry(pattern.scope.key())
            .or_default()
            .push(Slot { seq, pattern });
    }

    fn evict_oldest(&self) -> bool {
        let mut oldest: Option<(u64, String, String)> = None;
        for entry in self.inner.iter() {
            for slot in entry.value() {
                if oldest.as_ref().map_or(true, |(seq, _, _)| slot.seq < *seq) {
                    oldest = Some((slot.seq, entry.key().clone(), slot.pattern.id.clone()));
                }
            }
        }
        let Some((_, key, id)) = oldest else {
            return false;
        };
        if let Some(mut slots) = self.inner.get_mut(&key) {
            slots.retain(|slot| slot.pattern.id != id);
        }
        self.inner.remove_if(&key, |_, slots| slots.is_empty());
        self.metrics.evictions.fetch_add(1, Ordering::Relaxed);
        debug!(pattern = %id, "evicted oldest pattern");
        true
    }

    fn persist_logged(&self, operation: &str) {
        if let Err(err) = self.persist_to_disk() {
            warn!(error = %err, operation, "pattern cache persist failed");
        }
    }

    fn persist_to_disk(&self) -> Result<()> {
        let Some(path) = self.storage_path.as_ref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut slots: Vec<(u64, LearnedPattern)> = Vec::new();
        for entry in self.inner.iter() {
            slots.extend(
                entry
                    .value()
                    .iter()
                    .map(|slot| (slot.seq, slot.pattern.clone())),
            );
        }
        slots.sort_by_key(|(seq, _)| *seq);
        let patterns: Vec<LearnedPattern> = slots.into_iter().map(|(_, p)| p).collect();
        let json = serde_json::to_vec_pretty(&patterns)?;
        fs::write(path, json)?;
        Ok(())
    }
}

pub type SharedPatternCache = Arc<PatternCache>;

impl PatternMetrics {
    fn record_lookup(&self, hit: bool) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn sort_best_first(patterns: &mut [LearnedPattern]) {
    patterns.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| b.success_count.cmp(&a.success_count))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(page: &str) -> PatternScope {
        PatternScope::for_page(page)
    }

    #[test]
    fn record_is_an_upsert() {
        let cache = PatternCache::default();
        let first = cache.record("Click Save", "#save", &scope("editor"), "text");
        let second = cache.record("click   save", "#save", &scope("editor"), "text");
        assert_eq!(first.id, second.id);
        assert_eq!(cache.len(), 1);
        assert_eq!((second.success_count, second.failure_count), (0, 0));

        cache.record("click save", "#save", &scope("inbox"), "text");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn lookup_orders_by_confidence_then_successes() {
        let cache = PatternCache::default();
        let s = scope("studio");
        let weak = cache.record("create playlist", "#weak", &s, "text");
        let strong = cache.record("create playlist", "#strong", &s, "text");
        cache.record("create playlist", "#unused", &s, "text");
        cache.feedback(&weak.id, true).unwrap();
        cache.feedback(&weak.id, false).unwrap();
        for _ in 0..3 {
            cache.feedback(&strong.id, true).unwrap();
        }

        let found = cache.lookup("Create playlist", &s);
        let selectors: Vec<&str> = found.iter().map(|p| p.selector.as_str()).collect();
        assert_eq!(selectors, vec!["#strong", "#weak", "#unused"]);
        assert!(cache.lookup("create playlist", &scope("other")).is_empty());
    }

    #[test]
    fn feedback_applies_laplace_law() {
        let cache = PatternCache::default();
        let pattern = cache.record("send", "#send", &PatternScope::global(), "text");
        let after = cache.feedback(&pattern.id, true).unwrap();
        assert_eq!(after.confidence, 0.5);
        let after = cache.feedback(&pattern.id, false).unwrap();
        assert_eq!(after.confidence, 1.0 / 3.0);
        assert!(matches!(
            cache.feedback("missing", true),
            Err(PatternError::NotFound(_))
        ));
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let cache = PatternCache::new(2);
        let g = PatternScope::global();
        let first = cache.record("a", "#a", &g, "text");
        cache.record("b", "#b", &g, "text");
        cache.record("c", "#c", &g, "text");
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&first.id).is_none());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn prune_removes_idle_unproven_patterns() {
        let cache = PatternCache::default();
        let g = PatternScope::global();
        let mut stale = LearnedPattern::new("old step", "#old", g.clone(), "text");
        stale.updated_at = Utc::now() - Duration::days(120);
        let mut proven = LearnedPattern::new("old proven", "#proven", g.clone(), "text");
        proven.updated_at = Utc::now() - Duration::days(120);
        proven.success_count = 7;
        cache.import(
            PatternExport {
                scope: None,
                exported_at: Utc::now(),
                patterns: vec![stale, proven],
            },
            None,
        );
        cache.record("fresh", "#fresh", &g, "text");

        let removed = cache.prune(Duration::days(DEFAULT_PRUNE_DAYS), DEFAULT_PRUNE_MIN_SUCCESSES);
        assert_eq!(removed, 1);
        assert!(cache.lookup("old step", &g).is_empty());
        assert_eq!(cache.lookup("old proven", &g).len(), 1);
    }

    #[test]
    fn merge_folds_counters_into_target_scope() {
        let cache = PatternCache::default();
        let trial = PatternScope::new(Some("acme".into()), "trial");
        let main = PatternScope::new(Some("acme".into()), "main");
        let a = cache.record("open menu", "#menu", &trial, "text");
        let b = cache.record("open menu", "#menu", &main, "text");
        cache.feedback(&a.id, true).unwrap();
        cache.feedback(&b.id, true).unwrap();
        cache.feedback(&b.id, false).unwrap();

        assert_eq!(cache.merge(&trial, &main), 1);
        let merged = cache.lookup("open menu", &main);
        assert_eq!(merged.len(), 1);
        assert_eq!((merged[0].success_count, merged[0].failure_count), (2, 1));
        assert_eq!(merged[0].confidence, 0.5);
        assert!(cache.list(Some(&trial)).is_empty());
    }

    #[test]
    fn export_import_into_new_scope() {
        let source = PatternCache::default();
        let s = scope("compose");
        source.record("compose a new email", "[aria-label=\"Compose\"]", &s, "accessibility");
        let bundle = source.export(Some(&s));
        assert_eq!(bundle.patterns.len(), 1);

        let target = PatternCache::default();
        let into = PatternScope::new(Some("globex".into()), "compose");
        let summary = target.import(bundle, Some(&into));
        assert_eq!(summary, ImportSummary { imported: 1, merged: 0, total: 1 });
        assert_eq!(target.lookup("compose a new email", &into).len(), 1);
    }

    #[test]
    fn stats_track_lookups() {
        let cache = PatternCache::default();
        let g = PatternScope::global();
        cache.record("save", "#save", &g, "text");
        cache.lookup("save", &g);
        cache.lookup("nothing", &g);
        let stats = cache.stats();
        assert_eq!(stats.total_patterns, 1);
        assert_eq!(stats.total_lookups, 2);
        assert_eq!(stats.hit_lookups, 1);
        assert_eq!(stats.hit_rate, 0.5);
        assert_eq!(stats.recorded_patterns, 1);
    }
}
