use async_trait::async_trait;
use guidepath_core_types::PatternScope;

use crate::errors::Result;
use crate::pattern::LearnedPattern;

/// Remote durable home for learned patterns.
///
/// The local cache treats every call as best-effort: failures are logged
/// and never surface to the resolution path.
#[async_trait]
pub trait PatternStore: Send + Sync {
    /// Persist a pattern; returns the stored record.
    async fn save(&self, pattern: &LearnedPattern) -> Result<LearnedPattern>;

    /// Patterns for `intent` under `scope`, best first, at most 50.
    async fn find(&self, intent: &str, scope: &PatternScope) -> Result<Vec<LearnedPattern>>;
}
