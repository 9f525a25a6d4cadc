//! Application configuration
//!
//! Loaded from YAML, then overridden by `GUIDEPATH_*` environment variables.

use std::collections::HashSet;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use action_locator::{LocatorSettings, StrategyKind};
use anyhow::{bail, Result};
use llm_provider::{CompletionOptions, OllamaConfig};
use perceiver_semantic::{ScoringThresholds, ScoringWeights};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const ENV_AI_URL: &str = "GUIDEPATH_AI_URL";
pub const ENV_AI_MODEL: &str = "GUIDEPATH_AI_MODEL";
pub const ENV_AI_ENABLED: &str = "GUIDEPATH_AI_ENABLED";
pub const ENV_BACKEND_URL: &str = "GUIDEPATH_BACKEND_URL";
pub const ENV_LOG_LEVEL: &str = "GUIDEPATH_LOG_LEVEL";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub resolver: ResolverConfig,
    pub scoring: ScoringConfig,
    pub ai: AiConfig,
    pub patterns: PatternsConfig,
    pub backend: BackendConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Strategy chain; `attribute_match` and `fuzzy_keyword` run only when listed.
    pub order: Vec<StrategyKind>,
    /// Candidates offered to the model.
    pub max_candidates: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        let defaults = LocatorSettings::default();
        Self {
            order: defaults.order,
            max_candidates: defaults.max_candidates,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub thresholds: ScoringThresholds,
    pub weights: ScoringWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub repeat_penalty: f32,
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        let provider = OllamaConfig::default();
        let options = CompletionOptions::default();
        Self {
            enabled: true,
            base_url: provider.base_url,
            model: provider.model,
            temperature: options.temperature,
            max_output_tokens: options.max_output_tokens,
            top_p: options.top_p,
            repeat_penalty: options.repeat_penalty,
            timeout_secs: provider.timeout.as_secs(),
        }
    }
}

impl AiConfig {
    pub fn provider_config(&self) -> OllamaConfig {
        OllamaConfig {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    pub fn completion_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            top_p: self.top_p,
            repeat_penalty: self.repeat_penalty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternsConfig {
    pub capacity: usize,
    /// JSON file mirroring the cache; in-memory only when unset.
    pub storage_path: Option<PathBuf>,
    pub prune_days: i64,
    pub prune_min_successes: u64,
}

impl Default for PatternsConfig {
    fn default() -> Self {
        Self {
            capacity: memory_center::DEFAULT_CAPACITY,
            storage_path: dirs::data_dir().map(|dir| dir.join("guidepath").join("patterns.json")),
            prune_days: memory_center::DEFAULT_PRUNE_DAYS,
            prune_min_successes: memory_center::DEFAULT_PRUNE_MIN_SUCCESSES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub enabled: bool,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://localhost:3000/api".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    pub fn locator_settings(&self) -> LocatorSettings {
        LocatorSettings {
            order: self.resolver.order.clone(),
            thresholds: self.scoring.thresholds.clone(),
            weights: self.scoring.weights.clone(),
            max_candidates: self.resolver.max_candidates,
            ai_options: self.ai.completion_options(),
        }
    }

    /// Apply `GUIDEPATH_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = read_env(ENV_AI_URL) {
            self.ai.base_url = url;
        }
        if let Some(model) = read_env(ENV_AI_MODEL) {
            self.ai.model = model;
        }
        if let Some(raw) = read_env(ENV_AI_ENABLED) {
            match parse_bool(&raw) {
                Some(enabled) => self.ai.enabled = enabled,
                None => warn!(value = raw, "invalid {ENV_AI_ENABLED} value; ignoring"),
            }
        }
        if let Some(url) = read_env(ENV_BACKEND_URL) {
            self.backend.base_url = url;
            self.backend.enabled = true;
            info!("Backend enabled from {ENV_BACKEND_URL}");
        }
        if let Some(level) = read_env(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
    }

    /// Every rule violation, empty when the configuration is usable.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let t = &self.scoring.thresholds;
        for (name, value) in [
            ("accessibility", t.accessibility),
            ("text", t.text),
            ("attribute", t.attribute),
            ("fuzzy", t.fuzzy),
            ("min_pattern_confidence", t.min_pattern_confidence),
        ] {
            if !(value >= 0.0) {
                problems.push(format!("scoring.thresholds.{name} must be non-negative"));
            }
        }
        if self.resolver.max_candidates == 0 {
            problems.push("resolver.max_candidates must be greater than 0".to_string());
        }
        if !(0.0..=2.0).contains(&self.ai.temperature) {
            problems.push("ai.temperature must be within [0, 2]".to_string());
        }
        if self.resolver.order.is_empty() {
            problems.push("resolver.order must not be empty".to_string());
        }
        let mut seen = HashSet::new();
        for kind in &self.resolver.order {
            if !seen.insert(*kind) {
                problems.push(format!("resolver.order lists '{kind}' more than once"));
            }
        }
        if self.patterns.capacity == 0 {
            problems.push("patterns.capacity must be greater than 0".to_string());
        }
        problems
    }

    pub fn validate(&self) -> Result<()> {
        let problems = self.problems();
        if problems.is_empty() {
            return Ok(());
        }
        bail!("invalid configuration:\n  - {}", problems.join("\n  - "))
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
