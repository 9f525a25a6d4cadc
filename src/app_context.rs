//! Wiring of the resolution engine from an [`AppConfig`].

use std::sync::Arc;
use std::time::Duration;

use action_locator::ElementLocator;
use anyhow::{Context, Result};
use llm_provider::{CompletionProvider, OllamaProvider};
use memory_center::PatternCache;
use tracing::{info, warn};

use crate::backend::BackendClient;
use crate::config::AppConfig;

pub struct AppContext {
    config: Arc<AppConfig>,
    cache: Arc<PatternCache>,
    backend: Option<BackendClient>,
    locator: Arc<ElementLocator>,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Result<Self> {
        let backend = build_backend(&config)?;
        let cache = Arc::new(build_cache(&config, backend.clone())?);
        let provider = build_provider(&config);
        let locator = Arc::new(ElementLocator::new(
            &config.locator_settings(),
            Arc::clone(&cache),
            provider,
        ));
        info!(chain = ?locator.chain(), patterns = cache.len(), "resolution engine ready");
        Ok(Self {
            config: Arc::new(config),
            cache,
            backend,
            locator,
        })
    }

    pub fn config(&self) -> &AppConfig {
        self.config.as_ref()
    }

    pub fn cache(&self) -> &Arc<PatternCache> {
        &self.cache
    }

    pub fn backend(&self) -> Option<&BackendClient> {
        self.backend.as_ref()
    }

    pub fn locator(&self) -> &Arc<ElementLocator> {
        &self.locator
    }
}

fn build_backend(config: &AppConfig) -> Result<Option<BackendClient>> {
    if !config.backend.enabled {
        return Ok(None);
    }
    let client = BackendClient::new(
        config.backend.base_url.clone(),
        Duration::from_secs(config.backend.timeout_secs),
    )
    .context("Failed to create backend client")?;
    info!(url = client.base_url(), "pattern backend enabled");
    Ok(Some(client))
}

fn build_cache(config: &AppConfig, backend: Option<BackendClient>) -> Result<PatternCache> {
    let capacity = config.patterns.capacity;
    let cache = match &config.patterns.storage_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            PatternCache::with_persistence(path, capacity)
                .with_context(|| format!("loading patterns from {}", path.display()))?
        }
        None => PatternCache::new(capacity),
    };
    Ok(match backend {
        Some(client) => cache.with_remote(Arc::new(client)),
        None => cache,
    })
}

fn build_provider(config: &AppConfig) -> Option<Arc<dyn CompletionProvider>> {
    if !config.ai.enabled {
        return None;
    }
    match OllamaProvider::new(config.ai.provider_config()) {
        Ok(provider) => Some(Arc::new(provider)),
        Err(err) => {
            warn!(error = %err, "completion provider unavailable; AI strategy disabled");
            None
        }
    }
}
