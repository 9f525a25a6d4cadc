use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use guidepath_cli::app_context::AppContext;
use guidepath_cli::config::AppConfig;
use tokio::sync::OnceCell;

pub struct CliContext {
    config: Arc<AppConfig>,
    config_path: PathBuf,
    app_context: OnceCell<Arc<AppContext>>,
}

impl CliContext {
    pub fn new(config: AppConfig, config_path: PathBuf) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
            app_context: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Engine built on first use, so `config` commands never touch the
    /// pattern file or the network.
    pub async fn app_context(&self) -> Result<Arc<AppContext>> {
        self.app_context
            .get_or_try_init(|| async {
                AppContext::new(self.config.as_ref().clone()).map(Arc::new)
            })
            .await
            .map(Arc::clone)
    }
}
