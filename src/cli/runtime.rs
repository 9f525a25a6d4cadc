use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use guidepath_cli::config::AppConfig;
use tokio::fs;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_logging(level: &str, debug: bool, json: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    let registry = tracing_subscriber::registry().with(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
    );
    // stdout is reserved for command output.
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

pub struct LoadedConfig {
    pub config: AppConfig,
    pub path: PathBuf,
    /// Whether `path` existed; defaults are used otherwise.
    pub found: bool,
}

pub fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(path) = config_path {
        return Ok(path.clone());
    }
    // Priority: ./config/config.yaml > ~/.config/guidepath/config.yaml
    let local_config = PathBuf::from("config/config.yaml");
    if local_config.exists() {
        return Ok(local_config);
    }
    let mut path = dirs::config_dir().context("Failed to get config directory")?;
    path.push("guidepath");
    path.push("config.yaml");
    Ok(path)
}

/// Read the configuration file (or defaults) and apply `GUIDEPATH_*`
/// overrides. Runs before logging is installed, so it reports through
/// [`LoadedConfig::found`] instead of logging.
pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let path = resolve_config_path(config_path)?;
    let found = fs::try_exists(&path).await.unwrap_or(false);
    let mut config = if found {
        read_config_file(&path).await?
    } else {
        AppConfig::default()
    };
    config.apply_env_overrides();
    Ok(LoadedConfig {
        config,
        path,
        found,
    })
}

pub async fn read_config_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    serde_yaml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}
