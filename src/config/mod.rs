//! Configuration management for paywire

pub mod schema;

pub use schema::Config;

use crate::error::{PaywireError, PaywireResult};
use schema::API_KEY_ENV;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

impl Config {
    /// Resolve the API key: config file first, then `PAYWIRE_API_KEY`
    pub fn api_key(&self) -> PaywireResult<String> {
        if let Some(key) = self.backend.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            return Ok(key.to_string());
        }

        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(PaywireError::MissingApiKey)
    }

    /// Directory holding persisted ETag entries
    pub fn etag_dir(&self) -> PathBuf {
        self.cache
            .etag_dir
            .clone()
            .unwrap_or_else(ConfigManager::default_etag_dir)
    }
}

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("paywire")
            .join("config.toml")
    }

    /// Get the default ETag cache directory
    pub fn default_etag_dir() -> PathBuf {
        dirs::cache_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("paywire")
            .join("etags")
    }

    /// Load configuration, falling back to defaults if the file is missing
    pub async fn load(&self) -> PaywireResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> PaywireResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| PaywireError::io(format!("reading config from {}", path.display()), e))?;

        let config: Config = toml::from_str(&content).map_err(|e| PaywireError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if url::Url::parse(&config.backend.base_url).is_err() {
            return Err(PaywireError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: format!("backend.base_url is not a valid URL: {}", config.backend.base_url),
            });
        }

        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> PaywireResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            PaywireError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> PaywireResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PaywireError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: Arc::new(e),
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
