//! Configuration schema for paywire
//!
//! Configuration is stored at `~/.config/paywire/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable consulted when no API key is configured
pub const API_KEY_ENV: &str = "PAYWIRE_API_KEY";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend connection settings
    pub backend: BackendConfig,

    /// Identification of the client sent with every request
    pub client: ClientConfig,

    /// ETag cache settings
    pub cache: CacheConfig,
}

/// Backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend root, without the versioned path prefix
    pub base_url: String,

    /// Public API key. Falls back to `PAYWIRE_API_KEY` when unset
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.revenuecat.com".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

/// Client identification headers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Platform name (`X-Platform`)
    pub platform: String,

    /// Platform OS version (`X-Platform-Version`)
    pub platform_version: String,

    /// SDK flavor, e.g. "native" or a cross-platform wrapper
    pub platform_flavor: String,

    /// Version of the wrapper flavor, if any
    pub platform_flavor_version: Option<String>,

    /// Host application version
    pub app_version: String,

    /// Host application build number
    pub build_version: String,

    /// Vendor device identifier, if known
    pub device_identifier: Option<String>,

    /// Whether purchases run against the sandbox environment
    pub sandbox: bool,

    /// Observer mode: the host app finishes transactions itself
    pub observer_mode: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            platform: std::env::consts::OS.to_string(),
            platform_version: "unknown".to_string(),
            platform_flavor: "native".to_string(),
            platform_flavor_version: None,
            app_version: "unknown".to_string(),
            build_version: "unknown".to_string(),
            device_identifier: None,
            sandbox: false,
            observer_mode: false,
        }
    }
}

/// ETag cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Persist ETag entries on disk. When false, entries live in memory only
    pub persist: bool,

    /// Directory holding ETag entries (defaults to the user cache dir)
    pub etag_dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            persist: true,
            etag_dir: None,
        }
    }
}
