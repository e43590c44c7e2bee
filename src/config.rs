//! Configuration loading
//!
//! Defaults are overlaid by a JSON file and then by CLI flags / environment.

use crate::error::AppError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Runtime configuration shared by the CLI and the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Public base URL for generated links
    pub site_url: String,
    /// Server listen address
    pub bind: String,
    /// Host answering com.atproto.identity.resolveHandle
    pub handle_resolver: String,
    /// did:plc document directory
    pub plc_directory: String,
    /// AppView used for thread and profile views
    pub appview: String,
    /// Public aggregator used when a record cannot be read from its PDS
    pub aggregator: String,
    pub request_timeout_secs: u64,
    /// 0 disables identity caching
    pub identity_cache_ttl_secs: u64,
    pub retry_transient: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_url: "https://aturi.to".to_string(),
            bind: "127.0.0.1:3000".to_string(),
            handle_resolver: "https://public.api.bsky.app".to_string(),
            plc_directory: "https://plc.directory".to_string(),
            appview: "https://public.api.bsky.app".to_string(),
            aggregator: "https://public.api.bsky.app".to_string(),
            request_timeout_secs: 10,
            identity_cache_ttl_secs: 300,
            retry_transient: true,
        }
    }
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn identity_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.identity_cache_ttl_secs)
    }

    /// Site URL without a trailing slash
    pub fn site_base(&self) -> &str {
        self.site_url.trim_end_matches('/')
    }

    /// Load configuration.
    ///
    /// With an explicit path the file must exist and parse. Without one the
    /// default location is tried and silently skipped when absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self, AppError> {
        let loaded = match explicit {
            Some(path) => read_config_file(path),
            None => match config_path() {
                Ok(path) if path.exists() => read_config_file(&path),
                Ok(_) => Ok(Config::default()),
                Err(e) => {
                    debug!("No config directory available: {}", e);
                    Ok(Config::default())
                }
            },
        };

        loaded.map_err(|e| AppError::ConfigError(format!("{:#}", e)))
    }
}

/// Get the path to the default configuration file
pub fn config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().context("Cannot determine config directory")?;
    Ok(config_dir.join("aturi").join("config.json"))
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config: Config = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;

    debug!("Loaded config from {}", path.display());
    Ok(config)
}
