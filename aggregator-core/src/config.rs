use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{error::ConfigError, provider::ProviderId, stats::Thresholds};

/// Connection details and latency thresholds for a single upstream provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub fast_response_time_ms_threshold: u64,
    pub average_response_time_ms_threshold: u64,
}

impl ProviderConfig {
    /// A config pointing at the provider's public endpoint with default thresholds.
    pub fn with_defaults(id: ProviderId, api_key: String) -> Self {
        Self {
            base_url: id.default_base_url().to_string(),
            api_key,
            fast_response_time_ms_threshold: 200,
            average_response_time_ms_threshold: 600,
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            fast_ms: self.fast_response_time_ms_threshold as f64,
            average_ms: self.average_response_time_ms_threshold as f64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "127.0.0.1:8080".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-call timeout applied by every provider client.
    pub timeout_ms: u64,
    /// Sent to providers that reject anonymous clients.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_ms: 5_000, user_agent: "location-aggregator/0.1".to_string() }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [server]
/// bind = "0.0.0.0:8080"
///
/// [providers.openweather]
/// base_url = "https://api.openweathermap.org/data/3.0"
/// api_key = "..."
/// fast_response_time_ms_threshold = 200
/// average_response_time_ms_threshold = 600
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    /// Keyed by [`ProviderId::as_str`], the same name statistics are recorded under.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

impl Config {
    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    /// Like [`Config::provider_config`] but fails with a hint when the section is missing.
    pub fn require_provider(&self, id: ProviderId) -> Result<&ProviderConfig, ConfigError> {
        self.provider_config(id).ok_or(ConfigError::MissingProvider(id))
    }

    /// Check everything the service needs before it starts taking requests.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        for &id in ProviderId::all() {
            let provider = self.require_provider(id)?;

            if provider.base_url.trim().is_empty() {
                return Err(ConfigError::EmptyField { provider: id, field: "base_url" });
            }
            if provider.api_key.trim().is_empty() {
                return Err(ConfigError::EmptyField { provider: id, field: "api_key" });
            }
            if provider.fast_response_time_ms_threshold > provider.average_response_time_ms_threshold {
                return Err(ConfigError::ThresholdOrder {
                    provider: id,
                    fast: provider.fast_response_time_ms_threshold,
                    average: provider.average_response_time_ms_threshold,
                });
            }
        }

        Ok(())
    }

    /// Latency thresholds for every configured provider, keyed by provider name.
    pub fn thresholds(&self) -> HashMap<String, Thresholds> {
        self.providers.iter().map(|(name, cfg)| (name.clone(), cfg.thresholds())).collect()
    }

    /// Load config from `path`, or return an empty default if it doesn't exist yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "location-aggregator", "aggregator")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set or replace a provider section.
    pub fn upsert_provider(&mut self, id: ProviderId, provider: ProviderConfig) {
        self.providers.insert(id.as_str().to_string(), provider);
    }
}
