//! Configuration management for Beacon services.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`BEACON__` prefix, `__` separator)
//! 2. Config file (`beacon.toml` by default)
//! 3. Defaults

use std::time::Duration;

use serde::Deserialize;

use crate::error::{BeaconError, Result};

/// Top-level Beacon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BeaconConfig {
    /// Loading-state aggregator timings (`[loading]` section).
    #[serde(default)]
    pub loading: LoadingSettings,

    /// Remote GraphQL API (`[api]` section).
    #[serde(default)]
    pub api: ApiSettings,
}

/// Timings for the loading-state aggregator.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoadingSettings {
    /// How long the counter must stay at zero before subscribers hear "idle".
    #[serde(default = "default_idle_debounce_ms")]
    pub idle_debounce_ms: u64,

    /// Extra delay before the deferred "loading" notification is delivered.
    #[serde(default)]
    pub busy_delay_ms: u64,
}

impl LoadingSettings {
    pub fn idle_debounce(&self) -> Duration {
        Duration::from_millis(self.idle_debounce_ms)
    }

    pub fn busy_delay(&self) -> Duration {
        Duration::from_millis(self.busy_delay_ms)
    }
}

impl Default for LoadingSettings {
    fn default() -> Self {
        Self {
            idle_debounce_ms: default_idle_debounce_ms(),
            busy_delay_ms: 0,
        }
    }
}

/// Connection settings for the remote GraphQL API.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ApiSettings {
    /// GraphQL endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Bearer token sent with every request, if set.
    #[serde(default)]
    pub token: Option<String>,

    /// Whole-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            token: None,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_idle_debounce_ms() -> u64 {
    200
}

fn default_endpoint() -> String {
    "http://localhost:4000/graphql".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl BeaconConfig {
    /// Load configuration from `{file_prefix}.toml` (optional) and the
    /// process environment.
    pub fn load(file_prefix: &str) -> Result<Self> {
        Self::load_with_env(file_prefix, None)
    }

    /// Same as [`BeaconConfig::load`] but reads environment variables from
    /// `env` instead of the process environment when given.
    pub fn load_with_env(
        file_prefix: &str,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("BEACON")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;

        let loaded: BeaconConfig = cfg.try_deserialize()?;
        loaded.validate()?;

        tracing::debug!(
            idle_debounce_ms = loaded.loading.idle_debounce_ms,
            busy_delay_ms = loaded.loading.busy_delay_ms,
            endpoint = %loaded.api.endpoint,
            "Configuration loaded"
        );

        Ok(loaded)
    }

    fn validate(&self) -> Result<()> {
        if self.api.endpoint.trim().is_empty() {
            return Err(BeaconError::InvalidSetting {
                key: "api.endpoint".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.api.timeout_secs == 0 {
            return Err(BeaconError::InvalidSetting {
                key: "api.timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
