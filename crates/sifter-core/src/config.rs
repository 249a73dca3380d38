//! Runtime configuration.
//!
//! Defaults are chosen for a small single-process deployment and every knob
//! can be overridden via `SIFTER_*` environment variables or by
//! deserializing a config file into [`SifterConfig`].

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Extraction provider settings (OpenAI-compatible endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the chat-completions API.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Bearer token. May stay empty for local providers that need none.
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: String::new(),
            model: default_model(),
        }
    }
}

/// Top-level configuration for the orchestration runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SifterConfig {
    /// Number of concurrent workers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Processing attempts per task before it fails terminally.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Budget for one normalize+extract attempt.
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,

    /// How long a claim stays valid before the sweeper may reclaim it.
    /// Must cover the attempt timeout with some slack.
    #[serde(default = "default_lease_timeout_secs")]
    pub lease_timeout_secs: u64,

    /// How often the sweeper looks for expired leases.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// First retry delay; doubles per attempt by default.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,

    #[serde(default)]
    pub provider: ProviderConfig,
}

impl Default for SifterConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_attempts: default_max_attempts(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            lease_timeout_secs: default_lease_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_multiplier: default_retry_multiplier(),
            provider: ProviderConfig::default(),
        }
    }
}

impl SifterConfig {
    /// Defaults overridden by whatever `SIFTER_*` variables are set.
    /// Unparsable values are ignored rather than fatal.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("SIFTER_WORKERS")
            && let Ok(n) = v.parse()
        {
            config.workers = n;
        }
        if let Ok(v) = std::env::var("SIFTER_MAX_ATTEMPTS")
            && let Ok(n) = v.parse()
        {
            config.max_attempts = n;
        }
        if let Ok(v) = std::env::var("SIFTER_ATTEMPT_TIMEOUT_SECS")
            && let Ok(n) = v.parse()
        {
            config.attempt_timeout_secs = n;
        }
        if let Ok(v) = std::env::var("SIFTER_LEASE_TIMEOUT_SECS")
            && let Ok(n) = v.parse()
        {
            config.lease_timeout_secs = n;
        }
        if let Ok(v) = std::env::var("SIFTER_SWEEP_INTERVAL_SECS")
            && let Ok(n) = v.parse()
        {
            config.sweep_interval_secs = n;
        }
        if let Ok(v) = std::env::var("SIFTER_RETRY_BASE_DELAY_MS")
            && let Ok(n) = v.parse()
        {
            config.retry_base_delay_ms = n;
        }
        if let Ok(v) = std::env::var("SIFTER_PROVIDER_ENDPOINT") {
            config.provider.endpoint = v;
        }
        if let Ok(v) = std::env::var("SIFTER_PROVIDER_API_KEY") {
            config.provider.api_key = v;
        }
        if let Ok(v) = std::env::var("SIFTER_PROVIDER_MODEL") {
            config.provider.model = v;
        }
        config
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn lease_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lease_timeout_secs as i64)
    }
}

fn default_workers() -> usize {
    4
}
fn default_max_attempts() -> u32 {
    3
}
fn default_attempt_timeout_secs() -> u64 {
    30
}
fn default_lease_timeout_secs() -> u64 {
    90
}
fn default_sweep_interval_secs() -> u64 {
    10
}
fn default_retry_base_delay_ms() -> u64 {
    1000
}
fn default_retry_multiplier() -> f64 {
    2.0
}
fn default_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-4o".to_string()
}
