//! Brokerage connection settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::infrastructure::broker::alpaca::{AlpacaConfig, AlpacaEnvironment, RetryConfig};

/// Brokerage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// API key.
    #[serde(default)]
    pub api_key: String,
    /// API secret.
    #[serde(default)]
    pub api_secret: String,
    /// `paper` or `live`.
    #[serde(default)]
    pub environment: AlpacaEnvironment,
    /// Overrides the environment's trading URL.
    #[serde(default)]
    pub base_url: Option<String>,
    /// HTTP timeout per request.
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
    /// Attempts per request, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Bound on one gateway call, retries included.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            environment: AlpacaEnvironment::default(),
            base_url: None,
            http_timeout_ms: default_http_timeout_ms(),
            max_attempts: default_max_attempts(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

impl BrokerConfig {
    /// Bound on one gateway call.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Convert to the Alpaca adapter configuration.
    #[must_use]
    pub fn to_alpaca_config(&self) -> AlpacaConfig {
        let mut config = AlpacaConfig::new(
            self.api_key.clone(),
            self.api_secret.clone(),
            self.environment,
        )
        .with_timeout(Duration::from_millis(self.http_timeout_ms))
        .with_retry(RetryConfig {
            max_attempts: self.max_attempts,
            ..RetryConfig::default()
        });
        if let Some(url) = self.base_url.as_deref().filter(|u| !u.is_empty()) {
            config = config.with_base_url(url);
        }
        config
    }
}

const fn default_http_timeout_ms() -> u64 {
    5_000
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_call_timeout_ms() -> u64 {
    15_000
}
