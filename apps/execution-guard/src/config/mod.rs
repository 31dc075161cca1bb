//! Configuration loading, environment variable interpolation and validation.
//!
//! # Usage
//!
//! ```rust,ignore
//! use execution_guard::config::load_config;
//!
//! // `GUARD_CONFIG` or `config.yaml`
//! let config = load_config(None)?;
//!
//! // Explicit path
//! let config = load_config(Some("deploy/guard.yaml"))?;
//!
//! println!("sync every {:?}", config.sync.interval());
//! ```

mod broker;
mod execution;
mod exits;
mod risk;
mod validation;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use broker::BrokerConfig;
pub use execution::{OrdersSection, ProtectionSection, RegimeSection, SyncSection};
pub use exits::{ExitsSection, ProfitTakingSection, TrailingSection};
pub use risk::{AdvisorySection, RiskSection, SignalQualitySection, SizingSection, to_risk_config};
pub use validation::{require_credentials, validate_config};

use crate::application::services::{ProfitTakingConfig, RiskConfig, TrailingConfig};

/// Environment variable overriding the config file path.
pub const CONFIG_PATH_ENV: &str = "GUARD_CONFIG";

/// Path used when neither an explicit path nor `GUARD_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),

    /// Missing required environment variable.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Brokerage connection.
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Risk gates.
    #[serde(default)]
    pub risk: RiskSection,
    /// Position sizing.
    #[serde(default)]
    pub sizing: SizingSection,
    /// Signal quality thresholds.
    #[serde(default)]
    pub signal_quality: SignalQualitySection,
    /// Advisory veto.
    #[serde(default)]
    pub advisory: AdvisorySection,
    /// Order submission.
    #[serde(default)]
    pub orders: OrdersSection,
    /// Protection reconciler.
    #[serde(default)]
    pub protection: ProtectionSection,
    /// Position sync.
    #[serde(default)]
    pub sync: SyncSection,
    /// Exit adjusters.
    #[serde(default)]
    pub exits: ExitsSection,
    /// Regime glue.
    #[serde(default)]
    pub regime: RegimeSection,
}

impl Config {
    /// Risk manager configuration.
    #[must_use]
    pub fn risk_config(&self) -> RiskConfig {
        to_risk_config(&self.risk, &self.sizing, &self.signal_quality, &self.advisory)
    }

    /// Trailing stop manager configuration.
    #[must_use]
    pub const fn trailing_config(&self) -> TrailingConfig {
        self.exits
            .trailing
            .to_trailing_config(self.protection.floor_pct)
    }

    /// Profit taker configuration.
    #[must_use]
    pub const fn profit_taking_config(&self) -> ProfitTakingConfig {
        self.exits
            .profit_taking
            .to_profit_taking_config(self.protection.floor_pct)
    }
}

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Falls back to `GUARD_CONFIG`,
///   then `config.yaml`.
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, str::to_string);

    let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
        path: path.clone(),
        source: e,
    })?;

    let config = load_config_from_string(&contents)?;
    tracing::debug!(path = %path, "Configuration loaded");
    Ok(config)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    // An empty or comment-only document means all defaults.
    let config: Config = if interpolated
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#'))
    {
        Config::default()
    } else {
        serde_yaml_bw::from_str(&interpolated)?
    };
    validate_config(&config)?;
    Ok(config)
}

fn config_path() -> String {
    std::env::var(CONFIG_PATH_ENV)
        .ok()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is compile-time constant; expect() is safe here
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map_or("", |m| m.as_str());
        match std::env::var(&cap[1]) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.to_string(),
        }
    })
    .into_owned()
}
