//! Range checks applied after parsing and credential checks applied at startup.

use rust_decimal::Decimal;

use crate::domain::shared::DomainError;

use super::{Config, ConfigError};

/// Validate configuration values.
///
/// # Errors
///
/// Returns the first out-of-range setting as a [`ConfigError::ValidationError`].
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let risk = &config.risk;
    fraction("risk.max_position_equity_pct", risk.max_position_equity_pct)?;
    fraction("risk.daily_loss_limit_pct", risk.daily_loss_limit_pct)?;
    fraction("risk.high_risk_equity_pct", risk.high_risk_equity_pct)?;
    if risk.max_positions == 0 {
        return Err(invalid("risk.max_positions must be at least 1"));
    }

    config
        .sizing
        .to_sizing_policy()
        .validate()
        .map_err(|e| domain("sizing", &e))?;

    let quality = &config.signal_quality;
    if quality.min_adx < 0.0 || quality.choppy_min_adx < 0.0 {
        return Err(invalid("signal_quality ADX thresholds must be non-negative"));
    }
    if quality.midday_start >= quality.midday_end {
        return Err(invalid("signal_quality.midday_start must precede midday_end"));
    }

    if config.orders.client_id_prefix.is_empty() {
        return Err(invalid("orders.client_id_prefix must not be empty"));
    }
    if config.orders.price_bucket <= Decimal::ZERO {
        return Err(invalid("orders.price_bucket must be positive"));
    }
    if config.orders.decision_window_secs == 0 {
        return Err(invalid("orders.decision_window_secs must be positive"));
    }

    config
        .protection
        .to_stop_policy()
        .validate()
        .map_err(|e| domain("protection", &e))?;
    config
        .exits
        .trailing
        .to_trailing_policy()
        .validate()
        .map_err(|e| domain("exits.trailing", &e))?;
    config
        .exits
        .profit_taking
        .to_profit_taking_policy()
        .validate()
        .map_err(|e| domain("exits.profit_taking", &e))?;

    for (name, secs) in [
        ("protection.interval_secs", config.protection.interval_secs),
        ("sync.interval_secs", config.sync.interval_secs),
        ("exits.interval_secs", config.exits.interval_secs),
        ("regime.cache_ttl_secs", config.regime.cache_ttl_secs),
    ] {
        if secs == 0 {
            return Err(invalid(&format!("{name} must be positive")));
        }
    }
    if config.regime.fetch_timeout_ms == 0 {
        return Err(invalid("regime.fetch_timeout_ms must be positive"));
    }
    if config.protection.interval_secs >= config.sync.interval_secs {
        return Err(invalid(
            "protection.interval_secs must be shorter than sync.interval_secs",
        ));
    }

    if config.broker.max_attempts == 0 {
        return Err(invalid("broker.max_attempts must be at least 1"));
    }
    if config.broker.call_timeout_ms < config.broker.http_timeout_ms {
        return Err(invalid(
            "broker.call_timeout_ms must not be shorter than http_timeout_ms",
        ));
    }

    if config.regime.multiplier <= Decimal::ZERO || config.regime.sentiment_multiplier <= Decimal::ZERO
    {
        return Err(invalid("regime multipliers must be positive"));
    }

    Ok(())
}

/// Require brokerage credentials before connecting.
///
/// Paper and live accounts both need a key pair.
///
/// # Errors
///
/// Returns [`ConfigError::MissingEnvVar`] naming every missing credential.
pub fn require_credentials(config: &Config) -> Result<(), ConfigError> {
    let mut missing = Vec::new();
    if config.broker.api_key.is_empty() {
        missing.push("ALPACA_KEY");
    }
    if config.broker.api_secret.is_empty() {
        missing.push("ALPACA_SECRET");
    }
    if missing.is_empty() {
        if config.broker.environment.is_live()
            && config
                .broker
                .base_url
                .as_deref()
                .is_some_and(|url| url.contains("paper"))
        {
            tracing::warn!("LIVE environment configured with a paper API URL");
        }
        return Ok(());
    }
    Err(ConfigError::MissingEnvVar(format!(
        "{} ({} credentials, set them in the environment or under broker in config.yaml)",
        missing.join(", "),
        config.broker.environment,
    )))
}

fn fraction(name: &str, value: Decimal) -> Result<(), ConfigError> {
    if value <= Decimal::ZERO || value >= Decimal::ONE {
        return Err(invalid(&format!("{name} must be in (0, 1)")));
    }
    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

fn domain(section: &str, err: &DomainError) -> ConfigError {
    ConfigError::ValidationError(format!("{section}: {err}"))
}
