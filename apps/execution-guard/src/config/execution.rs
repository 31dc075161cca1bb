//! Order submission, protection, sync and regime settings.

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::application::services::{OrderConfig, ProtectionConfig};
use crate::domain::market::RegimeLabel;
use crate::domain::order_execution::{ClientOrderIdFactory, TimeInForce};
use crate::domain::stop_enforcement::StopPolicy;

/// Order submission configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdersSection {
    /// Attach stop and target legs to entries.
    #[serde(default = "default_use_bracket_orders")]
    pub use_bracket_orders: bool,
    /// Time in force for entries.
    #[serde(default)]
    pub time_in_force: TimeInForce,
    /// Prefix of every client order id.
    #[serde(default = "default_client_id_prefix")]
    pub client_id_prefix: String,
    /// Price bucket width folded into client order ids.
    #[serde(default = "default_price_bucket")]
    pub price_bucket: Decimal,
    /// Decision window folded into client order ids.
    #[serde(default = "default_decision_window_secs")]
    pub decision_window_secs: u64,
}

impl Default for OrdersSection {
    fn default() -> Self {
        Self {
            use_bracket_orders: default_use_bracket_orders(),
            time_in_force: TimeInForce::Day,
            client_id_prefix: default_client_id_prefix(),
            price_bucket: default_price_bucket(),
            decision_window_secs: default_decision_window_secs(),
        }
    }
}

impl OrdersSection {
    /// Client order id factory for these settings.
    #[must_use]
    pub fn to_id_factory(&self) -> ClientOrderIdFactory {
        ClientOrderIdFactory::new(
            self.client_id_prefix.clone(),
            self.price_bucket,
            self.decision_window_secs,
        )
    }

    /// Order manager configuration.
    #[must_use]
    pub const fn to_order_config(&self, stops: StopPolicy) -> OrderConfig {
        OrderConfig {
            use_bracket_orders: self.use_bracket_orders,
            stops,
            time_in_force: self.time_in_force,
        }
    }
}

/// Protection reconciler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectionSection {
    /// Reconcile cadence.
    #[serde(default = "default_protection_interval_secs")]
    pub interval_secs: u64,
    /// Pause after cancels before new protective orders.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// ATR multiple for repaired stops.
    #[serde(default = "default_atr_multiplier")]
    pub atr_multiplier: Decimal,
    /// Minimum stop distance as a fraction of entry.
    #[serde(default = "default_floor_pct")]
    pub floor_pct: Decimal,
    /// Take-profit distance in multiples of the stop distance.
    #[serde(default = "default_take_profit_r")]
    pub take_profit_r: Decimal,
    /// Return above which a repaired stop is a trailing stop.
    #[serde(default = "default_trailing_activation_pct")]
    pub trailing_activation_pct: Decimal,
    /// Trail for repaired trailing stops, in percent.
    #[serde(default = "default_trail_percent")]
    pub trail_percent: Decimal,
}

impl Default for ProtectionSection {
    fn default() -> Self {
        Self {
            interval_secs: default_protection_interval_secs(),
            settle_delay_ms: default_settle_delay_ms(),
            atr_multiplier: default_atr_multiplier(),
            floor_pct: default_floor_pct(),
            take_profit_r: default_take_profit_r(),
            trailing_activation_pct: default_trailing_activation_pct(),
            trail_percent: default_trail_percent(),
        }
    }
}

impl ProtectionSection {
    /// Stop policy shared by entries, repairs and the exit adjusters.
    #[must_use]
    pub const fn to_stop_policy(&self) -> StopPolicy {
        StopPolicy {
            atr_multiplier: self.atr_multiplier,
            floor_pct: self.floor_pct,
            take_profit_r: self.take_profit_r,
            trailing_activation_pct: self.trailing_activation_pct,
            trail_percent: self.trail_percent,
        }
    }

    /// Reconciler configuration.
    #[must_use]
    pub const fn to_protection_config(&self) -> ProtectionConfig {
        ProtectionConfig {
            stops: self.to_stop_policy(),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
        }
    }

    /// Reconcile cadence.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Position sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSection {
    /// Sync cadence.
    #[serde(default = "default_sync_interval_secs")]
    pub interval_secs: u64,
    /// Re-entry cooldown after a losing close.
    #[serde(default = "default_loss_cooldown_secs")]
    pub loss_cooldown_secs: u64,
    /// How long shutdown waits for loops to stop.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            interval_secs: default_sync_interval_secs(),
            loss_cooldown_secs: default_loss_cooldown_secs(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl SyncSection {
    /// Sync cadence.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Re-entry cooldown.
    #[must_use]
    pub const fn loss_cooldown(&self) -> Duration {
        Duration::from_secs(self.loss_cooldown_secs)
    }

    /// Shutdown join bound.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Regime glue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeSection {
    /// How long a regime or sentiment reading is reused.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Upper bound on one provider call, in milliseconds.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    /// Label reported by the static provider.
    #[serde(default)]
    pub label: RegimeLabel,
    /// Multiplier reported by the static provider.
    #[serde(default = "default_regime_multiplier")]
    pub multiplier: Decimal,
    /// Sentiment multiplier reported by the static provider.
    #[serde(default = "default_regime_multiplier")]
    pub sentiment_multiplier: Decimal,
}

impl Default for RegimeSection {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            label: RegimeLabel::Neutral,
            multiplier: Decimal::ONE,
            sentiment_multiplier: Decimal::ONE,
        }
    }
}

impl RegimeSection {
    /// Reading reuse window.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Provider call timeout.
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

const fn default_use_bracket_orders() -> bool {
    true
}

fn default_client_id_prefix() -> String {
    "eg".to_string()
}

fn default_price_bucket() -> Decimal {
    dec!(0.05)
}

const fn default_decision_window_secs() -> u64 {
    300
}

const fn default_protection_interval_secs() -> u64 {
    5
}

const fn default_settle_delay_ms() -> u64 {
    500
}

fn default_atr_multiplier() -> Decimal {
    dec!(2.0)
}

fn default_floor_pct() -> Decimal {
    dec!(0.015)
}

fn default_take_profit_r() -> Decimal {
    dec!(2.0)
}

fn default_trailing_activation_pct() -> Decimal {
    dec!(0.03)
}

fn default_trail_percent() -> Decimal {
    StopPolicy::default().trail_percent
}

const fn default_sync_interval_secs() -> u64 {
    60
}

const fn default_loss_cooldown_secs() -> u64 {
    1_800
}

const fn default_shutdown_timeout_secs() -> u64 {
    10
}

const fn default_cache_ttl_secs() -> u64 {
    3_600
}

const fn default_fetch_timeout_ms() -> u64 {
    2_000
}

const fn default_regime_multiplier() -> Decimal {
    Decimal::ONE
}
