//! Risk gate, sizing, signal quality and advisory settings.

use std::collections::HashMap;
use std::time::Duration;

use chrono::NaiveTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::application::services::RiskConfig;
use crate::domain::risk_management::{
    ConfidenceTier, HighRiskPolicy, SignalQualityPolicy, SizingPolicy, TrendMultipliers,
};
use crate::domain::shared::Symbol;

/// Risk gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSection {
    /// Initial value of the trading switch.
    #[serde(default = "default_true")]
    pub trading_enabled: bool,
    /// Reject proposals while the market is closed.
    #[serde(default = "default_true")]
    pub require_market_open: bool,
    /// Maximum concurrently open positions.
    #[serde(default = "default_max_positions")]
    pub max_positions: usize,
    /// Largest position notional as a fraction of equity.
    #[serde(default = "default_max_position_equity_pct")]
    pub max_position_equity_pct: Decimal,
    /// Daily loss fraction that trips the circuit breaker.
    #[serde(default = "default_daily_loss_limit_pct")]
    pub daily_loss_limit_pct: Decimal,
    /// Notional fraction of equity above which a trade is high-risk.
    #[serde(default = "default_high_risk_equity_pct")]
    pub high_risk_equity_pct: Decimal,
    /// Symbol to sector map.
    #[serde(default)]
    pub sectors: HashMap<String, String>,
}

impl Default for RiskSection {
    fn default() -> Self {
        Self {
            trading_enabled: true,
            require_market_open: true,
            max_positions: default_max_positions(),
            max_position_equity_pct: default_max_position_equity_pct(),
            daily_loss_limit_pct: default_daily_loss_limit_pct(),
            high_risk_equity_pct: default_high_risk_equity_pct(),
            sectors: HashMap::new(),
        }
    }
}

/// Sizing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingSection {
    /// Equity fraction risked per trade before multipliers.
    #[serde(default = "default_base_risk_pct")]
    pub base_risk_pct: Decimal,
    /// ATR multiple used as stop distance when sizing.
    #[serde(default = "default_atr_stop_multiplier")]
    pub atr_stop_multiplier: Decimal,
    /// Stop distance as a fraction of price when ATR is missing.
    #[serde(default = "default_fallback_stop_pct")]
    pub fallback_stop_pct: Decimal,
    /// Confidence tiers, highest threshold first.
    #[serde(default = "default_confidence_tiers")]
    pub confidence_tiers: Vec<ConfidenceTier>,
    /// Multiplier below the lowest tier.
    #[serde(default = "default_one")]
    pub base_confidence_multiplier: Decimal,
    /// Trend aligned with the trade.
    #[serde(default = "default_trend_aligned")]
    pub trend_aligned: Decimal,
    /// Trend against the trade.
    #[serde(default = "default_trend_counter")]
    pub trend_counter: Decimal,
    /// No clear trend.
    #[serde(default = "default_one")]
    pub trend_neutral: Decimal,
    /// Multiplier by number of open positions already in the sector.
    #[serde(default = "default_sector_multipliers")]
    pub sector_multipliers: Vec<Decimal>,
    /// Cap on the raw product.
    #[serde(default = "default_raw_cap")]
    pub raw_cap: Decimal,
    /// Lower clamp of the effective multiplier.
    #[serde(default = "default_min_multiplier")]
    pub min_multiplier: Decimal,
    /// Upper clamp of the effective multiplier.
    #[serde(default = "default_max_multiplier")]
    pub max_multiplier: Decimal,
}

impl Default for SizingSection {
    fn default() -> Self {
        Self {
            base_risk_pct: default_base_risk_pct(),
            atr_stop_multiplier: default_atr_stop_multiplier(),
            fallback_stop_pct: default_fallback_stop_pct(),
            confidence_tiers: default_confidence_tiers(),
            base_confidence_multiplier: Decimal::ONE,
            trend_aligned: default_trend_aligned(),
            trend_counter: default_trend_counter(),
            trend_neutral: Decimal::ONE,
            sector_multipliers: default_sector_multipliers(),
            raw_cap: default_raw_cap(),
            min_multiplier: default_min_multiplier(),
            max_multiplier: default_max_multiplier(),
        }
    }
}

impl SizingSection {
    /// Convert to the domain sizing policy.
    #[must_use]
    pub fn to_sizing_policy(&self) -> SizingPolicy {
        SizingPolicy {
            base_risk_pct: self.base_risk_pct,
            atr_stop_multiplier: self.atr_stop_multiplier,
            fallback_stop_pct: self.fallback_stop_pct,
            confidence_tiers: self.confidence_tiers.clone(),
            base_confidence_multiplier: self.base_confidence_multiplier,
            trend: TrendMultipliers {
                aligned: self.trend_aligned,
                counter: self.trend_counter,
                neutral: self.trend_neutral,
            },
            sector_multipliers: self.sector_multipliers.clone(),
            raw_cap: self.raw_cap,
            min_multiplier: self.min_multiplier,
            max_multiplier: self.max_multiplier,
        }
    }
}

/// Signal quality thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalQualitySection {
    /// Minimum ADX.
    #[serde(default = "default_min_adx")]
    pub min_adx: f64,
    /// Minimum ADX in a choppy regime.
    #[serde(default = "default_choppy_min_adx")]
    pub choppy_min_adx: f64,
    /// Minimum volume ratio.
    #[serde(default = "default_min_volume_ratio")]
    pub min_volume_ratio: f64,
    /// Minimum volume ratio during the midday window.
    #[serde(default = "default_midday_min_volume_ratio")]
    pub midday_min_volume_ratio: f64,
    /// Midday window start, exchange-local.
    #[serde(default = "default_midday_start")]
    pub midday_start: NaiveTime,
    /// Midday window end, exchange-local.
    #[serde(default = "default_midday_end")]
    pub midday_end: NaiveTime,
}

impl Default for SignalQualitySection {
    fn default() -> Self {
        Self {
            min_adx: default_min_adx(),
            choppy_min_adx: default_choppy_min_adx(),
            min_volume_ratio: default_min_volume_ratio(),
            midday_min_volume_ratio: default_midday_min_volume_ratio(),
            midday_start: default_midday_start(),
            midday_end: default_midday_end(),
        }
    }
}

impl SignalQualitySection {
    /// Convert to the domain policy.
    #[must_use]
    pub const fn to_signal_quality_policy(&self) -> SignalQualityPolicy {
        SignalQualityPolicy {
            min_adx: self.min_adx,
            choppy_min_adx: self.choppy_min_adx,
            min_volume_ratio: self.min_volume_ratio,
            midday_min_volume_ratio: self.midday_min_volume_ratio,
            midday_start: self.midday_start,
            midday_end: self.midday_end,
        }
    }
}

/// Advisory veto settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorySection {
    /// Consult the advisor on high-risk trades.
    #[serde(default)]
    pub enabled: bool,
    /// Bound on one advisory call.
    #[serde(default = "default_advisory_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for AdvisorySection {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_ms: default_advisory_timeout_ms(),
        }
    }
}

/// Assemble the risk manager configuration from its sections.
#[must_use]
pub fn to_risk_config(
    risk: &RiskSection,
    sizing: &SizingSection,
    signal_quality: &SignalQualitySection,
    advisory: &AdvisorySection,
) -> RiskConfig {
    RiskConfig {
        trading_enabled: risk.trading_enabled,
        require_market_open: risk.require_market_open,
        max_positions: risk.max_positions,
        max_position_equity_pct: risk.max_position_equity_pct,
        daily_loss_limit_pct: risk.daily_loss_limit_pct,
        sizing: sizing.to_sizing_policy(),
        signal_quality: signal_quality.to_signal_quality_policy(),
        high_risk: HighRiskPolicy {
            equity_pct: risk.high_risk_equity_pct,
        },
        advisory_timeout: Duration::from_millis(advisory.timeout_ms),
        sectors: risk
            .sectors
            .iter()
            .map(|(symbol, sector)| (Symbol::new(symbol), sector.clone()))
            .collect(),
    }
}

const fn default_true() -> bool {
    true
}

const fn default_max_positions() -> usize {
    10
}

fn default_max_position_equity_pct() -> Decimal {
    dec!(0.10)
}

fn default_daily_loss_limit_pct() -> Decimal {
    dec!(0.03)
}

fn default_high_risk_equity_pct() -> Decimal {
    dec!(0.05)
}

fn default_base_risk_pct() -> Decimal {
    dec!(0.01)
}

fn default_atr_stop_multiplier() -> Decimal {
    dec!(2.0)
}

fn default_fallback_stop_pct() -> Decimal {
    dec!(0.02)
}

fn default_confidence_tiers() -> Vec<ConfidenceTier> {
    SizingPolicy::default().confidence_tiers
}

const fn default_one() -> Decimal {
    Decimal::ONE
}

fn default_trend_aligned() -> Decimal {
    dec!(1.2)
}

fn default_trend_counter() -> Decimal {
    dec!(0.6)
}

fn default_sector_multipliers() -> Vec<Decimal> {
    vec![Decimal::ONE, dec!(0.85), dec!(0.7)]
}

fn default_raw_cap() -> Decimal {
    dec!(2.5)
}

fn default_min_multiplier() -> Decimal {
    dec!(0.5)
}

fn default_max_multiplier() -> Decimal {
    dec!(1.5)
}

const fn default_min_adx() -> f64 {
    20.0
}

const fn default_choppy_min_adx() -> f64 {
    15.0
}

const fn default_min_volume_ratio() -> f64 {
    1.0
}

const fn default_midday_min_volume_ratio() -> f64 {
    0.7
}

fn default_midday_start() -> NaiveTime {
    NaiveTime::from_hms_opt(11, 30, 0).unwrap_or_default()
}

fn default_midday_end() -> NaiveTime {
    NaiveTime::from_hms_opt(14, 0, 0).unwrap_or_default()
}

const fn default_advisory_timeout_ms() -> u64 {
    3_000
}
