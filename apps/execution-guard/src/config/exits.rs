//! Exit adjuster settings.

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::application::services::{ProfitTakingConfig, TrailingConfig};
use crate::domain::stop_enforcement::{ProfitTakingPolicy, TrailingPolicy};

/// Exit adjusters configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitsSection {
    /// Pass cadence.
    #[serde(default = "default_exits_interval_secs")]
    pub interval_secs: u64,
    /// Trailing stop manager.
    #[serde(default)]
    pub trailing: TrailingSection,
    /// Partial profit taker.
    #[serde(default)]
    pub profit_taking: ProfitTakingSection,
}

impl Default for ExitsSection {
    fn default() -> Self {
        Self {
            interval_secs: default_exits_interval_secs(),
            trailing: TrailingSection::default(),
            profit_taking: ProfitTakingSection::default(),
        }
    }
}

impl ExitsSection {
    /// Pass cadence.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Trailing stop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailingSection {
    /// Log decisions without acting.
    #[serde(default = "default_shadow_mode")]
    pub shadow_mode: bool,
    /// Symbols managed live; the rest run in shadow.
    #[serde(default = "default_max_managed")]
    pub max_positions: usize,
    /// Profit in R at which trailing starts.
    #[serde(default = "default_activation_r")]
    pub activation_r: Decimal,
    /// ATR trail multiple.
    #[serde(default = "default_trail_atr_multiplier")]
    pub atr_multiplier: Decimal,
    /// Trail distance in R.
    #[serde(default = "default_r_distance")]
    pub r_distance: Decimal,
    /// Smallest move worth a replace.
    #[serde(default = "default_min_step")]
    pub min_step: Decimal,
}

impl Default for TrailingSection {
    fn default() -> Self {
        Self {
            shadow_mode: default_shadow_mode(),
            max_positions: default_max_managed(),
            activation_r: default_activation_r(),
            atr_multiplier: default_trail_atr_multiplier(),
            r_distance: default_r_distance(),
            min_step: default_min_step(),
        }
    }
}

impl TrailingSection {
    /// Domain trailing rule.
    #[must_use]
    pub const fn to_trailing_policy(&self) -> TrailingPolicy {
        TrailingPolicy {
            activation_r: self.activation_r,
            atr_multiplier: self.atr_multiplier,
            r_distance: self.r_distance,
            min_step: self.min_step,
        }
    }

    /// Manager configuration; `floor_pct` comes from the protection section.
    #[must_use]
    pub const fn to_trailing_config(&self, floor_pct: Decimal) -> TrailingConfig {
        TrailingConfig {
            policy: self.to_trailing_policy(),
            floor_pct,
            shadow_mode: self.shadow_mode,
            max_positions: self.max_positions,
        }
    }
}

/// Partial profit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfitTakingSection {
    /// Log decisions without acting.
    #[serde(default = "default_shadow_mode")]
    pub shadow_mode: bool,
    /// Symbols managed live; the rest run in shadow.
    #[serde(default = "default_max_managed")]
    pub max_positions: usize,
    /// Profit in R that triggers the partial.
    #[serde(default = "default_first_target_r")]
    pub first_target_r: Decimal,
    /// Fraction sold.
    #[serde(default = "default_partial_pct")]
    pub partial_pct: Decimal,
}

impl Default for ProfitTakingSection {
    fn default() -> Self {
        Self {
            shadow_mode: default_shadow_mode(),
            max_positions: default_max_managed(),
            first_target_r: default_first_target_r(),
            partial_pct: default_partial_pct(),
        }
    }
}

impl ProfitTakingSection {
    /// Domain partial exit rule.
    #[must_use]
    pub const fn to_profit_taking_policy(&self) -> ProfitTakingPolicy {
        ProfitTakingPolicy {
            first_target_r: self.first_target_r,
            partial_pct: self.partial_pct,
        }
    }

    /// Profit taker configuration; `floor_pct` comes from the protection section.
    #[must_use]
    pub const fn to_profit_taking_config(&self, floor_pct: Decimal) -> ProfitTakingConfig {
        ProfitTakingConfig {
            policy: self.to_profit_taking_policy(),
            floor_pct,
            shadow_mode: self.shadow_mode,
            max_positions: self.max_positions,
        }
    }
}

const fn default_exits_interval_secs() -> u64 {
    30
}

// New adjusters start in shadow until explicitly promoted.
const fn default_shadow_mode() -> bool {
    true
}

const fn default_max_managed() -> usize {
    3
}

const fn default_activation_r() -> Decimal {
    Decimal::ONE
}

fn default_trail_atr_multiplier() -> Decimal {
    dec!(2.0)
}

const fn default_r_distance() -> Decimal {
    Decimal::ONE
}

fn default_min_step() -> Decimal {
    dec!(0.05)
}

fn default_first_target_r() -> Decimal {
    dec!(1.5)
}

fn default_partial_pct() -> Decimal {
    dec!(0.4)
}
