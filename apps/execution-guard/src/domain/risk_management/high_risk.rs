//! Deterministic high-risk flags that route a trade to the advisory veto.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::market::TrendAlignment;

/// Why a trade was flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighRiskFlag {
    /// Symbol is in its re-entry cooldown.
    Cooldown,
    /// Notional is a large share of equity.
    LargeNotional,
    /// Trade opposes the trend.
    CounterTrend,
}

impl fmt::Display for HighRiskFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cooldown => write!(f, "cooldown"),
            Self::LargeNotional => write!(f, "large_notional"),
            Self::CounterTrend => write!(f, "counter_trend"),
        }
    }
}

/// Flagging thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighRiskPolicy {
    /// Notional at or above this fraction of equity is flagged.
    pub equity_pct: Decimal,
}

impl Default for HighRiskPolicy {
    fn default() -> Self {
        Self {
            equity_pct: dec!(0.05),
        }
    }
}

impl HighRiskPolicy {
    /// Flags raised by a trade. Empty means not high risk.
    #[must_use]
    pub fn flags(
        &self,
        in_cooldown: bool,
        notional: Decimal,
        equity: Decimal,
        alignment: TrendAlignment,
    ) -> Vec<HighRiskFlag> {
        let mut flags = Vec::new();
        if in_cooldown {
            flags.push(HighRiskFlag::Cooldown);
        }
        if equity > Decimal::ZERO && notional >= equity * self.equity_pct {
            flags.push(HighRiskFlag::LargeNotional);
        }
        if alignment == TrendAlignment::Counter {
            flags.push(HighRiskFlag::CounterTrend);
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_trade_is_not_flagged() {
        let flags = HighRiskPolicy::default().flags(
            false,
            dec!(1_000),
            dec!(100_000),
            TrendAlignment::Aligned,
        );
        assert!(flags.is_empty());
    }

    #[test]
    fn each_rule_raises_its_flag() {
        let flags = HighRiskPolicy::default().flags(
            true,
            dec!(5_000),
            dec!(100_000),
            TrendAlignment::Counter,
        );
        assert_eq!(
            flags,
            vec![
                HighRiskFlag::Cooldown,
                HighRiskFlag::LargeNotional,
                HighRiskFlag::CounterTrend
            ]
        );
    }
}
