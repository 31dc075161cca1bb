//! Account snapshot and market clock.

use chrono::{DateTime, FixedOffset, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Brokerage account at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Total equity.
    pub equity: Decimal,
    /// Equity at the previous close; baseline for daily P/L.
    pub last_equity: Decimal,
    /// Cash balance.
    pub cash: Decimal,
    /// Overnight buying power.
    pub buying_power: Decimal,
    /// Intraday buying power for pattern day traders.
    pub day_trading_buying_power: Decimal,
    /// Pattern day trader flag.
    pub pattern_day_trader: bool,
}

impl AccountSnapshot {
    /// Today's P/L in dollars.
    #[must_use]
    pub fn daily_pl(&self) -> Decimal {
        self.equity - self.last_equity
    }

    /// Today's P/L as a fraction of the previous close. Zero without a baseline.
    #[must_use]
    pub fn daily_pl_pct(&self) -> Decimal {
        if self.last_equity <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.daily_pl() / self.last_equity
    }

    /// Buying power available to a new order.
    ///
    /// Pattern day traders are bounded by the tighter of the two figures.
    #[must_use]
    pub fn available_buying_power(&self) -> Decimal {
        if self.pattern_day_trader && self.day_trading_buying_power > Decimal::ZERO {
            self.buying_power.min(self.day_trading_buying_power)
        } else {
            self.buying_power
        }
    }
}

/// Market clock as reported by the brokerage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketClock {
    /// Whether the regular session is open.
    pub is_open: bool,
    /// Exchange-local timestamp.
    pub timestamp: DateTime<FixedOffset>,
}

impl MarketClock {
    /// Exchange-local wall-clock time.
    #[must_use]
    pub fn local_time(&self) -> NaiveTime {
        self.timestamp.time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account() -> AccountSnapshot {
        AccountSnapshot {
            equity: dec!(97_000),
            last_equity: dec!(100_000),
            cash: dec!(50_000),
            buying_power: dec!(200_000),
            day_trading_buying_power: dec!(150_000),
            pattern_day_trader: false,
        }
    }

    #[test]
    fn daily_pl_pct_against_last_equity() {
        assert_eq!(account().daily_pl(), dec!(-3_000));
        assert_eq!(account().daily_pl_pct(), dec!(-0.03));
    }

    #[test]
    fn daily_pl_pct_without_baseline_is_zero() {
        let a = AccountSnapshot {
            last_equity: Decimal::ZERO,
            ..account()
        };
        assert_eq!(a.daily_pl_pct(), Decimal::ZERO);
    }

    #[test]
    fn pdt_uses_tighter_buying_power() {
        assert_eq!(account().available_buying_power(), dec!(200_000));
        let pdt = AccountSnapshot {
            pattern_day_trader: true,
            ..account()
        };
        assert_eq!(pdt.available_buying_power(), dec!(150_000));
    }

    #[test]
    fn market_clock_local_time() {
        let clock = MarketClock {
            is_open: true,
            timestamp: DateTime::parse_from_rfc3339("2026-03-02T12:15:00-05:00").unwrap(),
        };
        assert_eq!(clock.local_time(), NaiveTime::from_hms_opt(12, 15, 0).unwrap());
    }
}
