//! Daily-loss circuit breaker.
//!
//! ```text
//! ARMED → TRIPPED   (daily P/L % <= -limit)
//! TRIPPED → ARMED   (manual reset only)
//! ```
//!
//! Once tripped it stays tripped; a recovering account does not re-arm it.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::portfolio::AccountSnapshot;

/// Trip details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripRecord {
    /// Daily P/L fraction that tripped the breaker.
    pub daily_pl_pct: Decimal,
    /// Configured limit.
    pub limit_pct: Decimal,
    /// When it tripped.
    pub tripped_at: DateTime<Utc>,
}

impl std::fmt::Display for TripRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "daily P/L {:.2}% breached -{:.2}% at {}",
            self.daily_pl_pct * Decimal::ONE_HUNDRED,
            self.limit_pct * Decimal::ONE_HUNDRED,
            self.tripped_at.format("%H:%M:%S")
        )
    }
}

/// Latching daily-loss breaker.
#[derive(Debug)]
pub struct DailyLossCircuitBreaker {
    limit_pct: Decimal,
    tripped: AtomicBool,
    record: Mutex<Option<TripRecord>>,
}

impl DailyLossCircuitBreaker {
    /// New armed breaker; `limit_pct` is a positive fraction (0.03 = 3%).
    #[must_use]
    pub fn new(limit_pct: Decimal) -> Self {
        Self {
            limit_pct,
            tripped: AtomicBool::new(false),
            record: Mutex::new(None),
        }
    }

    /// Evaluate against a fresh account snapshot. Returns true if tripped
    /// (now or earlier).
    pub fn evaluate(&self, account: &AccountSnapshot) -> bool {
        if self.is_tripped() {
            return true;
        }
        let pct = account.daily_pl_pct();
        if pct <= -self.limit_pct {
            let record = TripRecord {
                daily_pl_pct: pct,
                limit_pct: self.limit_pct,
                tripped_at: Utc::now(),
            };
            tracing::error!(
                daily_pl = %account.daily_pl(),
                daily_pl_pct = %pct,
                limit_pct = %self.limit_pct,
                "Daily loss circuit breaker tripped"
            );
            *self.record.lock() = Some(record);
            self.tripped.store(true, Ordering::SeqCst);
            return true;
        }
        false
    }

    /// Returns true while tripped.
    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    /// Details of the current trip.
    #[must_use]
    pub fn trip_record(&self) -> Option<TripRecord> {
        self.record.lock().clone()
    }

    /// Re-arm after manual review.
    pub fn reset(&self) {
        let previous = self.record.lock().take();
        self.tripped.store(false, Ordering::SeqCst);
        if let Some(record) = previous {
            tracing::warn!(trip = %record, "Daily loss circuit breaker reset");
        }
    }

    /// Configured limit.
    #[must_use]
    pub const fn limit_pct(&self) -> Decimal {
        self.limit_pct
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account(equity: Decimal) -> AccountSnapshot {
        AccountSnapshot {
            equity,
            last_equity: dec!(100_000),
            cash: equity,
            buying_power: equity,
            day_trading_buying_power: Decimal::ZERO,
            pattern_day_trader: false,
        }
    }

    #[test]
    fn trips_at_limit_and_latches() {
        let breaker = DailyLossCircuitBreaker::new(dec!(0.03));
        assert!(!breaker.evaluate(&account(dec!(98_000))));
        assert!(breaker.evaluate(&account(dec!(97_000))));
        assert!(breaker.is_tripped());
        assert_eq!(
            breaker.trip_record().map(|r| r.daily_pl_pct),
            Some(dec!(-0.03))
        );

        // Recovery does not re-arm.
        assert!(breaker.evaluate(&account(dec!(101_000))));
    }

    #[test]
    fn reset_rearms() {
        let breaker = DailyLossCircuitBreaker::new(dec!(0.03));
        breaker.evaluate(&account(dec!(90_000)));
        breaker.reset();
        assert!(!breaker.is_tripped());
        assert!(breaker.trip_record().is_none());
        assert!(!breaker.evaluate(&account(dec!(99_000))));
    }
}
