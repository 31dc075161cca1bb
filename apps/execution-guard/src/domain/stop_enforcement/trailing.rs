//! R-gated trailing stop rule.
//!
//! Once profit reaches `activation_r`, the stop trails the price by the more
//! protective of an ATR distance and an R distance, never below breakeven,
//! and only ever in the protective direction.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::domain::portfolio::Position;
use crate::domain::shared::DomainError;

use super::protection::round_stop;
use super::r_multiple::{r_multiple, risk_per_share};

/// Trailing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrailingPolicy {
    /// Profit in R at which trailing starts.
    pub activation_r: Decimal,
    /// ATR distance multiplier.
    pub atr_multiplier: Decimal,
    /// Trail distance in R.
    pub r_distance: Decimal,
    /// Smallest move worth a replace.
    pub min_step: Decimal,
}

impl Default for TrailingPolicy {
    fn default() -> Self {
        Self {
            activation_r: Decimal::ONE,
            atr_multiplier: dec!(2.0),
            r_distance: Decimal::ONE,
            min_step: dec!(0.05),
        }
    }
}

/// What the trailing rule wants done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailingDecision {
    /// Profit below activation.
    NotActive {
        /// Current profit in R.
        r: Decimal,
    },
    /// Active, but the candidate does not tighten enough.
    Hold {
        /// Candidate level.
        candidate: Decimal,
    },
    /// Move the stop.
    Tighten {
        /// Previous stop.
        from: Option<Decimal>,
        /// New stop.
        to: Decimal,
        /// Current profit in R.
        r: Decimal,
    },
}

impl TrailingPolicy {
    /// Evaluate the rule for a position.
    #[must_use]
    pub fn evaluate(
        &self,
        position: &Position,
        atr: Option<Decimal>,
        current_stop: Option<Decimal>,
        floor_pct: Decimal,
    ) -> TrailingDecision {
        let r = r_multiple(position, floor_pct);
        if r < self.activation_r {
            return TrailingDecision::NotActive { r };
        }

        let side = position.side;
        let price = position.current_price;
        let by_r = side.toward_loss(price, risk_per_share(position, floor_pct) * self.r_distance);
        let mut candidate = match atr {
            Some(atr) if atr > Decimal::ZERO => {
                side.most_protective(by_r, side.toward_loss(price, atr * self.atr_multiplier))
            }
            _ => by_r,
        };
        candidate = round_stop(side, side.most_protective(candidate, position.avg_entry_price));

        match current_stop {
            Some(stop)
                if !side.is_more_protective(candidate, stop)
                    || side.favorable_move(stop, candidate) < self.min_step =>
            {
                TrailingDecision::Hold { candidate }
            }
            from => TrailingDecision::Tighten {
                from,
                to: candidate,
                r,
            },
        }
    }

    /// Check internal consistency.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistent parameter.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.activation_r <= Decimal::ZERO {
            return Err(DomainError::invalid("activation_r", "must be positive"));
        }
        if self.atr_multiplier <= Decimal::ZERO || self.r_distance <= Decimal::ZERO {
            return Err(DomainError::invalid("trailing distance", "must be positive"));
        }
        if self.min_step < Decimal::ZERO {
            return Err(DomainError::invalid("min_step", "must be non-negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::portfolio::PositionSide;
    use crate::domain::shared::Symbol;

    const FLOOR: Decimal = dec!(0.015);

    fn long(current: Decimal) -> Position {
        Position::new(Symbol::new("AAPL"), PositionSide::Long, dec!(100), dec!(100), current)
            .with_levels(Some(dec!(96)), None)
    }

    #[test]
    fn inactive_below_one_r() {
        let d = TrailingPolicy::default().evaluate(&long(dec!(103)), None, Some(dec!(96)), FLOOR);
        assert_eq!(d, TrailingDecision::NotActive { r: dec!(0.75) });
    }

    #[test]
    fn tighter_of_atr_and_r_distance_wins() {
        // 2R up: R trail = 108 - 4 = 104, ATR trail = 108 - 2*1.5 = 105.
        let d = TrailingPolicy::default().evaluate(&long(dec!(108)), Some(dec!(1.5)), Some(dec!(96)), FLOOR);
        assert_eq!(
            d,
            TrailingDecision::Tighten {
                from: Some(dec!(96)),
                to: dec!(105),
                r: dec!(2)
            }
        );
    }

    #[test]
    fn never_below_breakeven_once_active() {
        // 1R up with a wide ATR: both candidates at or below entry.
        let d = TrailingPolicy::default().evaluate(&long(dec!(104)), Some(dec!(5)), Some(dec!(96)), FLOOR);
        assert!(matches!(d, TrailingDecision::Tighten { to, .. } if to == dec!(100)));
    }

    #[test]
    fn never_loosens() {
        let d = TrailingPolicy::default().evaluate(&long(dec!(108)), None, Some(dec!(106)), FLOOR);
        assert_eq!(d, TrailingDecision::Hold { candidate: dec!(104) });
    }

    #[test]
    fn ignores_moves_below_min_step() {
        let d = TrailingPolicy::default().evaluate(&long(dec!(108)), None, Some(dec!(103.98)), FLOOR);
        assert!(matches!(d, TrailingDecision::Hold { .. }));
    }

    #[test]
    fn short_trails_downward() {
        let p = Position::new(Symbol::new("TSLA"), PositionSide::Short, dec!(10), dec!(200), dec!(190))
            .with_levels(Some(dec!(205)), None);
        let d = TrailingPolicy::default().evaluate(&p, None, Some(dec!(205)), FLOOR);
        assert!(matches!(d, TrailingDecision::Tighten { to, .. } if to == dec!(195)));
    }
}
