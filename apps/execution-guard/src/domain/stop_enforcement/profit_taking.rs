//! Partial profit at the first R target.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::domain::portfolio::Position;
use crate::domain::shared::DomainError;

use super::r_multiple::r_multiple;

/// Partial exit parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitTakingPolicy {
    /// Profit in R that triggers the partial.
    pub first_target_r: Decimal,
    /// Fraction of the position to sell.
    pub partial_pct: Decimal,
}

impl Default for ProfitTakingPolicy {
    fn default() -> Self {
        Self {
            first_target_r: dec!(1.5),
            partial_pct: dec!(0.4),
        }
    }
}

/// What the partial exit rule wants done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialExitDecision {
    /// The partial was already taken for this position.
    AlreadyTaken,
    /// Target not reached.
    NotReached {
        /// Current profit in R.
        r: Decimal,
    },
    /// Rounded quantity is zero or the whole position.
    Unsplittable {
        /// Rounded partial quantity.
        qty: Decimal,
    },
    /// Sell `qty` shares.
    Take {
        /// Shares to sell.
        qty: Decimal,
        /// Remaining shares.
        remaining: Decimal,
        /// Current profit in R.
        r: Decimal,
    },
}

impl ProfitTakingPolicy {
    /// Evaluate the rule for a position.
    #[must_use]
    pub fn evaluate(&self, position: &Position, floor_pct: Decimal) -> PartialExitDecision {
        if position.partial_taken {
            return PartialExitDecision::AlreadyTaken;
        }
        let r = r_multiple(position, floor_pct);
        if r < self.first_target_r {
            return PartialExitDecision::NotReached { r };
        }
        let qty = (position.quantity * self.partial_pct).floor();
        if qty <= Decimal::ZERO || qty >= position.quantity {
            return PartialExitDecision::Unsplittable { qty };
        }
        PartialExitDecision::Take {
            qty,
            remaining: position.quantity - qty,
            r,
        }
    }

    /// Check internal consistency.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistent parameter.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.first_target_r <= Decimal::ZERO {
            return Err(DomainError::invalid("first_target_r", "must be positive"));
        }
        if self.partial_pct <= Decimal::ZERO || self.partial_pct >= Decimal::ONE {
            return Err(DomainError::invalid("partial_pct", "must be in (0, 1)"));
        }
        Ok(())
    }
}
