//! Open position and its protection annotations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::order_execution::OrderSide;
use crate::domain::shared::{DomainError, Symbol};

/// Position direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    /// Long position (buy to open).
    Long,
    /// Short position (sell to open).
    Short,
}

impl PositionSide {
    /// Side of the order that opens or adds to this position.
    #[must_use]
    pub const fn opening_side(&self) -> OrderSide {
        match self {
            Self::Long => OrderSide::Buy,
            Self::Short => OrderSide::Sell,
        }
    }

    /// Side of the order that reduces or closes this position.
    #[must_use]
    pub const fn closing_side(&self) -> OrderSide {
        match self {
            Self::Long => OrderSide::Sell,
            Self::Short => OrderSide::Buy,
        }
    }

    /// Returns true if `candidate` protects more than `current`.
    ///
    /// Long stops protect more when higher, short stops when lower.
    #[must_use]
    pub fn is_more_protective(&self, candidate: Decimal, current: Decimal) -> bool {
        match self {
            Self::Long => candidate > current,
            Self::Short => candidate < current,
        }
    }

    /// The more protective of two stop levels.
    #[must_use]
    pub fn most_protective(&self, a: Decimal, b: Decimal) -> Decimal {
        if self.is_more_protective(a, b) { a } else { b }
    }

    /// Signed price move in the position's favor.
    #[must_use]
    pub fn favorable_move(&self, from: Decimal, to: Decimal) -> Decimal {
        match self {
            Self::Long => to - from,
            Self::Short => from - to,
        }
    }

    /// Offset `price` by `distance` toward the loss side.
    #[must_use]
    pub fn toward_loss(&self, price: Decimal, distance: Decimal) -> Decimal {
        match self {
            Self::Long => price - distance,
            Self::Short => price + distance,
        }
    }

    /// Offset `price` by `distance` toward the profit side.
    #[must_use]
    pub fn toward_profit(&self, price: Decimal, distance: Decimal) -> Decimal {
        match self {
            Self::Long => price + distance,
            Self::Short => price - distance,
        }
    }
}

impl From<OrderSide> for PositionSide {
    fn from(side: OrderSide) -> Self {
        match side {
            OrderSide::Buy => Self::Long,
            OrderSide::Sell => Self::Short,
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short => write!(f, "short"),
        }
    }
}

/// An open position.
///
/// Quantity and prices come from the brokerage. Stop, target, initial stop
/// and the partial flag are local annotations that survive position syncs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Instrument.
    pub symbol: Symbol,
    /// Direction.
    pub side: PositionSide,
    /// Absolute share count.
    pub quantity: Decimal,
    /// Average entry price.
    pub avg_entry_price: Decimal,
    /// Last price.
    pub current_price: Decimal,
    /// Unrealized P/L in dollars.
    pub unrealized_pl: Decimal,
    /// Desired stop-loss level.
    pub stop_loss: Option<Decimal>,
    /// Desired take-profit level.
    pub take_profit: Option<Decimal>,
    /// First protective level; defines 1R.
    pub initial_stop: Option<Decimal>,
    /// Whether the partial profit has been taken.
    #[serde(default)]
    pub partial_taken: bool,
    /// When the position was opened (first observed).
    pub opened_at: DateTime<Utc>,
}

impl Position {
    /// Create a position from broker-owned fields.
    #[must_use]
    pub fn new(
        symbol: Symbol,
        side: PositionSide,
        quantity: Decimal,
        avg_entry_price: Decimal,
        current_price: Decimal,
    ) -> Self {
        let unrealized_pl = side.favorable_move(avg_entry_price, current_price) * quantity;
        Self {
            symbol,
            side,
            quantity,
            avg_entry_price,
            current_price,
            unrealized_pl,
            stop_loss: None,
            take_profit: None,
            initial_stop: None,
            partial_taken: false,
            opened_at: Utc::now(),
        }
    }

    /// Set the stop and target, recording the stop as initial if none exists.
    #[must_use]
    pub fn with_levels(mut self, stop_loss: Option<Decimal>, take_profit: Option<Decimal>) -> Self {
        self.stop_loss = stop_loss;
        self.take_profit = take_profit;
        if self.initial_stop.is_none() {
            self.initial_stop = stop_loss;
        }
        self
    }

    /// Unrealized return as a fraction of entry (0.02 = +2%).
    #[must_use]
    pub fn unrealized_return(&self) -> Decimal {
        if self.avg_entry_price.is_zero() {
            return Decimal::ZERO;
        }
        self.side
            .favorable_move(self.avg_entry_price, self.current_price)
            / self.avg_entry_price
    }

    /// Position notional at the current price.
    #[must_use]
    pub fn market_value(&self) -> Decimal {
        self.quantity * self.current_price
    }

    /// Carry local annotations over from the previous view of this position.
    pub fn inherit_annotations(&mut self, previous: &Self) {
        self.stop_loss = previous.stop_loss;
        self.take_profit = previous.take_profit;
        self.initial_stop = previous.initial_stop;
        self.partial_taken = previous.partial_taken;
        self.opened_at = previous.opened_at;
    }

    /// Fold an opening fill into the position. Reductions are observed
    /// through position sync instead.
    ///
    /// # Errors
    ///
    /// Returns an error for a non-positive fill quantity.
    pub fn apply_opening_fill(&mut self, qty: Decimal, price: Decimal) -> Result<(), DomainError> {
        if qty <= Decimal::ZERO {
            return Err(DomainError::invalid("qty", "fill quantity must be positive"));
        }
        let total = self.quantity + qty;
        self.avg_entry_price =
            (self.avg_entry_price * self.quantity + price * qty) / total;
        self.quantity = total;
        self.current_price = price;
        self.unrealized_pl =
            self.side.favorable_move(self.avg_entry_price, self.current_price) * self.quantity;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn long(entry: Decimal, current: Decimal) -> Position {
        Position::new(Symbol::new("AAPL"), PositionSide::Long, dec!(100), entry, current)
    }

    #[test]
    fn more_protective_is_direction_aware() {
        assert!(PositionSide::Long.is_more_protective(dec!(49), dec!(48)));
        assert!(!PositionSide::Long.is_more_protective(dec!(47), dec!(48)));
        assert!(PositionSide::Short.is_more_protective(dec!(51), dec!(52)));
        assert!(!PositionSide::Short.is_more_protective(dec!(53), dec!(52)));
        assert!(!PositionSide::Long.is_more_protective(dec!(48), dec!(48)));
    }

    #[test]
    fn offsets_follow_direction() {
        assert_eq!(PositionSide::Long.toward_loss(dec!(50), dec!(1)), dec!(49));
        assert_eq!(PositionSide::Short.toward_loss(dec!(50), dec!(1)), dec!(51));
        assert_eq!(PositionSide::Long.toward_profit(dec!(50), dec!(1)), dec!(51));
        assert_eq!(PositionSide::Short.toward_profit(dec!(50), dec!(1)), dec!(49));
    }

    #[test]
    fn unrealized_return_long_and_short() {
        assert_eq!(long(dec!(50), dec!(51)).unrealized_return(), dec!(0.02));

        let short = Position::new(
            Symbol::new("TSLA"),
            PositionSide::Short,
            dec!(10),
            dec!(200),
            dec!(190),
        );
        assert_eq!(short.unrealized_return(), dec!(0.05));
        assert_eq!(short.unrealized_pl, dec!(100));
    }

    #[test]
    fn with_levels_records_initial_stop_once() {
        let p = long(dec!(50), dec!(50)).with_levels(Some(dec!(48)), Some(dec!(54)));
        assert_eq!(p.initial_stop, Some(dec!(48)));

        let p = p.with_levels(Some(dec!(49)), Some(dec!(54)));
        assert_eq!(p.initial_stop, Some(dec!(48)));
        assert_eq!(p.stop_loss, Some(dec!(49)));
    }

    #[test]
    fn opening_fill_averages_entry() {
        let mut p = long(dec!(50), dec!(50));
        p.apply_opening_fill(dec!(100), dec!(52)).unwrap();
        assert_eq!(p.quantity, dec!(200));
        assert_eq!(p.avg_entry_price, dec!(51));
    }

    #[test]
    fn opening_fill_rejects_non_positive_qty() {
        let mut p = long(dec!(50), dec!(50));
        assert!(p.apply_opening_fill(Decimal::ZERO, dec!(52)).is_err());
    }
}
