//! Protective-order detection and repair levels.
//!
//! A position is protected when the brokerage lists a live stop or
//! trailing stop for it on the closing side. Everything here is derived
//! from fetched remote state; nothing is cached between ticks.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::order_execution::{Order, OrderType};
use crate::domain::portfolio::{Position, PositionSide};
use crate::domain::shared::{DomainError, Symbol};

/// Per-symbol outcome of a protection tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtectionStatus {
    /// A live protective order exists.
    Protected,
    /// Protection was missing and has been created.
    Created,
    /// Protection is missing and could not be created this tick.
    Failed,
}

impl fmt::Display for ProtectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protected => write!(f, "protected"),
            Self::Created => write!(f, "created"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Per-symbol record, rebuilt every tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionRecord {
    /// Instrument.
    pub symbol: Symbol,
    /// Outcome.
    pub status: ProtectionStatus,
    /// When the status was derived.
    pub verified_at: DateTime<Utc>,
    /// What happened.
    pub detail: String,
}

impl ProtectionRecord {
    /// Record stamped now.
    #[must_use]
    pub fn now(symbol: Symbol, status: ProtectionStatus, detail: impl Into<String>) -> Self {
        Self {
            symbol,
            status,
            verified_at: Utc::now(),
            detail: detail.into(),
        }
    }
}

/// Result of searching the brokerage orders for a position's protection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionCheck {
    /// Whether a live protective order exists.
    pub has_stop: bool,
    /// Its stop price, if the brokerage reports one.
    pub stop_price: Option<Decimal>,
    /// The protective order itself.
    pub stop_order: Option<Order>,
}

impl ProtectionCheck {
    /// No protection found.
    #[must_use]
    pub const fn missing() -> Self {
        Self {
            has_stop: false,
            stop_price: None,
            stop_order: None,
        }
    }
}

fn guards(position: &Position, order: &Order) -> bool {
    order.symbol == position.symbol && order.side == position.side.closing_side() && order.is_live()
}

/// Live stop and trailing-stop orders protecting `position`, most protective first.
///
/// Orders without a reported stop price rank last.
#[must_use]
pub fn live_protective_orders<'a>(position: &Position, orders: &'a [Order]) -> Vec<&'a Order> {
    let mut found: Vec<&Order> = orders
        .iter()
        .filter(|o| o.order_type.is_protective() && guards(position, o))
        .collect();
    found.sort_by(|a, b| match (a.stop_price, b.stop_price) {
        (Some(x), Some(y)) => {
            if position.side.is_more_protective(x, y) {
                std::cmp::Ordering::Less
            } else if position.side.is_more_protective(y, x) {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        }
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    found
}

/// The position's protection, if any.
#[must_use]
pub fn find_protection(position: &Position, orders: &[Order]) -> ProtectionCheck {
    live_protective_orders(position, orders)
        .first()
        .map_or_else(ProtectionCheck::missing, |order| ProtectionCheck {
            has_stop: true,
            stop_price: order.stop_price,
            stop_order: Some((*order).clone()),
        })
}

/// Live exit-type orders (stop, trailing stop, limit) on the closing side.
#[must_use]
pub fn live_exit_orders<'a>(position: &Position, orders: &'a [Order]) -> Vec<&'a Order> {
    orders
        .iter()
        .filter(|o| o.order_type.is_exit_type() && guards(position, o))
        .collect()
}

/// Round a stop to cents, away from the current price.
#[must_use]
pub fn round_stop(side: PositionSide, price: Decimal) -> Decimal {
    let strategy = match side {
        PositionSide::Long => RoundingStrategy::ToNegativeInfinity,
        PositionSide::Short => RoundingStrategy::ToPositiveInfinity,
    };
    price.round_dp_with_strategy(2, strategy)
}

/// How a repaired stop level was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelSource {
    /// Volatility or floor distance from entry.
    Computed,
    /// The locally desired stop.
    Desired,
    /// Re-anchored below/above the current price.
    Reanchored,
}

/// A repaired stop level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairLevel {
    /// Stop price.
    pub stop_price: Decimal,
    /// Per-share distance used for the target.
    pub distance: Decimal,
    /// How the level was chosen.
    pub source: LevelSource,
}

/// Stop placement parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopPolicy {
    /// Stop distance in ATRs.
    pub atr_multiplier: Decimal,
    /// Minimum stop distance as a fraction of entry.
    pub floor_pct: Decimal,
    /// Target distance in multiples of the stop distance.
    pub take_profit_r: Decimal,
    /// Unrealized return at which repair uses a trailing stop.
    pub trailing_activation_pct: Decimal,
    /// Trail for repaired trailing stops, in percent (2.0 = 2%).
    pub trail_percent: Decimal,
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self {
            atr_multiplier: dec!(2.0),
            floor_pct: dec!(0.015),
            take_profit_r: dec!(2.0),
            trailing_activation_pct: dec!(0.03),
            trail_percent: dec!(2.0),
        }
    }
}

impl StopPolicy {
    /// Stop distance: the wider of the volatility distance and the floor.
    #[must_use]
    pub fn stop_distance(&self, entry: Decimal, atr: Option<Decimal>) -> Decimal {
        let floor = entry * self.floor_pct;
        atr.map_or(floor, |atr| (atr * self.atr_multiplier).max(floor))
    }

    /// Returns true if `level` sits at least the floor away from entry.
    #[must_use]
    pub fn respects_floor(&self, entry: Decimal, level: Decimal) -> bool {
        (entry - level).abs() >= entry * self.floor_pct
    }

    /// Whether repair should use a trailing stop.
    #[must_use]
    pub fn wants_trailing(&self, position: &Position) -> bool {
        position.unrealized_return() >= self.trailing_activation_pct
    }

    /// Level for a repaired fixed stop.
    ///
    /// Starts from the computed distance below entry, prefers a more
    /// protective local stop that still respects the floor, then re-anchors
    /// off the current price if the level would trigger immediately.
    #[must_use]
    pub fn repair_level(&self, position: &Position, atr: Option<Decimal>) -> RepairLevel {
        let side = position.side;
        let entry = position.avg_entry_price;
        let distance = self.stop_distance(entry, atr);
        let mut level = round_stop(side, side.toward_loss(entry, distance));
        let mut source = LevelSource::Computed;

        if let Some(desired) = position.stop_loss
            && side.is_more_protective(desired, level)
            && self.respects_floor(entry, desired)
        {
            level = desired;
            source = LevelSource::Desired;
        }

        if !side.is_more_protective(position.current_price, level) {
            let anchor = side.toward_loss(
                position.current_price,
                position.current_price * self.floor_pct,
            );
            let floored = side.toward_loss(entry, entry * self.floor_pct);
            level = if self.respects_floor(entry, anchor) {
                round_stop(side, anchor)
            } else {
                // Loosest of the two keeps the floor from entry.
                round_stop(
                    side,
                    if side.is_more_protective(anchor, floored) {
                        floored
                    } else {
                        anchor
                    },
                )
            };
            source = LevelSource::Reanchored;
        }

        RepairLevel {
            stop_price: level,
            distance,
            source,
        }
    }

    /// Take-profit level, or `None` when no level lies beyond the current price.
    #[must_use]
    pub fn target_level(&self, position: &Position, distance: Decimal) -> Option<Decimal> {
        let side = position.side;
        let beyond = |p: Decimal| side.favorable_move(position.current_price, p) > Decimal::ZERO;
        position
            .take_profit
            .filter(|tp| beyond(*tp))
            .or_else(|| {
                let computed = side.toward_profit(
                    position.avg_entry_price,
                    distance * self.take_profit_r,
                );
                beyond(computed).then(|| computed.round_dp(2))
            })
    }

    /// Check internal consistency.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistent parameter.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.atr_multiplier <= Decimal::ZERO {
            return Err(DomainError::invalid("atr_multiplier", "must be positive"));
        }
        if self.floor_pct <= Decimal::ZERO || self.floor_pct >= Decimal::ONE {
            return Err(DomainError::invalid("floor_pct", "must be in (0, 1)"));
        }
        if self.take_profit_r <= Decimal::ZERO {
            return Err(DomainError::invalid("take_profit_r", "must be positive"));
        }
        if self.trail_percent <= Decimal::ZERO || self.trail_percent >= Decimal::ONE_HUNDRED {
            return Err(DomainError::invalid("trail_percent", "must be in (0, 100)"));
        }
        Ok(())
    }
}

/// Whether replacing `current` with `desired` is a safe tightening.
///
/// Rejects loosening and levels at or through the current price.
#[must_use]
pub fn is_safe_tightening(
    side: PositionSide,
    current: Decimal,
    desired: Decimal,
    market: Decimal,
) -> bool {
    side.is_more_protective(desired, current) && side.is_more_protective(market, desired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order_execution::order::fixtures::order;
    use crate::domain::order_execution::{OrderSide, OrderStatus};

    fn long(entry: Decimal, current: Decimal) -> Position {
        Position::new(Symbol::new("AAPL"), PositionSide::Long, dec!(100), entry, current)
    }

    fn stop(symbol: &str, price: Decimal, status: OrderStatus) -> Order {
        let mut o = order(symbol, OrderSide::Sell, OrderType::Stop, status, dec!(100));
        o.stop_price = Some(price);
        o
    }

    #[test]
    fn finds_most_protective_live_stop() {
        let mut second = stop("AAPL", dec!(49), OrderStatus::Held);
        second.client_order_id = "second".into();
        let orders = vec![
            stop("AAPL", dec!(48), OrderStatus::New),
            second,
            stop("AAPL", dec!(49.5), OrderStatus::Canceled),
            stop("MSFT", dec!(49.9), OrderStatus::New),
        ];
        let check = find_protection(&long(dec!(50), dec!(50)), &orders);
        assert!(check.has_stop);
        assert_eq!(check.stop_price, Some(dec!(49)));
        assert_eq!(live_protective_orders(&long(dec!(50), dec!(50)), &orders).len(), 2);
    }

    #[test]
    fn buy_stop_does_not_protect_long() {
        let mut o = stop("AAPL", dec!(48), OrderStatus::New);
        o.side = OrderSide::Buy;
        assert!(!find_protection(&long(dec!(50), dec!(50)), &[o]).has_stop);
    }

    #[test]
    fn exit_orders_include_limit_targets() {
        let target = order("AAPL", OrderSide::Sell, OrderType::Limit, OrderStatus::New, dec!(100));
        let entry = order("AAPL", OrderSide::Buy, OrderType::Limit, OrderStatus::New, dec!(100));
        let orders = [target, entry];
        let exits = live_exit_orders(&long(dec!(50), dec!(50)), &orders);
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].side, OrderSide::Sell);
    }

    #[test]
    fn repair_level_uses_floor_when_volatility_is_tight() {
        let policy = StopPolicy::default();
        let level = policy.repair_level(&long(dec!(50), dec!(50)), Some(dec!(0.10)));
        assert_eq!(level.stop_price, dec!(49.25));
        assert_eq!(level.source, LevelSource::Computed);
    }

    #[test]
    fn repair_level_uses_wider_volatility_distance() {
        let policy = StopPolicy::default();
        let level = policy.repair_level(&long(dec!(50), dec!(50)), Some(dec!(1.00)));
        assert_eq!(level.stop_price, dec!(48.00));
    }

    #[test]
    fn repair_level_prefers_desired_stop_outside_floor() {
        let policy = StopPolicy::default();
        let p = long(dec!(50), dec!(51)).with_levels(Some(dec!(49)), None);
        let level = policy.repair_level(&p, Some(dec!(1.00)));
        assert_eq!(level.stop_price, dec!(49));
        assert_eq!(level.source, LevelSource::Desired);

        let tight = long(dec!(50), dec!(51)).with_levels(Some(dec!(49.8)), None);
        assert_eq!(policy.repair_level(&tight, Some(dec!(1.00))).source, LevelSource::Computed);
    }

    #[test]
    fn repair_level_reanchors_below_falling_price() {
        let policy = StopPolicy::default();
        let level = policy.repair_level(&long(dec!(50), dec!(47)), Some(dec!(0.10)));
        assert_eq!(level.source, LevelSource::Reanchored);
        assert!(level.stop_price < dec!(47));
        assert!(policy.respects_floor(dec!(50), level.stop_price));
    }

    #[test]
    fn short_repair_sits_above_entry() {
        let policy = StopPolicy::default();
        let p = Position::new(Symbol::new("TSLA"), PositionSide::Short, dec!(10), dec!(200), dec!(200));
        let level = policy.repair_level(&p, None);
        assert_eq!(level.stop_price, dec!(203));
    }

    #[test]
    fn target_prefers_recorded_take_profit() {
        let policy = StopPolicy::default();
        let p = long(dec!(50), dec!(51)).with_levels(None, Some(dec!(55)));
        assert_eq!(policy.target_level(&p, dec!(0.75)), Some(dec!(55)));

        let stale = long(dec!(50), dec!(56)).with_levels(None, Some(dec!(55)));
        assert_eq!(policy.target_level(&stale, dec!(0.75)), None);

        assert_eq!(policy.target_level(&long(dec!(50), dec!(50)), dec!(0.75)), Some(dec!(51.50)));
    }

    #[test]
    fn safe_tightening_never_loosens() {
        assert!(is_safe_tightening(PositionSide::Long, dec!(48), dec!(49), dec!(50)));
        assert!(!is_safe_tightening(PositionSide::Long, dec!(49), dec!(48), dec!(50)));
        assert!(!is_safe_tightening(PositionSide::Long, dec!(48), dec!(50.5), dec!(50)));
        assert!(is_safe_tightening(PositionSide::Short, dec!(52), dec!(51), dec!(50)));
    }
}
