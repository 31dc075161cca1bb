//! Order record.
//!
//! One shape serves both sides of the boundary: the orders we submit (and
//! persist in the ledger) and the orders the brokerage reports back.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::value_objects::{OrderSide, OrderStatus, OrderType};
use crate::domain::shared::{BrokerId, ClientOrderId, Symbol};

/// An order as tracked locally or reported by the brokerage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Client order id (deterministic for entries).
    pub client_order_id: ClientOrderId,
    /// Broker-assigned id. `None` only for submissions the broker never accepted.
    pub broker_order_id: Option<BrokerId>,
    /// Instrument.
    pub symbol: Symbol,
    /// Side.
    pub side: OrderSide,
    /// Order type.
    pub order_type: OrderType,
    /// Current status.
    pub status: OrderStatus,
    /// Ordered quantity.
    pub quantity: Decimal,
    /// Filled quantity.
    pub filled_qty: Decimal,
    /// Average fill price.
    pub filled_avg_price: Option<Decimal>,
    /// Limit price (limit orders and take-profit legs).
    pub limit_price: Option<Decimal>,
    /// Stop price (stop orders; current trigger for trailing stops when known).
    pub stop_price: Option<Decimal>,
    /// Trail percent (trailing stops).
    pub trail_percent: Option<Decimal>,
    /// Stop-loss level attached as a bracket leg, if any.
    pub stop_loss: Option<Decimal>,
    /// Take-profit level attached as a bracket leg, if any.
    pub take_profit: Option<Decimal>,
    /// When the order was submitted.
    pub submitted_at: DateTime<Utc>,
    /// Why the order exists (strategy reason, "protection repair", ...).
    #[serde(default)]
    pub reason: String,
}

impl Order {
    /// Returns true if the broker still holds this order.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.status.is_live()
    }

    /// Quantity not yet filled.
    #[must_use]
    pub fn remaining_qty(&self) -> Decimal {
        (self.quantity - self.filled_qty).max(Decimal::ZERO)
    }
}

/// Partial update to a persisted order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPatch {
    /// New status.
    pub status: Option<OrderStatus>,
    /// New broker id.
    pub broker_order_id: Option<BrokerId>,
    /// New filled quantity.
    pub filled_qty: Option<Decimal>,
    /// New average fill price.
    pub filled_avg_price: Option<Decimal>,
    /// New stop price.
    pub stop_price: Option<Decimal>,
    /// New quantity.
    pub quantity: Option<Decimal>,
}

impl OrderPatch {
    /// Patch that only changes status.
    #[must_use]
    pub fn status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Returns true if the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.broker_order_id.is_none()
            && self.filled_qty.is_none()
            && self.filled_avg_price.is_none()
            && self.stop_price.is_none()
            && self.quantity.is_none()
    }

    /// Apply the patch in place.
    pub fn apply_to(&self, order: &mut Order) {
        if let Some(status) = self.status {
            order.status = status;
        }
        if let Some(broker_order_id) = &self.broker_order_id {
            order.broker_order_id = Some(broker_order_id.clone());
        }
        if let Some(filled_qty) = self.filled_qty {
            order.filled_qty = filled_qty;
        }
        if let Some(price) = self.filled_avg_price {
            order.filled_avg_price = Some(price);
        }
        if let Some(stop_price) = self.stop_price {
            order.stop_price = Some(stop_price);
        }
        if let Some(quantity) = self.quantity {
            order.quantity = quantity;
        }
    }
}

/// Status callback from the brokerage for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdate {
    /// Client order id the broker echoes back.
    pub client_order_id: ClientOrderId,
    /// Broker id.
    pub broker_order_id: BrokerId,
    /// Reported status.
    pub status: OrderStatus,
    /// Reported cumulative fill.
    pub filled_qty: Decimal,
    /// Reported average fill price.
    pub filled_avg_price: Option<Decimal>,
}

impl OrderUpdate {
    /// Build the update from a broker-reported order.
    #[must_use]
    pub fn from_order(order: &Order) -> Option<Self> {
        Some(Self {
            client_order_id: order.client_order_id.clone(),
            broker_order_id: order.broker_order_id.clone()?,
            status: order.status,
            filled_qty: order.filled_qty,
            filled_avg_price: order.filled_avg_price,
        })
    }

    /// Patch describing what changed relative to `current`.
    #[must_use]
    pub fn diff(&self, current: &Order) -> OrderPatch {
        OrderPatch {
            status: (current.status != self.status).then_some(self.status),
            broker_order_id: (current.broker_order_id.as_ref() != Some(&self.broker_order_id))
                .then(|| self.broker_order_id.clone()),
            filled_qty: (current.filled_qty != self.filled_qty).then_some(self.filled_qty),
            filled_avg_price: self
                .filled_avg_price
                .filter(|p| current.filled_avg_price != Some(*p)),
            stop_price: None,
            quantity: None,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Minimal order for tests.
    pub fn order(
        symbol: &str,
        side: OrderSide,
        order_type: OrderType,
        status: OrderStatus,
        qty: Decimal,
    ) -> Order {
        Order {
            client_order_id: ClientOrderId::new(format!("test-{symbol}-{order_type}")),
            broker_order_id: Some(BrokerId::new(format!("b-{symbol}-{order_type}"))),
            symbol: Symbol::new(symbol),
            side,
            order_type,
            status,
            quantity: qty,
            filled_qty: Decimal::ZERO,
            filled_avg_price: None,
            limit_price: None,
            stop_price: None,
            trail_percent: None,
            stop_loss: None,
            take_profit: None,
            submitted_at: Utc::now(),
            reason: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::order;
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn patch_applies_only_present_fields() {
        let mut o = order(
            "AAPL",
            OrderSide::Buy,
            OrderType::Market,
            OrderStatus::Accepted,
            dec!(100),
        );
        let patch = OrderPatch {
            status: Some(OrderStatus::PartiallyFilled),
            filled_qty: Some(dec!(40)),
            ..OrderPatch::default()
        };
        patch.apply_to(&mut o);

        assert_eq!(o.status, OrderStatus::PartiallyFilled);
        assert_eq!(o.filled_qty, dec!(40));
        assert_eq!(o.remaining_qty(), dec!(60));
        assert!(o.filled_avg_price.is_none());
    }

    #[test]
    fn update_diff_is_empty_when_nothing_changed() {
        let o = order(
            "AAPL",
            OrderSide::Buy,
            OrderType::Market,
            OrderStatus::Accepted,
            dec!(100),
        );
        let update = OrderUpdate::from_order(&o).unwrap();
        assert!(update.diff(&o).is_empty());
    }

    #[test]
    fn update_diff_reports_fill() {
        let o = order(
            "AAPL",
            OrderSide::Buy,
            OrderType::Market,
            OrderStatus::Accepted,
            dec!(100),
        );
        let mut update = OrderUpdate::from_order(&o).unwrap();
        update.status = OrderStatus::Filled;
        update.filled_qty = dec!(100);
        update.filled_avg_price = Some(dec!(50.10));

        let patch = update.diff(&o);
        assert_eq!(patch.status, Some(OrderStatus::Filled));
        assert_eq!(patch.filled_qty, Some(dec!(100)));
        assert_eq!(patch.filled_avg_price, Some(dec!(50.10)));
        assert!(patch.broker_order_id.is_none());
    }
}
