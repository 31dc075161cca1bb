//! Order Gateway Port (Driven Port)
//!
//! The abstract brokerage operation set the guard depends on. Every
//! implementation must be safe to retry: submissions are idempotent by
//! client order id, cancel and replace are naturally idempotent.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::order_execution::{Order, OrderSide, OrderType, TimeInForce};
use crate::domain::portfolio::{AccountSnapshot, MarketClock, Position};
use crate::domain::shared::{BrokerId, ClientOrderId, Symbol};

/// Linked exit legs of a bracket order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketLegs {
    /// Protective stop price.
    pub stop_loss: Decimal,
    /// Take-profit limit price.
    pub take_profit: Option<Decimal>,
}

/// Request to submit an order to the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOrderRequest {
    /// Client order ID.
    pub client_order_id: ClientOrderId,
    /// Symbol to trade.
    pub symbol: Symbol,
    /// Order side.
    pub side: OrderSide,
    /// Order type.
    pub order_type: OrderType,
    /// Quantity.
    pub quantity: Decimal,
    /// Limit price (for limit orders).
    pub limit_price: Option<Decimal>,
    /// Stop price (for stop orders).
    pub stop_price: Option<Decimal>,
    /// Trail in percent (for trailing stops).
    pub trail_percent: Option<Decimal>,
    /// Time in force.
    pub time_in_force: TimeInForce,
    /// Linked exits; makes this a bracket order.
    pub bracket: Option<BracketLegs>,
}

impl SubmitOrderRequest {
    const fn base(
        client_order_id: ClientOrderId,
        symbol: Symbol,
        side: OrderSide,
        order_type: OrderType,
        quantity: Decimal,
    ) -> Self {
        Self {
            client_order_id,
            symbol,
            side,
            order_type,
            quantity,
            limit_price: None,
            stop_price: None,
            trail_percent: None,
            time_in_force: TimeInForce::Day,
            bracket: None,
        }
    }

    /// Create a market order request.
    #[must_use]
    pub const fn market(
        client_order_id: ClientOrderId,
        symbol: Symbol,
        side: OrderSide,
        quantity: Decimal,
    ) -> Self {
        Self::base(client_order_id, symbol, side, OrderType::Market, quantity)
    }

    /// Create a limit order request.
    #[must_use]
    pub const fn limit(
        client_order_id: ClientOrderId,
        symbol: Symbol,
        side: OrderSide,
        quantity: Decimal,
        limit_price: Decimal,
    ) -> Self {
        let mut request = Self::base(client_order_id, symbol, side, OrderType::Limit, quantity);
        request.limit_price = Some(limit_price);
        request
    }

    /// Create a stop order request (GTC).
    #[must_use]
    pub const fn stop(
        client_order_id: ClientOrderId,
        symbol: Symbol,
        side: OrderSide,
        quantity: Decimal,
        stop_price: Decimal,
    ) -> Self {
        let mut request = Self::base(client_order_id, symbol, side, OrderType::Stop, quantity);
        request.stop_price = Some(stop_price);
        request.time_in_force = TimeInForce::Gtc;
        request
    }

    /// Create a trailing stop request (GTC).
    #[must_use]
    pub const fn trailing_stop(
        client_order_id: ClientOrderId,
        symbol: Symbol,
        side: OrderSide,
        quantity: Decimal,
        trail_percent: Decimal,
    ) -> Self {
        let mut request =
            Self::base(client_order_id, symbol, side, OrderType::TrailingStop, quantity);
        request.trail_percent = Some(trail_percent);
        request.time_in_force = TimeInForce::Gtc;
        request
    }

    /// Attach bracket legs.
    #[must_use]
    pub fn with_bracket(mut self, legs: BracketLegs) -> Self {
        self.bracket = Some(legs);
        self
    }

    /// Set time in force.
    #[must_use]
    pub const fn with_time_in_force(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = tif;
        self
    }
}

/// Replacement terms for a live order. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceOrderRequest {
    /// New stop price.
    pub stop_price: Option<Decimal>,
    /// New quantity.
    pub quantity: Option<Decimal>,
}

impl ReplaceOrderRequest {
    /// Move the stop.
    #[must_use]
    pub const fn stop_price(price: Decimal) -> Self {
        Self {
            stop_price: Some(price),
            quantity: None,
        }
    }

    /// Resize the order.
    #[must_use]
    pub const fn quantity(qty: Decimal) -> Self {
        Self {
            stop_price: None,
            quantity: Some(qty),
        }
    }
}

/// Which orders to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusFilter {
    /// Only non-terminal orders.
    Open,
    /// Everything the broker returns, including held and partial states.
    #[default]
    All,
}

/// Order listing query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderQuery {
    /// Status filter.
    pub status: OrderStatusFilter,
    /// Restrict to these symbols; empty means all.
    pub symbols: Vec<Symbol>,
}

impl OrderQuery {
    /// All orders.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            status: OrderStatusFilter::All,
            symbols: Vec::new(),
        }
    }

    /// Open orders only.
    #[must_use]
    pub const fn open() -> Self {
        Self {
            status: OrderStatusFilter::Open,
            symbols: Vec::new(),
        }
    }
}

/// Broker port error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BrokerError {
    /// Connection error.
    #[error("Broker connection error: {message}")]
    ConnectionError {
        /// Error details.
        message: String,
    },

    /// Call did not finish in time.
    #[error("Broker call {operation} timed out after {after_ms}ms")]
    Timeout {
        /// Gateway operation.
        operation: &'static str,
        /// Timeout in milliseconds.
        after_ms: u64,
    },

    /// Order rejected by broker.
    #[error("Order rejected: {reason}")]
    OrderRejected {
        /// Rejection reason.
        reason: String,
    },

    /// Order not found.
    #[error("Order not found: {order_id}")]
    OrderNotFound {
        /// The missing order ID.
        order_id: String,
    },

    /// Insufficient funds or shares (e.g. held by another order).
    #[error("Insufficient buying power or quantity: {message}")]
    InsufficientFunds {
        /// Error details.
        message: String,
    },

    /// Rate limited.
    #[error("Rate limited by broker")]
    RateLimited,

    /// Unknown error.
    #[error("Broker error: {message}")]
    Unknown {
        /// Error details.
        message: String,
    },
}

impl BrokerError {
    /// Returns true for failures worth retrying later (network, timeout, rate limit).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionError { .. } | Self::Timeout { .. } | Self::RateLimited
        )
    }

    /// Returns true when the target order no longer exists.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::OrderNotFound { .. })
    }
}

/// Port for brokerage interactions.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Current account snapshot.
    async fn get_account(&self) -> Result<AccountSnapshot, BrokerError>;

    /// All open positions.
    async fn get_positions(&self) -> Result<Vec<Position>, BrokerError>;

    /// Orders matching the query. Bracket legs are returned as separate orders.
    async fn get_orders(&self, query: OrderQuery) -> Result<Vec<Order>, BrokerError>;

    /// Submit an order.
    async fn submit_order(&self, request: SubmitOrderRequest) -> Result<Order, BrokerError>;

    /// Cancel an order by broker ID.
    async fn cancel_order(&self, broker_order_id: &BrokerId) -> Result<(), BrokerError>;

    /// Replace a live order's stop price and/or quantity.
    async fn replace_order(
        &self,
        broker_order_id: &BrokerId,
        request: ReplaceOrderRequest,
    ) -> Result<Order, BrokerError>;

    /// Market clock.
    async fn get_clock(&self) -> Result<MarketClock, BrokerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn transient_classification() {
        assert!(BrokerError::RateLimited.is_transient());
        assert!(
            BrokerError::Timeout {
                operation: "get_orders",
                after_ms: 10_000
            }
            .is_transient()
        );
        assert!(
            !BrokerError::OrderRejected {
                reason: "bad".into()
            }
            .is_transient()
        );
        assert!(
            BrokerError::OrderNotFound {
                order_id: "x".into()
            }
            .is_not_found()
        );
    }

    #[test]
    fn protective_requests_are_gtc() {
        let stop = SubmitOrderRequest::stop(
            "c".into(),
            Symbol::new("AAPL"),
            OrderSide::Sell,
            dec!(10),
            dec!(49),
        );
        assert_eq!(stop.time_in_force, TimeInForce::Gtc);
        assert_eq!(stop.stop_price, Some(dec!(49)));

        let trail = SubmitOrderRequest::trailing_stop(
            "t".into(),
            Symbol::new("AAPL"),
            OrderSide::Sell,
            dec!(10),
            dec!(2.0),
        );
        assert_eq!(trail.order_type, OrderType::TrailingStop);
        assert_eq!(trail.trail_percent, Some(dec!(2.0)));
    }
}
