//! Alpaca API request and response types.
//!
//! These types map directly to Alpaca's REST API format. Alpaca sends prices
//! and quantities as strings; `Decimal` reads and writes them that way.

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::ports::{ReplaceOrderRequest, SubmitOrderRequest};
use crate::domain::order_execution::{Order, OrderSide, OrderStatus, OrderType};
use crate::domain::portfolio::{AccountSnapshot, MarketClock, Position, PositionSide};
use crate::domain::shared::{BrokerId, ClientOrderId, Symbol};

// ============================================================================
// Order Request Types
// ============================================================================

/// Take-profit leg of a bracket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TakeProfitLeg {
    /// Limit price.
    pub limit_price: Decimal,
}

/// Stop-loss leg of a bracket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopLossLeg {
    /// Stop price.
    pub stop_price: Decimal,
}

/// Order request for Alpaca API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlpacaOrderRequest {
    /// Stock symbol.
    pub symbol: String,
    /// Quantity (shares).
    pub qty: Decimal,
    /// Order side.
    pub side: &'static str,
    /// Order type.
    #[serde(rename = "type")]
    pub order_type: &'static str,
    /// Time in force.
    pub time_in_force: &'static str,
    /// Limit price (for limit orders).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
    /// Stop price (for stop orders).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<Decimal>,
    /// Trail percent (for trailing stops).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trail_percent: Option<Decimal>,
    /// Client order ID.
    pub client_order_id: String,
    /// `bracket` when exits are attached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_class: Option<&'static str>,
    /// Bracket take-profit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<TakeProfitLeg>,
    /// Bracket stop-loss.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<StopLossLeg>,
}

impl From<&SubmitOrderRequest> for AlpacaOrderRequest {
    fn from(request: &SubmitOrderRequest) -> Self {
        let bracket = request.bracket.as_ref();
        Self {
            symbol: request.symbol.as_str().to_string(),
            qty: request.quantity,
            side: request.side.as_str(),
            order_type: request.order_type.as_str(),
            time_in_force: request.time_in_force.as_str(),
            limit_price: request.limit_price,
            stop_price: request.stop_price,
            trail_percent: request.trail_percent,
            client_order_id: request.client_order_id.as_str().to_string(),
            order_class: bracket.map(|_| "bracket"),
            take_profit: bracket
                .and_then(|b| b.take_profit)
                .map(|limit_price| TakeProfitLeg { limit_price }),
            stop_loss: bracket.map(|b| StopLossLeg {
                stop_price: b.stop_loss,
            }),
        }
    }
}

/// Replace (PATCH) body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlpacaReplaceRequest {
    /// New quantity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qty: Option<Decimal>,
    /// New stop price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<Decimal>,
}

impl From<&ReplaceOrderRequest> for AlpacaReplaceRequest {
    fn from(request: &ReplaceOrderRequest) -> Self {
        Self {
            qty: request.quantity,
            stop_price: request.stop_price,
        }
    }
}

// ============================================================================
// Response Types
// ============================================================================

/// Order from Alpaca API. Bracket children arrive in `legs` when `nested=true`.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaOrderResponse {
    /// Broker order ID.
    pub id: String,
    /// Client order ID.
    pub client_order_id: String,
    /// Symbol.
    pub symbol: String,
    /// Quantity; absent for notional orders.
    #[serde(default)]
    pub qty: Option<Decimal>,
    /// Filled quantity.
    #[serde(default)]
    pub filled_qty: Decimal,
    /// Average fill price.
    #[serde(default)]
    pub filled_avg_price: Option<Decimal>,
    /// Order status.
    pub status: String,
    /// Order side.
    pub side: String,
    /// Order type.
    #[serde(rename = "type")]
    pub order_type: String,
    /// Limit price.
    #[serde(default)]
    pub limit_price: Option<Decimal>,
    /// Stop price.
    #[serde(default)]
    pub stop_price: Option<Decimal>,
    /// Trail percent.
    #[serde(default)]
    pub trail_percent: Option<Decimal>,
    /// Submission time.
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    /// Bracket children.
    #[serde(default)]
    pub legs: Option<Vec<AlpacaOrderResponse>>,
}

impl AlpacaOrderResponse {
    /// Convert to a domain order, ignoring legs.
    #[must_use]
    pub fn to_order(&self) -> Order {
        let side = parse_side(&self.side);
        let order_type = parse_order_type(&self.order_type);
        Order {
            client_order_id: ClientOrderId::new(&self.client_order_id),
            broker_order_id: Some(BrokerId::new(&self.id)),
            symbol: Symbol::new(&self.symbol),
            side,
            order_type,
            status: parse_order_status(&self.status),
            quantity: self.qty.unwrap_or(Decimal::ZERO),
            filled_qty: self.filled_qty,
            filled_avg_price: self.filled_avg_price,
            limit_price: self.limit_price,
            stop_price: self.stop_price,
            trail_percent: self.trail_percent,
            stop_loss: None,
            take_profit: None,
            submitted_at: self.submitted_at.unwrap_or_else(Utc::now),
            reason: String::new(),
        }
    }

    /// Flatten this order and its legs. The parent carries the bracket levels.
    #[must_use]
    pub fn flatten(self) -> Vec<Order> {
        let mut parent = self.to_order();
        let legs: Vec<Order> = self
            .legs
            .unwrap_or_default()
            .iter()
            .map(Self::to_order)
            .collect();
        for leg in &legs {
            match leg.order_type {
                OrderType::Stop | OrderType::TrailingStop => parent.stop_loss = leg.stop_price,
                OrderType::Limit => parent.take_profit = leg.limit_price,
                OrderType::Market => {}
            }
        }
        std::iter::once(parent).chain(legs).collect()
    }
}

/// Account from Alpaca API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaAccountResponse {
    /// Account equity.
    pub equity: Decimal,
    /// Equity at the previous close.
    pub last_equity: Decimal,
    /// Cash balance.
    pub cash: Decimal,
    /// Buying power.
    pub buying_power: Decimal,
    /// Day-trading buying power.
    #[serde(default)]
    pub daytrading_buying_power: Decimal,
    /// Pattern day trader flag.
    #[serde(default)]
    pub pattern_day_trader: bool,
}

impl From<AlpacaAccountResponse> for AccountSnapshot {
    fn from(a: AlpacaAccountResponse) -> Self {
        Self {
            equity: a.equity,
            last_equity: a.last_equity,
            cash: a.cash,
            buying_power: a.buying_power,
            day_trading_buying_power: a.daytrading_buying_power,
            pattern_day_trader: a.pattern_day_trader,
        }
    }
}

/// Position from Alpaca API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaPositionResponse {
    /// Symbol.
    pub symbol: String,
    /// Quantity; negative for shorts.
    pub qty: Decimal,
    /// Side (long/short).
    pub side: String,
    /// Average entry price.
    pub avg_entry_price: Decimal,
    /// Current price.
    pub current_price: Decimal,
    /// Unrealized P&L.
    #[serde(default)]
    pub unrealized_pl: Option<Decimal>,
}

impl From<AlpacaPositionResponse> for Position {
    fn from(p: AlpacaPositionResponse) -> Self {
        let side = if p.side.eq_ignore_ascii_case("short") || p.qty.is_sign_negative() {
            PositionSide::Short
        } else {
            PositionSide::Long
        };
        let mut position = Self::new(
            Symbol::new(&p.symbol),
            side,
            p.qty.abs(),
            p.avg_entry_price,
            p.current_price,
        );
        if let Some(pl) = p.unrealized_pl {
            position.unrealized_pl = pl;
        }
        position
    }
}

/// Market clock from Alpaca API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaClockResponse {
    /// Exchange-local time.
    pub timestamp: DateTime<FixedOffset>,
    /// Whether the market is open.
    pub is_open: bool,
}

impl From<AlpacaClockResponse> for MarketClock {
    fn from(c: AlpacaClockResponse) -> Self {
        Self {
            is_open: c.is_open,
            timestamp: c.timestamp,
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error response from Alpaca API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaErrorResponse {
    /// Numeric error code.
    #[serde(default)]
    pub code: Option<u64>,
    /// Error message.
    pub message: String,
}

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_side(side: &str) -> OrderSide {
    if side.eq_ignore_ascii_case("sell") {
        OrderSide::Sell
    } else {
        OrderSide::Buy
    }
}

fn parse_order_type(order_type: &str) -> OrderType {
    match order_type.to_lowercase().as_str() {
        "limit" => OrderType::Limit,
        "stop" | "stop_limit" => OrderType::Stop,
        "trailing_stop" => OrderType::TrailingStop,
        _ => OrderType::Market,
    }
}

/// Parse Alpaca order status string to domain `OrderStatus`.
fn parse_order_status(status: &str) -> OrderStatus {
    match status.to_lowercase().as_str() {
        "accepted" | "accepted_for_bidding" | "pending_replace" | "calculated" => {
            OrderStatus::Accepted
        }
        "replaced" => OrderStatus::Replaced,
        "pending_new" => OrderStatus::PendingNew,
        "held" => OrderStatus::Held,
        "partially_filled" => OrderStatus::PartiallyFilled,
        "filled" => OrderStatus::Filled,
        "done_for_day" | "expired" => OrderStatus::Expired,
        "canceled" | "pending_cancel" => OrderStatus::Canceled,
        "rejected" | "stopped" | "suspended" => OrderStatus::Rejected,
        _ => OrderStatus::New,
    }
}
