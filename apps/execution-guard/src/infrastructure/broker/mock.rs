//! In-memory brokerage for tests and dry runs.
//!
//! Keeps an order book, positions, an account and a clock, records every
//! mutating call, and can be scripted to fail submissions by order type.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::application::ports::{
    BrokerError, OrderGateway, OrderQuery, OrderStatusFilter, ReplaceOrderRequest,
    SubmitOrderRequest,
};
use crate::domain::order_execution::{Order, OrderStatus, OrderType};
use crate::domain::portfolio::{AccountSnapshot, MarketClock, Position};
use crate::domain::shared::{BrokerId, ClientOrderId, Symbol};

#[derive(Debug, Default)]
struct Book {
    account: Option<AccountSnapshot>,
    positions: Vec<Position>,
    orders: Vec<Order>,
    clock: Option<MarketClock>,
    submissions: Vec<SubmitOrderRequest>,
    cancels: Vec<BrokerId>,
    replaces: Vec<(BrokerId, ReplaceOrderRequest)>,
    queries: Vec<OrderQuery>,
    fail_next: VecDeque<(OrderType, BrokerError)>,
    fail_replaces: VecDeque<BrokerError>,
    fail_always: HashMap<OrderType, BrokerError>,
    submit_delay: Option<Duration>,
}

/// Scriptable in-memory [`OrderGateway`].
#[derive(Debug, Default)]
pub struct MockGateway {
    book: Mutex<Book>,
    next_id: AtomicU64,
    queries_fail: AtomicBool,
}

/// Account used when none is set: $100,000 equity, flat on the day.
#[must_use]
pub fn default_account() -> AccountSnapshot {
    AccountSnapshot {
        equity: dec!(100_000),
        last_equity: dec!(100_000),
        cash: dec!(100_000),
        buying_power: dec!(200_000),
        day_trading_buying_power: Decimal::ZERO,
        pattern_day_trader: false,
    }
}

/// Open session at 10:00 New York time.
#[must_use]
pub fn default_clock() -> MarketClock {
    MarketClock {
        is_open: true,
        timestamp: DateTime::parse_from_rfc3339("2026-03-02T10:00:00-05:00")
            .unwrap_or_else(|_| Utc::now().fixed_offset()),
    }
}

impl MockGateway {
    /// Empty brokerage with the default account and an open clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the account snapshot.
    pub fn set_account(&self, account: AccountSnapshot) {
        self.book.lock().account = Some(account);
    }

    /// Replace the clock.
    pub fn set_clock(&self, clock: MarketClock) {
        self.book.lock().clock = Some(clock);
    }

    /// Insert or replace the position for its symbol.
    pub fn set_position(&self, position: Position) {
        let mut book = self.book.lock();
        book.positions.retain(|p| p.symbol != position.symbol);
        book.positions.push(position);
    }

    /// Remove a position.
    pub fn close_position(&self, symbol: &Symbol) {
        self.book.lock().positions.retain(|p| &p.symbol != symbol);
    }

    /// Seed an existing order. A missing broker id is assigned.
    pub fn add_order(&self, mut order: Order) -> Order {
        if order.broker_order_id.is_none() {
            order.broker_order_id = Some(self.broker_id());
        }
        self.book.lock().orders.push(order.clone());
        order
    }

    /// Overwrite the status and fill of an order.
    pub fn set_order_status(
        &self,
        client_order_id: &ClientOrderId,
        status: OrderStatus,
        filled_qty: Decimal,
        filled_avg_price: Option<Decimal>,
    ) {
        let mut book = self.book.lock();
        if let Some(order) = book
            .orders
            .iter_mut()
            .find(|o| &o.client_order_id == client_order_id)
        {
            order.status = status;
            order.filled_qty = filled_qty;
            order.filled_avg_price = filled_avg_price;
        }
    }

    /// Fail the next submission of `order_type` with `error`.
    pub fn fail_next_submission(&self, order_type: OrderType, error: BrokerError) {
        self.book.lock().fail_next.push_back((order_type, error));
    }

    /// Fail every submission of `order_type` with `error`.
    pub fn fail_submissions(&self, order_type: OrderType, error: BrokerError) {
        self.book.lock().fail_always.insert(order_type, error);
    }

    /// Fail the next replace request with `error`.
    pub fn fail_next_replace(&self, error: BrokerError) {
        self.book.lock().fail_replaces.push_back(error);
    }

    /// Stop failing submissions and replaces.
    pub fn clear_failures(&self) {
        let mut book = self.book.lock();
        book.fail_next.clear();
        book.fail_always.clear();
        book.fail_replaces.clear();
    }

    /// Make position, order and account reads fail.
    pub fn fail_queries(&self, fail: bool) {
        self.queries_fail.store(fail, Ordering::SeqCst);
    }

    /// Delay every submission, for concurrency tests.
    pub fn set_submit_delay(&self, delay: Duration) {
        self.book.lock().submit_delay = Some(delay);
    }

    /// Every accepted submission, in order.
    #[must_use]
    pub fn submissions(&self) -> Vec<SubmitOrderRequest> {
        self.book.lock().submissions.clone()
    }

    /// Every cancel request, in order.
    #[must_use]
    pub fn cancels(&self) -> Vec<BrokerId> {
        self.book.lock().cancels.clone()
    }

    /// Every replace request, in order.
    #[must_use]
    pub fn replaces(&self) -> Vec<(BrokerId, ReplaceOrderRequest)> {
        self.book.lock().replaces.clone()
    }

    /// Every order listing query, in order.
    #[must_use]
    pub fn order_queries(&self) -> Vec<OrderQuery> {
        self.book.lock().queries.clone()
    }

    /// Current order book.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.book.lock().orders.clone()
    }

    /// Live orders for a symbol.
    #[must_use]
    pub fn live_orders(&self, symbol: &Symbol) -> Vec<Order> {
        self.book
            .lock()
            .orders
            .iter()
            .filter(|o| &o.symbol == symbol && o.is_live())
            .cloned()
            .collect()
    }

    fn broker_id(&self) -> BrokerId {
        BrokerId::new(format!(
            "mock-{}",
            self.next_id.fetch_add(1, Ordering::SeqCst) + 1
        ))
    }

    fn check_queries(&self) -> Result<(), BrokerError> {
        if self.queries_fail.load(Ordering::SeqCst) {
            return Err(BrokerError::ConnectionError {
                message: "mock brokerage unreachable".to_string(),
            });
        }
        Ok(())
    }

    fn scripted_failure(book: &mut Book, order_type: OrderType) -> Option<BrokerError> {
        if let Some(pos) = book.fail_next.iter().position(|(t, _)| *t == order_type) {
            return book.fail_next.remove(pos).map(|(_, e)| e);
        }
        book.fail_always.get(&order_type).cloned()
    }

    fn leg(
        &self,
        parent: &SubmitOrderRequest,
        suffix: &str,
        order_type: OrderType,
        price: Decimal,
    ) -> Order {
        let stop = order_type == OrderType::Stop;
        Order {
            client_order_id: ClientOrderId::new(format!("{}-{suffix}", parent.client_order_id)),
            broker_order_id: Some(self.broker_id()),
            symbol: parent.symbol.clone(),
            side: parent.side.opposite(),
            order_type,
            status: OrderStatus::Held,
            quantity: parent.quantity,
            filled_qty: Decimal::ZERO,
            filled_avg_price: None,
            limit_price: (!stop).then_some(price),
            stop_price: stop.then_some(price),
            trail_percent: None,
            stop_loss: None,
            take_profit: None,
            submitted_at: Utc::now(),
            reason: String::new(),
        }
    }
}

fn matches_query(order: &Order, query: &OrderQuery) -> bool {
    let status_ok = match query.status {
        OrderStatusFilter::Open => order.is_live(),
        OrderStatusFilter::All => true,
    };
    status_ok && (query.symbols.is_empty() || query.symbols.contains(&order.symbol))
}

#[async_trait]
impl OrderGateway for MockGateway {
    async fn get_account(&self) -> Result<AccountSnapshot, BrokerError> {
        self.check_queries()?;
        Ok(self.book.lock().account.clone().unwrap_or_else(default_account))
    }

    async fn get_positions(&self) -> Result<Vec<Position>, BrokerError> {
        self.check_queries()?;
        Ok(self.book.lock().positions.clone())
    }

    async fn get_orders(&self, query: OrderQuery) -> Result<Vec<Order>, BrokerError> {
        self.check_queries()?;
        let mut book = self.book.lock();
        let orders = book
            .orders
            .iter()
            .filter(|o| matches_query(o, &query))
            .cloned()
            .collect();
        book.queries.push(query);
        Ok(orders)
    }

    async fn submit_order(&self, request: SubmitOrderRequest) -> Result<Order, BrokerError> {
        let delay = self.book.lock().submit_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut book = self.book.lock();
        if let Some(error) = Self::scripted_failure(&mut book, request.order_type) {
            return Err(error);
        }
        if book
            .orders
            .iter()
            .any(|o| o.client_order_id == request.client_order_id)
        {
            return Err(BrokerError::OrderRejected {
                reason: "client_order_id must be unique".to_string(),
            });
        }

        let order = Order {
            client_order_id: request.client_order_id.clone(),
            broker_order_id: Some(self.broker_id()),
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            status: OrderStatus::Accepted,
            quantity: request.quantity,
            filled_qty: Decimal::ZERO,
            filled_avg_price: None,
            limit_price: request.limit_price,
            stop_price: request.stop_price,
            trail_percent: request.trail_percent,
            stop_loss: request.bracket.as_ref().map(|b| b.stop_loss),
            take_profit: request.bracket.as_ref().and_then(|b| b.take_profit),
            submitted_at: Utc::now(),
            reason: String::new(),
        };
        book.orders.push(order.clone());

        if let Some(bracket) = &request.bracket {
            let stop = self.leg(&request, "sl", OrderType::Stop, bracket.stop_loss);
            book.orders.push(stop);
            if let Some(target) = bracket.take_profit {
                let limit = self.leg(&request, "tp", OrderType::Limit, target);
                book.orders.push(limit);
            }
        }
        book.submissions.push(request);
        Ok(order)
    }

    async fn cancel_order(&self, broker_order_id: &BrokerId) -> Result<(), BrokerError> {
        let mut book = self.book.lock();
        book.cancels.push(broker_order_id.clone());
        let order = book
            .orders
            .iter_mut()
            .find(|o| o.broker_order_id.as_ref() == Some(broker_order_id) && o.is_live())
            .ok_or_else(|| BrokerError::OrderNotFound {
                order_id: broker_order_id.to_string(),
            })?;
        order.status = OrderStatus::Canceled;
        Ok(())
    }

    async fn replace_order(
        &self,
        broker_order_id: &BrokerId,
        request: ReplaceOrderRequest,
    ) -> Result<Order, BrokerError> {
        let mut book = self.book.lock();
        book.replaces.push((broker_order_id.clone(), request.clone()));
        if let Some(error) = book.fail_replaces.pop_front() {
            return Err(error);
        }
        let order = book
            .orders
            .iter_mut()
            .find(|o| o.broker_order_id.as_ref() == Some(broker_order_id) && o.is_live())
            .ok_or_else(|| BrokerError::OrderNotFound {
                order_id: broker_order_id.to_string(),
            })?;
        if let Some(stop) = request.stop_price {
            order.stop_price = Some(stop);
        }
        if let Some(qty) = request.quantity {
            order.quantity = qty;
        }
        Ok(order.clone())
    }

    async fn get_clock(&self) -> Result<MarketClock, BrokerError> {
        self.check_queries()?;
        Ok(self.book.lock().clock.clone().unwrap_or_else(default_clock))
    }
}
