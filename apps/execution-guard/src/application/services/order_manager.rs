//! Order Manager Service
//!
//! Submits entries exactly once. The client order id is derived from the
//! proposal's economic parameters, so a replay inside the same decision
//! window maps to the same id; the ledger check plus a per-id async lock
//! turn concurrent replays into one brokerage call.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::application::ports::{
    BracketLegs, BrokerError, OrderGateway, OrderLedger, OrderQuery, OrderStatusFilter,
    SubmitOrderRequest,
};
use crate::application::state::{StateUpdate, TradingStateStore};
use crate::domain::order_execution::{
    ClientOrderIdFactory, Order, OrderPatch, OrderSide, OrderStatus, OrderUpdate, TimeInForce,
};
use crate::domain::portfolio::PositionSide;
use crate::domain::risk_management::SizingDecision;
use crate::domain::shared::{ClientOrderId, Symbol};
use crate::domain::stop_enforcement::{StopPolicy, round_stop};
use crate::error::ExecutionError;

use super::risk_manager::RiskManager;

/// Order manager configuration.
#[derive(Debug, Clone)]
pub struct OrderConfig {
    /// Attach stop and target legs to entries.
    pub use_bracket_orders: bool,
    /// Stop floor and target multiple for bracket legs.
    pub stops: StopPolicy,
    /// Time in force for entries.
    pub time_in_force: TimeInForce,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            use_bracket_orders: true,
            stops: StopPolicy::default(),
            time_in_force: TimeInForce::Day,
        }
    }
}

/// Result of a submission attempt.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// New order accepted by the brokerage.
    Submitted(Order),
    /// The same proposal was already submitted; this is the original order.
    Duplicate(Order),
    /// A risk gate refused the proposal.
    Rejected {
        /// Human-readable reason.
        reason: String,
    },
    /// The brokerage call failed.
    Failed {
        /// Error text.
        reason: String,
        /// Whether a retry inside the same window may succeed.
        transient: bool,
    },
}

impl SubmitOutcome {
    /// The order, for submitted and duplicate outcomes.
    #[must_use]
    pub const fn order(&self) -> Option<&Order> {
        match self {
            Self::Submitted(order) | Self::Duplicate(order) => Some(order),
            Self::Rejected { .. } | Self::Failed { .. } => None,
        }
    }

    /// Returns true if a new order was placed.
    #[must_use]
    pub const fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted(_))
    }
}

type FlightLock = Arc<tokio::sync::Mutex<()>>;

/// Idempotent order submission and lifecycle tracking.
pub struct OrderManager<G: OrderGateway, L: OrderLedger> {
    config: OrderConfig,
    gateway: Arc<G>,
    ledger: Arc<L>,
    state: Arc<TradingStateStore>,
    risk: Arc<RiskManager<G>>,
    ids: ClientOrderIdFactory,
    in_flight: Mutex<HashMap<ClientOrderId, FlightLock>>,
}

impl<G: OrderGateway, L: OrderLedger> std::fmt::Debug for OrderManager<G, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderManager")
            .field("config", &self.config)
            .field("ids", &self.ids)
            .finish_non_exhaustive()
    }
}

impl<G: OrderGateway, L: OrderLedger> OrderManager<G, L> {
    /// Create an order manager.
    #[must_use]
    pub fn new(
        config: OrderConfig,
        gateway: Arc<G>,
        ledger: Arc<L>,
        state: Arc<TradingStateStore>,
        risk: Arc<RiskManager<G>>,
        ids: ClientOrderIdFactory,
    ) -> Self {
        Self {
            config,
            gateway,
            ledger,
            state,
            risk,
            ids,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// The risk manager gating submissions.
    #[must_use]
    pub fn risk(&self) -> &Arc<RiskManager<G>> {
        &self.risk
    }

    /// Submit an entry.
    ///
    /// Repeating the call with the same symbol, side, quantity and price
    /// bucket inside one decision window returns the first order as
    /// [`SubmitOutcome::Duplicate`] without contacting the brokerage.
    pub async fn submit_order(
        &self,
        symbol: &Symbol,
        side: OrderSide,
        qty: Decimal,
        price: Option<Decimal>,
        reason: &str,
    ) -> SubmitOutcome {
        let client_order_id = self.ids.entry_id(symbol, side, qty, price, Utc::now());
        let lock = self.flight_lock(&client_order_id);
        let outcome = {
            let _guard = lock.lock().await;
            self.submit_once(&client_order_id, symbol, side, qty, price, reason)
                .await
        };
        drop(lock);
        self.release_flight_lock(&client_order_id);
        outcome
    }

    fn flight_lock(&self, id: &ClientOrderId) -> FlightLock {
        Arc::clone(self.in_flight.lock().entry(id.clone()).or_default())
    }

    fn release_flight_lock(&self, id: &ClientOrderId) {
        let mut in_flight = self.in_flight.lock();
        if in_flight
            .get(id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            in_flight.remove(id);
        }
    }

    async fn submit_once(
        &self,
        client_order_id: &ClientOrderId,
        symbol: &Symbol,
        side: OrderSide,
        qty: Decimal,
        price: Option<Decimal>,
        reason: &str,
    ) -> SubmitOutcome {
        match self.ledger.get_order(client_order_id).await {
            Ok(Some(existing)) => {
                tracing::info!(
                    client_order_id = %client_order_id,
                    symbol = %symbol,
                    status = %existing.status,
                    "Duplicate submission; returning recorded order"
                );
                return SubmitOutcome::Duplicate(existing);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(client_order_id = %client_order_id, error = %e, "Ledger lookup failed");
                return SubmitOutcome::Failed {
                    reason: e.to_string(),
                    transient: true,
                };
            }
        }

        let decision = self.risk.check_order(symbol, side, qty, price).await;
        let Some(sizing) = decision.sizing.filter(|_| decision.approved) else {
            return SubmitOutcome::Rejected {
                reason: decision.reason,
            };
        };

        let quantity = qty.min(sizing.max_quantity);
        let request = self.build_request(client_order_id, symbol, side, quantity, price, &sizing);
        let bracket = request.bracket.clone();

        match self.gateway.submit_order(request.clone()).await {
            Ok(mut order) => {
                order.reason = reason.to_string();
                if let Some(legs) = &bracket {
                    order.stop_loss = order.stop_loss.or(Some(legs.stop_loss));
                    order.take_profit = order.take_profit.or(legs.take_profit);
                }
                self.record(&order).await;
                metrics::counter!("guard_orders_submitted_total", "kind" => "entry").increment(1);
                tracing::info!(
                    client_order_id = %client_order_id,
                    symbol = %symbol,
                    side = %side,
                    qty = %quantity,
                    stop_loss = ?order.stop_loss,
                    take_profit = ?order.take_profit,
                    reason,
                    "Order submitted"
                );
                SubmitOutcome::Submitted(order)
            }
            Err(e) => self.handle_submit_error(client_order_id, request, reason, e).await,
        }
    }

    fn build_request(
        &self,
        client_order_id: &ClientOrderId,
        symbol: &Symbol,
        side: OrderSide,
        quantity: Decimal,
        price: Option<Decimal>,
        sizing: &SizingDecision,
    ) -> SubmitOrderRequest {
        let request = match price {
            Some(limit) => SubmitOrderRequest::limit(
                client_order_id.clone(),
                symbol.clone(),
                side,
                quantity,
                limit,
            ),
            None => SubmitOrderRequest::market(client_order_id.clone(), symbol.clone(), side, quantity),
        }
        .with_time_in_force(self.config.time_in_force);

        if !self.config.use_bracket_orders {
            return request;
        }
        let position_side = PositionSide::from(side);
        let entry = sizing.reference_price;
        let distance = sizing
            .stop_distance
            .max(entry * self.config.stops.floor_pct);
        let stop_loss = round_stop(position_side, position_side.toward_loss(entry, distance));
        let take_profit = position_side
            .toward_profit(entry, distance * self.config.stops.take_profit_r)
            .round_dp(2);
        request.with_bracket(BracketLegs {
            stop_loss,
            take_profit: Some(take_profit),
        })
    }

    async fn record(&self, order: &Order) {
        if let Err(e) = self.ledger.insert_order(order).await {
            tracing::error!(
                client_order_id = %order.client_order_id,
                error = %e,
                "Order placed but ledger write failed"
            );
        }
        self.state.apply(StateUpdate::OrderUpserted(order.clone()));
    }

    async fn handle_submit_error(
        &self,
        client_order_id: &ClientOrderId,
        request: SubmitOrderRequest,
        reason: &str,
        error: BrokerError,
    ) -> SubmitOutcome {
        let transient = error.is_transient();
        if transient {
            tracing::warn!(
                client_order_id = %client_order_id,
                symbol = %request.symbol,
                error = %error,
                "Submission failed transiently; retry allowed in this window"
            );
            return SubmitOutcome::Failed {
                reason: error.to_string(),
                transient,
            };
        }

        // The brokerage may already hold this id from before a restart.
        if matches!(error, BrokerError::OrderRejected { .. })
            && let Some(existing) = self.find_remote(client_order_id, &request.symbol).await
        {
            tracing::warn!(
                client_order_id = %client_order_id,
                symbol = %request.symbol,
                "Brokerage already holds this order; adopting it"
            );
            self.record(&existing).await;
            return SubmitOutcome::Duplicate(existing);
        }

        tracing::error!(
            client_order_id = %client_order_id,
            symbol = %request.symbol,
            error = %error,
            "Submission rejected by brokerage"
        );
        let record = rejected_record(request, reason, &error);
        if let Err(e) = self.ledger.insert_order(&record).await {
            tracing::warn!(client_order_id = %client_order_id, error = %e, "Could not record rejection");
        }
        SubmitOutcome::Failed {
            reason: error.to_string(),
            transient,
        }
    }

    async fn find_remote(&self, client_order_id: &ClientOrderId, symbol: &Symbol) -> Option<Order> {
        let query = OrderQuery {
            status: OrderStatusFilter::All,
            symbols: vec![symbol.clone()],
        };
        match self.gateway.get_orders(query).await {
            Ok(orders) => orders
                .into_iter()
                .find(|o| &o.client_order_id == client_order_id),
            Err(e) => {
                tracing::warn!(client_order_id = %client_order_id, error = %e, "Could not look up remote order");
                None
            }
        }
    }

    /// Apply a brokerage status report to the ledger and state.
    ///
    /// Returns the updated record, or `None` for orders the ledger does not
    /// track (bracket legs, orders placed elsewhere). A growing fill on an
    /// entry opens or extends the local position.
    ///
    /// # Errors
    ///
    /// Returns a ledger error if the record cannot be read or written.
    pub async fn apply_order_update(
        &self,
        update: OrderUpdate,
    ) -> Result<Option<Order>, ExecutionError> {
        let Some(current) = self.ledger.get_order(&update.client_order_id).await? else {
            tracing::debug!(client_order_id = %update.client_order_id, "Update for untracked order");
            return Ok(None);
        };
        let patch = update.diff(&current);
        if patch.is_empty() {
            return Ok(Some(current));
        }

        let updated = self
            .ledger
            .update_order(&update.client_order_id, &patch)
            .await?;
        if !self.state.apply(StateUpdate::OrderStatusChanged {
            client_order_id: update.client_order_id.clone(),
            patch: patch.clone(),
        }) {
            self.state.apply(StateUpdate::OrderUpserted(updated.clone()));
        }
        tracing::info!(
            client_order_id = %updated.client_order_id,
            symbol = %updated.symbol,
            status = %updated.status,
            filled_qty = %updated.filled_qty,
            "Order status updated"
        );

        if let Some(filled) = patch.filled_qty
            && filled > current.filled_qty
        {
            self.apply_fill(&updated, filled - current.filled_qty);
        }
        Ok(Some(updated))
    }

    fn apply_fill(&self, order: &Order, delta: Decimal) {
        let side = PositionSide::from(order.side);
        if self
            .state
            .position(&order.symbol)
            .is_some_and(|p| p.side != side)
        {
            // Closing fill; position sync picks up the reduced quantity.
            return;
        }
        let Some(price) = order.filled_avg_price.or(order.limit_price) else {
            tracing::warn!(client_order_id = %order.client_order_id, "Fill without a price; waiting for position sync");
            return;
        };
        self.state.apply(StateUpdate::PositionFilled {
            symbol: order.symbol.clone(),
            side,
            quantity: delta,
            price,
            stop_loss: order.stop_loss,
            take_profit: order.take_profit,
        });
    }

    /// Pull brokerage status for every non-terminal ledger order.
    ///
    /// Returns how many orders changed.
    ///
    /// # Errors
    ///
    /// Returns the ledger or brokerage failure that stopped the sync.
    pub async fn sync_order_statuses(&self) -> Result<usize, ExecutionError> {
        let open = self.ledger.list_open().await?;
        if open.is_empty() {
            return Ok(0);
        }
        let mut symbols: Vec<Symbol> = open.iter().map(|o| o.symbol.clone()).collect();
        symbols.sort();
        symbols.dedup();

        let remote = self
            .gateway
            .get_orders(OrderQuery {
                status: OrderStatusFilter::All,
                symbols,
            })
            .await?;
        let by_id: HashMap<&ClientOrderId, &Order> =
            remote.iter().map(|o| (&o.client_order_id, o)).collect();

        let mut changed = 0;
        for order in &open {
            let Some(update) = by_id
                .get(&order.client_order_id)
                .and_then(|remote| OrderUpdate::from_order(remote))
            else {
                tracing::debug!(client_order_id = %order.client_order_id, "Ledger order not listed by brokerage");
                continue;
            };
            if update.diff(order).is_empty() {
                continue;
            }
            self.apply_order_update(update).await?;
            changed += 1;
        }
        Ok(changed)
    }

    /// Cancel an order by client id and record the cancellation.
    ///
    /// # Errors
    ///
    /// `Rejected` for ids the ledger does not know or that never reached the
    /// brokerage, `StateDrift` when the brokerage no longer has the order,
    /// `TransientBroker` for retryable failures.
    pub async fn cancel_order(
        &self,
        client_order_id: &ClientOrderId,
    ) -> Result<Order, ExecutionError> {
        let order = self
            .ledger
            .get_order(client_order_id)
            .await?
            .ok_or_else(|| ExecutionError::Rejected {
                reason: format!("unknown order {client_order_id}"),
            })?;
        let broker_order_id =
            order
                .broker_order_id
                .clone()
                .ok_or_else(|| ExecutionError::Rejected {
                    reason: format!("order {client_order_id} never reached the brokerage"),
                })?;

        self.gateway.cancel_order(&broker_order_id).await?;

        let patch = OrderPatch::status(OrderStatus::Canceled);
        let updated = self.ledger.update_order(client_order_id, &patch).await?;
        self.state.apply(StateUpdate::OrderStatusChanged {
            client_order_id: client_order_id.clone(),
            patch,
        });
        tracing::info!(client_order_id = %client_order_id, symbol = %order.symbol, "Order canceled");
        Ok(updated)
    }
}

fn rejected_record(request: SubmitOrderRequest, reason: &str, error: &BrokerError) -> Order {
    Order {
        client_order_id: request.client_order_id,
        broker_order_id: None,
        symbol: request.symbol,
        side: request.side,
        order_type: request.order_type,
        status: OrderStatus::Rejected,
        quantity: request.quantity,
        filled_qty: Decimal::ZERO,
        filled_avg_price: None,
        limit_price: request.limit_price,
        stop_price: request.stop_price,
        trail_percent: request.trail_percent,
        stop_loss: request.bracket.as_ref().map(|b| b.stop_loss),
        take_profit: request.bracket.as_ref().and_then(|b| b.take_profit),
        submitted_at: Utc::now(),
        reason: format!("{reason} (rejected: {error})"),
    }
}
