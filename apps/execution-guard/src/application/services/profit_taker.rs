//! Profit Taker
//!
//! Sells a fixed fraction of a position once it reaches the first R target.
//! The sale carries a client id derived from the position itself, so the
//! ledger and the brokerage both refuse a second partial for the same
//! position, including after a restart.

use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::application::ports::{OrderGateway, OrderLedger, ReplaceOrderRequest, SubmitOrderRequest};
use crate::application::state::{StateUpdate, TradingStateStore};
use crate::domain::order_execution::{ClientOrderIdFactory, Order};
use crate::domain::portfolio::Position;
use crate::domain::shared::{BrokerId, Symbol};
use crate::domain::stop_enforcement::{PartialExitDecision, ProfitTakingPolicy, find_protection};

use super::rollout::ManagedSet;

/// Profit taker configuration.
#[derive(Debug, Clone)]
pub struct ProfitTakingConfig {
    /// Partial exit rule.
    pub policy: ProfitTakingPolicy,
    /// Floor used for 1R when a position has no initial stop.
    pub floor_pct: Decimal,
    /// Log decisions without acting.
    pub shadow_mode: bool,
    /// Most symbols managed live.
    pub max_positions: usize,
}

/// What the profit taker did for one position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfitAction {
    /// Not due, or not splittable.
    Unchanged,
    /// This position's partial is already on record.
    AlreadyTaken,
    /// Would have sold; shadow only.
    Shadow {
        /// Shares that would have been sold.
        qty: Decimal,
        /// Profit in R at decision time.
        r: Decimal,
    },
    /// Partial sale submitted.
    Taken {
        /// The sale order.
        order: Order,
        /// Shares left.
        remaining: Decimal,
    },
    /// Sale could not be placed; retried next tick.
    Failed {
        /// Why.
        reason: String,
    },
}

/// First-target partial profit taker.
pub struct ProfitTaker<G: OrderGateway, L: OrderLedger> {
    config: ProfitTakingConfig,
    gateway: Arc<G>,
    ledger: Arc<L>,
    state: Arc<TradingStateStore>,
    ids: ClientOrderIdFactory,
    managed: Mutex<ManagedSet>,
}

impl<G: OrderGateway, L: OrderLedger> std::fmt::Debug for ProfitTaker<G, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfitTaker")
            .field("config", &self.config)
            .field("managed", &self.managed.lock().symbols())
            .finish_non_exhaustive()
    }
}

impl<G: OrderGateway, L: OrderLedger> ProfitTaker<G, L> {
    /// Create a profit taker.
    #[must_use]
    pub fn new(
        config: ProfitTakingConfig,
        gateway: Arc<G>,
        ledger: Arc<L>,
        state: Arc<TradingStateStore>,
        ids: ClientOrderIdFactory,
    ) -> Self {
        let managed = Mutex::new(ManagedSet::new(config.max_positions));
        Self {
            config,
            gateway,
            ledger,
            state,
            ids,
            managed,
        }
    }

    /// Forget symbols that are no longer open.
    pub fn retain_open(&self, open: &[Symbol]) {
        self.managed.lock().retain_open(open);
    }

    /// Evaluate and, when live, apply the partial exit rule to one position.
    pub async fn evaluate(&self, position: &Position, orders: &[Order]) -> ProfitAction {
        let (qty, remaining, r) = match self.config.policy.evaluate(position, self.config.floor_pct) {
            PartialExitDecision::Take { qty, remaining, r } => (qty, remaining, r),
            PartialExitDecision::AlreadyTaken => return ProfitAction::AlreadyTaken,
            decision => {
                tracing::debug!(symbol = %position.symbol, ?decision, "No partial exit");
                return ProfitAction::Unchanged;
            }
        };

        let closing = position.side.closing_side();
        let client_order_id =
            self.ids
                .partial_exit_id(&position.symbol, closing, position.avg_entry_price);
        match self.ledger.order_exists(&client_order_id).await {
            Ok(true) => {
                self.state.apply(StateUpdate::PartialTaken {
                    symbol: position.symbol.clone(),
                    remaining: position.quantity,
                });
                return ProfitAction::AlreadyTaken;
            }
            Ok(false) => {}
            Err(e) => {
                return ProfitAction::Failed {
                    reason: e.to_string(),
                };
            }
        }

        let live = !self.config.shadow_mode && self.managed.lock().admit(&position.symbol);
        if !live {
            tracing::info!(
                symbol = %position.symbol,
                shadow = true,
                qty = %qty,
                pct = %self.config.policy.partial_pct,
                r = %r,
                price = %position.current_price,
                "Would take partial profit"
            );
            return ProfitAction::Shadow { qty, r };
        }

        // Shares held by the stop cannot be sold; shrink it to the remainder first.
        let stop_id = find_protection(position, orders)
            .stop_order
            .and_then(|o| o.broker_order_id);
        if let Some(id) = &stop_id
            && let Err(e) = self
                .gateway
                .replace_order(id, ReplaceOrderRequest::quantity(remaining))
                .await
        {
            tracing::warn!(symbol = %position.symbol, error = %e, "Could not resize stop; partial deferred");
            return ProfitAction::Failed {
                reason: e.to_string(),
            };
        }

        let request = SubmitOrderRequest::market(
            client_order_id.clone(),
            position.symbol.clone(),
            closing,
            qty,
        );
        match self.gateway.submit_order(request).await {
            Ok(mut order) => {
                order.reason = format!("partial profit at {r:.2}R");
                if let Err(e) = self.ledger.insert_order(&order).await {
                    tracing::error!(client_order_id = %client_order_id, error = %e, "Partial placed but ledger write failed");
                }
                self.state.apply(StateUpdate::OrderUpserted(order.clone()));
                self.state.apply(StateUpdate::PartialTaken {
                    symbol: position.symbol.clone(),
                    remaining,
                });
                metrics::counter!("guard_orders_submitted_total", "kind" => "partial_exit")
                    .increment(1);
                tracing::info!(
                    symbol = %position.symbol,
                    qty = %qty,
                    remaining = %remaining,
                    r = %r,
                    "Partial profit taken"
                );
                ProfitAction::Taken { order, remaining }
            }
            Err(e) => {
                tracing::warn!(symbol = %position.symbol, error = %e, "Partial sale failed");
                if let Some(id) = &stop_id {
                    self.restore_stop(position, id).await;
                }
                ProfitAction::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn restore_stop(&self, position: &Position, stop_id: &BrokerId) {
        if let Err(e) = self
            .gateway
            .replace_order(stop_id, ReplaceOrderRequest::quantity(position.quantity))
            .await
        {
            tracing::error!(
                symbol = %position.symbol,
                error = %e,
                "Could not restore stop quantity; reconciler will repair"
            );
        }
    }
}
