//! Trailing Stop Manager
//!
//! Ratchets the stop behind profitable positions. The desired stop in the
//! state store moves first; the brokerage stop follows by replace. If the
//! replace fails, the protection reconciler sees the drift and retries it.

use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::application::ports::{OrderGateway, ReplaceOrderRequest};
use crate::application::state::{StateUpdate, TradingStateStore};
use crate::domain::order_execution::{Order, OrderType};
use crate::domain::portfolio::Position;
use crate::domain::shared::Symbol;
use crate::domain::stop_enforcement::{TrailingDecision, TrailingPolicy, find_protection};

use super::rollout::ManagedSet;

/// Trailing manager configuration.
#[derive(Debug, Clone)]
pub struct TrailingConfig {
    /// Trailing rule.
    pub policy: TrailingPolicy,
    /// Floor used for 1R when a position has no initial stop.
    pub floor_pct: Decimal,
    /// Log decisions without acting.
    pub shadow_mode: bool,
    /// Most symbols managed live.
    pub max_positions: usize,
}

/// What the manager did for one position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrailingAction {
    /// Rule not active or no tightening due.
    Unchanged,
    /// Would have tightened; shadow only.
    Shadow {
        /// Level that would have been set.
        to: Decimal,
    },
    /// Desired stop tightened.
    Tightened {
        /// Previous stop.
        from: Option<Decimal>,
        /// New stop.
        to: Decimal,
        /// Whether the brokerage order was moved too.
        replaced: bool,
    },
}

/// R-gated trailing stop manager.
pub struct TrailingStopManager<G: OrderGateway> {
    config: TrailingConfig,
    gateway: Arc<G>,
    state: Arc<TradingStateStore>,
    managed: Mutex<ManagedSet>,
}

impl<G: OrderGateway> std::fmt::Debug for TrailingStopManager<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrailingStopManager")
            .field("config", &self.config)
            .field("managed", &self.managed.lock().symbols())
            .finish_non_exhaustive()
    }
}

impl<G: OrderGateway> TrailingStopManager<G> {
    /// Create a manager.
    #[must_use]
    pub fn new(config: TrailingConfig, gateway: Arc<G>, state: Arc<TradingStateStore>) -> Self {
        let managed = Mutex::new(ManagedSet::new(config.max_positions));
        Self {
            config,
            gateway,
            state,
            managed,
        }
    }

    /// Forget symbols that are no longer open.
    pub fn retain_open(&self, open: &[Symbol]) {
        self.managed.lock().retain_open(open);
    }

    /// Evaluate and, when live, apply the trailing rule to one position.
    ///
    /// `orders` is this tick's brokerage order list.
    pub async fn adjust(
        &self,
        position: &Position,
        orders: &[Order],
        atr: Option<Decimal>,
    ) -> TrailingAction {
        let protection = find_protection(position, orders);
        let current_stop = match (position.stop_loss, protection.stop_price) {
            (Some(local), Some(broker)) => Some(position.side.most_protective(local, broker)),
            (local, broker) => local.or(broker),
        };

        let decision =
            self.config
                .policy
                .evaluate(position, atr, current_stop, self.config.floor_pct);
        let TrailingDecision::Tighten { from, to, r } = decision else {
            tracing::debug!(symbol = %position.symbol, ?decision, "Trailing unchanged");
            return TrailingAction::Unchanged;
        };

        let live = !self.config.shadow_mode && self.managed.lock().admit(&position.symbol);
        if !live {
            tracing::info!(
                symbol = %position.symbol,
                shadow = true,
                from = ?from,
                to = %to,
                r = %r,
                "Would tighten trailing stop"
            );
            return TrailingAction::Shadow { to };
        }

        self.state.apply(StateUpdate::StopAdjusted {
            symbol: position.symbol.clone(),
            stop: to,
        });

        let replaced = match protection.stop_order {
            Some(order) if order.order_type == OrderType::Stop => {
                let Some(broker_order_id) = order.broker_order_id else {
                    return TrailingAction::Tightened {
                        from,
                        to,
                        replaced: false,
                    };
                };
                match self
                    .gateway
                    .replace_order(&broker_order_id, ReplaceOrderRequest::stop_price(to))
                    .await
                {
                    Ok(_) => true,
                    Err(e) => {
                        tracing::warn!(
                            symbol = %position.symbol,
                            error = %e,
                            "Trailing replace failed; reconciler will retry"
                        );
                        false
                    }
                }
            }
            _ => false,
        };

        tracing::info!(
            symbol = %position.symbol,
            from = ?from,
            to = %to,
            r = %r,
            replaced,
            "Trailing stop tightened"
        );
        TrailingAction::Tightened { from, to, replaced }
    }
}
