//! Single-writer store for positions, orders, cooldowns and the account.
//!
//! All mutation goes through [`TradingStateStore::apply`] under one write
//! lock. Readers get cloned snapshots and never hold the lock across awaits.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::domain::order_execution::{Order, OrderPatch};
use crate::domain::portfolio::{AccountSnapshot, Position, PositionSide};
use crate::domain::shared::{ClientOrderId, Symbol};

/// A state transition.
#[derive(Debug, Clone)]
pub enum StateUpdate {
    /// Brokerage view of positions (and optionally the account) replaces ours.
    /// Local annotations carry over for symbols that remain open.
    PositionsSynced {
        /// Open positions.
        positions: Vec<Position>,
        /// Fresh account snapshot.
        account: Option<AccountSnapshot>,
    },
    /// Insert or overwrite an order.
    OrderUpserted(Order),
    /// Patch a known order.
    OrderStatusChanged {
        /// Order to patch.
        client_order_id: ClientOrderId,
        /// Changes.
        patch: OrderPatch,
    },
    /// An entry order filled.
    PositionFilled {
        /// Instrument.
        symbol: Symbol,
        /// Position side.
        side: PositionSide,
        /// Filled shares.
        quantity: Decimal,
        /// Fill price.
        price: Decimal,
        /// Stop attached to the entry.
        stop_loss: Option<Decimal>,
        /// Target attached to the entry.
        take_profit: Option<Decimal>,
    },
    /// Desired stop moved. Applied only if it tightens.
    StopAdjusted {
        /// Instrument.
        symbol: Symbol,
        /// New stop.
        stop: Decimal,
    },
    /// Desired target moved.
    TargetAdjusted {
        /// Instrument.
        symbol: Symbol,
        /// New target.
        target: Decimal,
    },
    /// Partial exit placed.
    PartialTaken {
        /// Instrument.
        symbol: Symbol,
        /// Shares left.
        remaining: Decimal,
    },
    /// Re-entry cooldown.
    CooldownStarted {
        /// Instrument.
        symbol: Symbol,
        /// Cooldown end.
        until: DateTime<Utc>,
    },
}

/// Point-in-time copy of the trading state.
#[derive(Debug, Clone, Default)]
pub struct TradingSnapshot {
    /// Open positions by symbol.
    pub positions: HashMap<Symbol, Position>,
    /// Orders by client id.
    pub orders: HashMap<ClientOrderId, Order>,
    /// Cooldown end per symbol.
    pub cooldowns: HashMap<Symbol, DateTime<Utc>>,
    /// Last account snapshot.
    pub account: Option<AccountSnapshot>,
    /// Last position sync.
    pub last_sync: Option<DateTime<Utc>>,
}

impl TradingSnapshot {
    /// Position for a symbol.
    #[must_use]
    pub fn position(&self, symbol: &Symbol) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Whether a symbol is cooling down at `now`.
    #[must_use]
    pub fn in_cooldown(&self, symbol: &Symbol, now: DateTime<Utc>) -> bool {
        self.cooldowns.get(symbol).is_some_and(|until| *until > now)
    }

    /// Symbols with open positions, sorted.
    #[must_use]
    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.positions.keys().cloned().collect();
        symbols.sort();
        symbols
    }
}

/// Owner of the shared trading state.
#[derive(Debug, Default)]
pub struct TradingStateStore {
    inner: RwLock<TradingSnapshot>,
}

impl TradingStateStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one update. Returns true if state changed.
    pub fn apply(&self, update: StateUpdate) -> bool {
        let mut state = self.inner.write();
        match update {
            StateUpdate::PositionsSynced { positions, account } => {
                let mut next = HashMap::with_capacity(positions.len());
                for mut position in positions {
                    if let Some(previous) = state.positions.get(&position.symbol)
                        && previous.side == position.side
                    {
                        position.inherit_annotations(previous);
                    }
                    next.insert(position.symbol.clone(), position);
                }
                state.positions = next;
                if account.is_some() {
                    state.account = account;
                }
                state.last_sync = Some(Utc::now());
                true
            }
            StateUpdate::OrderUpserted(order) => {
                state.orders.insert(order.client_order_id.clone(), order);
                true
            }
            StateUpdate::OrderStatusChanged {
                client_order_id,
                patch,
            } => state.orders.get_mut(&client_order_id).is_some_and(|order| {
                patch.apply_to(order);
                true
            }),
            StateUpdate::PositionFilled {
                symbol,
                side,
                quantity,
                price,
                stop_loss,
                take_profit,
            } => match state.positions.get_mut(&symbol) {
                Some(existing) if existing.side == side => {
                    if let Err(e) = existing.apply_opening_fill(quantity, price) {
                        tracing::warn!(symbol = %symbol, error = %e, "Ignoring invalid fill");
                        return false;
                    }
                    if existing.stop_loss.is_none() {
                        *existing = existing.clone().with_levels(stop_loss, take_profit);
                    }
                    true
                }
                Some(existing) => {
                    tracing::warn!(
                        symbol = %symbol,
                        held = %existing.side,
                        filled = %side,
                        "Fill opposes held position; leaving it to position sync"
                    );
                    false
                }
                None => {
                    let position = Position::new(symbol.clone(), side, quantity, price, price)
                        .with_levels(stop_loss, take_profit);
                    state.positions.insert(symbol, position);
                    true
                }
            },
            StateUpdate::StopAdjusted { symbol, stop } => {
                state.positions.get_mut(&symbol).is_some_and(|position| {
                    let tightens = position
                        .stop_loss
                        .is_none_or(|current| position.side.is_more_protective(stop, current));
                    if tightens {
                        position.stop_loss = Some(stop);
                        if position.initial_stop.is_none() {
                            position.initial_stop = Some(stop);
                        }
                    }
                    tightens
                })
            }
            StateUpdate::TargetAdjusted { symbol, target } => {
                state.positions.get_mut(&symbol).is_some_and(|position| {
                    position.take_profit = Some(target);
                    true
                })
            }
            StateUpdate::PartialTaken { symbol, remaining } => {
                state.positions.get_mut(&symbol).is_some_and(|position| {
                    position.partial_taken = true;
                    position.quantity = remaining;
                    true
                })
            }
            StateUpdate::CooldownStarted { symbol, until } => {
                state.cooldowns.insert(symbol, until);
                true
            }
        }
    }

    /// Cloned snapshot of everything.
    #[must_use]
    pub fn snapshot(&self) -> TradingSnapshot {
        self.inner.read().clone()
    }

    /// Cloned position.
    #[must_use]
    pub fn position(&self, symbol: &Symbol) -> Option<Position> {
        self.inner.read().positions.get(symbol).cloned()
    }

    /// Cloned positions.
    #[must_use]
    pub fn positions(&self) -> Vec<Position> {
        self.inner.read().positions.values().cloned().collect()
    }

    /// Cloned order.
    #[must_use]
    pub fn order(&self, client_order_id: &ClientOrderId) -> Option<Order> {
        self.inner.read().orders.get(client_order_id).cloned()
    }

    /// Last account snapshot.
    #[must_use]
    pub fn account(&self) -> Option<AccountSnapshot> {
        self.inner.read().account.clone()
    }

    /// Drop expired cooldowns.
    pub fn prune_cooldowns(&self, now: DateTime<Utc>) {
        self.inner.write().cooldowns.retain(|_, until| *until > now);
    }
}
