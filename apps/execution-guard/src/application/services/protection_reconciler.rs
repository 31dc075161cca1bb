//! Protection Reconciler Service
//!
//! Keeps every open position behind a live stop. Each tick re-reads
//! positions and orders from the brokerage and drives every symbol toward
//! its desired state:
//!
//! ```text
//! stop found    -> cancel duplicates, grow an undersized stop, tighten drift
//! stop missing  -> cancel stray exits, settle, stop first, target best-effort
//! stop rejected -> settle, cancel leftovers, one standalone floored stop
//! ```
//!
//! Nothing is carried between ticks except the status table, so the loop
//! can be interrupted anywhere and the next tick finishes the job.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::ports::{
    BrokerError, FeatureProvider, OrderGateway, OrderQuery, OrderStatusFilter,
    ReplaceOrderRequest, SubmitOrderRequest,
};
use crate::application::state::{StateUpdate, TradingStateStore};
use crate::domain::order_execution::{ClientOrderIdFactory, Order, OrderType, TimeInForce};
use crate::domain::portfolio::Position;
use crate::domain::shared::Symbol;
use crate::domain::stop_enforcement::{
    ProtectionRecord, ProtectionStatus, StopPolicy, is_safe_tightening, live_exit_orders,
    live_protective_orders,
};

/// Reconciler configuration.
#[derive(Debug, Clone)]
pub struct ProtectionConfig {
    /// Stop distance, floor, target and trailing parameters.
    pub stops: StopPolicy,
    /// Pause after cancel requests before placing new orders.
    pub settle_delay: Duration,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            stops: StopPolicy::default(),
            settle_delay: Duration::from_millis(500),
        }
    }
}

/// Status table returned by [`ProtectionReconciler::get_protection_status`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionSummary {
    /// Per-symbol records, sorted by symbol.
    pub records: Vec<ProtectionRecord>,
    /// Symbols with a live stop.
    pub protected: usize,
    /// Symbols repaired on the last tick.
    pub created: usize,
    /// Symbols still unprotected.
    pub failed: usize,
    /// When the last tick finished.
    pub last_run: Option<DateTime<Utc>>,
}

/// Level-triggered stop-loss reconciler.
pub struct ProtectionReconciler<G: OrderGateway> {
    config: ProtectionConfig,
    gateway: Arc<G>,
    state: Arc<TradingStateStore>,
    features: Arc<dyn FeatureProvider>,
    ids: ClientOrderIdFactory,
    records: RwLock<HashMap<Symbol, ProtectionRecord>>,
    last_run: RwLock<Option<DateTime<Utc>>>,
}

impl<G: OrderGateway> std::fmt::Debug for ProtectionReconciler<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtectionReconciler")
            .field("config", &self.config)
            .field("records", &self.records.read().len())
            .finish_non_exhaustive()
    }
}

impl<G: OrderGateway> ProtectionReconciler<G> {
    /// Create a reconciler.
    #[must_use]
    pub fn new(
        config: ProtectionConfig,
        gateway: Arc<G>,
        state: Arc<TradingStateStore>,
        features: Arc<dyn FeatureProvider>,
        ids: ClientOrderIdFactory,
    ) -> Self {
        Self {
            config,
            gateway,
            state,
            features,
            ids,
            records: RwLock::new(HashMap::new()),
            last_run: RwLock::new(None),
        }
    }

    /// Run one reconciliation tick over every open position.
    ///
    /// Every open symbol appears exactly once in the result. A failed
    /// brokerage read marks every locally known symbol `Failed`.
    pub async fn verify_all_positions(&self) -> HashMap<Symbol, ProtectionStatus> {
        let positions = match self.gateway.get_positions().await {
            Ok(positions) => positions,
            Err(e) => return self.fail_all(self.state.snapshot().symbols(), &e),
        };
        let orders = match self.gateway.get_orders(OrderQuery::open()).await {
            Ok(orders) => orders,
            Err(e) => {
                let mut symbols: Vec<Symbol> =
                    positions.iter().map(|p| p.symbol.clone()).collect();
                symbols.extend(self.state.snapshot().symbols());
                symbols.sort();
                symbols.dedup();
                return self.fail_all(symbols, &e);
            }
        };

        let local = self.state.snapshot();
        let mut records = HashMap::with_capacity(positions.len());
        for mut position in positions {
            if let Some(previous) = local.position(&position.symbol)
                && previous.side == position.side
            {
                position.inherit_annotations(previous);
            }
            let record = self.reconcile(&position, &orders).await;
            records.insert(position.symbol.clone(), record);
        }

        let statuses = records
            .iter()
            .map(|(symbol, record)| (symbol.clone(), record.status))
            .collect();
        *self.records.write() = records;
        *self.last_run.write() = Some(Utc::now());
        statuses
    }

    /// Per-symbol records from the last tick.
    #[must_use]
    pub fn get_protection_status(&self) -> ProtectionSummary {
        let mut records: Vec<ProtectionRecord> = self.records.read().values().cloned().collect();
        records.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        let count = |status| records.iter().filter(|r| r.status == status).count();
        ProtectionSummary {
            protected: count(ProtectionStatus::Protected),
            created: count(ProtectionStatus::Created),
            failed: count(ProtectionStatus::Failed),
            last_run: *self.last_run.read(),
            records,
        }
    }

    fn fail_all(
        &self,
        symbols: Vec<Symbol>,
        error: &BrokerError,
    ) -> HashMap<Symbol, ProtectionStatus> {
        tracing::error!(error = %error, symbols = symbols.len(), "Protection fetch failed");
        let detail = format!("brokerage fetch failed: {error}");
        let records: HashMap<Symbol, ProtectionRecord> = symbols
            .into_iter()
            .map(|symbol| {
                metrics::counter!("guard_protection_failures_total").increment(1);
                let record =
                    ProtectionRecord::now(symbol.clone(), ProtectionStatus::Failed, detail.clone());
                (symbol, record)
            })
            .collect();
        let statuses = records
            .keys()
            .map(|symbol| (symbol.clone(), ProtectionStatus::Failed))
            .collect();
        *self.records.write() = records;
        *self.last_run.write() = Some(Utc::now());
        statuses
    }

    async fn reconcile(&self, position: &Position, orders: &[Order]) -> ProtectionRecord {
        let protective = live_protective_orders(position, orders);
        if let Some((best, extras)) = protective.split_first() {
            if !extras.is_empty() {
                tracing::warn!(
                    symbol = %position.symbol,
                    extra = extras.len(),
                    "Multiple protective orders; keeping the most protective"
                );
                self.cancel_all(extras).await;
            }
            if best.remaining_qty() >= position.quantity {
                let detail = self.heal(position, best).await;
                return ProtectionRecord::now(
                    position.symbol.clone(),
                    ProtectionStatus::Protected,
                    detail,
                );
            }
            if !extras.is_empty() {
                self.settle().await;
            }
            match self.resize(position, best).await {
                Ok(resized) => {
                    let detail = self.heal(position, &resized).await;
                    return ProtectionRecord::now(
                        position.symbol.clone(),
                        ProtectionStatus::Protected,
                        format!("stop resized to {}; {detail}", position.quantity),
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        symbol = %position.symbol,
                        covered = %best.remaining_qty(),
                        qty = %position.quantity,
                        error = %e,
                        "Stop undersized and resize failed; repairing"
                    );
                }
            }
        }

        let record = self.repair(position, orders).await;
        match record.status {
            ProtectionStatus::Created => {
                metrics::counter!("guard_protection_repairs_total").increment(1);
            }
            ProtectionStatus::Failed => {
                metrics::counter!("guard_protection_failures_total").increment(1);
            }
            ProtectionStatus::Protected => {}
        }
        record
    }

    /// Grow `stop_order` to cover the whole position.
    async fn resize(&self, position: &Position, stop_order: &Order) -> Result<Order, BrokerError> {
        let Some(broker_order_id) = &stop_order.broker_order_id else {
            return Err(BrokerError::OrderNotFound {
                order_id: stop_order.client_order_id.to_string(),
            });
        };
        let resized = self
            .gateway
            .replace_order(broker_order_id, ReplaceOrderRequest::quantity(position.quantity))
            .await?;
        tracing::info!(
            symbol = %position.symbol,
            from = %stop_order.remaining_qty(),
            to = %position.quantity,
            "Resized undersized stop"
        );
        self.state.apply(StateUpdate::OrderUpserted(resized.clone()));
        Ok(resized)
    }

    async fn heal(&self, position: &Position, stop_order: &Order) -> String {
        let side = position.side;
        if stop_order.order_type == OrderType::TrailingStop {
            return "trailing stop in place".to_string();
        }
        let Some(broker_stop) = stop_order.stop_price else {
            return "stop in place".to_string();
        };

        match position.stop_loss {
            Some(desired) if side.is_more_protective(desired, broker_stop) => {
                if !is_safe_tightening(side, broker_stop, desired, position.current_price) {
                    tracing::warn!(
                        symbol = %position.symbol,
                        broker_stop = %broker_stop,
                        desired = %desired,
                        price = %position.current_price,
                        "Desired stop crosses the market; leaving brokerage stop"
                    );
                    return format!("stop {broker_stop}; desired {desired} crosses market");
                }
                let Some(broker_order_id) = &stop_order.broker_order_id else {
                    return format!("stop {broker_stop}");
                };
                match self
                    .gateway
                    .replace_order(broker_order_id, ReplaceOrderRequest::stop_price(desired))
                    .await
                {
                    Ok(_) => {
                        metrics::counter!("guard_stop_heals_total").increment(1);
                        tracing::info!(
                            symbol = %position.symbol,
                            from = %broker_stop,
                            to = %desired,
                            "Tightened drifted stop"
                        );
                        format!("stop tightened {broker_stop} -> {desired}")
                    }
                    Err(e) => {
                        tracing::warn!(symbol = %position.symbol, error = %e, "Stop tighten failed; retrying next tick");
                        format!("stop {broker_stop}; tighten to {desired} failed: {e}")
                    }
                }
            }
            Some(desired) if !side.is_more_protective(broker_stop, desired) => {
                format!("stop {broker_stop}")
            }
            _ => {
                // Brokerage stop is tighter (or we had none): adopt it.
                self.state.apply(StateUpdate::StopAdjusted {
                    symbol: position.symbol.clone(),
                    stop: broker_stop,
                });
                format!("stop {broker_stop}")
            }
        }
    }

    async fn repair(&self, position: &Position, orders: &[Order]) -> ProtectionRecord {
        let symbol = &position.symbol;
        tracing::warn!(
            symbol = %symbol,
            side = %position.side,
            qty = %position.quantity,
            "Position unprotected; repairing"
        );

        self.cancel_all(&live_exit_orders(position, orders)).await;
        self.settle().await;

        let stops = &self.config.stops;
        if stops.wants_trailing(position) {
            let request = SubmitOrderRequest::trailing_stop(
                self.ids.protective_id("trail"),
                symbol.clone(),
                position.side.closing_side(),
                position.quantity,
                stops.trail_percent,
            );
            match self.gateway.submit_order(request).await {
                Ok(order) => {
                    self.state.apply(StateUpdate::OrderUpserted(order));
                    tracing::info!(symbol = %symbol, trail_percent = %stops.trail_percent, "Trailing stop placed");
                    return ProtectionRecord::now(
                        symbol.clone(),
                        ProtectionStatus::Created,
                        format!("trailing stop {}%", stops.trail_percent),
                    );
                }
                Err(e) => {
                    tracing::warn!(symbol = %symbol, error = %e, "Trailing stop rejected; placing fixed stop");
                }
            }
        }

        let atr = self.atr(symbol).await;
        let level = stops.repair_level(position, atr);
        match self.submit_stop(position, level.stop_price).await {
            Ok(()) => {
                let target = self.place_target(position, level.distance).await;
                ProtectionRecord::now(
                    symbol.clone(),
                    ProtectionStatus::Created,
                    format!("stop {} ({:?}); {target}", level.stop_price, level.source),
                )
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(symbol = %symbol, error = %e, "Stop placement failed transiently");
                ProtectionRecord::now(symbol.clone(), ProtectionStatus::Failed, e.to_string())
            }
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "Stop rejected; falling back to standalone stop");
                self.standalone_stop(position, atr).await
            }
        }
    }

    async fn standalone_stop(&self, position: &Position, atr: Option<Decimal>) -> ProtectionRecord {
        let symbol = &position.symbol;
        self.settle().await;

        let query = OrderQuery {
            status: OrderStatusFilter::Open,
            symbols: vec![symbol.clone()],
        };
        match self.gateway.get_orders(query).await {
            Ok(leftovers) => self.cancel_all(&live_exit_orders(position, &leftovers)).await,
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "Could not list leftover exits");
            }
        }

        let mut unanchored = position.clone();
        unanchored.stop_loss = None;
        let level = self.config.stops.repair_level(&unanchored, atr);
        match self.submit_stop(position, level.stop_price).await {
            Ok(()) => ProtectionRecord::now(
                symbol.clone(),
                ProtectionStatus::Created,
                format!("standalone stop {}", level.stop_price),
            ),
            Err(e) => {
                tracing::error!(symbol = %symbol, error = %e, "Standalone stop failed; position unprotected");
                ProtectionRecord::now(symbol.clone(), ProtectionStatus::Failed, e.to_string())
            }
        }
    }

    async fn submit_stop(&self, position: &Position, stop_price: Decimal) -> Result<(), BrokerError> {
        let request = SubmitOrderRequest::stop(
            self.ids.protective_id("stop"),
            position.symbol.clone(),
            position.side.closing_side(),
            position.quantity,
            stop_price,
        );
        let order = self.gateway.submit_order(request).await?;
        self.state.apply(StateUpdate::OrderUpserted(order));
        self.state.apply(StateUpdate::StopAdjusted {
            symbol: position.symbol.clone(),
            stop: stop_price,
        });
        tracing::info!(symbol = %position.symbol, stop = %stop_price, "Protective stop placed");
        Ok(())
    }

    async fn place_target(&self, position: &Position, distance: Decimal) -> String {
        let Some(target) = self.config.stops.target_level(position, distance) else {
            return "no target beyond market".to_string();
        };
        let request = SubmitOrderRequest::limit(
            self.ids.protective_id("tp"),
            position.symbol.clone(),
            position.side.closing_side(),
            position.quantity,
            target,
        )
        .with_time_in_force(TimeInForce::Gtc);
        match self.gateway.submit_order(request).await {
            Ok(order) => {
                self.state.apply(StateUpdate::OrderUpserted(order));
                self.state.apply(StateUpdate::TargetAdjusted {
                    symbol: position.symbol.clone(),
                    target,
                });
                format!("target {target}")
            }
            Err(e) => {
                tracing::warn!(symbol = %position.symbol, error = %e, "Take-profit not placed; stop stands");
                format!("target {target} failed: {e}")
            }
        }
    }

    async fn cancel_all(&self, orders: &[&Order]) {
        let cancels = orders.iter().filter_map(|order| {
            let broker_order_id = order.broker_order_id.clone()?;
            Some(async move {
                match self.gateway.cancel_order(&broker_order_id).await {
                    Ok(()) => tracing::debug!(symbol = %order.symbol, order_id = %broker_order_id, "Canceled exit order"),
                    Err(e) if e.is_not_found() => {
                        tracing::debug!(order_id = %broker_order_id, "Exit order already gone");
                    }
                    Err(e) => {
                        tracing::warn!(symbol = %order.symbol, order_id = %broker_order_id, error = %e, "Cancel failed");
                    }
                }
            })
        });
        join_all(cancels).await;
    }

    async fn settle(&self) {
        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }
    }

    async fn atr(&self, symbol: &Symbol) -> Option<Decimal> {
        match self.features.snapshot(symbol).await {
            Ok(snapshot) => snapshot.and_then(|s| s.atr),
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "No ATR; using floor distance");
                None
            }
        }
    }
}
