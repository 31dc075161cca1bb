//! Background supervision.
//!
//! Position sync pulls the brokerage view into the state store, feeds the
//! circuit breaker and refreshes ledger order statuses. `spawn_periodic`
//! runs any of the guard's passes on a fixed cadence until shutdown.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{OrderGateway, OrderLedger};
use crate::application::state::{StateUpdate, TradingStateStore};
use crate::error::ExecutionError;

use super::order_manager::OrderManager;
use super::risk_manager::RiskManager;

/// Result of one position sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Open positions after the sync.
    pub positions: usize,
    /// Symbols closed at a loss since the last sync.
    pub cooldowns_started: usize,
    /// Ledger orders whose status changed.
    pub orders_updated: usize,
    /// Breaker state after evaluating the account.
    pub circuit_breaker_tripped: bool,
}

/// Brokerage-to-state position sync.
pub struct PositionSync<G: OrderGateway, L: OrderLedger> {
    gateway: Arc<G>,
    state: Arc<TradingStateStore>,
    orders: Arc<OrderManager<G, L>>,
    risk: Arc<RiskManager<G>>,
    loss_cooldown: Duration,
}

impl<G: OrderGateway, L: OrderLedger> std::fmt::Debug for PositionSync<G, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionSync")
            .field("loss_cooldown", &self.loss_cooldown)
            .finish_non_exhaustive()
    }
}

impl<G: OrderGateway, L: OrderLedger> PositionSync<G, L> {
    /// Create a sync task body.
    #[must_use]
    pub fn new(
        gateway: Arc<G>,
        state: Arc<TradingStateStore>,
        orders: Arc<OrderManager<G, L>>,
        loss_cooldown: Duration,
    ) -> Self {
        let risk = Arc::clone(orders.risk());
        Self {
            gateway,
            state,
            orders,
            risk,
            loss_cooldown,
        }
    }

    /// Run one sync.
    ///
    /// # Errors
    ///
    /// Returns the first brokerage or ledger failure. State is only replaced
    /// when both positions and account were fetched.
    pub async fn run_once(&self) -> Result<SyncReport, ExecutionError> {
        let positions = self.gateway.get_positions().await?;
        let account = self.gateway.get_account().await?;
        let now = Utc::now();

        let previous = self.state.positions();
        let mut cooldowns_started = 0;
        let cooldown = chrono::Duration::from_std(self.loss_cooldown)
            .unwrap_or_else(|_| chrono::Duration::minutes(30));
        for closed in previous
            .iter()
            .filter(|p| !positions.iter().any(|open| open.symbol == p.symbol))
        {
            if closed.unrealized_pl < rust_decimal::Decimal::ZERO {
                tracing::info!(symbol = %closed.symbol, pl = %closed.unrealized_pl, "Closed at a loss; cooldown started");
                self.state.apply(StateUpdate::CooldownStarted {
                    symbol: closed.symbol.clone(),
                    until: now + cooldown,
                });
                cooldowns_started += 1;
            }
        }

        let count = positions.len();
        self.state.apply(StateUpdate::PositionsSynced {
            positions,
            account: Some(account.clone()),
        });
        let circuit_breaker_tripped = self.risk.evaluate_circuit_breaker(&account);
        let orders_updated = self.orders.sync_order_statuses().await?;
        self.state.prune_cooldowns(now);

        Ok(SyncReport {
            positions: count,
            cooldowns_started,
            orders_updated,
            circuit_breaker_tripped,
        })
    }
}

/// Run `tick` every `period` until `shutdown` fires.
///
/// Ticks that overrun the period are skipped, not queued. A tick in flight
/// when shutdown fires is dropped at its next await point.
pub fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    shutdown: CancellationToken,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(task = name, period_ms = period.as_millis(), "Periodic task started");

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                () = shutdown.cancelled() => break,
            }
            tokio::select! {
                () = tick() => {}
                () = shutdown.cancelled() => break,
            }
        }
        tracing::info!(task = name, "Periodic task shutting down");
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rust_decimal_macros::dec;

    use super::*;
    use crate::application::services::{RegimeService, RiskConfig};
    use crate::domain::order_execution::ClientOrderIdFactory;
    use crate::domain::portfolio::{Position, PositionSide};
    use crate::domain::shared::Symbol;
    use crate::infrastructure::broker::{MockGateway, default_account};
    use crate::infrastructure::persistence::InMemoryOrderLedger;
    use crate::infrastructure::providers::{
        InMemoryFeatureStore, StaticRegimeProvider, StaticSentimentProvider,
    };
    use crate::application::services::OrderConfig;

    fn sync(gateway: &Arc<MockGateway>, state: &Arc<TradingStateStore>) -> PositionSync<MockGateway, InMemoryOrderLedger> {
        let regime = Arc::new(RegimeService::new(
            Arc::new(StaticRegimeProvider::default()),
            Arc::new(StaticSentimentProvider::default()),
            Duration::from_secs(60),
        ));
        let risk = Arc::new(RiskManager::new(
            RiskConfig::default(),
            Arc::clone(gateway),
            Arc::clone(state),
            Arc::new(InMemoryFeatureStore::new()),
            regime,
        ));
        let orders = Arc::new(OrderManager::new(
            OrderConfig::default(),
            Arc::clone(gateway),
            Arc::new(InMemoryOrderLedger::new()),
            Arc::clone(state),
            risk,
            ClientOrderIdFactory::new("eg", dec!(0.05), 300),
        ));
        PositionSync::new(Arc::clone(gateway), Arc::clone(state), orders, Duration::from_secs(1800))
    }

    #[tokio::test]
    async fn losing_close_starts_cooldown() {
        let gateway = Arc::new(MockGateway::new());
        let state = Arc::new(TradingStateStore::new());
        let aapl = Symbol::new("AAPL");
        gateway.set_position(Position::new(aapl.clone(), PositionSide::Long, dec!(10), dec!(100), dec!(95)));
        let sync = sync(&gateway, &state);

        let first = sync.run_once().await.unwrap();
        assert_eq!(first.positions, 1);

        gateway.close_position(&aapl);
        let second = sync.run_once().await.unwrap();
        assert_eq!(second.positions, 0);
        assert_eq!(second.cooldowns_started, 1);
        assert!(state.snapshot().in_cooldown(&aapl, Utc::now()));
    }

    #[tokio::test]
    async fn account_drawdown_trips_breaker() {
        let gateway = Arc::new(MockGateway::new());
        let state = Arc::new(TradingStateStore::new());
        let mut account = default_account();
        account.equity = dec!(96000);
        gateway.set_account(account);

        let report = sync(&gateway, &state).run_once().await.unwrap();
        assert!(report.circuit_breaker_tripped);
    }

    #[tokio::test]
    async fn query_failure_leaves_state_untouched() {
        let gateway = Arc::new(MockGateway::new());
        let state = Arc::new(TradingStateStore::new());
        gateway.fail_queries(true);
        assert!(sync(&gateway, &state).run_once().await.is_err());
        assert!(state.snapshot().last_sync.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_task_stops_on_shutdown() {
        let count = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();
        let seen = Arc::clone(&count);
        let handle = spawn_periodic("test", Duration::from_secs(1), shutdown.clone(), move || {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
