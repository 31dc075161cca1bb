//! Dependency Injection Container
//!
//! Wires the brokerage gateway, ledger and providers into the guard's
//! services and owns the three background loops.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    AdvisoryPort, FeatureProvider, OrderGateway, OrderLedger, RegimeProvider, SentimentProvider,
};
use crate::application::services::{
    ExitAdjusters, OrderManager, PositionSync, ProfitTaker, ProtectionReconciler, RegimeService,
    RiskManager, TimedGateway, TrailingStopManager, spawn_periodic,
};
use crate::application::state::TradingStateStore;
use crate::config::Config;
use crate::domain::stop_enforcement::ProtectionStatus;

/// Signal and advisory sources the guard reads from.
pub struct Providers {
    /// Per-symbol feature snapshots.
    pub features: Arc<dyn FeatureProvider>,
    /// Market regime.
    pub regime: Arc<dyn RegimeProvider>,
    /// Market sentiment.
    pub sentiment: Arc<dyn SentimentProvider>,
    /// Second opinion on high-risk trades, when enabled.
    pub advisor: Option<Arc<dyn AdvisoryPort>>,
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers")
            .field("advisor", &self.advisor.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy)]
struct Cadence {
    protection: Duration,
    exits: Duration,
    sync: Duration,
}

/// Dependency injection container.
///
/// Every service shares one timeout-bounded gateway, one ledger and one
/// state store.
pub struct Container<G, L>
where
    G: OrderGateway + 'static,
    L: OrderLedger + 'static,
{
    gateway: Arc<TimedGateway<G>>,
    ledger: Arc<L>,
    state: Arc<TradingStateStore>,
    regime: Arc<RegimeService>,
    orders: Arc<OrderManager<TimedGateway<G>, L>>,
    protection: Arc<ProtectionReconciler<TimedGateway<G>>>,
    exits: Arc<ExitAdjusters<TimedGateway<G>, L>>,
    sync: Arc<PositionSync<TimedGateway<G>, L>>,
    cadence: Cadence,
}

impl<G, L> std::fmt::Debug for Container<G, L>
where
    G: OrderGateway + 'static,
    L: OrderLedger + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("cadence", &self.cadence)
            .finish_non_exhaustive()
    }
}

impl<G, L> Container<G, L>
where
    G: OrderGateway + 'static,
    L: OrderLedger + 'static,
{
    /// Build every service from a validated configuration.
    #[must_use]
    pub fn new(config: &Config, gateway: G, ledger: Arc<L>, providers: Providers) -> Self {
        let gateway = Arc::new(TimedGateway::new(gateway, config.broker.call_timeout()));
        let state = Arc::new(TradingStateStore::new());
        let ids = config.orders.to_id_factory();
        let stops = config.protection.to_stop_policy();

        let regime = Arc::new(
            RegimeService::new(
                providers.regime,
                providers.sentiment,
                config.regime.cache_ttl(),
            )
            .with_fetch_timeout(config.regime.fetch_timeout()),
        );

        let mut risk = RiskManager::new(
            config.risk_config(),
            Arc::clone(&gateway),
            Arc::clone(&state),
            Arc::clone(&providers.features),
            Arc::clone(&regime),
        );
        if config.advisory.enabled {
            if let Some(advisor) = providers.advisor {
                risk = risk.with_advisor(advisor);
            } else {
                tracing::warn!("Advisory enabled but no advisor configured");
            }
        }
        let risk = Arc::new(risk);

        let orders = Arc::new(OrderManager::new(
            config.orders.to_order_config(stops),
            Arc::clone(&gateway),
            Arc::clone(&ledger),
            Arc::clone(&state),
            risk,
            ids.clone(),
        ));

        let protection = Arc::new(ProtectionReconciler::new(
            config.protection.to_protection_config(),
            Arc::clone(&gateway),
            Arc::clone(&state),
            Arc::clone(&providers.features),
            ids.clone(),
        ));

        let exits = Arc::new(ExitAdjusters::new(
            Arc::clone(&gateway),
            Arc::clone(&state),
            Arc::clone(&providers.features),
            TrailingStopManager::new(
                config.trailing_config(),
                Arc::clone(&gateway),
                Arc::clone(&state),
            ),
            ProfitTaker::new(
                config.profit_taking_config(),
                Arc::clone(&gateway),
                Arc::clone(&ledger),
                Arc::clone(&state),
                ids,
            ),
        ));

        let sync = Arc::new(PositionSync::new(
            Arc::clone(&gateway),
            Arc::clone(&state),
            Arc::clone(&orders),
            config.sync.loss_cooldown(),
        ));

        Self {
            gateway,
            ledger,
            state,
            regime,
            orders,
            protection,
            exits,
            sync,
            cadence: Cadence {
                protection: config.protection.interval(),
                exits: config.exits.interval(),
                sync: config.sync.interval(),
            },
        }
    }

    /// Spawn the protection, exit and sync loops.
    ///
    /// Each loop stops at its next await point once `shutdown` fires.
    pub fn start_loops(&self, shutdown: &CancellationToken) -> Vec<JoinHandle<()>> {
        let protection = Arc::clone(&self.protection);
        let protection_loop =
            spawn_periodic("protection", self.cadence.protection, shutdown.clone(), move || {
                let protection = Arc::clone(&protection);
                async move {
                    let statuses = protection.verify_all_positions().await;
                    let failed = statuses
                        .values()
                        .filter(|s| **s == ProtectionStatus::Failed)
                        .count();
                    tracing::debug!(positions = statuses.len(), failed, "Protection tick");
                }
            });

        let exits = Arc::clone(&self.exits);
        let exits_loop = spawn_periodic("exits", self.cadence.exits, shutdown.clone(), move || {
            let exits = Arc::clone(&exits);
            async move {
                if let Err(e) = exits.tick().await {
                    tracing::warn!(error = %e, "Exit tick skipped");
                }
            }
        });

        let sync = Arc::clone(&self.sync);
        let sync_loop = spawn_periodic("position_sync", self.cadence.sync, shutdown.clone(), move || {
            let sync = Arc::clone(&sync);
            async move {
                match sync.run_once().await {
                    Ok(report) => tracing::debug!(
                        positions = report.positions,
                        cooldowns = report.cooldowns_started,
                        orders_updated = report.orders_updated,
                        circuit_breaker = report.circuit_breaker_tripped,
                        "Position sync"
                    ),
                    Err(e) => tracing::warn!(error = %e, "Position sync failed"),
                }
            }
        });

        vec![protection_loop, exits_loop, sync_loop]
    }

    /// The timeout-bounded gateway shared by every service.
    #[must_use]
    pub fn gateway(&self) -> Arc<TimedGateway<G>> {
        Arc::clone(&self.gateway)
    }

    /// The order ledger.
    #[must_use]
    pub fn ledger(&self) -> Arc<L> {
        Arc::clone(&self.ledger)
    }

    /// The shared state store.
    #[must_use]
    pub fn state(&self) -> Arc<TradingStateStore> {
        Arc::clone(&self.state)
    }

    /// The cached regime service.
    #[must_use]
    pub fn regime(&self) -> Arc<RegimeService> {
        Arc::clone(&self.regime)
    }

    /// The risk manager.
    #[must_use]
    pub fn risk(&self) -> Arc<RiskManager<TimedGateway<G>>> {
        Arc::clone(self.orders.risk())
    }

    /// The order manager.
    #[must_use]
    pub fn orders(&self) -> Arc<OrderManager<TimedGateway<G>, L>> {
        Arc::clone(&self.orders)
    }

    /// The protection reconciler.
    #[must_use]
    pub fn protection(&self) -> Arc<ProtectionReconciler<TimedGateway<G>>> {
        Arc::clone(&self.protection)
    }

    /// The exit adjusters.
    #[must_use]
    pub fn exits(&self) -> Arc<ExitAdjusters<TimedGateway<G>, L>> {
        Arc::clone(&self.exits)
    }

    /// The position sync task body.
    #[must_use]
    pub fn position_sync(&self) -> Arc<PositionSync<TimedGateway<G>, L>> {
        Arc::clone(&self.sync)
    }
}
