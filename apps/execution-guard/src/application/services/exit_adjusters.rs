//! Exit Adjusters
//!
//! One pass over open positions runs the profit taker and then the trailing
//! stop manager against a single brokerage snapshot.

use std::sync::Arc;

use serde::Serialize;

use crate::application::ports::{BrokerError, FeatureProvider, OrderGateway, OrderLedger, OrderQuery};
use crate::application::state::TradingStateStore;
use crate::domain::shared::Symbol;

use super::profit_taker::{ProfitAction, ProfitTaker};
use super::trailing_stop_manager::{TrailingAction, TrailingStopManager};

/// Counts from one adjuster pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExitTickSummary {
    /// Positions looked at.
    pub evaluated: usize,
    /// Partial exits placed.
    pub partials: usize,
    /// Stops tightened.
    pub tightened: usize,
    /// Decisions logged in shadow mode.
    pub shadowed: usize,
    /// Actions that failed and will be retried.
    pub failed: usize,
}

/// Runs both exit adjusters.
pub struct ExitAdjusters<G: OrderGateway, L: OrderLedger> {
    gateway: Arc<G>,
    state: Arc<TradingStateStore>,
    features: Arc<dyn FeatureProvider>,
    trailing: TrailingStopManager<G>,
    profit: ProfitTaker<G, L>,
}

impl<G: OrderGateway, L: OrderLedger> std::fmt::Debug for ExitAdjusters<G, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExitAdjusters")
            .field("trailing", &self.trailing)
            .field("profit", &self.profit)
            .finish_non_exhaustive()
    }
}

impl<G: OrderGateway, L: OrderLedger> ExitAdjusters<G, L> {
    /// Combine the two adjusters.
    #[must_use]
    pub fn new(
        gateway: Arc<G>,
        state: Arc<TradingStateStore>,
        features: Arc<dyn FeatureProvider>,
        trailing: TrailingStopManager<G>,
        profit: ProfitTaker<G, L>,
    ) -> Self {
        Self {
            gateway,
            state,
            features,
            trailing,
            profit,
        }
    }

    /// Run one pass.
    ///
    /// # Errors
    ///
    /// Returns the brokerage error if positions or orders cannot be listed.
    pub async fn tick(&self) -> Result<ExitTickSummary, BrokerError> {
        let positions = self.gateway.get_positions().await?;
        let orders = self.gateway.get_orders(OrderQuery::open()).await?;
        let mut summary = ExitTickSummary::default();
        let local = self.state.snapshot();

        for mut position in positions.iter().cloned() {
            // Initial stop and partial flag live only in local state.
            if let Some(previous) = local.position(&position.symbol)
                && previous.side == position.side
            {
                position.inherit_annotations(previous);
            }
            let position = &position;
            summary.evaluated += 1;

            match self.profit.evaluate(position, &orders).await {
                ProfitAction::Taken { .. } => {
                    // The stop was just replaced; its id in `orders` is stale.
                    summary.partials += 1;
                    continue;
                }
                ProfitAction::Shadow { .. } => summary.shadowed += 1,
                ProfitAction::Failed { .. } => summary.failed += 1,
                ProfitAction::Unchanged | ProfitAction::AlreadyTaken => {}
            }

            let atr = match self.features.snapshot(&position.symbol).await {
                Ok(snapshot) => snapshot.and_then(|s| s.atr),
                Err(e) => {
                    tracing::debug!(symbol = %position.symbol, error = %e, "No ATR for trailing");
                    None
                }
            };
            match self.trailing.adjust(position, &orders, atr).await {
                TrailingAction::Tightened { .. } => summary.tightened += 1,
                TrailingAction::Shadow { .. } => summary.shadowed += 1,
                TrailingAction::Unchanged => {}
            }
        }

        let open: Vec<Symbol> = positions.iter().map(|p| p.symbol.clone()).collect();
        self.trailing.retain_open(&open);
        self.profit.retain_open(&open);

        tracing::debug!(
            evaluated = summary.evaluated,
            partials = summary.partials,
            tightened = summary.tightened,
            shadowed = summary.shadowed,
            failed = summary.failed,
            "Exit adjusters pass complete"
        );
        Ok(summary)
    }
}
