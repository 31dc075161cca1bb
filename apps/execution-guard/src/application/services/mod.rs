//! Application Services
//!
//! Long-lived services that sit between the domain rules and the brokerage:
//! risk gating, idempotent order placement, protection reconciliation and
//! the exit adjusters, plus the periodic supervision that drives them.

mod exit_adjusters;
mod order_manager;
mod profit_taker;
mod protection_reconciler;
mod regime_service;
mod risk_manager;
mod rollout;
mod supervisor;
mod timed_gateway;
mod trailing_stop_manager;

pub use exit_adjusters::{ExitAdjusters, ExitTickSummary};
pub use order_manager::{OrderConfig, OrderManager, SubmitOutcome};
pub use profit_taker::{ProfitAction, ProfitTaker, ProfitTakingConfig};
pub use protection_reconciler::{ProtectionConfig, ProtectionReconciler, ProtectionSummary};
pub use regime_service::RegimeService;
pub use risk_manager::{RiskConfig, RiskManager};
pub use rollout::ManagedSet;
pub use supervisor::{PositionSync, SyncReport, spawn_periodic};
pub use timed_gateway::{TimedGateway, with_timeout};
pub use trailing_stop_manager::{TrailingAction, TrailingConfig, TrailingStopManager};
