// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Execution Guard
//!
//! The execution-safety layer between a trading decision and the brokerage.
//! Every proposed order is gated and sized, submitted exactly once, and the
//! resulting position is kept behind a live stop for as long as it is open.
//!
//! # Architecture (Clean Architecture + DDD + Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: Pure rules with no I/O
//!   - `order_execution`: Order records, deterministic client order ids
//!   - `portfolio`: Positions, account snapshot, market clock
//!   - `market`: Feature snapshots, regime and sentiment readings
//!   - `risk_management`: Gates, bounded sizing, daily-loss circuit breaker
//!   - `stop_enforcement`: Protection detection, repair levels, trailing and partial exits
//!
//! - **Application**: Orchestration against the ports
//!   - `ports`: `OrderGateway`, `OrderLedger` and the provider interfaces
//!   - `state`: Single-writer trading state store
//!   - `services`: `RiskManager`, `OrderManager`, `ProtectionReconciler`,
//!     `ExitAdjusters`, `PositionSync`
//!
//! - **Infrastructure**: Adapters
//!   - `broker`: Alpaca REST gateway and an in-process mock brokerage
//!   - `persistence`: In-memory order ledger
//!   - `providers`: Feature store, static regime and sentiment, disabled advisor
//!   - `config`: Dependency injection container
//!
//! # Loops
//!
//! | Loop | Default cadence | Work |
//! |------|-----------------|------|
//! | protection | 5s | Verify and repair stops for every open position |
//! | exits | 30s | Partial profit, then stop tightening |
//! | position sync | 60s | Positions, account, order statuses, circuit breaker |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Clean Architecture Layers
// =============================================================================

/// Domain layer - Pure trading rules with no external dependencies.
pub mod domain;

/// Application layer - Services, state and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and service wiring.
pub mod infrastructure;

// =============================================================================
// Cross-cutting
// =============================================================================

/// Configuration loading and validation.
pub mod config;

/// Crate-level error taxonomy.
pub mod error;

// =============================================================================
// Re-exports
// =============================================================================

// Domain re-exports
pub use domain::order_execution::{
    ClientOrderIdFactory, Order, OrderSide, OrderStatus, OrderType, TimeInForce,
};
pub use domain::portfolio::{AccountSnapshot, MarketClock, Position, PositionSide};
pub use domain::risk_management::{Decision, RejectionReason, SizingDecision};
pub use domain::shared::{BrokerId, ClientOrderId, Symbol};
pub use domain::stop_enforcement::{ProtectionRecord, ProtectionStatus};

// Application re-exports
pub use application::ports::{BrokerError, OrderGateway, OrderLedger};
pub use application::services::{
    ExitAdjusters, OrderManager, PositionSync, ProtectionReconciler, RegimeService, RiskManager,
    SubmitOutcome,
};
pub use application::state::TradingStateStore;

// Infrastructure re-exports
pub use infrastructure::broker::alpaca::{
    AlpacaConfig, AlpacaEnvironment, AlpacaError, AlpacaGateway,
};
pub use infrastructure::config::{Container, Providers};
pub use infrastructure::persistence::InMemoryOrderLedger;

pub use config::{Config, ConfigError, load_config};
pub use error::ExecutionError;
