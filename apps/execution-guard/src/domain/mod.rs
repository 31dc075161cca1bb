//! Domain Layer
//!
//! The innermost layer containing business logic with zero infrastructure dependencies.
//! This layer defines:
//!
//! - **Value Objects**: Immutable domain types with equality by value
//! - **Domain Services**: Stateless rules (sizing, gates, stop levels)
//!
//! # Bounded Contexts
//!
//! - [`order_execution`]: Order records and deterministic client ids
//! - [`portfolio`]: Positions, account snapshot, market clock
//! - [`market`]: Feature snapshots and regime readings
//! - [`risk_management`]: Pre-trade gates and bounded sizing
//! - [`stop_enforcement`]: Protection detection, repair levels, trailing and partial exits

pub mod market;
pub mod order_execution;
pub mod portfolio;
pub mod risk_management;
pub mod shared;
pub mod stop_enforcement;
