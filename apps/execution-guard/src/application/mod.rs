//! Application Layer
//!
//! Orchestrates the domain rules against the outside world:
//!
//! - **Ports**: brokerage, ledger and provider interfaces
//! - **State**: the single-writer trading state store
//! - **Services**: risk, orders, protection and exit adjusters

pub mod ports;
pub mod services;
pub mod state;

pub use ports::*;
pub use services::*;
pub use state::{StateUpdate, TradingSnapshot, TradingStateStore};
