//! Broker Adapters
//!
//! Implementations of `OrderGateway`.

pub mod alpaca;
pub mod mock;

pub use alpaca::{AlpacaConfig, AlpacaEnvironment, AlpacaError, AlpacaGateway};
pub use mock::{MockGateway, default_account, default_clock};
