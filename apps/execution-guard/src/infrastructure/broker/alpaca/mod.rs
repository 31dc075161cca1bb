//! Alpaca Markets Gateway
//!
//! `OrderGateway` over Alpaca's trading REST API with:
//! - Bracket orders and nested leg listing
//! - Retry with jittered exponential backoff
//! - Paper/live environment selection

mod adapter;
mod api_types;
mod config;
mod error;
mod http_client;

pub use adapter::AlpacaGateway;
pub use config::{AlpacaConfig, AlpacaEnvironment, RetryConfig};
pub use error::AlpacaError;
