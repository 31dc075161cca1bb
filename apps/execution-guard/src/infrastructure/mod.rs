//! Infrastructure Layer
//!
//! Adapters for the ports defined in the application layer:
//!
//! - `broker/`: Alpaca REST gateway and an in-process mock brokerage
//! - `persistence/`: Order ledger storage
//! - `providers/`: Feature, regime, sentiment and advisory providers
//! - `config/`: Dependency injection container

pub mod broker;
pub mod config;
pub mod persistence;
pub mod providers;
