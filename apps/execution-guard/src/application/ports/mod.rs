//! Application Ports (Driven)
//!
//! Ports define interfaces for interacting with external systems: the
//! brokerage, the order ledger, and the feature, regime, sentiment and
//! advisory providers.

mod advisory_port;
mod broker_port;
mod feature_port;
mod order_ledger_port;
mod regime_port;

#[cfg(test)]
pub use advisory_port::MockAdvisoryPort;
pub use advisory_port::{AdvisoryPort, AdvisoryRequest, AdvisoryVerdict};
pub use broker_port::{
    BracketLegs, BrokerError, OrderGateway, OrderQuery, OrderStatusFilter, ReplaceOrderRequest,
    SubmitOrderRequest,
};
pub use feature_port::FeatureProvider;
pub use order_ledger_port::{LedgerError, OrderLedger};
pub use regime_port::{ProviderError, RegimeProvider, SentimentProvider};
