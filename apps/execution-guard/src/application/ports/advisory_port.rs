//! Advisory Port (Driven Port)
//!
//! Secondary veto for trades the deterministic rules flag as high risk.
//! Callers bound every call with a timeout and fall back to the
//! deterministic decision.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::order_execution::OrderSide;
use crate::domain::risk_management::HighRiskFlag;
use crate::domain::shared::Symbol;

use super::regime_port::ProviderError;

/// Trade put to the advisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryRequest {
    /// Instrument.
    pub symbol: Symbol,
    /// Side.
    pub side: OrderSide,
    /// Quantity.
    pub quantity: Decimal,
    /// Notional at the reference price.
    pub notional: Decimal,
    /// Why it was flagged.
    pub flags: Vec<HighRiskFlag>,
}

/// Advisor's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "lowercase")]
pub enum AdvisoryVerdict {
    /// Proceed.
    Approve,
    /// Block the trade.
    Veto {
        /// Advisor's reason.
        reason: String,
    },
}

/// Port for the advisory service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdvisoryPort: Send + Sync {
    /// Review a flagged trade.
    async fn review(&self, request: &AdvisoryRequest) -> Result<AdvisoryVerdict, ProviderError>;
}
