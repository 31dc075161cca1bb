//! Crate-level error taxonomy.
//!
//! | Kind | Meaning | Handling |
//! |------|---------|----------|
//! | `Rejected` | A gate or the brokerage refused the request | Not retried for this proposal |
//! | `TransientBroker` | Network, timeout, rate limit | Retried next tick or by the caller |
//! | `StateDrift` | Local and brokerage state disagree | Re-derived from brokerage state |
//! | `FatalConfig` | Invalid configuration | Halts initialization |
//!
//! Gate and submission failures never escape the public API as errors; they
//! come back as outcomes. These errors cover the operations that do return
//! `Result`.

use thiserror::Error;

use crate::application::ports::{BrokerError, LedgerError};
use crate::config::ConfigError;

/// Execution guard error.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Refused; retrying the same request will not help.
    #[error("Rejected: {reason}")]
    Rejected {
        /// Why.
        reason: String,
    },

    /// Retryable brokerage failure.
    #[error("Transient broker error: {0}")]
    TransientBroker(BrokerError),

    /// Local state disagrees with the brokerage.
    #[error("State drift: {message}")]
    StateDrift {
        /// What disagrees.
        message: String,
    },

    /// Configuration is invalid.
    #[error("Fatal configuration error: {0}")]
    FatalConfig(String),

    /// Ledger failure.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl ExecutionError {
    /// Returns true if retrying later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientBroker(_) | Self::Ledger(_))
    }
}

impl From<BrokerError> for ExecutionError {
    fn from(err: BrokerError) -> Self {
        if err.is_transient() {
            Self::TransientBroker(err)
        } else if err.is_not_found() {
            Self::StateDrift {
                message: err.to_string(),
            }
        } else {
            Self::Rejected {
                reason: err.to_string(),
            }
        }
    }
}

impl From<ConfigError> for ExecutionError {
    fn from(err: ConfigError) -> Self {
        Self::FatalConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_errors_are_classified() {
        assert!(matches!(
            ExecutionError::from(BrokerError::RateLimited),
            ExecutionError::TransientBroker(_)
        ));
        assert!(matches!(
            ExecutionError::from(BrokerError::OrderRejected {
                reason: "qty".into()
            }),
            ExecutionError::Rejected { .. }
        ));
        assert!(matches!(
            ExecutionError::from(BrokerError::OrderNotFound {
                order_id: "x".into()
            }),
            ExecutionError::StateDrift { .. }
        ));
    }

    #[test]
    fn config_errors_are_fatal() {
        let err = ExecutionError::from(ConfigError::ValidationError("bad".into()));
        assert!(matches!(err, ExecutionError::FatalConfig(_)));
        assert!(!err.is_retryable());
    }
}
