//! Order Ledger Port (Driven Port)
//!
//! Durable record of every order the guard has sent, keyed by client order
//! id. The ledger is the source of truth for idempotency; in-memory state
//! is a read-through copy.

use async_trait::async_trait;

use crate::domain::order_execution::{Order, OrderPatch};
use crate::domain::shared::ClientOrderId;

/// Ledger error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LedgerError {
    /// Insert of an id that already exists.
    #[error("Order already recorded: {client_order_id}")]
    Duplicate {
        /// The existing id.
        client_order_id: String,
    },

    /// Update of an unknown id.
    #[error("Order not in ledger: {client_order_id}")]
    NotFound {
        /// The missing id.
        client_order_id: String,
    },

    /// Storage failure.
    #[error("Ledger storage error: {message}")]
    Storage {
        /// Error details.
        message: String,
    },
}

/// Port for the order ledger.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Whether an order with this id was ever recorded.
    async fn order_exists(&self, client_order_id: &ClientOrderId) -> Result<bool, LedgerError>;

    /// Record a new order.
    async fn insert_order(&self, order: &Order) -> Result<(), LedgerError>;

    /// Patch a recorded order, returning the updated record.
    async fn update_order(
        &self,
        client_order_id: &ClientOrderId,
        patch: &OrderPatch,
    ) -> Result<Order, LedgerError>;

    /// Fetch a recorded order.
    async fn get_order(&self, client_order_id: &ClientOrderId)
    -> Result<Option<Order>, LedgerError>;

    /// All recorded orders in a non-terminal status.
    async fn list_open(&self) -> Result<Vec<Order>, LedgerError>;
}
