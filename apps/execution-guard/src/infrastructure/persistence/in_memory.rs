//! In-memory order ledger.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::application::ports::{LedgerError, OrderLedger};
use crate::domain::order_execution::{Order, OrderPatch};
use crate::domain::shared::ClientOrderId;

/// In-memory implementation of [`OrderLedger`].
///
/// Suitable for tests and paper trading. Contents do not survive a restart.
#[derive(Debug, Default)]
pub struct InMemoryOrderLedger {
    orders: RwLock<HashMap<ClientOrderId, Order>>,
}

impl InMemoryOrderLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.read().len()
    }

    /// Whether the ledger is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.read().is_empty()
    }

    /// All recorded orders.
    #[must_use]
    pub fn all(&self) -> Vec<Order> {
        self.orders.read().values().cloned().collect()
    }
}

#[async_trait]
impl OrderLedger for InMemoryOrderLedger {
    async fn order_exists(&self, client_order_id: &ClientOrderId) -> Result<bool, LedgerError> {
        Ok(self.orders.read().contains_key(client_order_id))
    }

    async fn insert_order(&self, order: &Order) -> Result<(), LedgerError> {
        let mut orders = self.orders.write();
        if orders.contains_key(&order.client_order_id) {
            return Err(LedgerError::Duplicate {
                client_order_id: order.client_order_id.to_string(),
            });
        }
        orders.insert(order.client_order_id.clone(), order.clone());
        Ok(())
    }

    async fn update_order(
        &self,
        client_order_id: &ClientOrderId,
        patch: &OrderPatch,
    ) -> Result<Order, LedgerError> {
        let mut orders = self.orders.write();
        let order = orders
            .get_mut(client_order_id)
            .ok_or_else(|| LedgerError::NotFound {
                client_order_id: client_order_id.to_string(),
            })?;
        patch.apply_to(order);
        Ok(order.clone())
    }

    async fn get_order(
        &self,
        client_order_id: &ClientOrderId,
    ) -> Result<Option<Order>, LedgerError> {
        Ok(self.orders.read().get(client_order_id).cloned())
    }

    async fn list_open(&self) -> Result<Vec<Order>, LedgerError> {
        Ok(self
            .orders
            .read()
            .values()
            .filter(|o| !o.status.is_terminal())
            .cloned()
            .collect())
    }
}
