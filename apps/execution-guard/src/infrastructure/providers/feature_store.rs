//! In-memory feature store.
//!
//! Snapshots are validated as they are published; an invalid snapshot is
//! refused and the previous one stays in place.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::application::ports::{FeatureProvider, ProviderError};
use crate::domain::market::FeatureSnapshot;
use crate::domain::shared::{DomainError, Symbol};

/// Latest feature snapshot per symbol.
#[derive(Debug, Default)]
pub struct InMemoryFeatureStore {
    snapshots: RwLock<HashMap<Symbol, FeatureSnapshot>>,
}

impl InMemoryFeatureStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and publish a snapshot.
    ///
    /// # Errors
    ///
    /// Returns the validation error; the store is left unchanged.
    pub fn publish(&self, symbol: Symbol, snapshot: FeatureSnapshot) -> Result<(), DomainError> {
        if let Err(e) = snapshot.validate() {
            tracing::warn!(symbol = %symbol, error = %e, "Rejected feature snapshot");
            return Err(e);
        }
        self.snapshots.write().insert(symbol, snapshot);
        Ok(())
    }

    /// Drop a symbol's snapshot.
    pub fn remove(&self, symbol: &Symbol) {
        self.snapshots.write().remove(symbol);
    }
}

#[async_trait]
impl FeatureProvider for InMemoryFeatureStore {
    async fn snapshot(&self, symbol: &Symbol) -> Result<Option<FeatureSnapshot>, ProviderError> {
        Ok(self.snapshots.read().get(symbol).cloned())
    }
}
