//! Feature Provider Port (Driven Port)
//!
//! Per-symbol indicator snapshots computed outside the guard.

use async_trait::async_trait;

use crate::domain::market::FeatureSnapshot;
use crate::domain::shared::Symbol;

use super::regime_port::ProviderError;

/// Port for per-symbol feature snapshots.
#[async_trait]
pub trait FeatureProvider: Send + Sync {
    /// Latest snapshot for a symbol, `None` when the provider has none.
    async fn snapshot(&self, symbol: &Symbol) -> Result<Option<FeatureSnapshot>, ProviderError>;
}
