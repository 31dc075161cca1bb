//! Provider Adapters
//!
//! In-process implementations of the feature, regime, sentiment and
//! advisory ports. External scorers push into these; the guard reads.

mod advisory;
mod feature_store;
mod static_regime;

pub use advisory::DisabledAdvisor;
pub use feature_store::InMemoryFeatureStore;
pub use static_regime::{StaticRegimeProvider, StaticSentimentProvider};
