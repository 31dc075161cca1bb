//! Market Context
//!
//! Typed inputs from the feature, regime and sentiment providers.

pub mod feature_snapshot;
pub mod regime;

pub use feature_snapshot::{FeatureSnapshot, TrendAlignment, TrendDirection};
pub use regime::{RegimeLabel, RegimeReading, SentimentReading};
