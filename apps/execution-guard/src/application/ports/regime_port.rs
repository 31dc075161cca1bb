//! Regime and Sentiment Provider Ports (Driven Ports)

use async_trait::async_trait;

use crate::domain::market::{RegimeReading, SentimentReading};

/// External provider error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// Provider unreachable.
    #[error("Provider unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },

    /// Provider returned data that failed validation.
    #[error("Invalid provider data: {message}")]
    InvalidData {
        /// Error details.
        message: String,
    },
}

/// Port for the market regime scorer.
#[async_trait]
pub trait RegimeProvider: Send + Sync {
    /// Current regime reading.
    async fn current_regime(&self) -> Result<RegimeReading, ProviderError>;
}

/// Port for the sentiment scorer.
#[async_trait]
pub trait SentimentProvider: Send + Sync {
    /// Current sentiment reading.
    async fn current_sentiment(&self) -> Result<SentimentReading, ProviderError>;
}
