//! Settable regime and sentiment providers.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::application::ports::{ProviderError, RegimeProvider, SentimentProvider};
use crate::domain::market::{RegimeLabel, RegimeReading, SentimentReading};

/// Regime provider that reports whatever was last set.
#[derive(Debug)]
pub struct StaticRegimeProvider {
    reading: RwLock<(RegimeLabel, Decimal)>,
}

impl StaticRegimeProvider {
    /// Provider starting at `label` with `multiplier`.
    #[must_use]
    pub fn new(label: RegimeLabel, multiplier: Decimal) -> Self {
        Self {
            reading: RwLock::new((label, multiplier)),
        }
    }

    /// Change the reading.
    pub fn set(&self, label: RegimeLabel, multiplier: Decimal) {
        *self.reading.write() = (label, multiplier);
    }
}

impl Default for StaticRegimeProvider {
    fn default() -> Self {
        Self::new(RegimeLabel::Neutral, Decimal::ONE)
    }
}

#[async_trait]
impl RegimeProvider for StaticRegimeProvider {
    async fn current_regime(&self) -> Result<RegimeReading, ProviderError> {
        let (label, multiplier) = *self.reading.read();
        Ok(RegimeReading {
            label,
            multiplier,
            as_of: Utc::now(),
        })
    }
}

/// Sentiment provider that reports whatever was last set.
#[derive(Debug)]
pub struct StaticSentimentProvider {
    reading: RwLock<(String, Decimal)>,
}

impl StaticSentimentProvider {
    /// Provider starting at `label` with `multiplier`.
    #[must_use]
    pub fn new(label: impl Into<String>, multiplier: Decimal) -> Self {
        Self {
            reading: RwLock::new((label.into(), multiplier)),
        }
    }

    /// Change the reading.
    pub fn set(&self, label: impl Into<String>, multiplier: Decimal) {
        *self.reading.write() = (label.into(), multiplier);
    }
}

impl Default for StaticSentimentProvider {
    fn default() -> Self {
        Self::new("neutral", Decimal::ONE)
    }
}

#[async_trait]
impl SentimentProvider for StaticSentimentProvider {
    async fn current_sentiment(&self) -> Result<SentimentReading, ProviderError> {
        let (label, multiplier) = self.reading.read().clone();
        if multiplier < Decimal::ZERO {
            return Err(ProviderError::InvalidData {
                message: format!("negative sentiment multiplier {multiplier}"),
            });
        }
        Ok(SentimentReading {
            label,
            multiplier,
            as_of: Utc::now(),
        })
    }
}
