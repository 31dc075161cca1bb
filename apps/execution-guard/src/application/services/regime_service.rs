//! Regime and sentiment readings on a cache TTL.
//!
//! Readings are refreshed lazily on first use after the TTL expires. A
//! failed or timed-out refresh keeps the last good reading; with none, a
//! neutral reading (multiplier 1.0) stands in.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::time::Instant;

use crate::application::ports::{ProviderError, RegimeProvider, SentimentProvider};
use crate::domain::market::{RegimeReading, SentimentReading};

/// Upper bound on a single provider call.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug)]
struct Cached<T> {
    value: T,
    fetched_at: Instant,
}

/// Cached access to the regime and sentiment providers.
pub struct RegimeService {
    regime: Arc<dyn RegimeProvider>,
    sentiment: Arc<dyn SentimentProvider>,
    ttl: Duration,
    fetch_timeout: Duration,
    regime_cache: Mutex<Option<Cached<RegimeReading>>>,
    sentiment_cache: Mutex<Option<Cached<SentimentReading>>>,
}

impl std::fmt::Debug for RegimeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegimeService")
            .field("ttl", &self.ttl)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish_non_exhaustive()
    }
}

fn fresh<T: Clone>(slot: &Mutex<Option<Cached<T>>>, ttl: Duration) -> Option<T> {
    slot.lock()
        .as_ref()
        .filter(|c| c.fetched_at.elapsed() < ttl)
        .map(|c| c.value.clone())
}

fn last<T: Clone>(slot: &Mutex<Option<Cached<T>>>) -> Option<T> {
    slot.lock().as_ref().map(|c| c.value.clone())
}

async fn within<T>(
    limit: Duration,
    fetch: impl Future<Output = Result<T, ProviderError>>,
) -> Result<T, ProviderError> {
    tokio::time::timeout(limit, fetch)
        .await
        .unwrap_or_else(|_| {
            Err(ProviderError::Unavailable {
                message: format!("no reading within {}ms", limit.as_millis()),
            })
        })
}

fn store<T>(slot: &Mutex<Option<Cached<T>>>, value: T) {
    *slot.lock() = Some(Cached {
        value,
        fetched_at: Instant::now(),
    });
}

impl RegimeService {
    /// Create a service.
    #[must_use]
    pub fn new(
        regime: Arc<dyn RegimeProvider>,
        sentiment: Arc<dyn SentimentProvider>,
        ttl: Duration,
    ) -> Self {
        Self {
            regime,
            sentiment,
            ttl,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            regime_cache: Mutex::new(None),
            sentiment_cache: Mutex::new(None),
        }
    }

    /// Bound each provider call.
    #[must_use]
    pub const fn with_fetch_timeout(mut self, limit: Duration) -> Self {
        self.fetch_timeout = limit;
        self
    }

    /// Current regime reading.
    pub async fn regime(&self) -> RegimeReading {
        if let Some(reading) = fresh(&self.regime_cache, self.ttl) {
            return reading;
        }
        match within(self.fetch_timeout, self.regime.current_regime()).await {
            Ok(mut reading) => {
                reading.multiplier = reading.multiplier.max(Decimal::ZERO);
                tracing::debug!(
                    regime = %reading.label,
                    multiplier = %reading.multiplier,
                    "Regime refreshed"
                );
                store(&self.regime_cache, reading.clone());
                reading
            }
            Err(e) => {
                let fallback = last(&self.regime_cache);
                tracing::warn!(
                    error = %e,
                    using_last = fallback.is_some(),
                    "Regime refresh failed"
                );
                fallback.unwrap_or_else(RegimeReading::neutral)
            }
        }
    }

    /// Current sentiment reading.
    pub async fn sentiment(&self) -> SentimentReading {
        if let Some(reading) = fresh(&self.sentiment_cache, self.ttl) {
            return reading;
        }
        match within(self.fetch_timeout, self.sentiment.current_sentiment()).await {
            Ok(mut reading) => {
                reading.multiplier = reading.multiplier.max(Decimal::ZERO);
                tracing::debug!(
                    sentiment = %reading.label,
                    multiplier = %reading.multiplier,
                    "Sentiment refreshed"
                );
                store(&self.sentiment_cache, reading.clone());
                reading
            }
            Err(e) => {
                let fallback = last(&self.sentiment_cache);
                tracing::warn!(
                    error = %e,
                    using_last = fallback.is_some(),
                    "Sentiment refresh failed"
                );
                fallback.unwrap_or_else(SentimentReading::neutral)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::market::RegimeLabel;

    #[derive(Default)]
    struct CountingRegime {
        calls: AtomicUsize,
        failing: AtomicBool,
    }

    #[async_trait]
    impl RegimeProvider for CountingRegime {
        async fn current_regime(&self) -> Result<RegimeReading, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(ProviderError::Unavailable {
                    message: "down".into(),
                });
            }
            Ok(RegimeReading {
                label: RegimeLabel::Choppy,
                multiplier: dec!(0.8),
                as_of: Utc::now(),
            })
        }
    }

    struct NegativeSentiment;

    #[async_trait]
    impl SentimentProvider for NegativeSentiment {
        async fn current_sentiment(&self) -> Result<SentimentReading, ProviderError> {
            Ok(SentimentReading {
                label: "panic".into(),
                multiplier: dec!(-0.5),
                as_of: Utc::now(),
            })
        }
    }

    struct DownSentiment;

    #[async_trait]
    impl SentimentProvider for DownSentiment {
        async fn current_sentiment(&self) -> Result<SentimentReading, ProviderError> {
            Err(ProviderError::Unavailable {
                message: "down".into(),
            })
        }
    }

    #[derive(Default)]
    struct HangingRegime {
        hang: AtomicBool,
    }

    #[async_trait]
    impl RegimeProvider for HangingRegime {
        async fn current_regime(&self) -> Result<RegimeReading, ProviderError> {
            if self.hang.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok(RegimeReading {
                label: RegimeLabel::TrendingUp,
                multiplier: dec!(1.2),
                as_of: Utc::now(),
            })
        }
    }

    struct HangingSentiment;

    #[async_trait]
    impl SentimentProvider for HangingSentiment {
        async fn current_sentiment(&self) -> Result<SentimentReading, ProviderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(SentimentReading {
                label: "euphoric".into(),
                multiplier: dec!(1.5),
                as_of: Utc::now(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hung_provider_times_out_to_last_or_neutral() {
        let provider = Arc::new(HangingRegime::default());
        let service = RegimeService::new(
            provider.clone(),
            Arc::new(HangingSentiment),
            Duration::from_secs(60),
        )
        .with_fetch_timeout(Duration::from_millis(500));

        let started = Instant::now();
        let sentiment = service.sentiment().await;
        assert_eq!(sentiment.multiplier, Decimal::ONE);
        assert!(started.elapsed() < Duration::from_secs(1));

        assert_eq!(service.regime().await.label, RegimeLabel::TrendingUp);
        provider.hang.store(true, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(61)).await;

        let started = Instant::now();
        let reading = service.regime().await;
        assert_eq!(reading.label, RegimeLabel::TrendingUp);
        assert_eq!(reading.multiplier, dec!(1.2));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn regime_is_cached_until_ttl() {
        let provider = Arc::new(CountingRegime::default());
        let service = RegimeService::new(
            provider.clone(),
            Arc::new(NegativeSentiment),
            Duration::from_secs(3600),
        );

        assert_eq!(service.regime().await.label, RegimeLabel::Choppy);
        service.regime().await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(3601)).await;
        service.regime().await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_keeps_last_reading() {
        let provider = Arc::new(CountingRegime::default());
        let service = RegimeService::new(
            provider.clone(),
            Arc::new(NegativeSentiment),
            Duration::from_secs(60),
        );
        service.regime().await;

        provider.failing.store(true, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(61)).await;
        let reading = service.regime().await;
        assert_eq!(reading.label, RegimeLabel::Choppy);
        assert_eq!(reading.multiplier, dec!(0.8));
    }

    #[tokio::test]
    async fn no_reading_yet_falls_back_to_neutral() {
        let provider = Arc::new(CountingRegime::default());
        provider.failing.store(true, Ordering::SeqCst);
        let service =
            RegimeService::new(provider, Arc::new(DownSentiment), Duration::from_secs(60));

        let regime = service.regime().await;
        assert_eq!(regime.label, RegimeLabel::Neutral);
        assert_eq!(regime.multiplier, Decimal::ONE);
        assert_eq!(service.sentiment().await.multiplier, Decimal::ONE);
    }

    #[tokio::test]
    async fn negative_multiplier_is_clamped_to_zero() {
        let service = RegimeService::new(
            Arc::new(CountingRegime::default()),
            Arc::new(NegativeSentiment),
            Duration::from_secs(60),
        );
        assert_eq!(service.sentiment().await.multiplier, Decimal::ZERO);
    }
}
