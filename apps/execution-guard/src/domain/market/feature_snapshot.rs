//! Per-symbol feature snapshot.
//!
//! Indicators are computed elsewhere; this is the typed contract we consume.
//! Validation happens once, where snapshots enter the process.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::order_execution::OrderSide;
use crate::domain::shared::DomainError;

/// Direction of price relative to its moving baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    /// Price above baseline.
    Up,
    /// Price below baseline.
    Down,
    /// No clear trend.
    #[default]
    Flat,
}

/// How an order side relates to the trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendAlignment {
    /// Long in an uptrend or short in a downtrend.
    Aligned,
    /// Trading against the trend.
    Counter,
    /// Flat trend.
    Neutral,
}

impl TrendDirection {
    /// Alignment of an order side with this trend.
    #[must_use]
    pub const fn alignment(&self, side: OrderSide) -> TrendAlignment {
        match (self, side) {
            (Self::Flat, _) => TrendAlignment::Neutral,
            (Self::Up, OrderSide::Buy) | (Self::Down, OrderSide::Sell) => TrendAlignment::Aligned,
            _ => TrendAlignment::Counter,
        }
    }
}

const fn default_confidence() -> f64 {
    50.0
}

/// Indicator snapshot for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    /// Average true range, in price units.
    #[serde(default)]
    pub atr: Option<Decimal>,
    /// Average directional index (0-100).
    #[serde(default)]
    pub adx: Option<f64>,
    /// Current volume over average volume.
    #[serde(default)]
    pub volume_ratio: Option<f64>,
    /// Signal confidence (0-100).
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Trend direction.
    #[serde(default)]
    pub trend_direction: TrendDirection,
    /// Last trade price, if the feed provides it.
    #[serde(default)]
    pub last_price: Option<Decimal>,
    /// When the snapshot was computed.
    #[serde(default = "Utc::now")]
    pub as_of: DateTime<Utc>,
}

impl Default for FeatureSnapshot {
    fn default() -> Self {
        Self {
            atr: None,
            adx: None,
            volume_ratio: None,
            confidence: default_confidence(),
            trend_direction: TrendDirection::Flat,
            last_price: None,
            as_of: Utc::now(),
        }
    }
}

impl FeatureSnapshot {
    /// Check ranges at the ingestion boundary.
    ///
    /// # Errors
    ///
    /// Returns the first out-of-range field.
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(atr) = self.atr
            && atr < Decimal::ZERO
        {
            return Err(DomainError::invalid("atr", "must be non-negative"));
        }
        if let Some(adx) = self.adx
            && !(0.0..=100.0).contains(&adx)
        {
            return Err(DomainError::invalid("adx", "must be within 0-100"));
        }
        if let Some(ratio) = self.volume_ratio
            && !(ratio.is_finite() && ratio >= 0.0)
        {
            return Err(DomainError::invalid("volume_ratio", "must be non-negative"));
        }
        if !(0.0..=100.0).contains(&self.confidence) {
            return Err(DomainError::invalid("confidence", "must be within 0-100"));
        }
        if let Some(price) = self.last_price
            && price <= Decimal::ZERO
        {
            return Err(DomainError::invalid("last_price", "must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn trend_alignment() {
        assert_eq!(TrendDirection::Up.alignment(OrderSide::Buy), TrendAlignment::Aligned);
        assert_eq!(TrendDirection::Down.alignment(OrderSide::Sell), TrendAlignment::Aligned);
        assert_eq!(TrendDirection::Up.alignment(OrderSide::Sell), TrendAlignment::Counter);
        assert_eq!(TrendDirection::Flat.alignment(OrderSide::Buy), TrendAlignment::Neutral);
    }

    #[test]
    fn defaults_apply_when_fields_missing() {
        let snapshot: FeatureSnapshot = serde_json::from_str(r#"{"atr": "2.0"}"#).unwrap();
        assert_eq!(snapshot.atr, Some(dec!(2.0)));
        assert!(snapshot.adx.is_none());
        assert_eq!(snapshot.confidence, 50.0);
        assert_eq!(snapshot.trend_direction, TrendDirection::Flat);
    }

    #[test]
    fn validate_rejects_out_of_range() {
        let ok = FeatureSnapshot {
            atr: Some(dec!(1.5)),
            adx: Some(25.0),
            volume_ratio: Some(1.2),
            confidence: 90.0,
            ..FeatureSnapshot::default()
        };
        assert!(ok.validate().is_ok());

        let bad_adx = FeatureSnapshot {
            adx: Some(140.0),
            ..ok.clone()
        };
        assert!(bad_adx.validate().is_err());

        let bad_conf = FeatureSnapshot {
            confidence: -1.0,
            ..ok.clone()
        };
        assert!(bad_conf.validate().is_err());

        let bad_atr = FeatureSnapshot {
            atr: Some(dec!(-0.1)),
            ..ok
        };
        assert!(bad_atr.validate().is_err());
    }
}
