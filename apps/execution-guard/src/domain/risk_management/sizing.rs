//! Volatility-based position sizing with a bounded multiplier.
//!
//! ```text
//! risk budget  = equity × base_risk_pct × clamp(min(Π multipliers, cap), lo, hi)
//! max quantity = floor(risk budget / stop distance)
//! stop distance = ATR × atr_multiplier   (price × fallback_stop_pct without ATR)
//! ```

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::domain::market::TrendAlignment;
use crate::domain::shared::DomainError;

use super::decision::{SizingDecision, SizingMultipliers};

/// A confidence threshold and the multiplier it earns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceTier {
    /// Minimum confidence (inclusive).
    pub min_confidence: f64,
    /// Multiplier for this tier.
    pub multiplier: Decimal,
}

/// Trend alignment multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendMultipliers {
    /// With the trend.
    pub aligned: Decimal,
    /// Against the trend.
    pub counter: Decimal,
    /// Flat trend.
    pub neutral: Decimal,
}

impl Default for TrendMultipliers {
    fn default() -> Self {
        Self {
            aligned: dec!(1.2),
            counter: dec!(0.6),
            neutral: Decimal::ONE,
        }
    }
}

/// Sizing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizingPolicy {
    /// Fraction of equity risked at multiplier 1.0.
    pub base_risk_pct: Decimal,
    /// Stop distance in ATRs.
    pub atr_stop_multiplier: Decimal,
    /// Stop distance as a fraction of price when ATR is missing.
    pub fallback_stop_pct: Decimal,
    /// Confidence tiers, highest threshold first.
    pub confidence_tiers: Vec<ConfidenceTier>,
    /// Multiplier below every tier.
    pub base_confidence_multiplier: Decimal,
    /// Trend alignment multipliers.
    pub trend: TrendMultipliers,
    /// Indexed by open positions already in the sector; last value repeats.
    pub sector_multipliers: Vec<Decimal>,
    /// Cap on the raw product.
    pub raw_cap: Decimal,
    /// Lower clamp.
    pub min_multiplier: Decimal,
    /// Upper clamp.
    pub max_multiplier: Decimal,
}

impl Default for SizingPolicy {
    fn default() -> Self {
        Self {
            base_risk_pct: dec!(0.01),
            atr_stop_multiplier: dec!(2.0),
            fallback_stop_pct: dec!(0.02),
            confidence_tiers: vec![
                ConfidenceTier {
                    min_confidence: 80.0,
                    multiplier: dec!(2.0),
                },
                ConfidenceTier {
                    min_confidence: 60.0,
                    multiplier: dec!(1.5),
                },
            ],
            base_confidence_multiplier: Decimal::ONE,
            trend: TrendMultipliers::default(),
            sector_multipliers: vec![Decimal::ONE, dec!(0.85), dec!(0.7)],
            raw_cap: dec!(2.5),
            min_multiplier: dec!(0.5),
            max_multiplier: dec!(1.5),
        }
    }
}

impl SizingPolicy {
    /// Multiplier for a confidence score.
    #[must_use]
    pub fn confidence_multiplier(&self, confidence: f64) -> Decimal {
        self.confidence_tiers
            .iter()
            .find(|tier| confidence >= tier.min_confidence)
            .map_or(self.base_confidence_multiplier, |tier| tier.multiplier)
    }

    /// Multiplier for trend alignment.
    #[must_use]
    pub const fn trend_multiplier(&self, alignment: TrendAlignment) -> Decimal {
        match alignment {
            TrendAlignment::Aligned => self.trend.aligned,
            TrendAlignment::Counter => self.trend.counter,
            TrendAlignment::Neutral => self.trend.neutral,
        }
    }

    /// Multiplier for sector concentration. `None` means unknown sector.
    #[must_use]
    pub fn sector_multiplier(&self, positions_in_sector: Option<usize>) -> Decimal {
        let Some(count) = positions_in_sector else {
            return Decimal::ONE;
        };
        self.sector_multipliers
            .get(count)
            .or_else(|| self.sector_multipliers.last())
            .copied()
            .unwrap_or(Decimal::ONE)
    }

    /// Raw, capped and clamped products.
    #[must_use]
    pub fn combine(&self, multipliers: &SizingMultipliers) -> (Decimal, Decimal, Decimal) {
        let raw = multipliers.raw_product();
        let capped = raw.min(self.raw_cap);
        let effective = capped.clamp(self.min_multiplier, self.max_multiplier);
        (raw, capped, effective)
    }

    /// Per-share stop distance.
    #[must_use]
    pub fn stop_distance(&self, atr: Option<Decimal>, reference_price: Decimal) -> Decimal {
        match atr {
            Some(atr) if atr > Decimal::ZERO => atr * self.atr_stop_multiplier,
            _ => reference_price * self.fallback_stop_pct,
        }
    }

    /// Size a trade.
    #[must_use]
    pub fn size(
        &self,
        equity: Decimal,
        multipliers: SizingMultipliers,
        atr: Option<Decimal>,
        reference_price: Decimal,
    ) -> SizingDecision {
        let (raw_product, capped_product, effective_multiplier) = self.combine(&multipliers);
        let risk_budget = equity * self.base_risk_pct * effective_multiplier;
        let stop_distance = self.stop_distance(atr, reference_price);
        let max_quantity = if stop_distance > Decimal::ZERO && risk_budget > Decimal::ZERO {
            (risk_budget / stop_distance).floor()
        } else {
            Decimal::ZERO
        };
        SizingDecision {
            multipliers,
            raw_product,
            capped_product,
            effective_multiplier,
            risk_budget,
            reference_price,
            stop_distance,
            max_quantity,
        }
    }

    /// Check internal consistency.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistent parameter.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.base_risk_pct <= Decimal::ZERO || self.base_risk_pct >= Decimal::ONE {
            return Err(DomainError::invalid("base_risk_pct", "must be in (0, 1)"));
        }
        if self.atr_stop_multiplier <= Decimal::ZERO {
            return Err(DomainError::invalid("atr_stop_multiplier", "must be positive"));
        }
        if self.fallback_stop_pct <= Decimal::ZERO || self.fallback_stop_pct >= Decimal::ONE {
            return Err(DomainError::invalid("fallback_stop_pct", "must be in (0, 1)"));
        }
        if self.min_multiplier <= Decimal::ZERO || self.min_multiplier > self.max_multiplier {
            return Err(DomainError::invalid(
                "min_multiplier",
                "must be positive and not above max_multiplier",
            ));
        }
        if self.raw_cap < self.max_multiplier {
            return Err(DomainError::invalid("raw_cap", "must be at least max_multiplier"));
        }
        if self
            .confidence_tiers
            .windows(2)
            .any(|w| w[0].min_confidence <= w[1].min_confidence)
        {
            return Err(DomainError::invalid(
                "confidence_tiers",
                "thresholds must be strictly descending",
            ));
        }
        if self.sector_multipliers.iter().any(|m| *m < Decimal::ZERO) {
            return Err(DomainError::invalid("sector_multipliers", "must be non-negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case(95.0, dec!(2.0) ; "high tier")]
    #[test_case(80.0, dec!(2.0) ; "high tier boundary")]
    #[test_case(79.9, dec!(1.5) ; "mid tier")]
    #[test_case(60.0, dec!(1.5) ; "mid tier boundary")]
    #[test_case(10.0, dec!(1.0) ; "base")]
    fn confidence_tiers(confidence: f64, expected: Decimal) {
        assert_eq!(SizingPolicy::default().confidence_multiplier(confidence), expected);
    }

    #[test]
    fn sector_multiplier_repeats_last_value() {
        let policy = SizingPolicy::default();
        assert_eq!(policy.sector_multiplier(None), Decimal::ONE);
        assert_eq!(policy.sector_multiplier(Some(0)), Decimal::ONE);
        assert_eq!(policy.sector_multiplier(Some(1)), dec!(0.85));
        assert_eq!(policy.sector_multiplier(Some(2)), dec!(0.7));
        assert_eq!(policy.sector_multiplier(Some(9)), dec!(0.7));
    }

    #[test]
    fn high_confidence_scenario_sizes_750_shares() {
        let policy = SizingPolicy::default();
        let multipliers = SizingMultipliers {
            confidence: policy.confidence_multiplier(90.0),
            ..SizingMultipliers::neutral()
        };
        let sizing = policy.size(dec!(100_000), multipliers, Some(dec!(1.00)), dec!(50));

        assert_eq!(sizing.raw_product, dec!(2.0));
        assert_eq!(dec!(100_000) * policy.base_risk_pct * sizing.raw_product, dec!(2000));
        assert_eq!(sizing.effective_multiplier, dec!(1.5));
        assert_eq!(sizing.risk_budget, dec!(1500));
        assert_eq!(sizing.stop_distance, dec!(2.00));
        assert_eq!(sizing.max_quantity, dec!(750));
    }

    #[test]
    fn raw_product_is_capped_before_clamp() {
        let policy = SizingPolicy::default();
        let multipliers = SizingMultipliers {
            confidence: dec!(2.0),
            trend: dec!(1.2),
            regime: dec!(1.5),
            ..SizingMultipliers::neutral()
        };
        let (raw, capped, effective) = policy.combine(&multipliers);
        assert_eq!(raw, dec!(3.6));
        assert_eq!(capped, dec!(2.5));
        assert_eq!(effective, dec!(1.5));
    }

    #[test]
    fn low_product_clamps_to_floor() {
        let policy = SizingPolicy::default();
        let multipliers = SizingMultipliers {
            trend: dec!(0.6),
            regime: dec!(0.3),
            ..SizingMultipliers::neutral()
        };
        let (_, _, effective) = policy.combine(&multipliers);
        assert_eq!(effective, dec!(0.5));
    }

    #[test]
    fn missing_atr_falls_back_to_price_pct() {
        let policy = SizingPolicy::default();
        assert_eq!(policy.stop_distance(None, dec!(50)), dec!(1.00));
        assert_eq!(policy.stop_distance(Some(Decimal::ZERO), dec!(50)), dec!(1.00));
    }

    #[test]
    fn tiny_budget_sizes_zero() {
        let policy = SizingPolicy::default();
        let sizing = policy.size(dec!(100), SizingMultipliers::neutral(), Some(dec!(5)), dec!(50));
        assert_eq!(sizing.max_quantity, Decimal::ZERO);
    }

    #[test]
    fn validate_rejects_unordered_tiers() {
        let mut policy = SizingPolicy::default();
        assert!(policy.validate().is_ok());
        policy.confidence_tiers.reverse();
        assert!(policy.validate().is_err());
    }

    fn multiplier() -> impl Strategy<Value = Decimal> {
        (0u32..=300).prop_map(|n| Decimal::new(i64::from(n), 2))
    }

    proptest! {
        #[test]
        fn effective_multiplier_is_bounded(
            confidence in 0.0f64..=100.0,
            regime in multiplier(),
            sentiment in multiplier(),
            trend_idx in 0usize..3,
            sector_count in proptest::option::of(0usize..6),
        ) {
            let policy = SizingPolicy::default();
            let trend = [TrendAlignment::Aligned, TrendAlignment::Counter, TrendAlignment::Neutral][trend_idx];
            let multipliers = SizingMultipliers {
                confidence: policy.confidence_multiplier(confidence),
                regime,
                sentiment,
                trend: policy.trend_multiplier(trend),
                sector: policy.sector_multiplier(sector_count),
            };
            let (_, capped, effective) = policy.combine(&multipliers);
            prop_assert!(capped <= dec!(2.5));
            prop_assert!(effective >= dec!(0.5));
            prop_assert!(effective <= dec!(1.5));
        }
    }
}
