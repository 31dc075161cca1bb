//! Trend-strength and participation gate.
//!
//! Thresholds relax in a choppy regime (ADX) and during the midday
//! liquidity lull (volume ratio).

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::domain::market::{FeatureSnapshot, RegimeLabel};

use super::decision::RejectionReason;

/// Signal quality thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalQualityPolicy {
    /// Minimum ADX.
    pub min_adx: f64,
    /// Minimum ADX in a choppy regime.
    pub choppy_min_adx: f64,
    /// Minimum volume ratio.
    pub min_volume_ratio: f64,
    /// Minimum volume ratio inside the midday window.
    pub midday_min_volume_ratio: f64,
    /// Midday window start, exchange-local.
    pub midday_start: NaiveTime,
    /// Midday window end, exchange-local.
    pub midday_end: NaiveTime,
}

impl Default for SignalQualityPolicy {
    fn default() -> Self {
        Self {
            min_adx: 20.0,
            choppy_min_adx: 15.0,
            min_volume_ratio: 1.0,
            midday_min_volume_ratio: 0.7,
            midday_start: NaiveTime::from_hms_opt(11, 30, 0).unwrap_or_default(),
            midday_end: NaiveTime::from_hms_opt(14, 0, 0).unwrap_or_default(),
        }
    }
}

impl SignalQualityPolicy {
    /// ADX threshold for a regime.
    #[must_use]
    pub const fn adx_threshold(&self, regime: RegimeLabel) -> f64 {
        if regime.is_choppy() {
            self.choppy_min_adx
        } else {
            self.min_adx
        }
    }

    /// Volume ratio threshold at an exchange-local time.
    #[must_use]
    pub fn volume_threshold(&self, local_time: Option<NaiveTime>) -> f64 {
        match local_time {
            Some(t) if t >= self.midday_start && t < self.midday_end => {
                self.midday_min_volume_ratio
            }
            _ => self.min_volume_ratio,
        }
    }

    /// Run the gate. Missing indicators skip their sub-check.
    ///
    /// # Errors
    ///
    /// Returns the rejection for the first failing sub-check.
    pub fn check(
        &self,
        snapshot: &FeatureSnapshot,
        regime: RegimeLabel,
        local_time: Option<NaiveTime>,
    ) -> Result<(), RejectionReason> {
        if let Some(adx) = snapshot.adx {
            let min = self.adx_threshold(regime);
            if adx < min {
                return Err(RejectionReason::WeakTrend { adx, min });
            }
        }
        if let Some(volume_ratio) = snapshot.volume_ratio {
            let min = self.volume_threshold(local_time);
            if volume_ratio < min {
                return Err(RejectionReason::LowParticipation { volume_ratio, min });
            }
        }
        Ok(())
    }
}
