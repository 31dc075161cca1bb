//! Risk Management Bounded Context
//!
//! Pure rules behind the pre-trade gates and position sizing.
//!
//! # Key Concepts
//!
//! - **Decision**: approve/reject with the full sizing breakdown
//! - **Sizing**: bounded product of confidence, regime, sentiment, trend and sector multipliers
//! - **Circuit breaker**: latching daily-loss stop, cleared only by manual reset
//! - **Signal quality**: ADX and volume thresholds adapted to regime and time of day

pub mod circuit_breaker;
pub mod decision;
pub mod high_risk;
pub mod signal_quality;
pub mod sizing;

pub use circuit_breaker::{DailyLossCircuitBreaker, TripRecord};
pub use decision::{Decision, RejectionReason, SizingDecision, SizingMultipliers};
pub use high_risk::{HighRiskFlag, HighRiskPolicy};
pub use signal_quality::SignalQualityPolicy;
pub use sizing::{ConfidenceTier, SizingPolicy, TrendMultipliers};
