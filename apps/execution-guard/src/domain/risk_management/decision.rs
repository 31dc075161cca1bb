//! Risk decision and rejection reasons.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::order_execution::OrderSide;
use crate::domain::shared::Symbol;

/// Why a proposal was turned away.
///
/// Each variant maps to one gate, in evaluation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum RejectionReason {
    /// Quantity was zero or negative.
    InvalidQuantity,
    /// Trading disabled at runtime.
    TradingDisabled,
    /// Daily-loss circuit breaker is tripped.
    CircuitBreakerTripped {
        /// Trip detail.
        detail: String,
    },
    /// Account or clock could not be read.
    BrokerUnavailable {
        /// What failed.
        detail: String,
    },
    /// Regular session closed.
    MarketClosed,
    /// At the open-position cap.
    PositionLimit {
        /// Open positions.
        open: usize,
        /// Configured cap.
        max: usize,
    },
    /// Proposal opposes an existing position.
    SideConflict {
        /// Instrument.
        symbol: Symbol,
        /// Proposed side.
        side: OrderSide,
    },
    /// No price to value the order with.
    NoReferencePrice,
    /// Notional exceeds available buying power.
    InsufficientBuyingPower {
        /// Order notional.
        notional: Decimal,
        /// Available buying power.
        available: Decimal,
    },
    /// Notional exceeds the per-position equity cap.
    ExceedsEquityLimit {
        /// Order notional.
        notional: Decimal,
        /// Dollar limit.
        limit: Decimal,
    },
    /// No feature snapshot for the symbol.
    NoFeatureSnapshot,
    /// Trend strength below threshold.
    WeakTrend {
        /// Observed ADX.
        adx: f64,
        /// Threshold in force.
        min: f64,
    },
    /// Participation below threshold.
    LowParticipation {
        /// Observed volume ratio.
        volume_ratio: f64,
        /// Threshold in force.
        min: f64,
    },
    /// Risk budget buys less than one share.
    BelowOneShare,
    /// Advisory service vetoed a flagged trade.
    AdvisoryVeto {
        /// Advisor's reason.
        reason: String,
    },
}

impl RejectionReason {
    /// Stable code, used as a metrics label.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidQuantity => "invalid_quantity",
            Self::TradingDisabled => "trading_disabled",
            Self::CircuitBreakerTripped { .. } => "circuit_breaker",
            Self::BrokerUnavailable { .. } => "broker_unavailable",
            Self::MarketClosed => "market_closed",
            Self::PositionLimit { .. } => "position_limit",
            Self::SideConflict { .. } => "side_conflict",
            Self::NoReferencePrice => "no_reference_price",
            Self::InsufficientBuyingPower { .. } => "buying_power",
            Self::ExceedsEquityLimit { .. } => "equity_limit",
            Self::NoFeatureSnapshot => "no_feature_snapshot",
            Self::WeakTrend { .. } => "weak_trend",
            Self::LowParticipation { .. } => "low_participation",
            Self::BelowOneShare => "below_one_share",
            Self::AdvisoryVeto { .. } => "advisory_veto",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidQuantity => write!(f, "quantity must be positive"),
            Self::TradingDisabled => write!(f, "trading disabled"),
            Self::CircuitBreakerTripped { detail } => {
                write!(f, "circuit breaker tripped: {detail}")
            }
            Self::BrokerUnavailable { detail } => write!(f, "broker unavailable: {detail}"),
            Self::MarketClosed => write!(f, "market closed"),
            Self::PositionLimit { open, max } => {
                write!(f, "position limit reached ({open}/{max})")
            }
            Self::SideConflict { symbol, side } => {
                write!(f, "{side} conflicts with existing {symbol} position")
            }
            Self::NoReferencePrice => write!(f, "no reference price"),
            Self::InsufficientBuyingPower {
                notional,
                available,
            } => write!(
                f,
                "notional {notional} exceeds buying power {available}"
            ),
            Self::ExceedsEquityLimit { notional, limit } => {
                write!(f, "notional {notional} exceeds equity limit {limit}")
            }
            Self::NoFeatureSnapshot => write!(f, "no feature snapshot"),
            Self::WeakTrend { adx, min } => write!(f, "ADX {adx:.1} below {min:.1}"),
            Self::LowParticipation { volume_ratio, min } => {
                write!(f, "volume ratio {volume_ratio:.2} below {min:.2}")
            }
            Self::BelowOneShare => write!(f, "position size below one share"),
            Self::AdvisoryVeto { reason } => write!(f, "advisory veto: {reason}"),
        }
    }
}

/// Individual sizing multipliers before combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizingMultipliers {
    /// Confidence tier.
    pub confidence: Decimal,
    /// Regime safety.
    pub regime: Decimal,
    /// Sentiment.
    pub sentiment: Decimal,
    /// Trend alignment.
    pub trend: Decimal,
    /// Sector concentration.
    pub sector: Decimal,
}

impl SizingMultipliers {
    /// All components at 1.0.
    #[must_use]
    pub const fn neutral() -> Self {
        Self {
            confidence: Decimal::ONE,
            regime: Decimal::ONE,
            sentiment: Decimal::ONE,
            trend: Decimal::ONE,
            sector: Decimal::ONE,
        }
    }

    /// Unbounded product of all components.
    #[must_use]
    pub fn raw_product(&self) -> Decimal {
        self.confidence * self.regime * self.sentiment * self.trend * self.sector
    }
}

/// Sizing half of an approved decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizingDecision {
    /// Components.
    pub multipliers: SizingMultipliers,
    /// Product before the cap.
    pub raw_product: Decimal,
    /// Product after the cap.
    pub capped_product: Decimal,
    /// Product after the clamp; what sizing uses.
    pub effective_multiplier: Decimal,
    /// Dollars at risk.
    pub risk_budget: Decimal,
    /// Price the trade was valued at.
    pub reference_price: Decimal,
    /// Per-share distance to the stop.
    pub stop_distance: Decimal,
    /// Whole shares the budget buys.
    pub max_quantity: Decimal,
}

/// Outcome of a risk check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the order may proceed.
    pub approved: bool,
    /// Human-readable reason.
    pub reason: String,
    /// Structured rejection, when rejected.
    pub rejection: Option<RejectionReason>,
    /// Sizing, when approved.
    pub sizing: Option<SizingDecision>,
}

impl Decision {
    /// Approved decision carrying its sizing.
    #[must_use]
    pub fn approve(sizing: SizingDecision) -> Self {
        Self {
            approved: true,
            reason: "approved".to_string(),
            rejection: None,
            sizing: Some(sizing),
        }
    }

    /// Rejected decision.
    #[must_use]
    pub fn reject(reason: RejectionReason) -> Self {
        Self {
            approved: false,
            reason: reason.to_string(),
            rejection: Some(reason),
            sizing: None,
        }
    }

    /// Maximum quantity allowed, zero when rejected.
    #[must_use]
    pub fn max_quantity(&self) -> Decimal {
        self.sizing
            .as_ref()
            .map_or(Decimal::ZERO, |s| s.max_quantity)
    }
}
