//! Market regime and sentiment readings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Market regime label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimeLabel {
    /// Persistent uptrend.
    TrendingUp,
    /// Persistent downtrend.
    TrendingDown,
    /// No strong character.
    #[default]
    Neutral,
    /// Range-bound, whipsaw-prone.
    Choppy,
    /// Elevated volatility.
    HighVolatility,
}

impl RegimeLabel {
    /// Returns true for range-bound regimes where trend filters are relaxed.
    #[must_use]
    pub const fn is_choppy(&self) -> bool {
        matches!(self, Self::Choppy)
    }

    /// Snake-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TrendingUp => "trending_up",
            Self::TrendingDown => "trending_down",
            Self::Neutral => "neutral",
            Self::Choppy => "choppy",
            Self::HighVolatility => "high_volatility",
        }
    }
}

impl FromStr for RegimeLabel {
    type Err = std::convert::Infallible;

    /// Lenient parse: unknown labels read as neutral.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "trending_up" | "bull" | "bullish" => Self::TrendingUp,
            "trending_down" | "bear" | "bearish" => Self::TrendingDown,
            "choppy" | "range" | "ranging" => Self::Choppy,
            "high_volatility" | "volatile" => Self::HighVolatility,
            _ => Self::Neutral,
        })
    }
}

impl fmt::Display for RegimeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Regime provider output: a label plus the safety multiplier it implies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegimeReading {
    /// Regime label.
    pub label: RegimeLabel,
    /// Risk multiplier (1.0 = full size).
    pub multiplier: Decimal,
    /// When the reading was produced.
    pub as_of: DateTime<Utc>,
}

impl RegimeReading {
    /// Neutral reading used before any provider data is available.
    #[must_use]
    pub fn neutral() -> Self {
        Self {
            label: RegimeLabel::Neutral,
            multiplier: Decimal::ONE,
            as_of: Utc::now(),
        }
    }
}

/// Sentiment provider output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentReading {
    /// Free-form label ("fear", "neutral", "greed", ...).
    pub label: String,
    /// Risk multiplier (1.0 = neutral).
    pub multiplier: Decimal,
    /// When the reading was produced.
    pub as_of: DateTime<Utc>,
}

impl SentimentReading {
    /// Neutral reading used before any provider data is available.
    #[must_use]
    pub fn neutral() -> Self {
        Self {
            label: "neutral".to_string(),
            multiplier: Decimal::ONE,
            as_of: Utc::now(),
        }
    }
}
