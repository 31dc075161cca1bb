//! Order type (market, limit, stop, trailing stop).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order type specifying execution behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Market order - execute at best available price.
    Market,
    /// Limit order - execute at specified price or better.
    Limit,
    /// Stop order - becomes market order when stop price is reached.
    Stop,
    /// Trailing stop - stop price follows the market by a fixed percent.
    TrailingStop,
}

impl OrderType {
    /// Returns true if this order type can act as stop-loss protection.
    #[must_use]
    pub const fn is_protective(&self) -> bool {
        matches!(self, Self::Stop | Self::TrailingStop)
    }

    /// Returns true if this order type closes a position on a price condition.
    ///
    /// Limit orders are included because take-profit legs are limits.
    #[must_use]
    pub const fn is_exit_type(&self) -> bool {
        matches!(self, Self::Stop | Self::TrailingStop | Self::Limit)
    }

    /// Lowercase broker vocabulary name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::Limit => "limit",
            Self::Stop => "stop",
            Self::TrailingStop => "trailing_stop",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_type_is_protective() {
        assert!(OrderType::Stop.is_protective());
        assert!(OrderType::TrailingStop.is_protective());
        assert!(!OrderType::Limit.is_protective());
        assert!(!OrderType::Market.is_protective());
    }

    #[test]
    fn order_type_is_exit_type() {
        assert!(OrderType::Limit.is_exit_type());
        assert!(!OrderType::Market.is_exit_type());
    }

    #[test]
    fn order_type_serde() {
        let json = serde_json::to_string(&OrderType::TrailingStop).unwrap();
        assert_eq!(json, "\"trailing_stop\"");
        assert_eq!(OrderType::TrailingStop.to_string(), "trailing_stop");
    }
}
