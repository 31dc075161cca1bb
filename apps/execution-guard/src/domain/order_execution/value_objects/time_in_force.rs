//! Time in force.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How long an order stays working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeInForce {
    /// Expires at the end of the session.
    #[default]
    Day,
    /// Good until canceled. Protective orders always use this.
    Gtc,
}

impl TimeInForce {
    /// Lowercase broker vocabulary name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Gtc => "gtc",
        }
    }
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
