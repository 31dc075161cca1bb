//! Order status in the broker lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order status as reported by the brokerage.
///
/// `Held` covers bracket legs the broker parks until the parent fills. They
/// are not live in the market yet but they still own the protective role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order received by the broker, not yet routed.
    New,
    /// Order accepted by the broker.
    Accepted,
    /// Order routed, awaiting venue acknowledgment.
    PendingNew,
    /// Bracket leg held by the broker until its parent fills.
    Held,
    /// Order partially filled.
    PartiallyFilled,
    /// Order completely filled.
    Filled,
    /// Order canceled.
    Canceled,
    /// Order superseded by a replacement with a new broker id.
    Replaced,
    /// Order rejected by broker.
    Rejected,
    /// Order expired (e.g., Day order at market close).
    Expired,
}

impl OrderStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 10] = [
        Self::New,
        Self::Accepted,
        Self::PendingNew,
        Self::Held,
        Self::PartiallyFilled,
        Self::Filled,
        Self::Canceled,
        Self::Replaced,
        Self::Rejected,
        Self::Expired,
    ];

    /// Returns true if the order is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Canceled | Self::Replaced | Self::Rejected | Self::Expired
        )
    }

    /// Returns true if the order still stands at the broker.
    ///
    /// This is the set a protective order must be in to count as protection.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(
            self,
            Self::New | Self::Accepted | Self::PendingNew | Self::Held | Self::PartiallyFilled
        )
    }

    /// Lowercase broker vocabulary name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Accepted => "accepted",
            Self::PendingNew => "pending_new",
            Self::Held => "held",
            Self::PartiallyFilled => "partially_filled",
            Self::Filled => "filled",
            Self::Canceled => "canceled",
            Self::Replaced => "replaced",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_is_terminal() {
        assert!(!OrderStatus::New.is_terminal());
        assert!(!OrderStatus::Held.is_terminal());
        assert!(!OrderStatus::PartiallyFilled.is_terminal());
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(OrderStatus::Replaced.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(OrderStatus::Expired.is_terminal());
    }

    #[test]
    fn held_counts_as_live() {
        assert!(OrderStatus::Held.is_live());
        assert!(OrderStatus::PendingNew.is_live());
        assert!(!OrderStatus::Filled.is_live());
    }

    #[test]
    fn live_and_terminal_partition_all_statuses() {
        for status in OrderStatus::ALL {
            assert_ne!(status.is_live(), status.is_terminal(), "{status}");
        }
    }

    #[test]
    fn order_status_serde_uses_broker_names() {
        let json = serde_json::to_string(&OrderStatus::PartiallyFilled).unwrap();
        assert_eq!(json, "\"partially_filled\"");

        let parsed: OrderStatus = serde_json::from_str("\"held\"").unwrap();
        assert_eq!(parsed, OrderStatus::Held);
    }
}
