//! Strongly-typed identifiers for orders.
//!
//! Keeps broker-assigned ids and our own client ids from being mixed up.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier from a string.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

define_id!(BrokerId, "Broker's unique identifier for an order.");
define_id!(
    ClientOrderId,
    "Client-assigned order identifier. Deterministic for entries, so the broker can reject replays."
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_order_id_new_and_display() {
        let id = ClientOrderId::new("eg-123");
        assert_eq!(id.as_str(), "eg-123");
        assert_eq!(format!("{id}"), "eg-123");
    }

    #[test]
    fn ids_from_strings() {
        let id: BrokerId = "b-1".into();
        assert_eq!(id.as_str(), "b-1");

        let id: ClientOrderId = String::from("c-1").into();
        assert_eq!(id.into_inner(), "c-1");
    }

    #[test]
    fn serde_is_transparent() {
        let id = BrokerId::new("abc");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc\"");

        let parsed: BrokerId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn hash_works_for_collections() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(ClientOrderId::new("a"));
        set.insert(ClientOrderId::new("b"));
        set.insert(ClientOrderId::new("a"));

        assert_eq!(set.len(), 2);
    }
}
