//! Deterministic client order ids.
//!
//! An entry's id is a name-based UUID over its economic parameters, so the
//! same proposal inside the same decision window always maps to the same id.
//! The ledger and the broker both refuse a second order under one id.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::value_objects::OrderSide;
use crate::domain::shared::{ClientOrderId, Symbol};

/// Namespace for v5 client order ids. Changing it re-keys every ledger entry.
const CLIENT_ORDER_NAMESPACE: Uuid = Uuid::from_u128(0x8f0c_4a5e_2d71_4b3a_9e61_c0de_5afe_0001);

/// Builds client order ids.
#[derive(Debug, Clone)]
pub struct ClientOrderIdFactory {
    prefix: String,
    price_bucket: Decimal,
    decision_window_secs: i64,
}

impl ClientOrderIdFactory {
    /// Create a factory.
    ///
    /// `price_bucket` values of zero or less disable bucketing (exact price).
    /// A zero window folds every submission into one window.
    #[must_use]
    pub fn new(prefix: impl Into<String>, price_bucket: Decimal, decision_window_secs: u64) -> Self {
        Self {
            prefix: prefix.into(),
            price_bucket,
            decision_window_secs: i64::try_from(decision_window_secs).unwrap_or(i64::MAX),
        }
    }

    /// Deterministic id for an entry proposal.
    #[must_use]
    pub fn entry_id(
        &self,
        symbol: &Symbol,
        side: OrderSide,
        qty: Decimal,
        price: Option<Decimal>,
        at: DateTime<Utc>,
    ) -> ClientOrderId {
        let name = format!(
            "{}|{}|{}|{}|{}",
            symbol,
            side,
            qty.normalize(),
            self.price_bucket_key(price),
            self.window(at)
        );
        self.build("en", &name)
    }

    /// Deterministic id for the partial profit-take on one position.
    ///
    /// Keyed on the brokerage-reported average entry, which survives restarts
    /// and does not move when the position is reduced.
    #[must_use]
    pub fn partial_exit_id(
        &self,
        symbol: &Symbol,
        side: OrderSide,
        avg_entry_price: Decimal,
    ) -> ClientOrderId {
        let name = format!("{}|partial|{}|{}", symbol, side, avg_entry_price.normalize());
        self.build("pt", &name)
    }

    /// Fresh id for a protective order. Protection is re-derived from broker
    /// state every tick, so these ids do not need to be stable.
    #[must_use]
    pub fn protective_id(&self, kind: &str) -> ClientOrderId {
        ClientOrderId::new(format!("{}-{}-{}", self.prefix, kind, Uuid::new_v4().simple()))
    }

    fn build(&self, kind: &str, name: &str) -> ClientOrderId {
        let id = Uuid::new_v5(&CLIENT_ORDER_NAMESPACE, name.as_bytes());
        ClientOrderId::new(format!("{}-{}-{}", self.prefix, kind, id.simple()))
    }

    fn price_bucket_key(&self, price: Option<Decimal>) -> String {
        match price {
            None => "MKT".to_string(),
            Some(p) if self.price_bucket <= Decimal::ZERO => p.normalize().to_string(),
            Some(p) => (p / self.price_bucket).floor().to_string(),
        }
    }

    fn window(&self, at: DateTime<Utc>) -> i64 {
        if self.decision_window_secs <= 0 {
            return 0;
        }
        at.timestamp().div_euclid(self.decision_window_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn factory() -> ClientOrderIdFactory {
        ClientOrderIdFactory::new("eg", dec!(0.05), 300)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_760_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn same_parameters_same_window_same_id() {
        let f = factory();
        let a = f.entry_id(&Symbol::new("AAPL"), OrderSide::Buy, dec!(100), Some(dec!(50.01)), at(0));
        let b = f.entry_id(&Symbol::new("aapl"), OrderSide::Buy, dec!(100.0), Some(dec!(50.03)), at(10));
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("eg-en-"));
    }

    #[test]
    fn different_bucket_different_id() {
        let f = factory();
        let a = f.entry_id(&Symbol::new("AAPL"), OrderSide::Buy, dec!(100), Some(dec!(50.01)), at(0));
        let b = f.entry_id(&Symbol::new("AAPL"), OrderSide::Buy, dec!(100), Some(dec!(50.06)), at(0));
        assert_ne!(a, b);
    }

    #[test]
    fn different_side_or_qty_different_id() {
        let f = factory();
        let base = f.entry_id(&Symbol::new("AAPL"), OrderSide::Buy, dec!(100), None, at(0));
        let sell = f.entry_id(&Symbol::new("AAPL"), OrderSide::Sell, dec!(100), None, at(0));
        let more = f.entry_id(&Symbol::new("AAPL"), OrderSide::Buy, dec!(101), None, at(0));
        assert_ne!(base, sell);
        assert_ne!(base, more);
    }

    #[test]
    fn next_window_gets_new_id() {
        let f = factory();
        let a = f.entry_id(&Symbol::new("AAPL"), OrderSide::Buy, dec!(100), None, at(0));
        let b = f.entry_id(&Symbol::new("AAPL"), OrderSide::Buy, dec!(100), None, at(600));
        assert_ne!(a, b);
    }

    #[test]
    fn partial_exit_id_is_stable_per_position() {
        let f = factory();
        let aapl = Symbol::new("AAPL");
        assert_eq!(
            f.partial_exit_id(&aapl, OrderSide::Sell, dec!(50.10)),
            f.partial_exit_id(&aapl, OrderSide::Sell, dec!(50.1))
        );
        assert_ne!(
            f.partial_exit_id(&aapl, OrderSide::Sell, dec!(50.10)),
            f.partial_exit_id(&aapl, OrderSide::Sell, dec!(50.20))
        );
        assert!(f.partial_exit_id(&aapl, OrderSide::Sell, dec!(50)).as_str().starts_with("eg-pt-"));
    }

    #[test]
    fn protective_ids_are_unique() {
        let f = factory();
        assert_ne!(f.protective_id("stop"), f.protective_id("stop"));
    }
}
