//! Gateway decorator that bounds every brokerage call with a timeout.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::application::ports::{
    BrokerError, OrderGateway, OrderQuery, ReplaceOrderRequest, SubmitOrderRequest,
};
use crate::domain::order_execution::Order;
use crate::domain::portfolio::{AccountSnapshot, MarketClock, Position};
use crate::domain::shared::BrokerId;

/// Run a brokerage call under `limit`, mapping expiry to a transient
/// [`BrokerError::Timeout`].
///
/// # Errors
///
/// Returns the call's own error, or `Timeout` if it did not finish in time.
pub async fn with_timeout<T, F>(
    operation: &'static str,
    limit: Duration,
    call: F,
) -> Result<T, BrokerError>
where
    F: Future<Output = Result<T, BrokerError>>,
{
    tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
        tracing::warn!(operation, timeout_ms = limit.as_millis(), "Broker call timed out");
        Err(BrokerError::Timeout {
            operation,
            after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        })
    })
}

/// Wraps a gateway so every call carries the same timeout.
#[derive(Debug)]
pub struct TimedGateway<G> {
    inner: G,
    limit: Duration,
}

impl<G> TimedGateway<G> {
    /// Wrap `inner`.
    #[must_use]
    pub const fn new(inner: G, limit: Duration) -> Self {
        Self { inner, limit }
    }

    /// The wrapped gateway.
    #[must_use]
    pub const fn inner(&self) -> &G {
        &self.inner
    }
}

#[async_trait]
impl<G: OrderGateway> OrderGateway for TimedGateway<G> {
    async fn get_account(&self) -> Result<AccountSnapshot, BrokerError> {
        with_timeout("get_account", self.limit, self.inner.get_account()).await
    }

    async fn get_positions(&self) -> Result<Vec<Position>, BrokerError> {
        with_timeout("get_positions", self.limit, self.inner.get_positions()).await
    }

    async fn get_orders(&self, query: OrderQuery) -> Result<Vec<Order>, BrokerError> {
        with_timeout("get_orders", self.limit, self.inner.get_orders(query)).await
    }

    async fn submit_order(&self, request: SubmitOrderRequest) -> Result<Order, BrokerError> {
        with_timeout("submit_order", self.limit, self.inner.submit_order(request)).await
    }

    async fn cancel_order(&self, broker_order_id: &BrokerId) -> Result<(), BrokerError> {
        with_timeout("cancel_order", self.limit, self.inner.cancel_order(broker_order_id)).await
    }

    async fn replace_order(
        &self,
        broker_order_id: &BrokerId,
        request: ReplaceOrderRequest,
    ) -> Result<Order, BrokerError> {
        with_timeout(
            "replace_order",
            self.limit,
            self.inner.replace_order(broker_order_id, request),
        )
        .await
    }

    async fn get_clock(&self) -> Result<MarketClock, BrokerError> {
        with_timeout("get_clock", self.limit, self.inner.get_clock()).await
    }
}
