//! Alpaca gateway implementing `OrderGateway`.

use async_trait::async_trait;

use crate::application::ports::{
    BrokerError, OrderGateway, OrderQuery, OrderStatusFilter, ReplaceOrderRequest,
    SubmitOrderRequest,
};
use crate::domain::order_execution::Order;
use crate::domain::portfolio::{AccountSnapshot, MarketClock, Position};
use crate::domain::shared::BrokerId;

use super::api_types::{
    AlpacaAccountResponse, AlpacaClockResponse, AlpacaOrderRequest, AlpacaOrderResponse,
    AlpacaPositionResponse, AlpacaReplaceRequest,
};
use super::config::{AlpacaConfig, AlpacaEnvironment};
use super::error::AlpacaError;
use super::http_client::AlpacaHttpClient;

/// Most orders one listing call returns.
const ORDER_PAGE_LIMIT: u32 = 500;

/// Alpaca Markets order gateway.
#[derive(Debug, Clone)]
pub struct AlpacaGateway {
    client: AlpacaHttpClient,
    environment: AlpacaEnvironment,
}

impl AlpacaGateway {
    /// Create a new Alpaca gateway.
    pub fn new(config: &AlpacaConfig) -> Result<Self, AlpacaError> {
        let client = AlpacaHttpClient::new(config)?;
        tracing::info!(
            environment = %config.environment,
            base_url = config.trading_base_url(),
            "Alpaca gateway configured"
        );
        Ok(Self {
            client,
            environment: config.environment,
        })
    }

    /// Check if we're in live trading mode.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.environment.is_live()
    }

    fn orders_path(query: &OrderQuery) -> String {
        let status = match query.status {
            OrderStatusFilter::Open => "open",
            OrderStatusFilter::All => "all",
        };
        let mut path =
            format!("/v2/orders?status={status}&nested=true&limit={ORDER_PAGE_LIMIT}");
        if !query.symbols.is_empty() {
            let symbols: Vec<&str> = query.symbols.iter().map(|s| s.as_str()).collect();
            path.push_str("&symbols=");
            path.push_str(&symbols.join(","));
        }
        path
    }
}

#[async_trait]
impl OrderGateway for AlpacaGateway {
    async fn get_account(&self) -> Result<AccountSnapshot, BrokerError> {
        let account: AlpacaAccountResponse = self.client.get("/v2/account").await?;
        Ok(account.into())
    }

    async fn get_positions(&self) -> Result<Vec<Position>, BrokerError> {
        let positions: Vec<AlpacaPositionResponse> = self.client.get("/v2/positions").await?;
        Ok(positions.into_iter().map(Position::from).collect())
    }

    async fn get_orders(&self, query: OrderQuery) -> Result<Vec<Order>, BrokerError> {
        let response: Vec<AlpacaOrderResponse> =
            self.client.get(&Self::orders_path(&query)).await?;
        let open_only = query.status == OrderStatusFilter::Open;
        Ok(response
            .into_iter()
            .flat_map(AlpacaOrderResponse::flatten)
            .filter(|o| query.symbols.is_empty() || query.symbols.contains(&o.symbol))
            .filter(|o| !open_only || o.is_live())
            .collect())
    }

    async fn submit_order(&self, request: SubmitOrderRequest) -> Result<Order, BrokerError> {
        if self.is_live() {
            tracing::warn!(
                client_order_id = %request.client_order_id,
                symbol = %request.symbol,
                "Submitting LIVE order - this will execute real trades"
            );
        }

        let body = AlpacaOrderRequest::from(&request);
        tracing::info!(
            client_order_id = %request.client_order_id,
            symbol = %request.symbol,
            side = body.side,
            order_type = body.order_type,
            qty = %body.qty,
            order_class = ?body.order_class,
            "Submitting order to Alpaca"
        );

        let response: AlpacaOrderResponse = self.client.post("/v2/orders", &body).await?;
        let order = response.flatten().into_iter().next().ok_or_else(|| {
            BrokerError::Unknown {
                message: "empty order response".to_string(),
            }
        })?;

        tracing::info!(
            client_order_id = %order.client_order_id,
            broker_order_id = ?order.broker_order_id,
            status = %order.status,
            "Order accepted by Alpaca"
        );
        Ok(order)
    }

    async fn cancel_order(&self, broker_order_id: &BrokerId) -> Result<(), BrokerError> {
        tracing::info!(broker_order_id = %broker_order_id, "Canceling order");
        self.client
            .delete(&format!("/v2/orders/{}", broker_order_id.as_str()))
            .await
            .map_err(BrokerError::from)
    }

    async fn replace_order(
        &self,
        broker_order_id: &BrokerId,
        request: ReplaceOrderRequest,
    ) -> Result<Order, BrokerError> {
        tracing::info!(
            broker_order_id = %broker_order_id,
            stop_price = ?request.stop_price,
            qty = ?request.quantity,
            "Replacing order"
        );
        let response: AlpacaOrderResponse = self
            .client
            .patch(
                &format!("/v2/orders/{}", broker_order_id.as_str()),
                &AlpacaReplaceRequest::from(&request),
            )
            .await?;
        Ok(response.to_order())
    }

    async fn get_clock(&self) -> Result<MarketClock, BrokerError> {
        let clock: AlpacaClockResponse = self.client.get("/v2/clock").await?;
        Ok(clock.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shared::Symbol;

    #[test]
    fn orders_path_includes_nested_and_symbols() {
        let query = OrderQuery {
            status: OrderStatusFilter::All,
            symbols: vec![Symbol::new("aapl"), Symbol::new("MSFT")],
        };
        assert_eq!(
            AlpacaGateway::orders_path(&query),
            "/v2/orders?status=all&nested=true&limit=500&symbols=AAPL,MSFT"
        );
        assert_eq!(
            AlpacaGateway::orders_path(&OrderQuery::open()),
            "/v2/orders?status=open&nested=true&limit=500"
        );
    }

    #[test]
    fn missing_credentials_fail_fast() {
        let config = AlpacaConfig::new(String::new(), "s".into(), AlpacaEnvironment::Paper);
        assert!(matches!(
            AlpacaGateway::new(&config),
            Err(AlpacaError::AuthenticationFailed)
        ));
    }
}
