//! Alpaca Gateway Integration Tests
//!
//! Drives the REST adapter against a local `wiremock` server: decimal-string
//! decoding, bracket submission, nested leg flattening and error mapping.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use execution_guard::application::ports::{
    BracketLegs, BrokerError, OrderGateway, OrderQuery, ReplaceOrderRequest, SubmitOrderRequest,
};
use execution_guard::domain::order_execution::{OrderSide, OrderStatus, OrderType};
use execution_guard::domain::portfolio::{Position, PositionSide};
use execution_guard::domain::shared::{BrokerId, ClientOrderId, Symbol};
use execution_guard::domain::stop_enforcement::find_protection;
use execution_guard::infrastructure::broker::alpaca::{
    AlpacaConfig, AlpacaEnvironment, AlpacaGateway, RetryConfig,
};
use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn gateway(server: &MockServer) -> AlpacaGateway {
    let config = AlpacaConfig::new("key".into(), "secret".into(), AlpacaEnvironment::Paper)
        .with_base_url(server.uri())
        .with_retry(RetryConfig::none())
        .with_timeout(Duration::from_secs(2));
    AlpacaGateway::new(&config).unwrap()
}

fn order_json(id: &str, client_order_id: &str, order_type: &str, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "client_order_id": client_order_id,
        "symbol": "AAPL",
        "qty": "10",
        "filled_qty": "0",
        "filled_avg_price": null,
        "status": status,
        "side": "buy",
        "type": order_type,
        "limit_price": "50.00",
        "stop_price": null,
        "submitted_at": "2026-03-02T15:00:00Z"
    })
}

#[tokio::test]
async fn reads_account_from_decimal_strings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/account"))
        .and(header("APCA-API-KEY-ID", "key"))
        .and(header("APCA-API-SECRET-KEY", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "equity": "98500.25",
            "last_equity": "100000",
            "cash": "40000",
            "buying_power": "197000.50",
            "daytrading_buying_power": "394001",
            "pattern_day_trader": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let account = gateway(&server).await.get_account().await.unwrap();

    assert_eq!(account.equity, dec!(98500.25));
    assert_eq!(account.last_equity, dec!(100000));
    assert_eq!(account.buying_power, dec!(197000.50));
}

#[tokio::test]
async fn reads_long_and_short_positions() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/positions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "symbol": "AAPL",
                "qty": "100",
                "side": "long",
                "avg_entry_price": "50.10",
                "current_price": "51.00",
                "unrealized_pl": "90.00"
            },
            {
                "symbol": "TSLA",
                "qty": "-20",
                "side": "short",
                "avg_entry_price": "200",
                "current_price": "195",
                "unrealized_pl": "100"
            }
        ])))
        .mount(&server)
        .await;

    let positions = gateway(&server).await.get_positions().await.unwrap();

    assert_eq!(positions.len(), 2);
    assert_eq!(positions[0].side, PositionSide::Long);
    assert_eq!(positions[0].avg_entry_price, dec!(50.10));
    assert_eq!(positions[1].side, PositionSide::Short);
    assert_eq!(positions[1].quantity, dec!(20));
}

#[tokio::test]
async fn submits_bracket_with_client_order_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/orders"))
        .and(body_partial_json(json!({
            "client_order_id": "eg-en-abc",
            "symbol": "AAPL",
            "side": "buy",
            "type": "limit",
            "order_class": "bracket",
            "stop_loss": { "stop_price": "48" },
            "take_profit": { "limit_price": "54" }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(order_json("b-1", "eg-en-abc", "limit", "accepted")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let request = SubmitOrderRequest::limit(
        ClientOrderId::new("eg-en-abc"),
        Symbol::new("AAPL"),
        OrderSide::Buy,
        dec!(10),
        dec!(50),
    )
    .with_bracket(BracketLegs {
        stop_loss: dec!(48),
        take_profit: Some(dec!(54)),
    });
    let order = gateway(&server).await.submit_order(request).await.unwrap();

    assert_eq!(order.broker_order_id, Some(BrokerId::new("b-1")));
    assert_eq!(order.client_order_id, ClientOrderId::new("eg-en-abc"));
    assert_eq!(order.status, OrderStatus::Accepted);
}

#[tokio::test]
async fn unprocessable_submission_is_a_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/orders"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "code": 40010001,
            "message": "client_order_id must be unique"
        })))
        .mount(&server)
        .await;

    let request = SubmitOrderRequest::market(
        ClientOrderId::new("eg-en-abc"),
        Symbol::new("AAPL"),
        OrderSide::Buy,
        dec!(10),
    );
    let err = gateway(&server).await.submit_order(request).await.unwrap_err();

    assert!(matches!(err, BrokerError::OrderRejected { ref reason } if reason.contains("unique")));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn insufficient_buying_power_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/orders"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "code": 40310000,
            "message": "insufficient buying power"
        })))
        .mount(&server)
        .await;

    let request = SubmitOrderRequest::market(
        ClientOrderId::new("eg-en-abc"),
        Symbol::new("AAPL"),
        OrderSide::Buy,
        dec!(10),
    );
    let err = gateway(&server).await.submit_order(request).await.unwrap_err();

    assert!(matches!(err, BrokerError::InsufficientFunds { .. }));
}

#[tokio::test]
async fn cancel_of_missing_order_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v2/orders/gone-1"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": 40410000,
            "message": "order not found"
        })))
        .mount(&server)
        .await;

    let err = gateway(&server)
        .await
        .cancel_order(&BrokerId::new("gone-1"))
        .await
        .unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn cancel_accepts_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v2/orders/b-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    gateway(&server)
        .await
        .cancel_order(&BrokerId::new("b-1"))
        .await
        .unwrap();
}

#[tokio::test]
async fn replace_patches_stop_price() {
    let server = MockServer::start().await;
    let mut replaced = order_json("b-2", "eg-pr-stop", "stop", "accepted");
    replaced["side"] = json!("sell");
    replaced["limit_price"] = json!(null);
    replaced["stop_price"] = json!("49.00");
    Mock::given(method("PATCH"))
        .and(path("/v2/orders/b-1"))
        .and(body_partial_json(json!({ "stop_price": "49" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(replaced))
        .expect(1)
        .mount(&server)
        .await;

    let order = gateway(&server)
        .await
        .replace_order(&BrokerId::new("b-1"), ReplaceOrderRequest::stop_price(dec!(49)))
        .await
        .unwrap();

    assert_eq!(order.broker_order_id, Some(BrokerId::new("b-2")));
    assert_eq!(order.stop_price, Some(dec!(49.00)));
}

#[tokio::test]
async fn nested_bracket_legs_are_flattened() {
    let server = MockServer::start().await;
    let mut parent = order_json("b-1", "eg-en-abc", "limit", "filled");
    parent["filled_qty"] = json!("10");
    parent["filled_avg_price"] = json!("49.98");
    let mut stop = order_json("b-1-sl", "eg-en-abc-sl", "stop", "new");
    stop["side"] = json!("sell");
    stop["limit_price"] = json!(null);
    stop["stop_price"] = json!("48.00");
    let mut target = order_json("b-1-tp", "eg-en-abc-tp", "limit", "new");
    target["side"] = json!("sell");
    target["limit_price"] = json!("54.00");
    parent["legs"] = json!([stop, target]);

    Mock::given(method("GET"))
        .and(path("/v2/orders"))
        .and(query_param("status", "all"))
        .and(query_param("nested", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([parent])))
        .expect(1)
        .mount(&server)
        .await;

    let orders = gateway(&server).await.get_orders(OrderQuery::all()).await.unwrap();

    assert_eq!(orders.len(), 3);
    assert_eq!(orders[0].status, OrderStatus::Filled);
    assert_eq!(orders[0].stop_loss, Some(dec!(48.00)));
    assert_eq!(orders[0].take_profit, Some(dec!(54.00)));
    let stop = orders.iter().find(|o| o.order_type == OrderType::Stop).unwrap();
    assert_eq!(stop.side, OrderSide::Sell);
    assert!(stop.is_live());
}

#[tokio::test]
async fn open_query_drops_terminal_parents() {
    let server = MockServer::start().await;
    let mut parent = order_json("b-1", "eg-en-abc", "limit", "filled");
    let mut stop = order_json("b-1-sl", "eg-en-abc-sl", "stop", "held");
    stop["side"] = json!("sell");
    stop["stop_price"] = json!("48.00");
    parent["legs"] = json!([stop]);

    Mock::given(method("GET"))
        .and(path("/v2/orders"))
        .and(query_param("status", "open"))
        .and(query_param("nested", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([parent])))
        .mount(&server)
        .await;

    let orders = gateway(&server).await.get_orders(OrderQuery::open()).await.unwrap();

    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].broker_order_id, Some(BrokerId::new("b-1-sl")));
}

#[tokio::test]
async fn replaced_stop_is_not_protection() {
    let server = MockServer::start().await;
    let mut superseded = order_json("b-1", "eg-pr-stop", "stop", "replaced");
    superseded["side"] = json!("sell");
    superseded["limit_price"] = json!(null);
    superseded["stop_price"] = json!("48.00");

    Mock::given(method("GET"))
        .and(path("/v2/orders"))
        .and(query_param("status", "all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([superseded])))
        .mount(&server)
        .await;

    let orders = gateway(&server).await.get_orders(OrderQuery::all()).await.unwrap();
    let position = Position::new(
        Symbol::new("AAPL"),
        PositionSide::Long,
        dec!(10),
        dec!(50),
        dec!(50),
    );

    assert_eq!(orders[0].status, OrderStatus::Replaced);
    assert!(!orders[0].is_live());
    assert!(!find_protection(&position, &orders).has_stop);
}

#[tokio::test]
async fn server_errors_surface_as_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/clock"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = gateway(&server).await.get_clock().await.unwrap_err();

    assert!(err.is_transient());
}
