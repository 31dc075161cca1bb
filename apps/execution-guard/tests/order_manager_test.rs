//! Order Manager Integration Tests
//!
//! Exactly-once submission under repeats, concurrency and restarts, plus
//! the fill and cancel lifecycle.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Harness, features};
use execution_guard::application::ports::{BrokerError, OrderLedger};
use execution_guard::application::services::SubmitOutcome;
use execution_guard::domain::order_execution::{OrderSide, OrderStatus, OrderType};
use execution_guard::domain::shared::{ClientOrderId, Symbol};
use execution_guard::error::ExecutionError;
use execution_guard::infrastructure::persistence::InMemoryOrderLedger;
use rust_decimal_macros::dec;

fn aapl() -> Symbol {
    Symbol::new("AAPL")
}

fn ready() -> Harness {
    let harness = Harness::new();
    harness.publish("AAPL", features(Some(dec!(1.00)), 70.0));
    harness
}

// ============================================
// Idempotency
// ============================================

#[tokio::test]
async fn repeated_proposal_is_submitted_once() {
    let harness = ready();
    let orders = harness.orders();

    let first = orders
        .submit_order(&aapl(), OrderSide::Buy, dec!(10), Some(dec!(50)), "breakout")
        .await;
    let second = orders
        .submit_order(&aapl(), OrderSide::Buy, dec!(10), Some(dec!(50.01)), "breakout")
        .await;

    let SubmitOutcome::Submitted(original) = first else {
        panic!("expected submission, got {first:?}");
    };
    let SubmitOutcome::Duplicate(duplicate) = second else {
        panic!("expected duplicate, got {second:?}");
    };
    assert_eq!(duplicate.client_order_id, original.client_order_id);
    assert_eq!(harness.gateway.submissions().len(), 1);
    assert_eq!(harness.ledger.len(), 1);
}

#[tokio::test]
async fn concurrent_duplicates_reach_the_brokerage_once() {
    let harness = ready();
    harness.gateway.set_submit_delay(Duration::from_millis(50));
    let orders = Arc::new(harness.orders());

    let attempts = (0..5).map(|_| {
        let orders = Arc::clone(&orders);
        async move {
            orders
                .submit_order(&aapl(), OrderSide::Buy, dec!(10), Some(dec!(50)), "breakout")
                .await
        }
    });
    let outcomes = futures::future::join_all(attempts).await;

    let submitted = outcomes.iter().filter(|o| o.is_submitted()).count();
    let duplicates = outcomes
        .iter()
        .filter(|o| matches!(o, SubmitOutcome::Duplicate(_)))
        .count();
    assert_eq!(submitted, 1);
    assert_eq!(duplicates, 4);
    assert_eq!(harness.gateway.submissions().len(), 1);
}

#[tokio::test]
async fn different_quantity_is_a_different_order() {
    let harness = ready();
    let orders = harness.orders();

    let a = orders
        .submit_order(&aapl(), OrderSide::Buy, dec!(10), Some(dec!(50)), "breakout")
        .await;
    let b = orders
        .submit_order(&aapl(), OrderSide::Buy, dec!(12), Some(dec!(50)), "breakout")
        .await;

    assert!(a.is_submitted());
    assert!(b.is_submitted());
    assert_ne!(
        a.order().unwrap().client_order_id,
        b.order().unwrap().client_order_id
    );
}

#[tokio::test]
async fn restart_adopts_the_brokerage_copy() {
    let harness = ready();
    let first = harness
        .orders()
        .submit_order(&aapl(), OrderSide::Buy, dec!(10), Some(dec!(50)), "breakout")
        .await;
    assert!(first.is_submitted());

    // Same brokerage, empty ledger: the process restarted.
    let restarted = Harness {
        ledger: Arc::new(InMemoryOrderLedger::new()),
        ..harness
    };
    let again = restarted
        .orders()
        .submit_order(&aapl(), OrderSide::Buy, dec!(10), Some(dec!(50)), "breakout")
        .await;

    let SubmitOutcome::Duplicate(adopted) = again else {
        panic!("expected adopted duplicate, got {again:?}");
    };
    assert_eq!(adopted.client_order_id, first.order().unwrap().client_order_id);
    assert_eq!(restarted.gateway.submissions().len(), 1);
    assert!(
        restarted
            .ledger
            .order_exists(&adopted.client_order_id)
            .await
            .unwrap()
    );
}

// ============================================
// Submission
// ============================================

#[tokio::test]
async fn entry_carries_bracket_legs() {
    let harness = ready();
    let outcome = harness
        .orders()
        .submit_order(&aapl(), OrderSide::Buy, dec!(10), Some(dec!(50)), "breakout")
        .await;

    let order = outcome.order().unwrap();
    assert_eq!(order.stop_loss, Some(dec!(48)));
    assert_eq!(order.take_profit, Some(dec!(54)));
    assert_eq!(order.reason, "breakout");

    let live = harness.gateway.live_orders(&aapl());
    let stop = live.iter().find(|o| o.order_type == OrderType::Stop).unwrap();
    assert_eq!(stop.stop_price, Some(dec!(48)));
    assert_eq!(stop.status, OrderStatus::Held);
}

#[tokio::test]
async fn oversized_request_is_cut_to_max_quantity() {
    let harness = Harness::new();
    harness.publish("AAPL", features(Some(dec!(5.00)), 50.0));
    let outcome = harness
        .orders()
        .submit_order(&aapl(), OrderSide::Buy, dec!(150), Some(dec!(50)), "breakout")
        .await;

    // 1% of 100k over a $10 stop.
    assert_eq!(outcome.order().unwrap().quantity, dec!(100));
}

#[tokio::test]
async fn risk_rejection_never_reaches_the_brokerage() {
    let harness = Harness::new();
    let outcome = harness
        .orders()
        .submit_order(&aapl(), OrderSide::Buy, dec!(10), Some(dec!(50)), "breakout")
        .await;

    assert!(matches!(outcome, SubmitOutcome::Rejected { .. }));
    assert!(harness.gateway.submissions().is_empty());
    assert!(harness.ledger.is_empty());
}

#[tokio::test]
async fn transient_failure_allows_retry_in_window() {
    let harness = ready();
    harness
        .gateway
        .fail_next_submission(OrderType::Limit, BrokerError::RateLimited);
    let orders = harness.orders();

    let first = orders
        .submit_order(&aapl(), OrderSide::Buy, dec!(10), Some(dec!(50)), "breakout")
        .await;
    assert!(matches!(first, SubmitOutcome::Failed { transient: true, .. }));
    assert!(harness.ledger.is_empty());

    let retry = orders
        .submit_order(&aapl(), OrderSide::Buy, dec!(10), Some(dec!(50)), "breakout")
        .await;
    assert!(retry.is_submitted());
}

#[tokio::test]
async fn permanent_rejection_is_recorded() {
    let harness = ready();
    harness.gateway.fail_next_submission(
        OrderType::Limit,
        BrokerError::InsufficientFunds {
            message: "insufficient buying power".into(),
        },
    );
    let orders = harness.orders();

    let outcome = orders
        .submit_order(&aapl(), OrderSide::Buy, dec!(10), Some(dec!(50)), "breakout")
        .await;

    assert!(matches!(outcome, SubmitOutcome::Failed { transient: false, .. }));
    let recorded = harness.ledger.all();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].status, OrderStatus::Rejected);
    assert!(recorded[0].broker_order_id.is_none());
}

// ============================================
// Lifecycle
// ============================================

#[tokio::test]
async fn fill_opens_position_with_bracket_levels() {
    let harness = ready();
    let orders = harness.orders();
    let outcome = orders
        .submit_order(&aapl(), OrderSide::Buy, dec!(10), Some(dec!(50)), "breakout")
        .await;
    let id = outcome.order().unwrap().client_order_id.clone();

    harness
        .gateway
        .set_order_status(&id, OrderStatus::Filled, dec!(10), Some(dec!(49.98)));
    let changed = orders.sync_order_statuses().await.unwrap();

    assert_eq!(changed, 1);
    let position = harness.state.position(&aapl()).unwrap();
    assert_eq!(position.quantity, dec!(10));
    assert_eq!(position.avg_entry_price, dec!(49.98));
    assert_eq!(position.stop_loss, Some(dec!(48)));
    assert_eq!(position.initial_stop, Some(dec!(48)));

    let stored = harness.ledger.get_order(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Filled);
    assert_eq!(orders.sync_order_statuses().await.unwrap(), 0);
}

#[tokio::test]
async fn cancel_updates_ledger_and_brokerage() {
    let harness = ready();
    let orders = harness.orders();
    let outcome = orders
        .submit_order(&aapl(), OrderSide::Buy, dec!(10), Some(dec!(50)), "breakout")
        .await;
    let id = outcome.order().unwrap().client_order_id.clone();

    let canceled = orders.cancel_order(&id).await.unwrap();

    assert_eq!(canceled.status, OrderStatus::Canceled);
    assert_eq!(harness.gateway.cancels().len(), 1);
    assert!(harness.ledger.list_open().await.unwrap().is_empty());
}

#[tokio::test]
async fn cancel_of_unknown_order_is_rejected() {
    let harness = ready();
    let err = harness
        .orders()
        .cancel_order(&ClientOrderId::new("eg-en-missing"))
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutionError::Rejected { .. }));
    assert!(harness.gateway.cancels().is_empty());
}
