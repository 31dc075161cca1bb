//! Shared wiring for the service-level integration tests.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use execution_guard::application::services::{
    OrderConfig, OrderManager, ProtectionConfig, ProtectionReconciler, RegimeService, RiskConfig,
    RiskManager,
};
use execution_guard::application::state::{StateUpdate, TradingStateStore};
use execution_guard::domain::market::{FeatureSnapshot, RegimeLabel, TrendDirection};
use execution_guard::domain::order_execution::{
    ClientOrderIdFactory, Order, OrderSide, OrderStatus, OrderType,
};
use execution_guard::domain::portfolio::{Position, PositionSide};
use execution_guard::domain::shared::{ClientOrderId, Symbol};
use execution_guard::infrastructure::broker::MockGateway;
use execution_guard::infrastructure::persistence::InMemoryOrderLedger;
use execution_guard::infrastructure::providers::{
    InMemoryFeatureStore, StaticRegimeProvider, StaticSentimentProvider,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Mock brokerage plus every in-process provider.
pub struct Harness {
    pub gateway: Arc<MockGateway>,
    pub ledger: Arc<InMemoryOrderLedger>,
    pub state: Arc<TradingStateStore>,
    pub features: Arc<InMemoryFeatureStore>,
    pub regime: Arc<StaticRegimeProvider>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            gateway: Arc::new(MockGateway::new()),
            ledger: Arc::new(InMemoryOrderLedger::new()),
            state: Arc::new(TradingStateStore::new()),
            features: Arc::new(InMemoryFeatureStore::new()),
            regime: Arc::new(StaticRegimeProvider::new(RegimeLabel::Neutral, Decimal::ONE)),
        }
    }

    /// Regime readings are re-read on every call.
    pub fn regime_service(&self) -> Arc<RegimeService> {
        Arc::new(RegimeService::new(
            self.regime.clone(),
            Arc::new(StaticSentimentProvider::default()),
            Duration::ZERO,
        ))
    }

    pub fn risk(&self, config: RiskConfig) -> Arc<RiskManager<MockGateway>> {
        Arc::new(RiskManager::new(
            config,
            Arc::clone(&self.gateway),
            Arc::clone(&self.state),
            self.features.clone(),
            self.regime_service(),
        ))
    }

    pub fn orders(&self) -> OrderManager<MockGateway, InMemoryOrderLedger> {
        OrderManager::new(
            OrderConfig::default(),
            Arc::clone(&self.gateway),
            Arc::clone(&self.ledger),
            Arc::clone(&self.state),
            self.risk(RiskConfig::default()),
            ids(),
        )
    }

    pub fn reconciler(&self) -> ProtectionReconciler<MockGateway> {
        ProtectionReconciler::new(
            ProtectionConfig {
                settle_delay: Duration::ZERO,
                ..ProtectionConfig::default()
            },
            Arc::clone(&self.gateway),
            Arc::clone(&self.state),
            self.features.clone(),
            ids(),
        )
    }

    pub fn publish(&self, symbol: &str, snapshot: FeatureSnapshot) {
        self.features
            .publish(Symbol::new(symbol), snapshot)
            .expect("snapshot is valid");
    }

    /// Seed local state with positions carrying their annotations.
    pub fn seed_positions(&self, positions: Vec<Position>) {
        self.state.apply(StateUpdate::PositionsSynced {
            positions,
            account: None,
        });
    }
}

pub fn ids() -> ClientOrderIdFactory {
    ClientOrderIdFactory::new("eg", dec!(0.05), 300)
}

/// Snapshot that clears every signal-quality gate.
pub fn features(atr: Option<Decimal>, confidence: f64) -> FeatureSnapshot {
    FeatureSnapshot {
        atr,
        adx: Some(25.0),
        volume_ratio: Some(1.2),
        confidence,
        trend_direction: TrendDirection::Flat,
        last_price: None,
        as_of: Utc::now(),
    }
}

pub fn long(symbol: &str, qty: Decimal, entry: Decimal, current: Decimal) -> Position {
    Position::new(Symbol::new(symbol), PositionSide::Long, qty, entry, current)
}

pub fn short(symbol: &str, qty: Decimal, entry: Decimal, current: Decimal) -> Position {
    Position::new(Symbol::new(symbol), PositionSide::Short, qty, entry, current)
}

/// A live buy-to-cover order protecting a short.
pub fn cover_order(
    client_order_id: &str,
    symbol: &str,
    order_type: OrderType,
    qty: Decimal,
    price: Decimal,
) -> Order {
    Order {
        side: OrderSide::Buy,
        ..exit_order(client_order_id, symbol, order_type, qty, price)
    }
}

/// A live closing-side order as the brokerage would list it.
pub fn exit_order(
    client_order_id: &str,
    symbol: &str,
    order_type: OrderType,
    qty: Decimal,
    price: Decimal,
) -> Order {
    let stop = matches!(order_type, OrderType::Stop | OrderType::TrailingStop);
    Order {
        client_order_id: ClientOrderId::new(client_order_id),
        broker_order_id: None,
        symbol: Symbol::new(symbol),
        side: OrderSide::Sell,
        order_type,
        status: OrderStatus::Accepted,
        quantity: qty,
        filled_qty: Decimal::ZERO,
        filled_avg_price: None,
        limit_price: (!stop).then_some(price),
        stop_price: stop.then_some(price),
        trail_percent: None,
        stop_loss: None,
        take_profit: None,
        submitted_at: Utc::now(),
        reason: String::new(),
    }
}
