//! Risk Manager Service
//!
//! Gates and sizes every proposed entry. Gates run in a fixed order and the
//! first failure wins:
//!
//! 1. Trading enabled
//! 2. Daily-loss circuit breaker
//! 3. Market open
//! 4. Position count
//! 5. Side conflict
//! 6. Capital (buying power, per-position equity cap)
//! 7. Signal quality (ADX, volume ratio)
//!
//! Approved proposals are sized from the risk budget. Trades flagged high
//! risk are put to the advisory port under a timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::application::ports::{
    AdvisoryPort, AdvisoryRequest, AdvisoryVerdict, FeatureProvider, OrderGateway,
};
use crate::application::state::TradingStateStore;
use crate::domain::market::FeatureSnapshot;
use crate::domain::order_execution::OrderSide;
use crate::domain::portfolio::{AccountSnapshot, Position, PositionSide};
use crate::domain::risk_management::{
    DailyLossCircuitBreaker, Decision, HighRiskPolicy, RejectionReason, SignalQualityPolicy,
    SizingMultipliers, SizingPolicy, TripRecord,
};
use crate::domain::shared::Symbol;

use super::regime_service::RegimeService;

/// Risk manager configuration.
#[derive(Debug, Clone)]
pub struct RiskConfig {
    /// Initial value of the runtime trading switch.
    pub trading_enabled: bool,
    /// Reject proposals while the regular session is closed.
    pub require_market_open: bool,
    /// Maximum concurrently open positions.
    pub max_positions: usize,
    /// Largest notional per position as a fraction of equity.
    pub max_position_equity_pct: Decimal,
    /// Daily loss fraction that trips the breaker.
    pub daily_loss_limit_pct: Decimal,
    /// Position sizing.
    pub sizing: SizingPolicy,
    /// ADX and volume thresholds.
    pub signal_quality: SignalQualityPolicy,
    /// What counts as a high-risk trade.
    pub high_risk: HighRiskPolicy,
    /// Bound on one advisory call.
    pub advisory_timeout: Duration,
    /// Symbol to sector map for concentration sizing.
    pub sectors: HashMap<Symbol, String>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            trading_enabled: true,
            require_market_open: true,
            max_positions: 10,
            max_position_equity_pct: dec!(0.10),
            daily_loss_limit_pct: dec!(0.03),
            sizing: SizingPolicy::default(),
            signal_quality: SignalQualityPolicy::default(),
            high_risk: HighRiskPolicy::default(),
            advisory_timeout: Duration::from_secs(3),
            sectors: HashMap::new(),
        }
    }
}

/// Pre-trade risk gate and sizer.
pub struct RiskManager<G: OrderGateway> {
    config: RiskConfig,
    gateway: Arc<G>,
    state: Arc<TradingStateStore>,
    features: Arc<dyn FeatureProvider>,
    regime: Arc<RegimeService>,
    advisor: Option<Arc<dyn AdvisoryPort>>,
    breaker: DailyLossCircuitBreaker,
    trading_enabled: AtomicBool,
}

impl<G: OrderGateway> std::fmt::Debug for RiskManager<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskManager")
            .field("config", &self.config)
            .field("breaker", &self.breaker)
            .field("trading_enabled", &self.trading_enabled)
            .finish_non_exhaustive()
    }
}

impl<G: OrderGateway> RiskManager<G> {
    /// Create a risk manager.
    #[must_use]
    pub fn new(
        config: RiskConfig,
        gateway: Arc<G>,
        state: Arc<TradingStateStore>,
        features: Arc<dyn FeatureProvider>,
        regime: Arc<RegimeService>,
    ) -> Self {
        let breaker = DailyLossCircuitBreaker::new(config.daily_loss_limit_pct);
        let trading_enabled = AtomicBool::new(config.trading_enabled);
        Self {
            config,
            gateway,
            state,
            features,
            regime,
            advisor: None,
            breaker,
            trading_enabled,
        }
    }

    /// Attach an advisory service for high-risk trades.
    #[must_use]
    pub fn with_advisor(mut self, advisor: Arc<dyn AdvisoryPort>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    /// Configuration.
    #[must_use]
    pub const fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Turn trading on or off at runtime.
    pub fn set_trading_enabled(&self, enabled: bool) {
        let was = self.trading_enabled.swap(enabled, Ordering::SeqCst);
        if was != enabled {
            tracing::warn!(enabled, "Trading switch changed");
        }
    }

    /// Whether trading is on.
    #[must_use]
    pub fn is_trading_enabled(&self) -> bool {
        self.trading_enabled.load(Ordering::SeqCst)
    }

    /// Feed an account snapshot to the breaker. Returns true if tripped.
    pub fn evaluate_circuit_breaker(&self, account: &AccountSnapshot) -> bool {
        self.breaker.evaluate(account)
    }

    /// Whether the breaker is tripped.
    #[must_use]
    pub fn is_circuit_breaker_tripped(&self) -> bool {
        self.breaker.is_tripped()
    }

    /// Trip details, if tripped.
    #[must_use]
    pub fn circuit_breaker_trip(&self) -> Option<TripRecord> {
        self.breaker.trip_record()
    }

    /// Manually re-arm the breaker.
    pub fn reset_circuit_breaker(&self) {
        self.breaker.reset();
    }

    /// Gate and size a proposed entry.
    ///
    /// Never fails: every problem becomes a rejected [`Decision`] carrying a
    /// human-readable reason. Rejections leave state untouched.
    pub async fn check_order(
        &self,
        symbol: &Symbol,
        side: OrderSide,
        qty: Decimal,
        price: Option<Decimal>,
    ) -> Decision {
        let decision = match self.evaluate(symbol, side, qty, price).await {
            Ok(decision) => decision,
            Err(reason) => Decision::reject(reason),
        };
        self.log_decision(symbol, side, qty, &decision);
        decision
    }

    async fn evaluate(
        &self,
        symbol: &Symbol,
        side: OrderSide,
        qty: Decimal,
        price: Option<Decimal>,
    ) -> Result<Decision, RejectionReason> {
        if qty <= Decimal::ZERO {
            return Err(RejectionReason::InvalidQuantity);
        }
        if !self.is_trading_enabled() {
            return Err(RejectionReason::TradingDisabled);
        }

        let account = self.account_checked_against_breaker().await?;
        let local_time = self.market_time().await?;

        let snapshot = self.state.snapshot();
        let existing = snapshot.position(symbol);
        let open = snapshot.positions.len();
        if existing.is_none() && open >= self.config.max_positions {
            return Err(RejectionReason::PositionLimit {
                open,
                max: self.config.max_positions,
            });
        }
        if let Some(position) = existing
            && position.side != PositionSide::from(side)
        {
            return Err(RejectionReason::SideConflict {
                symbol: symbol.clone(),
                side,
            });
        }

        let features = self.feature_snapshot(symbol).await;
        let reference_price = price
            .or_else(|| features.as_ref().and_then(|f| f.last_price))
            .or_else(|| existing.map(|p| p.current_price))
            .filter(|p| *p > Decimal::ZERO)
            .ok_or(RejectionReason::NoReferencePrice)?;

        let notional = qty * reference_price;
        let available = account.available_buying_power();
        if notional > available {
            return Err(RejectionReason::InsufficientBuyingPower {
                notional,
                available,
            });
        }
        let limit = account.equity * self.config.max_position_equity_pct;
        if notional > limit {
            return Err(RejectionReason::ExceedsEquityLimit { notional, limit });
        }

        let features = features.ok_or(RejectionReason::NoFeatureSnapshot)?;
        let regime = self.regime.regime().await;
        self.config
            .signal_quality
            .check(&features, regime.label, local_time)?;

        let sentiment = self.regime.sentiment().await;
        let alignment = features.trend_direction.alignment(side);
        let multipliers = SizingMultipliers {
            confidence: self.config.sizing.confidence_multiplier(features.confidence),
            regime: regime.multiplier,
            sentiment: sentiment.multiplier,
            trend: self.config.sizing.trend_multiplier(alignment),
            sector: self
                .config
                .sizing
                .sector_multiplier(self.sector_count(symbol, &snapshot.positions)),
        };
        let sizing =
            self.config
                .sizing
                .size(account.equity, multipliers, features.atr, reference_price);
        if sizing.max_quantity <= Decimal::ZERO {
            return Err(RejectionReason::BelowOneShare);
        }

        let flags = self.config.high_risk.flags(
            snapshot.in_cooldown(symbol, Utc::now()),
            notional,
            account.equity,
            alignment,
        );
        if !flags.is_empty()
            && let Some(advisor) = &self.advisor
        {
            let request = AdvisoryRequest {
                symbol: symbol.clone(),
                side,
                quantity: qty.min(sizing.max_quantity),
                notional,
                flags,
            };
            self.consult(advisor.as_ref(), &request).await?;
        }

        Ok(Decision::approve(sizing))
    }

    async fn account_checked_against_breaker(&self) -> Result<AccountSnapshot, RejectionReason> {
        if let Some(record) = self.breaker.trip_record() {
            return Err(RejectionReason::CircuitBreakerTripped {
                detail: record.to_string(),
            });
        }
        let account = self.gateway.get_account().await.map_err(|e| {
            RejectionReason::BrokerUnavailable {
                detail: format!("account: {e}"),
            }
        })?;
        if self.breaker.evaluate(&account) {
            return Err(RejectionReason::CircuitBreakerTripped {
                detail: self
                    .breaker
                    .trip_record()
                    .map_or_else(|| "tripped".to_string(), |r| r.to_string()),
            });
        }
        Ok(account)
    }

    async fn market_time(&self) -> Result<Option<chrono::NaiveTime>, RejectionReason> {
        match self.gateway.get_clock().await {
            Ok(clock) => {
                if self.config.require_market_open && !clock.is_open {
                    return Err(RejectionReason::MarketClosed);
                }
                Ok(Some(clock.local_time()))
            }
            Err(e) if self.config.require_market_open => {
                Err(RejectionReason::BrokerUnavailable {
                    detail: format!("clock: {e}"),
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "Clock unavailable; time-of-day thresholds use defaults");
                Ok(None)
            }
        }
    }

    async fn feature_snapshot(&self, symbol: &Symbol) -> Option<FeatureSnapshot> {
        match self.features.snapshot(symbol).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(symbol = %symbol, error = %e, "Feature provider failed");
                None
            }
        }
    }

    fn sector_count(
        &self,
        symbol: &Symbol,
        positions: &HashMap<Symbol, Position>,
    ) -> Option<usize> {
        let sector = self.config.sectors.get(symbol)?;
        Some(
            positions
                .keys()
                .filter(|s| *s != symbol && self.config.sectors.get(*s) == Some(sector))
                .count(),
        )
    }

    async fn consult(
        &self,
        advisor: &dyn AdvisoryPort,
        request: &AdvisoryRequest,
    ) -> Result<(), RejectionReason> {
        match tokio::time::timeout(self.config.advisory_timeout, advisor.review(request)).await {
            Ok(Ok(AdvisoryVerdict::Approve)) => {
                tracing::info!(symbol = %request.symbol, flags = ?request.flags, "Advisor approved flagged trade");
                Ok(())
            }
            Ok(Ok(AdvisoryVerdict::Veto { reason })) => Err(RejectionReason::AdvisoryVeto { reason }),
            Ok(Err(e)) => {
                tracing::warn!(symbol = %request.symbol, error = %e, "Advisor unavailable; keeping deterministic decision");
                Ok(())
            }
            Err(_) => {
                tracing::warn!(
                    symbol = %request.symbol,
                    timeout_ms = self.config.advisory_timeout.as_millis(),
                    "Advisor timed out; keeping deterministic decision"
                );
                Ok(())
            }
        }
    }

    fn log_decision(&self, symbol: &Symbol, side: OrderSide, qty: Decimal, decision: &Decision) {
        match (&decision.sizing, &decision.rejection) {
            (Some(s), _) => tracing::info!(
                symbol = %symbol,
                side = %side,
                requested_qty = %qty,
                confidence = %s.multipliers.confidence,
                regime = %s.multipliers.regime,
                sentiment = %s.multipliers.sentiment,
                trend = %s.multipliers.trend,
                sector = %s.multipliers.sector,
                raw = %s.raw_product,
                capped = %s.capped_product,
                effective = %s.effective_multiplier,
                risk_budget = %s.risk_budget,
                stop_distance = %s.stop_distance,
                max_qty = %s.max_quantity,
                "Risk check approved"
            ),
            (None, Some(reason)) => {
                metrics::counter!("guard_risk_rejections_total", "reason" => reason.code())
                    .increment(1);
                tracing::info!(
                    symbol = %symbol,
                    side = %side,
                    requested_qty = %qty,
                    reason = %decision.reason,
                    "Risk check rejected"
                );
            }
            (None, None) => {}
        }
    }
}
