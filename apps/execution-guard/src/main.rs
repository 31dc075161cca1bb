//! Execution Guard Binary
//!
//! Runs the protection, exit and position sync loops against Alpaca.
//!
//! # Usage
//!
//! ```bash
//! GUARD_CONFIG=config.yaml cargo run --bin execution-guard
//! ```
//!
//! # Environment Variables
//!
//! - `GUARD_CONFIG`: Config file path (default: config.yaml)
//! - `ALPACA_KEY` / `ALPACA_SECRET`: Usually interpolated into the config
//! - `RUST_LOG`: Log filter (default: execution_guard=info)

use std::sync::Arc;

use anyhow::Context;
use execution_guard::config::{Config, load_config, require_credentials};
use execution_guard::infrastructure::broker::AlpacaGateway;
use execution_guard::infrastructure::config::{Container, Providers};
use execution_guard::infrastructure::persistence::InMemoryOrderLedger;
use execution_guard::infrastructure::providers::{
    DisabledAdvisor, InMemoryFeatureStore, StaticRegimeProvider, StaticSentimentProvider,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Starting execution guard");

    let config = load_config(None).context("loading configuration")?;
    require_credentials(&config).context("checking brokerage credentials")?;
    log_config(&config);

    let gateway = AlpacaGateway::new(&config.broker.to_alpaca_config())
        .context("creating Alpaca gateway")?;
    let container = Container::new(
        &config,
        gateway,
        Arc::new(InMemoryOrderLedger::new()),
        providers(&config),
    );

    let shutdown = CancellationToken::new();
    let handles = container.start_loops(&shutdown);
    tracing::info!(loops = handles.len(), "Execution guard ready");

    shutdown_signal().await;
    shutdown.cancel();

    let timeout = config.sync.shutdown_timeout();
    tracing::info!(timeout_secs = timeout.as_secs(), "Graceful shutdown started");
    let joined = tokio::time::timeout(timeout, futures::future::join_all(handles)).await;
    match joined {
        Ok(results) => {
            for result in results {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Loop task ended abnormally");
                }
            }
        }
        Err(_) => tracing::warn!("Loops did not stop within the shutdown timeout"),
    }

    tracing::info!("Execution guard stopped");
    Ok(())
}

/// Initialize the tracing subscriber with environment filter.
///
/// Uses a static directive string that is guaranteed to parse.
#[allow(clippy::expect_used)]
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                "execution_guard=info"
                    .parse()
                    .expect("static directive 'execution_guard=info' is valid"),
            ),
        )
        .init();
}

fn log_config(config: &Config) {
    tracing::info!(
        environment = %config.broker.environment,
        trading_enabled = config.risk.trading_enabled,
        max_positions = config.risk.max_positions,
        daily_loss_limit_pct = %config.risk.daily_loss_limit_pct,
        bracket_orders = config.orders.use_bracket_orders,
        protection_interval_secs = config.protection.interval_secs,
        exits_interval_secs = config.exits.interval_secs,
        sync_interval_secs = config.sync.interval_secs,
        trailing_shadow = config.exits.trailing.shadow_mode,
        profit_taking_shadow = config.exits.profit_taking.shadow_mode,
        "Configuration loaded"
    );
}

fn providers(config: &Config) -> Providers {
    Providers {
        features: Arc::new(InMemoryFeatureStore::new()),
        regime: Arc::new(StaticRegimeProvider::new(
            config.regime.label,
            config.regime.multiplier,
        )),
        sentiment: Arc::new(StaticSentimentProvider::new(
            "neutral",
            config.regime.sentiment_multiplier,
        )),
        advisor: Some(Arc::new(DisabledAdvisor)),
    }
}

/// Wait for Ctrl+C or SIGTERM.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
