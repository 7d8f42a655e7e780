//! Theo Stream Feed Binary
//!
//! Starts the theoretical-value feed pipeline.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin theo-stream-feed
//! ```
//!
//! # Environment Variables
//!
//! ## Optional
//! - `THEO_SERVER`: Upstream endpoint as host:port (default: localhost:50051)
//! - `THEO_FEED_UNDERLYINGS`: Comma-separated underlyings to chain-subscribe
//! - `THEO_FEED_BATCH_INTERVAL_MS`: Drain tick interval (default: 500)
//! - `THEO_FEED_BATCH_TIME_BUDGET_MS`: Per-drain wall-clock budget (default: 450)
//! - `THEO_FEED_BATCH_MAX_ITEMS`: Per-drain item budget (default: 1000)
//! - `THEO_FEED_CONSOLIDATION_SECS`: Bar window length (default: 60)
//! - `THEO_FEED_SCAN_INTERVAL_SECS`: Quiet-window scan cadence (default: 1)
//! - `THEO_FEED_MAX_FRAME_BYTES`: Frame payload cap (default: 1048576)
//! - `THEO_FEED_METRICS_PORT`: Prometheus metrics port, 0 disables (default: 9090)
//! - `RUST_LOG`: Log level (default: info)

use theo_stream_feed::{
    FeedConfig, SubscriptionKey, TheoFeedService, init_metrics, init_telemetry,
};
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    init_telemetry();

    tracing::info!("Starting theo stream feed");

    let config = FeedConfig::from_env()?;
    log_config(&config);

    init_metrics(config.server.metrics_port)?;

    let service = TheoFeedService::new(config.clone());

    // Chain-subscribe configured underlyings; consumers log each closed bar.
    for underlying in &config.underlyings {
        let handle = service.subscribe(SubscriptionKey::Chain(underlying.clone()), None);
        tokio::spawn(async move {
            loop {
                for bar in handle.recv().await {
                    tracing::info!(
                        contract = %bar.key,
                        time = %bar.time,
                        end_time = %bar.end_time,
                        theo = %bar.theoretical_value,
                        vol = %bar.implied_volatility,
                        bid_close = %bar.bid.close,
                        ask_close = %bar.ask.close,
                        "Consolidated bar"
                    );
                }
            }
        });
    }

    service.start().await?;
    tracing::info!("Feed ready");

    await_shutdown().await;

    service.shutdown().await?;
    tracing::info!("Feed stopped");
    Ok(())
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &FeedConfig) {
    tracing::info!(
        endpoint = %config.endpoint,
        batch_interval = ?config.batch.tick_interval,
        batch_max_items = config.batch.max_items,
        consolidation_secs = config.consolidation.period.as_secs(),
        metrics_port = config.server.metrics_port,
        underlyings = config.underlyings.len(),
        "Configuration loaded"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown() {
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
