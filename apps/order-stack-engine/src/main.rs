//! Order Stack Engine Binary
//!
//! Runs the stack handler sweep against in-memory stores and the paper
//! broker.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin order-stack-engine
//! ```
//!
//! # Environment Variables
//!
//! - `ORDER_STACK_CONFIG`: path to the YAML config (default: `config.yaml`)
//! - `ORDER_STACK_ENV`: `development` for coloured logs
//! - `RUST_LOG`: log level (default: info)

use std::net::SocketAddr;

use anyhow::Context;
use order_stack_engine::Container;
use order_stack_engine::config::{Config, load_config};
use order_stack_engine::observability::{MetricsConfig, init_metrics};
use order_stack_engine::telemetry::init_telemetry;
use tokio::signal;
use tokio::time::{MissedTickBehavior, interval};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry();

    let config_path = std::env::var("ORDER_STACK_CONFIG").ok();
    let config = load_config(config_path.as_deref()).context("loading configuration")?;
    tracing::info!(
        config = config_path.as_deref().unwrap_or("config.yaml"),
        interval_ms = config.sweep.interval_ms,
        "Starting order stack engine"
    );

    start_metrics(&config)?;

    let container = Container::in_memory();
    let handler = container
        .stack_handler(&config)
        .context("wiring stack handler")?;

    let mut ticker = interval(config.sweep.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = handler.process_stack().await;
                if !report.is_clean() {
                    tracing::warn!(failed_steps = ?report.failed_steps, "Sweep finished with failed steps");
                }
            }
            result = signal::ctrl_c() => {
                result.context("listening for shutdown signal")?;
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    if config.sweep.safe_removal_on_shutdown {
        handler.safe_stack_removal().await;
    }
    tracing::info!("Order stack engine stopped");
    Ok(())
}

fn start_metrics(config: &Config) -> anyhow::Result<()> {
    if !config.observability.metrics_enabled {
        return Ok(());
    }
    let addr: SocketAddr = config
        .observability
        .metrics_addr
        .parse()
        .with_context(|| format!("invalid metrics_addr '{}'", config.observability.metrics_addr))?;
    init_metrics(&MetricsConfig::with_addr(addr)).context("starting metrics exporter")?;
    Ok(())
}
