//! Prometheus metrics for the order-stack engine.
//!
//! # Example
//!
//! ```ignore
//! use order_stack_engine::observability::{init_metrics, MetricsConfig};
//!
//! init_metrics(&MetricsConfig::default())?;
//! record_fill_applied("stop_loss_broker");
//! ```

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};

/// Configuration for the metrics exporter.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Address to bind the metrics HTTP listener.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 9090)),
        }
    }
}

impl MetricsConfig {
    /// Create a new metrics configuration with custom address.
    #[must_use]
    pub const fn with_addr(addr: SocketAddr) -> Self {
        Self { listen_addr: addr }
    }
}

/// Initialize the Prometheus metrics exporter.
///
/// This starts an HTTP server that exposes metrics at `/metrics`.
///
/// # Errors
///
/// Returns an error if the metrics exporter fails to start (e.g., port already in use).
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(config.listen_addr)
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!(
        addr = %config.listen_addr,
        "Prometheus metrics exporter started"
    );

    Ok(())
}

/// Error type for metrics operations.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Failed to install metrics exporter.
    #[error("metrics installation error: {0}")]
    Installation(String),
}

// ============================================================================
// Fill Metrics
// ============================================================================

/// Record a fill merged into a stored order.
pub fn record_fill_applied(stack: &str) {
    counter!("stack_fills_applied_total", "stack" => stack.to_string()).increment(1);
}

/// Record a fill report discarded because it exceeded the open quantity.
pub fn record_fill_rejected(stack: &str) {
    counter!("stack_fills_rejected_total", "stack" => stack.to_string()).increment(1);
}

// ============================================================================
// Stop-Loss Metrics
// ============================================================================

/// Record a stop-loss broker order placed.
///
/// # Arguments
///
/// * `instrument` - Instrument code
/// * `algo` - Execution algo used (e.g., "`algo_stop`")
pub fn record_stop_loss_created(instrument: &str, algo: &str) {
    counter!(
        "stop_loss_orders_created_total",
        "instrument" => instrument.to_string(),
        "algo" => algo.to_string()
    )
    .increment(1);
}

/// Record a stop-loss contract order resized.
///
/// # Arguments
///
/// * `instrument` - Instrument code
/// * `action` - "resize" or "cancel"
pub fn record_stop_loss_resized(instrument: &str, action: &str) {
    counter!(
        "stop_loss_orders_resized_total",
        "instrument" => instrument.to_string(),
        "action" => action.to_string()
    )
    .increment(1);
}

// ============================================================================
// Stack Health Metrics
// ============================================================================

/// Record an order family archived and deactivated.
pub fn record_family_completed(hierarchy: &str) {
    counter!("order_families_completed_total", "hierarchy" => hierarchy.to_string()).increment(1);
}

/// Record a fatal stack inconsistency.
pub fn record_stack_corruption(stage: &str) {
    counter!("stack_corruption_total", "stage" => stage.to_string()).increment(1);
}

/// Record a successful compensating rollback.
pub fn record_rollback(stack: &str) {
    counter!("stack_rollbacks_total", "stack" => stack.to_string()).increment(1);
}

/// Update the number of active orders on a stack.
#[allow(clippy::cast_precision_loss)]
pub fn update_active_orders(stack: &str, count: usize) {
    gauge!("stack_active_orders", "stack" => stack.to_string()).set(count as f64);
}
