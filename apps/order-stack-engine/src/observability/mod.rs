//! Observability module for metrics.
//!
//! Structured logging is initialised separately by [`crate::telemetry`].

mod metrics;

pub use metrics::{
    MetricsConfig, MetricsError, init_metrics, record_family_completed, record_fill_applied,
    record_fill_rejected, record_rollback, record_stack_corruption, record_stop_loss_created,
    record_stop_loss_resized, update_active_orders,
};
