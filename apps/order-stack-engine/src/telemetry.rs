//! Tracing Setup
//!
//! Initializes console logging through `tracing-subscriber`.
//!
//! # Configuration
//!
//! - `RUST_LOG`: filter directives (default: `info`)
//! - `ORDER_STACK_ENV`: set to `development` for coloured output without targets
//!
//! # Usage
//!
//! ```rust,ignore
//! use order_stack_engine::telemetry::init_telemetry;
//!
//! #[tokio::main]
//! async fn main() {
//!     init_telemetry();
//!     // ... application code
//! }
//! ```

use tracing_subscriber::EnvFilter;

/// Initialize console tracing.
///
/// A second call is ignored, so tests and the binary may both call it.
pub fn init_telemetry() {
    let is_development = std::env::var("ORDER_STACK_ENV")
        .map(|v| v == "development")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(!is_development)
        .with_ansi(is_development)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(development = is_development, "Console logging initialized");
    }
}
