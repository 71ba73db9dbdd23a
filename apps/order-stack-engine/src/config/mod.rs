//! Configuration module for the order-stack engine.
//!
//! YAML configuration with environment variable interpolation and
//! validation.
//!
//! # Usage
//!
//! ```rust,ignore
//! use order_stack_engine::config::load_config;
//!
//! // Load from default path (config.yaml)
//! let config = load_config(None)?;
//!
//! println!("sweep every {} ms", config.sweep.interval_ms);
//! ```

mod execution_algos;
mod observability;
mod stop_loss;
mod sweep;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use execution_algos::ExecutionAlgosConfig;
pub use observability::ObservabilityConfig;
pub use stop_loss::StopLossConfig;
pub use sweep::SweepConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Stop-loss defaults.
    #[serde(default)]
    pub stop_loss: StopLossConfig,
    /// Execution algo selection.
    #[serde(default)]
    pub execution_algos: ExecutionAlgosConfig,
    /// Sweep scheduling.
    #[serde(default)]
    pub sweep: SweepConfig,
    /// Metrics exporter.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Defaults to "config.yaml".
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or("config.yaml");

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;
    static ENV_VAR_REGEX: OnceLock<Option<regex::Regex>> = OnceLock::new();

    let Some(re) = ENV_VAR_REGEX
        .get_or_init(|| regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").ok())
    else {
        return input.to_string();
    };

    let mut result = input.to_string();
    for cap in re.captures_iter(input) {
        let (Some(full_match), Some(var_match)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let default_value = cap.get(2).map(|m| m.as_str());

        let value = match std::env::var(var_match.as_str()) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.map_or_else(String::new, str::to_string),
        };

        result = result.replace(full_match.as_str(), &value);
    }

    result
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if let Some(level) = config.stop_loss.catastrophic_level
        && (level <= Decimal::ZERO || level >= Decimal::ONE)
    {
        return Err(ConfigError::ValidationError(format!(
            "stop_loss.catastrophic_level must be between 0 and 1 (exclusive), got {level}"
        )));
    }

    if config.sweep.interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "sweep.interval_ms must be positive".to_string(),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_addr.parse::<std::net::SocketAddr>().is_err()
    {
        return Err(ConfigError::ValidationError(format!(
            "observability.metrics_addr '{}' is not a socket address",
            config.observability.metrics_addr
        )));
    }

    Ok(())
}
