//! Error types for the device layer.
//!
//! Device operations themselves report [`ConfigError`] and [`QueryError`]
//! from `candev-core`. This module covers what sits around them: loading the
//! native driver, reading bus configuration and building devices from it.

use candev_core::{ConfigError, QueryError};

/// Result type alias for device-layer operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors raised while assembling or managing devices.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// The native driver could not be loaded.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    /// A configuration write failed after all resends.
    #[error("{device}: {source}")]
    Config {
        device: String,
        #[source]
        source: ConfigError,
    },

    /// A telemetry query failed.
    #[error("{device}: {source}")]
    Query {
        device: String,
        #[source]
        source: QueryError,
    },

    /// The bus configuration is inconsistent.
    #[error("Invalid bus configuration: {message}")]
    InvalidConfig { message: String },

    /// Bus configuration could not be parsed.
    #[error("Failed to parse bus configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new configuration failure for the named device.
    pub fn config(device: impl Into<String>, source: ConfigError) -> Self {
        Self::Config {
            device: device.into(),
            source,
        }
    }

    /// Create a new query failure for the named device.
    pub fn query(device: impl Into<String>, source: QueryError) -> Self {
        Self::Query {
            device: device.into(),
            source,
        }
    }

    /// Create a new invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// The native driver failed to load.
///
/// `Clone` so that every caller racing on the first load observes the same
/// failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BootstrapError {
    /// No loader was registered before the first device was constructed.
    #[error("No native driver loader registered")]
    NoLoader,

    /// The loader ran and failed.
    #[error("Native driver failed to load: {0}")]
    LoadFailed(String),
}
