//! Shared vocabulary for CAN-bus peripheral devices.
//!
//! This crate holds the closed set of values exchanged between application
//! code and the device layer: the failure taxonomy, the rangefinder's
//! measurement types and the regulator's channel types. It performs no I/O.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{ConfigError, DeviceError, Error, ErrorCode, QueryError, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
