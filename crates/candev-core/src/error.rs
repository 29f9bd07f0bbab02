//! Failure taxonomy shared by every device operation.
//!
//! Every fallible device call reports one of a fixed set of [`ErrorCode`]s
//! together with a human-readable message. Proxies never invent new kinds:
//! validation failures they detect themselves are `ParamOutOfBounds`, and
//! anything the native driver reports is passed through with its kind intact.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Closed set of failure kinds, with the numeric codes used by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Caller supplied an invalid channel, index or value.
    ParamOutOfBounds,

    /// The driver detected a violated invariant (e.g. device offline).
    FailedAssertion,

    /// The driver could not complete the request in time.
    TimedOut,

    /// Unclassified driver failure.
    Generic,
}

impl ErrorCode {
    /// Numeric code as reported by the native driver.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::ParamOutOfBounds => 0x00,
            Self::FailedAssertion => 0x01,
            Self::TimedOut => 0xFE,
            Self::Generic => 0xFF,
        }
    }

    /// Decode a driver error code. Codes outside the taxonomy become `Generic`.
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        match code {
            0x00 => Self::ParamOutOfBounds,
            0x01 => Self::FailedAssertion,
            0xFE => Self::TimedOut,
            _ => Self::Generic,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParamOutOfBounds => write!(f, "parameter out of bounds"),
            Self::FailedAssertion => write!(f, "failed assertion"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Generic => write!(f, "generic error"),
        }
    }
}

/// A classified failure reported by the native driver or raised by a proxy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct DeviceError {
    kind: ErrorCode,
    message: String,
}

impl DeviceError {
    /// Create a new error of the given kind.
    pub fn new(kind: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a `ParamOutOfBounds` error.
    pub fn param_out_of_bounds(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParamOutOfBounds, message)
    }

    /// Create a `FailedAssertion` error.
    pub fn failed_assertion(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::FailedAssertion, message)
    }

    /// Create a `TimedOut` error.
    pub fn timed_out(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::TimedOut, message)
    }

    /// Create a `Generic` error.
    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Generic, message)
    }

    /// The failure kind.
    #[must_use]
    pub fn kind(&self) -> ErrorCode {
        self.kind
    }

    /// The failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A configuration write was rejected.
///
/// Configuration writes are idempotent: the device state is authoritative and
/// the last successful write wins, so callers may simply resend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("configuration failed ({kind}): {message}")]
pub struct ConfigError {
    kind: ErrorCode,
    message: String,
}

impl ConfigError {
    /// Create a new configuration error.
    pub fn new(kind: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The failure kind.
    #[must_use]
    pub fn kind(&self) -> ErrorCode {
        self.kind
    }

    /// The failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<DeviceError> for ConfigError {
    fn from(err: DeviceError) -> Self {
        Self {
            kind: err.kind,
            message: err.message,
        }
    }
}

/// A telemetry query was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not get value ({kind}): {message}")]
pub struct QueryError {
    kind: ErrorCode,
    message: String,
}

impl QueryError {
    /// Create a new query error.
    pub fn new(kind: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The failure kind.
    #[must_use]
    pub fn kind(&self) -> ErrorCode {
        self.kind
    }

    /// The failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<DeviceError> for QueryError {
    fn from(err: DeviceError) -> Self {
        Self {
            kind: err.kind,
            message: err.message,
        }
    }
}

/// Errors decoding raw device integers into the closed vocabulary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid status code: {0}")]
    InvalidStatusCode(u8),

    #[error("Invalid timing budget: {0}ms")]
    InvalidTimingBudget(u8),

    #[error("Invalid channel: {0}")]
    InvalidChannel(u8),
}

impl From<Error> for DeviceError {
    fn from(err: Error) -> Self {
        DeviceError::param_out_of_bounds(err.to_string())
    }
}

impl From<Error> for ConfigError {
    fn from(err: Error) -> Self {
        DeviceError::from(err).into()
    }
}

impl From<Error> for QueryError {
    fn from(err: Error) -> Self {
        DeviceError::from(err).into()
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorCode::ParamOutOfBounds, 0x00)]
    #[case(ErrorCode::FailedAssertion, 0x01)]
    #[case(ErrorCode::TimedOut, 0xFE)]
    #[case(ErrorCode::Generic, 0xFF)]
    fn test_error_code_numeric(#[case] kind: ErrorCode, #[case] code: u8) {
        assert_eq!(kind.code(), code);
        assert_eq!(ErrorCode::from_code(code), kind);
    }

    #[test]
    fn test_unknown_error_code_is_generic() {
        assert_eq!(ErrorCode::from_code(0x42), ErrorCode::Generic);
    }

    #[test]
    fn test_device_error_display() {
        let error = DeviceError::failed_assertion("Regulator offline");
        assert_eq!(error.kind(), ErrorCode::FailedAssertion);
        assert_eq!(error.to_string(), "failed assertion: Regulator offline");
    }

    #[test]
    fn test_config_error_preserves_kind() {
        let error: ConfigError = DeviceError::timed_out("no ack").into();
        assert_eq!(error.kind(), ErrorCode::TimedOut);
        assert_eq!(error.message(), "no ack");
    }

    #[test]
    fn test_query_error_preserves_kind() {
        let error: QueryError = DeviceError::generic("bus fault").into();
        assert_eq!(error.kind(), ErrorCode::Generic);
        assert_eq!(error.to_string(), "could not get value (generic error): bus fault");
    }

    #[test]
    fn test_decode_error_maps_to_param_out_of_bounds() {
        let error: ConfigError = Error::InvalidChannel(7).into();
        assert_eq!(error.kind(), ErrorCode::ParamOutOfBounds);
        assert_eq!(error.message(), "Invalid channel: 7");
    }
}
