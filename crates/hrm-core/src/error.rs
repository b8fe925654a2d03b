//! Error types for hrm-core.
//!
//! # Propagation
//!
//! | Error | Raised by | Delivered as |
//! |-------|-----------|--------------|
//! | [`Error::InvalidConfig`] | [`crate::HeartRateMonitor::new`] | `Err` from the constructor |
//! | [`Error::ServiceNotFound`] | discovery | [`crate::DeviceEvent::Error`] |
//! | [`Error::CharacteristicNotFound`] | discovery | [`crate::DeviceEvent::Error`] |
//! | [`Error::ReadFailed`] | `body_location` / `battery_level` | `Err` to that caller only |
//! | [`Error::Timeout`] | any single radio operation | event or `Err`, depending on the caller |
//!
//! Discovery runs in background tasks, so its failures cannot be returned to
//! whoever triggered it; they are broadcast instead. An unsupported 16-bit
//! heart rate payload is not an error at all: the sample is dropped.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur when talking to a heart rate monitor.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error from the platform stack.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Error reported by a non-btleplug radio (e.g. the mock radio).
    #[error("Radio error: {0}")]
    Radio(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A required GATT service is missing on the peripheral.
    #[error("{name} Service not found")]
    ServiceNotFound {
        /// Human-readable service name.
        name: &'static str,
        /// The UUID that was searched for.
        uuid: Uuid,
    },

    /// A required GATT characteristic is missing on the peripheral.
    #[error("{name} Characteristic not found")]
    CharacteristicNotFound {
        /// Human-readable characteristic name.
        name: &'static str,
        /// The UUID that was searched for.
        uuid: Uuid,
    },

    /// Reading a characteristic failed.
    #[error("Read failed for characteristic {uuid}: {reason}")]
    ReadFailed {
        /// The characteristic UUID.
        uuid: Uuid,
        /// The reason for the failure.
        reason: String,
    },

    /// Operation attempted while no peripheral is connected.
    #[error("Not connected to device")]
    NotConnected,

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// A completion arrived for a connection that has since been torn down.
    #[error("Connection attempt superseded")]
    Superseded,

    /// Malformed data from the peripheral.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Parse error from hrm-types.
    #[error(transparent)]
    Parse(#[from] hrm_types::ParseError),
}

impl Error {
    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a radio error from any displayable value.
    pub fn radio(message: impl std::fmt::Display) -> Self {
        Self::Radio(message.to_string())
    }

    /// Whether the error means the peripheral lacks something we need,
    /// as opposed to a transport failure.
    pub fn is_missing_attribute(&self) -> bool {
        matches!(
            self,
            Error::ServiceNotFound { .. } | Error::CharacteristicNotFound { .. }
        )
    }
}

/// Result type alias using hrm-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use hrm_types::uuids::{HEART_RATE_MEASUREMENT, HEART_RATE_SERVICE};

    #[test]
    fn test_error_display() {
        let err = Error::ServiceNotFound {
            name: "Heart Rate",
            uuid: HEART_RATE_SERVICE,
        };
        assert_eq!(err.to_string(), "Heart Rate Service not found");

        let err = Error::CharacteristicNotFound {
            name: "Heart Rate",
            uuid: HEART_RATE_MEASUREMENT,
        };
        assert_eq!(err.to_string(), "Heart Rate Characteristic not found");

        let err = Error::NotConnected;
        assert_eq!(err.to_string(), "Not connected to device");

        let err = Error::timeout("connect", Duration::from_secs(15));
        assert!(err.to_string().contains("connect"));
        assert!(err.to_string().contains("15s"));
    }

    #[test]
    fn test_missing_attribute_classification() {
        let err = Error::ServiceNotFound {
            name: "Heart Rate",
            uuid: HEART_RATE_SERVICE,
        };
        assert!(err.is_missing_attribute());
        assert!(!Error::NotConnected.is_missing_attribute());
        assert!(!Error::radio("boom").is_missing_attribute());
    }

    #[test]
    fn test_parse_error_conversion() {
        let err: Error = hrm_types::uuids::parse("nope").unwrap_err().into();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_btleplug_error_conversion() {
        fn _assert_from_impl<T: From<btleplug::Error>>() {}
        _assert_from_impl::<Error>();
    }
}
