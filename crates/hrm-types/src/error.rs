//! Error types for data parsing in hrm-types.

use thiserror::Error;

/// Errors that can occur when parsing heart rate monitor data.
///
/// This error type is platform-agnostic and does not include
/// BLE-specific errors (those belong in hrm-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The string is neither a 16/32-bit short form nor a full 128-bit UUID.
    #[error("Invalid UUID: {0:?}")]
    InvalidUuid(String),

    /// The payload is shorter than the format requires.
    #[error("Insufficient bytes: expected at least {expected}, got {actual}")]
    InsufficientBytes {
        /// Minimum number of bytes required.
        expected: usize,
        /// Number of bytes received.
        actual: usize,
    },
}

/// Result type alias using hrm-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
