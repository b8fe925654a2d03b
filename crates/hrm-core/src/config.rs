//! Monitor configuration: which peripheral to bind and how long radio
//! operations may take.

use std::time::Duration;

use crate::error::{Error, Result};

/// Default timeout for establishing a BLE connection.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default timeout for one service or characteristic discovery round-trip.
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for characteristic reads and notify toggles.
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Identifies the advertised peripheral a monitor binds to.
///
/// Immutable once a monitor has been built from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
    uuid: String,
    verbose_logging: bool,
}

impl TargetDescriptor {
    /// Target the peripheral with this identifier (MAC address or platform UUID).
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            verbose_logging: false,
        }
    }

    /// Log advertisement and service details of the bound peripheral at info level.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose_logging = verbose;
        self
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn verbose_logging(&self) -> bool {
        self.verbose_logging
    }

    /// Reject an empty or whitespace-only identifier.
    pub fn validate(&self) -> Result<()> {
        if self.uuid.trim().is_empty() {
            return Err(Error::invalid_config(
                "a UUID for the device is required",
            ));
        }
        Ok(())
    }
}

impl From<&str> for TargetDescriptor {
    fn from(uuid: &str) -> Self {
        Self::new(uuid)
    }
}

impl From<String> for TargetDescriptor {
    fn from(uuid: String) -> Self {
        Self::new(uuid)
    }
}

/// Timeouts and buffer sizes for a monitor.
///
/// Timeouts bound single radio operations. Nothing here limits how long a
/// caller may wait for data or for a capability to become ready.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use hrm_core::MonitorConfig;
///
/// let config = MonitorConfig::default()
///     .connection_timeout(Duration::from_secs(20))
///     .read_timeout(Duration::from_secs(5));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Timeout for establishing a BLE connection.
    pub connection_timeout: Duration,
    /// Timeout for each service/characteristic discovery step.
    pub discovery_timeout: Duration,
    /// Timeout for reads and notify toggles.
    pub read_timeout: Duration,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            connection_timeout: DEFAULT_CONNECT_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            event_capacity: 100,
        }
    }
}

impl MonitorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Longer timeouts for weak signals or busy radio environments.
    pub fn challenging_environment() -> Self {
        Self {
            connection_timeout: Duration::from_secs(25),
            discovery_timeout: Duration::from_secs(15),
            read_timeout: Duration::from_secs(15),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Validate the options and return an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 {
            return Err(Error::invalid_config("event_capacity must be > 0"));
        }
        for (name, value) in [
            ("connection_timeout", self.connection_timeout),
            ("discovery_timeout", self.discovery_timeout),
            ("read_timeout", self.read_timeout),
        ] {
            if value.is_zero() {
                return Err(Error::invalid_config(format!("{name} must be > 0")));
            }
        }
        Ok(())
    }
}
