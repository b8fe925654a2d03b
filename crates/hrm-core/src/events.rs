//! Device event system for lifecycle, readiness and data notifications.
//!
//! Every [`crate::HeartRateMonitor`] owns an [`EventDispatcher`]. Consumers
//! call [`crate::HeartRateMonitor::subscribe`] to receive a broadcast
//! [`EventReceiver`].

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use hrm_types::{BodyLocation, Capability};

use crate::device::ConnectionState;

/// Events emitted by a heart rate monitor.
///
/// All events are serializable for logging and IPC.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum DeviceEvent {
    /// The connection state machine moved to a new state.
    StateChanged { state: ConnectionState },
    /// The target peripheral was seen advertising.
    Discovered {
        id: String,
        local_name: Option<String>,
        rssi: Option<i16>,
    },
    /// The target peripheral accepted the connection.
    Connected { id: String },
    /// A capability was resolved; fired once per discovery cycle.
    Ready { capability: Capability },
    /// A decoded heart rate sample.
    Data { bpm: u8 },
    /// Result of a body sensor location read.
    BodyLocation { location: BodyLocation },
    /// Result of a battery level read (0-100).
    BatteryLevel { level: u8 },
    /// An error raised inside an asynchronous completion.
    Error { error: String },
    /// The peripheral dropped the connection.
    Disconnected { id: String },
    /// [`crate::HeartRateMonitor::disconnect`] was called; no more data will follow.
    End,
}

/// Sender for device events.
pub type EventSender = broadcast::Sender<DeviceEvent>;

/// Receiver for device events.
pub type EventReceiver = broadcast::Receiver<DeviceEvent>;

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: DeviceEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}
