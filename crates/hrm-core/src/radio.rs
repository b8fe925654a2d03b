//! Radio adapter abstraction.
//!
//! The connection state machine never talks to a Bluetooth stack directly.
//! It drives a [`Radio`] (scan control plus adapter events) and the
//! [`RadioPeripheral`] handles that radio hands out. The btleplug backend
//! lives in [`crate::bluetooth`]; [`crate::mock`] provides a scriptable fake
//! for tests.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// Power state of the local Bluetooth adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterState {
    PoweredOn,
    PoweredOff,
    Unknown,
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterState::PoweredOn => write!(f, "poweredOn"),
            AdapterState::PoweredOff => write!(f, "poweredOff"),
            AdapterState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Advertising data reported alongside a discovered peripheral.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Advertisement {
    /// Stable identifier of the peripheral on this host.
    pub id: String,
    /// Bluetooth address, when the platform exposes it.
    pub address: Option<String>,
    pub local_name: Option<String>,
    pub tx_power_level: Option<i16>,
    pub rssi: Option<i16>,
    pub manufacturer_data: HashMap<u16, Vec<u8>>,
    pub service_data: HashMap<Uuid, Vec<u8>>,
    pub service_uuids: Vec<Uuid>,
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

impl fmt::Display for Advertisement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID: {}", self.id)?;
        if let Some(address) = &self.address {
            write!(f, "\n  Address           = {address}")?;
        }
        if let Some(name) = &self.local_name {
            write!(f, "\n  Local Name        = {name}")?;
        }
        if let Some(rssi) = self.rssi {
            write!(f, "\n  RSSI              = {rssi} dBm")?;
        }
        if let Some(tx_power) = self.tx_power_level {
            write!(f, "\n  TX Power Level    = {tx_power}")?;
        }

        let mut manufacturers: Vec<_> = self.manufacturer_data.iter().collect();
        manufacturers.sort_by_key(|(id, _)| **id);
        for (id, data) in manufacturers {
            write!(f, "\n  Manufacturer Data = {:04x}: {}", id, hex(data))?;
        }

        let mut service_data: Vec<_> = self.service_data.iter().collect();
        service_data.sort_by_key(|(uuid, _)| **uuid);
        for (uuid, data) in service_data {
            write!(f, "\n  Service Data      = {}: {}", uuid, hex(data))?;
        }

        if !self.service_uuids.is_empty() {
            let uuids: Vec<String> = self.service_uuids.iter().map(Uuid::to_string).collect();
            write!(f, "\n  Service UUIDs     = {}", uuids.join(", "))?;
        }
        Ok(())
    }
}

/// A characteristic value pushed by the peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Characteristic the value belongs to.
    pub uuid: Uuid,
    pub value: Vec<u8>,
}

/// Events produced by the radio adapter.
#[derive(Debug, Clone)]
pub enum RadioEvent<P> {
    /// The adapter changed power state.
    StateChange(AdapterState),
    /// A peripheral was seen advertising.
    Discovered {
        peripheral: P,
        advertisement: Advertisement,
    },
    /// A peripheral dropped its connection.
    Disconnected { id: String },
}

/// Anything addressed by a GATT UUID (services and characteristics).
pub trait GattAttribute {
    fn uuid(&self) -> Uuid;
}

/// A local Bluetooth adapter.
///
/// One radio may be shared by any number of monitors; each monitor receives
/// it as an `Arc<R>` at construction.
#[async_trait]
pub trait Radio: Send + Sync + 'static {
    /// Peripheral handle type produced by this radio.
    type Peripheral: RadioPeripheral;

    /// Current adapter power state.
    async fn state(&self) -> Result<AdapterState>;

    /// Start scanning, optionally restricted to peripherals advertising one of
    /// `service_filter`.
    async fn start_scan(&self, service_filter: &[Uuid], allow_duplicates: bool) -> Result<()>;

    /// Stop scanning. Stopping an idle scanner is not an error.
    async fn stop_scan(&self) -> Result<()>;

    /// Subscribe to adapter events from this point on.
    async fn events(&self) -> Result<BoxStream<'static, RadioEvent<Self::Peripheral>>>;
}

/// A remote peripheral handed out by a [`Radio`].
#[async_trait]
pub trait RadioPeripheral: Clone + Send + Sync + 'static {
    /// Service handle type.
    type Service: GattAttribute + Clone + Send + Sync + 'static;
    /// Characteristic handle type.
    type Characteristic: GattAttribute + Clone + Send + Sync + 'static;

    /// Identifier matching [`Advertisement::id`] and [`RadioEvent::Disconnected`].
    fn id(&self) -> &str;

    async fn connect(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    /// Discover the services with the given UUIDs (all services if empty).
    async fn discover_services(&self, uuids: &[Uuid]) -> Result<Vec<Self::Service>>;

    /// Discover the characteristics of `service` with the given UUIDs
    /// (all characteristics if empty).
    async fn discover_characteristics(
        &self,
        service: &Self::Service,
        uuids: &[Uuid],
    ) -> Result<Vec<Self::Characteristic>>;

    /// Read the current value of a characteristic.
    async fn read(&self, characteristic: &Self::Characteristic) -> Result<Vec<u8>>;

    /// Enable or disable notifications on a characteristic.
    async fn set_notify(&self, characteristic: &Self::Characteristic, enable: bool) -> Result<()>;

    /// Stream of values pushed by this peripheral, for all characteristics.
    async fn notifications(&self) -> Result<BoxStream<'static, Notification>>;
}
