//! Connection state machine for Bluetooth heart rate monitors.
//!
//! This crate connects to a single BLE heart rate strap, identified by its
//! platform identifier, and turns it into a feed of heart rate samples plus
//! on-demand body sensor location and battery level reads.
//!
//! # Features
//!
//! - **Lazy discovery**: the first command scans, connects and resolves the
//!   Heart Rate and Battery services; later commands reuse the resolved
//!   characteristics
//! - **Events**: connection changes, samples and errors are broadcast as
//!   [`DeviceEvent`]s
//! - **Streaming**: [`HeartRateStream`] exposes samples as an async stream
//!   with backpressure
//! - **Scanning**: [`scan`] lists nearby peripherals
//! - **Testability**: the Bluetooth stack sits behind the [`Radio`] trait;
//!   [`mock::MockRadio`] is a scriptable fake
//!
//! # Platform Differences
//!
//! - **macOS**: peripherals are identified by a UUID assigned by
//!   CoreBluetooth, stable on one Mac but different between Macs.
//! - **Linux/Windows**: peripherals are identified by their MAC address
//!   (e.g., `AA:BB:CC:DD:EE:FF`).
//!
//! Identifiers are compared ignoring case and `:`/`-` separators.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use hrm_core::{BtleplugRadio, HeartRateMonitor, HeartRateStream, StreamOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let radio = Arc::new(BtleplugRadio::new().await?);
//!     let monitor = Arc::new(HeartRateMonitor::new(radio, "AA:BB:CC:DD:EE:FF")?);
//!
//!     println!("Battery: {}%", monitor.get_battery_level().await?);
//!
//!     let mut samples = HeartRateStream::new(Arc::clone(&monitor), StreamOptions::default()).await?;
//!     while let Some(bpm) = samples.next().await {
//!         println!("{bpm} bpm");
//!     }
//!     Ok(())
//! }
//! ```

pub mod bluetooth;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod mock;
pub mod radio;
pub mod readiness;
pub mod resolver;
pub mod scan;
pub mod streaming;
pub mod util;

pub use hrm_types::{BodyLocation, Capability, decode_heart_rate, uuids};

pub use bluetooth::{BtleplugPeripheral, BtleplugRadio};
pub use config::{MonitorConfig, TargetDescriptor};
pub use device::{ConnectionState, HeartRateMonitor};
pub use error::{Error, Result};
pub use events::{DeviceEvent, EventDispatcher, EventReceiver};
pub use radio::{AdapterState, Advertisement, Radio, RadioEvent, RadioPeripheral};
pub use scan::{DiscoveredPeripheral, ScanOptions};
pub use streaming::{HeartRateStream, StreamOptions};

/// A monitor backed by the host Bluetooth adapter.
pub type BluetoothMonitor = HeartRateMonitor<BtleplugRadio>;
