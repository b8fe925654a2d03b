//! Listing nearby peripherals.
//!
//! [`scan`] runs a bounded scan and returns one entry per peripheral, with
//! the most recent advertisement data. [`advertisements`] is the open-ended
//! variant: it follows the adapter power state and yields every
//! advertisement as it arrives.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use hrm_types::uuids::HEART_RATE_SERVICE;

use crate::error::{Error, Result};
use crate::radio::{AdapterState, Advertisement, Radio, RadioEvent};

/// Options for scanning.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// How long to scan for devices.
    pub duration: Duration,
    /// Only report peripherals advertising one of these services (all if empty).
    pub services: Vec<Uuid>,
    pub allow_duplicates: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(5),
            services: Vec::new(),
            allow_duplicates: false,
        }
    }
}

impl ScanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn duration_secs(mut self, secs: u64) -> Self {
        self.duration = Duration::from_secs(secs);
        self
    }

    pub fn service(mut self, uuid: Uuid) -> Self {
        self.services.push(uuid);
        self
    }

    /// Only report peripherals advertising the Heart Rate service.
    pub fn heart_rate_only(self) -> Self {
        self.service(HEART_RATE_SERVICE)
    }

    pub fn allow_duplicates(mut self, allow: bool) -> Self {
        self.allow_duplicates = allow;
        self
    }
}

/// A peripheral seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPeripheral {
    /// Most recent advertising data.
    pub advertisement: Advertisement,
    /// Number of advertisements received.
    pub seen: u32,
}

impl DiscoveredPeripheral {
    pub fn id(&self) -> &str {
        &self.advertisement.id
    }

    /// Whether the peripheral advertises the Heart Rate service.
    pub fn is_heart_rate_monitor(&self) -> bool {
        self.advertisement
            .service_uuids
            .contains(&HEART_RATE_SERVICE)
    }
}

impl fmt::Display for DiscoveredPeripheral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.advertisement, f)
    }
}

fn wanted(options: &ScanOptions, advertisement: &Advertisement) -> bool {
    options.services.is_empty()
        || options
            .services
            .iter()
            .any(|uuid| advertisement.service_uuids.contains(uuid))
}

/// Scan for `options.duration` and return every peripheral seen.
///
/// Fails if the adapter is not powered on. An empty list means nothing was
/// found, not an error.
#[tracing::instrument(level = "info", skip_all, fields(duration = ?options.duration))]
pub async fn scan<R: Radio>(radio: &R, options: ScanOptions) -> Result<Vec<DiscoveredPeripheral>> {
    let state = radio.state().await?;
    if state != AdapterState::PoweredOn {
        return Err(Error::radio(format!("Bluetooth adapter is {state}")));
    }

    let mut events = radio.events().await?;
    info!(
        "Starting BLE scan for {} seconds...",
        options.duration.as_secs()
    );
    radio
        .start_scan(&options.services, options.allow_duplicates)
        .await?;

    let mut found: Vec<DiscoveredPeripheral> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let deadline = sleep(options.duration);
    tokio::pin!(deadline);

    loop {
        let event = tokio::select! {
            _ = &mut deadline => break,
            event = events.next() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let RadioEvent::Discovered { advertisement, .. } = event else {
            continue;
        };
        if !wanted(&options, &advertisement) {
            continue;
        }

        match index.get(&advertisement.id) {
            Some(&position) => {
                let entry = &mut found[position];
                entry.seen += 1;
                entry.advertisement = advertisement;
            }
            None => {
                debug!("Found peripheral: {}", advertisement.id);
                index.insert(advertisement.id.clone(), found.len());
                found.push(DiscoveredPeripheral {
                    advertisement,
                    seen: 1,
                });
            }
        }
    }

    radio.stop_scan().await?;
    info!("Scan complete. Found {} device(s)", found.len());
    Ok(found)
}

/// Yield advertisements until the stream is dropped.
///
/// Scanning starts whenever the adapter reports it is powered on and stops
/// when it goes away. Dropping the stream does not stop the scan; call
/// [`Radio::stop_scan`] when done.
pub async fn advertisements<R: Radio>(radio: Arc<R>) -> Result<BoxStream<'static, Advertisement>> {
    let events = radio.events().await?;
    let state = radio.state().await?;
    if state == AdapterState::PoweredOn {
        radio.start_scan(&[], true).await?;
    } else {
        info!("Bluetooth adapter is {}, waiting", state);
    }

    Ok(events
        .filter_map(move |event| {
            let radio = Arc::clone(&radio);
            async move {
                match event {
                    RadioEvent::Discovered { advertisement, .. } => Some(advertisement),
                    RadioEvent::StateChange(AdapterState::PoweredOn) => {
                        info!("Bluetooth adapter powered on, scanning");
                        if let Err(e) = radio.start_scan(&[], true).await {
                            warn!("Failed to start scan: {}", e);
                        }
                        None
                    }
                    RadioEvent::StateChange(state) => {
                        info!("Bluetooth adapter is {}, scan stopped", state);
                        if let Err(e) = radio.stop_scan().await {
                            debug!("Failed to stop scan: {}", e);
                        }
                        None
                    }
                    RadioEvent::Disconnected { .. } => None,
                }
            }
        })
        .boxed())
}
