//! Heart rate monitor connection and discovery state machine.
//!
//! A [`HeartRateMonitor`] owns the lifecycle of exactly one target
//! peripheral: scanning for it, connecting, resolving the Heart Rate and
//! Battery services, subscribing to measurements and handing decoded samples
//! to subscribers as [`DeviceEvent::Data`].
//!
//! Commands can be issued in any state. Anything that needs a capability
//! which has not been resolved yet starts discovery (unless it is already
//! running) and waits for that capability's readiness token.
//!
//! Every asynchronous step is tagged with the connection generation it was
//! started under. A disconnect bumps the generation, so completions that
//! arrive afterwards are recognised as stale and discarded.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use hrm_types::uuids::{BATTERY_SERVICE, HEART_RATE_MEASUREMENT, HEART_RATE_SERVICE, short_form};
use hrm_types::{BodyLocation, Capability, decode_heart_rate, measurement};

use crate::config::{MonitorConfig, TargetDescriptor};
use crate::error::{Error, Result};
use crate::events::{DeviceEvent, EventDispatcher, EventReceiver};
use crate::radio::{
    AdapterState, Advertisement, GattAttribute, Notification, Radio, RadioEvent, RadioPeripheral,
};
use crate::readiness::Readiness;
use crate::resolver::resolve;
use crate::util::identifiers_match;

/// Connection lifecycle of a [`HeartRateMonitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Nothing has been requested yet.
    Idle,
    /// Waiting for the target to advertise.
    Scanning,
    Connecting,
    DiscoveringServices,
    DiscoveringCharacteristics,
    /// Heart rate measurement is resolved and can be subscribed to.
    Ready,
    /// The peripheral dropped the connection; the next command rescans.
    Disconnected,
    /// [`HeartRateMonitor::disconnect`] was called.
    Stopped,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Scanning => "scanning",
            ConnectionState::Connecting => "connecting",
            ConnectionState::DiscoveringServices => "discovering services",
            ConnectionState::DiscoveringCharacteristics => "discovering characteristics",
            ConnectionState::Ready => "ready",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

type PeripheralOf<R> = <R as Radio>::Peripheral;
type CharacteristicOf<R> = <PeripheralOf<R> as RadioPeripheral>::Characteristic;

/// Mutable connection state, always accessed under one lock.
struct Inner<P> {
    state: ConnectionState,
    /// Bumped on every scan session, bind and teardown.
    generation: u64,
    peripheral: Option<P>,
    /// A scan/connect/discover attempt is in flight.
    initing: bool,
    /// The consumer wants heart rate samples (set by `start`, cleared by `pause`).
    notify_wanted: bool,
    session: Option<CancellationToken>,
    tasks: Vec<JoinHandle<()>>,
}

struct Shared<R: Radio> {
    radio: Arc<R>,
    target: TargetDescriptor,
    config: MonitorConfig,
    events: EventDispatcher,
    inner: Mutex<Inner<PeripheralOf<R>>>,
    heart_rate: Readiness<CharacteristicOf<R>>,
    body_location: Readiness<CharacteristicOf<R>>,
    battery: Readiness<CharacteristicOf<R>>,
}

/// A single heart rate monitor, driven through an injected [`Radio`].
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use hrm_core::{BtleplugRadio, DeviceEvent, HeartRateMonitor};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let radio = Arc::new(BtleplugRadio::new().await?);
///     let monitor = HeartRateMonitor::new(radio, "AA:BB:CC:DD:EE:FF")?;
///     let mut events = monitor.subscribe();
///     monitor.start().await?;
///
///     while let Ok(event) = events.recv().await {
///         if let DeviceEvent::Data { bpm } = event {
///             println!("{bpm} bpm");
///         }
///     }
///     Ok(())
/// }
/// ```
///
/// # Cleanup
///
/// Call [`HeartRateMonitor::disconnect`] before dropping a connected
/// monitor. Dropping it stops background work and issues a best-effort
/// disconnect, but cannot wait for it.
pub struct HeartRateMonitor<R: Radio> {
    shared: Arc<Shared<R>>,
}

impl<R: Radio> fmt::Debug for HeartRateMonitor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeartRateMonitor")
            .field("target", &self.shared.target)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<R: Radio> HeartRateMonitor<R> {
    /// Create a monitor for `target` with default timeouts.
    ///
    /// Fails with [`Error::InvalidConfig`] if the target identifier is empty.
    pub fn new(radio: Arc<R>, target: impl Into<TargetDescriptor>) -> Result<Self> {
        Self::with_config(radio, target, MonitorConfig::default())
    }

    /// Create a monitor with explicit configuration.
    pub fn with_config(
        radio: Arc<R>,
        target: impl Into<TargetDescriptor>,
        config: MonitorConfig,
    ) -> Result<Self> {
        let target = target.into();
        target.validate()?;
        config.validate()?;

        Ok(Self {
            shared: Arc::new(Shared {
                radio,
                events: EventDispatcher::new(config.event_capacity),
                target,
                config,
                inner: Mutex::new(Inner {
                    state: ConnectionState::Idle,
                    generation: 0,
                    peripheral: None,
                    initing: false,
                    notify_wanted: false,
                    session: None,
                    tasks: Vec::new(),
                }),
                heart_rate: Readiness::new(),
                body_location: Readiness::new(),
                battery: Readiness::new(),
            }),
        })
    }

    pub fn target(&self) -> &TargetDescriptor {
        &self.shared.target
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    /// Subscribe to events from this point on.
    pub fn subscribe(&self) -> EventReceiver {
        self.shared.events.subscribe()
    }

    /// Whether `capability` is resolved on the current connection.
    pub fn is_ready(&self, capability: Capability) -> bool {
        self.shared.slot(capability).is_resolved()
    }

    /// Whether a scan/connect/discover attempt is in flight.
    pub fn is_initing(&self) -> bool {
        self.shared.lock().initing
    }

    /// Start (or resume) the heart rate feed.
    ///
    /// With heart rate already resolved this only re-enables notifications.
    /// Otherwise discovery is started if it is not already running, and
    /// notifications are enabled as soon as heart rate becomes ready.
    #[tracing::instrument(level = "debug", skip(self), fields(device = %self.shared.target.uuid()))]
    pub async fn start(&self) -> Result<()> {
        self.shared.lock().notify_wanted = true;

        match self.shared.heart_rate.get() {
            Some(characteristic) => self.shared.set_notify(&characteristic, true).await,
            None => self.shared.ensure_discovery().await,
        }
    }

    /// Stop heart rate notifications without disconnecting.
    ///
    /// Returns `false` (and does nothing) if heart rate is not resolved.
    /// Samples that arrive after this returns are dropped.
    #[tracing::instrument(level = "debug", skip(self), fields(device = %self.shared.target.uuid()))]
    pub async fn pause(&self) -> Result<bool> {
        let Some(characteristic) = self.shared.heart_rate.get() else {
            return Ok(false);
        };
        self.shared.lock().notify_wanted = false;
        self.shared.set_notify(&characteristic, false).await?;
        Ok(true)
    }

    /// Tear everything down and emit [`DeviceEvent::End`].
    ///
    /// Safe to call in any state, including before anything was started.
    /// The monitor can be started again afterwards.
    #[tracing::instrument(level = "info", skip(self), fields(device = %self.shared.target.uuid()))]
    pub async fn disconnect(&self) -> Result<()> {
        let shared = &self.shared;
        let heart_rate = shared.heart_rate.get();
        let peripheral = {
            let mut inner = shared.lock();
            inner.notify_wanted = false;
            let peripheral = inner.peripheral.clone();
            shared.invalidate(&mut inner, ConnectionState::Stopped);
            peripheral
        };

        if let Err(e) = shared.radio.stop_scan().await {
            debug!("stop scan during disconnect failed: {}", e);
        }

        let mut result = Ok(());
        if let Some(peripheral) = peripheral {
            if let Some(characteristic) = heart_rate {
                if let Err(e) = peripheral.set_notify(&characteristic, false).await {
                    debug!("disable notifications during disconnect failed: {}", e);
                }
            }
            info!("Disconnecting from {}", peripheral.id());
            result = peripheral.disconnect().await;
        }

        shared.events.send(DeviceEvent::End);
        result
    }

    /// Read the body sensor location.
    ///
    /// Waits for discovery if the characteristic is not resolved yet. If the
    /// peripheral has no Body Sensor Location characteristic this never
    /// completes; wrap it in a timeout if that matters.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_body_location(&self) -> Result<BodyLocation> {
        let characteristic = self.shared.capability(Capability::BodySensorLocation).await?;
        let data = self.shared.read(&characteristic).await?;
        let location = BodyLocation::from_bytes(&data);
        self.shared
            .events
            .send(DeviceEvent::BodyLocation { location });
        Ok(location)
    }

    /// Read the battery level (0-100).
    ///
    /// Waits for discovery if the characteristic is not resolved yet.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_battery_level(&self) -> Result<u8> {
        let characteristic = self.shared.capability(Capability::Battery).await?;
        let data = self.shared.read(&characteristic).await?;
        let level = *data
            .first()
            .ok_or_else(|| Error::InvalidData("Empty battery data".to_string()))?;
        self.shared.events.send(DeviceEvent::BatteryLevel { level });
        Ok(level)
    }
}

impl<R: Radio> Drop for HeartRateMonitor<R> {
    fn drop(&mut self) {
        let peripheral = {
            let mut inner = self.shared.lock();
            inner.generation += 1;
            if let Some(session) = inner.session.take() {
                session.cancel();
            }
            for handle in inner.tasks.drain(..) {
                handle.abort();
            }
            inner.peripheral.take()
        };

        if let Some(peripheral) = peripheral {
            warn!(
                peripheral = %peripheral.id(),
                "HeartRateMonitor dropped without calling disconnect() - performing best-effort cleanup"
            );
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(e) = peripheral.disconnect().await {
                        debug!(error = %e, "Best-effort disconnect failed");
                    }
                });
            }
        }
    }
}

async fn bounded<T>(
    operation: &str,
    limit: Duration,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    timeout(limit, future)
        .await
        .map_err(|_| Error::timeout(operation, limit))?
}

fn describe(uuid: &uuid::Uuid) -> String {
    let name = if *uuid == HEART_RATE_SERVICE {
        " (Heart Rate)"
    } else if *uuid == BATTERY_SERVICE {
        " (Battery)"
    } else {
        ""
    };
    match short_form(uuid) {
        Some(short) => format!("{short:04x}{name}"),
        None => format!("{uuid}{name}"),
    }
}

impl<R: Radio> Shared<R> {
    fn lock(&self) -> MutexGuard<'_, Inner<PeripheralOf<R>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, capability: Capability) -> &Readiness<CharacteristicOf<R>> {
        match capability {
            Capability::HeartRate => &self.heart_rate,
            Capability::BodySensorLocation => &self.body_location,
            Capability::Battery => &self.battery,
        }
    }

    fn set_state(&self, inner: &mut Inner<PeripheralOf<R>>, state: ConnectionState) {
        if inner.state != state {
            debug!("{} -> {}", inner.state, state);
            inner.state = state;
            self.events.send(DeviceEvent::StateChanged { state });
        }
    }

    /// Drop the peripheral and every handle derived from it.
    fn invalidate(&self, inner: &mut Inner<PeripheralOf<R>>, state: ConnectionState) {
        inner.generation += 1;
        inner.peripheral = None;
        inner.initing = false;
        if let Some(session) = inner.session.take() {
            session.cancel();
        }
        for handle in inner.tasks.drain(..) {
            handle.abort();
        }
        self.heart_rate.clear();
        self.body_location.clear();
        self.battery.clear();
        self.set_state(inner, state);
    }

    fn guard(&self, generation: u64) -> Result<()> {
        if self.lock().generation == generation {
            Ok(())
        } else {
            Err(Error::Superseded)
        }
    }

    fn advance(&self, generation: u64, state: ConnectionState) -> Result<()> {
        let mut inner = self.lock();
        if inner.generation != generation {
            return Err(Error::Superseded);
        }
        self.set_state(&mut inner, state);
        Ok(())
    }

    fn connected_peripheral(&self) -> Result<PeripheralOf<R>> {
        self.lock().peripheral.clone().ok_or(Error::NotConnected)
    }

    /// Resolve `capability`, starting discovery and waiting if needed.
    async fn capability(self: &Arc<Self>, capability: Capability) -> Result<CharacteristicOf<R>> {
        let slot = self.slot(capability);
        if let Some(characteristic) = slot.get() {
            return Ok(characteristic);
        }
        debug!("{} not resolved yet, waiting for discovery", capability);
        self.ensure_discovery().await?;
        Ok(slot.wait().await)
    }

    async fn set_notify(&self, characteristic: &CharacteristicOf<R>, enable: bool) -> Result<()> {
        let peripheral = self.connected_peripheral()?;
        bounded(
            "set notify",
            self.config.read_timeout,
            peripheral.set_notify(characteristic, enable),
        )
        .await
    }

    async fn read(&self, characteristic: &CharacteristicOf<R>) -> Result<Vec<u8>> {
        let peripheral = self.connected_peripheral()?;
        let uuid = characteristic.uuid();
        match timeout(self.config.read_timeout, peripheral.read(characteristic)).await {
            Err(_) => Err(Error::timeout(
                format!("read characteristic {}", describe(&uuid)),
                self.config.read_timeout,
            )),
            Ok(Err(e)) => Err(Error::ReadFailed {
                uuid,
                reason: e.to_string(),
            }),
            Ok(Ok(data)) => Ok(data),
        }
    }

    /// Start a scan session unless one is running or a peripheral is bound.
    async fn ensure_discovery(self: &Arc<Self>) -> Result<()> {
        let (session, generation) = {
            let mut inner = self.lock();
            if inner.initing || inner.peripheral.is_some() {
                trace!("discovery already in flight");
                return Ok(());
            }
            inner.initing = true;
            inner.generation += 1;
            let session = CancellationToken::new();
            inner.session = Some(session.clone());
            self.set_state(&mut inner, ConnectionState::Scanning);
            (session, inner.generation)
        };

        info!("Looking for device: {}", self.target.uuid());
        if let Err(e) = self.begin_session(session, generation).await {
            let mut inner = self.lock();
            if inner.generation == generation {
                self.invalidate(&mut inner, ConnectionState::Idle);
            }
            return Err(e);
        }
        Ok(())
    }

    async fn begin_session(self: &Arc<Self>, session: CancellationToken, generation: u64) -> Result<()> {
        let events = self.radio.events().await?;
        let adapter_state = self.radio.state().await?;
        self.log_adapter_state(adapter_state);

        if adapter_state == AdapterState::PoweredOn {
            self.radio.start_scan(&[], false).await?;
            if session.is_cancelled() {
                self.radio.stop_scan().await?;
                return Ok(());
            }
        }

        let shared = Arc::clone(self);
        let handle = tokio::spawn(async move { shared.pump(events, session, generation).await });
        let mut inner = self.lock();
        if inner.generation == generation {
            inner.tasks.push(handle);
        }
        Ok(())
    }

    fn log_adapter_state(&self, state: AdapterState) {
        if self.target.verbose_logging() {
            info!("Adapter state: {}", state);
        } else {
            debug!("Adapter state: {}", state);
        }
    }

    /// Consume radio events for one scan session.
    async fn pump(
        self: Arc<Self>,
        mut events: BoxStream<'static, RadioEvent<PeripheralOf<R>>>,
        session: CancellationToken,
        generation: u64,
    ) {
        loop {
            let event = tokio::select! {
                _ = session.cancelled() => break,
                event = events.next() => match event {
                    Some(event) => event,
                    None => {
                        warn!("Radio event stream ended");
                        break;
                    }
                },
            };

            match event {
                RadioEvent::StateChange(state) => self.on_adapter_state(state).await,
                RadioEvent::Discovered {
                    peripheral,
                    advertisement,
                } => self.on_discovered(peripheral, advertisement),
                RadioEvent::Disconnected { id } => {
                    if self.on_disconnected(&id) {
                        break;
                    }
                }
            }
        }
        trace!(generation, "radio event pump finished");
    }

    async fn on_adapter_state(&self, state: AdapterState) {
        self.log_adapter_state(state);
        let scanning = self.lock().state == ConnectionState::Scanning;
        let result = match state {
            AdapterState::PoweredOn if scanning => self.radio.start_scan(&[], false).await,
            AdapterState::PoweredOn => Ok(()),
            _ => self.radio.stop_scan().await,
        };
        if let Err(e) = result {
            warn!("Failed to follow adapter state {}: {}", state, e);
            self.events.send(DeviceEvent::Error {
                error: e.to_string(),
            });
        }
    }

    fn matches_target(&self, advertisement: &Advertisement) -> bool {
        let target = self.target.uuid();
        identifiers_match(target, &advertisement.id)
            || advertisement
                .address
                .as_deref()
                .is_some_and(|address| identifiers_match(target, address))
    }

    fn on_discovered(self: &Arc<Self>, peripheral: PeripheralOf<R>, advertisement: Advertisement) {
        if !self.matches_target(&advertisement) {
            trace!("ignoring advertisement from {}", advertisement.id);
            return;
        }

        let generation = {
            let mut inner = self.lock();
            if inner.state != ConnectionState::Scanning || inner.peripheral.is_some() {
                return;
            }
            inner.generation += 1;
            inner.peripheral = Some(peripheral.clone());
            self.set_state(&mut inner, ConnectionState::Connecting);
            inner.generation
        };

        if self.target.verbose_logging() {
            info!("Found target:\n{}", advertisement);
        } else {
            debug!("Found target:\n{}", advertisement);
        }
        self.events.send(DeviceEvent::Discovered {
            id: advertisement.id.clone(),
            local_name: advertisement.local_name.clone(),
            rssi: advertisement.rssi,
        });

        let shared = Arc::clone(self);
        tokio::spawn(async move { shared.run_discovery(peripheral, generation).await });
    }

    /// Returns `true` if the bound peripheral was the one that disconnected.
    fn on_disconnected(&self, id: &str) -> bool {
        let mut inner = self.lock();
        if !inner.peripheral.as_ref().is_some_and(|p| p.id() == id) {
            return false;
        }
        info!("Device {} disconnected", id);
        self.invalidate(&mut inner, ConnectionState::Disconnected);
        self.events.send(DeviceEvent::Disconnected { id: id.to_string() });
        true
    }

    async fn run_discovery(self: Arc<Self>, peripheral: PeripheralOf<R>, generation: u64) {
        let Err(e) = self.discover(&peripheral, generation).await else {
            return;
        };

        if matches!(e, Error::Superseded) {
            debug!("Discarding stale discovery completion for {}", peripheral.id());
            // A connect that resolved after the attempt was abandoned leaves a live link.
            let rebound = self
                .lock()
                .peripheral
                .as_ref()
                .is_some_and(|bound| bound.id() == peripheral.id());
            if !rebound {
                if let Err(e) = peripheral.disconnect().await {
                    debug!("Releasing stale connection failed: {}", e);
                }
            }
            return;
        }

        if e.is_missing_attribute() {
            let current = {
                let mut inner = self.lock();
                let current = inner.generation == generation;
                if current {
                    inner.initing = false;
                }
                current
            };
            if current {
                warn!("{}", e);
                self.events.send(DeviceEvent::Error {
                    error: e.to_string(),
                });
            }
            return;
        }

        let current = {
            let mut inner = self.lock();
            let current = inner.generation == generation;
            if current {
                self.invalidate(&mut inner, ConnectionState::Disconnected);
            }
            current
        };
        if current {
            warn!("Discovery failed for {}: {}", peripheral.id(), e);
            self.events.send(DeviceEvent::Error {
                error: e.to_string(),
            });
            if let Err(e) = peripheral.disconnect().await {
                debug!("Cleanup disconnect failed: {}", e);
            }
        }
    }

    /// Connect, resolve services and characteristics, and subscribe.
    async fn discover(self: &Arc<Self>, peripheral: &PeripheralOf<R>, generation: u64) -> Result<()> {
        if let Err(e) = self.radio.stop_scan().await {
            warn!("Failed to stop scanning: {}", e);
        }

        info!("Connecting to {}...", peripheral.id());
        bounded(
            "connect to device",
            self.config.connection_timeout,
            peripheral.connect(),
        )
        .await?;
        self.advance(generation, ConnectionState::DiscoveringServices)?;
        info!("Connected!");
        self.events.send(DeviceEvent::Connected {
            id: peripheral.id().to_string(),
        });

        let services = bounded(
            "discover services",
            self.config.discovery_timeout,
            peripheral.discover_services(&[
                Capability::HeartRate.service_uuid(),
                Capability::Battery.service_uuid(),
            ]),
        )
        .await?;
        self.advance(generation, ConnectionState::DiscoveringCharacteristics)?;
        for service in &services {
            if self.target.verbose_logging() {
                info!("Service: {}", describe(&service.uuid()));
            } else {
                debug!("Service: {}", describe(&service.uuid()));
            }
        }

        let heart_rate_service = resolve(&services, Capability::HeartRate.service_uuid())
            .ok_or(Error::ServiceNotFound {
                name: Capability::HeartRate.service_name(),
                uuid: Capability::HeartRate.service_uuid(),
            })?
            .clone();
        let battery_service = resolve(&services, Capability::Battery.service_uuid()).cloned();

        let characteristics = bounded(
            "discover heart rate characteristics",
            self.config.discovery_timeout,
            peripheral.discover_characteristics(
                &heart_rate_service,
                &[
                    Capability::HeartRate.characteristic_uuid(),
                    Capability::BodySensorLocation.characteristic_uuid(),
                ],
            ),
        )
        .await?;
        self.guard(generation)?;

        let measurement = resolve(&characteristics, Capability::HeartRate.characteristic_uuid())
            .ok_or(Error::CharacteristicNotFound {
                name: Capability::HeartRate.name(),
                uuid: Capability::HeartRate.characteristic_uuid(),
            })?
            .clone();
        let notifications = peripheral.notifications().await?;
        self.bind_heart_rate(measurement.clone(), notifications, generation)?;

        if self.lock().notify_wanted {
            if let Err(e) = self.set_notify(&measurement, true).await {
                self.guard(generation)?;
                warn!("Failed to enable heart rate notifications: {}", e);
                self.events.send(DeviceEvent::Error {
                    error: e.to_string(),
                });
            }
        }

        match resolve(
            &characteristics,
            Capability::BodySensorLocation.characteristic_uuid(),
        ) {
            Some(location) => {
                self.mark_ready(Capability::BodySensorLocation, location.clone(), generation)?
            }
            None => debug!("Peripheral has no Body Sensor Location characteristic"),
        }

        match battery_service {
            Some(service) => {
                let discovered = bounded(
                    "discover battery characteristics",
                    self.config.discovery_timeout,
                    peripheral.discover_characteristics(
                        &service,
                        &[Capability::Battery.characteristic_uuid()],
                    ),
                )
                .await;
                self.guard(generation)?;
                match discovered {
                    Ok(characteristics) => match resolve(
                        &characteristics,
                        Capability::Battery.characteristic_uuid(),
                    ) {
                        Some(level) => {
                            self.mark_ready(Capability::Battery, level.clone(), generation)?
                        }
                        None => debug!("Battery service has no Battery Level characteristic"),
                    },
                    Err(e) => warn!("Battery characteristic discovery failed: {}", e),
                }
            }
            None => debug!("Peripheral has no Battery service"),
        }

        let mut inner = self.lock();
        if inner.generation != generation {
            return Err(Error::Superseded);
        }
        inner.initing = false;
        Ok(())
    }

    /// Resolve heart rate and start forwarding its notifications.
    fn bind_heart_rate(
        self: &Arc<Self>,
        measurement: CharacteristicOf<R>,
        notifications: BoxStream<'static, Notification>,
        generation: u64,
    ) -> Result<()> {
        let mut inner = self.lock();
        if inner.generation != generation {
            return Err(Error::Superseded);
        }

        let shared = Arc::clone(self);
        let handle = tokio::spawn(async move {
            shared.forward_samples(notifications, generation).await;
        });
        inner.tasks.push(handle);

        self.heart_rate.resolve(measurement);
        self.set_state(&mut inner, ConnectionState::Ready);
        self.events.send(DeviceEvent::Ready {
            capability: Capability::HeartRate,
        });
        Ok(())
    }

    fn mark_ready(
        &self,
        capability: Capability,
        characteristic: CharacteristicOf<R>,
        generation: u64,
    ) -> Result<()> {
        let inner = self.lock();
        if inner.generation != generation {
            return Err(Error::Superseded);
        }
        self.slot(capability).resolve(characteristic);
        self.events.send(DeviceEvent::Ready { capability });
        Ok(())
    }

    async fn forward_samples(
        &self,
        mut notifications: BoxStream<'static, Notification>,
        generation: u64,
    ) {
        while let Some(notification) = notifications.next().await {
            if notification.uuid != HEART_RATE_MEASUREMENT {
                continue;
            }

            {
                let inner = self.lock();
                if inner.generation != generation {
                    break;
                }
                if !inner.notify_wanted {
                    trace!("paused, dropping sample");
                    continue;
                }
            }

            match decode_heart_rate(&notification.value) {
                Some(bpm) => {
                    trace!(
                        bpm,
                        contact = ?measurement::flags(&notification.value).and_then(|f| f.sensor_contact()),
                        "heart rate sample"
                    );
                    self.events.send(DeviceEvent::Data { bpm });
                }
                None => debug!(
                    "Dropping unsupported heart rate payload {:02x?}",
                    notification.value
                ),
            }
        }
    }
}
