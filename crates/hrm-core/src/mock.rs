//! Scriptable in-memory radio for testing.
//!
//! [`MockRadio`] implements [`Radio`] without any Bluetooth hardware. Tests
//! register [`MockPeripheral`]s, then drive the adapter by hand:
//! advertising a peripheral, dropping its connection, flipping the adapter
//! power state or pushing notification payloads.
//!
//! # Features
//!
//! - **Configurable GATT layout**: remove services or characteristics to
//!   simulate incomplete devices
//! - **Failure injection**: fail connects or reads
//! - **Discovery gating**: hold service discovery open to race it against a
//!   disconnect
//! - **Counters**: scans, connects and notify toggles are recorded

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use tokio::sync::{Notify, broadcast};
use uuid::Uuid;

use hrm_types::uuids::{
    BATTERY_LEVEL, BATTERY_SERVICE, BODY_SENSOR_LOCATION, HEART_RATE_MEASUREMENT,
    HEART_RATE_SERVICE,
};

use crate::error::{Error, Result};
use crate::radio::{
    AdapterState, Advertisement, GattAttribute, Notification, Radio, RadioEvent, RadioPeripheral,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Turn a broadcast receiver into a stream, skipping over lag.
fn receiver_stream<T: Clone + Send + 'static>(
    receiver: broadcast::Receiver<T>,
) -> BoxStream<'static, T> {
    stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(item) => return Some((item, receiver)),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockService {
    uuid: Uuid,
}

impl GattAttribute for MockService {
    fn uuid(&self) -> Uuid {
        self.uuid
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCharacteristic {
    uuid: Uuid,
    service: Uuid,
}

impl MockCharacteristic {
    pub fn service(&self) -> Uuid {
        self.service
    }
}

impl GattAttribute for MockCharacteristic {
    fn uuid(&self) -> Uuid {
        self.uuid
    }
}

struct PeripheralState {
    id: String,
    local_name: Option<String>,
    /// Service UUID to the characteristic UUIDs it carries.
    layout: Vec<(Uuid, Vec<Uuid>)>,
    values: Mutex<HashMap<Uuid, Vec<u8>>>,
    notifying: Mutex<HashSet<Uuid>>,
    notifications: broadcast::Sender<Notification>,
    connected: AtomicBool,
    fail_connect: AtomicBool,
    fail_reads: AtomicBool,
    connect_count: AtomicU32,
    disconnect_count: AtomicU32,
    service_discovery_count: AtomicU32,
    notify_calls: AtomicU32,
    discovery_gate: Mutex<Option<Arc<Notify>>>,
    connect_gate: Mutex<Option<Arc<Notify>>>,
}

/// A fake heart rate strap.
#[derive(Clone)]
pub struct MockPeripheral {
    state: Arc<PeripheralState>,
}

impl fmt::Debug for MockPeripheral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockPeripheral")
            .field("id", &self.state.id)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Builder for [`MockPeripheral`].
#[derive(Debug, Clone)]
pub struct MockPeripheralBuilder {
    id: String,
    local_name: Option<String>,
    layout: Vec<(Uuid, Vec<Uuid>)>,
    values: HashMap<Uuid, Vec<u8>>,
}

impl MockPeripheralBuilder {
    pub fn local_name(mut self, name: impl Into<String>) -> Self {
        self.local_name = Some(name.into());
        self
    }

    /// Remove a whole service.
    pub fn without_service(mut self, service: Uuid) -> Self {
        self.layout.retain(|(uuid, _)| *uuid != service);
        self
    }

    /// Remove a characteristic from whichever service carries it.
    pub fn without_characteristic(mut self, characteristic: Uuid) -> Self {
        for (_, characteristics) in &mut self.layout {
            characteristics.retain(|uuid| *uuid != characteristic);
        }
        self
    }

    /// Set the value returned by reads of `characteristic`.
    pub fn value(mut self, characteristic: Uuid, value: impl Into<Vec<u8>>) -> Self {
        self.values.insert(characteristic, value.into());
        self
    }

    pub fn build(self) -> MockPeripheral {
        let (notifications, _) = broadcast::channel(64);
        MockPeripheral {
            state: Arc::new(PeripheralState {
                id: self.id,
                local_name: self.local_name,
                layout: self.layout,
                values: Mutex::new(self.values),
                notifying: Mutex::new(HashSet::new()),
                notifications,
                connected: AtomicBool::new(false),
                fail_connect: AtomicBool::new(false),
                fail_reads: AtomicBool::new(false),
                connect_count: AtomicU32::new(0),
                disconnect_count: AtomicU32::new(0),
                service_discovery_count: AtomicU32::new(0),
                notify_calls: AtomicU32::new(0),
                discovery_gate: Mutex::new(None),
                connect_gate: Mutex::new(None),
            }),
        }
    }
}

impl MockPeripheral {
    /// A complete strap: Heart Rate (measurement and chest location) plus
    /// Battery at 85%.
    pub fn builder(id: impl Into<String>) -> MockPeripheralBuilder {
        MockPeripheralBuilder {
            id: id.into(),
            local_name: Some("Mock HRM".to_string()),
            layout: vec![
                (
                    HEART_RATE_SERVICE,
                    vec![HEART_RATE_MEASUREMENT, BODY_SENSOR_LOCATION],
                ),
                (BATTERY_SERVICE, vec![BATTERY_LEVEL]),
            ],
            values: HashMap::from([(BODY_SENSOR_LOCATION, vec![1]), (BATTERY_LEVEL, vec![85])]),
        }
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self::builder(id).build()
    }

    pub fn advertisement(&self) -> Advertisement {
        Advertisement {
            id: self.state.id.clone(),
            address: Some(self.state.id.clone()),
            local_name: self.state.local_name.clone(),
            rssi: Some(-60),
            service_uuids: self.state.layout.iter().map(|(uuid, _)| *uuid).collect(),
            ..Default::default()
        }
    }

    /// Deliver a value for `characteristic`, whether or not it is subscribed.
    pub fn push_notification(&self, characteristic: Uuid, value: impl Into<Vec<u8>>) {
        let _ = self.state.notifications.send(Notification {
            uuid: characteristic,
            value: value.into(),
        });
    }

    pub fn set_value(&self, characteristic: Uuid, value: impl Into<Vec<u8>>) {
        lock(&self.state.values).insert(characteristic, value.into());
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.state.fail_connect.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.state.fail_reads.store(fail, Ordering::Relaxed);
    }

    /// Make the next service discovery wait for [`Self::release_service_discovery`].
    pub fn hold_service_discovery(&self) {
        *lock(&self.state.discovery_gate) = Some(Arc::new(Notify::new()));
    }

    pub fn release_service_discovery(&self) {
        if let Some(gate) = lock(&self.state.discovery_gate).take() {
            gate.notify_one();
        }
    }

    /// Make the next connect wait for [`Self::release_connect`].
    pub fn hold_connect(&self) {
        *lock(&self.state.connect_gate) = Some(Arc::new(Notify::new()));
    }

    pub fn release_connect(&self) {
        if let Some(gate) = lock(&self.state.connect_gate).take() {
            gate.notify_one();
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Relaxed)
    }

    pub fn is_notifying(&self, characteristic: Uuid) -> bool {
        lock(&self.state.notifying).contains(&characteristic)
    }

    pub fn connect_count(&self) -> u32 {
        self.state.connect_count.load(Ordering::Relaxed)
    }

    pub fn disconnect_count(&self) -> u32 {
        self.state.disconnect_count.load(Ordering::Relaxed)
    }

    pub fn service_discovery_count(&self) -> u32 {
        self.state.service_discovery_count.load(Ordering::Relaxed)
    }

    /// Number of subscribe/unsubscribe calls.
    pub fn notify_calls(&self) -> u32 {
        self.state.notify_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RadioPeripheral for MockPeripheral {
    type Service = MockService;
    type Characteristic = MockCharacteristic;

    fn id(&self) -> &str {
        &self.state.id
    }

    async fn connect(&self) -> Result<()> {
        self.state.connect_count.fetch_add(1, Ordering::Relaxed);
        if self.state.fail_connect.load(Ordering::Relaxed) {
            return Err(Error::radio("mock connect failure"));
        }
        let gate = lock(&self.state.connect_gate).clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.state.connected.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.state.disconnect_count.fetch_add(1, Ordering::Relaxed);
        self.state.connected.store(false, Ordering::Relaxed);
        lock(&self.state.notifying).clear();
        Ok(())
    }

    async fn discover_services(&self, uuids: &[Uuid]) -> Result<Vec<MockService>> {
        self.state
            .service_discovery_count
            .fetch_add(1, Ordering::Relaxed);
        let gate = lock(&self.state.discovery_gate).clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        Ok(self
            .state
            .layout
            .iter()
            .filter(|(uuid, _)| uuids.is_empty() || uuids.contains(uuid))
            .map(|(uuid, _)| MockService { uuid: *uuid })
            .collect())
    }

    async fn discover_characteristics(
        &self,
        service: &MockService,
        uuids: &[Uuid],
    ) -> Result<Vec<MockCharacteristic>> {
        Ok(self
            .state
            .layout
            .iter()
            .filter(|(uuid, _)| *uuid == service.uuid)
            .flat_map(|(_, characteristics)| characteristics.iter().copied())
            .filter(|uuid| uuids.is_empty() || uuids.contains(uuid))
            .map(|uuid| MockCharacteristic {
                uuid,
                service: service.uuid,
            })
            .collect())
    }

    async fn read(&self, characteristic: &MockCharacteristic) -> Result<Vec<u8>> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        if self.state.fail_reads.load(Ordering::Relaxed) {
            return Err(Error::radio("mock read failure"));
        }
        Ok(lock(&self.state.values)
            .get(&characteristic.uuid)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_notify(&self, characteristic: &MockCharacteristic, enable: bool) -> Result<()> {
        self.state.notify_calls.fetch_add(1, Ordering::Relaxed);
        let mut notifying = lock(&self.state.notifying);
        if enable {
            notifying.insert(characteristic.uuid);
        } else {
            notifying.remove(&characteristic.uuid);
        }
        Ok(())
    }

    async fn notifications(&self) -> Result<BoxStream<'static, Notification>> {
        Ok(receiver_stream(self.state.notifications.subscribe()))
    }
}

/// A fake Bluetooth adapter.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use hrm_core::mock::{MockPeripheral, MockRadio};
/// use hrm_core::HeartRateMonitor;
///
/// #[tokio::main]
/// async fn main() {
///     let radio = Arc::new(MockRadio::new());
///     let strap = radio.add_peripheral(MockPeripheral::new("AA:BB"));
///     let monitor = HeartRateMonitor::new(Arc::clone(&radio), "AA:BB").unwrap();
///
///     monitor.start().await.unwrap();
///     radio.advertise("AA:BB");
///     assert_eq!(monitor.get_battery_level().await.unwrap(), 85);
///     assert!(strap.is_connected());
/// }
/// ```
pub struct MockRadio {
    state: Mutex<AdapterState>,
    events: broadcast::Sender<RadioEvent<MockPeripheral>>,
    peripherals: Mutex<HashMap<String, MockPeripheral>>,
    scanning: AtomicBool,
    scan_count: AtomicU32,
    stop_scan_count: AtomicU32,
}

impl fmt::Debug for MockRadio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockRadio")
            .field("state", &*lock(&self.state))
            .field("scanning", &self.is_scanning())
            .field("peripherals", &lock(&self.peripherals).len())
            .finish()
    }
}

impl Default for MockRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRadio {
    /// A powered-on adapter with no peripherals.
    pub fn new() -> Self {
        Self::with_state(AdapterState::PoweredOn)
    }

    pub fn with_state(state: AdapterState) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state: Mutex::new(state),
            events,
            peripherals: Mutex::new(HashMap::new()),
            scanning: AtomicBool::new(false),
            scan_count: AtomicU32::new(0),
            stop_scan_count: AtomicU32::new(0),
        }
    }

    /// Register a peripheral; returns a handle sharing its state.
    pub fn add_peripheral(&self, peripheral: MockPeripheral) -> MockPeripheral {
        lock(&self.peripherals).insert(peripheral.state.id.clone(), peripheral.clone());
        peripheral
    }

    pub fn peripheral(&self, id: &str) -> Option<MockPeripheral> {
        lock(&self.peripherals).get(id).cloned()
    }

    /// Emit a discovery event for a registered peripheral.
    ///
    /// Returns `false` if no peripheral with that id is registered.
    pub fn advertise(&self, id: &str) -> bool {
        let Some(peripheral) = self.peripheral(id) else {
            return false;
        };
        let advertisement = peripheral.advertisement();
        let _ = self.events.send(RadioEvent::Discovered {
            peripheral,
            advertisement,
        });
        true
    }

    /// Drop the connection of a registered peripheral from the device side.
    pub fn emit_disconnect(&self, id: &str) {
        if let Some(peripheral) = self.peripheral(id) {
            peripheral.state.connected.store(false, Ordering::Relaxed);
            lock(&peripheral.state.notifying).clear();
        }
        let _ = self.events.send(RadioEvent::Disconnected { id: id.to_string() });
    }

    /// Change the adapter power state and announce it.
    pub fn set_state(&self, state: AdapterState) {
        *lock(&self.state) = state;
        if state != AdapterState::PoweredOn {
            self.scanning.store(false, Ordering::Relaxed);
        }
        let _ = self.events.send(RadioEvent::StateChange(state));
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Relaxed)
    }

    /// Number of `start_scan` calls.
    pub fn scan_count(&self) -> u32 {
        self.scan_count.load(Ordering::Relaxed)
    }

    pub fn stop_scan_count(&self) -> u32 {
        self.stop_scan_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Radio for MockRadio {
    type Peripheral = MockPeripheral;

    async fn state(&self) -> Result<AdapterState> {
        Ok(*lock(&self.state))
    }

    async fn start_scan(&self, _service_filter: &[Uuid], _allow_duplicates: bool) -> Result<()> {
        if *lock(&self.state) != AdapterState::PoweredOn {
            return Err(Error::radio("adapter is not powered on"));
        }
        self.scan_count.fetch_add(1, Ordering::Relaxed);
        self.scanning.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        self.stop_scan_count.fetch_add(1, Ordering::Relaxed);
        self.scanning.store(false, Ordering::Relaxed);
        Ok(())
    }

    async fn events(&self) -> Result<BoxStream<'static, RadioEvent<MockPeripheral>>> {
        Ok(receiver_stream(self.events.subscribe()))
    }
}
