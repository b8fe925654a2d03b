//! btleplug-backed [`Radio`] implementation.

use std::fmt;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CentralState, Characteristic, Manager as _, Peripheral as _,
    PeripheralProperties, ScanFilter, Service,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use futures::stream::BoxStream;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::radio::{
    AdapterState, Advertisement, GattAttribute, Notification, Radio, RadioEvent, RadioPeripheral,
};
use crate::util::{format_peripheral_id, is_placeholder_address};

/// Get the first available Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters
        .into_iter()
        .next()
        .ok_or_else(|| Error::radio("no Bluetooth adapter found"))
}

impl From<CentralState> for AdapterState {
    fn from(state: CentralState) -> Self {
        match state {
            CentralState::PoweredOn => AdapterState::PoweredOn,
            CentralState::PoweredOff => AdapterState::PoweredOff,
            _ => AdapterState::Unknown,
        }
    }
}

impl GattAttribute for Service {
    fn uuid(&self) -> Uuid {
        self.uuid
    }
}

impl GattAttribute for Characteristic {
    fn uuid(&self) -> Uuid {
        self.uuid
    }
}

/// A host Bluetooth adapter driven through btleplug.
#[derive(Clone)]
pub struct BtleplugRadio {
    adapter: Adapter,
}

impl fmt::Debug for BtleplugRadio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BtleplugRadio").finish_non_exhaustive()
    }
}

impl BtleplugRadio {
    /// Use the first adapter the platform reports.
    pub async fn new() -> Result<Self> {
        Ok(Self::from_adapter(get_adapter().await?))
    }

    pub fn from_adapter(adapter: Adapter) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Wrap every peripheral the adapter currently knows about.
    pub async fn peripherals(&self) -> Result<Vec<(BtleplugPeripheral, Advertisement)>> {
        let mut found = Vec::new();
        for peripheral in self.adapter.peripherals().await? {
            if let Some(entry) = describe_peripheral(peripheral).await {
                found.push(entry);
            }
        }
        Ok(found)
    }
}

fn to_advertisement(id: String, properties: PeripheralProperties) -> Advertisement {
    let address = properties.address.to_string();
    Advertisement {
        id,
        address: (!is_placeholder_address(&address)).then_some(address),
        local_name: properties.local_name,
        tx_power_level: properties.tx_power_level,
        rssi: properties.rssi,
        manufacturer_data: properties.manufacturer_data,
        service_data: properties.service_data,
        service_uuids: properties.services,
    }
}

async fn describe_peripheral(peripheral: Peripheral) -> Option<(BtleplugPeripheral, Advertisement)> {
    let properties = match peripheral.properties().await {
        Ok(Some(properties)) => properties,
        Ok(None) => return None,
        Err(e) => {
            debug!("Error reading peripheral properties: {}", e);
            return None;
        }
    };
    let peripheral = BtleplugPeripheral::new(peripheral);
    let advertisement = to_advertisement(peripheral.id.clone(), properties);
    Some((peripheral, advertisement))
}

async fn translate(adapter: Adapter, event: CentralEvent) -> Option<RadioEvent<BtleplugPeripheral>> {
    match event {
        CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
            let peripheral = match adapter.peripheral(&id).await {
                Ok(peripheral) => peripheral,
                Err(e) => {
                    debug!("Discovered peripheral vanished: {}", e);
                    return None;
                }
            };
            let (peripheral, advertisement) = describe_peripheral(peripheral).await?;
            Some(RadioEvent::Discovered {
                peripheral,
                advertisement,
            })
        }
        CentralEvent::DeviceDisconnected(id) => Some(RadioEvent::Disconnected {
            id: format_peripheral_id(&id),
        }),
        CentralEvent::StateUpdate(state) => Some(RadioEvent::StateChange(state.into())),
        _ => None,
    }
}

#[async_trait]
impl Radio for BtleplugRadio {
    type Peripheral = BtleplugPeripheral;

    async fn state(&self) -> Result<AdapterState> {
        Ok(self.adapter.adapter_state().await?.into())
    }

    async fn start_scan(&self, service_filter: &[Uuid], allow_duplicates: bool) -> Result<()> {
        if allow_duplicates {
            // btleplug always reports repeated advertisements as DeviceUpdated.
            debug!("allow_duplicates has no effect on this backend");
        }
        info!("Starting BLE scan");
        self.adapter
            .start_scan(ScanFilter {
                services: service_filter.to_vec(),
            })
            .await?;
        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        self.adapter.stop_scan().await?;
        Ok(())
    }

    async fn events(&self) -> Result<BoxStream<'static, RadioEvent<BtleplugPeripheral>>> {
        let adapter = self.adapter.clone();
        let events = self.adapter.events().await?;
        Ok(events
            .filter_map(move |event| translate(adapter.clone(), event))
            .boxed())
    }
}

/// A btleplug peripheral with its identifier resolved up front.
#[derive(Clone)]
pub struct BtleplugPeripheral {
    peripheral: Peripheral,
    id: String,
}

impl fmt::Debug for BtleplugPeripheral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BtleplugPeripheral")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl BtleplugPeripheral {
    pub fn new(peripheral: Peripheral) -> Self {
        let id = format_peripheral_id(&peripheral.id());
        Self { peripheral, id }
    }

    pub fn inner(&self) -> &Peripheral {
        &self.peripheral
    }
}

#[async_trait]
impl RadioPeripheral for BtleplugPeripheral {
    type Service = Service;
    type Characteristic = Characteristic;

    fn id(&self) -> &str {
        &self.id
    }

    async fn connect(&self) -> Result<()> {
        if !self.peripheral.is_connected().await? {
            self.peripheral.connect().await?;
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.peripheral.disconnect().await?;
        Ok(())
    }

    async fn discover_services(&self, uuids: &[Uuid]) -> Result<Vec<Service>> {
        self.peripheral.discover_services().await?;
        Ok(self
            .peripheral
            .services()
            .into_iter()
            .filter(|service| uuids.is_empty() || uuids.contains(&service.uuid))
            .collect())
    }

    async fn discover_characteristics(
        &self,
        service: &Service,
        uuids: &[Uuid],
    ) -> Result<Vec<Characteristic>> {
        Ok(service
            .characteristics
            .iter()
            .filter(|characteristic| uuids.is_empty() || uuids.contains(&characteristic.uuid))
            .cloned()
            .collect())
    }

    async fn read(&self, characteristic: &Characteristic) -> Result<Vec<u8>> {
        Ok(self.peripheral.read(characteristic).await?)
    }

    async fn set_notify(&self, characteristic: &Characteristic, enable: bool) -> Result<()> {
        if enable {
            self.peripheral.subscribe(characteristic).await?;
        } else {
            self.peripheral.unsubscribe(characteristic).await?;
        }
        Ok(())
    }

    async fn notifications(&self) -> Result<BoxStream<'static, Notification>> {
        let stream = self.peripheral.notifications().await?;
        Ok(stream
            .map(|notification| Notification {
                uuid: notification.uuid,
                value: notification.value,
            })
            .boxed())
    }
}
