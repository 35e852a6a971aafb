//! [`Transport`] over the platform BLE stack via `btleplug`.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::{Stream, StreamExt};
use stream_cancel::{Trigger, Valved};
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::{
    CharacteristicDescriptor, ConnectionEvents, DeviceHandle, DeviceStream, GattEvent,
    ServiceDescriptor, Transport, TransportError,
};

pub struct BtleTransport {
    _manager:    Manager,
    adapter:     Adapter,
    /// Peripherals seen by the scan, by device id
    peripherals: Arc<Mutex<HashMap<String, Peripheral>>>,
    /// Event queues of the connections opened so far, by device id
    connections: Mutex<HashMap<String, UnboundedSender<GattEvent>>>,
    scan_stopper: Mutex<Option<Trigger>>,
}

impl BtleTransport {
    /// Use the first bluetooth adapter.
    pub async fn new() -> Result<Self, TransportError> {
        Self::with_adapter_index(0).await
    }

    /// Use the bluetooth adapter at `index`.
    pub async fn with_adapter_index(index: usize) -> Result<Self, TransportError> {
        let manager = Manager::new().await?;
        let mut adapters = manager.adapters().await?;

        if index >= adapters.len() {
            return Err(TransportError::AdapterNotFound(index));
        }

        let adapter = adapters.swap_remove(index);

        log::trace!("Using adapter: {:?}", adapter);

        Ok(Self {
            _manager: manager,
            adapter,
            peripherals: Arc::new(Mutex::new(HashMap::new())),
            connections: Mutex::new(HashMap::new()),
            scan_stopper: Mutex::new(None),
        })
    }

    /// Disconnect from the device and drop its event queue.
    pub async fn disconnect(&self, device: &DeviceHandle) -> Result<(), TransportError> {
        let peripheral = self.peripheral(device)?;
        self.connections.lock().unwrap().remove(device.id());

        if peripheral.is_connected().await? {
            log::debug!("Disconnecting from {}", device.address());
            peripheral.disconnect().await?;
        }

        Ok(())
    }

    fn peripheral(&self, device: &DeviceHandle) -> Result<Peripheral, TransportError> {
        self.peripherals
            .lock()
            .unwrap()
            .get(device.id())
            .cloned()
            .ok_or_else(|| TransportError::UnknownDevice(device.id().to_owned()))
    }

    fn sender(&self, device: &DeviceHandle) -> Result<UnboundedSender<GattEvent>, TransportError> {
        self.connections
            .lock()
            .unwrap()
            .get(device.id())
            .cloned()
            .ok_or_else(|| TransportError::NotConnected(device.id().to_owned()))
    }
}

#[async_trait]
impl Transport for BtleTransport {
    async fn start_scan(&self) -> Result<DeviceStream, TransportError> {
        log::info!("Starting the scan");

        let events = self.adapter.events().await?;
        self.adapter.start_scan(ScanFilter::default()).await?;

        let adapter = self.adapter.clone();
        let peripherals = self.peripherals.clone();

        let devices: DeviceStream = Box::pin(events.filter_map(move |event| {
            let adapter = adapter.clone();
            let peripherals = peripherals.clone();

            async move {
                let peripheral_id = match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                    _ => return None,
                };

                let peripheral = adapter.peripheral(&peripheral_id).await.ok()?;
                let device = describe(&peripheral).await;

                log::trace!("Device discovered: {:?}", device);

                peripherals
                    .lock()
                    .unwrap()
                    .insert(device.id().to_owned(), peripheral);

                Some(device)
            }
        }));

        let (stopper, devices) = Valved::new(devices);
        *self.scan_stopper.lock().unwrap() = Some(stopper);

        Ok(Box::pin(devices))
    }

    async fn stop_scan(&self) -> Result<(), TransportError> {
        let stopper = self.scan_stopper.lock().unwrap().take();

        if stopper.is_none() {
            log::info!("Scanner is already stopped");
            return Ok(());
        }

        // Dropping the trigger closes the device stream.
        drop(stopper);
        self.adapter.stop_scan().await?;

        Ok(())
    }

    async fn connect(&self, device: &DeviceHandle) -> Result<ConnectionEvents, TransportError> {
        let peripheral = self.peripheral(device)?;
        let (sender, events) = mpsc::unbounded_channel();

        // Subscribe before connecting so an early disconnect is not missed.
        let central_events = self.adapter.events().await?;
        tokio::spawn(watch_disconnect(
            peripheral.id(),
            central_events,
            sender.clone(),
        ));

        self.connections
            .lock()
            .unwrap()
            .insert(device.id().to_owned(), sender.clone());

        log::debug!("Connecting to device {}", peripheral.address());

        tokio::spawn(async move {
            let event = match peripheral.connect().await {
                Ok(()) => GattEvent::Connected,
                Err(e) => {
                    log::warn!("Could not connect to {}: {:?}", peripheral.address(), e);
                    GattEvent::ConnectFailed(e.to_string())
                }
            };
            sender.send(event).ok();
        });

        Ok(events)
    }

    async fn discover_services(&self, device: &DeviceHandle) -> Result<(), TransportError> {
        let peripheral = self.peripheral(device)?;
        let sender = self.sender(device)?;

        log::debug!("Discovering services for {}", peripheral.address());

        tokio::spawn(async move {
            let event = match peripheral.discover_services().await {
                Ok(()) => GattEvent::ServicesDiscovered(
                    peripheral
                        .services()
                        .iter()
                        .map(ServiceDescriptor::from)
                        .collect::<Vec<_>>(),
                ),
                Err(e) => GattEvent::DiscoveryFailed(e.to_string()),
            };
            sender.send(event).ok();
        });

        Ok(())
    }

    async fn read_characteristic(
        &self,
        device: &DeviceHandle,
        characteristic: &CharacteristicDescriptor,
    ) -> Result<(), TransportError> {
        let peripheral = self.peripheral(device)?;
        let sender = self.sender(device)?;

        let target = peripheral
            .characteristics()
            .into_iter()
            .find(|c| {
                c.uuid == characteristic.uuid() && c.service_uuid == characteristic.service_uuid()
            })
            .ok_or(TransportError::UnknownCharacteristic(characteristic.uuid()))?;

        tokio::spawn(async move {
            let event = match peripheral.read(&target).await {
                Ok(value) => GattEvent::ReadCompleted(value),
                Err(e) => GattEvent::ReadFailed(e.to_string()),
            };
            sender.send(event).ok();
        });

        Ok(())
    }
}

async fn describe(peripheral: &Peripheral) -> DeviceHandle {
    let mut device = DeviceHandle::new(format!("{:?}", peripheral.id()), peripheral.address());

    if let Ok(Some(props)) = peripheral.properties().await {
        if let Some(name) = props.local_name {
            device = device.with_local_name(name);
        }
        if let Some(rssi) = props.rssi {
            device = device.with_rssi(rssi);
        }
    }

    device
}

/// Forwards the first disconnect of `peripheral_id` to the connection queue.
/// Ends when the queue's consumer goes away.
async fn watch_disconnect(
    peripheral_id: PeripheralId,
    mut events: Pin<Box<dyn Stream<Item = CentralEvent> + Send>>,
    sender: UnboundedSender<GattEvent>,
) {
    loop {
        tokio::select! {
            _ = sender.closed() => break,
            event = events.next() => match event {
                Some(CentralEvent::DeviceDisconnected(id)) if id == peripheral_id => {
                    log::trace!("Device disconnected: {:?}", id);
                    sender.send(GattEvent::Disconnected).ok();
                    break;
                }
                Some(_) => {}
                None => break,
            },
        }
    }
}
