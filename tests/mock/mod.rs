//! Scripted transport for integration tests.
//!
//! Advertisements are replayed on the tokio clock, so tests run with paused time.
//! Every transport call is recorded together with the instant it was made.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use blebattery::common::{characteristics::BATTERY_LEVEL, services::BATTERY};
use blebattery::{
    BDAddr, CharacteristicDescriptor, ConnectionEvents, DeviceHandle, DeviceStream, GattEvent,
    ServiceDescriptor, Transport, TransportError, Uuid,
};
use futures::StreamExt;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::time::Instant;
use tokio_stream::wrappers::UnboundedReceiverStream;

// ── Call record ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    StartScan,
    StopScan,
    Connect(String),
    DiscoverServices(String),
    ReadCharacteristic(Uuid),
}

#[derive(Default)]
struct Script {
    advertisements: Vec<(Duration, DeviceHandle)>,
    scan_error:     bool,
    connect_error:  bool,
    discover_error: bool,
    read_error:     bool,
    on_connect:     Vec<GattEvent>,
    on_discover:    Vec<GattEvent>,
    on_read:        Vec<GattEvent>,
}

#[derive(Default)]
struct State {
    script:     Script,
    calls:      Vec<(Instant, Call)>,
    delivered:  usize,
    connection: Option<UnboundedSender<GattEvent>>,
}

// ── MockTransport ─────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<State>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A peripheral that connects, exposes the Battery Service and reports `level`.
    pub fn healthy(level: u8) -> Self {
        Self::new()
            .on_connect(vec![GattEvent::Connected])
            .on_discover(vec![GattEvent::ServicesDiscovered(battery_services())])
            .on_read(vec![GattEvent::ReadCompleted(vec![level])])
    }

    /// Report `device` once `at` has elapsed since the scan started.
    pub fn advertise(self, at: Duration, device: DeviceHandle) -> Self {
        self.state
            .lock()
            .unwrap()
            .script
            .advertisements
            .push((at, device));
        self
    }

    pub fn fail_scan(self) -> Self {
        self.state.lock().unwrap().script.scan_error = true;
        self
    }

    pub fn fail_connect(self) -> Self {
        self.state.lock().unwrap().script.connect_error = true;
        self
    }

    pub fn fail_discover(self) -> Self {
        self.state.lock().unwrap().script.discover_error = true;
        self
    }

    pub fn fail_read(self) -> Self {
        self.state.lock().unwrap().script.read_error = true;
        self
    }

    /// Events posted on the connection queue when `connect` is called.
    pub fn on_connect(self, events: Vec<GattEvent>) -> Self {
        self.state.lock().unwrap().script.on_connect = events;
        self
    }

    pub fn on_discover(self, events: Vec<GattEvent>) -> Self {
        self.state.lock().unwrap().script.on_discover = events;
        self
    }

    pub fn on_read(self, events: Vec<GattEvent>) -> Self {
        self.state.lock().unwrap().script.on_read = events;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(|(_, call)| call.clone())
            .collect()
    }

    /// Instants at which `call` was made.
    pub fn times_of(&self, call: &Call) -> Vec<Instant> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(_, c)| c == call)
            .map(|(at, _)| *at)
            .collect()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.times_of(call).len()
    }

    /// Number of devices the scan consumer actually received.
    pub fn delivered(&self) -> usize {
        self.state.lock().unwrap().delivered
    }

    /// Push an unsolicited event on the open connection.
    pub fn inject(&self, event: GattEvent) {
        if let Some(sender) = self.state.lock().unwrap().connection.as_ref() {
            sender.send(event).ok();
        }
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push((Instant::now(), call));
    }

    fn post(&self, events: &[GattEvent]) {
        let state = self.state.lock().unwrap();
        if let Some(sender) = state.connection.as_ref() {
            for event in events {
                sender.send(event.clone()).ok();
            }
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn start_scan(&self) -> Result<DeviceStream, TransportError> {
        self.record(Call::StartScan);

        let mut schedule = {
            let state = self.state.lock().unwrap();
            if state.script.scan_error {
                return Err(TransportError::AdapterNotFound(0));
            }
            state.script.advertisements.clone()
        };
        schedule.sort_by_key(|(at, _)| *at);

        let (sender, receiver) = mpsc::unbounded_channel();
        let start = Instant::now();

        tokio::spawn(async move {
            for (at, device) in schedule {
                tokio::time::sleep_until(start + at).await;
                if sender.send(device).is_err() {
                    return;
                }
            }
            // Keep the scan open until the consumer goes away.
            sender.closed().await;
        });

        let state = self.state.clone();
        let devices = UnboundedReceiverStream::new(receiver).inspect(move |_| {
            state.lock().unwrap().delivered += 1;
        });

        Ok(Box::pin(devices))
    }

    async fn stop_scan(&self) -> Result<(), TransportError> {
        self.record(Call::StopScan);
        Ok(())
    }

    async fn connect(&self, device: &DeviceHandle) -> Result<ConnectionEvents, TransportError> {
        self.record(Call::Connect(device.id().to_owned()));

        let (sender, events) = mpsc::unbounded_channel();
        let on_connect = {
            let mut state = self.state.lock().unwrap();
            if state.script.connect_error {
                return Err(TransportError::UnknownDevice(device.id().to_owned()));
            }
            state.connection = Some(sender);
            state.script.on_connect.clone()
        };
        self.post(&on_connect);

        Ok(events)
    }

    async fn discover_services(&self, device: &DeviceHandle) -> Result<(), TransportError> {
        self.record(Call::DiscoverServices(device.id().to_owned()));

        let on_discover = {
            let state = self.state.lock().unwrap();
            if state.script.discover_error {
                return Err(TransportError::NotConnected(device.id().to_owned()));
            }
            state.script.on_discover.clone()
        };
        self.post(&on_discover);

        Ok(())
    }

    async fn read_characteristic(
        &self,
        _device: &DeviceHandle,
        characteristic: &CharacteristicDescriptor,
    ) -> Result<(), TransportError> {
        self.record(Call::ReadCharacteristic(characteristic.uuid()));

        let on_read = {
            let state = self.state.lock().unwrap();
            if state.script.read_error {
                return Err(TransportError::UnknownCharacteristic(characteristic.uuid()));
            }
            state.script.on_read.clone()
        };
        self.post(&on_read);

        Ok(())
    }
}

// ── Fixtures ──────────────────────────────────────────────────

pub fn device(name: &str, last: u8) -> DeviceHandle {
    DeviceHandle::new(name.to_lowercase(), BDAddr::from([0xC0, 0, 0, 0, 0, last]))
        .with_local_name(name)
        .with_rssi(-60)
}

pub fn battery_services() -> Vec<ServiceDescriptor> {
    vec![
        ServiceDescriptor::new(
            Uuid::from_u128(0x00001800_0000_1000_8000_00805f9b34fb),
            vec![],
        ),
        ServiceDescriptor::new(
            BATTERY,
            vec![CharacteristicDescriptor::new(BATTERY_LEVEL, BATTERY)],
        ),
    ]
}
