//! Connection lifecycle for a single accepted device.
//!
//! ```text
//! Idle ─▶ Connecting ─▶ ServiceDiscovery ─▶ CharacteristicLookup ─▶ Reading ─▶ Done(Ok)
//!              │                │                    │                 │
//!              └────────────────┴────────────────────┴─────────────────┴──▶ Done(Err)
//! ```
//!
//! [`Session::handle`] is the whole transition table. It is synchronous and returns the
//! transport [`Command`] to issue next, if any. [`Session::run`] feeds it one event at a
//! time from the connection queue and issues the commands.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::common::{characteristics::BATTERY_LEVEL, services::BATTERY};
use crate::{
    CharacteristicDescriptor, ConnectionEvents, DeviceHandle, Error, GattEvent,
    ServiceDescriptor, Transport, TransportError,
};

/// Battery percentage as reported by the peripheral. Values above 100 are passed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BatteryLevel(pub u8);

impl BatteryLevel {
    /// Parses the first byte of a Battery Level payload.
    pub fn from_payload(value: &[u8]) -> Option<Self> {
        value.first().copied().map(BatteryLevel)
    }

    pub fn percent(self) -> u8 {
        self.0
    }
}

impl fmt::Display for BatteryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Outcome of a completed read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatteryReading {
    pub level:          BatteryLevel,
    /// The characteristic that was read, carrying the full payload
    pub characteristic: CharacteristicDescriptor,
}

/// Called once with the device when its connection is established.
pub type ConnectedCallback = Arc<dyn Fn(&DeviceHandle) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    ServiceDiscovery,
    CharacteristicLookup,
    /// Waiting for the value of this characteristic
    Reading(CharacteristicDescriptor),
    Done(Result<BatteryReading, Error>),
}

/// Transport request produced by a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    DiscoverServices,
    ReadCharacteristic(CharacteristicDescriptor),
}

impl Command {
    fn failure(&self, error: TransportError) -> GattEvent {
        match self {
            Command::DiscoverServices => GattEvent::DiscoveryFailed(error.to_string()),
            Command::ReadCharacteristic(_) => GattEvent::ReadFailed(error.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Service that holds the characteristic to read.
    service: Uuid,
    /// Characteristic whose first byte is the battery level.
    characteristic: Uuid,
    /// Limit for each connect, discovery and read step. Unbounded when `None`.
    operation_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            service: BATTERY,
            characteristic: BATTERY_LEVEL,
            operation_timeout: None,
        }
    }
}

impl SessionConfig {
    pub fn target_service(mut self, uuid: Uuid) -> Self {
        self.service = uuid;
        self
    }

    pub fn target_characteristic(mut self, uuid: Uuid) -> Self {
        self.characteristic = uuid;
        self
    }

    /// Give up on a step when its outcome has not arrived within `timeout`
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }
}

pub struct Session {
    device:       DeviceHandle,
    config:       SessionConfig,
    state:        SessionState,
    on_connected: Option<ConnectedCallback>,
}

impl Session {
    pub fn new(device: DeviceHandle, config: SessionConfig) -> Self {
        Self {
            device,
            config,
            state: SessionState::Idle,
            on_connected: None,
        }
    }

    pub fn on_connected(mut self, callback: ConnectedCallback) -> Self {
        self.on_connected = Some(callback);
        self
    }

    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The terminal result, once the session is done
    pub fn result(&self) -> Option<&Result<BatteryReading, Error>> {
        match &self.state {
            SessionState::Done(result) => Some(result),
            _ => None,
        }
    }

    /// Leaves `Idle` for `Connecting`. Returns false if the session was already started.
    pub fn start(&mut self) -> bool {
        if self.state != SessionState::Idle {
            log::debug!("Session for {} already started", self.device.display_name());
            return false;
        }

        self.transition(SessionState::Connecting);
        true
    }

    /// Applies one transport event and returns the command to issue next.
    pub fn handle(&mut self, event: GattEvent) -> Option<Command> {
        match (&self.state, event) {
            (SessionState::Done(_), event) => {
                log::debug!("Session already finished, ignoring {:?}", event);
                None
            }
            (SessionState::Idle, event) => {
                log::debug!("Session not started, ignoring {:?}", event);
                None
            }
            (SessionState::Connecting, GattEvent::Connected) => {
                log::info!("Connected to {}", self.device.display_name());
                self.transition(SessionState::ServiceDiscovery);
                Some(Command::DiscoverServices)
            }
            (SessionState::Connecting, GattEvent::ConnectFailed(reason)) => {
                self.finish(Err(Error::ConnectionFailed(reason)))
            }
            (SessionState::Connecting, GattEvent::Disconnected) => self.finish(Err(
                Error::ConnectionFailed("disconnected while connecting".to_string()),
            )),
            (_, GattEvent::Disconnected) => self.finish(Err(Error::ConnectionLost)),
            (SessionState::ServiceDiscovery, GattEvent::ServicesDiscovered(services)) => {
                log::debug!("Discovered {} services", services.len());
                self.transition(SessionState::CharacteristicLookup);
                self.lookup(&services)
            }
            (SessionState::ServiceDiscovery, GattEvent::DiscoveryFailed(reason)) => {
                self.finish(Err(Error::DiscoveryFailed(reason)))
            }
            (SessionState::Reading(characteristic), GattEvent::ReadCompleted(value)) => {
                match BatteryLevel::from_payload(&value) {
                    Some(level) => {
                        let characteristic = characteristic.clone().with_value(value);
                        self.finish(Ok(BatteryReading { level, characteristic }))
                    }
                    None => self.finish(Err(Error::ReadFailed("empty payload".to_string()))),
                }
            }
            (SessionState::Reading(_), GattEvent::ReadFailed(reason)) => {
                self.finish(Err(Error::ReadFailed(reason)))
            }
            (state, event) => {
                log::debug!("Ignoring {:?} while in {:?}", event, state);
                None
            }
        }
    }

    /// Drives the session to completion over `transport`.
    ///
    /// With an operation timeout set, each step gets one deadline when its request is
    /// issued. Events that do not move the session leave that deadline in place.
    pub async fn run<T>(mut self, transport: &T) -> Result<BatteryReading, Error>
    where
        T: Transport + ?Sized,
    {
        if !self.start() {
            if let Some(result) = self.result() {
                return result.clone();
            }
        }

        let mut deadline = self.deadline();
        let mut events = match transport.connect(&self.device).await {
            Ok(events) => events,
            Err(e) => {
                log::warn!("Could not connect to {}: {}", self.device.address(), e);
                let error = Error::ConnectionFailed(e.to_string());
                self.finish(Err(error.clone()));
                return Err(error);
            }
        };

        loop {
            if let SessionState::Done(result) = &self.state {
                return result.clone();
            }

            let event = self.next_event(&mut events, deadline).await;
            let command = match self.handle(event) {
                Some(command) => command,
                None => continue,
            };

            deadline = self.deadline();

            if command == Command::DiscoverServices {
                if let Some(callback) = self.on_connected.take() {
                    callback(&self.device);
                }
            }

            if let Err(e) = self.issue(transport, &command).await {
                log::warn!("Could not issue {:?}: {}", command, e);
                self.handle(command.failure(e));
            }
        }
    }

    /// End of the step starting now, if steps are limited.
    fn deadline(&self) -> Option<Instant> {
        self.config
            .operation_timeout
            .map(|limit| Instant::now() + limit)
    }

    async fn next_event(
        &self,
        events: &mut ConnectionEvents,
        deadline: Option<Instant>,
    ) -> GattEvent {
        let next = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, events.recv()).await {
                Ok(next) => next,
                Err(_) => return self.timed_out(),
            },
            None => events.recv().await,
        };

        next.unwrap_or_else(|| {
            log::debug!("Event queue for {} closed", self.device.display_name());
            GattEvent::Disconnected
        })
    }

    fn timed_out(&self) -> GattEvent {
        let limit = self.config.operation_timeout.unwrap_or_default();
        log::warn!("No response within {:?} while in {:?}", limit, self.state);

        let reason = format!("timed out after {:?}", limit);
        match self.state {
            SessionState::Connecting => GattEvent::ConnectFailed(reason),
            SessionState::ServiceDiscovery => GattEvent::DiscoveryFailed(reason),
            SessionState::Reading(_) => GattEvent::ReadFailed(reason),
            _ => GattEvent::Disconnected,
        }
    }

    async fn issue<T>(&self, transport: &T, command: &Command) -> Result<(), TransportError>
    where
        T: Transport + ?Sized,
    {
        match command {
            Command::DiscoverServices => transport.discover_services(&self.device).await,
            Command::ReadCharacteristic(characteristic) => {
                transport
                    .read_characteristic(&self.device, characteristic)
                    .await
            }
        }
    }

    fn lookup(&mut self, services: &[ServiceDescriptor]) -> Option<Command> {
        let service_uuid = self.config.service;
        let characteristic_uuid = self.config.characteristic;

        let mut candidates = services
            .iter()
            .filter(|service| service.uuid() == service_uuid)
            .peekable();

        if candidates.peek().is_none() {
            for service in services {
                log::debug!("Available service: {}", service.uuid());
            }
            return self.finish(Err(Error::ServiceNotFound(service_uuid)));
        }

        // Several instances of the service are allowed, the first one carrying the
        // characteristic wins.
        let characteristic = candidates
            .find_map(|service| service.characteristic(characteristic_uuid))
            .cloned();

        match characteristic {
            Some(characteristic) => {
                self.transition(SessionState::Reading(characteristic.clone()));
                Some(Command::ReadCharacteristic(characteristic))
            }
            None => self.finish(Err(Error::CharacteristicNotFound(characteristic_uuid))),
        }
    }

    fn transition(&mut self, next: SessionState) {
        log::trace!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn finish(&mut self, result: Result<BatteryReading, Error>) -> Option<Command> {
        match &result {
            Ok(reading) => log::info!(
                "Battery level of {}: {}",
                self.device.display_name(),
                reading.level
            ),
            Err(e) => log::warn!("Session for {} failed: {}", self.device.display_name(), e),
        }

        self.transition(SessionState::Done(result));
        None
    }
}
