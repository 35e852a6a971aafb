//! The boundary between the battery probe and a platform BLE stack.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::mpsc;

use crate::{CharacteristicDescriptor, DeviceHandle, ServiceDescriptor, TransportError};

/// Devices reported by a running scan, in discovery order. May repeat a device.
pub type DeviceStream = Pin<Box<dyn Stream<Item = DeviceHandle> + Send>>;

/// Per-connection event queue. A closed queue means the link is gone.
pub type ConnectionEvents = mpsc::UnboundedReceiver<GattEvent>;

/// Outcomes delivered by the transport for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GattEvent {
    Connected,
    ConnectFailed(String),
    /// The link dropped. Can arrive at any time after `connect`.
    Disconnected,
    ServicesDiscovered(Vec<ServiceDescriptor>),
    DiscoveryFailed(String),
    ReadCompleted(Vec<u8>),
    ReadFailed(String),
}

/// Operations the probe needs from a BLE stack.
///
/// Connection-level operations only issue the request. Their outcome is posted as a
/// [`GattEvent`] on the queue returned by [`Transport::connect`]. An `Err` from one
/// of these methods means the request could not be issued at all.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start scanning and return the stream of discovered devices.
    async fn start_scan(&self) -> Result<DeviceStream, TransportError>;

    /// Stop scanning. Calling this when no scan is running is a no-op.
    async fn stop_scan(&self) -> Result<(), TransportError>;

    /// Connect to the device and return its event queue.
    async fn connect(&self, device: &DeviceHandle) -> Result<ConnectionEvents, TransportError>;

    async fn discover_services(&self, device: &DeviceHandle) -> Result<(), TransportError>;

    async fn read_characteristic(
        &self,
        device: &DeviceHandle,
        characteristic: &CharacteristicDescriptor,
    ) -> Result<(), TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn start_scan(&self) -> Result<DeviceStream, TransportError> {
        (**self).start_scan().await
    }

    async fn stop_scan(&self) -> Result<(), TransportError> {
        (**self).stop_scan().await
    }

    async fn connect(&self, device: &DeviceHandle) -> Result<ConnectionEvents, TransportError> {
        (**self).connect(device).await
    }

    async fn discover_services(&self, device: &DeviceHandle) -> Result<(), TransportError> {
        (**self).discover_services(device).await
    }

    async fn read_characteristic(
        &self,
        device: &DeviceHandle,
        characteristic: &CharacteristicDescriptor,
    ) -> Result<(), TransportError> {
        (**self).read_characteristic(device, characteristic).await
    }
}
