use thiserror::Error;
use uuid::Uuid;

/// Terminal outcome of a failed run.
///
/// Every variant ends the run. Nothing is retried; starting over is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("no device found before the scan timed out")]
    NoDeviceFound,
    #[error("scan could not be started: {0}")]
    ScanFailed(String),
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("connection lost before the read completed")]
    ConnectionLost,
    #[error("service discovery failed: {0}")]
    DiscoveryFailed(String),
    #[error("service {0} not found")]
    ServiceNotFound(Uuid),
    #[error("characteristic {0} not found")]
    CharacteristicNotFound(Uuid),
    #[error("read failed: {0}")]
    ReadFailed(String),
}

/// Errors raised by a [`Transport`](crate::Transport) when an operation cannot be issued.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Btle(#[from] btleplug::Error),
    #[error("no bluetooth adapter at index {0}")]
    AdapterNotFound(usize),
    #[error("unknown device {0}")]
    UnknownDevice(String),
    #[error("device {0} is not connected")]
    NotConnected(String),
    #[error("unknown characteristic {0}")]
    UnknownCharacteristic(Uuid),
}
