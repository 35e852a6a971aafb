use std::sync::Arc;

use crate::{
    BatteryLevel, CharacteristicDescriptor, ConnectedCallback, DeviceHandle, Error, ScanConfig,
    ScanController, Session, SessionConfig, Transport,
};

/// Successful result of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatteryReport {
    /// Device the level was read from
    pub device: DeviceHandle,
    pub level:  BatteryLevel,
    /// Battery Level characteristic with the value that was read
    pub characteristic: CharacteristicDescriptor,
}

/// Scans for a device, connects to it and reads its battery level.
///
/// Every call to [`run`](BatteryProbe::run) is one independent pass: one scan episode
/// and, if a device was accepted, one connection session. Nothing is retried.
pub struct BatteryProbe<T> {
    transport:      T,
    scanner:        ScanController,
    session_config: SessionConfig,
    on_connected:   Option<ConnectedCallback>,
}

impl<T: Transport> BatteryProbe<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            scanner: ScanController::default(),
            session_config: SessionConfig::default(),
            on_connected: None,
        }
    }

    pub fn scan_config(mut self, config: ScanConfig) -> Self {
        self.scanner = ScanController::new(config);
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Called with the accepted device as soon as it is connected
    pub fn on_connected(mut self, func: impl Fn(&DeviceHandle) + Send + Sync + 'static) -> Self {
        self.on_connected = Some(Arc::new(func));
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn run(&self) -> Result<BatteryReport, Error> {
        let device = match self.scanner.run(&self.transport).await? {
            Some(device) => device,
            None => {
                log::info!("No device found");
                return Err(Error::NoDeviceFound);
            }
        };

        let mut session = Session::new(device.clone(), self.session_config.clone());
        if let Some(callback) = self.on_connected.as_ref() {
            session = session.on_connected(callback.clone());
        }

        let reading = session.run(&self.transport).await?;

        Ok(BatteryReport {
            device,
            level: reading.level,
            characteristic: reading.characteristic,
        })
    }

    /// Runs once and hands the terminal result to `deliver`.
    pub async fn run_with(&self, deliver: impl FnOnce(Result<BatteryReport, Error>)) {
        deliver(self.run().await)
    }
}
