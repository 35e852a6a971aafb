use std::time::Duration;

use btleplug::api::BDAddr;
use futures::StreamExt;

use crate::common::DEFAULT_SCAN_TIMEOUT;
use crate::{DeviceHandle, Error, Transport};

pub struct ScanConfig {
    /// Filters the found devices based on device address.
    address_filter: Option<Box<dyn Fn(BDAddr) -> bool + Send + Sync>>,
    /// Filters the found devices based on local name.
    name_filter: Option<Box<dyn Fn(&str) -> bool + Send + Sync>>,
    /// Filters the found devices based on the whole device handle.
    device_filter: Option<Box<dyn Fn(&DeviceHandle) -> bool + Send + Sync>>,
    /// Weakest accepted signal strength.
    min_rssi: Option<i16>,
    /// The scan is stopped when timeout duration is reached.
    timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            address_filter: None,
            name_filter: None,
            device_filter: None,
            min_rssi: None,
            timeout: DEFAULT_SCAN_TIMEOUT,
        }
    }
}

impl ScanConfig {
    /// Filter scanned devices with an arbitrary predicate
    pub fn filter(mut self, func: impl Fn(&DeviceHandle) -> bool + Send + Sync + 'static) -> Self {
        self.device_filter = Some(Box::new(func));
        self
    }

    /// Filter scanned devices based on the device address
    pub fn filter_by_address(
        mut self,
        func: impl Fn(BDAddr) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.address_filter = Some(Box::new(func));
        self
    }

    /// Filter scanned devices based on the device name
    pub fn filter_by_name(mut self, func: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.name_filter = Some(Box::new(func));
        self
    }

    /// Ignore devices whose advertisement is weaker than `rssi`
    pub fn filter_by_min_rssi(mut self, rssi: i16) -> Self {
        self.min_rssi = Some(rssi);
        self
    }

    /// Stop the scan after given duration
    pub fn stop_after_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Require that the scanned devices have a name
    pub fn require_name(self) -> Self {
        if self.name_filter.is_none() {
            self.filter_by_name(|name| !name.is_empty())
        } else {
            self
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Checks the device against every configured filter.
    /// With no filters configured every device is accepted.
    pub fn accepts(&self, device: &DeviceHandle) -> bool {
        if let Some(filter_by_addr) = self.address_filter.as_ref() {
            if !filter_by_addr(device.address()) {
                return false;
            }
        }

        if let Some(filter_by_name) = self.name_filter.as_ref() {
            if !device.local_name().map(|name| filter_by_name(name)).unwrap_or(false) {
                return false;
            }
        }

        if let Some(min_rssi) = self.min_rssi {
            if !device.rssi().map(|rssi| rssi >= min_rssi).unwrap_or(false) {
                return false;
            }
        }

        self.device_filter
            .as_ref()
            .map(|filter| filter(device))
            .unwrap_or(true)
    }
}

/// Runs single scan episodes that pick at most one device.
pub struct ScanController {
    config: ScanConfig,
}

impl Default for ScanController {
    fn default() -> Self {
        ScanController::new(ScanConfig::default())
    }
}

impl ScanController {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Scan until the first accepted device or the timeout, whichever comes first.
    ///
    /// Returns `Ok(None)` when no device was accepted. The scan is stopped exactly
    /// once on either path, and devices reported after that are dropped unseen.
    pub async fn run<T>(&self, transport: &T) -> Result<Option<DeviceHandle>, Error>
    where
        T: Transport + ?Sized,
    {
        log::info!("Starting the scan");

        let mut devices = transport
            .start_scan()
            .await
            .map_err(|e| Error::ScanFailed(e.to_string()))?;

        let timeout = tokio::time::sleep(self.config.timeout);
        tokio::pin!(timeout);

        let accepted = loop {
            tokio::select! {
                biased;

                _ = &mut timeout => {
                    log::info!("Scan timed out after {:?}", self.config.timeout);
                    break None;
                }
                device = devices.next() => match device {
                    Some(device) if self.config.accepts(&device) => {
                        log::info!("Found device: {:?}", device);
                        break Some(device);
                    }
                    Some(device) => {
                        log::trace!("Device filtered: {:?}", device);
                    }
                    None => {
                        log::info!("Device stream ended before a match");
                        break None;
                    }
                },
            }
        };

        drop(devices);

        if let Err(e) = transport.stop_scan().await {
            log::warn!("Failed to stop the scan: {}", e);
        }

        log::info!("Scanner was stopped.");

        Ok(accepted)
    }
}
