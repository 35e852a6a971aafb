use btleplug::api::BDAddr;

/// A peripheral found during a scan.
///
/// Handles are produced by the transport and never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub(crate) id:         String,
    pub(crate) address:    BDAddr,
    pub(crate) local_name: Option<String>,
    pub(crate) rssi:       Option<i16>,
}

impl DeviceHandle {
    pub fn new(id: impl Into<String>, address: BDAddr) -> Self {
        Self {
            id: id.into(),
            address,
            local_name: None,
            rssi: None,
        }
    }

    pub fn with_local_name(mut self, name: impl Into<String>) -> Self {
        self.local_name = Some(name.into());
        self
    }

    pub fn with_rssi(mut self, rssi: i16) -> Self {
        self.rssi = Some(rssi);
        self
    }

    /// Transport-assigned identifier
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn address(&self) -> BDAddr {
        self.address
    }

    /// Signal strength of the advertisement
    #[inline]
    pub fn rssi(&self) -> Option<i16> {
        self.rssi
    }

    /// Local name of the device
    #[inline]
    pub fn local_name(&self) -> Option<&str> {
        self.local_name.as_deref()
    }

    /// Local name, or "Unknown" for devices that did not advertise one
    pub fn display_name(&self) -> &str {
        self.local_name().unwrap_or("Unknown")
    }
}
