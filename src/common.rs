use std::time::Duration;

/// How long a scan episode runs before giving up on finding a device.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_millis(10_000);

pub mod services {
    use btleplug::api::bleuuid::uuid_from_u16;
    use uuid::Uuid;

    pub const BATTERY: Uuid = uuid_from_u16(0x180F);
}

pub mod characteristics {
    use btleplug::api::bleuuid::uuid_from_u16;
    use uuid::Uuid;

    pub const BATTERY_LEVEL: Uuid = uuid_from_u16(0x2A19);
}
