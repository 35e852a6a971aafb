//! Read the battery level of a nearby BLE peripheral.
//!
//! A run scans for a device, stops scanning as soon as one is accepted, connects to it,
//! discovers its services, and reads the first byte of the Battery Level characteristic
//! of the Battery Service. The run ends with exactly one result: the battery level or
//! the reason it could not be read.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use blebattery::{BatteryProbe, BtleTransport, Error, ScanConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     pretty_env_logger::init();
//!
//!     let probe = BatteryProbe::new(BtleTransport::new().await?)
//!         .scan_config(ScanConfig::default().require_name())
//!         .on_connected(|device| println!("Connected to {}", device.display_name()));
//!
//!     match probe.run().await {
//!         Ok(report) => println!("Battery level: {}", report.level),
//!         Err(Error::NoDeviceFound) => println!("No device found"),
//!         Err(e) => println!("Could not read the battery level: {}", e),
//!     }
//!
//!     Ok(())
//! }
//!```
//!
//! Any BLE stack can be plugged in by implementing [`Transport`].

#![warn(clippy::all, future_incompatible, nonstandard_style, rust_2018_idioms)]

pub use btleplug::api::BDAddr;
pub use uuid::Uuid;

pub use btle::BtleTransport;
pub use characteristic::CharacteristicDescriptor;
pub use device::DeviceHandle;
pub use error::{Error, TransportError};
pub use probe::{BatteryProbe, BatteryReport};
pub use scanner::{ScanConfig, ScanController};
pub use service::ServiceDescriptor;
pub use session::{
    BatteryLevel, BatteryReading, Command, ConnectedCallback, Session, SessionConfig,
    SessionState,
};
pub use transport::{ConnectionEvents, DeviceStream, GattEvent, Transport};

mod btle;
mod device;
mod error;
mod probe;
mod scanner;
mod service;
mod session;
mod transport;

mod characteristic;
pub mod common;
