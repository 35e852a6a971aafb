//! This example finds the first BLE device, connects to it and reads its battery level.
//! A device name can be given as a command line argument to pick a specific device.

use blebattery::{BatteryProbe, BtleTransport, Error, ScanConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    let mut config = ScanConfig::default();
    if let Some(name) = std::env::args().nth(1) {
        log::info!("Scanning for device {}", name);
        config = config.filter_by_name(move |n| n.eq(&name));
    }

    let probe = BatteryProbe::new(BtleTransport::new().await?)
        .scan_config(config)
        .on_connected(|device| println!("Connected to {}", device.display_name()));

    match probe.run().await {
        Ok(report) => {
            println!("Battery level: {}%", report.level.percent());
            probe.transport().disconnect(&report.device).await?;
        }
        Err(Error::NoDeviceFound) => println!("No device found"),
        Err(e) => println!("Could not read the battery level: {}", e),
    }

    Ok(())
}
