//! Property tests for the scan controller.

mod mock;

use std::time::Duration;

use blebattery::{BDAddr, DeviceHandle, ScanConfig, ScanController};
use mock::{Call, MockTransport};
use proptest::prelude::*;

const TIMEOUT_MS: u64 = 10_000;

/// Offsets stay clear of the timeout instant so the expected winner is unambiguous.
fn advertisement() -> impl Strategy<Value = (u64, bool)> {
    (
        prop_oneof![0u64..TIMEOUT_MS - 1_000, TIMEOUT_MS + 1_000..2 * TIMEOUT_MS],
        any::<bool>(),
    )
}

fn scan(advertisements: &[(u64, bool)]) -> (Option<DeviceHandle>, MockTransport) {
    let mut transport = MockTransport::new();
    for (index, (at, accepted)) in advertisements.iter().enumerate() {
        let name = if *accepted { "accept" } else { "reject" };
        let address = BDAddr::from([0, 0, 0, 0, 0, index as u8]);
        let device = DeviceHandle::new(format!("dev-{}", index), address).with_local_name(name);
        transport = transport.advertise(Duration::from_millis(*at), device);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap();

    let controller = ScanController::new(
        ScanConfig::default().filter_by_name(|name| name == "accept"),
    );
    let found = runtime.block_on(controller.run(&transport)).unwrap();

    (found, transport)
}

proptest! {
    /// Whatever is advertised, at most one device is accepted and the scan is
    /// stopped exactly once.
    #[test]
    fn accepts_at_most_one_and_stops_once(
        advertisements in proptest::collection::vec(advertisement(), 0..12),
    ) {
        let (found, transport) = scan(&advertisements);

        prop_assert_eq!(transport.count(&Call::StopScan), 1);
        prop_assert_eq!(transport.count(&Call::StartScan), 1);

        // The winner is the earliest accepted advertisement before the timeout.
        let mut ordered: Vec<_> = advertisements.iter().enumerate().collect();
        ordered.sort_by_key(|(_, (at, _))| *at);
        let expected = ordered
            .iter()
            .find(|(_, (at, accepted))| *accepted && *at < TIMEOUT_MS)
            .map(|(index, _)| format!("dev-{}", index));

        prop_assert_eq!(found.map(|device| device.id().to_string()), expected);
    }
}
