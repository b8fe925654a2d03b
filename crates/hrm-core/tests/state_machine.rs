//! Connection state machine tests against the mock radio.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use hrm_core::mock::{MockPeripheral, MockRadio};
use hrm_core::uuids::{
    BATTERY_LEVEL, BATTERY_SERVICE, BODY_SENSOR_LOCATION, HEART_RATE_MEASUREMENT,
    HEART_RATE_SERVICE,
};
use hrm_core::{
    AdapterState, BodyLocation, Capability, ConnectionState, DeviceEvent, Error, EventReceiver,
    HeartRateMonitor, HeartRateStream, MonitorConfig, StreamOptions, TargetDescriptor,
};
use tokio::time::timeout;

const EVENT_TIMEOUT: Duration = Duration::from_secs(2);
const QUIET_PERIOD: Duration = Duration::from_millis(100);

/// Wait for the first event matching `predicate`, skipping everything else.
async fn expect_event(
    events: &mut EventReceiver,
    mut predicate: impl FnMut(&DeviceEvent) -> bool,
) -> DeviceEvent {
    timeout(EVENT_TIMEOUT, async {
        loop {
            let event = events.recv().await.expect("event channel closed");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

async fn expect_ready(events: &mut EventReceiver, capability: Capability) {
    expect_event(
        events,
        |e| matches!(e, DeviceEvent::Ready { capability: c } if *c == capability),
    )
    .await;
}

/// Assert that no event matching `predicate` shows up for a short while.
async fn expect_none(events: &mut EventReceiver, mut predicate: impl FnMut(&DeviceEvent) -> bool) {
    let result = timeout(QUIET_PERIOD, async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) => continue,
                Err(_) => std::future::pending::<()>().await,
            }
        }
    })
    .await;
    assert!(result.is_err(), "unexpected event: {:?}", result);
}

/// Poll `condition` until it holds.
async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(EVENT_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never held");
}

fn setup(peripheral: MockPeripheral) -> (Arc<MockRadio>, MockPeripheral, HeartRateMonitor<MockRadio>) {
    let radio = Arc::new(MockRadio::new());
    let id = peripheral.advertisement().id;
    let strap = radio.add_peripheral(peripheral);
    let monitor = HeartRateMonitor::new(Arc::clone(&radio), id.as_str()).unwrap();
    (radio, strap, monitor)
}

#[tokio::test]
async fn test_heart_rate_sample_is_delivered() {
    let (radio, strap, monitor) = setup(MockPeripheral::new("AA:BB"));
    let mut events = monitor.subscribe();

    monitor.start().await.unwrap();
    assert_eq!(monitor.state(), ConnectionState::Scanning);
    assert!(radio.is_scanning());
    radio.advertise("AA:BB");

    let connected = expect_event(&mut events, |e| matches!(e, DeviceEvent::Connected { .. })).await;
    assert_eq!(
        connected,
        DeviceEvent::Connected {
            id: "AA:BB".to_string()
        }
    );
    expect_ready(&mut events, Capability::HeartRate).await;
    assert_eq!(monitor.state(), ConnectionState::Ready);
    assert!(!radio.is_scanning());

    strap.push_notification(HEART_RATE_MEASUREMENT, vec![0x00, 0x48]);
    let data = expect_event(&mut events, |e| matches!(e, DeviceEvent::Data { .. })).await;
    assert_eq!(data, DeviceEvent::Data { bpm: 72 });
    assert!(strap.is_notifying(HEART_RATE_MEASUREMENT));
}

#[tokio::test]
async fn test_state_transitions_follow_discovery_order() {
    let (radio, _strap, monitor) = setup(MockPeripheral::new("AA:BB"));
    let mut events = monitor.subscribe();

    monitor.start().await.unwrap();
    radio.advertise("AA:BB");

    let mut states = Vec::new();
    timeout(EVENT_TIMEOUT, async {
        while states.last() != Some(&ConnectionState::Ready) {
            if let Ok(DeviceEvent::StateChanged { state }) = events.recv().await {
                states.push(state);
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(
        states,
        vec![
            ConnectionState::Scanning,
            ConnectionState::Connecting,
            ConnectionState::DiscoveringServices,
            ConnectionState::DiscoveringCharacteristics,
            ConnectionState::Ready,
        ]
    );
}

#[tokio::test]
async fn test_target_matching_ignores_case_and_separators() {
    let radio = Arc::new(MockRadio::new());
    radio.add_peripheral(MockPeripheral::new("AA:BB:CC:DD:EE:FF"));
    let monitor = HeartRateMonitor::new(Arc::clone(&radio), "aabbccddeeff").unwrap();
    let mut events = monitor.subscribe();

    monitor.start().await.unwrap();
    radio.advertise("AA:BB:CC:DD:EE:FF");
    expect_ready(&mut events, Capability::HeartRate).await;
}

#[tokio::test]
async fn test_other_peripherals_are_ignored() {
    let radio = Arc::new(MockRadio::new());
    let other = radio.add_peripheral(MockPeripheral::new("11:22"));
    radio.add_peripheral(MockPeripheral::new("AA:BB"));
    let monitor = HeartRateMonitor::new(Arc::clone(&radio), "AA:BB").unwrap();
    let mut events = monitor.subscribe();

    monitor.start().await.unwrap();
    radio.advertise("11:22");
    expect_none(&mut events, |e| matches!(e, DeviceEvent::Discovered { .. })).await;
    assert_eq!(other.connect_count(), 0);
    assert_eq!(monitor.state(), ConnectionState::Scanning);

    radio.advertise("AA:BB");
    expect_ready(&mut events, Capability::HeartRate).await;
}

#[tokio::test]
async fn test_missing_heart_rate_service_is_reported() {
    let (radio, strap, monitor) = setup(
        MockPeripheral::builder("AA:BB")
            .without_service(HEART_RATE_SERVICE)
            .build(),
    );
    let mut events = monitor.subscribe();

    monitor.start().await.unwrap();
    radio.advertise("AA:BB");

    let error = expect_event(&mut events, |e| matches!(e, DeviceEvent::Error { .. })).await;
    assert_eq!(
        error,
        DeviceEvent::Error {
            error: "Heart Rate Service not found".to_string()
        }
    );

    strap.push_notification(HEART_RATE_MEASUREMENT, vec![0x00, 0x48]);
    expect_none(&mut events, |e| {
        matches!(e, DeviceEvent::Data { .. } | DeviceEvent::Ready { .. })
    })
    .await;
    assert!(!monitor.is_ready(Capability::HeartRate));
    assert!(!monitor.is_initing());
}

#[tokio::test]
async fn test_missing_measurement_characteristic_is_reported() {
    let (radio, _strap, monitor) = setup(
        MockPeripheral::builder("AA:BB")
            .without_characteristic(HEART_RATE_MEASUREMENT)
            .build(),
    );
    let mut events = monitor.subscribe();

    monitor.start().await.unwrap();
    radio.advertise("AA:BB");

    let error = expect_event(&mut events, |e| matches!(e, DeviceEvent::Error { .. })).await;
    assert_eq!(
        error,
        DeviceEvent::Error {
            error: "Heart Rate Characteristic not found".to_string()
        }
    );
    assert!(!monitor.is_ready(Capability::HeartRate));
}

#[tokio::test]
async fn test_battery_level_is_returned_and_emitted() {
    let (radio, _strap, monitor) = setup(MockPeripheral::new("AA:BB"));
    let mut events = monitor.subscribe();

    let read = tokio::spawn({
        let radio = Arc::clone(&radio);
        async move {
            // Give the read a moment to kick off discovery before advertising.
            tokio::time::sleep(Duration::from_millis(20)).await;
            radio.advertise("AA:BB");
        }
    });

    let level = timeout(EVENT_TIMEOUT, monitor.get_battery_level())
        .await
        .unwrap()
        .unwrap();
    read.await.unwrap();

    assert_eq!(level, 85);
    let event = expect_event(&mut events, |e| matches!(e, DeviceEvent::BatteryLevel { .. })).await;
    assert_eq!(event, DeviceEvent::BatteryLevel { level: 85 });
    assert_eq!(radio.scan_count(), 1);
}

#[tokio::test]
async fn test_body_location_is_decoded() {
    let (radio, strap, monitor) = setup(
        MockPeripheral::builder("AA:BB")
            .value(BODY_SENSOR_LOCATION, vec![3])
            .build(),
    );
    let mut events = monitor.subscribe();

    monitor.start().await.unwrap();
    radio.advertise("AA:BB");
    expect_ready(&mut events, Capability::BodySensorLocation).await;

    assert_eq!(
        monitor.get_body_location().await.unwrap(),
        BodyLocation::Finger
    );
    let event = expect_event(&mut events, |e| matches!(e, DeviceEvent::BodyLocation { .. })).await;
    assert_eq!(
        event,
        DeviceEvent::BodyLocation {
            location: BodyLocation::Finger
        }
    );

    strap.set_value(BODY_SENSOR_LOCATION, vec![42]);
    assert_eq!(
        monitor.get_body_location().await.unwrap(),
        BodyLocation::Other
    );
}

#[tokio::test]
async fn test_read_failure_goes_to_caller_only() {
    let (radio, strap, monitor) = setup(MockPeripheral::new("AA:BB"));
    let mut events = monitor.subscribe();

    monitor.start().await.unwrap();
    radio.advertise("AA:BB");
    expect_ready(&mut events, Capability::Battery).await;

    strap.set_fail_reads(true);
    let err = monitor.get_battery_level().await.unwrap_err();
    assert!(matches!(err, Error::ReadFailed { uuid, .. } if uuid == BATTERY_LEVEL));
    expect_none(&mut events, |e| matches!(e, DeviceEvent::Error { .. })).await;
    assert_eq!(monitor.state(), ConnectionState::Ready);
}

#[tokio::test]
async fn test_missing_battery_service_is_not_fatal() {
    let (radio, strap, monitor) = setup(
        MockPeripheral::builder("AA:BB")
            .without_service(BATTERY_SERVICE)
            .build(),
    );
    let mut events = monitor.subscribe();

    monitor.start().await.unwrap();
    radio.advertise("AA:BB");
    expect_ready(&mut events, Capability::BodySensorLocation).await;

    strap.push_notification(HEART_RATE_MEASUREMENT, vec![0x00, 60]);
    let data = expect_event(&mut events, |e| matches!(e, DeviceEvent::Data { .. })).await;
    assert_eq!(data, DeviceEvent::Data { bpm: 60 });
    assert!(!monitor.is_ready(Capability::Battery));
    assert!(!monitor.is_initing());
}

#[tokio::test]
async fn test_repeated_start_triggers_one_discovery() {
    let (radio, strap, monitor) = setup(MockPeripheral::new("AA:BB"));
    let mut events = monitor.subscribe();

    monitor.start().await.unwrap();
    monitor.start().await.unwrap();
    assert_eq!(radio.scan_count(), 1);

    radio.advertise("AA:BB");
    radio.advertise("AA:BB");
    expect_ready(&mut events, Capability::Battery).await;

    assert_eq!(radio.scan_count(), 1);
    assert_eq!(strap.connect_count(), 1);
    assert_eq!(strap.service_discovery_count(), 1);
}

#[tokio::test]
async fn test_concurrent_reads_share_one_discovery() {
    let (radio, strap, monitor) = setup(MockPeripheral::new("AA:BB"));
    let monitor = Arc::new(monitor);

    let battery = tokio::spawn({
        let monitor = Arc::clone(&monitor);
        async move { monitor.get_battery_level().await }
    });
    let location = tokio::spawn({
        let monitor = Arc::clone(&monitor);
        async move { monitor.get_body_location().await }
    });

    // Both readers must be waiting before the peripheral shows up.
    timeout(EVENT_TIMEOUT, async {
        while !monitor.is_initing() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    radio.advertise("AA:BB");

    assert_eq!(battery.await.unwrap().unwrap(), 85);
    assert_eq!(location.await.unwrap().unwrap(), BodyLocation::Chest);
    assert_eq!(radio.scan_count(), 1);
    assert_eq!(strap.connect_count(), 1);
}

#[tokio::test]
async fn test_stale_discovery_after_disconnect_is_discarded() {
    let (radio, strap, monitor) = setup(MockPeripheral::new("AA:BB"));
    let mut events = monitor.subscribe();
    strap.hold_service_discovery();

    monitor.start().await.unwrap();
    radio.advertise("AA:BB");
    expect_event(&mut events, |e| {
        matches!(
            e,
            DeviceEvent::StateChanged {
                state: ConnectionState::DiscoveringServices
            }
        )
    })
    .await;

    radio.emit_disconnect("AA:BB");
    expect_event(&mut events, |e| matches!(e, DeviceEvent::Disconnected { .. })).await;
    assert_eq!(monitor.state(), ConnectionState::Disconnected);

    strap.release_service_discovery();
    expect_none(&mut events, |e| {
        matches!(
            e,
            DeviceEvent::Ready { .. } | DeviceEvent::Error { .. } | DeviceEvent::StateChanged { .. }
        )
    })
    .await;
    assert_eq!(monitor.state(), ConnectionState::Disconnected);
    assert!(!monitor.is_ready(Capability::HeartRate));
    assert!(!monitor.is_initing());
}

#[tokio::test]
async fn test_pause_drops_samples_until_started_again() {
    let (radio, strap, monitor) = setup(MockPeripheral::new("AA:BB"));
    let mut events = monitor.subscribe();

    monitor.start().await.unwrap();
    radio.advertise("AA:BB");
    expect_ready(&mut events, Capability::HeartRate).await;

    assert!(monitor.pause().await.unwrap());
    assert!(!strap.is_notifying(HEART_RATE_MEASUREMENT));

    strap.push_notification(HEART_RATE_MEASUREMENT, vec![0x00, 80]);
    expect_none(&mut events, |e| matches!(e, DeviceEvent::Data { .. })).await;

    monitor.start().await.unwrap();
    assert!(strap.is_notifying(HEART_RATE_MEASUREMENT));
    strap.push_notification(HEART_RATE_MEASUREMENT, vec![0x00, 81]);
    let data = expect_event(&mut events, |e| matches!(e, DeviceEvent::Data { .. })).await;
    assert_eq!(data, DeviceEvent::Data { bpm: 81 });
    assert_eq!(radio.scan_count(), 1);
}

#[tokio::test]
async fn test_sixteen_bit_samples_are_dropped() {
    let (radio, strap, monitor) = setup(MockPeripheral::new("AA:BB"));
    let mut events = monitor.subscribe();

    monitor.start().await.unwrap();
    radio.advertise("AA:BB");
    expect_ready(&mut events, Capability::HeartRate).await;

    strap.push_notification(HEART_RATE_MEASUREMENT, vec![0x01, 0x48, 0x00]);
    strap.push_notification(HEART_RATE_MEASUREMENT, vec![0x06, 90]);
    let data = expect_event(&mut events, |e| matches!(e, DeviceEvent::Data { .. })).await;
    assert_eq!(data, DeviceEvent::Data { bpm: 90 });
}

#[tokio::test]
async fn test_monitor_is_reusable_after_peripheral_disconnect() {
    let (radio, strap, monitor) = setup(MockPeripheral::new("AA:BB"));
    let mut events = monitor.subscribe();

    monitor.start().await.unwrap();
    radio.advertise("AA:BB");
    expect_ready(&mut events, Capability::Battery).await;

    radio.emit_disconnect("AA:BB");
    expect_event(&mut events, |e| matches!(e, DeviceEvent::Disconnected { .. })).await;
    assert!(!monitor.is_ready(Capability::HeartRate));
    assert!(!monitor.is_ready(Capability::Battery));

    monitor.start().await.unwrap();
    assert_eq!(radio.scan_count(), 2);
    radio.advertise("AA:BB");
    expect_ready(&mut events, Capability::HeartRate).await;
    assert_eq!(strap.connect_count(), 2);

    strap.push_notification(HEART_RATE_MEASUREMENT, vec![0x00, 65]);
    let data = expect_event(&mut events, |e| matches!(e, DeviceEvent::Data { .. })).await;
    assert_eq!(data, DeviceEvent::Data { bpm: 65 });
}

#[tokio::test]
async fn test_disconnect_emits_end_and_allows_restart() {
    let (radio, strap, monitor) = setup(MockPeripheral::new("AA:BB"));
    let mut events = monitor.subscribe();

    monitor.start().await.unwrap();
    radio.advertise("AA:BB");
    expect_ready(&mut events, Capability::HeartRate).await;

    monitor.disconnect().await.unwrap();
    expect_event(&mut events, |e| matches!(e, DeviceEvent::End)).await;
    assert_eq!(monitor.state(), ConnectionState::Stopped);
    assert!(!strap.is_connected());
    assert_eq!(strap.disconnect_count(), 1);

    strap.push_notification(HEART_RATE_MEASUREMENT, vec![0x00, 70]);
    expect_none(&mut events, |e| matches!(e, DeviceEvent::Data { .. })).await;

    monitor.start().await.unwrap();
    radio.advertise("AA:BB");
    expect_ready(&mut events, Capability::HeartRate).await;
}

#[tokio::test]
async fn test_connect_failure_releases_peripheral() {
    let (radio, strap, monitor) = setup(MockPeripheral::new("AA:BB"));
    let mut events = monitor.subscribe();
    strap.set_fail_connect(true);

    monitor.start().await.unwrap();
    radio.advertise("AA:BB");
    expect_event(&mut events, |e| matches!(e, DeviceEvent::Error { .. })).await;
    assert_eq!(monitor.state(), ConnectionState::Disconnected);
    assert!(!monitor.is_initing());

    strap.set_fail_connect(false);
    monitor.start().await.unwrap();
    radio.advertise("AA:BB");
    expect_ready(&mut events, Capability::HeartRate).await;
}

#[tokio::test]
async fn test_disconnect_while_connecting_releases_link() {
    let (radio, strap, monitor) = setup(MockPeripheral::new("AA:BB"));
    let mut events = monitor.subscribe();
    strap.hold_connect();

    monitor.start().await.unwrap();
    radio.advertise("AA:BB");
    wait_until(|| strap.connect_count() == 1).await;
    assert_eq!(monitor.state(), ConnectionState::Connecting);

    monitor.disconnect().await.unwrap();
    expect_event(&mut events, |e| matches!(e, DeviceEvent::End)).await;
    assert_eq!(strap.disconnect_count(), 1);

    // The connect completes after the monitor gave up on it.
    strap.release_connect();
    wait_until(|| strap.disconnect_count() == 2).await;
    assert!(!strap.is_connected());
    assert_eq!(monitor.state(), ConnectionState::Stopped);
    expect_none(&mut events, |e| {
        matches!(e, DeviceEvent::Connected { .. } | DeviceEvent::Ready { .. })
    })
    .await;
}

#[tokio::test]
async fn test_discovery_timeout_tears_down_attempt() {
    let radio = Arc::new(MockRadio::new());
    let strap = radio.add_peripheral(MockPeripheral::new("AA:BB"));
    let config = MonitorConfig::default().discovery_timeout(Duration::from_millis(50));
    let monitor = HeartRateMonitor::with_config(Arc::clone(&radio), "AA:BB", config).unwrap();
    let mut events = monitor.subscribe();
    strap.hold_service_discovery();

    monitor.start().await.unwrap();
    radio.advertise("AA:BB");
    match expect_event(&mut events, |e| matches!(e, DeviceEvent::Error { .. })).await {
        DeviceEvent::Error { error } => assert!(error.contains("timed out"), "{}", error),
        other => panic!("unexpected event: {:?}", other),
    }
    wait_until(|| strap.disconnect_count() == 1).await;
    assert!(!strap.is_connected());
    assert_eq!(monitor.state(), ConnectionState::Disconnected);
    assert!(!monitor.is_initing());
    expect_none(&mut events, |e| {
        matches!(e, DeviceEvent::Error { .. } | DeviceEvent::Ready { .. })
    })
    .await;

    strap.release_service_discovery();
    monitor.start().await.unwrap();
    assert_eq!(radio.scan_count(), 2);
    radio.advertise("AA:BB");
    expect_ready(&mut events, Capability::HeartRate).await;
}

#[tokio::test]
async fn test_scanning_follows_adapter_power() {
    let radio = Arc::new(MockRadio::with_state(AdapterState::PoweredOff));
    radio.add_peripheral(MockPeripheral::new("AA:BB"));
    let target = TargetDescriptor::new("AA:BB").verbose(true);
    let monitor = HeartRateMonitor::new(Arc::clone(&radio), target).unwrap();
    let mut events = monitor.subscribe();

    monitor.start().await.unwrap();
    assert_eq!(monitor.state(), ConnectionState::Scanning);
    assert!(!radio.is_scanning());

    radio.set_state(AdapterState::PoweredOn);
    timeout(EVENT_TIMEOUT, async {
        while !radio.is_scanning() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    radio.advertise("AA:BB");
    expect_ready(&mut events, Capability::HeartRate).await;
}

#[tokio::test]
async fn test_empty_target_is_rejected() {
    let radio = Arc::new(MockRadio::new());
    let err = HeartRateMonitor::new(Arc::clone(&radio), "   ").unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));

    let err = HeartRateMonitor::with_config(
        radio,
        "AA:BB",
        MonitorConfig::default().event_capacity(0),
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[tokio::test]
async fn test_stream_yields_samples_and_ends() {
    let (radio, strap, monitor) = setup(MockPeripheral::new("AA:BB"));
    let monitor = Arc::new(monitor);
    let mut events = monitor.subscribe();

    let mut stream = HeartRateStream::new(Arc::clone(&monitor), StreamOptions::default())
        .await
        .unwrap();
    radio.advertise("AA:BB");
    expect_ready(&mut events, Capability::HeartRate).await;

    strap.push_notification(HEART_RATE_MEASUREMENT, vec![0x00, 100]);
    let bpm = timeout(EVENT_TIMEOUT, stream.next()).await.unwrap();
    assert_eq!(bpm, Some(100));

    monitor.disconnect().await.unwrap();
    let end = timeout(EVENT_TIMEOUT, stream.next()).await.unwrap();
    assert_eq!(end, None);
}

#[tokio::test]
async fn test_stream_pauses_when_buffer_is_full() {
    let (radio, strap, monitor) = setup(MockPeripheral::new("AA:BB"));
    let monitor = Arc::new(monitor);
    let mut events = monitor.subscribe();

    let options = StreamOptions::builder().buffer_size(2).build();
    let mut stream = HeartRateStream::new(Arc::clone(&monitor), options)
        .await
        .unwrap();
    radio.advertise("AA:BB");
    expect_ready(&mut events, Capability::HeartRate).await;

    strap.push_notification(HEART_RATE_MEASUREMENT, vec![0x00, 61]);
    strap.push_notification(HEART_RATE_MEASUREMENT, vec![0x00, 62]);
    timeout(EVENT_TIMEOUT, async {
        while strap.is_notifying(HEART_RATE_MEASUREMENT) {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("stream never paused the monitor");

    assert_eq!(stream.next().await, Some(61));
    timeout(EVENT_TIMEOUT, async {
        while !strap.is_notifying(HEART_RATE_MEASUREMENT) {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("stream never resumed the monitor");

    assert_eq!(stream.next().await, Some(62));
    strap.push_notification(HEART_RATE_MEASUREMENT, vec![0x00, 63]);
    let bpm = timeout(EVENT_TIMEOUT, stream.next()).await.unwrap();
    assert_eq!(bpm, Some(63));
}

#[tokio::test]
async fn test_stream_restarts_after_peripheral_disconnect() {
    let (radio, strap, monitor) = setup(MockPeripheral::new("AA:BB"));
    let monitor = Arc::new(monitor);
    let mut events = monitor.subscribe();

    let mut stream = HeartRateStream::new(Arc::clone(&monitor), StreamOptions::default())
        .await
        .unwrap();
    let mut relayed = stream.events();
    radio.advertise("AA:BB");
    expect_ready(&mut events, Capability::HeartRate).await;

    radio.emit_disconnect("AA:BB");
    expect_event(&mut relayed, |e| matches!(e, DeviceEvent::Disconnected { .. })).await;
    timeout(EVENT_TIMEOUT, async {
        while radio.scan_count() < 2 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("stream did not restart scanning");

    radio.advertise("AA:BB");
    expect_ready(&mut events, Capability::HeartRate).await;
    strap.push_notification(HEART_RATE_MEASUREMENT, vec![0x00, 77]);
    let bpm = timeout(EVENT_TIMEOUT, stream.next()).await.unwrap();
    assert_eq!(bpm, Some(77));
}
