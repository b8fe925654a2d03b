//! Hardware tests for hrm-core.
//!
//! These tests need a real Bluetooth adapter and a heart rate strap in range:
//! `HRM_DEVICE="AA:BB:CC:DD:EE:FF" cargo test --package hrm-core -- --ignored --nocapture`
//!
//! On macOS use the CoreBluetooth UUID printed by `hrm scan` instead of the
//! MAC address.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use hrm_core::scan::{ScanOptions, scan};
use hrm_core::{BtleplugRadio, HeartRateMonitor, HeartRateStream, StreamOptions};
use tokio::time::timeout;

const BLE_TIMEOUT: Duration = Duration::from_secs(30);

fn device_id() -> String {
    env::var("HRM_DEVICE").expect("set HRM_DEVICE to the strap's identifier")
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_scan_for_heart_rate_monitors() {
    let radio = BtleplugRadio::new().await.expect("no Bluetooth adapter");
    let options = ScanOptions::new().duration_secs(10).heart_rate_only();

    let found = timeout(BLE_TIMEOUT, scan(&radio, options))
        .await
        .expect("scan timed out")
        .expect("scan failed");

    println!("Found {} heart rate monitor(s)", found.len());
    for peripheral in found {
        println!("{peripheral}");
    }
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_read_battery_and_location() {
    let radio = Arc::new(BtleplugRadio::new().await.expect("no Bluetooth adapter"));
    let monitor = HeartRateMonitor::new(radio, device_id()).unwrap();

    let level = timeout(BLE_TIMEOUT, monitor.get_battery_level())
        .await
        .expect("battery read timed out")
        .expect("battery read failed");
    assert!(level <= 100);
    println!("Battery: {level}%");

    match timeout(Duration::from_secs(5), monitor.get_body_location()).await {
        Ok(Ok(location)) => println!("Body location: {location}"),
        Ok(Err(e)) => panic!("body location read failed: {e}"),
        Err(_) => println!("Strap has no body sensor location"),
    }

    monitor.disconnect().await.unwrap();
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_stream_heart_rate() {
    let radio = Arc::new(BtleplugRadio::new().await.expect("no Bluetooth adapter"));
    let monitor = Arc::new(HeartRateMonitor::new(radio, device_id()).unwrap());

    let stream = HeartRateStream::new(Arc::clone(&monitor), StreamOptions::default())
        .await
        .unwrap();
    let samples: Vec<u8> = timeout(BLE_TIMEOUT, stream.take(5).collect())
        .await
        .expect("no heart rate samples received");

    println!("Samples: {samples:?}");
    assert_eq!(samples.len(), 5);
    assert!(samples.iter().all(|&bpm| bpm > 0));

    monitor.disconnect().await.unwrap();
}
