//! Scan command implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use hrm_core::scan::{self, DiscoveredPeripheral, ScanOptions};
use hrm_core::{BtleplugRadio, Radio};

use crate::cli::OutputFormat;

fn format_json(peripherals: &[DiscoveredPeripheral]) -> Result<String> {
    let entries: Vec<serde_json::Value> = peripherals
        .iter()
        .map(|p| {
            serde_json::json!({
                "id": p.id(),
                "name": p.advertisement.local_name,
                "rssi": p.advertisement.rssi,
                "heart_rate": p.is_heart_rate_monitor(),
            })
        })
        .collect();
    serde_json::to_string_pretty(&entries).context("Failed to serialize scan results")
}

fn format_text(peripherals: &[DiscoveredPeripheral]) -> String {
    if peripherals.is_empty() {
        return "No devices found.\n".to_string();
    }
    let mut out = String::new();
    for peripheral in peripherals {
        out.push_str(&peripheral.to_string());
        out.push('\n');
    }
    out
}

pub async fn cmd_scan(timeout: u64, all: bool, follow: bool, format: OutputFormat) -> Result<()> {
    let radio = Arc::new(
        BtleplugRadio::new()
            .await
            .context("Failed to open Bluetooth adapter")?,
    );

    if follow {
        let mut advertisements = scan::advertisements(Arc::clone(&radio)).await?;
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    eprintln!("\nShutting down...");
                    break;
                }
                advertisement = advertisements.next() => match advertisement {
                    Some(advertisement) => match format {
                        OutputFormat::Text => println!("{advertisement}"),
                        OutputFormat::Json => println!(
                            "{}",
                            serde_json::json!({
                                "id": advertisement.id,
                                "name": advertisement.local_name,
                                "rssi": advertisement.rssi,
                            })
                        ),
                    },
                    None => break,
                },
            }
        }
        radio.stop_scan().await.ok();
        return Ok(());
    }

    let mut options = ScanOptions::new().duration(Duration::from_secs(timeout));
    if !all {
        options = options.heart_rate_only();
    }
    let peripherals = scan::scan(radio.as_ref(), options)
        .await
        .context("Failed to scan for devices")?;

    match format {
        OutputFormat::Json => println!("{}", format_json(&peripherals)?),
        OutputFormat::Text => print!("{}", format_text(&peripherals)),
    }
    Ok(())
}
