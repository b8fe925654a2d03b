//! One-shot battery and body location reads.

use anyhow::{Context, Result};
use hrm_core::{HeartRateMonitor, Radio};
use tokio::time::{error::Elapsed, timeout};
use tracing::debug;

use crate::cli::OutputFormat;
use crate::commands::open_monitor;
use crate::config::Resolved;

fn finish<T>(
    result: std::result::Result<hrm_core::Result<T>, Elapsed>,
    what: &str,
    resolved: &Resolved,
) -> Result<T> {
    result
        .with_context(|| format!("Timed out reading {} from {}", what, resolved.device))?
        .with_context(|| format!("Failed to read {}", what))
}

/// Disconnect after a read. The read result is what gets reported.
async fn release<R: Radio>(monitor: &HeartRateMonitor<R>) {
    if let Err(e) = monitor.disconnect().await {
        debug!("Disconnect after read failed: {}", e);
    }
}

pub async fn cmd_battery(resolved: Resolved, verbose: bool) -> Result<()> {
    let monitor = open_monitor(&resolved, verbose).await?;
    let result = timeout(resolved.timeout, monitor.get_battery_level()).await;
    release(&monitor).await;
    let level = finish(result, "battery level", &resolved)?;

    match resolved.format {
        OutputFormat::Text => println!("Battery: {}%", level),
        OutputFormat::Json => println!("{}", serde_json::json!({ "battery": level })),
    }
    Ok(())
}

pub async fn cmd_location(resolved: Resolved, verbose: bool) -> Result<()> {
    let monitor = open_monitor(&resolved, verbose).await?;
    let result = timeout(resolved.timeout, monitor.get_body_location()).await;
    release(&monitor).await;
    let location = finish(result, "body sensor location", &resolved)?;

    match resolved.format {
        OutputFormat::Text => println!("Body sensor location: {}", location),
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "location": location.as_str(), "code": location as u8 })
        ),
    }
    Ok(())
}
