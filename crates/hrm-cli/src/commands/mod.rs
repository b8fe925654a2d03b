//! Command implementations.

mod read;
mod scan;
mod watch;

pub use read::{cmd_battery, cmd_location};
pub use scan::cmd_scan;
pub use watch::cmd_watch;

use std::sync::Arc;

use anyhow::{Context, Result};
use hrm_core::{BluetoothMonitor, BtleplugRadio, HeartRateMonitor, MonitorConfig, TargetDescriptor};

use crate::config::{Config, Resolved};

/// Build a monitor for the resolved device on the first Bluetooth adapter.
pub async fn open_monitor(resolved: &Resolved, verbose: bool) -> Result<BluetoothMonitor> {
    let radio = BtleplugRadio::new()
        .await
        .context("Failed to open Bluetooth adapter")?;
    let target = TargetDescriptor::new(resolved.device.as_str()).verbose(verbose);
    let config = MonitorConfig::default().connection_timeout(resolved.timeout);
    HeartRateMonitor::with_config(Arc::new(radio), target, config)
        .context("Invalid device configuration")
}

pub fn cmd_config(set_device: Option<String>, mut config: Config) -> Result<()> {
    let path = Config::path();
    if let Some(device) = set_device {
        config.device = Some(device);
        config.save()?;
        println!("Saved default device to {}", path.display());
        return Ok(());
    }

    println!("# {}", path.display());
    print!(
        "{}",
        toml::to_string_pretty(&config).context("Failed to serialize config")?
    );
    Ok(())
}
