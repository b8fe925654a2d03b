//! Watch command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use hrm_core::{DeviceEvent, HeartRateStream, StreamOptions};
use tracing::{info, warn};

use crate::cli::OutputFormat;
use crate::commands::open_monitor;
use crate::config::Resolved;

fn format_sample(bpm: u8, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("{} bpm", bpm),
        OutputFormat::Json => serde_json::json!({ "bpm": bpm }).to_string(),
    }
}

pub async fn cmd_watch(resolved: Resolved, count: Option<usize>, verbose: bool) -> Result<()> {
    let monitor = Arc::new(open_monitor(&resolved, verbose).await?);
    let mut samples = HeartRateStream::new(Arc::clone(&monitor), StreamOptions::default())
        .await
        .context("Failed to start heart rate monitor")?;
    let mut events = samples.events();
    info!("Waiting for {}...", resolved.device);

    let mut received = 0usize;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nShutting down...");
                break;
            }
            sample = samples.next() => match sample {
                Some(bpm) => {
                    println!("{}", format_sample(bpm, resolved.format));
                    received += 1;
                    if count.is_some_and(|limit| received >= limit) {
                        break;
                    }
                }
                None => break,
            },
            event = events.recv() => match event {
                Ok(DeviceEvent::Connected { id }) => info!("Connected to {}", id),
                Ok(DeviceEvent::Disconnected { id }) => warn!("{} disconnected, reconnecting", id),
                Ok(DeviceEvent::Error { error }) => warn!("{}", error),
                _ => {}
            },
        }
    }

    samples.close();
    monitor.disconnect().await.context("Failed to disconnect")?;
    Ok(())
}
