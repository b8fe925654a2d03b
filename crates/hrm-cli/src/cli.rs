//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "hrm")]
#[command(author, version, about = "CLI for Bluetooth heart rate monitors", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Reusable device connection arguments
#[derive(Debug, Clone, Args)]
pub struct DeviceArgs {
    /// Device identifier (MAC address, or CoreBluetooth UUID on macOS), or use HRM_DEVICE env var
    #[arg(short, long, env = "HRM_DEVICE")]
    pub device: Option<String>,

    /// Connection timeout in seconds
    #[arg(short = 'T', long)]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan for nearby BLE peripherals
    Scan {
        /// Scan duration in seconds
        #[arg(short, long, default_value = "5")]
        timeout: u64,

        /// List every advertiser, not only heart rate monitors
        #[arg(short, long)]
        all: bool,

        /// Keep printing advertisements until interrupted
        #[arg(long, conflicts_with = "timeout")]
        follow: bool,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Stream heart rate samples
    Watch {
        #[command(flatten)]
        device: DeviceArgs,

        /// Stop after this many samples
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// Read the battery level
    Battery {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Read the body sensor location
    Location {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Show or update the configuration file
    Config {
        /// Save this device as the default
        #[arg(long)]
        set_device: Option<String>,
    },
}
