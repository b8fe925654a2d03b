use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands};
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load();

    // --quiet wins over RUST_LOG; --verbose also turns on target logging.
    let verbose = cli.verbose || config.verbose;
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Scan {
            timeout,
            all,
            follow,
            format,
        } => {
            let format = format.or(config.format).unwrap_or_default();
            commands::cmd_scan(timeout, all, follow, format).await
        }
        Commands::Watch { device, count } => {
            let resolved = config::resolve(&device, &config)?;
            commands::cmd_watch(resolved, count, verbose).await
        }
        Commands::Battery { device } => {
            let resolved = config::resolve(&device, &config)?;
            commands::cmd_battery(resolved, verbose).await
        }
        Commands::Location { device } => {
            let resolved = config::resolve(&device, &config)?;
            commands::cmd_location(resolved, verbose).await
        }
        Commands::Config { set_device } => commands::cmd_config(set_device, config),
    }
}
