//! usb-monitor
//!
//! Tracks attached USB devices and executes safe-eject requests.
//! Emits one JSON status line per polling tick on standard output and reads
//! `safe_eject: <drive>` commands from standard input.

use anyhow::{Context, Result};
use clap::Parser;
use common::setup_logging;
use monitor::command::spawn_command_reader;
use monitor::config::MonitorConfig;
use monitor::platform;
use monitor::reporter::Reporter;
use monitor::state::MonitorState;
use monitor::usb::{DeviceEnumerator, DeviceSource, EjectOrchestrator};
use std::io::BufReader;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "usb-monitor")]
#[command(
    author,
    version,
    about = "USB Monitor - Track USB devices and eject removable drives safely"
)]
#[command(long_about = "
Polls the host for attached USB devices and writes one JSON status report
per tick to standard output. Safe-eject requests are read from standard
input, one per line, in the form 'safe_eject: E:\\'.

EXAMPLES:
    # Run with default config
    usb-monitor

    # Run with custom config
    usb-monitor --config ~/monitor.toml

    # List USB devices and exit
    usb-monitor --list-devices

    # Emit a single status report and exit
    usb-monitor --once

    # Run with debug logging (written to standard error)
    usb-monitor --log-level debug

CONFIGURATION:
    The monitor looks for configuration files in the following order:
    1. Path specified with --config
    2. <config dir>/usb-monitor/monitor.toml
    3. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// List USB devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Emit one status report and exit
    #[arg(long)]
    once: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --save-config flag early (before loading config)
    if args.save_config {
        let config = MonitorConfig::default();
        let path = MonitorConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        MonitorConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        MonitorConfig::load_or_default()
    };

    // Use CLI log level if specified, otherwise use config value
    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.monitor.log_level);

    setup_logging(log_level).context("Failed to setup logging")?;

    info!("usb-monitor v{}", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", log_level);

    let state = Arc::new(MonitorState::new(&config.retention));
    let reporter = Reporter::new(DeviceEnumerator::new(platform::device_source()), state.clone());

    if args.list_devices {
        return list_devices_mode(&reporter).await;
    }

    if args.once {
        let mut stdout = std::io::stdout();
        reporter
            .emit(&mut stdout)
            .await
            .context("Failed to emit status report")?;
        return Ok(());
    }

    let orchestrator = Arc::new(EjectOrchestrator::new(
        platform::eject_backend(),
        state,
        config.eject.retry_delay(),
    ));

    // Detached: the reader lives until end of input or process exit
    let _command_reader = spawn_command_reader(BufReader::new(std::io::stdin()), orchestrator)
        .context("Failed to spawn command reader thread")?;

    info!("Press Ctrl+C to shutdown");

    tokio::select! {
        _ = reporter.run(config.monitor.poll_interval(), std::io::stdout()) => {}
        result = signal::ctrl_c() => match result {
            Ok(()) => info!("Received Ctrl+C, shutting down..."),
            Err(e) => error!("Error waiting for Ctrl+C: {}", e),
        }
    }

    info!("Monitor shutdown complete");
    Ok(())
}

/// List USB devices and exit
async fn list_devices_mode<S: DeviceSource + 'static>(reporter: &Reporter<S>) -> Result<()> {
    info!("Listing USB devices...");

    let snapshot = reporter
        .snapshot()
        .await
        .context("Failed to enumerate devices")?;

    if snapshot.is_empty() {
        println!("No USB devices found.");
        return Ok(());
    }

    println!("Found {} USB device(s):\n", snapshot.len());
    for (key, device) in snapshot.iter() {
        let kind = match (device.is_storage, device.is_cdrom(), device.is_flash()) {
            (true, true, _) => "CD-ROM",
            (true, _, true) => "Removable",
            (true, _, _) => "Storage",
            _ => "Device",
        };
        println!("  [{}] {} - {}", kind, key, device.friendly_name);
        if !device.hardware_id.is_empty() {
            println!("      Hardware ID: {}", device.hardware_id);
        }
        if !device.device_instance_id.is_empty() {
            println!("      Instance ID: {}", device.device_instance_id);
        }
        println!(
            "      Path: {}  Safe to eject: {}",
            device.path,
            if device.safe_to_eject { "yes" } else { "no" }
        );
        println!();
    }

    Ok(())
}
