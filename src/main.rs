pub mod bridge;
pub mod config;
pub mod controller;
pub mod device;
pub mod haptics;
pub mod osc;
pub mod persistence;

use crate::bridge::{Bridge, BridgeHandle};
use crate::config::{BridgeSettings, Cli};
use crate::device::{DeviceManager, GilrsBackend};
use crate::persistence::ProfileStore;
use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup(cli.verbose)?;

    let settings = BridgeSettings::from_cli(&cli);
    let backend =
        GilrsBackend::new().map_err(|e| eyre!("Failed to initialize input backend: {}", e))?;

    if cli.list_devices {
        let devices = DeviceManager::new(backend);
        if devices.list_devices().is_empty() {
            println!("No input devices found");
        }
        for device in devices.list_devices() {
            println!("{}", device);
        }
        return Ok(());
    }

    info!("Loading profiles from {}", settings.config_path.display());
    let store = ProfileStore::load(settings.config_path.clone()).await;
    let (bridge, handle) = Bridge::new(backend, store, settings);

    let driver = tokio::spawn(drive(handle, cli));

    // gilrs is not Send, the bridge stays on the main task
    bridge.run().await;

    if let Err(e) = driver.await {
        warn!("Startup task ended abnormally: {}", e);
    }
    Ok(())
}

/// Applies the command line startup choices, then waits for Ctrl-C
async fn drive(handle: BridgeHandle, cli: Cli) {
    if let Some(name) = cli.profile.as_deref() {
        if let Err(e) = handle.select_profile(name).await {
            warn!("Unable to activate profile {}: {}", name, e);
        }
    }

    let index = cli.device.unwrap_or(0);
    match handle.select_device(index).await {
        Ok(device) => info!("Using [{}] {}", device.index, device.name),
        Err(e) => warn!("Unable to open device {}: {}", index, e),
    }

    if !cli.no_stream {
        if let Err(e) = handle.start_streaming().await {
            error!("Streaming not started: {}", e);
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Ctrl-C received"),
        Err(e) => error!("Unable to listen for Ctrl-C: {}", e),
    }

    if let Err(e) = handle.shutdown().await {
        error!("Shutdown failed: {}", e);
    }
}

fn setup(verbose: bool) -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env(if verbose { Level::DEBUG } else { Level::INFO });
    Ok(())
}

fn setup_logging_env(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
