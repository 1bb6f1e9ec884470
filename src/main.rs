//! iGrill to Cayenne MQTT bridge.
//!
//! Loads the TOML configuration, connects the telemetry sink, spawns one
//! worker task per configured device and runs until Ctrl-C.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use igrill_mqtt::{BleTransport, CayenneClient, Config, DeviceWorker, TelemetrySink};

/// Poll iDevices iGrill thermometers over BLE and publish readings to
/// Cayenne MQTT.
#[derive(Parser, Debug)]
#[command(name = "igrill-mqtt")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Log level when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let config = Config::load_validated(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    if config.devices.is_empty() {
        warn!("No devices in config");
    }

    let sink = Arc::new(CayenneClient::connect(&config.cayenne)?);
    let transport = Arc::new(BleTransport::new().await?);
    let running = Arc::new(AtomicBool::new(true));

    let mut workers = Vec::new();
    for device in &config.devices {
        match DeviceWorker::from_config(
            device,
            Arc::clone(&transport),
            Arc::clone(&sink) as Arc<dyn TelemetrySink>,
            Arc::clone(&running),
        ) {
            Ok(worker) => workers.push(tokio::spawn(worker.run())),
            // Fatal for this device only; the rest keep running
            Err(e) => error!("Not starting worker for {}: {}", device.address, e),
        }
    }

    if workers.is_empty() {
        anyhow::bail!("no startable devices, nothing to do");
    }

    info!("Started {} worker(s), press Ctrl-C to stop", workers.len());

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;

    info!("Shutdown requested, waiting for workers to finish their cycle");
    running.store(false, Ordering::SeqCst);

    for worker in workers {
        let _ = worker.await;
    }

    sink.disconnect().await;
    info!("Bye");

    Ok(())
}
