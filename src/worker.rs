//! Per-device supervisor loop.
//!
//! One [`DeviceWorker`] runs per configured device, as its own tokio task,
//! and keeps that device reporting indefinitely. The loop has two levels:
//! the outer level builds a fresh session (connect, authenticate), the
//! inner level polls it (temperatures, battery, publish, sleep). Any
//! failure anywhere discards the session, sleeps one interval and
//! reconnects from scratch; nothing a device does can stop its worker or
//! touch any other device's worker.
//!
//! Shutdown is cooperative: the shared run flag is checked at the top of
//! the outer loop and after each inner-loop sleep, never mid-call. A
//! worker may therefore take up to one interval plus one connect attempt
//! to notice shutdown; that latency is part of the contract.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::ble::session::BleConnector;
use crate::ble::transport::BleTransport;
use crate::catalog::DeviceType;
use crate::config::DeviceConfig;
use crate::error::Result;
use crate::reading::Reading;
use crate::telemetry::TelemetrySink;
use crate::traits::{ProbeSession, SessionConnector};

/// Supervisor for one configured device.
pub struct DeviceWorker {
    name: String,
    address: String,
    topic: String,
    interval: Duration,
    connector: Arc<dyn SessionConnector>,
    sink: Arc<dyn TelemetrySink>,
    running: Arc<AtomicBool>,
}

impl DeviceWorker {
    /// Create a worker over explicit seams.
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        topic: impl Into<String>,
        interval: Duration,
        connector: Arc<dyn SessionConnector>,
        sink: Arc<dyn TelemetrySink>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            topic: topic.into(),
            interval,
            connector,
            sink,
            running,
        }
    }

    /// Build a worker for one configured device on the shared transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownDeviceType`](crate::Error::UnknownDeviceType)
    /// for an unrecognized `type` string. This is the one error that is not
    /// retried: the worker for that device never starts, while every other
    /// configured device is unaffected.
    pub fn from_config(
        config: &DeviceConfig,
        transport: Arc<BleTransport>,
        sink: Arc<dyn TelemetrySink>,
        running: Arc<AtomicBool>,
    ) -> Result<Self> {
        let device_type = DeviceType::from_config_name(&config.device_type)?;
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| device_type.default_name().to_string());
        let connector = BleConnector::new(transport, config.address.clone(), device_type);

        Ok(Self::new(
            name,
            config.address.clone(),
            config.topic.clone(),
            config.interval(),
            Arc::new(connector),
            sink,
            running,
        ))
    }

    /// Run until the shared run flag is cleared.
    ///
    /// Never returns early: every connection, authentication, read and
    /// publish failure is logged and answered with one interval of sleep
    /// followed by a fresh session.
    pub async fn run(self) {
        info!(
            "Worker started for {} ({}), polling every {:?}",
            self.name, self.address, self.interval
        );

        while self.running.load(Ordering::SeqCst) {
            debug!("{}: connecting to {}", self.name, self.address);

            if let Err(e) = self.connect_and_poll().await {
                warn!(
                    "{} ({}): {}; retrying in {:?}",
                    self.name, self.address, e, self.interval
                );
                sleep(self.interval).await;
            }
        }

        info!("Worker stopped for {} ({})", self.name, self.address);
    }

    /// One outer-loop pass: fresh session, poll until something fails or
    /// shutdown is observed. The session is disconnected on every exit
    /// path and never reused.
    async fn connect_and_poll(&self) -> Result<()> {
        let session = self.connector.connect().await?;
        let result = self.poll(session.as_ref()).await;
        let _ = session.disconnect().await;
        result
    }

    async fn poll(&self, session: &dyn ProbeSession) -> Result<()> {
        session.authenticate().await?;

        match session.read_firmware_version().await {
            Ok(version) => info!("{} ({}): firmware {}", self.name, self.address, version),
            Err(e) => debug!("{}: firmware version read failed: {}", self.name, e),
        }

        loop {
            // Fixed order within a cycle: temperatures, then battery
            let temperatures = session.read_temperatures().await?;
            let battery = session.read_battery().await?;
            let reading = Reading::new(temperatures, battery);

            self.sink.publish(&reading, &self.topic).await?;
            debug!(
                "{}: published {} probe value(s) and battery {}% to {}",
                self.name,
                reading.attached_probes().count(),
                reading.battery_percent,
                self.topic
            );

            sleep(self.interval).await;

            if !self.running.load(Ordering::SeqCst) {
                debug!("{}: shutdown observed, ending poll loop", self.name);
                return Ok(());
            }
        }
    }
}
