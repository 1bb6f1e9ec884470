// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # igrill-mqtt
//!
//! Polls iDevices iGrill Bluetooth grill thermometers (Mini, v2, v3) and
//! forwards probe temperatures and battery level to the Cayenne MQTT sink.
//!
//! Each configured device gets its own supervisor task that connects,
//! performs the iDevices challenge/response handshake, and then reads and
//! publishes on a fixed interval. Failures never spread: a device that is
//! out of range retries forever on its own schedule while the others keep
//! reporting.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//!
//! use igrill_mqtt::{BleTransport, CayenneClient, Config, DeviceWorker};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_validated("config.toml")?;
//!
//!     let sink = Arc::new(CayenneClient::connect(&config.cayenne)?);
//!     let transport = Arc::new(BleTransport::new().await?);
//!     let running = Arc::new(AtomicBool::new(true));
//!
//!     let worker = DeviceWorker::from_config(
//!         &config.devices[0],
//!         transport,
//!         sink,
//!         running,
//!     )?;
//!     worker.run().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Pairing
//!
//! iGrill devices require an existing bond; this crate does not create
//! one. On Linux, pair once with `bluetoothctl` before starting the
//! bridge.
//!
//! ## Platform Notes
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group.
//!
//! ### macOS
//! Requires Bluetooth permission. Add `NSBluetoothAlwaysUsageDescription`
//! to your Info.plist for bundled apps.
//!
//! ### Windows
//! Requires Windows 10 or later with Bluetooth LE support.

// Public modules
pub mod ble;
pub mod catalog;
pub mod config;
pub mod error;
pub mod reading;
pub mod telemetry;
pub mod traits;
pub mod worker;

// Re-exports for convenience
pub use ble::session::{BleConnector, CharacteristicMap, DeviceSession};
pub use ble::transport::BleTransport;
pub use catalog::DeviceType;
pub use config::{CayenneConfig, Config, ConfigError, DeviceConfig};
pub use error::{Error, Result};
pub use reading::{RawTemperature, Reading};
pub use telemetry::{CayenneClient, TelemetrySink};
pub use traits::{ProbeSession, SessionConnector};
pub use worker::DeviceWorker;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Verify that key types are exported
        let _ = std::any::TypeId::of::<BleTransport>();
        let _ = std::any::TypeId::of::<DeviceSession>();
        let _ = std::any::TypeId::of::<DeviceType>();
        let _ = std::any::TypeId::of::<DeviceWorker>();
        let _ = std::any::TypeId::of::<Error>();
        let _ = std::any::TypeId::of::<RawTemperature>();
        let _ = std::any::TypeId::of::<Reading>();
        let _ = std::any::TypeId::of::<Config>();
    }
}
