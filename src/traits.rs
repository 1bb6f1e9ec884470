//! Trait abstractions for device sessions.
//!
//! These traits sit between the per-device worker and the BLE layer so the
//! supervisor loop can be exercised with scripted sessions in tests.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::Result;

/// Trait abstracting one authenticated connection to an iGrill device.
///
/// Implemented by [`DeviceSession`](crate::DeviceSession) for real hardware.
/// A session is single-use: once any operation fails, callers discard it and
/// connect a fresh one.
#[async_trait]
pub trait ProbeSession: Send + Sync {
    /// Perform the iDevices challenge/response handshake.
    ///
    /// Must complete once, directly after connecting, before any read.
    /// On failure the session is unusable.
    async fn authenticate(&self) -> Result<()>;

    /// Read every probe channel in index order (1-based).
    ///
    /// A channel maps to `None` when no physical probe is attached.
    async fn read_temperatures(&self) -> Result<BTreeMap<u8, Option<f64>>>;

    /// Read the battery charge as a 0-100 percentage.
    async fn read_battery(&self) -> Result<f64>;

    /// Read the device firmware version string.
    async fn read_firmware_version(&self) -> Result<String>;

    /// Disconnect the underlying link.
    async fn disconnect(&self) -> Result<()>;

    /// Number of probe channels this session reads.
    fn probe_count(&self) -> u8;
}

/// Trait abstracting how a worker obtains a fresh connected session.
///
/// Every call establishes a brand-new link; sessions are never reused
/// across connection attempts.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Connect to the device and return a session ready to authenticate.
    async fn connect(&self) -> Result<Box<dyn ProbeSession>>;
}
