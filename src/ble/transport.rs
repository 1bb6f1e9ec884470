//! BLE transport bootstrap and the connect guard.
//!
//! All device workers share one BLE host stack, and common host stacks
//! misbehave when two connection sequences race. Connection establishment
//! therefore goes through [`BleTransport::acquire_connection`], which holds
//! an async mutex for the whole lookup + connect sequence of one device.
//! Reads and writes on established connections are never serialized.

use std::time::Duration;

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::StreamExt;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};

/// How long to scan for a configured peripheral the adapter does not
/// already know about before failing this connection attempt.
const DISCOVERY_WINDOW: Duration = Duration::from_secs(10);

/// Shared BLE transport: one adapter plus the guard serializing connects.
pub struct BleTransport {
    /// The adapter used for every configured device.
    adapter: Adapter,
    /// Held across the whole lookup + connect sequence of one device.
    connect_lock: Mutex<()>,
}

impl BleTransport {
    /// Create a transport on the first available Bluetooth adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|_e| Error::BluetoothUnavailable)?;

        let adapters = manager.adapters().await.map_err(Error::Bluetooth)?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(Error::BluetoothUnavailable)?;

        info!(
            "Using Bluetooth adapter: {:?}",
            adapter.adapter_info().await.ok()
        );

        Ok(Self::with_adapter(adapter))
    }

    /// Create a transport with a specific adapter.
    pub fn with_adapter(adapter: Adapter) -> Self {
        Self {
            adapter,
            connect_lock: Mutex::new(()),
        }
    }

    /// Establish a connection to the peripheral with the given address.
    ///
    /// Waits until any in-flight connection attempt by another worker
    /// completes, then performs its own lookup + connect exclusively. The
    /// returned peripheral is connected; service discovery and all
    /// subsequent reads and writes happen outside the guard.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`] if the address never shows up
    /// within the discovery window, or [`Error::ConnectionFailed`] if the
    /// link cannot be established.
    pub async fn acquire_connection(&self, address: &str) -> Result<Peripheral> {
        let _guard = self.connect_lock.lock().await;
        debug!("Connect guard acquired for {}", address);

        let peripheral = match self.find_known_peripheral(address).await? {
            Some(p) => p,
            None => {
                debug!("{} not in adapter cache, scanning", address);
                self.scan_for_peripheral(address).await?
            }
        };

        peripheral
            .connect()
            .await
            .map_err(|e| Error::ConnectionFailed {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        debug!("Link established to {}", address);
        Ok(peripheral)
    }

    /// Get the underlying adapter.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Look for the address among peripherals the adapter already knows.
    async fn find_known_peripheral(&self, address: &str) -> Result<Option<Peripheral>> {
        let peripherals = self.adapter.peripherals().await.map_err(Error::Bluetooth)?;

        for peripheral in peripherals {
            if Self::peripheral_matches(&peripheral, address).await {
                return Ok(Some(peripheral));
            }
        }

        Ok(None)
    }

    /// Scan until the address shows up or the discovery window closes.
    async fn scan_for_peripheral(&self, address: &str) -> Result<Peripheral> {
        let mut events = self.adapter.events().await.map_err(Error::Bluetooth)?;

        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(Error::Bluetooth)?;

        let found = timeout(DISCOVERY_WINDOW, async {
            while let Some(event) = events.next().await {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                    _ => continue,
                };

                let peripheral = match self.adapter.peripheral(&id).await {
                    Ok(p) => p,
                    Err(e) => {
                        trace!("Failed to get peripheral {:?}: {}", id, e);
                        continue;
                    }
                };

                if Self::peripheral_matches(&peripheral, address).await {
                    return Some(peripheral);
                }
            }
            None
        })
        .await
        .unwrap_or(None);

        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }

        found.ok_or_else(|| Error::DeviceNotFound {
            address: address.to_string(),
        })
    }

    /// Check whether a peripheral's reported address matches the
    /// configured one.
    async fn peripheral_matches(peripheral: &Peripheral, address: &str) -> bool {
        match peripheral.properties().await {
            Ok(Some(props)) => addresses_equal(&props.address.to_string(), address),
            _ => false,
        }
    }
}

/// Compare two BLE addresses ignoring case and colon separators.
fn addresses_equal(a: &str, b: &str) -> bool {
    a.to_lowercase().replace(':', "") == b.to_lowercase().replace(':', "")
}
