//! Authenticated iGrill device sessions.
//!
//! A [`DeviceSession`] owns one connection to one physical device from the
//! moment the link is established until it is discarded. Connecting
//! resolves every characteristic handle the session will ever use; the
//! handles are only valid for that connection and are rebuilt from scratch
//! on every reconnect.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::ble::transport::BleTransport;
use crate::ble::uuids::{
    probe_temperature_uuid, APP_CHALLENGE_UUID, BATTERY_LEVEL_UUID, DEVICE_CHALLENGE_UUID,
    DEVICE_RESPONSE_UUID, FIRMWARE_VERSION_UUID,
};
use crate::catalog::DeviceType;
use crate::error::{Error, Result};
use crate::reading::RawTemperature;
use crate::traits::{ProbeSession, SessionConnector};

/// The fixed app challenge: 16 zero bytes.
///
/// The device's encrypted reply is accepted by echoing it straight back.
/// The full protocol would decrypt the reply, check that its first 8
/// plaintext bytes match the challenge, zero them, and re-encrypt; with an
/// all-zero challenge the reply already satisfies the check as-is, so no
/// key material is required. Changing this value breaks authentication.
const APP_CHALLENGE: [u8; 16] = [0; 16];

/// Resolved characteristic handles for one connection.
///
/// Valid only for the session that produced it and never reused across
/// reconnects.
#[derive(Debug)]
pub struct CharacteristicMap {
    firmware_version: Characteristic,
    battery_level: Characteristic,
    app_challenge: Characteristic,
    device_challenge: Characteristic,
    device_response: Characteristic,
    /// Index `i` holds the temperature characteristic for probe `i + 1`.
    probe_temperatures: Vec<Characteristic>,
}

impl CharacteristicMap {
    /// Resolve all required handles from an enumerated characteristic set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CharacteristicNotFound`] for the first required
    /// UUID that is absent, which usually means the configured device type
    /// does not match the hardware at that address.
    pub fn resolve<I>(characteristics: I, probe_count: u8) -> Result<Self>
    where
        I: IntoIterator<Item = Characteristic>,
    {
        let mut by_uuid: HashMap<Uuid, Characteristic> = characteristics
            .into_iter()
            .map(|c| (c.uuid, c))
            .collect();

        let mut take = |uuid: Uuid| {
            by_uuid
                .remove(&uuid)
                .ok_or_else(|| Error::CharacteristicNotFound {
                    uuid: uuid.to_string(),
                })
        };

        let firmware_version = take(FIRMWARE_VERSION_UUID)?;
        let battery_level = take(BATTERY_LEVEL_UUID)?;
        let app_challenge = take(APP_CHALLENGE_UUID)?;
        let device_challenge = take(DEVICE_CHALLENGE_UUID)?;
        let device_response = take(DEVICE_RESPONSE_UUID)?;

        let mut probe_temperatures = Vec::with_capacity(usize::from(probe_count));
        for probe in 1..=probe_count {
            let uuid =
                probe_temperature_uuid(probe).ok_or_else(|| Error::CharacteristicNotFound {
                    uuid: format!("probe {} temperature", probe),
                })?;
            probe_temperatures.push(take(uuid)?);
        }

        Ok(Self {
            firmware_version,
            battery_level,
            app_challenge,
            device_challenge,
            device_response,
            probe_temperatures,
        })
    }
}

/// The live authenticated connection for one device.
///
/// Exclusively owned by one device worker and discarded whenever any
/// operation on it fails; retry logic lives in the worker, never here.
pub struct DeviceSession {
    peripheral: Peripheral,
    address: String,
    characteristics: CharacteristicMap,
    probe_count: u8,
}

impl DeviceSession {
    /// Connect to a device and resolve its characteristic map.
    ///
    /// The connect step itself is serialized through the transport guard;
    /// service discovery and handle resolution run after the guard is
    /// released. iDevices hardware requires an existing bond (pair with
    /// `bluetoothctl` on Linux first); without one the encrypted
    /// characteristics are not readable.
    pub async fn connect(
        transport: &BleTransport,
        address: &str,
        device_type: DeviceType,
    ) -> Result<Self> {
        debug!("Trying to connect to {} ({})", address, device_type);

        let peripheral = transport.acquire_connection(address).await?;

        if let Err(e) = peripheral.discover_services().await {
            let _ = peripheral.disconnect().await;
            return Err(Error::ConnectionFailed {
                address: address.to_string(),
                reason: format!("service discovery failed: {}", e),
            });
        }

        let discovered: Vec<Characteristic> = peripheral
            .services()
            .into_iter()
            .flat_map(|service| service.characteristics)
            .collect();
        trace!("{}: discovered {} characteristics", address, discovered.len());

        let characteristics =
            match CharacteristicMap::resolve(discovered, device_type.probe_count()) {
                Ok(map) => map,
                Err(e) => {
                    let _ = peripheral.disconnect().await;
                    return Err(e);
                }
            };

        info!("Connected to {} ({})", address, device_type);

        Ok(Self {
            peripheral,
            address: address.to_string(),
            characteristics,
            probe_count: device_type.probe_count(),
        })
    }

    /// Perform the iDevices challenge/response handshake.
    ///
    /// Writes the all-zero app challenge, reads the device challenge, and
    /// writes those exact bytes back to the response characteristic. See
    /// [`APP_CHALLENGE`] for why the echo satisfies the device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthenticationFailed`] naming the handshake step
    /// that failed. The session must be discarded afterwards.
    pub async fn authenticate(&self) -> Result<()> {
        debug!("{}: authenticating", self.address);

        self.peripheral
            .write(
                &self.characteristics.app_challenge,
                &APP_CHALLENGE,
                WriteType::WithResponse,
            )
            .await
            .map_err(|e| Error::AuthenticationFailed {
                reason: format!("app challenge write: {}", e),
            })?;

        let device_challenge = self
            .peripheral
            .read(&self.characteristics.device_challenge)
            .await
            .map_err(|e| Error::AuthenticationFailed {
                reason: format!("device challenge read: {}", e),
            })?;
        trace!(
            "{}: device challenge is {} bytes",
            self.address,
            device_challenge.len()
        );

        self.peripheral
            .write(
                &self.characteristics.device_response,
                &device_challenge,
                WriteType::WithResponse,
            )
            .await
            .map_err(|e| Error::AuthenticationFailed {
                reason: format!("device response write: {}", e),
            })?;

        debug!("{}: authenticated", self.address);
        Ok(())
    }

    /// Read the battery charge as a 0-100 percentage.
    pub async fn read_battery(&self) -> Result<f64> {
        let data = self
            .peripheral
            .read(&self.characteristics.battery_level)
            .await
            .map_err(|e| Error::ReadFailed {
                context: format!("battery level: {}", e),
            })?;

        let level = data.first().ok_or_else(|| Error::ReadFailed {
            context: "battery level returned no data".to_string(),
        })?;

        Ok(f64::from(*level))
    }

    /// Read every probe channel, freshly, in index order.
    ///
    /// Each probe is two bytes, low byte first; the sentinel value maps to
    /// `None`. Values are never cached between calls.
    pub async fn read_temperatures(&self) -> Result<BTreeMap<u8, Option<f64>>> {
        let mut temperatures = BTreeMap::new();

        for (index, characteristic) in self.characteristics.probe_temperatures.iter().enumerate() {
            let probe = index as u8 + 1;

            let data = self
                .peripheral
                .read(characteristic)
                .await
                .map_err(|e| Error::ReadFailed {
                    context: format!("probe {} temperature: {}", probe, e),
                })?;

            if data.len() < 2 {
                return Err(Error::ReadFailed {
                    context: format!(
                        "probe {} temperature returned {} byte(s), expected 2",
                        probe,
                        data.len()
                    ),
                });
            }

            let raw = RawTemperature::from_le_bytes([data[0], data[1]]);
            trace!("{}: probe {} raw value {}", self.address, probe, raw.raw_value());
            temperatures.insert(probe, raw.temperature());
        }

        Ok(temperatures)
    }

    /// Read the device firmware version string.
    pub async fn read_firmware_version(&self) -> Result<String> {
        let data = self
            .peripheral
            .read(&self.characteristics.firmware_version)
            .await
            .map_err(|e| Error::ReadFailed {
                context: format!("firmware version: {}", e),
            })?;

        Ok(String::from_utf8_lossy(&data)
            .trim_end_matches('\0')
            .to_string())
    }

    /// Disconnect the underlying link.
    pub async fn disconnect(&self) -> Result<()> {
        debug!("Disconnecting from {}", self.address);
        self.peripheral.disconnect().await.map_err(Error::Bluetooth)
    }

    /// The address this session is connected to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Number of probe channels this session reads.
    pub fn probe_count(&self) -> u8 {
        self.probe_count
    }
}

#[async_trait]
impl ProbeSession for DeviceSession {
    async fn authenticate(&self) -> Result<()> {
        DeviceSession::authenticate(self).await
    }

    async fn read_temperatures(&self) -> Result<BTreeMap<u8, Option<f64>>> {
        DeviceSession::read_temperatures(self).await
    }

    async fn read_battery(&self) -> Result<f64> {
        DeviceSession::read_battery(self).await
    }

    async fn read_firmware_version(&self) -> Result<String> {
        DeviceSession::read_firmware_version(self).await
    }

    async fn disconnect(&self) -> Result<()> {
        DeviceSession::disconnect(self).await
    }

    fn probe_count(&self) -> u8 {
        self.probe_count
    }
}

/// Connects fresh [`DeviceSession`]s for one configured device.
pub struct BleConnector {
    transport: Arc<BleTransport>,
    address: String,
    device_type: DeviceType,
}

impl BleConnector {
    /// Create a connector for one device.
    pub fn new(transport: Arc<BleTransport>, address: impl Into<String>, device_type: DeviceType) -> Self {
        Self {
            transport,
            address: address.into(),
            device_type,
        }
    }
}

#[async_trait]
impl SessionConnector for BleConnector {
    async fn connect(&self) -> Result<Box<dyn ProbeSession>> {
        let session =
            DeviceSession::connect(&self.transport, &self.address, self.device_type).await?;
        Ok(Box::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::uuids::{
        PROBE1_TEMPERATURE_UUID, PROBE1_THRESHOLD_UUID, PROBE2_TEMPERATURE_UUID,
        PROBE3_TEMPERATURE_UUID, PROBE4_TEMPERATURE_UUID,
    };
    use btleplug::api::CharPropFlags;
    use std::collections::BTreeSet;

    fn ble_char(uuid: Uuid) -> Characteristic {
        Characteristic {
            uuid,
            service_uuid: uuid,
            properties: CharPropFlags::READ,
            descriptors: BTreeSet::new(),
        }
    }

    fn igrill_characteristics(probes: &[Uuid]) -> Vec<Characteristic> {
        let mut chars = vec![
            ble_char(FIRMWARE_VERSION_UUID),
            ble_char(BATTERY_LEVEL_UUID),
            ble_char(APP_CHALLENGE_UUID),
            ble_char(DEVICE_CHALLENGE_UUID),
            ble_char(DEVICE_RESPONSE_UUID),
        ];
        chars.extend(probes.iter().copied().map(ble_char));
        chars
    }

    #[test]
    fn test_resolve_v2_map() {
        let chars = igrill_characteristics(&[
            PROBE1_TEMPERATURE_UUID,
            PROBE2_TEMPERATURE_UUID,
            PROBE3_TEMPERATURE_UUID,
            PROBE4_TEMPERATURE_UUID,
        ]);

        let map = CharacteristicMap::resolve(chars, 4).unwrap();
        assert_eq!(map.probe_temperatures.len(), 4);
        assert_eq!(map.probe_temperatures[0].uuid, PROBE1_TEMPERATURE_UUID);
        assert_eq!(map.probe_temperatures[3].uuid, PROBE4_TEMPERATURE_UUID);
        assert_eq!(map.battery_level.uuid, BATTERY_LEVEL_UUID);
    }

    #[test]
    fn test_resolve_mini_needs_only_probe_one() {
        // A Mini does not expose probes 2-4
        let chars = igrill_characteristics(&[PROBE1_TEMPERATURE_UUID]);

        let map = CharacteristicMap::resolve(chars, 1).unwrap();
        assert_eq!(map.probe_temperatures.len(), 1);
    }

    #[test]
    fn test_resolve_missing_probe_fails() {
        // Probe 3 absent on hardware configured as a four-probe device
        let chars = igrill_characteristics(&[
            PROBE1_TEMPERATURE_UUID,
            PROBE2_TEMPERATURE_UUID,
            PROBE4_TEMPERATURE_UUID,
        ]);

        let err = CharacteristicMap::resolve(chars, 4).unwrap_err();
        match err {
            Error::CharacteristicNotFound { uuid } => {
                assert!(uuid.contains("06ef0006"), "unexpected uuid: {}", uuid);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_resolve_missing_battery_fails() {
        let mut chars = igrill_characteristics(&[PROBE1_TEMPERATURE_UUID]);
        chars.retain(|c| c.uuid != BATTERY_LEVEL_UUID);

        let err = CharacteristicMap::resolve(chars, 1).unwrap_err();
        match err {
            Error::CharacteristicNotFound { uuid } => {
                assert!(uuid.contains("2a19"), "unexpected uuid: {}", uuid);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_resolve_ignores_unrelated_characteristics() {
        let mut chars = igrill_characteristics(&[PROBE1_TEMPERATURE_UUID]);
        chars.push(ble_char(PROBE1_THRESHOLD_UUID));
        chars.push(ble_char(Uuid::from_u128(0xdead_beef)));

        assert!(CharacteristicMap::resolve(chars, 1).is_ok());
    }

    #[test]
    fn test_app_challenge_is_sixteen_zero_bytes() {
        assert_eq!(APP_CHALLENGE.len(), 16);
        assert!(APP_CHALLENGE.iter().all(|&b| b == 0));
    }
}
