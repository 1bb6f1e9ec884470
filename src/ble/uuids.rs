//! BLE Characteristic UUIDs.
//!
//! Contains all UUID constants used for iDevices iGrill communication.

use uuid::Uuid;

// Device information (iDevices custom)
/// Firmware version characteristic UUID.
pub const FIRMWARE_VERSION_UUID: Uuid = Uuid::from_u128(0x64ac_0001_4a4b_4b58_9f37_94d3c52ffdf7);

// Battery Service (Standard BLE)
/// Standard BLE Battery Level characteristic UUID.
pub const BATTERY_LEVEL_UUID: Uuid = Uuid::from_u128(0x0000_2a19_0000_1000_8000_00805f9b34fb);

// Authentication handshake (iDevices custom)
/// App challenge characteristic UUID (written by the client).
pub const APP_CHALLENGE_UUID: Uuid = Uuid::from_u128(0x64ac_0002_4a4b_4b58_9f37_94d3c52ffdf7);
/// Device challenge characteristic UUID (read back from the device).
pub const DEVICE_CHALLENGE_UUID: Uuid = Uuid::from_u128(0x64ac_0003_4a4b_4b58_9f37_94d3c52ffdf7);
/// Device response characteristic UUID (echoed back to the device).
pub const DEVICE_RESPONSE_UUID: Uuid = Uuid::from_u128(0x64ac_0004_4a4b_4b58_9f37_94d3c52ffdf7);

// Probe measurement characteristics (iDevices custom)
/// Probe 1 temperature characteristic UUID.
pub const PROBE1_TEMPERATURE_UUID: Uuid = Uuid::from_u128(0x06ef_0002_2e06_4b79_9e33_fce2c42805ec);
/// Probe 1 alarm threshold characteristic UUID.
pub const PROBE1_THRESHOLD_UUID: Uuid = Uuid::from_u128(0x06ef_0003_2e06_4b79_9e33_fce2c42805ec);
/// Probe 2 temperature characteristic UUID.
pub const PROBE2_TEMPERATURE_UUID: Uuid = Uuid::from_u128(0x06ef_0004_2e06_4b79_9e33_fce2c42805ec);
/// Probe 2 alarm threshold characteristic UUID.
pub const PROBE2_THRESHOLD_UUID: Uuid = Uuid::from_u128(0x06ef_0005_2e06_4b79_9e33_fce2c42805ec);
/// Probe 3 temperature characteristic UUID.
pub const PROBE3_TEMPERATURE_UUID: Uuid = Uuid::from_u128(0x06ef_0006_2e06_4b79_9e33_fce2c42805ec);
/// Probe 3 alarm threshold characteristic UUID.
pub const PROBE3_THRESHOLD_UUID: Uuid = Uuid::from_u128(0x06ef_0007_2e06_4b79_9e33_fce2c42805ec);
/// Probe 4 temperature characteristic UUID.
pub const PROBE4_TEMPERATURE_UUID: Uuid = Uuid::from_u128(0x06ef_0008_2e06_4b79_9e33_fce2c42805ec);
/// Probe 4 alarm threshold characteristic UUID.
pub const PROBE4_THRESHOLD_UUID: Uuid = Uuid::from_u128(0x06ef_0009_2e06_4b79_9e33_fce2c42805ec);

/// Get the temperature characteristic UUID for a probe index (1-based).
///
/// Returns `None` for indices outside `1..=4`.
pub fn probe_temperature_uuid(probe: u8) -> Option<Uuid> {
    match probe {
        1 => Some(PROBE1_TEMPERATURE_UUID),
        2 => Some(PROBE2_TEMPERATURE_UUID),
        3 => Some(PROBE3_TEMPERATURE_UUID),
        4 => Some(PROBE4_TEMPERATURE_UUID),
        _ => None,
    }
}

/// Get the alarm threshold characteristic UUID for a probe index (1-based).
///
/// Returns `None` for indices outside `1..=4`.
pub fn probe_threshold_uuid(probe: u8) -> Option<Uuid> {
    match probe {
        1 => Some(PROBE1_THRESHOLD_UUID),
        2 => Some(PROBE2_THRESHOLD_UUID),
        3 => Some(PROBE3_THRESHOLD_UUID),
        4 => Some(PROBE4_THRESHOLD_UUID),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_format() {
        // Verify UUIDs are properly formatted
        let battery = BATTERY_LEVEL_UUID.to_string();
        assert!(battery.contains("2a19"));

        let firmware = FIRMWARE_VERSION_UUID.to_string();
        assert!(firmware.contains("64ac0001"));

        let probe1 = PROBE1_TEMPERATURE_UUID.to_string();
        assert!(probe1.contains("06ef0002"));
    }

    #[test]
    fn test_handshake_uuids_share_base() {
        // The three handshake characteristics differ only in the short id
        let app = APP_CHALLENGE_UUID.to_string();
        let challenge = DEVICE_CHALLENGE_UUID.to_string();
        let response = DEVICE_RESPONSE_UUID.to_string();

        assert!(app.ends_with("94d3c52ffdf7"));
        assert!(challenge.ends_with("94d3c52ffdf7"));
        assert!(response.ends_with("94d3c52ffdf7"));
        assert!(app.contains("64ac0002"));
        assert!(challenge.contains("64ac0003"));
        assert!(response.contains("64ac0004"));
    }

    #[test]
    fn test_probe_temperature_uuid() {
        assert_eq!(probe_temperature_uuid(1), Some(PROBE1_TEMPERATURE_UUID));
        assert_eq!(probe_temperature_uuid(2), Some(PROBE2_TEMPERATURE_UUID));
        assert_eq!(probe_temperature_uuid(3), Some(PROBE3_TEMPERATURE_UUID));
        assert_eq!(probe_temperature_uuid(4), Some(PROBE4_TEMPERATURE_UUID));
        assert_eq!(probe_temperature_uuid(0), None);
        assert_eq!(probe_temperature_uuid(5), None);
    }

    #[test]
    fn test_probe_threshold_uuid() {
        assert_eq!(probe_threshold_uuid(1), Some(PROBE1_THRESHOLD_UUID));
        assert_eq!(probe_threshold_uuid(4), Some(PROBE4_THRESHOLD_UUID));
        assert_eq!(probe_threshold_uuid(0), None);
        assert_eq!(probe_threshold_uuid(5), None);
    }

    #[test]
    fn test_temperature_and_threshold_interleave() {
        // Temperature and threshold ids alternate: 0002/0003, 0004/0005, ...
        for probe in 1..=4u8 {
            let temp = probe_temperature_uuid(probe).unwrap().as_u128();
            let threshold = probe_threshold_uuid(probe).unwrap().as_u128();
            assert_eq!(threshold - temp, 1 << 96);
        }
    }
}
