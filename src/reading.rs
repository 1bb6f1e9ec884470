//! Reading data structures.
//!
//! Contains types for the raw per-probe temperature values reported by
//! iGrill devices and the decoded per-cycle reading handed to the
//! telemetry sink.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw temperature value from a probe characteristic (16-bit).
///
/// Each probe channel reports a little-endian 16-bit value in raw device
/// units. The fixed value 63536 is a sentinel meaning no physical probe is
/// plugged into that channel and never a real measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawTemperature(pub u16);

impl RawTemperature {
    /// Sentinel reported on a channel with no probe attached.
    pub const NO_PROBE: Self = Self(63536);

    /// Decode a raw temperature from the two bytes of a characteristic read.
    ///
    /// The device sends the low byte first: `value = low + 256 * high`.
    ///
    /// # Example
    ///
    /// ```
    /// use igrill_mqtt::RawTemperature;
    ///
    /// let temp = RawTemperature::from_le_bytes([0x00, 0x01]);
    /// assert_eq!(temp.temperature(), Some(256.0));
    /// ```
    pub fn from_le_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_le_bytes(bytes))
    }

    /// Check whether a physical probe is attached to this channel.
    pub fn is_attached(&self) -> bool {
        *self != Self::NO_PROBE
    }

    /// The measured temperature in raw device units.
    ///
    /// Returns `None` when the channel reported the no-probe sentinel.
    /// The value is passed through without unit conversion; iGrill hardware
    /// reports in the unit configured on the device itself.
    pub fn temperature(&self) -> Option<f64> {
        if self.is_attached() {
            Some(f64::from(self.0))
        } else {
            None
        }
    }

    /// Get the raw 16-bit value.
    pub fn raw_value(&self) -> u16 {
        self.0
    }
}

/// One decoded poll cycle for one device.
///
/// Produced by a device worker after reading every probe channel and the
/// battery level, then handed to the telemetry sink as a unit. Readings are
/// never cached or persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// When the poll cycle completed.
    pub captured_at: DateTime<Utc>,
    /// Temperature per probe index (1-based), `None` where no probe is
    /// attached.
    pub probe_temperatures: BTreeMap<u8, Option<f64>>,
    /// Battery charge as a 0-100 percentage.
    pub battery_percent: f64,
}

impl Reading {
    /// Create a reading timestamped now.
    pub fn new(probe_temperatures: BTreeMap<u8, Option<f64>>, battery_percent: f64) -> Self {
        Self {
            captured_at: Utc::now(),
            probe_temperatures,
            battery_percent,
        }
    }

    /// Battery charge as a normalized 0.0-1.0 fraction.
    pub fn battery_fraction(&self) -> f64 {
        self.battery_percent / 100.0
    }

    /// Iterate over the probes that have a probe attached, in index order.
    pub fn attached_probes(&self) -> impl Iterator<Item = (u8, f64)> + '_ {
        self.probe_temperatures
            .iter()
            .filter_map(|(probe, temp)| temp.map(|t| (*probe, t)))
    }
}
