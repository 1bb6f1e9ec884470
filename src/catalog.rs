//! Device catalog.
//!
//! Maps the known iGrill hardware variants to their construction
//! parameters. The variants differ only in probe count, so this is a pure
//! data table consulted when a worker is built; there is no per-variant
//! behavior anywhere else in the crate.

use std::fmt;

use crate::error::{Error, Result};

/// The iGrill hardware variants this crate knows how to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    /// iGrill Mini, one probe channel.
    Mini,
    /// iGrill v2, four probe channels.
    V2,
    /// iGrill v3, four probe channels.
    V3,
}

impl DeviceType {
    /// Number of temperature probe channels on this variant.
    ///
    /// Bounds every probe index a session for this variant will ever read.
    pub fn probe_count(&self) -> u8 {
        match self {
            Self::Mini => 1,
            Self::V2 | Self::V3 => 4,
        }
    }

    /// Display name used when a device entry does not configure one.
    pub fn default_name(&self) -> &'static str {
        match self {
            Self::Mini => "igrill_mini",
            Self::V2 => "igrill_v2",
            Self::V3 => "igrill_v3",
        }
    }

    /// Resolve a configured `type` string to a variant.
    ///
    /// Accepts exactly the strings used in the configuration file:
    /// `igrill_mini`, `igrill_v2`, `igrill_v3`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownDeviceType`] for any other string. This is
    /// the one configuration error that is not recoverable at runtime: the
    /// worker for that device is never started.
    pub fn from_config_name(name: &str) -> Result<Self> {
        match name {
            "igrill_mini" => Ok(Self::Mini),
            "igrill_v2" => Ok(Self::V2),
            "igrill_v3" => Ok(Self::V3),
            _ => Err(Error::UnknownDeviceType {
                name: name.to_string(),
            }),
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_counts() {
        assert_eq!(DeviceType::Mini.probe_count(), 1);
        assert_eq!(DeviceType::V2.probe_count(), 4);
        assert_eq!(DeviceType::V3.probe_count(), 4);
    }

    #[test]
    fn test_default_names() {
        assert_eq!(DeviceType::Mini.default_name(), "igrill_mini");
        assert_eq!(DeviceType::V2.default_name(), "igrill_v2");
        assert_eq!(DeviceType::V3.default_name(), "igrill_v3");
    }

    #[test]
    fn test_from_config_name() {
        assert_eq!(
            DeviceType::from_config_name("igrill_mini").unwrap(),
            DeviceType::Mini
        );
        assert_eq!(
            DeviceType::from_config_name("igrill_v2").unwrap(),
            DeviceType::V2
        );
        assert_eq!(
            DeviceType::from_config_name("igrill_v3").unwrap(),
            DeviceType::V3
        );
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let err = DeviceType::from_config_name("igrill_v4").unwrap_err();
        match err {
            Error::UnknownDeviceType { name } => assert_eq!(name, "igrill_v4"),
            other => panic!("unexpected error: {other:?}"),
        }

        // Matching is exact, no case folding
        assert!(DeviceType::from_config_name("IGRILL_MINI").is_err());
        assert!(DeviceType::from_config_name("").is_err());
    }

    #[test]
    fn test_display_matches_default_name() {
        assert_eq!(DeviceType::V3.to_string(), "igrill_v3");
    }
}
