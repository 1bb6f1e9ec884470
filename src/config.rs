//! Bridge configuration.
//!
//! A TOML file with one `[cayenne]` section for the telemetry sink
//! credentials and one `[[devices]]` entry per iGrill to poll.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::telemetry::parse_broker_url;

/// Default Cayenne MQTT broker.
pub const DEFAULT_BROKER: &str = "mqtts://mqtt.mydevices.com:8883";

/// Minimum poll interval in seconds.
pub const MIN_INTERVAL: u64 = 1;
/// Maximum poll interval in seconds (1 hour).
pub const MAX_INTERVAL: u64 = 3600;

/// Bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Telemetry sink credentials and broker.
    pub cayenne: CayenneConfig,
    /// Devices to poll.
    pub devices: Vec<DeviceConfig>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - Cayenne credentials are present and the broker URL parses
    /// - Device addresses and topics are not empty
    /// - Poll intervals are within bounds (1 second - 1 hour)
    /// - No duplicate device addresses
    ///
    /// The device `type` string is deliberately not checked here: an
    /// unknown type is a per-device failure surfaced when that device's
    /// worker is built, so a typo in one entry never blocks the rest.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        errors.extend(self.cayenne.validate());

        let mut seen_addresses = std::collections::HashSet::new();
        for (i, device) in self.devices.iter().enumerate() {
            let prefix = format!("devices[{}]", i);
            errors.extend(device.validate(&prefix));

            let addr_key = device.address.to_lowercase().replace(':', "");
            if !addr_key.is_empty() && !seen_addresses.insert(addr_key) {
                errors.push(ValidationError {
                    field: format!("{}.address", prefix),
                    message: format!("duplicate device address '{}'", device.address),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Cayenne MQTT sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CayenneConfig {
    /// Cayenne MQTT username.
    pub username: String,
    /// Cayenne MQTT password.
    pub password: String,
    /// Cayenne client id.
    pub client_id: String,
    /// Broker URL (`mqtt://` or `mqtts://`).
    pub broker: String,
}

impl Default for CayenneConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            client_id: String::new(),
            broker: DEFAULT_BROKER.to_string(),
        }
    }
}

impl CayenneConfig {
    /// Validate sink configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for (field, value) in [
            ("cayenne.username", &self.username),
            ("cayenne.password", &self.password),
            ("cayenne.client_id", &self.client_id),
        ] {
            if value.is_empty() {
                errors.push(ValidationError {
                    field: field.to_string(),
                    message: "cannot be empty".to_string(),
                });
            }
        }

        if let Err(e) = parse_broker_url(&self.broker) {
            errors.push(ValidationError {
                field: "cayenne.broker".to_string(),
                message: e,
            });
        }

        errors
    }
}

/// Configuration for one iGrill device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Friendly name; defaults to the device type's display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Device type string: `igrill_mini`, `igrill_v2` or `igrill_v3`.
    #[serde(rename = "type")]
    pub device_type: String,
    /// BLE MAC address, e.g. `70:91:8F:12:34:56`.
    pub address: String,
    /// Sink channel-group segment for this device.
    pub topic: String,
    /// Seconds between poll cycles.
    #[serde(default = "default_interval")]
    pub interval: u64,
}

fn default_interval() -> u64 {
    60
}

impl DeviceConfig {
    /// The poll interval as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    /// Validate device configuration.
    pub fn validate(&self, prefix: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push(ValidationError {
                field: format!("{}.address", prefix),
                message: "device address cannot be empty".to_string(),
            });
        }

        if self.topic.is_empty() {
            errors.push(ValidationError {
                field: format!("{}.topic", prefix),
                message: "topic cannot be empty".to_string(),
            });
        }

        if let Some(name) = &self.name {
            if name.is_empty() {
                errors.push(ValidationError {
                    field: format!("{}.name", prefix),
                    message: "name cannot be empty string (omit it instead)".to_string(),
                });
            }
        }

        if self.interval < MIN_INTERVAL {
            errors.push(ValidationError {
                field: format!("{}.interval", prefix),
                message: format!(
                    "interval {} is too short (minimum {} second)",
                    self.interval, MIN_INTERVAL
                ),
            });
        } else if self.interval > MAX_INTERVAL {
            errors.push(ValidationError {
                field: format!("{}.interval", prefix),
                message: format!(
                    "interval {} is too long (maximum {} seconds / 1 hour)",
                    self.interval, MAX_INTERVAL
                ),
            });
        }

        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `cayenne.username` or `devices[0].address`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cayenne() -> CayenneConfig {
        CayenneConfig {
            username: "user".to_string(),
            password: "pass".to_string(),
            client_id: "client".to_string(),
            broker: DEFAULT_BROKER.to_string(),
        }
    }

    fn device(address: &str) -> DeviceConfig {
        DeviceConfig {
            name: None,
            device_type: "igrill_v2".to_string(),
            address: address.to_string(),
            topic: "grill".to_string(),
            interval: 15,
        }
    }

    #[test]
    fn test_default_broker() {
        let config = CayenneConfig::default();
        assert_eq!(config.broker, "mqtts://mqtt.mydevices.com:8883");
    }

    #[test]
    fn test_full_toml() {
        let toml = r#"
            [cayenne]
            username  = "mqtt-username"
            password  = "mqtt-password"
            client_id = "client-id"

            [[devices]]
            name     = "patio"
            type     = "igrill_v2"
            address  = "70:91:8F:12:34:56"
            topic    = "patio-grill"
            interval = 15

            [[devices]]
            type     = "igrill_mini"
            address  = "70:91:8F:65:43:21"
            topic    = "smoker"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.cayenne.username, "mqtt-username");
        assert_eq!(config.cayenne.broker, DEFAULT_BROKER);
        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.devices[0].name, Some("patio".to_string()));
        assert_eq!(config.devices[0].device_type, "igrill_v2");
        assert_eq!(config.devices[0].interval, 15);
        assert_eq!(config.devices[1].name, None);
        // Unconfigured interval falls back to one minute
        assert_eq!(config.devices[1].interval, 60);
        assert_eq!(config.devices[1].interval(), Duration::from_secs(60));

        config.validate().unwrap();
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
                [cayenne]
                username  = "u"
                password  = "p"
                client_id = "c"

                [[devices]]
                type     = "igrill_v3"
                address  = "AA:BB:CC:DD:EE:FF"
                topic    = "deck"
                interval = 30
            "#,
        )
        .unwrap();

        let config = Config::load_validated(&path).unwrap();
        assert_eq!(config.devices.len(), 1);
        assert_eq!(config.devices[0].address, "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn test_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invalid.toml");
        std::fs::write(&path, "this is not valid { toml").unwrap();

        let result = Config::load(&path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_credentials() {
        let config = Config {
            cayenne: CayenneConfig::default(),
            devices: vec![device("AA:BB:CC:DD:EE:FF")],
        };
        let Err(ConfigError::Validation(errors)) = config.validate() else {
            panic!("expected validation failure");
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"cayenne.username"));
        assert!(fields.contains(&"cayenne.password"));
        assert!(fields.contains(&"cayenne.client_id"));
    }

    #[test]
    fn test_bad_broker_url() {
        let mut config = cayenne();
        config.broker = "http://mqtt.mydevices.com".to_string();
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "cayenne.broker");
    }

    #[test]
    fn test_device_validation() {
        assert!(device("AA:BB:CC:DD:EE:FF").validate("devices[0]").is_empty());

        let empty_addr = DeviceConfig {
            address: String::new(),
            ..device("")
        };
        let errors = empty_addr.validate("devices[0]");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("cannot be empty"));

        let empty_topic = DeviceConfig {
            topic: String::new(),
            ..device("AA:BB:CC:DD:EE:FF")
        };
        let errors = empty_topic.validate("devices[0]");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "devices[0].topic");

        let blank_name = DeviceConfig {
            name: Some(String::new()),
            ..device("AA:BB:CC:DD:EE:FF")
        };
        let errors = blank_name.validate("devices[0]");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("omit"));

        let zero_interval = DeviceConfig {
            interval: 0,
            ..device("AA:BB:CC:DD:EE:FF")
        };
        let errors = zero_interval.validate("devices[0]");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("too short"));

        let huge_interval = DeviceConfig {
            interval: 7200,
            ..device("AA:BB:CC:DD:EE:FF")
        };
        let errors = huge_interval.validate("devices[0]");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("too long"));
    }

    #[test]
    fn test_unknown_device_type_passes_config_validation() {
        // A bad type only kills that device's worker at startup
        let config = Config {
            cayenne: cayenne(),
            devices: vec![DeviceConfig {
                device_type: "igrill_v4".to_string(),
                ..device("AA:BB:CC:DD:EE:FF")
            }],
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_addresses() {
        let config = Config {
            cayenne: cayenne(),
            devices: vec![device("AA:BB:CC:DD:EE:FF"), device("aa:bb:cc:dd:ee:ff")],
        };
        let Err(ConfigError::Validation(errors)) = config.validate() else {
            panic!("expected validation failure");
        };
        assert!(errors.iter().any(|e| e.message.contains("duplicate")));
    }

    #[test]
    fn test_validation_report_format() {
        let errors = vec![
            ValidationError {
                field: "cayenne.username".to_string(),
                message: "cannot be empty".to_string(),
            },
            ValidationError {
                field: "devices[0].topic".to_string(),
                message: "topic cannot be empty".to_string(),
            },
        ];
        let display = format!("{}", ConfigError::Validation(errors));
        assert!(display.contains("cayenne.username"));
        assert!(display.contains("devices[0].topic"));
    }
}
