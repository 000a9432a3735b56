use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use relaymqtt_bridge_framework::{BridgeError, MqttConfig};

use crate::bits::MAX_RELAYS;
use crate::oid::{DEFAULT_REGISTER_OID, parse_oid};

// Re-export LoggingConfig from the framework for compatibility
pub use relaymqtt_bridge_framework::LoggingConfig;

/// Root configuration for the SNMP relay bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnmpBridgeConfig {
    /// MQTT connection and topic settings.
    #[serde(default)]
    pub mqtt: MqttConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// SNMP-specific settings.
    pub snmp: SnmpConfig,
}

/// SNMP-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnmpConfig {
    /// Polling interval in seconds, shared by all devices.
    #[serde(default = "default_poll_interval", alias = "interval")]
    pub poll_interval_secs: u64,

    /// Relay boards to poll.
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

fn default_poll_interval() -> u64 {
    10
}

/// Configuration for a single relay board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device id (used in topics and relay identifiers).
    pub id: String,

    /// Display name published in discovery metadata.
    pub name: String,

    /// Device host name or address.
    pub host: String,

    /// SNMP agent port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Community used for GET requests.
    #[serde(default = "default_read_community", alias = "communityread")]
    pub read_community: String,

    /// Community used for SET requests.
    #[serde(default = "default_write_community", alias = "communitywrite")]
    pub write_community: String,

    /// SNMP version ("v1" or "v2c").
    #[serde(default)]
    pub version: SnmpVersion,

    /// OID of the relay state register.
    #[serde(default = "default_oid")]
    pub oid: String,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Relays wired to the register, in publish order.
    #[serde(default)]
    pub relays: Vec<RelayConfig>,
}

fn default_port() -> u16 {
    161
}

fn default_read_community() -> String {
    "public".to_string()
}

fn default_write_community() -> String {
    "private".to_string()
}

fn default_oid() -> String {
    DEFAULT_REGISTER_OID.to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

/// A relay exposed by a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// 1-based relay number; relay `n` is register bit `n - 1`.
    pub number: u8,

    /// Display name.
    pub name: String,
}

/// SNMP protocol version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnmpVersion {
    #[serde(rename = "v1")]
    V1,
    #[default]
    #[serde(rename = "v2c")]
    V2c,
}

impl DeviceConfig {
    /// Socket address of the SNMP agent (e.g., "192.168.1.50:161").
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    fn validate(&self) -> Result<(), BridgeError> {
        if self.id.is_empty() {
            return Err(BridgeError::validation("Device id cannot be empty"));
        }
        if self.id.contains(['/', '+', '#']) {
            return Err(BridgeError::validation(format!(
                "Device id '{}' must not contain '/', '+' or '#'",
                self.id
            )));
        }
        if self.host.is_empty() {
            return Err(BridgeError::validation(format!(
                "Device '{}' has no host",
                self.id
            )));
        }
        if let Err(e) = parse_oid(&self.oid) {
            return Err(BridgeError::validation(format!(
                "Device '{}': {}",
                self.id, e
            )));
        }

        let mut numbers = HashSet::new();
        for relay in &self.relays {
            if relay.number == 0 || relay.number > MAX_RELAYS {
                return Err(BridgeError::validation(format!(
                    "Device '{}': relay number {} is outside 1..={}",
                    self.id, relay.number, MAX_RELAYS
                )));
            }
            if !numbers.insert(relay.number) {
                return Err(BridgeError::validation(format!(
                    "Device '{}': relay number {} is declared twice",
                    self.id, relay.number
                )));
            }
        }

        Ok(())
    }
}

impl SnmpBridgeConfig {
    /// Load configuration from a JSON5 file.
    pub fn load(path: impl AsRef<Path>) -> relaymqtt_bridge_framework::Result<Self> {
        <Self as relaymqtt_bridge_framework::BridgeConfig>::load(path)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> relaymqtt_bridge_framework::Result<Self> {
        <Self as relaymqtt_bridge_framework::BridgeConfig>::parse(content)
    }
}

impl relaymqtt_bridge_framework::BridgeConfig for SnmpBridgeConfig {
    fn mqtt(&self) -> &MqttConfig {
        &self.mqtt
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn validate(&self) -> relaymqtt_bridge_framework::Result<()> {
        if self.mqtt.port == 0 {
            return Err(BridgeError::validation("MQTT port cannot be 0"));
        }
        if self.snmp.poll_interval_secs == 0 {
            return Err(BridgeError::validation(
                "poll_interval_secs must be greater than 0",
            ));
        }
        if self.snmp.devices.is_empty() {
            return Err(BridgeError::validation("At least one device required"));
        }

        let mut ids = HashSet::new();
        for device in &self.snmp.devices {
            device.validate()?;
            if !ids.insert(device.id.as_str()) {
                return Err(BridgeError::validation(format!(
                    "Device id '{}' is used twice",
                    device.id
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
    {
        mqtt: {
            host: "broker.lan",
            username: "ha",
            password: "secret",
            topic: "denkovi",
        },
        snmp: {
            interval: 5,
            devices: [
                {
                    id: "den1",
                    name: "Garage board",
                    host: "192.168.1.50",
                    communityread: "public",
                    communitywrite: "private",
                    relays: [
                        { number: 1, name: "Door" },
                        { number: 2, name: "Lamp" },
                    ],
                },
            ],
        },
        logging: { level: "debug" },
    }
    "#;

    fn device(relays: Vec<RelayConfig>) -> DeviceConfig {
        DeviceConfig {
            id: "den1".to_string(),
            name: "Board".to_string(),
            host: "192.168.1.50".to_string(),
            port: 161,
            read_community: "public".to_string(),
            write_community: "private".to_string(),
            version: SnmpVersion::V2c,
            oid: DEFAULT_REGISTER_OID.to_string(),
            timeout_ms: 5000,
            relays,
        }
    }

    fn relay(number: u8) -> RelayConfig {
        RelayConfig {
            number,
            name: format!("Relay {number}"),
        }
    }

    #[test]
    fn test_parse_config() {
        let config = SnmpBridgeConfig::parse(SAMPLE).unwrap();

        assert_eq!(config.mqtt.host, "broker.lan");
        assert_eq!(config.mqtt.base_topic, "denkovi");
        assert_eq!(config.snmp.poll_interval_secs, 5);
        assert_eq!(config.snmp.devices.len(), 1);

        let device = &config.snmp.devices[0];
        assert_eq!(device.id, "den1");
        assert_eq!(device.port, 161);
        assert_eq!(device.read_community, "public");
        assert_eq!(device.write_community, "private");
        assert_eq!(device.version, SnmpVersion::V2c);
        assert_eq!(device.oid, DEFAULT_REGISTER_OID);
        assert_eq!(device.relays.len(), 2);
        assert_eq!(device.relays[1].name, "Lamp");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relaymqtt.json5");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = SnmpBridgeConfig::load(&path).unwrap();
        assert_eq!(config.snmp.devices[0].name, "Garage board");
    }

    #[test]
    fn test_address() {
        let mut device = device(vec![relay(1)]);
        assert_eq!(device.address(), "192.168.1.50:161");

        device.host = "fe80::1".to_string();
        assert_eq!(device.address(), "[fe80::1]:161");
    }

    #[test]
    fn test_validate_relay_numbers() {
        assert!(device(vec![relay(1), relay(32)]).validate().is_ok());
        assert!(device(vec![relay(0)]).validate().is_err());
        assert!(device(vec![relay(33)]).validate().is_err());
        assert!(device(vec![relay(3), relay(3)]).validate().is_err());
    }

    #[test]
    fn test_validate_device_id() {
        let mut bad = device(vec![relay(1)]);
        bad.id = "den/1".to_string();
        assert!(bad.validate().is_err());

        bad.id = String::new();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_validate_oid() {
        let mut bad = device(vec![relay(1)]);
        bad.oid = "garbage".to_string();
        assert!(matches!(
            bad.validate(),
            Err(BridgeError::ConfigValidation(_))
        ));
    }

    #[test]
    fn test_duplicate_device_ids_rejected() {
        let json5 = r#"
        {
            snmp: {
                devices: [
                    { id: "den1", name: "A", host: "10.0.0.1" },
                    { id: "den1", name: "B", host: "10.0.0.2" },
                ],
            },
        }
        "#;

        assert!(matches!(
            SnmpBridgeConfig::parse(json5),
            Err(BridgeError::ConfigValidation(_))
        ));
    }

    #[test]
    fn test_no_devices_rejected() {
        assert!(SnmpBridgeConfig::parse("{ snmp: { devices: [] } }").is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let json5 = r#"
        {
            snmp: {
                poll_interval_secs: 0,
                devices: [ { id: "den1", name: "A", host: "10.0.0.1" } ],
            },
        }
        "#;

        assert!(SnmpBridgeConfig::parse(json5).is_err());
    }
}
