use thiserror::Error;

use crate::config::MqttConfig;

/// Home Assistant component every relay is exposed as.
pub const LIGHT_COMPONENT: &str = "light";

/// Separator between the device id and the relay number in a relay identifier.
const RELAY_SEPARATOR: &str = "_relay_";

/// Suffix of command topics.
const COMMAND_SUFFIX: &str = "set";

/// Errors raised while interpreting an inbound topic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageParseError {
    #[error("Topic '{0}' is not a relay command topic")]
    NotACommand(String),

    #[error("Malformed relay identifier '{0}'")]
    MalformedIdentifier(String),

    #[error("Unknown device '{0}'")]
    UnknownDevice(String),

    #[error("Device '{device}' has no relay {relay}")]
    UnknownRelay { device: String, relay: u8 },
}

/// A relay addressed by an inbound command topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayAddress {
    pub device_id: String,
    pub relay: u8,
}

/// Builder and parser for the bridge's MQTT topics.
///
/// Topics follow the patterns:
/// - `<base>/light/<device>_relay_<n>/state`
/// - `<base>/light/<device>_relay_<n>/set`
/// - `<discovery_prefix>/light/<device>_relay_<n>/config`
#[derive(Debug, Clone)]
pub struct TopicScheme {
    base: String,
    discovery_prefix: String,
}

impl TopicScheme {
    /// Create a topic scheme with explicit prefixes.
    pub fn new(base: impl Into<String>, discovery_prefix: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            discovery_prefix: discovery_prefix.into(),
        }
    }

    /// Create a topic scheme from the MQTT settings.
    pub fn from_config(config: &MqttConfig) -> Self {
        Self::new(&config.base_topic, &config.discovery_prefix)
    }

    /// Base topic for state and command topics.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Stable identifier of a relay, shared by its topics and discovery metadata.
    ///
    /// # Example
    /// ```
    /// use relaymqtt_common::topics::TopicScheme;
    ///
    /// assert_eq!(TopicScheme::relay_identifier("den1", 3), "den1_relay_3");
    /// ```
    pub fn relay_identifier(device_id: &str, relay: u8) -> String {
        format!("{}{}{}", device_id, RELAY_SEPARATOR, relay)
    }

    /// Topic prefix shared by a relay's state and command topics.
    pub fn relay_root(&self, identifier: &str) -> String {
        format!("{}/{}/{}", self.base, LIGHT_COMPONENT, identifier)
    }

    /// Retained state topic of a relay.
    ///
    /// # Example
    /// ```
    /// use relaymqtt_common::topics::TopicScheme;
    ///
    /// let topics = TopicScheme::new("denkovi", "homeassistant");
    /// assert_eq!(topics.state("den1_relay_1"), "denkovi/light/den1_relay_1/state");
    /// ```
    pub fn state(&self, identifier: &str) -> String {
        format!("{}/state", self.relay_root(identifier))
    }

    /// Command topic of a relay.
    ///
    /// # Example
    /// ```
    /// use relaymqtt_common::topics::TopicScheme;
    ///
    /// let topics = TopicScheme::new("denkovi", "homeassistant");
    /// assert_eq!(topics.command("den1_relay_1"), "denkovi/light/den1_relay_1/set");
    /// ```
    pub fn command(&self, identifier: &str) -> String {
        format!("{}/{}", self.relay_root(identifier), COMMAND_SUFFIX)
    }

    /// Discovery config topic of a relay.
    ///
    /// # Example
    /// ```
    /// use relaymqtt_common::topics::TopicScheme;
    ///
    /// let topics = TopicScheme::new("denkovi", "homeassistant");
    /// assert_eq!(
    ///     topics.discovery("den1_relay_1"),
    ///     "homeassistant/light/den1_relay_1/config"
    /// );
    /// ```
    pub fn discovery(&self, identifier: &str) -> String {
        format!(
            "{}/{}/{}/config",
            self.discovery_prefix, LIGHT_COMPONENT, identifier
        )
    }

    /// Parse a command topic into the relay it addresses.
    ///
    /// Only the topic shape is checked here; whether the device and relay
    /// exist is up to the caller.
    pub fn parse_command(&self, topic: &str) -> Result<RelayAddress, MessageParseError> {
        let not_a_command = || MessageParseError::NotACommand(topic.to_string());

        let name = topic
            .strip_prefix(self.base.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .and_then(|rest| rest.strip_prefix(LIGHT_COMPONENT))
            .and_then(|rest| rest.strip_prefix('/'))
            .and_then(|rest| rest.strip_suffix(COMMAND_SUFFIX))
            .and_then(|rest| rest.strip_suffix('/'))
            .ok_or_else(not_a_command)?;

        if name.contains('/') {
            return Err(not_a_command());
        }

        let malformed = || MessageParseError::MalformedIdentifier(name.to_string());

        let (device_id, number) = name.rsplit_once(RELAY_SEPARATOR).ok_or_else(malformed)?;
        if device_id.is_empty() {
            return Err(malformed());
        }

        let relay: u8 = number.parse().map_err(|_| malformed())?;
        if relay == 0 {
            return Err(malformed());
        }

        Ok(RelayAddress {
            device_id: device_id.to_string(),
            relay,
        })
    }
}
