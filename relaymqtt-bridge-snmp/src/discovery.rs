//! Home Assistant MQTT discovery for relays.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use relaymqtt_bridge_framework::{BridgeError, MessageBus, TopicScheme};
use serde::Serialize;

use crate::bits::RelayState;
use crate::device::{Device, Relay};

pub const MANUFACTURER: &str = "Denkovi";
pub const MODEL: &str = "SmartDEN";

/// Discovery config of one relay, published as a Home Assistant `light`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryPayload {
    pub state_topic: String,
    pub command_topic: String,
    pub name: String,
    pub unique_id: String,
    pub device: DiscoveryDevice,
}

/// Device block shared by all relays of a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryDevice {
    pub identifiers: String,
    pub manufacturer: String,
    pub name: String,
    pub model: String,
}

impl DiscoveryPayload {
    pub fn new(topics: &TopicScheme, device: &Device, relay: &Relay) -> Self {
        Self {
            state_topic: topics.state(relay.identifier()),
            command_topic: topics.command(relay.identifier()),
            name: relay.name.clone(),
            unique_id: relay.identifier().to_string(),
            device: DiscoveryDevice {
                identifiers: device_identifier(device.host()),
                manufacturer: MANUFACTURER.to_string(),
                name: device.name().to_string(),
                model: MODEL.to_string(),
            },
        }
    }
}

/// Opaque device identifier derived from the board's host address.
pub fn device_identifier(host: &str) -> String {
    STANDARD.encode(host.as_bytes())
}

/// Announces relays to Home Assistant.
pub struct DiscoveryPublisher {
    bus: Arc<dyn MessageBus>,
    topics: TopicScheme,
}

impl DiscoveryPublisher {
    pub fn new(bus: Arc<dyn MessageBus>, topics: TopicScheme) -> Self {
        Self { bus, topics }
    }

    /// Publish discovery config and an initial `OFF` state for every relay of
    /// `device`, and subscribe to their command topics. Safe to repeat.
    ///
    /// Returns the number of relays announced. A relay that fails is logged
    /// and skipped.
    pub async fn announce(&self, device: &Device) -> usize {
        let mut announced = 0;

        for relay in device.relays() {
            match self.announce_relay(device, relay).await {
                Ok(()) => announced += 1,
                Err(e) => tracing::warn!(
                    device = %device.id(),
                    relay = relay.number,
                    error = %e,
                    "Failed to announce relay"
                ),
            }
        }

        tracing::info!(device = %device.id(), relays = announced, "Published discovery");

        announced
    }

    async fn announce_relay(&self, device: &Device, relay: &Relay) -> Result<(), BridgeError> {
        let payload = DiscoveryPayload::new(&self.topics, device, relay);
        let json = serde_json::to_vec(&payload).map_err(|e| BridgeError::Publish {
            topic: self.topics.discovery(relay.identifier()),
            message: e.to_string(),
        })?;

        self.bus
            .publish(&self.topics.discovery(relay.identifier()), json, true)
            .await?;
        self.bus
            .publish(
                &payload.state_topic,
                RelayState::Off.as_str().as_bytes().to_vec(),
                true,
            )
            .await?;
        self.bus.subscribe(&payload.command_topic).await?;

        Ok(())
    }
}
