//! Inbound relay commands.
//!
//! A command is a message on `<base>/light/<device>_relay_<n>/set`. The
//! handler flips the addressed bit in the device's last known register,
//! writes the result back and echoes the new state.

use std::sync::Arc;

use relaymqtt_bridge_framework::{InboundMessage, MessageBus, TopicScheme};
use relaymqtt_common::MessageParseError;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::bits::{self, RelayState};
use crate::device::DeviceRegistry;
use crate::transport::TransportError;

/// Why a command was dropped.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Parse(#[from] MessageParseError),

    #[error("Device '{device}' is not connected")]
    NotConnected { device: String },

    #[error("Write to device '{device}' failed: {source}")]
    Transport {
        device: String,
        #[source]
        source: TransportError,
    },
}

/// Applies relay commands to devices.
pub struct CommandHandler {
    registry: Arc<DeviceRegistry>,
    bus: Arc<dyn MessageBus>,
    topics: TopicScheme,
}

impl CommandHandler {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        bus: Arc<dyn MessageBus>,
        topics: TopicScheme,
    ) -> Self {
        Self {
            registry,
            bus,
            topics,
        }
    }

    /// Consume inbound messages until the channel closes.
    pub async fn run(self, mut inbound: mpsc::UnboundedReceiver<InboundMessage>) {
        tracing::info!("Listening for relay commands");

        while let Some(message) = inbound.recv().await {
            match self.handle(&message.topic, &message.payload).await {
                Ok(state) => {
                    tracing::info!(topic = %message.topic, state = %state, "Applied relay command")
                }
                Err(CommandError::Parse(e)) => {
                    tracing::warn!(topic = %message.topic, error = %e, "Ignoring message")
                }
                Err(e) => {
                    tracing::warn!(topic = %message.topic, error = %e, "Dropped relay command")
                }
            }
        }

        tracing::info!("Inbound channel closed, command handler stopping");
    }

    /// Apply one command and return the state it set.
    ///
    /// The device lock is held from reading `last_known` until the new value
    /// is recorded, so a concurrent poll cannot interleave.
    pub async fn handle(&self, topic: &str, payload: &[u8]) -> Result<RelayState, CommandError> {
        let address = self.topics.parse_command(topic)?;

        let device = self
            .registry
            .get(&address.device_id)
            .ok_or_else(|| MessageParseError::UnknownDevice(address.device_id.clone()))?;
        let relay = device
            .relay(address.relay)
            .ok_or_else(|| MessageParseError::UnknownRelay {
                device: address.device_id.clone(),
                relay: address.relay,
            })?;

        let requested = RelayState::from_payload(payload);

        let mut state = device.lock().await;
        let register = bits::with_bit(state.last_known(), relay.number, requested.is_on());

        let session = state
            .session_mut()
            .ok_or_else(|| CommandError::NotConnected {
                device: device.id().to_string(),
            })?;

        if let Err(source) = session.write(register).await {
            state.disconnect();
            return Err(CommandError::Transport {
                device: device.id().to_string(),
                source,
            });
        }

        state.record(register);
        drop(state);

        let state_topic = self.topics.state(relay.identifier());
        if let Err(e) = self
            .bus
            .publish(&state_topic, requested.as_str().as_bytes().to_vec(), true)
            .await
        {
            tracing::error!(topic = %state_topic, error = %e, "Failed to publish relay state");
        }

        Ok(requested)
    }
}
