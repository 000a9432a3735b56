//! Message bus abstraction and its MQTT publisher.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rumqttc::{AsyncClient, QoS};

use crate::error::{BridgeError, Result};

/// A message received from the bus on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Outbound side of the messaging bus.
///
/// Bridges publish through this trait so their logic can run against a
/// recording bus in tests.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a payload to a topic.
    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<()>;

    /// Subscribe to a topic (or topic filter).
    async fn subscribe(&self, topic: &str) -> Result<()>;
}

/// MQTT publisher backed by a rumqttc client.
///
/// Remembers every subscription so the event loop can restore them after the
/// broker drops the connection.
#[derive(Clone, Debug)]
pub struct Publisher {
    client: AsyncClient,
    subscriptions: Arc<Mutex<BTreeSet<String>>>,
}

impl Publisher {
    /// Create a new publisher.
    pub fn new(client: AsyncClient) -> Self {
        Self {
            client,
            subscriptions: Arc::new(Mutex::new(BTreeSet::new())),
        }
    }

    /// Topics subscribed so far.
    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions
            .lock()
            .map(|topics| topics.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Re-issue every known subscription without waiting on the event loop.
    ///
    /// Safe to call from the task that drives the event loop.
    pub fn resubscribe_all(&self) -> usize {
        let topics = self.subscriptions();
        let mut restored = 0;

        for topic in &topics {
            match self.client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
                Ok(()) => restored += 1,
                Err(e) => tracing::warn!(topic = %topic, error = %e, "Failed to resubscribe"),
            }
        }

        restored
    }

    /// Disconnect from the broker.
    pub async fn disconnect(&self) -> Result<()> {
        self.client
            .disconnect()
            .await
            .map_err(|e| BridgeError::MqttConnection(e.to_string()))
    }
}

#[async_trait]
impl MessageBus for Publisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<()> {
        self.client
            .publish(topic, QoS::AtLeastOnce, retain, payload)
            .await
            .map_err(|e| BridgeError::Publish {
                topic: topic.to_string(),
                message: e.to_string(),
            })?;

        tracing::trace!(topic = %topic, retain, "Published message");

        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<()> {
        self.client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| BridgeError::Subscribe {
                topic: topic.to_string(),
                message: e.to_string(),
            })?;

        if let Ok(mut topics) = self.subscriptions.lock() {
            topics.insert(topic.to_string());
        }

        tracing::debug!(topic = %topic, "Subscribed");

        Ok(())
    }
}
