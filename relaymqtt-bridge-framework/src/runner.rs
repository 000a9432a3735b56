//! Bridge runner for lifecycle management.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rumqttc::{Event, EventLoop, Packet};
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use relaymqtt_common::{LoggingConfig, connect, init_tracing};

use crate::BridgeArgs;
use crate::config::BridgeConfig;
use crate::error::Result;
use crate::publisher::{InboundMessage, MessageBus, Publisher};

/// Delay before polling the event loop again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Bridge runner that manages the lifecycle of a bridge.
///
/// Handles:
/// - Logging initialization
/// - MQTT connection (fatal when the broker cannot be reached)
/// - Driving the MQTT event loop and forwarding inbound messages
/// - Task spawning and management
/// - Graceful shutdown on Ctrl+C
pub struct BridgeRunner<C: BridgeConfig> {
    /// Bridge name for logging.
    name: String,
    /// The loaded configuration.
    config: C,
    /// MQTT publisher.
    publisher: Publisher,
    /// Receiver for messages arriving on subscribed topics.
    inbound: Option<mpsc::UnboundedReceiver<InboundMessage>>,
    /// Spawned tasks, the event loop pump first.
    tasks: Vec<JoinHandle<()>>,
}

impl<C: BridgeConfig> BridgeRunner<C> {
    /// Create a new bridge runner.
    ///
    /// This will:
    /// 1. Initialize logging based on config (with optional CLI override)
    /// 2. Connect to the MQTT broker
    /// 3. Start forwarding inbound messages
    pub async fn new_with_args(
        name: impl Into<String>,
        config: C,
        args: Option<&BridgeArgs>,
    ) -> Result<Self> {
        let name = name.into();
        let version = env!("CARGO_PKG_VERSION");

        let log_config = match args.and_then(|args| args.log_level.as_ref()) {
            Some(level) => LoggingConfig {
                level: level.clone(),
                ..config.logging().clone()
            },
            None => config.logging().clone(),
        };

        init_tracing(&log_config)?;

        tracing::info!(bridge = %name, version = %version, "Starting bridge");

        let (client, eventloop) = connect(config.mqtt()).await?;

        let publisher = Publisher::new(client);
        let (tx, rx) = mpsc::unbounded_channel();

        let pump = tokio::spawn(pump_events(
            eventloop,
            tx,
            publisher.clone(),
            config.mqtt().debug,
        ));

        Ok(Self {
            name,
            config,
            publisher,
            inbound: Some(rx),
            tasks: vec![pump],
        })
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Get the publisher as a shareable message bus.
    pub fn bus(&self) -> Arc<dyn MessageBus> {
        Arc::new(self.publisher.clone())
    }

    /// Take the receiver of inbound messages.
    ///
    /// Returns `None` once it has been taken.
    pub fn take_inbound(&mut self) -> Option<mpsc::UnboundedReceiver<InboundMessage>> {
        self.inbound.take()
    }

    /// Spawn a worker task.
    ///
    /// The task will be tracked and aborted on shutdown.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.tasks.push(handle);
    }

    /// Run the bridge until Ctrl+C is received.
    ///
    /// This will:
    /// 1. Wait for Ctrl+C signal
    /// 2. Abort all spawned tasks
    /// 3. Disconnect from the broker
    pub async fn run(self) -> Result<()> {
        tracing::info!(
            bridge = %self.name,
            tasks = self.tasks.len(),
            "Bridge running. Press Ctrl+C to stop."
        );

        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }

        tracing::info!(bridge = %self.name, "Received shutdown signal");

        // Workers first so nothing publishes into a closing client.
        for task in self.tasks.iter().skip(1) {
            task.abort();
        }

        if let Err(e) = self.publisher.disconnect().await {
            tracing::warn!(error = %e, "Error disconnecting from MQTT broker");
        }

        // Give the event loop a moment to flush the DISCONNECT packet.
        tokio::time::sleep(Duration::from_millis(100)).await;

        for task in &self.tasks {
            task.abort();
        }

        tracing::info!(bridge = %self.name, "Goodbye!");

        Ok(())
    }
}

/// Drive the MQTT event loop for the lifetime of the bridge.
///
/// Incoming publishes are forwarded to `tx`. Connection errors are logged and
/// retried; rumqttc reconnects on the next poll, after which all known
/// subscriptions are restored.
async fn pump_events(
    mut eventloop: EventLoop,
    tx: mpsc::UnboundedSender<InboundMessage>,
    publisher: Publisher,
    debug: bool,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                tracing::debug!(
                    topic = %publish.topic,
                    payload_len = publish.payload.len(),
                    "Received message"
                );

                let message = InboundMessage {
                    topic: publish.topic.clone(),
                    payload: publish.payload.to_vec(),
                };
                if tx.send(message).is_err() {
                    tracing::debug!("Inbound receiver dropped, discarding message");
                }
            }
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                let restored = publisher.resubscribe_all();
                tracing::info!(code = ?ack.code, restored, "Reconnected to MQTT broker");
            }
            Ok(event) => {
                if debug {
                    tracing::info!(event = ?event, "MQTT");
                } else {
                    tracing::trace!(event = ?event, "MQTT");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "MQTT connection error");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

/// Convenience function to run a bridge with minimal boilerplate.
///
/// Loads the configuration from `--config` or the first existing path in
/// `default_configs`, connects, lets `setup` spawn the workers and runs until
/// Ctrl+C.
pub async fn run_bridge<C, F>(name: &str, default_configs: &[&str], setup: F) -> anyhow::Result<()>
where
    C: BridgeConfig,
    F: FnOnce(&mut BridgeRunner<C>),
{
    let args = BridgeArgs::parse();
    let path = args
        .resolve_config(default_configs)
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let config =
        C::load(&path).map_err(|e| anyhow::anyhow!("Failed to load {}: {}", path.display(), e))?;

    let mut runner = BridgeRunner::new_with_args(name, config, Some(&args))
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    tracing::info!(config = %path.display(), "Loaded configuration");

    setup(&mut runner);

    runner.run().await.map_err(|e| anyhow::anyhow!("{}", e))
}
