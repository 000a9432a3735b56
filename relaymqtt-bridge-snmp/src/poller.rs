//! Periodic reconciliation of relay registers with MQTT state topics.

use std::sync::Arc;
use std::time::Duration;

use relaymqtt_bridge_framework::{MessageBus, TopicScheme};
use tokio::time::{MissedTickBehavior, interval};

use crate::bits::{self, RelayState};
use crate::device::{Device, DeviceRegistry, Ensured};
use crate::discovery::DiscoveryPublisher;
use crate::transport::Connector;

/// Counters for one pass over all devices.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Devices whose register was read.
    pub polled: usize,
    /// Devices that (re)connected this tick.
    pub reconnected: usize,
    /// Devices that failed to connect or to read.
    pub failed: usize,
    /// State messages published.
    pub changes: usize,
}

/// Polls every device at a fixed interval and publishes relay changes.
pub struct RelayPoller {
    registry: Arc<DeviceRegistry>,
    connector: Arc<dyn Connector>,
    bus: Arc<dyn MessageBus>,
    topics: TopicScheme,
    discovery: DiscoveryPublisher,
    poll_interval: Duration,
}

impl RelayPoller {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        connector: Arc<dyn Connector>,
        bus: Arc<dyn MessageBus>,
        topics: TopicScheme,
        poll_interval: Duration,
    ) -> Self {
        let discovery = DiscoveryPublisher::new(bus.clone(), topics.clone());

        Self {
            registry,
            connector,
            bus,
            topics,
            discovery,
            poll_interval,
        }
    }

    /// Run the polling loop forever.
    pub async fn run(self) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            devices = self.registry.len(),
            interval_secs = self.poll_interval.as_secs_f64(),
            "Starting relay poller"
        );

        loop {
            ticker.tick().await;

            let report = self.tick().await;
            tracing::debug!(
                polled = report.polled,
                reconnected = report.reconnected,
                failed = report.failed,
                changes = report.changes,
                "Poll cycle complete"
            );
        }
    }

    /// Visit every device once, in configuration order.
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();

        for device in self.registry.iter() {
            self.poll_device(device, &mut report).await;
        }

        report
    }

    async fn poll_device(&self, device: &Device, report: &mut TickReport) {
        let mut state = device.lock().await;

        match state.ensure(self.connector.as_ref(), device.config()).await {
            Ok(Ensured::AlreadyConnected) => {}
            Ok(Ensured::Reconnected) => {
                tracing::info!(device = %device.id(), address = %device.config().address(), "Connected to device");
                report.reconnected += 1;
                self.discovery.announce(device).await;
                // The first read happens next tick.
                return;
            }
            Err(e) => {
                tracing::warn!(device = %device.id(), error = %e, "Failed to connect to device");
                report.failed += 1;
                return;
            }
        }

        let Some(session) = state.session_mut() else {
            return;
        };

        let register = match session.read().await {
            Ok(register) => register,
            Err(e) => {
                tracing::warn!(device = %device.id(), error = %e, "Could not read relay register, connection lost?");
                state.disconnect();
                report.failed += 1;
                return;
            }
        };
        report.polled += 1;

        let previous = state.last_known();
        for (relay, relay_state) in bits::diff(previous, register, device.relays()) {
            self.publish_state(relay.identifier(), relay_state).await;
            report.changes += 1;
        }

        if previous != register {
            tracing::debug!(
                device = %device.id(),
                previous = format_args!("{previous:#b}"),
                register = format_args!("{register:#b}"),
                "Register changed"
            );
        }

        state.record(register);
    }

    async fn publish_state(&self, identifier: &str, relay_state: RelayState) {
        let topic = self.topics.state(identifier);

        match self
            .bus
            .publish(&topic, relay_state.as_str().as_bytes().to_vec(), true)
            .await
        {
            Ok(()) => tracing::debug!(topic = %topic, state = %relay_state, "Published relay state"),
            Err(e) => tracing::error!(topic = %topic, error = %e, "Failed to publish relay state"),
        }
    }
}
