//! MQTT bridge for SNMP relay boards.
//!
//! Polls the relay register of every configured board, publishes relay state
//! with Home Assistant discovery and applies ON/OFF commands.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use relaymqtt_bridge_framework::{TopicScheme, run_bridge};

use relaymqtt_bridge_snmp::command::CommandHandler;
use relaymqtt_bridge_snmp::config::SnmpBridgeConfig;
use relaymqtt_bridge_snmp::device::DeviceRegistry;
use relaymqtt_bridge_snmp::poller::RelayPoller;
use relaymqtt_bridge_snmp::transport::SnmpConnector;

const BRIDGE_NAME: &str = "relaymqtt-bridge-snmp";

/// Searched in order when `--config` is not given.
const DEFAULT_CONFIGS: &[&str] = &["/config/relaymqtt.json5", "relaymqtt.json5"];

#[tokio::main]
async fn main() -> Result<()> {
    run_bridge::<SnmpBridgeConfig, _>(BRIDGE_NAME, DEFAULT_CONFIGS, |runner| {
        let config = runner.config();
        let topics = TopicScheme::from_config(&config.mqtt);
        let registry = Arc::new(DeviceRegistry::from_configs(config.snmp.devices.clone()));
        let poll_interval = Duration::from_secs(config.snmp.poll_interval_secs);

        tracing::info!(
            devices = registry.len(),
            base_topic = %topics.base(),
            interval_secs = poll_interval.as_secs(),
            "Relay bridge configured"
        );

        let bus = runner.bus();

        match runner.take_inbound() {
            Some(inbound) => {
                let handler = CommandHandler::new(registry.clone(), bus.clone(), topics.clone());
                runner.spawn(handler.run(inbound));
            }
            None => tracing::warn!("Inbound messages already taken, commands disabled"),
        }

        let poller = RelayPoller::new(
            registry,
            Arc::new(SnmpConnector),
            bus,
            topics,
            poll_interval,
        );
        runner.spawn(poller.run());
    })
    .await
    .with_context(|| format!("{BRIDGE_NAME} stopped with an error"))
}
