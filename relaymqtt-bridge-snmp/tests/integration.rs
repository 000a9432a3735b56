//! Integration tests for relaymqtt-bridge-snmp.
//!
//! Drive the poller and command handler together against an in-memory relay
//! board and a recording message bus.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use relaymqtt_bridge_framework::{InboundMessage, TopicScheme};
use relaymqtt_bridge_snmp::bits::RelayState;
use relaymqtt_bridge_snmp::command::CommandHandler;
use relaymqtt_bridge_snmp::config::SnmpBridgeConfig;
use relaymqtt_bridge_snmp::device::DeviceRegistry;
use relaymqtt_bridge_snmp::mock::{MockConnector, MockRegister, RecordingBus};
use relaymqtt_bridge_snmp::poller::RelayPoller;
use tokio::sync::mpsc;

const CONFIG: &str = r#"
{
    mqtt: { host: "broker.lan", base_topic: "denkovi" },
    snmp: {
        poll_interval_secs: 1,
        devices: [
            {
                id: "den1",
                name: "Garage board",
                host: "192.168.1.50",
                relays: [
                    { number: 1, name: "A" },
                    { number: 2, name: "B" },
                ],
            },
        ],
    },
}
"#;

struct Bridge {
    poller: RelayPoller,
    handler: CommandHandler,
    register: MockRegister,
    connector: MockConnector,
    bus: Arc<RecordingBus>,
    registry: Arc<DeviceRegistry>,
}

fn bridge_from(config: &SnmpBridgeConfig) -> Bridge {
    let register = MockRegister::new(0);
    let connector = MockConnector::new(register.clone());
    let bus = Arc::new(RecordingBus::new());
    let topics = TopicScheme::from_config(&config.mqtt);
    let registry = Arc::new(DeviceRegistry::from_configs(config.snmp.devices.clone()));

    let poller = RelayPoller::new(
        registry.clone(),
        Arc::new(connector.clone()),
        bus.clone(),
        topics.clone(),
        Duration::from_secs(config.snmp.poll_interval_secs),
    );
    let handler = CommandHandler::new(registry.clone(), bus.clone(), topics);

    Bridge {
        poller,
        handler,
        register,
        connector,
        bus,
        registry,
    }
}

fn bridge() -> Bridge {
    let config = SnmpBridgeConfig::parse(CONFIG).expect("Sample config should be valid");
    bridge_from(&config)
}

fn state(relay: u8, payload: &str) -> (String, String) {
    (
        format!("denkovi/light/den1_relay_{relay}/state"),
        payload.to_string(),
    )
}

#[tokio::test]
async fn test_startup_announces_every_relay() {
    let b = bridge();

    b.poller.tick().await;

    let published = b.bus.published();
    let config_topics: Vec<&str> = published
        .iter()
        .filter(|p| p.topic.starts_with("homeassistant/"))
        .map(|p| p.topic.as_str())
        .collect();
    assert_eq!(
        config_topics,
        vec![
            "homeassistant/light/den1_relay_1/config",
            "homeassistant/light/den1_relay_2/config",
        ]
    );

    let discovery: serde_json::Value = serde_json::from_str(&published[0].payload).unwrap();
    assert_eq!(discovery["name"], "A");
    assert_eq!(discovery["device"]["name"], "Garage board");
    assert_eq!(discovery["device"]["identifiers"], "MTkyLjE2OC4xLjUw");

    assert_eq!(b.bus.states(), vec![state(1, "OFF"), state(2, "OFF")]);
    assert_eq!(
        b.bus.subscriptions(),
        vec![
            "denkovi/light/den1_relay_1/set".to_string(),
            "denkovi/light/den1_relay_2/set".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_board_change_reaches_mqtt() {
    let b = bridge();
    b.poller.tick().await;
    b.bus.take();

    b.register.set(2);
    b.poller.tick().await;

    assert_eq!(b.bus.states(), vec![state(2, "ON")]);
}

#[tokio::test]
async fn test_command_echo_is_not_republished_by_poll() {
    let b = bridge();
    b.poller.tick().await;
    b.register.set(2);
    b.poller.tick().await;
    b.bus.take();

    let applied = b
        .handler
        .handle("denkovi/light/den1_relay_1/set", b"ON")
        .await
        .unwrap();
    assert_eq!(applied, RelayState::On);
    assert_eq!(b.register.writes(), vec![3]);

    let report = b.poller.tick().await;

    assert_eq!(report.changes, 0);
    assert_eq!(b.bus.states(), vec![state(1, "ON")]);
}

#[tokio::test]
async fn test_failed_write_recovers_on_next_ticks() {
    let b = bridge();
    b.poller.tick().await;
    b.register.set(2);
    b.poller.tick().await;
    b.bus.take();

    b.register.fail_writes(true);
    assert!(
        b.handler
            .handle("denkovi/light/den1_relay_1/set", b"ON")
            .await
            .is_err()
    );
    assert!(b.bus.published().is_empty());

    let device = b.registry.get("den1").unwrap();
    assert_eq!(device.lock().await.last_known(), 2);

    b.register.fail_writes(false);

    // Reconnect tick republishes discovery, then the read restores relay 2.
    assert_eq!(b.poller.tick().await.reconnected, 1);
    b.bus.take();
    b.poller.tick().await;

    assert_eq!(b.bus.states(), vec![state(2, "ON")]);
    assert_eq!(b.connector.opened().len(), 4);
}

#[tokio::test]
async fn test_commands_and_polls_share_device_state() {
    let b = bridge();
    b.poller.tick().await;
    b.poller.tick().await;

    let (tx, rx) = mpsc::unbounded_channel();
    let Bridge {
        poller,
        handler,
        register,
        bus,
        ..
    } = b;

    let commands = tokio::spawn(handler.run(rx));

    for relay in [1, 2] {
        tx.send(InboundMessage {
            topic: format!("denkovi/light/den1_relay_{relay}/set"),
            payload: b"ON".to_vec(),
        })
        .unwrap();
    }
    drop(tx);
    commands.await.unwrap();

    assert_eq!(register.value(), 3);

    bus.take();
    let report = poller.tick().await;
    assert_eq!(report.polled, 1);
    assert_eq!(report.changes, 0);
    assert!(bus.published().is_empty());
}

#[tokio::test]
async fn test_command_during_poll_waits_for_device_lock() {
    let b = bridge();
    b.poller.tick().await;
    b.register.set(2);
    b.poller.tick().await;
    b.bus.take();

    b.register.delay_reads(Duration::from_millis(200));

    let command = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        b.handler
            .handle("denkovi/light/den1_relay_1/set", b"ON")
            .await
    };
    let (report, applied) = tokio::join!(b.poller.tick(), command);

    assert_eq!(report.polled, 1);
    assert_eq!(report.changes, 0);
    assert_eq!(applied.unwrap(), RelayState::On);

    let device = b.registry.get("den1").unwrap();
    assert_eq!(device.lock().await.last_known(), 3);
    assert_eq!(b.register.value(), 3);
    assert_eq!(b.register.writes(), vec![3]);
    assert_eq!(b.bus.states(), vec![state(1, "ON")]);
}

#[test]
fn test_config_file_round_trip() {
    let mut file = tempfile::Builder::new()
        .suffix(".json5")
        .tempfile()
        .unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();

    let config = SnmpBridgeConfig::load(file.path()).unwrap();

    assert_eq!(config.mqtt.host, "broker.lan");
    assert_eq!(config.mqtt.discovery_prefix, "homeassistant");
    assert_eq!(config.snmp.devices[0].relays.len(), 2);
    assert_eq!(config.snmp.devices[0].address(), "192.168.1.50:161");
}

#[test]
fn test_invalid_config_is_rejected() {
    let duplicate_relay = CONFIG.replace("number: 2", "number: 1");
    assert!(SnmpBridgeConfig::parse(&duplicate_relay).is_err());

    let zero_interval = CONFIG.replace("poll_interval_secs: 1", "poll_interval_secs: 0");
    assert!(SnmpBridgeConfig::parse(&zero_interval).is_err());
}
