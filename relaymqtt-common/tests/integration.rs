//! Integration tests for relaymqtt-common library.

use relaymqtt_common::{MessageParseError, MqttConfig, TopicScheme, parse_config};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Document {
    mqtt: MqttConfig,
}

#[test]
fn test_topics_from_config() {
    let doc: Document = parse_config(
        r#"
        {
            mqtt: {
                host: "10.0.0.2",
                topic: "smartden",
                discovery_prefix: "ha",
            },
        }
        "#,
    )
    .expect("config should parse");

    let topics = TopicScheme::from_config(&doc.mqtt);
    let id = TopicScheme::relay_identifier("lab", 4);

    assert_eq!(topics.base(), "smartden");
    assert_eq!(topics.state(&id), "smartden/light/lab_relay_4/state");
    assert_eq!(topics.command(&id), "smartden/light/lab_relay_4/set");
    assert_eq!(topics.discovery(&id), "ha/light/lab_relay_4/config");
}

#[test]
fn test_command_topic_roundtrip_through_parser() {
    let topics = TopicScheme::new("denkovi", "homeassistant");

    for (device, relay) in [("den1", 1u8), ("den_2", 16), ("a", 32)] {
        let topic = topics.command(&TopicScheme::relay_identifier(device, relay));
        let parsed = topics.parse_command(&topic).expect("command topic parses");
        assert_eq!(parsed.device_id, device);
        assert_eq!(parsed.relay, relay);
    }
}

#[test]
fn test_state_topic_is_not_a_command() {
    let topics = TopicScheme::new("denkovi", "homeassistant");
    let state = topics.state(&TopicScheme::relay_identifier("den1", 1));

    assert!(matches!(
        topics.parse_command(&state),
        Err(MessageParseError::NotACommand(_))
    ));
}
