use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet};
use tokio::time::timeout;

use crate::config::MqttConfig;
use crate::error::{Error, Result};

/// Capacity of the request channel between the client handle and the event loop.
const REQUEST_CAPACITY: usize = 100;

/// How long to wait for the broker's CONNACK.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connect to the MQTT broker using the provided configuration.
///
/// Drives the event loop until the broker acknowledges the connection, so a
/// broker that is unreachable or rejects the credentials surfaces here instead
/// of on the first publish.
pub async fn connect(config: &MqttConfig) -> Result<(AsyncClient, EventLoop)> {
    if config.host.is_empty() {
        return Err(Error::Config("MQTT host cannot be empty".to_string()));
    }

    let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

    if let Some((username, password)) = config.credentials() {
        options.set_credentials(username, password);
    }

    tracing::info!(
        host = %config.host,
        port = config.port,
        client_id = %config.client_id,
        authenticated = config.credentials().is_some(),
        "Connecting to MQTT broker"
    );

    let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

    loop {
        let event = timeout(CONNECT_TIMEOUT, eventloop.poll())
            .await
            .map_err(|_| Error::Mqtt("Timed out waiting for CONNACK".to_string()))??;

        if let Event::Incoming(Packet::ConnAck(ack)) = event {
            tracing::info!(code = ?ack.code, "Connected to MQTT broker");
            break;
        }
    }

    Ok((client, eventloop))
}
