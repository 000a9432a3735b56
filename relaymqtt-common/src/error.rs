use thiserror::Error;

/// Common error type for relaymqtt components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    Parse(String),

    #[error("MQTT connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    #[error("MQTT error: {0}")]
    Mqtt(String),
}

/// Result type alias using relaymqtt's Error.
pub type Result<T> = std::result::Result<T, Error>;
