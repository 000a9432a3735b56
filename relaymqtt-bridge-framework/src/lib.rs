//! relaymqtt Bridge Framework
//!
//! Common abstractions for building bridges that expose device state over MQTT.
//!
//! # Overview
//!
//! This framework provides:
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`BridgeRunner`] for managing bridge lifecycle (startup, inbound messages, shutdown)
//! - [`MessageBus`] and its MQTT implementation [`Publisher`]
//! - [`BridgeArgs`] for common CLI argument parsing
//!
//! # Example
//!
//! ```ignore
//! use relaymqtt_bridge_framework::run_bridge;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_bridge::<MyBridgeConfig, _>("mybridge", &["mybridge.json5"], |runner| {
//!         let bus = runner.bus();
//!         runner.spawn(my_worker(bus));
//!     })
//!     .await
//! }
//! ```

mod args;
mod config;
mod error;
mod publisher;
mod runner;

pub use args::BridgeArgs;
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use publisher::{InboundMessage, MessageBus, Publisher};
pub use runner::{BridgeRunner, run_bridge};

// Re-export commonly used types from relaymqtt-common
pub use relaymqtt_common::{LoggingConfig, MqttConfig, TopicScheme};
