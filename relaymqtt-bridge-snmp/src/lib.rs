//! MQTT bridge for SNMP bit-register relay boards.
//!
//! Each board exposes its relays as the bits of one integer register behind a
//! single OID. The bridge polls that register, publishes a retained `ON`/`OFF`
//! message whenever a relay changes, announces every relay to Home Assistant
//! as a `light` and applies commands through SNMP SET.
//!
//! # Topics
//!
//! ```text
//! <base_topic>/light/<device>_relay_<n>/state           ON | OFF, retained
//! <base_topic>/light/<device>_relay_<n>/set             commands
//! <discovery_prefix>/light/<device>_relay_<n>/config    discovery JSON, retained
//! ```
//!
//! # Configuration
//!
//! ```json5
//! {
//!   mqtt: { host: "localhost", port: 1883, base_topic: "denkovi" },
//!   snmp: {
//!     poll_interval_secs: 10,
//!     devices: [
//!       {
//!         id: "den1",
//!         name: "SmartDEN",
//!         host: "192.168.1.50",
//!         relays: [{ number: 1, name: "Lamp" }],
//!       },
//!     ],
//!   },
//! }
//! ```

pub mod bits;
pub mod command;
pub mod config;
pub mod device;
pub mod discovery;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod oid;
pub mod poller;
pub mod session;
pub mod transport;
