//! In-memory stand-ins for the SNMP agent and the MQTT bus.
//!
//! Lets the poller and command handler run without a relay board or a broker.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use relaymqtt_bridge_framework::{MessageBus, Result as BusResult};

use crate::config::{DeviceConfig, RelayConfig, SnmpVersion};
use crate::oid::DEFAULT_REGISTER_OID;
use crate::transport::{Access, ConnectError, Connector, RegisterTransport, TransportError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Build a device config with relays named "Relay <n>".
pub fn device_config(id: &str, relays: &[u8]) -> DeviceConfig {
    DeviceConfig {
        id: id.to_string(),
        name: format!("{id} board"),
        host: "192.168.1.50".to_string(),
        port: 161,
        read_community: "public".to_string(),
        write_community: "private".to_string(),
        version: SnmpVersion::V2c,
        oid: DEFAULT_REGISTER_OID.to_string(),
        timeout_ms: 100,
        relays: relays
            .iter()
            .map(|&number| RelayConfig {
                number,
                name: format!("Relay {number}"),
            })
            .collect(),
    }
}

#[derive(Debug, Default)]
struct RegisterInner {
    value: u32,
    writes: Vec<u32>,
    reads: usize,
    fail_reads: bool,
    fail_writes: bool,
    read_delay: Option<Duration>,
}

/// A shared register value with failure injection.
#[derive(Debug, Clone, Default)]
pub struct MockRegister {
    inner: Arc<Mutex<RegisterInner>>,
}

impl MockRegister {
    pub fn new(value: u32) -> Self {
        let register = Self::default();
        register.set(value);
        register
    }

    pub fn value(&self) -> u32 {
        lock(&self.inner).value
    }

    /// Change the value as if the relays were switched on the board itself.
    pub fn set(&self, value: u32) {
        lock(&self.inner).value = value;
    }

    /// Values written through SET, oldest first.
    pub fn writes(&self) -> Vec<u32> {
        lock(&self.inner).writes.clone()
    }

    /// Number of GET requests served or failed.
    pub fn reads(&self) -> usize {
        lock(&self.inner).reads
    }

    pub fn fail_reads(&self, fail: bool) {
        lock(&self.inner).fail_reads = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        lock(&self.inner).fail_writes = fail;
    }

    /// Make every GET wait `delay` before sampling the value.
    pub fn delay_reads(&self, delay: Duration) {
        lock(&self.inner).read_delay = Some(delay);
    }
}

struct MockTransport {
    register: MockRegister,
}

#[async_trait]
impl RegisterTransport for MockTransport {
    async fn read(&mut self) -> Result<u32, TransportError> {
        let delay = lock(&self.register.inner).read_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = lock(&self.register.inner);
        inner.reads += 1;
        if inner.fail_reads {
            return Err(TransportError::Request("injected read failure".to_string()));
        }
        Ok(inner.value)
    }

    async fn write(&mut self, value: u32) -> Result<(), TransportError> {
        let mut inner = lock(&self.register.inner);
        if inner.fail_writes {
            return Err(TransportError::Request("injected write failure".to_string()));
        }
        inner.value = value;
        inner.writes.push(value);
        Ok(())
    }
}

#[derive(Debug)]
struct ConnectorInner {
    default: MockRegister,
    registers: HashMap<String, MockRegister>,
    reachable: bool,
    opened: Vec<(String, Access)>,
}

/// Connector handing out transports backed by [`MockRegister`]s.
#[derive(Debug, Clone)]
pub struct MockConnector {
    inner: Arc<Mutex<ConnectorInner>>,
}

impl MockConnector {
    /// All devices share `register` unless given their own with [`insert`](Self::insert).
    pub fn new(register: MockRegister) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ConnectorInner {
                default: register,
                registers: HashMap::new(),
                reachable: true,
                opened: Vec::new(),
            })),
        }
    }

    pub fn insert(&self, device_id: &str, register: MockRegister) {
        lock(&self.inner)
            .registers
            .insert(device_id.to_string(), register);
    }

    /// When unreachable, every `open` fails.
    pub fn set_reachable(&self, reachable: bool) {
        lock(&self.inner).reachable = reachable;
    }

    /// Successful opens as (device id, access), oldest first.
    pub fn opened(&self) -> Vec<(String, Access)> {
        lock(&self.inner).opened.clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(
        &self,
        device: &DeviceConfig,
        access: Access,
    ) -> Result<Box<dyn RegisterTransport>, ConnectError> {
        let mut inner = lock(&self.inner);
        if !inner.reachable {
            return Err(ConnectError::Open {
                address: device.address(),
                message: "unreachable".to_string(),
            });
        }

        inner.opened.push((device.id.clone(), access));
        let register = inner
            .registers
            .get(&device.id)
            .unwrap_or(&inner.default)
            .clone();

        Ok(Box::new(MockTransport { register }))
    }
}

/// A message captured by [`RecordingBus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

/// Message bus that records instead of sending.
#[derive(Debug, Default)]
pub struct RecordingBus {
    published: Mutex<Vec<Published>>,
    subscriptions: Mutex<Vec<String>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<Published> {
        lock(&self.published).clone()
    }

    /// Drain the recorded publishes.
    pub fn take(&self) -> Vec<Published> {
        std::mem::take(&mut *lock(&self.published))
    }

    /// Recorded publishes on topics ending in `/state`, as (topic, payload).
    pub fn states(&self) -> Vec<(String, String)> {
        self.published()
            .into_iter()
            .filter(|p| p.topic.ends_with("/state"))
            .map(|p| (p.topic, p.payload))
            .collect()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        lock(&self.subscriptions).clone()
    }
}

#[async_trait]
impl MessageBus for RecordingBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> BusResult<()> {
        lock(&self.published).push(Published {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(&payload).into_owned(),
            retain,
        });
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> BusResult<()> {
        lock(&self.subscriptions).push(topic.to_string());
        Ok(())
    }
}
