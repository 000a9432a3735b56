//! Devices, their relays and the per-device mutable state.

use std::collections::HashMap;
use std::sync::Arc;

use relaymqtt_common::TopicScheme;
use tokio::sync::{Mutex, MutexGuard};

use crate::config::DeviceConfig;
use crate::session::DeviceSession;
use crate::transport::{ConnectError, Connector};

/// A relay wired to one bit of its device's register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relay {
    pub number: u8,
    pub name: String,
    identifier: String,
}

impl Relay {
    pub fn new(device_id: &str, number: u8, name: impl Into<String>) -> Self {
        Self {
            number,
            name: name.into(),
            identifier: TopicScheme::relay_identifier(device_id, number),
        }
    }

    /// `<device>_relay_<n>`, the key of the relay's topics and discovery entry.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Connection state of a device.
#[derive(Debug, Default)]
pub enum Link {
    #[default]
    Disconnected,
    Connected(DeviceSession),
}

/// Outcome of [`DeviceState::ensure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ensured {
    AlreadyConnected,
    Reconnected,
}

/// Mutable state of a device, only reachable through the device lock.
#[derive(Debug, Default)]
pub struct DeviceState {
    last_known: u32,
    link: Link,
}

impl DeviceState {
    /// Last register value observed by a poll or applied by a command.
    pub fn last_known(&self) -> u32 {
        self.last_known
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.link, Link::Connected(_))
    }

    pub fn session_mut(&mut self) -> Option<&mut DeviceSession> {
        match &mut self.link {
            Link::Connected(session) => Some(session),
            Link::Disconnected => None,
        }
    }

    /// Connect if disconnected. A fresh connection resets the register to 0.
    pub async fn ensure(
        &mut self,
        connector: &dyn Connector,
        config: &DeviceConfig,
    ) -> Result<Ensured, ConnectError> {
        if self.is_connected() {
            return Ok(Ensured::AlreadyConnected);
        }

        let session = DeviceSession::establish(connector, config).await?;
        self.link = Link::Connected(session);
        self.last_known = 0;

        Ok(Ensured::Reconnected)
    }

    /// Drop the session; the next [`ensure`](Self::ensure) rebuilds it.
    pub fn disconnect(&mut self) {
        self.link = Link::Disconnected;
    }

    /// Record a register value confirmed by the device.
    pub fn record(&mut self, register: u32) {
        self.last_known = register;
    }
}

/// A relay board with its static relay layout.
#[derive(Debug)]
pub struct Device {
    config: DeviceConfig,
    relays: Vec<Relay>,
    state: Mutex<DeviceState>,
}

impl Device {
    pub fn from_config(config: DeviceConfig) -> Self {
        let relays = config
            .relays
            .iter()
            .map(|relay| Relay::new(&config.id, relay.number, relay.name.clone()))
            .collect();

        Self {
            config,
            relays,
            state: Mutex::new(DeviceState::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Relays in declaration order.
    pub fn relays(&self) -> &[Relay] {
        &self.relays
    }

    pub fn relay(&self, number: u8) -> Option<&Relay> {
        self.relays.iter().find(|relay| relay.number == number)
    }

    /// Lock the device state. Polls and commands hold this for their whole
    /// read/compute/write sequence.
    pub async fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().await
    }
}

/// All configured devices, in configuration order.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<Arc<Device>>,
    index: HashMap<String, usize>,
}

impl DeviceRegistry {
    pub fn from_configs(configs: impl IntoIterator<Item = DeviceConfig>) -> Self {
        let mut registry = Self::default();

        for config in configs {
            let device = Arc::new(Device::from_config(config));
            registry
                .index
                .insert(device.id().to_string(), registry.devices.len());
            registry.devices.push(device);
        }

        registry
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Device>> {
        self.index.get(id).map(|&i| &self.devices[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Device>> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockConnector, MockRegister, device_config};

    #[test]
    fn test_relay_identifier() {
        let relay = Relay::new("den1", 4, "Pump");
        assert_eq!(relay.identifier(), "den1_relay_4");
        assert_eq!(relay.name, "Pump");
    }

    #[test]
    fn test_registry_lookup() {
        let registry = DeviceRegistry::from_configs([
            device_config("den1", &[1, 2]),
            device_config("den2", &[3]),
        ]);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("den2").unwrap().relays()[0].number, 3);
        assert!(registry.get("den3").is_none());

        let ids: Vec<&str> = registry.iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec!["den1", "den2"]);
    }

    #[test]
    fn test_device_relay_lookup() {
        let device = Device::from_config(device_config("den1", &[2, 5]));

        assert_eq!(device.relay(5).unwrap().identifier(), "den1_relay_5");
        assert!(device.relay(1).is_none());
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let connector = MockConnector::new(MockRegister::new(0));
        let device = Device::from_config(device_config("den1", &[1]));
        let mut state = device.lock().await;

        assert!(!state.is_connected());
        assert_eq!(
            state.ensure(&connector, device.config()).await.unwrap(),
            Ensured::Reconnected
        );
        assert_eq!(
            state.ensure(&connector, device.config()).await.unwrap(),
            Ensured::AlreadyConnected
        );
        assert_eq!(connector.opened().len(), 2);
    }

    #[tokio::test]
    async fn test_reconnect_resets_register() {
        let connector = MockConnector::new(MockRegister::new(0));
        let device = Device::from_config(device_config("den1", &[1]));
        let mut state = device.lock().await;

        state.ensure(&connector, device.config()).await.unwrap();
        state.record(5);
        state.disconnect();
        assert!(state.session_mut().is_none());

        state.ensure(&connector, device.config()).await.unwrap();
        assert_eq!(state.last_known(), 0);
        assert!(state.session_mut().is_some());
    }
}
