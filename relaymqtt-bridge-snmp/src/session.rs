//! Per-device read/write session pair.

use crate::config::DeviceConfig;
use crate::transport::{Access, ConnectError, Connector, RegisterTransport, TransportError};

/// A read handle and a write handle to the same register.
///
/// Never repaired in place: after any transport failure the owner drops it
/// and establishes a fresh one.
pub struct DeviceSession {
    read: Box<dyn RegisterTransport>,
    write: Box<dyn RegisterTransport>,
}

impl DeviceSession {
    /// Open both handles with the device's read and write communities.
    pub async fn establish(
        connector: &dyn Connector,
        device: &DeviceConfig,
    ) -> Result<Self, ConnectError> {
        let read = connector.open(device, Access::Read).await?;
        let write = connector.open(device, Access::Write).await?;

        Ok(Self { read, write })
    }

    /// Read the register through the read handle.
    pub async fn read(&mut self) -> Result<u32, TransportError> {
        self.read.read().await
    }

    /// Write the register through the write handle.
    pub async fn write(&mut self, value: u32) -> Result<(), TransportError> {
        self.write.write(value).await
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockConnector, MockRegister, device_config};

    #[tokio::test]
    async fn test_establish_uses_both_communities() {
        let register = MockRegister::new(6);
        let connector = MockConnector::new(register.clone());
        let device = device_config("den1", &[1, 2, 3]);

        let mut session = DeviceSession::establish(&connector, &device).await.unwrap();

        assert_eq!(
            connector.opened(),
            vec![
                ("den1".to_string(), Access::Read),
                ("den1".to_string(), Access::Write)
            ]
        );
        assert_eq!(session.read().await.unwrap(), 6);

        session.write(7).await.unwrap();
        assert_eq!(register.value(), 7);
        assert_eq!(register.writes(), vec![7]);
    }

    #[tokio::test]
    async fn test_establish_failure() {
        let connector = MockConnector::new(MockRegister::new(0));
        connector.set_reachable(false);

        let result = DeviceSession::establish(&connector, &device_config("den1", &[1])).await;
        assert!(matches!(result, Err(ConnectError::Open { .. })));
    }
}
