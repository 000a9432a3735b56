//! Remote access to the relay register.

use std::time::Duration;

use async_trait::async_trait;
use snmp2::{AsyncSession, Oid, Value};
use thiserror::Error;
use tokio::time::timeout;

use crate::config::{DeviceConfig, SnmpVersion};
use crate::oid::parse_oid;

/// Failure of a single register read or write.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("SNMP request failed: {0}")]
    Request(String),

    #[error("agent returned error status {status}")]
    ErrorStatus { status: u32 },

    #[error("unexpected register value: {0}")]
    UnexpectedValue(String),
}

/// Failure to establish a session with a device.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("invalid register OID: {0}")]
    InvalidOid(String),

    #[error("failed to open session to {address}: {message}")]
    Open { address: String, message: String },
}

/// Which community a transport authenticates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Get/set of one integer register. No retries; the caller decides.
#[async_trait]
pub trait RegisterTransport: Send {
    async fn read(&mut self) -> Result<u32, TransportError>;

    async fn write(&mut self, value: u32) -> Result<(), TransportError>;
}

/// Opens register transports for a device.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(
        &self,
        device: &DeviceConfig,
        access: Access,
    ) -> Result<Box<dyn RegisterTransport>, ConnectError>;
}

/// SNMP transport bound to a single OID.
pub struct SnmpTransport {
    session: AsyncSession,
    oid: Oid<'static>,
    request_timeout: Duration,
}

#[async_trait]
impl RegisterTransport for SnmpTransport {
    async fn read(&mut self) -> Result<u32, TransportError> {
        let response = timeout(self.request_timeout, self.session.get(&self.oid))
            .await
            .map_err(|_| TransportError::Timeout(self.request_timeout))?
            .map_err(|e| TransportError::Request(e.to_string()))?;

        if response.error_status != 0 {
            return Err(TransportError::ErrorStatus {
                status: response.error_status,
            });
        }

        let Some((_, value)) = response.varbinds.into_iter().next() else {
            return Err(TransportError::UnexpectedValue("empty response".to_string()));
        };

        register_from_value(&value)
    }

    async fn write(&mut self, value: u32) -> Result<(), TransportError> {
        let varbinds = [(&self.oid, Value::Integer(i64::from(value)))];

        let response = timeout(self.request_timeout, self.session.set(&varbinds))
            .await
            .map_err(|_| TransportError::Timeout(self.request_timeout))?
            .map_err(|e| TransportError::Request(e.to_string()))?;

        if response.error_status != 0 {
            return Err(TransportError::ErrorStatus {
                status: response.error_status,
            });
        }

        Ok(())
    }
}

/// Convert an SNMP value into a register.
fn register_from_value(value: &Value) -> Result<u32, TransportError> {
    match value {
        Value::Integer(n) => {
            u32::try_from(*n).map_err(|_| TransportError::UnexpectedValue(n.to_string()))
        }
        Value::Unsigned32(n) => Ok(*n),
        _ => Err(TransportError::UnexpectedValue(
            "register is not an integer".to_string(),
        )),
    }
}

/// Opens [`SnmpTransport`]s with the device's read or write community.
#[derive(Debug, Default, Clone, Copy)]
pub struct SnmpConnector;

#[async_trait]
impl Connector for SnmpConnector {
    async fn open(
        &self,
        device: &DeviceConfig,
        access: Access,
    ) -> Result<Box<dyn RegisterTransport>, ConnectError> {
        let oid = parse_oid(&device.oid).map_err(|e| ConnectError::InvalidOid(e.to_string()))?;
        let address = device.address();
        let community = match access {
            Access::Read => device.read_community.as_bytes(),
            Access::Write => device.write_community.as_bytes(),
        };

        let session = match device.version {
            SnmpVersion::V1 => AsyncSession::new_v1(&address, community, 0).await,
            SnmpVersion::V2c => AsyncSession::new_v2c(&address, community, 0).await,
        }
        .map_err(|e| ConnectError::Open {
            address: address.clone(),
            message: e.to_string(),
        })?;

        tracing::debug!(device = %device.id, address = %address, ?access, "Opened SNMP session");

        Ok(Box::new(SnmpTransport {
            session,
            oid,
            request_timeout: Duration::from_millis(device.timeout_ms),
        }))
    }
}
