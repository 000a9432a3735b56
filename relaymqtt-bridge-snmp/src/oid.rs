use anyhow::{Result, anyhow};
use snmp2::Oid;

/// Relay state register of Denkovi SmartDEN boards.
pub const DEFAULT_REGISTER_OID: &str = "1.3.6.1.4.1.42505.8.3.5.0";

/// Parse an OID string (e.g., "1.3.6.1.4.1.42505.8.3.5.0") into an snmp2::Oid.
pub fn parse_oid(oid_str: &str) -> Result<Oid<'static>> {
    oid_str
        .parse::<Oid>()
        .map_err(|e| anyhow!("Failed to parse OID '{}': {:?}", oid_str, e))
        .map(|oid| oid.to_owned())
}
