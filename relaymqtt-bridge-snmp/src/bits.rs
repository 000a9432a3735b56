//! Mapping between the relay register and individual relay states.
//!
//! Relay `n` (1-based) lives in register bit `n - 1`. Everything here is pure.

use std::fmt;

use crate::device::Relay;

/// Highest relay number a 32-bit register can hold.
pub const MAX_RELAYS: u8 = 32;

/// On/off state of a relay as carried on MQTT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayState {
    On,
    Off,
}

impl RelayState {
    /// MQTT payload for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayState::On => "ON",
            RelayState::Off => "OFF",
        }
    }

    /// Interpret a command payload. Only the literal `ON` switches a relay on.
    pub fn from_payload(payload: &[u8]) -> Self {
        if payload == b"ON" {
            RelayState::On
        } else {
            RelayState::Off
        }
    }

    pub fn is_on(&self) -> bool {
        matches!(self, RelayState::On)
    }
}

impl From<bool> for RelayState {
    fn from(on: bool) -> Self {
        if on { RelayState::On } else { RelayState::Off }
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn mask(relay_number: u8) -> u32 {
    debug_assert!((1..=MAX_RELAYS).contains(&relay_number));
    1u32 << (relay_number - 1)
}

/// Whether the bit of `relay_number` is set in `register`.
pub fn is_set(register: u32, relay_number: u8) -> bool {
    register & mask(relay_number) != 0
}

/// `register` with the bit of `relay_number` set to `value`, all other bits untouched.
pub fn with_bit(register: u32, relay_number: u8, value: bool) -> u32 {
    if value {
        register | mask(relay_number)
    } else {
        register & !mask(relay_number)
    }
}

/// Relays whose bit differs between `old` and `new`, in declaration order.
///
/// Bits that belong to no declared relay are ignored.
pub fn diff(old: u32, new: u32, relays: &[Relay]) -> Vec<(&Relay, RelayState)> {
    relays
        .iter()
        .filter(|relay| is_set(old, relay.number) != is_set(new, relay.number))
        .map(|relay| (relay, RelayState::from(is_set(new, relay.number))))
        .collect()
}
