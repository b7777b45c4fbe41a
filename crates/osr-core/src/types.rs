//! Core identity and time types shared across the OSR control plane.
//!
//! Station identities are opaque small-integer keys. Deriving them from the
//! low byte of a hardware address would alias once a topology exceeds 255
//! stations, so [`StationId`] keeps the derivation explicit and the key space
//! wide enough to be collision-free for any realistic mesh size, while
//! staying a cheap-to-hash integer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Simulation timestamps and durations are nanoseconds on a single monotonic
/// discrete-event clock.
pub type SimNanos = u64;

/// Opaque station identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationId(u16);

impl StationId {
    pub fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sta{}", self.0)
    }
}

impl From<u16> for StationId {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}
