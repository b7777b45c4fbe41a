//! Typed events crossing the core's boundary.
//!
//! Plain values handed to the consuming component rather than implicit
//! callback registration, so the flow is explicit and testable. Two events
//! come in (preamble observed, transmission outcome), two results go out
//! (transmit parameters, spatial-reuse verdict).

use crate::modulation::ModulationEntry;
use crate::types::{SimNanos, StationId};
use serde::{Deserialize, Serialize};

/// Raised by the radio layer when a station decodes the preamble of a frame
/// addressed between two other stations. `rssi_dbm` is as seen by the
/// reporter, so the same over-the-air frame produces one event per observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreambleObserved {
    /// The station that overheard the frame (the evaluator's own identity).
    pub reporter: StationId,
    pub source: StationId,
    pub destination: StationId,
    /// BSS color tag carried in the preamble.
    pub color: u8,
    pub rssi_dbm: f64,
    pub tx_power_dbm: f64,
    pub duration_ns: SimNanos,
    /// Index into the shared [`ModulationTable`](crate::modulation::ModulationTable)
    /// of the mode the overheard transmission is using.
    pub mode_index: usize,
}

/// Delivery feedback for one data transmission on a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransmissionOutcome {
    pub peer: StationId,
    pub ok: bool,
}

/// Transmit parameters handed to the radio layer immediately before a frame
/// goes on the air.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxParameters {
    /// Index of the chosen entry in the shared modulation table.
    pub mode_index: usize,
    pub data_rate_bps: u64,
    pub streams: u8,
    pub channel_width_mhz: u16,
    pub guard_interval_ns: u16,
}

impl TxParameters {
    pub fn from_entry(mode_index: usize, entry: &ModulationEntry) -> Self {
        Self {
            mode_index,
            data_rate_bps: entry.data_rate_bps,
            streams: entry.streams,
            channel_width_mhz: entry.channel_width_mhz,
            guard_interval_ns: entry.guard_interval_ns,
        }
    }
}

/// Outcome of one spatial-reuse evaluation. Recomputed from scratch on every
/// preamble event and never persisted across events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SpatialReuseVerdict {
    /// The evaluator may not (or need not) transmit concurrently under a
    /// restriction; normal channel access applies.
    Unrestricted,
    /// Concurrent transmission is allowed, capped at the given power and MCS.
    Restricted {
        power_level_dbm: f64,
        /// Highest usable entry in the shared modulation table.
        mcs_limit: usize,
    },
}

impl SpatialReuseVerdict {
    pub fn is_restricted(&self) -> bool {
        matches!(self, SpatialReuseVerdict::Restricted { .. })
    }
}
