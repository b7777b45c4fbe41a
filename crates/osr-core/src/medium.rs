//! Injected shared view of the air medium.
//!
//! The cross-station path-loss map and transmission ledger live behind a
//! cloneable handle that every per-station evaluator is constructed with,
//! rather than in process-wide static storage: tests get isolated instances,
//! and a threaded harness gets the single lock the shared tables need, since
//! multiple stations may report overlapping preambles for the same logical
//! time step.

use crate::ledger::{LedgerEntry, TransmissionLedger};
use crate::path_loss::PathLossTracker;
use crate::types::{SimNanos, StationId};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Default)]
struct MediumState {
    path_loss: PathLossTracker,
    ledger: TransmissionLedger,
}

/// Shared-state service over the path-loss tracker and transmission ledger.
#[derive(Debug, Clone, Default)]
pub struct SharedMedium {
    inner: Arc<Mutex<MediumState>>,
}

impl SharedMedium {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MediumState> {
        // The state is consistent after every call, so a poisoned lock is
        // still safe to reuse.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// First-writer-wins path-loss record; see [`PathLossTracker::record`].
    pub fn record_loss(&self, a: StationId, b: StationId, loss_db: f64) -> bool {
        self.state().path_loss.record(a, b, loss_db)
    }

    pub fn lookup_loss(&self, a: StationId, b: StationId) -> Option<f64> {
        self.state().path_loss.lookup(a, b)
    }

    /// Record an overheard transmission; duplicate reports of the same frame
    /// from other observers are no-ops.
    pub fn append_transmission(&self, entry: LedgerEntry) -> bool {
        self.state().ledger.append(entry)
    }

    /// Remove elapsed ledger entries; returns the number removed.
    pub fn prune_expired(&self, now_ns: SimNanos) -> usize {
        self.state().ledger.prune_expired(now_ns)
    }

    /// Snapshot of the current (already pruned) ledger contents.
    pub fn transmissions(&self) -> Vec<LedgerEntry> {
        self.state().ledger.entries().to_vec()
    }

    pub fn known_pairs(&self) -> usize {
        self.state().path_loss.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sta(n: u16) -> StationId {
        StationId::new(n)
    }

    #[test]
    fn test_clones_share_state() {
        let medium = SharedMedium::new();
        let other = medium.clone();
        medium.record_loss(sta(1), sta(2), -60.0);
        assert_eq!(other.lookup_loss(sta(2), sta(1)), Some(-60.0));
    }

    #[test]
    fn test_independent_instances_are_isolated() {
        let a = SharedMedium::new();
        let b = SharedMedium::new();
        a.record_loss(sta(1), sta(2), -60.0);
        assert_eq!(b.lookup_loss(sta(1), sta(2)), None);
    }

    #[test]
    fn test_ledger_roundtrip() {
        let medium = SharedMedium::new();
        medium.append_transmission(LedgerEntry {
            destination: sta(2),
            source: sta(1),
            start_ns: 0,
            duration_ns: 1_000,
            tx_power_dbm: 16.0,
            mode_index: 3,
        });
        assert_eq!(medium.transmissions().len(), 1);
        assert_eq!(medium.prune_expired(10_000), 1);
        assert!(medium.transmissions().is_empty());
    }
}
