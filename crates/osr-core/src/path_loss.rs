//! Measured path-loss bookkeeping.
//!
//! Populated opportunistically from overheard signal reports
//! (`loss = rssi - tx power`, so values are negative dB "gains"). The first
//! successful measurement for a pair is retained for the life of the run:
//! later measurements that disagree are logged and discarded, because a
//! silently updated wrong value would corrupt every subsequent spatial-reuse
//! search, while measurement noise is expected and harmless.

use crate::types::StationId;
use std::collections::HashMap;
use tracing::debug;

/// Append-mostly map of measured path loss between station pairs. Loss is
/// direction-free: the pair key is unordered.
#[derive(Debug, Clone, Default)]
pub struct PathLossTracker {
    losses: HashMap<(StationId, StationId), f64>,
}

fn pair_key(a: StationId, b: StationId) -> (StationId, StationId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl PathLossTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a measurement for the pair. Returns true when the value was
    /// stored; a pair that already has a measurement keeps its first value.
    pub fn record(&mut self, a: StationId, b: StationId, loss_db: f64) -> bool {
        match self.losses.get(&pair_key(a, b)) {
            Some(&existing) => {
                if (existing - loss_db).abs() > 1e-9 {
                    debug!(
                        %a, %b,
                        old = existing,
                        new = loss_db,
                        "conflicting path-loss measurement, keeping first"
                    );
                }
                false
            }
            None => {
                debug!(%a, %b, loss = loss_db, "recorded path loss");
                self.losses.insert(pair_key(a, b), loss_db);
                true
            }
        }
    }

    /// Known loss for the pair, in dB.
    pub fn lookup(&self, a: StationId, b: StationId) -> Option<f64> {
        self.losses.get(&pair_key(a, b)).copied()
    }

    pub fn len(&self) -> usize {
        self.losses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.losses.is_empty()
    }
}
