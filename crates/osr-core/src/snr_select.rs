//! SNR-feedback ("ideal") rate selection.
//!
//! RBAR-style companion to the ARF family: receivers report the SNR of every
//! delivered packet back out of band, the transmitter caches the last report
//! per peer and picks the highest-rate mode whose precomputed threshold lies
//! strictly below it. When the reported SNR has not changed since the last
//! selection the cached mode is reused and the search is skipped.

use crate::events::TxParameters;
use crate::modulation::{LinkCapabilities, ModulationTable};
use crate::types::StationId;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default)]
struct PeerSnrState {
    last_observed_db: f64,
    /// (SNR the cached decision was made at, chosen index).
    cached: Option<(f64, usize)>,
}

/// Per-peer SNR cache plus threshold search over the shared table.
pub struct SnrRateSelector {
    table: Arc<ModulationTable>,
    caps: LinkCapabilities,
    peers: HashMap<StationId, PeerSnrState>,
}

impl SnrRateSelector {
    pub fn new(table: Arc<ModulationTable>, caps: LinkCapabilities) -> Self {
        Self {
            table,
            caps,
            peers: HashMap::new(),
        }
    }

    /// Record the SNR a peer reported for a delivered packet. A zero report
    /// carries no information and is discarded.
    pub fn report_snr(&mut self, peer: StationId, snr_db: f64) {
        if snr_db == 0.0 {
            warn!(%peer, "SNR reported as zero; not saving this report");
            return;
        }
        self.peers.entry(peer).or_default().last_observed_db = snr_db;
    }

    /// Transmit parameters for the next frame to `peer`: the highest-rate
    /// feasible mode with threshold strictly below the last reported SNR,
    /// falling back to the tier's base mode when nothing qualifies.
    pub fn select(&mut self, peer: StationId) -> TxParameters {
        let state = self.peers.entry(peer).or_default();

        if let Some((cached_snr, index)) = state.cached {
            if cached_snr == state.last_observed_db {
                return TxParameters::from_entry(index, self.table.entry(index));
            }
        }

        let observed = state.last_observed_db;
        let mut best: Option<usize> = None;
        let mut best_rate = 0u64;
        for (i, entry) in self.table.entries().iter().enumerate() {
            if entry.tier != self.caps.tier || !self.table.is_feasible(entry, &self.caps) {
                continue;
            }
            if entry.required_snr_db < observed && entry.data_rate_bps > best_rate {
                best_rate = entry.data_rate_bps;
                best = Some(i);
            }
        }
        let index = best
            .or_else(|| self.table.initial_index(&self.caps))
            .unwrap_or(0);
        debug!(%peer, snr = observed, mode = %self.table.entry(index), "snr-based selection");
        state.cached = Some((observed, index));
        TxParameters::from_entry(index, self.table.entry(index))
    }

    /// Drop all state for a peer.
    pub fn forget_peer(&mut self, peer: StationId) {
        self.peers.remove(&peer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modulation::{ModulationTier, TableConfig};

    fn selector() -> SnrRateSelector {
        let table = Arc::new(ModulationTable::build(&TableConfig::default()));
        SnrRateSelector::new(table, LinkCapabilities::default())
    }

    fn peer() -> StationId {
        StationId::new(3)
    }

    #[test]
    fn test_no_report_selects_base_mode() {
        let mut sel = selector();
        let params = sel.select(peer());
        let entry = sel.table.entry(params.mode_index);
        assert_eq!(entry.tier, ModulationTier::He);
        assert_eq!(entry.mcs, 0);
    }

    #[test]
    fn test_high_snr_selects_top_mode() {
        let mut sel = selector();
        sel.report_snr(peer(), 60.0);
        let params = sel.select(peer());
        assert_eq!(sel.table.entry(params.mode_index).mcs, 11);
    }

    #[test]
    fn test_unchanged_snr_reuses_cached_mode() {
        let mut sel = selector();
        sel.report_snr(peer(), 20.0);
        let first = sel.select(peer());
        sel.report_snr(peer(), 20.0);
        let second = sel.select(peer());
        assert_eq!(first, second);
    }

    #[test]
    fn test_degraded_snr_reselects_lower_mode() {
        let mut sel = selector();
        sel.report_snr(peer(), 45.0);
        let high = sel.select(peer());
        sel.report_snr(peer(), 8.0);
        let low = sel.select(peer());
        assert!(low.data_rate_bps < high.data_rate_bps);
    }

    #[test]
    fn test_zero_report_is_discarded() {
        let mut sel = selector();
        sel.report_snr(peer(), 45.0);
        let before = sel.select(peer());
        sel.report_snr(peer(), 0.0);
        let after = sel.select(peer());
        assert_eq!(before, after);
    }
}
