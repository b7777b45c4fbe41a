//! Routing-aware exclusion of a station's own traffic.
//!
//! The spatial-reuse search must never restrict the evaluating station's own
//! flow, so any overheard transmission that shares the station's next hop or
//! final destination disqualifies the whole evaluation. Route resolution is
//! an externally supplied lookup (next hop toward the configured gateway);
//! an unresolved route means benefit cannot be proven and the caller fails
//! open.

use crate::ledger::LedgerEntry;
use crate::types::StationId;
use std::collections::HashMap;
use std::sync::Arc;

/// Next-hop resolution toward the fixed gateway/sink identity. `None` covers
/// both "no route known" and the loopback/unreachable sentinel.
pub trait RouteLookup {
    fn next_hop(&self, station: StationId) -> Option<StationId>;
}

impl<T: RouteLookup + ?Sized> RouteLookup for Arc<T> {
    fn next_hop(&self, station: StationId) -> Option<StationId> {
        (**self).next_hop(station)
    }
}

/// A plain map doubles as a static routing table, handy in tests.
impl RouteLookup for HashMap<StationId, StationId> {
    fn next_hop(&self, station: StationId) -> Option<StationId> {
        self.get(&station).copied()
    }
}

/// True when the overheard transmission involves the evaluator's own flow:
/// its source or destination is the evaluator's next hop, or its destination
/// is the evaluator itself.
pub fn is_self_traffic(own: StationId, next_hop: StationId, entry: &LedgerEntry) -> bool {
    entry.source == next_hop || entry.destination == next_hop || entry.destination == own
}
