//! Static topology and next-hop routing toward the gateway.
//!
//! Stations sit at fixed 2D positions; ground-truth path loss between any two
//! of them follows a log-distance model. Routing is a static greedy table:
//! each station forwards toward the neighbor (within radio reach) that makes
//! the most progress toward the gateway. This stands in for the routing
//! protocol the full system runs; the core only ever asks for a next hop.

use osr_core::routing::RouteLookup;
use osr_core::types::StationId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Station position in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Log-distance propagation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PropagationConfig {
    /// Path-loss exponent (2.0 free space, 3.0-4.0 urban).
    pub path_loss_exponent: f64,
    /// Reference distance in meters.
    pub reference_distance_m: f64,
    /// Loss at the reference distance, in dB.
    pub reference_loss_db: f64,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            path_loss_exponent: 3.0,
            reference_distance_m: 1.0,
            reference_loss_db: 46.7,
        }
    }
}

/// Fixed station placement with log-distance path loss.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    positions: HashMap<StationId, Position>,
    propagation: PropagationConfig,
}

impl Topology {
    pub fn new(propagation: PropagationConfig) -> Self {
        Self {
            positions: HashMap::new(),
            propagation,
        }
    }

    pub fn insert(&mut self, station: StationId, position: Position) {
        self.positions.insert(station, position);
    }

    pub fn position(&self, station: StationId) -> Option<Position> {
        self.positions.get(&station).copied()
    }

    /// All stations, sorted for deterministic iteration.
    pub fn stations(&self) -> Vec<StationId> {
        let mut ids: Vec<_> = self.positions.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Ground-truth path loss between two stations in the core's negative-dB
    /// gain convention (`rssi = tx_power + loss`).
    pub fn path_loss_db(&self, a: StationId, b: StationId) -> Option<f64> {
        let pa = self.position(a)?;
        let pb = self.position(b)?;
        let d = pa.distance_to(&pb).max(self.propagation.reference_distance_m);
        let loss = self.propagation.reference_loss_db
            + 10.0
                * self.propagation.path_loss_exponent
                * (d / self.propagation.reference_distance_m).log10();
        Some(-loss)
    }
}

/// Static next-hop table toward the gateway.
#[derive(Debug, Clone, Default)]
pub struct StaticRouting {
    next_hops: HashMap<StationId, StationId>,
}

impl StaticRouting {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (StationId, StationId)>) -> Self {
        Self {
            next_hops: pairs.into_iter().collect(),
        }
    }

    /// Greedy geographic routing: each station's next hop is the reachable
    /// neighbor strictly closer to the gateway that is itself nearest to the
    /// gateway. Stations with no such neighbor get no route; the gateway
    /// never routes.
    pub fn toward_gateway(topology: &Topology, gateway: StationId, max_hop_m: f64) -> Self {
        let mut next_hops = HashMap::new();
        let gw_pos = match topology.position(gateway) {
            Some(p) => p,
            None => return Self { next_hops },
        };
        for station in topology.stations() {
            if station == gateway {
                continue;
            }
            let pos = topology.position(station).expect("station has a position");
            let own_gap = pos.distance_to(&gw_pos);
            let mut best: Option<(f64, StationId)> = None;
            for candidate in topology.stations() {
                if candidate == station {
                    continue;
                }
                let cpos = topology.position(candidate).expect("station has a position");
                let gap = cpos.distance_to(&gw_pos);
                if gap >= own_gap || pos.distance_to(&cpos) > max_hop_m {
                    continue;
                }
                if best.map_or(true, |(best_gap, _)| gap < best_gap) {
                    best = Some((gap, candidate));
                }
            }
            if let Some((_, hop)) = best {
                next_hops.insert(station, hop);
            }
        }
        Self { next_hops }
    }

    pub fn len(&self) -> usize {
        self.next_hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.next_hops.is_empty()
    }
}

impl RouteLookup for StaticRouting {
    fn next_hop(&self, station: StationId) -> Option<StationId> {
        self.next_hops.get(&station).copied()
    }
}
