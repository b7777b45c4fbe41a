//! # OSR Sim - Mesh Simulation Support
//!
//! Everything the control-plane core needs around it to run as a closed
//! loop without real radios: a monotonic discrete-event clock, a static
//! topology with log-distance path loss and greedy next-hop routing toward
//! the gateway, seeded link impairment models, and a scripted harness that
//! generates the preamble/outcome events the core consumes.
//!
//! ## Example
//!
//! ```rust
//! use osr_sim::harness::MeshHarness;
//! use osr_sim::scenario::ScenarioConfig;
//!
//! let mut harness = MeshHarness::new(ScenarioConfig::default()).unwrap();
//! let report = harness.run(10);
//! assert!(report.delivered > 0);
//! ```

pub mod clock;
pub mod harness;
pub mod impairments;
pub mod scenario;
pub mod topology;

pub use clock::SimClock;
pub use harness::{MeshHarness, RoundReport, StationReport};
pub use impairments::{
    ChannelChangeConfig, ChannelChangeModel, LinkBreakConfig, LinkBreakModel, NodeDownConfig,
    NodeDownModel, OUTAGE_RX_DBM,
};
pub use scenario::{ScenarioConfig, ScenarioError, StationSpec};
pub use topology::{Position, PropagationConfig, StaticRouting, Topology};
