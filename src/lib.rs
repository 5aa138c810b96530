//! Aether - energy-bounded signal propagation over node lattices.
//!
//! A lattice is an undirected graph of nodes, each carrying typed state and
//! an energy budget. Signals flood breadth-first from a start node, spending
//! energy at every node they reach. Integrity checks classify nodes against
//! an energy threshold, and the scenario drivers compose these operations
//! with injected capabilities (task queues, state stores, consensus).

pub mod capabilities;
pub mod config;
pub mod graph;
pub mod integrity;
pub mod news;
pub mod scenario;
pub mod shared;
pub mod topology;
pub mod types;

pub use capabilities::{
    ConsensusDecider, ConsensusOutcome, EnergyLeveler, HealthMajority, MemoryStore,
    RecordingScheduler, StateStore, SwarmOptimizer, TaskQueue, TaskScheduler, VecTaskQueue,
};
pub use config::{AetherConfig, CONFIG_FILE, ConfigError, NewsConfig, load_config};
pub use graph::{Lattice, LatticeError, Propagation, PropagationReport, Visit};
pub use integrity::{DEFAULT_THRESHOLD, IntegrityReport, NodeCheck, Verdict};
pub use news::{Headline, NewsClient, summarize};
pub use scenario::{
    IntegrityValidator, MultiChainHarmonics, SwarmEvolution, SwarmOrchestration,
    SynergyAggregator, SynergyCoordinator, integrate_insights, rng_from,
};
pub use shared::SharedLattice;
pub use topology::{Shape, TopologyError, TopologyFile, build_lattice, load_topology, save_topology};
pub use types::{DEFAULT_ENERGY, Node, NodeState, StateValue};
