//! Scenario drivers built on top of the lattice.
//!
//! Each driver owns its topology, takes its randomness from a caller-supplied
//! RNG, and returns structured reports instead of printing.

use crate::capabilities::{
    ConsensusDecider, ConsensusOutcome, HealthMajority, RecordingScheduler, StateStore,
    SwarmOptimizer, TaskQueue, TaskScheduler,
};
use crate::graph::{Lattice, LatticeError, PropagationReport};
use crate::integrity::{DEFAULT_THRESHOLD, IntegrityReport};
use crate::news::Headline;
use crate::topology::{Shape, build_lattice};
use crate::types::Node;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::info;

pub const EVOLUTION_SIGNALS: [&str; 4] = [
    "MutationSignal",
    "AdaptivePulse",
    "GeneticDrift",
    "ExplorationBoost",
];
pub const AGGREGATOR_SIGNALS: [&str; 4] = ["HealthPing", "StatusUpdate", "ConfigSync", "DebugPulse"];
pub const COORDINATOR_SIGNALS: [&str; 3] = ["Heartbeat", "DiagnosticPing", "ConfigSync"];
pub const COORDINATOR_TASKS: [&str; 4] = [
    "PerformanceCheck",
    "DataAnalysis",
    "UpdatePolicy",
    "SensorCalibration",
];
pub const HARMONICS_SIGNALS: [&str; 3] =
    ["CrossLedgerSync", "AtomicSwapSignal", "ChainHarmonicsPulse"];

/// Tasks pulled from the queue per orchestration tick.
pub const ORCHESTRATION_BATCH: usize = 2;
/// Consensus is attempted once more than this many tasks are assigned.
pub const CONSENSUS_TRIGGER: usize = 5;
pub const ORCHESTRATION_PROPOSAL: &str = "Real-time synergy upgrade?";

/// Seeded RNG when `seed` is given, OS entropy otherwise.
pub fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn pick<'a, R: Rng + ?Sized>(rng: &mut R, items: &[&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

fn pick_node<R: Rng + ?Sized>(lattice: &Lattice, rng: &mut R) -> Option<String> {
    lattice.ids().choose(rng).map(|id| id.to_string())
}

// --- swarm evolution ---

#[derive(Debug, Clone, Serialize)]
pub struct RoundReport {
    pub round: usize,
    pub propagation: PropagationReport,
}

/// A ring of `SwarmNode`s evolved by repeated propagation and optimization.
#[derive(Debug, Clone)]
pub struct SwarmEvolution {
    lattice: Lattice,
    energy_cost: f64,
}

impl SwarmEvolution {
    pub fn new(node_count: usize, energy: f64, energy_cost: f64) -> Self {
        let lattice = build_lattice("SwarmNode", node_count, energy, Shape::Ring);
        info!(node_count, "swarm initialized in a ring topology");
        SwarmEvolution {
            lattice,
            energy_cost,
        }
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    /// Each round floods a random signal from a random node, then lets the
    /// optimizer adjust the swarm.
    pub fn run_rounds<R: Rng + ?Sized>(
        &mut self,
        rounds: usize,
        rng: &mut R,
        optimizer: &mut dyn SwarmOptimizer,
    ) -> Result<Vec<RoundReport>, LatticeError> {
        let mut reports = Vec::new();
        for round in 1..=rounds {
            let Some(start) = pick_node(&self.lattice, rng) else {
                break;
            };
            let signal = pick(rng, &EVOLUTION_SIGNALS);
            info!(round, rounds, signal, start = %start, "evolution round");

            let propagation = self
                .lattice
                .propagate_signal(signal, &start, self.energy_cost)?;
            optimizer.optimize_swarm(self.lattice.nodes_mut());
            reports.push(RoundReport { round, propagation });
        }
        Ok(reports)
    }
}

// --- synergy aggregation ---

/// A chain of `AetherNode`s carrying assigned data.
#[derive(Debug, Clone)]
pub struct SynergyAggregator {
    lattice: Lattice,
    energy_cost: f64,
}

impl SynergyAggregator {
    pub fn new(node_count: usize, energy: f64, energy_cost: f64) -> Self {
        SynergyAggregator {
            lattice: build_lattice("AetherNode", node_count, energy, Shape::Chain),
            energy_cost,
        }
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    /// Give each node one data item, in node order. Returns how many were assigned.
    pub fn assign_data<S: AsRef<str>>(&mut self, data: &[S]) -> usize {
        let mut assigned = 0;
        for (node, item) in self.lattice.nodes_mut().iter_mut().zip(data) {
            let item: &str = item.as_ref();
            node.state.assigned_data = Some(item.to_string());
            assigned += 1;
        }
        assigned
    }

    /// Propagate one random signal from every node in turn.
    pub fn propagate_all<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<Vec<PropagationReport>, LatticeError> {
        let ids: Vec<String> = self.lattice.ids().iter().map(|s| s.to_string()).collect();
        let mut reports = Vec::with_capacity(ids.len());
        for id in ids {
            let signal = pick(rng, &AGGREGATOR_SIGNALS);
            reports.push(self.lattice.propagate_signal(signal, &id, self.energy_cost)?);
        }
        Ok(reports)
    }
}

// --- synergy coordination ---

/// A ring of `AetherNode`s with tasks, consensus, and random signalling.
#[derive(Debug, Clone)]
pub struct SynergyCoordinator {
    lattice: Lattice,
    energy_cost: f64,
}

impl SynergyCoordinator {
    pub fn new(node_count: usize, energy: f64, energy_cost: f64) -> Self {
        SynergyCoordinator {
            lattice: build_lattice("AetherNode", node_count, energy, Shape::Ring),
            energy_cost,
        }
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    /// Give every node a random task and hand the batch to `scheduler`.
    pub fn assign_tasks<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        scheduler: &mut dyn TaskScheduler,
    ) -> Vec<(String, String)> {
        let mut assigned = Vec::new();
        for node in self.lattice.nodes_mut() {
            let task = pick(rng, &COORDINATOR_TASKS).to_string();
            node.state.task = Some(task.clone());
            assigned.push((node.id().to_string(), task));
        }
        scheduler.schedule_tasks(&assigned);
        info!(count = assigned.len(), "tasks assigned and scheduled");
        assigned
    }

    pub fn evaluate(&self, decider: &dyn ConsensusDecider, proposal: &str) -> ConsensusOutcome {
        decider.attempt_swarm_consensus(self.lattice.nodes(), proposal)
    }

    /// One random signal from a random node per node in the lattice.
    pub fn propagate_random<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<Vec<PropagationReport>, LatticeError> {
        let mut reports = Vec::new();
        for _ in 0..self.lattice.len() {
            let signal = pick(rng, &COORDINATOR_SIGNALS);
            if let Some(start) = pick_node(&self.lattice, rng) {
                reports.push(self.propagate_from(signal, &start)?);
            }
        }
        Ok(reports)
    }

    pub fn propagate_from(
        &mut self,
        signal: &str,
        start: &str,
    ) -> Result<PropagationReport, LatticeError> {
        self.lattice.propagate_signal(signal, start, self.energy_cost)
    }
}

// --- integrity validation ---

/// A chain of `IntegrityNode`s used to exercise integrity checks.
#[derive(Debug, Clone)]
pub struct IntegrityValidator {
    lattice: Lattice,
}

impl IntegrityValidator {
    pub fn new(node_count: usize, energy: f64) -> Self {
        IntegrityValidator {
            lattice: build_lattice("IntegrityNode", node_count, energy, Shape::Chain),
        }
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    pub fn lattice_mut(&mut self) -> &mut Lattice {
        &mut self.lattice
    }

    pub fn validate(&self, threshold: f64) -> IntegrityReport {
        self.lattice.validate_integrity(threshold)
    }

    /// Force the node at `index` to zero energy. `None` if out of range.
    pub fn drain(&mut self, index: usize) -> Option<String> {
        let node = self.lattice.nodes_mut().get_mut(index)?;
        node.set_energy(0.0);
        info!(node = node.id(), "node forcibly depleted");
        Some(node.id().to_string())
    }
}

// --- multi-chain harmonics ---

#[derive(Debug, Clone, Serialize)]
pub struct ChainPropagation {
    /// 1-based chain number.
    pub chain: usize,
    pub propagation: PropagationReport,
}

/// Several independent two-node lattices, one per chain.
#[derive(Debug, Clone)]
pub struct MultiChainHarmonics {
    chains: Vec<Lattice>,
    energy_cost: f64,
}

impl MultiChainHarmonics {
    pub fn new(num_chains: usize, energy: f64, energy_cost: f64) -> Self {
        let chains = (1..=num_chains)
            .map(|c| {
                let mut lattice = Lattice::new();
                let a = format!("Chain{c}_Node1");
                let b = format!("Chain{c}_Node2");
                lattice
                    .add_node(Node::with_energy(a.clone(), energy))
                    .expect("fresh lattice has no nodes");
                lattice
                    .add_node(Node::with_energy(b.clone(), energy))
                    .expect("chain node ids are distinct");
                lattice.connect(&a, &b).expect("both chain nodes were just added");
                lattice
            })
            .collect();
        MultiChainHarmonics {
            chains,
            energy_cost,
        }
    }

    pub fn chains(&self) -> &[Lattice] {
        &self.chains
    }

    /// One propagation per node across all chains, each from a random
    /// node of a random chain. Needs at least two chains.
    pub fn propagate_cross_chain<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<Vec<ChainPropagation>, LatticeError> {
        if self.chains.len() < 2 {
            info!("not enough chains for cross-chain signals");
            return Ok(Vec::new());
        }

        let all: Vec<(usize, String)> = self
            .chains
            .iter()
            .enumerate()
            .flat_map(|(i, lattice)| lattice.ids().into_iter().map(move |id| (i, id.to_string())))
            .collect();

        let mut reports = Vec::with_capacity(all.len());
        for _ in 0..all.len() {
            let Some((chain, start)) = all.choose(rng) else {
                break;
            };
            let signal = pick(rng, &HARMONICS_SIGNALS);
            let propagation = self.chains[*chain].propagate_signal(signal, start, self.energy_cost)?;
            reports.push(ChainPropagation {
                chain: chain + 1,
                propagation,
            });
        }
        Ok(reports)
    }
}

// --- real-time orchestration ---

#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub tick: usize,
    pub fetched: Vec<String>,
    pub assignments: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consensus: Option<ConsensusOutcome>,
}

/// A node's last snapshot as read back from the store.
#[derive(Debug, Clone, Serialize)]
pub struct StoredState {
    pub node_id: String,
    pub state: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrchestrationReport {
    pub ticks: Vec<TickReport>,
    pub final_states: Vec<StoredState>,
}

/// `RTNode`s pulling tasks from a queue, snapshotting into a store, and
/// periodically deciding by consensus.
#[derive(Debug, Clone)]
pub struct SwarmOrchestration {
    lattice: Lattice,
}

impl SwarmOrchestration {
    pub fn new(node_count: usize, energy: f64) -> Self {
        SwarmOrchestration {
            lattice: build_lattice("RTNode", node_count, energy, Shape::Isolated),
        }
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    fn total_assigned(&self) -> usize {
        self.lattice
            .nodes()
            .iter()
            .map(|n| n.state.assigned_tasks.len())
            .sum()
    }

    /// Run a fixed number of ticks.
    pub fn run<R: Rng + ?Sized>(
        &mut self,
        ticks: usize,
        queue: &mut dyn TaskQueue,
        store: &mut dyn StateStore,
        decider: &dyn ConsensusDecider,
        rng: &mut R,
    ) -> OrchestrationReport {
        let mut reports = Vec::with_capacity(ticks);

        for tick in 1..=ticks {
            let fetched = queue.pop_tasks(ORCHESTRATION_BATCH);
            info!(tick, fetched = fetched.len(), "orchestration tick");

            let mut assignments = Vec::new();
            for task in &fetched {
                let Some(id) = pick_node(&self.lattice, rng) else {
                    break;
                };
                if let Some(node) = self.lattice.node_mut(&id) {
                    node.state.assigned_tasks.push(task.clone());
                    assignments.push((id, task.clone()));
                }
            }

            for node in self.lattice.nodes() {
                store.store_data(node.id(), node.snapshot());
            }

            let consensus = if self.total_assigned() > CONSENSUS_TRIGGER {
                let outcome =
                    decider.attempt_swarm_consensus(self.lattice.nodes(), ORCHESTRATION_PROPOSAL);
                info!(approved = outcome.approved, "swarm consensus attempted");
                for node in self.lattice.nodes_mut() {
                    node.state.assigned_tasks.clear();
                }
                Some(outcome)
            } else {
                None
            };

            reports.push(TickReport {
                tick,
                fetched,
                assignments,
                consensus,
            });
        }

        let final_states = self
            .lattice
            .ids()
            .into_iter()
            .map(|id| StoredState {
                node_id: id.to_string(),
                state: store.retrieve_data(id),
                stored_at: store.stored_at(id),
            })
            .collect();

        OrchestrationReport {
            ticks: reports,
            final_states,
        }
    }
}

// --- distributed insight ---

#[derive(Debug, Clone, Serialize)]
pub struct InsightReport {
    pub articles: usize,
    pub tasks: Vec<(String, String)>,
    pub consensus: ConsensusOutcome,
    pub propagations: Vec<PropagationReport>,
    pub summary: String,
}

pub const INSIGHT_NODES: usize = 4;

/// Run headlines through a four-node coordinator: assign tasks, take a
/// health vote, then flood each headline title from a random node. With no
/// headlines the coordinator's random signals are used instead.
pub fn integrate_insights<R: Rng + ?Sized>(
    headlines: &[Headline],
    energy: f64,
    energy_cost: f64,
    rng: &mut R,
) -> Result<InsightReport, LatticeError> {
    let mut coordinator = SynergyCoordinator::new(INSIGHT_NODES, energy, energy_cost);
    let mut scheduler = RecordingScheduler::default();
    let tasks = coordinator.assign_tasks(rng, &mut scheduler);
    let consensus = coordinator.evaluate(
        &HealthMajority {
            min_energy: DEFAULT_THRESHOLD,
        },
        "Adopt distributed insight?",
    );

    let propagations = if headlines.is_empty() {
        info!("no headlines supplied; using coordinator signals");
        coordinator.propagate_random(rng)?
    } else {
        let mut reports = Vec::with_capacity(headlines.len());
        for headline in headlines {
            if let Some(start) = pick_node(coordinator.lattice(), rng) {
                reports.push(coordinator.propagate_from(&headline.title, &start)?);
            }
        }
        reports
    };

    let summary = format!(
        "=== Distributed Insight Summary ===\n\
         Processed {} articles across {} synergy nodes.\n\
         {} propagations delivered; consensus {}.\n\
         ===================================",
        headlines.len(),
        INSIGHT_NODES,
        propagations.len(),
        if consensus.approved { "approved" } else { "rejected" },
    );

    Ok(InsightReport {
        articles: headlines.len(),
        tasks,
        consensus,
        propagations,
        summary,
    })
}
