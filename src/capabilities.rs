//! Capability interfaces injected into the scenario drivers.
//!
//! None of these are part of the lattice itself. Each trait comes with a
//! small in-memory implementation for local runs and tests.

use crate::types::Node;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// Produces task identifiers for orchestration loops.
pub trait TaskQueue {
    /// Remove and return up to `batch_size` tasks.
    fn pop_tasks(&mut self, batch_size: usize) -> Vec<String>;
}

/// External key/value store for node state snapshots.
pub trait StateStore {
    fn store_data(&mut self, key: &str, value: serde_json::Value);
    fn retrieve_data(&self, key: &str) -> Option<serde_json::Value>;

    /// When `key` was last written, if the store tracks it.
    fn stored_at(&self, _key: &str) -> Option<DateTime<Utc>> {
        None
    }
}

/// Outcome of a swarm consensus attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsensusOutcome {
    pub proposal: String,
    pub approved: bool,
    pub votes_for: usize,
    pub votes_against: usize,
}

/// Reaches a group decision by inspecting node state. Read-only.
pub trait ConsensusDecider {
    fn attempt_swarm_consensus(&self, nodes: &[Node], proposal: &str) -> ConsensusOutcome;
}

/// Adjusts node state between evolution rounds.
pub trait SwarmOptimizer {
    fn optimize_swarm(&mut self, nodes: &mut [Node]);
}

/// Accepts a batch of node-to-task assignments.
pub trait TaskScheduler {
    fn schedule_tasks(&mut self, assignments: &[(String, String)]);
}

/// FIFO queue over a fixed task list.
#[derive(Debug, Clone, Default)]
pub struct VecTaskQueue {
    tasks: VecDeque<String>,
}

impl VecTaskQueue {
    pub fn new<I, S>(tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        VecTaskQueue {
            tasks: tasks.into_iter().map(Into::into).collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.tasks.len()
    }
}

impl TaskQueue for VecTaskQueue {
    fn pop_tasks(&mut self, batch_size: usize) -> Vec<String> {
        let n = batch_size.min(self.tasks.len());
        self.tasks.drain(..n).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct StoredEntry {
    value: serde_json::Value,
    stored_at: DateTime<Utc>,
}

/// Process-local [`StateStore`]; later writes replace earlier ones.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, StoredEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StateStore for MemoryStore {
    fn store_data(&mut self, key: &str, value: serde_json::Value) {
        self.entries.insert(
            key.to_string(),
            StoredEntry {
                value,
                stored_at: Utc::now(),
            },
        );
    }

    fn retrieve_data(&self, key: &str) -> Option<serde_json::Value> {
        self.entries.get(key).map(|e| e.value.clone())
    }

    fn stored_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries.get(key).map(|e| e.stored_at)
    }
}

/// Approves when a strict majority of nodes have at least `min_energy`.
#[derive(Debug, Clone, Copy)]
pub struct HealthMajority {
    pub min_energy: f64,
}

impl ConsensusDecider for HealthMajority {
    fn attempt_swarm_consensus(&self, nodes: &[Node], proposal: &str) -> ConsensusOutcome {
        let votes_for = nodes
            .iter()
            .filter(|n| n.energy() >= self.min_energy)
            .count();
        let votes_against = nodes.len() - votes_for;
        ConsensusOutcome {
            proposal: proposal.to_string(),
            approved: votes_for > votes_against,
            votes_for,
            votes_against,
        }
    }
}

/// Spreads the swarm's total energy evenly across its nodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnergyLeveler;

impl SwarmOptimizer for EnergyLeveler {
    fn optimize_swarm(&mut self, nodes: &mut [Node]) {
        if nodes.is_empty() {
            return;
        }
        let mean = nodes.iter().map(Node::energy).sum::<f64>() / nodes.len() as f64;
        for node in nodes {
            node.set_energy(mean);
        }
    }
}

/// Keeps every batch it is handed.
#[derive(Debug, Clone, Default)]
pub struct RecordingScheduler {
    pub batches: Vec<Vec<(String, String)>>,
}

impl TaskScheduler for RecordingScheduler {
    fn schedule_tasks(&mut self, assignments: &[(String, String)]) {
        self.batches.push(assignments.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_queue_pops_in_batches() {
        let mut queue = VecTaskQueue::new(["t1", "t2", "t3"]);
        assert_eq!(queue.pop_tasks(2), vec!["t1", "t2"]);
        assert_eq!(queue.pop_tasks(2), vec!["t3"]);
        assert!(queue.pop_tasks(2).is_empty());
        assert_eq!(queue.remaining(), 0);
    }

    #[test]
    fn test_memory_store_overwrites() {
        let mut store = MemoryStore::new();
        store.store_data("A", serde_json::json!({"energy": 1}));
        store.store_data("A", serde_json::json!({"energy": 2}));

        assert_eq!(store.len(), 1);
        assert_eq!(store.retrieve_data("A").unwrap()["energy"], 2);
        assert!(store.retrieve_data("B").is_none());
    }

    #[test]
    fn test_memory_store_tracks_write_time() {
        let mut store = MemoryStore::new();
        let before = Utc::now();
        store.store_data("A", serde_json::json!(1));
        let first = store.stored_at("A").unwrap();
        assert!(first >= before);

        store.store_data("A", serde_json::json!(2));
        assert!(store.stored_at("A").unwrap() >= first);
        assert!(store.stored_at("B").is_none());
    }

    #[test]
    fn test_untimed_store_reports_no_time() {
        struct NullStore;
        impl StateStore for NullStore {
            fn store_data(&mut self, _key: &str, _value: serde_json::Value) {}
            fn retrieve_data(&self, _key: &str) -> Option<serde_json::Value> {
                None
            }
        }
        assert!(NullStore.stored_at("A").is_none());
    }

    #[test]
    fn test_health_majority() {
        let decider = HealthMajority { min_energy: 20.0 };
        let nodes = vec![
            Node::with_energy("A", 25.0),
            Node::with_energy("B", 30.0),
            Node::with_energy("C", 5.0),
        ];
        let outcome = decider.attempt_swarm_consensus(&nodes, "upgrade?");
        assert!(outcome.approved);
        assert_eq!((outcome.votes_for, outcome.votes_against), (2, 1));

        let split = vec![Node::with_energy("A", 25.0), Node::with_energy("B", 0.0)];
        assert!(!decider.attempt_swarm_consensus(&split, "upgrade?").approved);
    }

    #[test]
    fn test_energy_leveler() {
        let mut nodes = vec![Node::with_energy("A", 10.0), Node::with_energy("B", 30.0)];
        EnergyLeveler.optimize_swarm(&mut nodes);
        assert!(nodes.iter().all(|n| n.energy() == 20.0));
    }

    #[test]
    fn test_recording_scheduler() {
        let mut scheduler = RecordingScheduler::default();
        scheduler.schedule_tasks(&[("A".into(), "DataAnalysis".into())]);
        assert_eq!(scheduler.batches.len(), 1);
        assert_eq!(scheduler.batches[0][0].1, "DataAnalysis");
    }
}
