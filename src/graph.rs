//! The lattice graph and breadth-first signal propagation.

use crate::types::Node;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LatticeError {
    #[error("Unknown node: {0}")]
    UnknownNode(String),
    #[error("Duplicate node: {0}")]
    DuplicateNode(String),
}

/// How a propagation decides whether a visited node relays the signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Propagation {
    /// Every reachable node is visited; energy never affects reachability.
    #[default]
    Flood,
    /// A node relays only if it could afford the full cost before paying it.
    /// Exhausted nodes still receive the signal but the flood stops there.
    EnergyGated,
}

/// One node visit during a propagation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Visit {
    pub node_id: String,
    pub hop: usize,
    pub energy_before: f64,
    pub energy_after: f64,
    pub relayed: bool,
}

/// The outcome of a single `propagate_signal` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropagationReport {
    pub signal: String,
    pub origin: String,
    pub energy_cost: f64,
    pub mode: Propagation,
    pub visits: Vec<Visit>,
}

impl PropagationReport {
    /// Visited node ids in traversal order.
    pub fn visited(&self) -> Vec<&str> {
        self.visits.iter().map(|v| v.node_id.as_str()).collect()
    }

    pub fn energy_spent(&self) -> f64 {
        self.visits
            .iter()
            .map(|v| v.energy_before - v.energy_after)
            .sum()
    }

    /// Deepest hop reached from the origin.
    pub fn depth(&self) -> usize {
        self.visits.iter().map(|v| v.hop).max().unwrap_or(0)
    }
}

/// An undirected graph of [`Node`]s.
///
/// Nodes keep their insertion order and each adjacency list keeps the order
/// in which edges were added, so traversals are deterministic. `edge_list`
/// records edges in `connect` order; replaying it rebuilds the same
/// adjacency lists.
#[derive(Debug, Clone, Default)]
pub struct Lattice {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    adjacency: Vec<Vec<usize>>,
    edge_list: Vec<(usize, usize)>,
}

impl Lattice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Mutable access to every node. Ids are immutable, so the index stays valid.
    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.index.get(id).map(|&i| &mut self.nodes[i])
    }

    /// Node ids in insertion order.
    pub fn ids(&self) -> Vec<&str> {
        self.nodes.iter().map(Node::id).collect()
    }

    fn position(&self, id: &str) -> Result<usize, LatticeError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| LatticeError::UnknownNode(id.to_string()))
    }

    /// Add a node. Fails without modifying the lattice if the id is taken.
    pub fn add_node(&mut self, node: Node) -> Result<(), LatticeError> {
        if self.index.contains_key(node.id()) {
            return Err(LatticeError::DuplicateNode(node.id().to_string()));
        }
        debug!(node = node.id(), energy = node.energy(), "adding node");
        self.index.insert(node.id().to_string(), self.nodes.len());
        self.nodes.push(node);
        self.adjacency.push(Vec::new());
        Ok(())
    }

    /// Add an undirected edge between two existing nodes.
    ///
    /// Reconnecting an already-connected pair is a no-op.
    pub fn connect(&mut self, a: &str, b: &str) -> Result<(), LatticeError> {
        let ia = self.position(a)?;
        let ib = self.position(b)?;

        if self.adjacency[ia].contains(&ib) {
            return Ok(());
        }
        self.adjacency[ia].push(ib);
        if ia != ib {
            self.adjacency[ib].push(ia);
        }
        self.edge_list.push((ia, ib));
        debug!(a, b, "connected nodes");
        Ok(())
    }

    /// Neighbors of `id` in the order their edges were added.
    pub fn neighbors(&self, id: &str) -> Result<Vec<&str>, LatticeError> {
        let i = self.position(id)?;
        Ok(self.adjacency[i]
            .iter()
            .map(|&n| self.nodes[n].id())
            .collect())
    }

    /// Every undirected edge once, in the order it was first connected.
    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.edge_list
            .iter()
            .map(|&(a, b)| (self.nodes[a].id(), self.nodes[b].id()))
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_list.len()
    }

    /// Force a node's energy to zero.
    pub fn drain_node(&mut self, id: &str) -> Result<(), LatticeError> {
        let i = self.position(id)?;
        self.nodes[i].set_energy(0.0);
        info!(node = id, "node drained to zero energy");
        Ok(())
    }

    /// Flood `signal` outward from `start`, depleting each visited node by
    /// `energy_cost`. Energy never limits which nodes are reached.
    pub fn propagate_signal(
        &mut self,
        signal: &str,
        start: &str,
        energy_cost: f64,
    ) -> Result<PropagationReport, LatticeError> {
        self.propagate_signal_with(signal, start, energy_cost, Propagation::Flood)
    }

    /// Breadth-first propagation with an explicit relay policy.
    pub fn propagate_signal_with(
        &mut self,
        signal: &str,
        start: &str,
        energy_cost: f64,
        mode: Propagation,
    ) -> Result<PropagationReport, LatticeError> {
        let origin = self.position(start)?;
        debug!(signal, start, energy_cost, ?mode, "propagating signal");

        let mut visited = vec![false; self.nodes.len()];
        let mut queue = VecDeque::new();
        let mut visits = Vec::new();

        visited[origin] = true;
        queue.push_back((origin, 0usize));

        while let Some((current, hop)) = queue.pop_front() {
            let node = &mut self.nodes[current];
            let energy_before = node.energy();
            node.receive(signal);
            node.deplete(energy_cost);

            let relayed = match mode {
                Propagation::Flood => true,
                Propagation::EnergyGated => energy_before > 0.0 && energy_before >= energy_cost,
            };

            visits.push(Visit {
                node_id: node.id().to_string(),
                hop,
                energy_before,
                energy_after: node.energy(),
                relayed,
            });

            if !relayed {
                continue;
            }
            for &next in &self.adjacency[current] {
                if !visited[next] {
                    visited[next] = true;
                    queue.push_back((next, hop + 1));
                }
            }
        }

        info!(
            signal,
            start,
            reached = visits.len(),
            "propagation finished"
        );

        Ok(PropagationReport {
            signal: signal.to_string(),
            origin: start.to_string(),
            energy_cost,
            mode,
            visits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice(ids: &[&str], energy: f64) -> Lattice {
        let mut lattice = Lattice::new();
        for id in ids {
            lattice.add_node(Node::with_energy(*id, energy)).unwrap();
        }
        lattice
    }

    // --- topology ---

    #[test]
    fn test_add_node_keeps_insertion_order() {
        let lattice = lattice(&["C", "A", "B"], 10.0);
        assert_eq!(lattice.ids(), vec!["C", "A", "B"]);
        assert_eq!(lattice.len(), 3);
    }

    #[test]
    fn test_add_duplicate_node_is_rejected_without_partial_insert() {
        let mut lattice = lattice(&["A", "B"], 10.0);
        lattice.connect("A", "B").unwrap();

        let err = lattice.add_node(Node::with_energy("A", 99.0)).unwrap_err();

        assert_eq!(err, LatticeError::DuplicateNode("A".into()));
        assert_eq!(lattice.len(), 2);
        assert_eq!(lattice.node("A").unwrap().energy(), 10.0);
        assert_eq!(lattice.neighbors("A").unwrap(), vec!["B"]);
    }

    #[test]
    fn test_connect_unknown_node() {
        let mut lattice = lattice(&["A"], 10.0);
        assert_eq!(
            lattice.connect("A", "Z"),
            Err(LatticeError::UnknownNode("Z".into()))
        );
        assert_eq!(
            lattice.connect("Y", "A"),
            Err(LatticeError::UnknownNode("Y".into()))
        );
        assert_eq!(lattice.edge_count(), 0);
    }

    #[test]
    fn test_connect_is_symmetric_and_idempotent() {
        let mut lattice = lattice(&["A", "B"], 10.0);
        lattice.connect("A", "B").unwrap();
        lattice.connect("A", "B").unwrap();
        lattice.connect("B", "A").unwrap();

        assert_eq!(lattice.neighbors("A").unwrap(), vec!["B"]);
        assert_eq!(lattice.neighbors("B").unwrap(), vec!["A"]);
        assert_eq!(lattice.edges(), vec![("A", "B")]);
    }

    #[test]
    fn test_edges_keep_connect_order() {
        let mut lattice = lattice(&["A", "B", "C"], 10.0);
        lattice.connect("B", "C").unwrap();
        lattice.connect("A", "C").unwrap();
        lattice.connect("C", "B").unwrap();

        assert_eq!(lattice.edges(), vec![("B", "C"), ("A", "C")]);
        assert_eq!(lattice.edge_count(), 2);
    }

    #[test]
    fn test_explicit_self_loop() {
        let mut lattice = lattice(&["A"], 10.0);
        lattice.connect("A", "A").unwrap();
        assert_eq!(lattice.neighbors("A").unwrap(), vec!["A"]);
        assert_eq!(lattice.edges(), vec![("A", "A")]);

        let report = lattice.propagate_signal("loop", "A", 1.0).unwrap();
        assert_eq!(report.visited(), vec!["A"]);
    }

    #[test]
    fn test_drain_node() {
        let mut lattice = lattice(&["A"], 10.0);
        lattice.drain_node("A").unwrap();
        assert_eq!(lattice.node("A").unwrap().energy(), 0.0);
        assert!(lattice.drain_node("B").is_err());
    }

    // --- propagate_signal ---

    #[test]
    fn test_chain_scenario() {
        let mut lattice = lattice(&["A", "B", "C"], 50.0);
        lattice.connect("A", "B").unwrap();
        lattice.connect("B", "C").unwrap();

        let report = lattice.propagate_signal("ping", "A", 5.0).unwrap();

        assert_eq!(report.visited(), vec!["A", "B", "C"]);
        for id in ["A", "B", "C"] {
            assert_eq!(lattice.node(id).unwrap().last_signal(), Some("ping"));
        }
        assert_eq!(lattice.node("A").unwrap().energy(), 45.0);
        assert_eq!(report.energy_spent(), 15.0);
        assert_eq!(report.depth(), 2);
    }

    #[test]
    fn test_unknown_start_node() {
        let mut lattice = lattice(&["A"], 10.0);
        let err = lattice.propagate_signal("ping", "Z", 5.0).unwrap_err();
        assert_eq!(err, LatticeError::UnknownNode("Z".into()));
        assert!(lattice.node("A").unwrap().state.received_signals.is_empty());
    }

    #[test]
    fn test_isolated_nodes_only_visit_start() {
        let mut lattice = lattice(&["A", "B", "C"], 10.0);
        let report = lattice.propagate_signal("ping", "B", 1.0).unwrap();

        assert_eq!(report.visited(), vec!["B"]);
        assert!(lattice.node("A").unwrap().state.received_signals.is_empty());
        assert_eq!(lattice.node("C").unwrap().energy(), 10.0);
    }

    #[test]
    fn test_ring_visits_each_node_once() {
        let ids = ["N1", "N2", "N3", "N4", "N5"];
        let mut lattice = lattice(&ids, 10.0);
        for i in 0..ids.len() {
            lattice.connect(ids[i], ids[(i + 1) % ids.len()]).unwrap();
        }

        let report = lattice.propagate_signal("pulse", "N1", 1.0).unwrap();

        assert_eq!(report.visits.len(), 5);
        // BFS goes both ways around the ring, nearer nodes first.
        assert_eq!(report.visited(), vec!["N1", "N2", "N5", "N3", "N4"]);
        for id in ids {
            assert_eq!(lattice.node(id).unwrap().state.received_signals.len(), 1);
            assert_eq!(lattice.node(id).unwrap().energy(), 9.0);
        }
    }

    #[test]
    fn test_neighbor_order_breaks_ties() {
        let mut lattice = lattice(&["hub", "x", "y", "z"], 10.0);
        lattice.connect("hub", "z").unwrap();
        lattice.connect("hub", "x").unwrap();
        lattice.connect("hub", "y").unwrap();

        let report = lattice.propagate_signal("s", "hub", 0.0).unwrap();
        assert_eq!(report.visited(), vec!["hub", "z", "x", "y"]);
    }

    #[test]
    fn test_disconnected_component_untouched() {
        let mut lattice = lattice(&["A", "B", "C", "D"], 10.0);
        lattice.connect("A", "B").unwrap();
        lattice.connect("C", "D").unwrap();

        let report = lattice.propagate_signal("s", "C", 2.0).unwrap();
        assert_eq!(report.visited(), vec!["C", "D"]);
        assert_eq!(lattice.node("A").unwrap().energy(), 10.0);
    }

    #[test]
    fn test_flood_visits_exhausted_nodes() {
        let mut lattice = lattice(&["A", "B", "C"], 0.0);
        lattice.connect("A", "B").unwrap();
        lattice.connect("B", "C").unwrap();

        let report = lattice.propagate_signal("s", "A", 5.0).unwrap();

        assert_eq!(report.visited(), vec!["A", "B", "C"]);
        assert!(report.visits.iter().all(|v| v.energy_after == 0.0));
    }

    #[test]
    fn test_energy_gated_stops_at_exhausted_node() {
        let mut lattice = Lattice::new();
        lattice.add_node(Node::with_energy("A", 10.0)).unwrap();
        lattice.add_node(Node::with_energy("B", 2.0)).unwrap();
        lattice.add_node(Node::with_energy("C", 10.0)).unwrap();
        lattice.connect("A", "B").unwrap();
        lattice.connect("B", "C").unwrap();

        let report = lattice
            .propagate_signal_with("s", "A", 5.0, Propagation::EnergyGated)
            .unwrap();

        assert_eq!(report.visited(), vec!["A", "B"]);
        assert!(report.visits[0].relayed);
        assert!(!report.visits[1].relayed);
        assert_eq!(lattice.node("B").unwrap().energy(), 0.0);
        assert!(lattice.node("C").unwrap().state.received_signals.is_empty());
    }

    #[test]
    fn test_repeated_propagation_accumulates_signals() {
        let mut lattice = lattice(&["A", "B"], 12.0);
        lattice.connect("A", "B").unwrap();

        lattice.propagate_signal("first", "A", 5.0).unwrap();
        lattice.propagate_signal("second", "B", 5.0).unwrap();
        lattice.propagate_signal("third", "A", 5.0).unwrap();

        let b = lattice.node("B").unwrap();
        assert_eq!(b.state.received_signals, vec!["first", "second", "third"]);
        assert_eq!(b.energy(), 0.0);
    }
}
