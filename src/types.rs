//! Core types for lattice nodes and their state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Energy a node starts with when none is given.
pub const DEFAULT_ENERGY: f64 = 100.0;

/// A tagged value stored under an open-ended state key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Flag(bool),
    Number(f64),
    Text(String),
    List(Vec<StateValue>),
}

impl StateValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            StateValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            StateValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&str> for StateValue {
    fn from(s: &str) -> Self {
        StateValue::Text(s.to_string())
    }
}

impl From<String> for StateValue {
    fn from(s: String) -> Self {
        StateValue::Text(s)
    }
}

impl From<f64> for StateValue {
    fn from(n: f64) -> Self {
        StateValue::Number(n)
    }
}

impl From<bool> for StateValue {
    fn from(b: bool) -> Self {
        StateValue::Flag(b)
    }
}

/// Mutable state carried by a node.
///
/// The fields every driver relies on are named and typed; anything else
/// lives in `extra` under a caller-chosen key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    /// Signals delivered to this node, oldest first. Append-only.
    #[serde(default)]
    pub received_signals: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assigned_tasks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fusion_history: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, StateValue>,
}

/// A graph vertex with identity, state, and an energy budget.
///
/// Nodes never traverse the graph themselves; the owning
/// [`Lattice`](crate::graph::Lattice) does that.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    id: String,
    energy: f64,
    pub state: NodeState,
}

impl Node {
    /// Create a node with empty state and [`DEFAULT_ENERGY`].
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_energy(id, DEFAULT_ENERGY)
    }

    /// Create a node with empty state and the given energy (clamped at 0).
    pub fn with_energy(id: impl Into<String>, energy: f64) -> Self {
        Node {
            id: id.into(),
            energy: clamp_energy(energy),
            state: NodeState::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn energy(&self) -> f64 {
        self.energy
    }

    /// Subtract `amount` from the energy budget, stopping at 0.
    ///
    /// Negative or NaN amounts never add energy.
    pub fn deplete(&mut self, amount: f64) {
        let amount = if amount.is_nan() { 0.0 } else { amount.max(0.0) };
        self.energy = clamp_energy(self.energy - amount);
    }

    /// Overwrite the energy budget, e.g. to inject a fault.
    pub fn set_energy(&mut self, energy: f64) {
        self.energy = clamp_energy(energy);
    }

    pub fn set_state(&mut self, key: impl Into<String>, value: impl Into<StateValue>) {
        self.state.extra.insert(key.into(), value.into());
    }

    /// Look up an open-ended state key, falling back to `default`.
    pub fn get_state(&self, key: &str, default: StateValue) -> StateValue {
        self.state.extra.get(key).cloned().unwrap_or(default)
    }

    /// Record a delivered signal.
    pub fn receive(&mut self, signal: &str) {
        self.state.received_signals.push(signal.to_string());
    }

    pub fn last_signal(&self) -> Option<&str> {
        self.state.received_signals.last().map(String::as_str)
    }

    pub fn push_fusion(&mut self, entry: impl Into<String>) {
        self.state.fusion_history.push(entry.into());
    }

    /// JSON view of the node, used when handing state to external stores.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "energy": self.energy,
            "state": self.state,
        })
    }
}

fn clamp_energy(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.max(0.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_node_has_default_energy_and_empty_state() {
        let node = Node::new("A");
        assert_eq!(node.id(), "A");
        assert_eq!(node.energy(), DEFAULT_ENERGY);
        assert_eq!(node.state, NodeState::default());
    }

    #[test]
    fn test_deplete_subtracts() {
        let mut node = Node::with_energy("A", 25.0);
        node.deplete(5.0);
        assert_eq!(node.energy(), 20.0);
    }

    #[test]
    fn test_deplete_clamps_at_zero() {
        let mut node = Node::with_energy("A", 3.0);
        node.deplete(10.0);
        assert_eq!(node.energy(), 0.0);
        node.deplete(1.0);
        assert_eq!(node.energy(), 0.0);
    }

    #[test]
    fn test_deplete_ignores_negative_and_nan() {
        let mut node = Node::with_energy("A", 10.0);
        node.deplete(-5.0);
        assert_eq!(node.energy(), 10.0);
        node.deplete(f64::NAN);
        assert_eq!(node.energy(), 10.0);
    }

    #[test]
    fn test_with_energy_clamps_negative() {
        assert_eq!(Node::with_energy("A", -4.0).energy(), 0.0);
        assert_eq!(Node::with_energy("A", f64::NAN).energy(), 0.0);

        let mut node = Node::new("A");
        node.set_energy(-1.0);
        assert_eq!(node.energy(), 0.0);
    }

    #[test]
    fn test_state_roundtrip_and_default() {
        let mut node = Node::new("A");
        node.set_state("region", "eu-west");
        node.set_state("load", 0.5);

        assert_eq!(
            node.get_state("region", StateValue::Flag(false)),
            StateValue::Text("eu-west".into())
        );
        assert_eq!(node.get_state("load", 0.0.into()).as_number(), Some(0.5));
        assert_eq!(
            node.get_state("missing", "fallback".into()).as_text(),
            Some("fallback")
        );
    }

    #[test]
    fn test_receive_appends_in_order() {
        let mut node = Node::new("A");
        node.receive("one");
        node.receive("two");
        assert_eq!(node.state.received_signals, vec!["one", "two"]);
        assert_eq!(node.last_signal(), Some("two"));
    }

    #[test]
    fn test_snapshot_includes_typed_fields() {
        let mut node = Node::with_energy("A", 12.0);
        node.state.task = Some("DataAnalysis".into());
        node.push_fusion("frame-1");

        let snap = node.snapshot();
        assert_eq!(snap["id"], "A");
        assert_eq!(snap["energy"], 12.0);
        assert_eq!(snap["state"]["task"], "DataAnalysis");
        assert_eq!(snap["state"]["fusion_history"][0], "frame-1");
    }
}
