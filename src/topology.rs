//! Topology builders and YAML topology files.

use crate::graph::{Lattice, LatticeError};
use crate::types::Node;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Lattice(#[from] LatticeError),
}

/// Shapes the drivers build lattices in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// `1-2, 2-3, ..., (n-1)-n`
    Chain,
    /// A chain plus `n-1`.
    Ring,
    /// Every pair connected.
    Mesh,
    /// No edges.
    Isolated,
}

/// Node id for position `n` (1-based) under `prefix`.
pub fn node_id(prefix: &str, n: usize) -> String {
    format!("{prefix}-{n}")
}

/// Build a lattice of `count` nodes named `{prefix}-1..={count}`.
pub fn build_lattice(prefix: &str, count: usize, energy: f64, shape: Shape) -> Lattice {
    let mut lattice = Lattice::new();
    let ids: Vec<String> = (1..=count).map(|n| node_id(prefix, n)).collect();

    for id in &ids {
        lattice
            .add_node(Node::with_energy(id.clone(), energy))
            .expect("generated node ids are unique");
    }
    let mut link = |a: &str, b: &str| {
        lattice
            .connect(a, b)
            .expect("edges only reference generated ids");
    };
    match shape {
        Shape::Isolated => {}
        Shape::Chain => {
            for pair in ids.windows(2) {
                link(&pair[0], &pair[1]);
            }
        }
        Shape::Ring => {
            for i in 0..count {
                link(&ids[i], &ids[(i + 1) % count]);
            }
        }
        Shape::Mesh => {
            for i in 0..count {
                for j in (i + 1)..count {
                    link(&ids[i], &ids[j]);
                }
            }
        }
    }
    lattice
}

/// A node entry in a topology file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
}

/// On-disk topology: nodes in insertion order plus undirected edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologyFile {
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<[String; 2]>,
}

impl TopologyFile {
    /// Build a lattice, giving nodes without an explicit energy `default_energy`.
    pub fn into_lattice(self, default_energy: f64) -> Result<Lattice, LatticeError> {
        let mut lattice = Lattice::new();
        for spec in self.nodes {
            let energy = spec.energy.unwrap_or(default_energy);
            lattice.add_node(Node::with_energy(spec.id, energy))?;
        }
        for [a, b] in &self.edges {
            lattice.connect(a, b)?;
        }
        Ok(lattice)
    }

    /// Capture a lattice's nodes, current energies, and edges.
    pub fn from_lattice(lattice: &Lattice) -> Self {
        TopologyFile {
            nodes: lattice
                .nodes()
                .iter()
                .map(|n| NodeSpec {
                    id: n.id().to_string(),
                    energy: Some(n.energy()),
                })
                .collect(),
            edges: lattice
                .edges()
                .into_iter()
                .map(|(a, b)| [a.to_string(), b.to_string()])
                .collect(),
        }
    }
}

/// Read a topology file and build its lattice.
pub fn load_topology(path: &Path, default_energy: f64) -> Result<Lattice, TopologyError> {
    let content = fs::read_to_string(path)?;
    let file: TopologyFile = serde_yaml::from_str(&content)?;
    Ok(file.into_lattice(default_energy)?)
}

/// Write a lattice's topology and energies to `path`.
pub fn save_topology(path: &Path, lattice: &Lattice) -> Result<(), TopologyError> {
    let yaml = serde_yaml::to_string(&TopologyFile::from_lattice(lattice))?;
    fs::write(path, yaml)?;
    Ok(())
}
