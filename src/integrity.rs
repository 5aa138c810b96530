//! Energy integrity checks over a lattice.

use crate::graph::Lattice;
use serde::Serialize;
use std::fmt;
use tracing::warn;

/// Conventional cutoff for a "healthy" node.
pub const DEFAULT_THRESHOLD: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
        }
    }
}

/// Classification of a single node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeCheck {
    pub node_id: String,
    pub energy: f64,
    pub verdict: Verdict,
}

impl fmt::Display for NodeCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Node {} => {} (energy={})",
            self.node_id, self.verdict, self.energy
        )
    }
}

/// Result of sweeping every node against a threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrityReport {
    pub threshold: f64,
    pub checks: Vec<NodeCheck>,
}

impl IntegrityReport {
    /// Overall verdict: PASS only if every node passes.
    pub fn verdict(&self) -> Verdict {
        if self.passed() {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }

    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.verdict == Verdict::Pass)
    }

    pub fn failures(&self) -> Vec<&NodeCheck> {
        self.checks
            .iter()
            .filter(|c| c.verdict == Verdict::Fail)
            .collect()
    }
}

impl Lattice {
    /// Classify every node as PASS (`energy >= threshold`) or FAIL.
    pub fn validate_integrity(&self, threshold: f64) -> IntegrityReport {
        let checks: Vec<NodeCheck> = self
            .nodes()
            .iter()
            .map(|node| NodeCheck {
                node_id: node.id().to_string(),
                energy: node.energy(),
                verdict: if node.energy() >= threshold {
                    Verdict::Pass
                } else {
                    Verdict::Fail
                },
            })
            .collect();

        let report = IntegrityReport { threshold, checks };
        for failed in report.failures() {
            warn!(
                node = %failed.node_id,
                energy = failed.energy,
                threshold,
                "node below integrity threshold"
            );
        }
        report
    }
}
