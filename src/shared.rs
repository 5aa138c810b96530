//! A lattice handle that can be shared between threads.

use crate::graph::{Lattice, LatticeError, Propagation, PropagationReport};
use crate::integrity::IntegrityReport;
use crate::types::Node;
use std::sync::{Arc, Mutex, MutexGuard};

/// Cloneable handle around one [`Lattice`].
///
/// A single lock covers both topology mutation and propagation, so a
/// traversal never observes a half-added node or edge.
#[derive(Debug, Clone, Default)]
pub struct SharedLattice {
    inner: Arc<Mutex<Lattice>>,
}

impl SharedLattice {
    pub fn new(lattice: Lattice) -> Self {
        SharedLattice {
            inner: Arc::new(Mutex::new(lattice)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Lattice> {
        // Every operation leaves the lattice consistent before it can panic,
        // so a poisoned lock still guards valid data.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_node(&self, node: Node) -> Result<(), LatticeError> {
        self.lock().add_node(node)
    }

    pub fn connect(&self, a: &str, b: &str) -> Result<(), LatticeError> {
        self.lock().connect(a, b)
    }

    pub fn propagate_signal(
        &self,
        signal: &str,
        start: &str,
        energy_cost: f64,
    ) -> Result<PropagationReport, LatticeError> {
        self.lock().propagate_signal(signal, start, energy_cost)
    }

    pub fn propagate_signal_with(
        &self,
        signal: &str,
        start: &str,
        energy_cost: f64,
        mode: Propagation,
    ) -> Result<PropagationReport, LatticeError> {
        self.lock()
            .propagate_signal_with(signal, start, energy_cost, mode)
    }

    pub fn validate_integrity(&self, threshold: f64) -> IntegrityReport {
        self.lock().validate_integrity(threshold)
    }

    /// Run `f` with exclusive access to the lattice.
    pub fn with<R>(&self, f: impl FnOnce(&mut Lattice) -> R) -> R {
        f(&mut self.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_concurrent_propagation_is_serialized() {
        let shared = SharedLattice::default();
        shared.add_node(Node::with_energy("A", 1000.0)).unwrap();
        shared.add_node(Node::with_energy("B", 1000.0)).unwrap();
        shared.connect("A", "B").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for _ in 0..10 {
                        shared
                            .propagate_signal(&format!("t{i}"), "A", 1.0)
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        shared.with(|lattice| {
            let b = lattice.node("B").unwrap();
            assert_eq!(b.state.received_signals.len(), 80);
            assert_eq!(b.energy(), 920.0);
        });
    }

    #[test]
    fn test_errors_pass_through() {
        let shared = SharedLattice::default();
        shared.add_node(Node::new("A")).unwrap();
        assert_eq!(
            shared.add_node(Node::new("A")),
            Err(LatticeError::DuplicateNode("A".into()))
        );
        assert_eq!(
            shared.connect("A", "B"),
            Err(LatticeError::UnknownNode("B".into()))
        );
    }
}
