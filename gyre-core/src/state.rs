//! Per-run state store for cycle-carried node state.
//!
//! Each run owns one store; entries live for the run and are discarded
//! with it. Within a cycle group the store maps node IDs to carried state
//! (an opaque structured value the node itself defines, such as a running
//! history or counters), with per-iteration snapshots kept for inspection.
//!
//! Snapshots handed to nodes are always objects. On iteration 0 the
//! snapshot resolves to an **empty object, never null** — callers must be
//! able to read fields off the snapshot without null checks.

use crate::types::{CycleId, NodeId};
use crate::value::Value;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
struct CycleState {
    /// Last-known carried state per node.
    current: HashMap<NodeId, Value>,
    /// Historical snapshots keyed by (node, iteration).
    history: HashMap<(NodeId, u32), Value>,
}

/// Per-run, per-cycle carried-state store.
///
/// The store for a given cycle group is accessed by exactly one execution
/// path at a time (iterations are strictly sequential), so the lock here
/// only guards against concurrent access from independent groups.
#[derive(Default)]
pub struct StateStore {
    cycles: RwLock<HashMap<CycleId, CycleState>>,
}

impl StateStore {
    /// Create an empty store for a new run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current state snapshot for a node.
    ///
    /// Returns an empty object when the node has not yet recorded state
    /// (iteration 0), never null.
    pub fn snapshot(&self, cycle: &CycleId, node: NodeId) -> Value {
        let cycles = self.cycles.read();
        cycles
            .get(cycle)
            .and_then(|state| state.current.get(&node))
            .cloned()
            .unwrap_or_else(Value::object)
    }

    /// Record a node's updated state for an iteration.
    ///
    /// The value becomes the snapshot seen by the next iteration and is
    /// also retained under `(node, iteration)` for later inspection.
    pub fn record(&self, cycle: &CycleId, node: NodeId, iteration: u32, state: Value) {
        // Normalize nulls away at the boundary; downstream code relies on
        // snapshots always being objects.
        let state = if state.is_null() { Value::object() } else { state };

        let mut cycles = self.cycles.write();
        let entry = cycles.entry(cycle.clone()).or_default();
        entry.history.insert((node, iteration), state.clone());
        entry.current.insert(node, state);
    }

    /// Get the snapshot recorded at a specific iteration, if any.
    pub fn at_iteration(&self, cycle: &CycleId, node: NodeId, iteration: u32) -> Option<Value> {
        let cycles = self.cycles.read();
        cycles
            .get(cycle)
            .and_then(|state| state.history.get(&(node, iteration)))
            .cloned()
    }

    /// Number of iterations recorded for a node within a cycle.
    pub fn iterations_recorded(&self, cycle: &CycleId, node: NodeId) -> usize {
        let cycles = self.cycles.read();
        cycles
            .get(cycle)
            .map(|state| {
                state
                    .history
                    .keys()
                    .filter(|(n, _)| *n == node)
                    .count()
            })
            .unwrap_or(0)
    }

    /// View all current states of a cycle as one object keyed by node ID.
    ///
    /// Used as the `accumulated_state` argument to convergence callbacks.
    pub fn accumulated(&self, cycle: &CycleId) -> Value {
        let cycles = self.cycles.read();
        let mut out = Value::object();
        if let Some(state) = cycles.get(cycle) {
            for (node, value) in &state.current {
                out.set_field(node.to_string(), value.clone());
            }
        }
        out
    }

    /// Drop all state recorded for a cycle.
    pub fn clear_cycle(&self, cycle: &CycleId) {
        self.cycles.write().remove(cycle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_snapshot_is_empty_object_never_null() {
        let store = StateStore::new();
        let cycle = CycleId::new("refine");

        let snapshot = store.snapshot(&cycle, NodeId::new(0));
        assert!(snapshot.is_object());
        assert!(!snapshot.is_null());
        // Field reads on the empty snapshot work without null handling.
        assert!(snapshot.get_field("history").is_none());
    }

    #[test]
    fn recorded_state_becomes_next_snapshot() {
        let store = StateStore::new();
        let cycle = CycleId::new("refine");
        let node = NodeId::new(1);

        let mut state = Value::object();
        state.set_field("history", vec![1i64].into());
        store.record(&cycle, node, 0, state);

        let snapshot = store.snapshot(&cycle, node);
        assert_eq!(snapshot.get_field("history").unwrap().inner(), &json!([1]));
    }

    #[test]
    fn null_state_normalized_to_empty_object() {
        let store = StateStore::new();
        let cycle = CycleId::new("refine");
        let node = NodeId::new(1);

        store.record(&cycle, node, 0, Value::null());
        assert!(store.snapshot(&cycle, node).is_object());
    }

    #[test]
    fn per_iteration_history_is_retained() {
        let store = StateStore::new();
        let cycle = CycleId::new("refine");
        let node = NodeId::new(2);

        for i in 0..3u32 {
            let mut state = Value::object();
            state.set_field("count", Value::int(i as i64));
            store.record(&cycle, node, i, state);
        }

        assert_eq!(store.iterations_recorded(&cycle, node), 3);
        assert_eq!(
            store.at_iteration(&cycle, node, 1).unwrap().get_f64("count"),
            Some(1.0)
        );
        assert_eq!(store.snapshot(&cycle, node).get_f64("count"), Some(2.0));
    }

    #[test]
    fn cycles_are_isolated() {
        let store = StateStore::new();
        let a = CycleId::new("a");
        let b = CycleId::new("b");
        let node = NodeId::new(0);

        let mut state = Value::object();
        state.set_field("x", Value::int(1));
        store.record(&a, node, 0, state);

        assert!(store.snapshot(&b, node).get_field("x").is_none());
    }

    #[test]
    fn clear_cycle_discards_state() {
        let store = StateStore::new();
        let cycle = CycleId::new("refine");
        let node = NodeId::new(0);

        let mut state = Value::object();
        state.set_field("x", Value::int(1));
        store.record(&cycle, node, 0, state);
        store.clear_cycle(&cycle);

        assert!(store.snapshot(&cycle, node).get_field("x").is_none());
        assert_eq!(store.iterations_recorded(&cycle, node), 0);
    }

    #[test]
    fn accumulated_view_keys_by_node() {
        let store = StateStore::new();
        let cycle = CycleId::new("refine");

        let mut state = Value::object();
        state.set_field("count", Value::int(4));
        store.record(&cycle, NodeId::new(7), 0, state);

        let acc = store.accumulated(&cycle);
        assert_eq!(acc.get_f64("node_7.count"), Some(4.0));
    }
}
