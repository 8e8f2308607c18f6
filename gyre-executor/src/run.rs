//! Shared state of a run in flight.

use crate::report::{CycleReport, NodeResult};
use crate::scheduler::graph::{Edge, WorkflowGraph};
use dashmap::DashMap;
use gyre_core::logging::BufferedCollector;
use gyre_core::state::StateStore;
use gyre_core::traits::CancelFlag;
use gyre_core::types::{CycleId, NodeId, RunId};
use gyre_core::value::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Run-level runtime overrides, keyed by node name then parameter name.
pub type RunParameters = HashMap<String, HashMap<String, Value>>;

/// State shared by every execution path of one run.
///
/// Node configuration is immutable post-build, so only produced outputs
/// and cycle reports need synchronized interior mutability here.
pub struct RunState {
    /// The run's unique identifier.
    pub run_id: RunId,
    /// When the run started.
    pub started_at: Instant,
    /// Cooperative cancellation flag.
    pub cancel: CancelFlag,
    /// Per-run carried-state store, discarded with the run.
    pub store: StateStore,
    /// Structured log sink.
    pub collector: Arc<BufferedCollector>,
    /// Caller-supplied runtime overrides.
    overrides: RunParameters,
    /// Final result of each completed node.
    outputs: DashMap<NodeId, NodeResult>,
    /// Terminal report of each completed cycle group.
    cycles: DashMap<CycleId, CycleReport>,
}

impl RunState {
    /// Create state for a new run.
    pub fn new(
        run_id: RunId,
        collector: Arc<BufferedCollector>,
        overrides: RunParameters,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            run_id,
            started_at: Instant::now(),
            cancel,
            store: StateStore::new(),
            collector,
            overrides,
            outputs: DashMap::new(),
            cycles: DashMap::new(),
        }
    }

    /// Get the runtime overrides for a node, by declared name.
    pub fn overrides_for(&self, node: &str) -> Option<&HashMap<String, Value>> {
        self.overrides.get(node)
    }

    /// Record a node's final result.
    pub fn record_result(&self, result: NodeResult) {
        self.outputs.insert(result.node_id, result);
    }

    /// Record a cycle group's terminal report.
    pub fn record_cycle(&self, report: CycleReport) {
        self.cycles.insert(report.cycle_id.clone(), report);
    }

    /// Get a completed node's result.
    pub fn result(&self, node: NodeId) -> Option<NodeResult> {
        self.outputs.get(&node).map(|r| r.clone())
    }

    /// Look up an output field of a completed node.
    pub fn output_value(&self, node: NodeId, field: &str) -> Option<Value> {
        let result = self.outputs.get(&node)?;
        field_value(&result.outputs, field)
    }

    /// Gather the connection-delivered values for a node from completed
    /// upstream producers.
    pub fn gather_edge_values(
        &self,
        graph: &WorkflowGraph,
        edges: impl IntoIterator<Item = usize>,
    ) -> HashMap<String, Value> {
        let mut values = HashMap::new();
        for idx in edges {
            let edge = graph.edge(idx);
            apply_edge(edge, &mut values, |field| self.output_value(edge.from, field));
        }
        values
    }

    /// Snapshot all recorded node results, keyed by node ID.
    pub fn collect_results(&self) -> HashMap<NodeId, NodeResult> {
        let mut out = HashMap::new();
        for entry in self.outputs.iter() {
            out.insert(*entry.key(), entry.value().clone());
        }
        out
    }

    /// Snapshot all recorded cycle reports.
    pub fn collect_cycles(&self) -> HashMap<CycleId, CycleReport> {
        let mut out = HashMap::new();
        for entry in self.cycles.iter() {
            out.insert(entry.key().clone(), entry.value().clone());
        }
        out
    }
}

/// Resolve a field reference against an output map.
///
/// Tries the literal field name first, then interprets a dotted reference
/// as a path into a structured output ("result.score" reads field "score"
/// inside output "result").
pub fn field_value(outputs: &HashMap<String, Value>, field: &str) -> Option<Value> {
    if let Some(value) = outputs.get(field) {
        return Some(value.clone());
    }
    let (head, rest) = field.split_once('.')?;
    outputs.get(head)?.get_field(rest)
}

/// Move every field pair of an edge into `values` using `lookup` to read
/// the source output.
pub fn apply_edge(
    edge: &Edge,
    values: &mut HashMap<String, Value>,
    lookup: impl Fn(&str) -> Option<Value>,
) {
    for (out_field, in_field) in edge.field_pairs() {
        if let Some(value) = lookup(out_field) {
            values.insert(in_field.to_string(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_value_direct_and_dotted() {
        let outputs = HashMap::from([
            ("values".to_string(), Value(json!([1, 2, 3]))),
            ("result".to_string(), Value(json!({"score": 0.9}))),
        ]);

        assert_eq!(field_value(&outputs, "values").unwrap().inner(), &json!([1, 2, 3]));
        assert_eq!(
            field_value(&outputs, "result.score").unwrap().as_f64(),
            Some(0.9)
        );
        assert!(field_value(&outputs, "missing").is_none());
        assert!(field_value(&outputs, "result.missing").is_none());
    }

    #[test]
    fn record_and_gather() {
        use crate::scheduler::graph::Edge;

        let mut graph = WorkflowGraph::new();
        graph.add_node(NodeId::new(0));
        graph.add_node(NodeId::new(1));
        graph
            .add_edge(Edge::new(NodeId::new(0), "values", NodeId::new(1), "readings"))
            .unwrap();

        let state = RunState::new(
            RunId::new(),
            Arc::new(BufferedCollector::with_default_capacity()),
            RunParameters::new(),
            CancelFlag::new(),
        );

        state.record_result(NodeResult {
            node_id: NodeId::new(0),
            node: "source".to_string(),
            iteration: 0,
            outputs: HashMap::from([("values".to_string(), Value(json!([110, 120])))]),
            state: Value::object(),
            cycle_status: None,
        });

        let values = state.gather_edge_values(&graph, graph.incoming(NodeId::new(1)).to_vec());
        assert_eq!(values.get("readings").unwrap().inner(), &json!([110, 120]));
    }
}
