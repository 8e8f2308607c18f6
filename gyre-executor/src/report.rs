//! Run results and status reporting.
//!
//! Exhaustion and timeout of a cycle group are ordinary terminal statuses,
//! not errors: iterative refinement legitimately may not converge, and the
//! caller gets the last iteration's outputs plus a status flag to inspect.

use gyre_core::types::{CycleId, NodeId, RunId};
use gyre_core::value::Value;
use serde::Serialize;
use std::collections::HashMap;

/// Terminal status of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every unit executed.
    Completed,
    /// The run was cancelled; in-flight work finished, the rest was skipped.
    Cancelled,
    /// The run-level wall-clock budget elapsed before every unit executed.
    TimedOut,
}

/// Terminal status of one cycle group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    /// The convergence condition held.
    Converged,
    /// The iteration budget ran out before convergence.
    Exhausted,
    /// The wall-clock budget ran out before convergence.
    TimedOut,
    /// The run was cancelled mid-cycle.
    Cancelled,
}

impl CycleStatus {
    /// Check whether the group converged.
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged)
    }
}

/// Result of one node's final invocation within a run.
#[derive(Debug, Clone, Serialize)]
pub struct NodeResult {
    /// The node's build-time identifier.
    pub node_id: NodeId,
    /// The node's declared name.
    pub node: String,
    /// 0-based iteration index that produced these outputs.
    pub iteration: u32,
    /// Output field values.
    pub outputs: HashMap<String, Value>,
    /// Final carried state (an empty object when the node kept none).
    pub state: Value,
    /// Terminal status of the enclosing cycle group, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_status: Option<CycleStatus>,
}

impl NodeResult {
    /// Get an output field value.
    pub fn output(&self, field: &str) -> Option<&Value> {
        self.outputs.get(field)
    }
}

/// Summary of one cycle group's execution.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// The cycle group.
    pub cycle_id: CycleId,
    /// Terminal status.
    pub status: CycleStatus,
    /// Number of iterations executed.
    pub iterations: u32,
}

/// The complete result of one run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// Unique identifier of this run.
    pub run_id: RunId,
    /// Terminal status of the run.
    pub status: RunStatus,
    /// Per-node results, keyed by declared node name.
    pub results: HashMap<String, NodeResult>,
    /// Per-cycle summaries, keyed by cycle ID.
    pub cycles: HashMap<CycleId, CycleReport>,
}

impl RunReport {
    /// Get a node's result by declared name.
    pub fn result(&self, node: &str) -> Option<&NodeResult> {
        self.results.get(node)
    }

    /// Get a cycle's report.
    pub fn cycle(&self, cycle_id: &str) -> Option<&CycleReport> {
        self.cycles.get(&CycleId::new(cycle_id))
    }
}
