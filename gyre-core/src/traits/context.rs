//! Execution context provided to nodes.
//!
//! The context is an explicit value threaded through every invocation;
//! there is no ambient or global execution state. Nodes read iteration
//! metadata and the carried-state snapshot from here and nowhere else.

use crate::types::{CycleId, NodeId, RunId};
use crate::value::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Cooperative cancellation flag for a run.
///
/// Cancellation is checked at node and iteration boundaries only;
/// in-flight node executions are allowed to finish so the state store is
/// never left half-written.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create a new, unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Execution context provided to a node for one invocation.
///
/// Carries the run ID, cycle position (cycle ID and 0-based iteration
/// index), a read-only snapshot of the node's carried state, elapsed run
/// time, and the run's cancellation flag.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// The run this invocation belongs to.
    run_id: RunId,
    /// The node being executed.
    node_id: NodeId,
    /// The enclosing cycle group, if any.
    cycle_id: Option<CycleId>,
    /// 0-based iteration index; 0 outside of cycle groups.
    iteration: u32,
    /// Read-only snapshot of this node's carried state.
    ///
    /// Always an object; on iteration 0 it is an empty object, never null.
    state: Value,
    /// When the run started.
    started_at: Instant,
    /// Cooperative cancellation flag.
    cancel: CancelFlag,
}

impl ExecutionContext {
    /// Create a context for a node outside any cycle group.
    pub fn new(run_id: RunId, node_id: NodeId, started_at: Instant, cancel: CancelFlag) -> Self {
        Self {
            run_id,
            node_id,
            cycle_id: None,
            iteration: 0,
            state: Value::object(),
            started_at,
            cancel,
        }
    }

    /// Create a context for a cycle-group member invocation.
    pub fn for_iteration(
        run_id: RunId,
        node_id: NodeId,
        cycle_id: CycleId,
        iteration: u32,
        state: Value,
        started_at: Instant,
        cancel: CancelFlag,
    ) -> Self {
        debug_assert!(!state.is_null(), "state snapshot must never be null");
        Self {
            run_id,
            node_id,
            cycle_id: Some(cycle_id),
            iteration,
            state,
            started_at,
            cancel,
        }
    }

    /// Get the run ID.
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Get the node ID being executed.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Get the enclosing cycle ID, if any.
    pub fn cycle_id(&self) -> Option<&CycleId> {
        self.cycle_id.as_ref()
    }

    /// Get the 0-based iteration index.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Get the read-only carried-state snapshot.
    pub fn state(&self) -> &Value {
        &self.state
    }

    /// Elapsed wall time since the run started.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Check whether the run has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn context_outside_cycle() {
        let ctx = ExecutionContext::new(
            RunId::new(),
            NodeId::new(3),
            Instant::now(),
            CancelFlag::new(),
        );
        assert_eq!(ctx.node_id(), NodeId::new(3));
        assert_eq!(ctx.iteration(), 0);
        assert!(ctx.cycle_id().is_none());
        assert!(ctx.state().is_object());
    }

    #[test]
    fn iteration_context_carries_snapshot() {
        let mut state = Value::object();
        state.set_field("history", vec![1i64, 2].into());

        let ctx = ExecutionContext::for_iteration(
            RunId::new(),
            NodeId::new(1),
            CycleId::new("refine"),
            2,
            state,
            Instant::now(),
            CancelFlag::new(),
        );

        assert_eq!(ctx.iteration(), 2);
        assert_eq!(ctx.cycle_id().unwrap().as_str(), "refine");
        assert!(ctx.state().get_field("history").is_some());
    }
}
