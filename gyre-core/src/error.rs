//! Error types for GYRE.
//!
//! This module provides strongly-typed errors with actionable context.
//! Every error carries the identifiers needed to locate the problem
//! (node ID, cycle ID, run ID) without consulting external state.
//!
//! Exhaustion, timeout, and cancellation of a cycle group are **not**
//! errors. They are ordinary terminal statuses reported through
//! [`CycleStatus`](crate::CycleStatus)-style flags, because failing to
//! converge is an expected outcome of iterative refinement.

use crate::types::{CycleId, NodeId, RunId};
use thiserror::Error;

/// The main error type for GYRE operations.
#[derive(Error, Debug)]
pub enum GyreError {
    // =========================================================================
    // Structural Errors (E100-E199) — raised at build/validate time, never mid-run
    // =========================================================================
    /// A strongly-connected component contains an edge without a cycle marker.
    #[error("E101: Unmarked cycle involving nodes {nodes:?}: {cause}")]
    UnmarkedCycle {
        /// The nodes involved in the illegal cycle.
        nodes: Vec<NodeId>,
        /// Why the cycle is considered unmarked.
        cause: String,
    },

    /// A cycle-marked connection declares neither `max_iterations` nor `timeout_ms`.
    #[error("E102: Cycle '{cycle_id}' has no safety limit: declare max_iterations or timeout_ms")]
    UnboundedCycle {
        /// The cycle missing a safety limit.
        cycle_id: CycleId,
    },

    /// Both a convergence expression and a convergence callback are configured.
    #[error("E103: Cycle '{cycle_id}' configures both a convergence expression and a callback")]
    AmbiguousConvergence {
        /// The cycle with conflicting convergence configuration.
        cycle_id: CycleId,
    },

    /// A connection references a missing node or field.
    #[error("E104: Invalid connection from '{from}' to '{to}': {cause}")]
    InvalidConnection {
        /// Source endpoint as written.
        from: String,
        /// Target endpoint as written.
        to: String,
        /// Why the connection is invalid.
        cause: String,
    },

    /// Two nodes were declared with the same identifier.
    #[error("E105: Duplicate node '{node}'")]
    DuplicateNode {
        /// The duplicated node identifier.
        node: String,
    },

    /// A node identifier was not found in the workflow.
    #[error("E106: Node '{node}' not found in workflow")]
    NodeNotFound {
        /// The unknown node identifier.
        node: String,
    },

    /// The graph cannot be ordered for execution.
    #[error("E107: Invalid workflow topology: {cause}")]
    InvalidTopology {
        /// Description of the topology problem.
        cause: String,
    },

    // =========================================================================
    // Parameter Errors (E200-E299)
    // =========================================================================
    /// A contract-required parameter is still missing after the merge.
    #[error("E201: Missing required parameter '{parameter}' for node '{node}'")]
    MissingParameter {
        /// The node whose contract was violated.
        node: String,
        /// The missing parameter name.
        parameter: String,
    },

    // =========================================================================
    // Convergence Errors (E300-E399)
    // =========================================================================
    /// A convergence expression failed to parse or evaluate.
    #[error("E301: Convergence expression '{expression}' is invalid: {cause}")]
    ConvergenceExpression {
        /// The offending expression.
        expression: String,
        /// Parse or evaluation failure detail.
        cause: String,
    },

    // =========================================================================
    // Execution Errors (E400-E499)
    // =========================================================================
    /// A node's own logic failed during execution.
    #[error("E401: Node {node_id} execution failed in run {run_id}: {cause}")]
    NodeExecution {
        /// The node that failed.
        node_id: NodeId,
        /// The run in which the failure occurred.
        run_id: RunId,
        /// Reason for the failure.
        cause: String,
    },

    /// A node exceeded its execution timeout.
    #[error("E402: Node {node_id} timed out after {timeout_ms}ms in run {run_id}")]
    NodeTimeout {
        /// The node that timed out.
        node_id: NodeId,
        /// The run in which the timeout occurred.
        run_id: RunId,
        /// Timeout duration in milliseconds.
        timeout_ms: u64,
    },

    // =========================================================================
    // Definition/Loader Errors (E500-E599)
    // =========================================================================
    /// No factory is registered for a node type.
    #[error("E501: Unknown node type '{node_type}'")]
    UnknownNodeType {
        /// The unregistered node type.
        node_type: String,
    },

    /// Invalid configuration value for a node.
    #[error("E502: Invalid configuration for node '{node}': {cause}")]
    NodeConfig {
        /// The node with invalid configuration.
        node: String,
        /// Description of the configuration error.
        cause: String,
    },

    /// Serialization/deserialization error.
    #[error("E503: Serialization error: {0}")]
    Serialization(
        /// The serialization error message.
        String,
    ),
}

impl GyreError {
    /// Get the error code (e.g., "E101").
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnmarkedCycle { .. } => "E101",
            Self::UnboundedCycle { .. } => "E102",
            Self::AmbiguousConvergence { .. } => "E103",
            Self::InvalidConnection { .. } => "E104",
            Self::DuplicateNode { .. } => "E105",
            Self::NodeNotFound { .. } => "E106",
            Self::InvalidTopology { .. } => "E107",
            Self::MissingParameter { .. } => "E201",
            Self::ConvergenceExpression { .. } => "E301",
            Self::NodeExecution { .. } => "E401",
            Self::NodeTimeout { .. } => "E402",
            Self::UnknownNodeType { .. } => "E501",
            Self::NodeConfig { .. } => "E502",
            Self::Serialization(_) => "E503",
        }
    }

    /// Check if this error is a configuration/validation bug.
    ///
    /// Configuration errors are never retried: they describe a workflow
    /// that can never execute correctly, not a transient condition.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::UnmarkedCycle { .. }
                | Self::UnboundedCycle { .. }
                | Self::AmbiguousConvergence { .. }
                | Self::InvalidConnection { .. }
                | Self::DuplicateNode { .. }
                | Self::NodeNotFound { .. }
                | Self::InvalidTopology { .. }
                | Self::ConvergenceExpression { .. }
                | Self::UnknownNodeType { .. }
                | Self::NodeConfig { .. }
        )
    }

    /// Check if this error occurred while a run was in flight.
    #[must_use]
    pub fn is_execution_error(&self) -> bool {
        matches!(
            self,
            Self::MissingParameter { .. }
                | Self::NodeExecution { .. }
                | Self::NodeTimeout { .. }
        )
    }
}

/// Result type alias using `GyreError`.
pub type Result<T> = std::result::Result<T, GyreError>;
