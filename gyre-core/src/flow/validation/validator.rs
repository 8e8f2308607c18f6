//! Workflow definition validation logic.

use std::collections::{HashMap, HashSet};

use super::ValidationResult;
use super::error::{ValidationError, ValidationErrorKind};
use super::limits::ValidationLimits;
use crate::expr::ConvergenceExpr;
use crate::flow::{ConnectionDefinition, WorkflowDefinition};

/// Validator for workflow definitions.
pub struct WorkflowValidator {
    errors: Vec<ValidationError>,
    limits: ValidationLimits,
}

impl WorkflowValidator {
    /// Create a new validator with default limits.
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            limits: ValidationLimits::default(),
        }
    }

    /// Create a validator with custom limits.
    pub fn with_limits(limits: ValidationLimits) -> Self {
        Self {
            errors: Vec::new(),
            limits,
        }
    }

    /// Validate a workflow definition.
    pub fn validate(mut self, workflow: &WorkflowDefinition) -> ValidationResult {
        // Structural limits first (DoS protection)
        self.validate_limits(workflow);

        // Then semantics
        self.validate_metadata(workflow);
        self.validate_nodes(workflow);
        self.validate_connections(workflow);
        self.validate_references(workflow);
        self.validate_cycles(workflow);
        self.warn_isolated_nodes(workflow);

        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    fn validate_limits(&mut self, workflow: &WorkflowDefinition) {
        if workflow.nodes.len() > self.limits.max_node_count {
            self.add_error(ValidationError::new(
                ValidationErrorKind::LimitExceeded,
                "nodes",
                format!(
                    "node count ({}) exceeds maximum allowed ({})",
                    workflow.nodes.len(),
                    self.limits.max_node_count
                ),
            ));
        }

        if workflow.connections.len() > self.limits.max_connection_count {
            self.add_error(ValidationError::new(
                ValidationErrorKind::LimitExceeded,
                "connections",
                format!(
                    "connection count ({}) exceeds maximum allowed ({})",
                    workflow.connections.len(),
                    self.limits.max_connection_count
                ),
            ));
        }
    }

    fn validate_metadata(&mut self, workflow: &WorkflowDefinition) {
        if workflow.name.is_empty() {
            self.add_error(ValidationError::missing_field("workflow", "name"));
        }

        if let Some(ref version) = workflow.version {
            if version.is_empty() {
                self.add_error(ValidationError::invalid_value(
                    "workflow.version",
                    "version cannot be empty string",
                ));
            }
        }
    }

    fn validate_nodes(&mut self, workflow: &WorkflowDefinition) {
        for (node_id, node) in &workflow.nodes {
            let location = format!("nodes.{}", node_id);

            if node_id.is_empty() {
                self.add_error(ValidationError::missing_field("nodes", "id"));
            }

            if node.node_type.is_empty() {
                self.add_error(ValidationError::missing_field(&location, "type"));
            }

            if let Some(0) = node.timeout_ms {
                self.add_error(ValidationError::invalid_value(
                    format!("{}.timeout_ms", location),
                    "timeout must be greater than zero",
                ));
            }
        }
    }

    fn validate_connections(&mut self, workflow: &WorkflowDefinition) {
        for (idx, conn) in workflow.connections.iter().enumerate() {
            let location = format!("connections[{}]", idx);

            if conn.from.is_empty() {
                self.add_error(ValidationError::missing_field(&location, "from"));
            }
            if conn.to.is_empty() {
                self.add_error(ValidationError::missing_field(&location, "to"));
            }

            self.validate_cycle_metadata(conn, &location);
        }
    }

    fn validate_cycle_metadata(&mut self, conn: &ConnectionDefinition, location: &str) {
        if conn.cycle {
            if conn.cycle_id.is_none() {
                self.add_error(ValidationError::missing_field(location, "cycle_id"));
            }

            // An engine must never allow an unbounded cycle to be constructed.
            if !conn.has_safety_limit() {
                self.add_error(ValidationError::new(
                    ValidationErrorKind::UnboundedCycle,
                    location,
                    "cycle connection must declare max_iterations or timeout_ms",
                ));
            }

            if let (Some(min), Some(max)) = (conn.min_iterations, conn.max_iterations) {
                if min > max {
                    self.add_error(ValidationError::invalid_value(
                        format!("{}.min_iterations", location),
                        format!("min_iterations ({}) exceeds max_iterations ({})", min, max),
                    ));
                }
            }

            if let Some(0) = conn.max_iterations {
                self.add_error(ValidationError::invalid_value(
                    format!("{}.max_iterations", location),
                    "max_iterations must be greater than zero",
                ));
            }
        } else {
            // Cycle metadata on a non-cycle edge is a sign of a mistake.
            if conn.cycle_id.is_some()
                || conn.max_iterations.is_some()
                || conn.timeout_ms.is_some()
                || conn.min_iterations.is_some()
                || conn.convergence.is_some()
            {
                self.add_error(ValidationError::invalid_value(
                    location,
                    "cycle metadata requires cycle: true",
                ));
            }
        }

        // Static detection of malformed convergence expressions.
        if let Some(ref expr) = conn.convergence {
            if let Err(e) = ConvergenceExpr::parse(expr) {
                self.add_error(ValidationError::new(
                    ValidationErrorKind::InvalidExpression,
                    format!("{}.convergence", location),
                    e.to_string(),
                ));
            }
        }
    }

    fn validate_references(&mut self, workflow: &WorkflowDefinition) {
        let valid_ids: HashSet<&str> = workflow.nodes.keys().map(|s| s.as_str()).collect();

        for (idx, conn) in workflow.connections.iter().enumerate() {
            let location = format!("connections[{}]", idx);

            let from_node = conn.from_node();
            if !from_node.is_empty() && !valid_ids.contains(from_node) {
                self.add_error(ValidationError::invalid_reference(
                    format!("{}.from", location),
                    from_node,
                ));
            }

            let to_node = conn.to_node();
            if !to_node.is_empty() && !valid_ids.contains(to_node) {
                self.add_error(ValidationError::invalid_reference(
                    format!("{}.to", location),
                    to_node,
                ));
            }
        }
    }

    /// An unconnected node is legal (it may run on overrides alone) but is
    /// usually a typo; surface it without failing validation.
    fn warn_isolated_nodes(&mut self, workflow: &WorkflowDefinition) {
        if workflow.connections.is_empty() || workflow.nodes.len() < 2 {
            return;
        }
        for node_id in workflow.nodes.keys() {
            let connected = workflow
                .connections
                .iter()
                .any(|c| c.from_node() == node_id || c.to_node() == node_id);
            if !connected {
                tracing::warn!(node = %node_id, "Node has no connections");
            }
        }
    }

    fn validate_cycles(&mut self, workflow: &WorkflowDefinition) {
        // Edges of one cycle group must agree on a single convergence
        // expression; conflicting conditions have no guessable precedence.
        let mut seen: HashMap<&str, &str> = HashMap::new();

        for (idx, conn) in workflow.connections.iter().enumerate() {
            let (Some(cycle_id), Some(expr)) = (conn.cycle_id.as_deref(), conn.convergence.as_deref())
            else {
                continue;
            };

            if let Some(&existing) = seen.get(cycle_id) {
                if existing != expr {
                    self.add_error(ValidationError::new(
                        ValidationErrorKind::AmbiguousConvergence,
                        format!("connections[{}].convergence", idx),
                        format!(
                            "cycle '{}' already declares convergence '{}'",
                            cycle_id, existing
                        ),
                    ));
                }
            } else {
                seen.insert(cycle_id, expr);
            }
        }
    }
}

impl Default for WorkflowValidator {
    fn default() -> Self {
        Self::new()
    }
}
