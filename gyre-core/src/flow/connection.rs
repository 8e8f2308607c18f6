//! Connection definition from YAML.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A connection definition moving one output field into one input field.
///
/// Connections can be specified in several formats:
///
/// # Simple format (default fields)
/// ```yaml
/// connections:
///   - from: node_a
///     to: node_b
/// ```
///
/// # With explicit fields
/// ```yaml
/// connections:
///   - from: evaluator.values
///     to: adjuster.values
/// ```
///
/// # Feedback edge with cycle metadata
/// ```yaml
/// connections:
///   - from: evaluator.values
///     to: adjuster.values
///     cycle: true
///     cycle_id: refine
///     max_iterations: 5
///     timeout_ms: 60000
///     convergence: "average <= 100"
/// ```
///
/// A cycle-marked connection must declare at least one of
/// `max_iterations` / `timeout_ms`; an unbounded cycle can never be
/// constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDefinition {
    /// Source node and optional output field (format: "node" or "node.field").
    pub from: String,

    /// Target node and optional input field (format: "node" or "node.field").
    pub to: String,

    /// Additional output-field -> input-parameter mappings carried by this
    /// connection, beyond the primary from/to field pair.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub mapping: HashMap<String, String>,

    /// Whether this connection is a feedback (cycle) edge.
    #[serde(default)]
    pub cycle: bool,

    /// Cycle group this edge belongs to. Required when `cycle` is true.
    #[serde(default)]
    pub cycle_id: Option<String>,

    /// Maximum number of iterations (0-based: `max_iterations: 5` permits
    /// iterations 0..4).
    #[serde(default)]
    pub max_iterations: Option<u32>,

    /// Wall-clock budget for the whole cycle, in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Iterations to complete before convergence checks are evaluated.
    #[serde(default)]
    pub min_iterations: Option<u32>,

    /// Convergence expression over the terminal node's output namespace.
    #[serde(default)]
    pub convergence: Option<String>,

    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}

impl ConnectionDefinition {
    /// Create a new connection definition.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            mapping: HashMap::new(),
            cycle: false,
            cycle_id: None,
            max_iterations: None,
            timeout_ms: None,
            min_iterations: None,
            convergence: None,
            description: None,
        }
    }

    /// Add a field mapping.
    pub fn with_mapping(mut self, output: impl Into<String>, input: impl Into<String>) -> Self {
        self.mapping.insert(output.into(), input.into());
        self
    }

    /// Mark as a cycle edge belonging to the given group.
    pub fn as_cycle(mut self, cycle_id: impl Into<String>) -> Self {
        self.cycle = true;
        self.cycle_id = Some(cycle_id.into());
        self
    }

    /// Set the iteration limit.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = Some(max);
        self
    }

    /// Set the wall-clock budget.
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// Set the minimum-iteration threshold.
    pub fn with_min_iterations(mut self, min: u32) -> Self {
        self.min_iterations = Some(min);
        self
    }

    /// Set the convergence expression.
    pub fn with_convergence(mut self, expr: impl Into<String>) -> Self {
        self.convergence = Some(expr.into());
        self
    }

    /// Set description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Parse the source into (node, field).
    ///
    /// The field defaults to "out" if not specified.
    pub fn parse_from(&self) -> (&str, &str) {
        parse_node_field(&self.from, "out")
    }

    /// Parse the target into (node, field).
    ///
    /// The field defaults to "in" if not specified.
    pub fn parse_to(&self) -> (&str, &str) {
        parse_node_field(&self.to, "in")
    }

    /// Get the source node ID.
    pub fn from_node(&self) -> &str {
        self.parse_from().0
    }

    /// Get the source output field.
    pub fn from_field(&self) -> &str {
        self.parse_from().1
    }

    /// Get the target node ID.
    pub fn to_node(&self) -> &str {
        self.parse_to().0
    }

    /// Get the target input field.
    pub fn to_field(&self) -> &str {
        self.parse_to().1
    }

    /// Check whether this cycle edge declares a safety limit.
    pub fn has_safety_limit(&self) -> bool {
        self.max_iterations.is_some() || self.timeout_ms.is_some()
    }
}

/// Parse a "node.field" or "node" string into (node, field).
fn parse_node_field<'a>(s: &'a str, default_field: &'static str) -> (&'a str, &'a str) {
    if let Some(dot_pos) = s.find('.') {
        let after_dot = &s[dot_pos + 1..];
        if !after_dot.is_empty() {
            return (&s[..dot_pos], after_dot);
        }
    }
    (s, default_field)
}
