//! Executable workflows and the build-time API.
//!
//! A [`Workflow`] is the frozen, validated product of a
//! [`WorkflowBuilder`]: nodes with captured contracts, an analyzed graph,
//! and the condensation the scheduler walks. Everything here is immutable
//! after `build()`, which is what makes it safe to share across parallel
//! branches without locking.

use crate::scheduler::graph::{
    CondensedGraph, Convergence, ConvergenceCallback, CycleMarker, Edge, WorkflowGraph,
};
use gyre_core::contract::ParameterContract;
use gyre_core::error::{GyreError, Result};
use gyre_core::expr::ConvergenceExpr;
use gyre_core::flow::{ConnectionDefinition, WorkflowSettings};
use gyre_core::traits::Node;
use gyre_core::types::{CycleId, NodeId};
use gyre_core::value::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// A connection declared through the programmatic build API.
///
/// Mirrors [`ConnectionDefinition`] and additionally accepts a convergence
/// callback, which has no declarative representation. Configuring both an
/// expression and a callback is rejected at build time.
#[derive(Clone)]
pub struct Connection {
    from: String,
    to: String,
    mapping: HashMap<String, String>,
    cycle: bool,
    cycle_id: Option<String>,
    max_iterations: Option<u32>,
    timeout_ms: Option<u64>,
    min_iterations: Option<u32>,
    convergence: Option<String>,
    callback: Option<ConvergenceCallback>,
}

impl Connection {
    /// Create a new connection ("node" or "node.field" endpoints).
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
            callback: None,
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

    /// Set a convergence callback `(results, iteration, accumulated_state)`.
    pub fn on_converged<F>(mut self, callback: F) -> Self
    where
        F: Fn(&HashMap<String, Value>, u32, &Value) -> bool + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }
}

impl From<&ConnectionDefinition> for Connection {
    fn from(def: &ConnectionDefinition) -> Self {
        Self {
            from: def.from.clone(),
            to: def.to.clone(),
            mapping: def.mapping.clone(),
            cycle: def.cycle,
            cycle_id: def.cycle_id.clone(),
            max_iterations: def.max_iterations,
            timeout_ms: def.timeout_ms,
            min_iterations: def.min_iterations,
            convergence: def.convergence.clone(),
            callback: None,
        }
    }
}

pub(crate) struct WorkflowInner {
    pub name: String,
    pub settings: WorkflowSettings,
    pub graph: WorkflowGraph,
    pub condensed: CondensedGraph,
    pub nodes: HashMap<NodeId, Arc<dyn Node>>,
    pub contracts: HashMap<NodeId, ParameterContract>,
    pub configs: HashMap<NodeId, Value>,
    pub names: HashMap<NodeId, String>,
    pub ids: HashMap<String, NodeId>,
    pub timeouts: HashMap<NodeId, u64>,
}

impl WorkflowInner {
    pub fn node_name(&self, node: NodeId) -> &str {
        self.names.get(&node).map(String::as_str).unwrap_or("?")
    }

    pub fn node_timeout(&self, node: NodeId) -> Duration {
        let ms = self
            .timeouts
            .get(&node)
            .copied()
            .unwrap_or(self.settings.node_timeout_ms);
        Duration::from_millis(ms)
    }
}

/// An immutable, validated, executable workflow.
///
/// Cheap to clone; all build products are shared behind one `Arc`.
#[derive(Clone)]
pub struct Workflow {
    pub(crate) inner: Arc<WorkflowInner>,
}

impl Workflow {
    /// Get the workflow name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Get the workflow settings.
    pub fn settings(&self) -> &WorkflowSettings {
        &self.inner.settings
    }

    /// Number of declared nodes.
    pub fn node_count(&self) -> usize {
        self.inner.nodes.len()
    }

    /// Number of contracted cycle groups.
    pub fn group_count(&self) -> usize {
        self.inner.condensed.groups().count()
    }

    /// Look up a node's build-time ID by declared name.
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.inner.ids.get(name).copied()
    }

    /// Get a node's captured parameter contract.
    pub fn contract(&self, name: &str) -> Option<&ParameterContract> {
        let id = self.inner.ids.get(name)?;
        self.inner.contracts.get(id)
    }
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.inner.name)
            .field("nodes", &self.inner.nodes.len())
            .field("groups", &self.group_count())
            .finish()
    }
}

/// Build-time API for declaring nodes and connections.
///
/// # Example
///
/// ```ignore
/// let workflow = WorkflowBuilder::new("threshold_refinement")
///     .node("source", SourceNode::new(vec![110.0, 120.0]), Value::null())
///     .node("adjuster", ScaleNode::default(), Value::null())
///     .node("evaluator", MeanCheckNode::new(100.0), Value::null())
///     .connect(Connection::new("source.values", "adjuster.values"))
///     .connect(Connection::new("adjuster.values", "evaluator.values"))
///     .connect(
///         Connection::new("evaluator.values", "adjuster.values")
///             .as_cycle("refine")
///             .with_max_iterations(5)
///             .with_convergence("average <= 100"),
///     )
///     .build()?;
/// ```
pub struct WorkflowBuilder {
    name: String,
    settings: WorkflowSettings,
    nodes: Vec<(String, Arc<dyn Node>, Value)>,
    timeouts: HashMap<String, u64>,
    connections: Vec<Connection>,
}

impl WorkflowBuilder {
    /// Start a new workflow.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: WorkflowSettings::default(),
            nodes: Vec::new(),
            timeouts: HashMap::new(),
            connections: Vec::new(),
        }
    }

    /// Declare a node with its frozen configuration.
    pub fn node(self, id: impl Into<String>, node: impl Node + 'static, config: Value) -> Self {
        self.node_arc(id, Arc::new(node), config)
    }

    /// Declare a node from an existing shared instance.
    pub fn node_arc(mut self, id: impl Into<String>, node: Arc<dyn Node>, config: Value) -> Self {
        self.nodes.push((id.into(), node, config));
        self
    }

    /// Override the execution timeout for one node.
    pub fn node_timeout_ms(mut self, id: impl Into<String>, ms: u64) -> Self {
        self.timeouts.insert(id.into(), ms);
        self
    }

    /// Declare a connection.
    pub fn connect(mut self, connection: Connection) -> Self {
        self.connections.push(connection);
        self
    }

    /// Set runtime settings.
    pub fn settings(mut self, settings: WorkflowSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Validate everything and freeze the workflow.
    ///
    /// All structural analysis happens here: duplicate and unknown nodes,
    /// unmarked cycles, unbounded cycles, ambiguous convergence, and
    /// malformed expressions are all rejected before a workflow exists.
    pub fn build(self) -> Result<Workflow> {
        let mut graph = WorkflowGraph::new();
        let mut nodes = HashMap::new();
        let mut contracts = HashMap::new();
        let mut configs = HashMap::new();
        let mut names = HashMap::new();
        let mut ids: HashMap<String, NodeId> = HashMap::new();

        for (idx, (name, node, config)) in self.nodes.into_iter().enumerate() {
            let node_id = NodeId::new(idx as u32);
            if ids.insert(name.clone(), node_id).is_some() {
                return Err(GyreError::DuplicateNode { node: name });
            }

            graph.add_node(node_id);
            contracts.insert(node_id, node.declare_parameters());
            nodes.insert(node_id, node);
            configs.insert(node_id, config);
            names.insert(node_id, name);
        }

        let mut timeouts = HashMap::new();
        for (name, ms) in self.timeouts {
            let id = *ids
                .get(&name)
                .ok_or(GyreError::NodeNotFound { node: name })?;
            timeouts.insert(id, ms);
        }

        for conn in self.connections {
            let edge = build_edge(&conn, &ids)?;
            graph.add_edge(edge)?;
        }

        let condensed = graph.condense()?;

        tracing::debug!(
            workflow = %self.name,
            nodes = nodes.len(),
            units = condensed.len(),
            groups = condensed.groups().count(),
            "Workflow built"
        );

        Ok(Workflow {
            inner: Arc::new(WorkflowInner {
                name: self.name,
                settings: self.settings,
                graph,
                condensed,
                nodes,
                contracts,
                configs,
                names,
                ids,
                timeouts,
            }),
        })
    }
}

fn build_edge(conn: &Connection, ids: &HashMap<String, NodeId>) -> Result<Edge> {
    let (from_node, from_field) = split_endpoint(&conn.from, "out");
    let (to_node, to_field) = split_endpoint(&conn.to, "in");

    let resolve = |name: &str| -> Result<NodeId> {
        ids.get(name)
            .copied()
            .ok_or_else(|| GyreError::NodeNotFound {
                node: name.to_string(),
            })
    };
    let from = resolve(from_node)?;
    let to = resolve(to_node)?;

    let mut edge = Edge::new(from, from_field, to, to_field);
    for (output, input) in &conn.mapping {
        edge = edge.with_mapping(output.clone(), input.clone());
    }

    if !conn.cycle {
        if conn.cycle_id.is_some()
            || conn.max_iterations.is_some()
            || conn.timeout_ms.is_some()
            || conn.min_iterations.is_some()
            || conn.convergence.is_some()
            || conn.callback.is_some()
        {
            return Err(GyreError::InvalidConnection {
                from: conn.from.clone(),
                to: conn.to.clone(),
                cause: "cycle metadata requires as_cycle(..)".to_string(),
            });
        }
        return Ok(edge);
    }

    let cycle_id = CycleId::new(conn.cycle_id.clone().ok_or_else(|| {
        GyreError::InvalidConnection {
            from: conn.from.clone(),
            to: conn.to.clone(),
            cause: "cycle connection missing cycle_id".to_string(),
        }
    })?);

    // Precedence between an expression and a callback is not guessable;
    // configuring both is rejected outright.
    let convergence = match (&conn.convergence, &conn.callback) {
        (Some(_), Some(_)) => {
            return Err(GyreError::AmbiguousConvergence { cycle_id });
        }
        (Some(expr), None) => Some(Convergence::Expression(ConvergenceExpr::parse(expr)?)),
        (None, Some(cb)) => Some(Convergence::Callback(cb.clone())),
        (None, None) => None,
    };

    Ok(edge.with_cycle(CycleMarker {
        cycle_id,
        max_iterations: conn.max_iterations,
        timeout: conn.timeout_ms.map(Duration::from_millis),
        min_iterations: conn.min_iterations.unwrap_or(0),
        convergence,
    }))
}

/// Split "node.field" into (node, field), defaulting the field.
fn split_endpoint<'a>(s: &'a str, default_field: &'static str) -> (&'a str, &'a str) {
    match s.find('.') {
        Some(pos) if pos + 1 < s.len() => (&s[..pos], &s[pos + 1..]),
        _ => (s, default_field),
    }
}
