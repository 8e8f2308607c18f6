//! Workflow graph representation and analysis.
//!
//! The graph is built once from node and edge declarations, then analyzed:
//! strongly-connected components are computed over the full edge set, each
//! valid cycle-marked component is contracted into a [`CycleGroup`], and
//! the resulting condensation is topologically ordered for scheduling.
//! Every structural problem — an unmarked cycle, a feedback subgraph with
//! no safety limit, an interior that cannot be ordered — is rejected here,
//! at build time, never mid-run.

use gyre_core::error::{GyreError, Result};
use gyre_core::expr::ConvergenceExpr;
use gyre_core::types::{CycleId, NodeId};
use gyre_core::value::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// Convergence callback signature: `(results, iteration, accumulated_state)`.
///
/// `results` holds the current iteration's outputs keyed by node name;
/// `accumulated_state` is the cycle's carried state keyed by node ID.
pub type ConvergenceCallback = Arc<dyn Fn(&HashMap<String, Value>, u32, &Value) -> bool + Send + Sync>;

/// How a cycle group decides it has converged.
#[derive(Clone)]
pub enum Convergence {
    /// Boolean expression over the terminal node's output namespace.
    Expression(ConvergenceExpr),
    /// Caller-supplied callback.
    Callback(ConvergenceCallback),
}

impl std::fmt::Debug for Convergence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expression(expr) => f.debug_tuple("Expression").field(&expr.raw()).finish(),
            Self::Callback(_) => f.debug_tuple("Callback").finish(),
        }
    }
}

/// Cycle metadata attached to a feedback edge.
#[derive(Debug, Clone)]
pub struct CycleMarker {
    /// The cycle group this edge belongs to.
    pub cycle_id: CycleId,
    /// Iteration limit. `max_iterations: 5` permits iterations 0..4.
    pub max_iterations: Option<u32>,
    /// Wall-clock budget measured from cycle start.
    pub timeout: Option<Duration>,
    /// Iterations to complete before convergence checks apply.
    pub min_iterations: u32,
    /// Convergence condition, if any.
    pub convergence: Option<Convergence>,
}

/// A directed edge in the workflow graph.
#[derive(Debug, Clone)]
pub struct Edge {
    /// Source node ID.
    pub from: NodeId,
    /// Source output field.
    pub from_field: String,
    /// Target node ID.
    pub to: NodeId,
    /// Target input field.
    pub to_field: String,
    /// Additional output-field -> input-field pairs carried by this edge.
    pub mapping: HashMap<String, String>,
    /// Cycle metadata; present iff this is a feedback edge.
    pub cycle: Option<CycleMarker>,
}

impl Edge {
    /// Create a plain (non-cycle) edge.
    pub fn new(
        from: NodeId,
        from_field: impl Into<String>,
        to: NodeId,
        to_field: impl Into<String>,
    ) -> Self {
        Self {
            from,
            from_field: from_field.into(),
            to,
            to_field: to_field.into(),
            mapping: HashMap::new(),
            cycle: None,
        }
    }

    /// Attach cycle metadata, making this a feedback edge.
    pub fn with_cycle(mut self, marker: CycleMarker) -> Self {
        self.cycle = Some(marker);
        self
    }

    /// Add a field mapping.
    pub fn with_mapping(mut self, output: impl Into<String>, input: impl Into<String>) -> Self {
        self.mapping.insert(output.into(), input.into());
        self
    }

    /// Iterate all (output field, input field) pairs moved by this edge.
    pub fn field_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        std::iter::once((self.from_field.as_str(), self.to_field.as_str())).chain(
            self.mapping
                .iter()
                .map(|(out, input)| (out.as_str(), input.as_str())),
        )
    }
}

/// The workflow graph over index-based edges.
#[derive(Debug, Default)]
pub struct WorkflowGraph {
    /// Nodes in the graph.
    nodes: Vec<NodeId>,
    /// All edges.
    edges: Vec<Edge>,
    /// Edge indices by source node.
    outgoing: HashMap<NodeId, Vec<usize>>,
    /// Edge indices by target node.
    incoming: HashMap<NodeId, Vec<usize>>,
}

impl WorkflowGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the graph.
    pub fn add_node(&mut self, node: NodeId) {
        self.nodes.push(node);
        self.outgoing.entry(node).or_default();
        self.incoming.entry(node).or_default();
    }

    /// Add an edge to the graph.
    ///
    /// A cycle-marked edge without a safety limit is rejected immediately:
    /// an unbounded cycle must never be constructed.
    pub fn add_edge(&mut self, edge: Edge) -> Result<()> {
        if let Some(ref marker) = edge.cycle {
            if marker.max_iterations.is_none() && marker.timeout.is_none() {
                return Err(GyreError::UnboundedCycle {
                    cycle_id: marker.cycle_id.clone(),
                });
            }
            if marker.max_iterations == Some(0) {
                return Err(GyreError::InvalidConnection {
                    from: edge.from.to_string(),
                    to: edge.to.to_string(),
                    cause: "max_iterations must be greater than zero".to_string(),
                });
            }
        }

        let idx = self.edges.len();
        self.outgoing.entry(edge.from).or_default().push(idx);
        self.incoming.entry(edge.to).or_default().push(idx);
        self.edges.push(edge);
        Ok(())
    }

    /// Get all nodes.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Get an edge by index.
    pub fn edge(&self, idx: usize) -> &Edge {
        &self.edges[idx]
    }

    /// Get all edges.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Get outgoing edge indices of a node.
    pub fn outgoing(&self, node: NodeId) -> &[usize] {
        self.outgoing.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Get incoming edge indices of a node.
    pub fn incoming(&self, node: NodeId) -> &[usize] {
        self.incoming.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Validate the graph and contract cycle groups into schedulable units.
    pub fn condense(&self) -> Result<CondensedGraph> {
        let declared: HashSet<NodeId> = self.nodes.iter().copied().collect();
        for edge in &self.edges {
            for endpoint in [edge.from, edge.to] {
                if !declared.contains(&endpoint) {
                    return Err(GyreError::InvalidConnection {
                        from: edge.from.to_string(),
                        to: edge.to.to_string(),
                        cause: format!("references undeclared node {}", endpoint),
                    });
                }
            }
        }

        let components = self.strongly_connected_components();
        let mut units = Vec::new();
        let mut unit_of: HashMap<NodeId, usize> = HashMap::new();

        for component in components {
            let is_cyclic = component.len() > 1 || self.has_self_edge(component[0]);
            let unit_idx = units.len();

            if is_cyclic {
                let group = self.build_cycle_group(&component)?;
                for &member in &group.members {
                    unit_of.insert(member, unit_idx);
                }
                units.push(ScheduleUnit::Group(group));
            } else {
                unit_of.insert(component[0], unit_idx);
                units.push(ScheduleUnit::Single(component[0]));
            }
        }

        // Build the unit-level dependency graph from cross-unit edges.
        let mut predecessors: Vec<HashSet<usize>> = vec![HashSet::new(); units.len()];
        for edge in &self.edges {
            let from_unit = unit_of[&edge.from];
            let to_unit = unit_of[&edge.to];
            if from_unit != to_unit {
                predecessors[to_unit].insert(from_unit);
            }
        }

        let order = topological_order(units.len(), &predecessors).ok_or_else(|| {
            GyreError::InvalidTopology {
                cause: "condensed graph contains a cycle across groups".to_string(),
            }
        })?;

        let predecessors: Vec<Vec<usize>> = predecessors
            .into_iter()
            .map(|set| {
                let mut v: Vec<usize> = set.into_iter().collect();
                v.sort_unstable();
                v
            })
            .collect();

        Ok(CondensedGraph {
            units,
            unit_of,
            predecessors,
            order,
        })
    }

    fn has_self_edge(&self, node: NodeId) -> bool {
        self.outgoing(node)
            .iter()
            .any(|&idx| self.edges[idx].to == node)
    }

    /// Contract one strongly-connected component into a cycle group.
    ///
    /// Membership of a component must be entirely explained by cycle-marked
    /// edges: every interior edge carries the marker, and removing the
    /// feedback edges (those targeting the group's entry nodes) leaves an
    /// orderable DAG.
    fn build_cycle_group(&self, component: &[NodeId]) -> Result<CycleGroup> {
        let members: HashSet<NodeId> = component.iter().copied().collect();

        let mut interior: Vec<usize> = Vec::new();
        for (idx, edge) in self.edges.iter().enumerate() {
            if members.contains(&edge.from) && members.contains(&edge.to) {
                interior.push(idx);
            }
        }

        // Every edge inside the component must be cycle-marked.
        let mut cycle_id: Option<CycleId> = None;
        for &idx in &interior {
            let edge = &self.edges[idx];
            let Some(ref marker) = edge.cycle else {
                let mut nodes: Vec<NodeId> = component.to_vec();
                nodes.sort_unstable();
                return Err(GyreError::UnmarkedCycle {
                    nodes,
                    cause: format!(
                        "edge {} -> {} is not cycle-marked",
                        edge.from, edge.to
                    ),
                });
            };

            match cycle_id {
                None => cycle_id = Some(marker.cycle_id.clone()),
                Some(ref id) if *id != marker.cycle_id => {
                    return Err(GyreError::InvalidTopology {
                        cause: format!(
                            "cycle groups '{}' and '{}' overlap in one strongly-connected component",
                            id, marker.cycle_id
                        ),
                    });
                }
                Some(_) => {}
            }
        }

        let cycle_id = cycle_id.expect("cyclic component has at least one edge");

        // Entry nodes receive data from outside the group (upstream DAG
        // producers); feedback edges are the interior edges that close the
        // loop back into them.
        let mut entries: Vec<NodeId> = component
            .iter()
            .copied()
            .filter(|&node| {
                self.incoming(node)
                    .iter()
                    .any(|&idx| !members.contains(&self.edges[idx].from))
            })
            .collect();
        if entries.is_empty() {
            // A detached group has no external producer; anchor the loop at
            // its smallest node so feedback classification stays stable.
            let mut sorted: Vec<NodeId> = component.to_vec();
            sorted.sort_unstable();
            entries.push(sorted[0]);
        }
        entries.sort_unstable();

        let entry_set: HashSet<NodeId> = entries.iter().copied().collect();
        let (back_edges, forward_edges): (Vec<usize>, Vec<usize>) = interior
            .iter()
            .copied()
            .partition(|&idx| entry_set.contains(&self.edges[idx].to));

        if back_edges.is_empty() {
            let mut nodes: Vec<NodeId> = component.to_vec();
            nodes.sort_unstable();
            return Err(GyreError::UnmarkedCycle {
                nodes,
                cause: "no feedback edge into the group's entry nodes".to_string(),
            });
        }

        // The interior minus the feedback edges must itself be a DAG.
        let ordered_members = self
            .order_interior(component, &forward_edges)
            .ok_or_else(|| GyreError::InvalidTopology {
                cause: format!(
                    "cycle group '{}' interior is not acyclic after removing feedback edges",
                    cycle_id
                ),
            })?;

        // Merge limits across markers: tightest bound wins.
        let mut max_iterations: Option<u32> = None;
        let mut timeout: Option<Duration> = None;
        let mut min_iterations: u32 = 0;
        let mut convergence: Option<Convergence> = None;
        let mut convergence_edge: Option<usize> = None;

        for &idx in &interior {
            let marker = self.edges[idx].cycle.as_ref().expect("checked above");

            if let Some(max) = marker.max_iterations {
                max_iterations = Some(max_iterations.map_or(max, |m: u32| m.min(max)));
            }
            if let Some(t) = marker.timeout {
                timeout = Some(timeout.map_or(t, |existing: Duration| existing.min(t)));
            }
            min_iterations = min_iterations.max(marker.min_iterations);

            if let Some(ref cond) = marker.convergence {
                match convergence {
                    None => {
                        convergence = Some(cond.clone());
                        convergence_edge = Some(idx);
                    }
                    Some(ref existing) if !same_convergence(existing, cond) => {
                        return Err(GyreError::AmbiguousConvergence { cycle_id });
                    }
                    Some(_) => {}
                }
            }
        }

        if max_iterations.is_none() && timeout.is_none() {
            return Err(GyreError::UnboundedCycle { cycle_id });
        }

        // The terminal node owns the output namespace convergence evaluates
        // against: the source of the feedback edge carrying the condition,
        // or of the first feedback edge otherwise.
        let terminal = convergence_edge
            .filter(|idx| back_edges.contains(idx))
            .or_else(|| back_edges.first().copied())
            .map(|idx| self.edges[idx].from)
            .expect("back_edges is non-empty");

        Ok(CycleGroup {
            cycle_id,
            members: ordered_members,
            entries,
            back_edges,
            forward_edges,
            max_iterations,
            timeout,
            min_iterations,
            convergence,
            terminal,
        })
    }

    /// Topologically order a component's members over its forward edges.
    fn order_interior(&self, component: &[NodeId], forward_edges: &[usize]) -> Option<Vec<NodeId>> {
        let mut in_degree: HashMap<NodeId, usize> =
            component.iter().map(|&n| (n, 0)).collect();
        for &idx in forward_edges {
            *in_degree.get_mut(&self.edges[idx].to)? += 1;
        }

        let mut queue: VecDeque<NodeId> = {
            let mut ready: Vec<NodeId> = in_degree
                .iter()
                .filter(|&(_, d)| *d == 0)
                .map(|(&n, _)| n)
                .collect();
            ready.sort_unstable();
            ready.into()
        };

        let mut sorted = Vec::with_capacity(component.len());
        while let Some(node) = queue.pop_front() {
            sorted.push(node);
            for &idx in forward_edges {
                let edge = &self.edges[idx];
                if edge.from == node {
                    let degree = in_degree.get_mut(&edge.to)?;
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(edge.to);
                    }
                }
            }
        }

        (sorted.len() == component.len()).then_some(sorted)
    }

    /// Compute strongly-connected components (iterative Tarjan).
    ///
    /// Components are returned in reverse topological discovery order;
    /// the condensation is re-ordered explicitly afterwards, so only the
    /// grouping matters here.
    fn strongly_connected_components(&self) -> Vec<Vec<NodeId>> {
        struct TarjanState {
            index: HashMap<NodeId, usize>,
            lowlink: HashMap<NodeId, usize>,
            on_stack: HashSet<NodeId>,
            stack: Vec<NodeId>,
            next_index: usize,
            components: Vec<Vec<NodeId>>,
        }

        let mut state = TarjanState {
            index: HashMap::new(),
            lowlink: HashMap::new(),
            on_stack: HashSet::new(),
            stack: Vec::new(),
            next_index: 0,
            components: Vec::new(),
        };

        // Explicit work stack: (node, next outgoing edge position).
        let mut work: Vec<(NodeId, usize)> = Vec::new();

        for &root in &self.nodes {
            if state.index.contains_key(&root) {
                continue;
            }

            work.push((root, 0));
            while let Some(&mut (node, ref mut edge_pos)) = work.last_mut() {
                if *edge_pos == 0 {
                    state.index.insert(node, state.next_index);
                    state.lowlink.insert(node, state.next_index);
                    state.next_index += 1;
                    state.stack.push(node);
                    state.on_stack.insert(node);
                }

                let outgoing = self.outgoing(node);
                if let Some(&edge_idx) = outgoing.get(*edge_pos) {
                    *edge_pos += 1;
                    let target = self.edges[edge_idx].to;
                    if !state.index.contains_key(&target) {
                        work.push((target, 0));
                    } else if state.on_stack.contains(&target) {
                        let target_index = state.index[&target];
                        let low = state.lowlink.get_mut(&node).expect("visited");
                        *low = (*low).min(target_index);
                    }
                } else {
                    // Node finished: propagate lowlink and pop components.
                    work.pop();
                    if let Some(&(parent, _)) = work.last() {
                        let node_low = state.lowlink[&node];
                        let parent_low = state.lowlink.get_mut(&parent).expect("visited");
                        *parent_low = (*parent_low).min(node_low);
                    }

                    if state.lowlink[&node] == state.index[&node] {
                        let mut component = Vec::new();
                        while let Some(member) = state.stack.pop() {
                            state.on_stack.remove(&member);
                            component.push(member);
                            if member == node {
                                break;
                            }
                        }
                        state.components.push(component);
                    }
                }
            }
        }

        state.components
    }
}

fn same_convergence(a: &Convergence, b: &Convergence) -> bool {
    match (a, b) {
        (Convergence::Expression(x), Convergence::Expression(y)) => x.raw() == y.raw(),
        (Convergence::Callback(x), Convergence::Callback(y)) => Arc::ptr_eq(x, y),
        _ => false,
    }
}

/// Kahn's algorithm over unit indices.
fn topological_order(count: usize, predecessors: &[HashSet<usize>]) -> Option<Vec<usize>> {
    let mut in_degree: Vec<usize> = predecessors.iter().map(HashSet::len).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
    for (unit, preds) in predecessors.iter().enumerate() {
        for &pred in preds {
            dependents[pred].push(unit);
        }
    }

    let mut queue: VecDeque<usize> = (0..count).filter(|&u| in_degree[u] == 0).collect();
    let mut order = Vec::with_capacity(count);

    while let Some(unit) = queue.pop_front() {
        order.push(unit);
        for &dependent in &dependents[unit] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                queue.push_back(dependent);
            }
        }
    }

    (order.len() == count).then_some(order)
}

/// One schedulable unit of the condensed graph.
#[derive(Debug)]
pub enum ScheduleUnit {
    /// A plain node executed once.
    Single(NodeId),
    /// A contracted cycle group, iterated by the cycle controller.
    Group(CycleGroup),
}

/// A contracted feedback subgraph.
#[derive(Debug)]
pub struct CycleGroup {
    /// The group's declared identifier.
    pub cycle_id: CycleId,
    /// Member nodes in interior execution order.
    pub members: Vec<NodeId>,
    /// Nodes receiving data from outside the group.
    pub entries: Vec<NodeId>,
    /// Indices of feedback edges (interior edges into entry nodes).
    pub back_edges: Vec<usize>,
    /// Indices of interior forward edges.
    pub forward_edges: Vec<usize>,
    /// Iteration limit, if configured.
    pub max_iterations: Option<u32>,
    /// Wall-clock budget, if configured.
    pub timeout: Option<Duration>,
    /// Iterations before convergence checks apply.
    pub min_iterations: u32,
    /// Convergence condition, if any.
    pub convergence: Option<Convergence>,
    /// Node owning the output namespace convergence evaluates against.
    pub terminal: NodeId,
}

/// The condensation: cycle groups contracted to single schedulable units.
#[derive(Debug)]
pub struct CondensedGraph {
    /// Schedulable units.
    pub units: Vec<ScheduleUnit>,
    /// Which unit each node belongs to.
    pub unit_of: HashMap<NodeId, usize>,
    /// Predecessor units per unit.
    pub predecessors: Vec<Vec<usize>>,
    /// Topological execution order of units.
    pub order: Vec<usize>,
}

impl CondensedGraph {
    /// Number of schedulable units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check if the condensation is empty.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Iterate contracted cycle groups.
    pub fn groups(&self) -> impl Iterator<Item = &CycleGroup> {
        self.units.iter().filter_map(|unit| match unit {
            ScheduleUnit::Group(group) => Some(group),
            ScheduleUnit::Single(_) => None,
        })
    }
}
