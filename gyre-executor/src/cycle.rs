//! Cycle controller: convergence-driven iteration of one contracted group.
//!
//! The controller drives a [`CycleGroup`] through the state machine
//! `Initializing -> Iterating -> {Converged | Exhausted | TimedOut |
//! Cancelled}`. Iterations are strictly sequential: iteration N+1 never
//! begins before iteration N's termination check completes.
//!
//! Exhaustion and timeout are non-fatal terminal states. The caller gets
//! the last iteration's outputs with a status flag; only node failures and
//! configuration bugs abort the run.

use crate::report::{CycleStatus, NodeResult};
use crate::resolver::ParameterResolver;
use crate::run::{RunState, apply_edge, field_value};
use crate::scheduler::graph::{Convergence, CycleGroup};
use crate::workflow::WorkflowInner;
use gyre_core::error::{GyreError, Result};
use gyre_core::logging::{IterationEvent, LogCategory, LogCollector, LogEvent};
use gyre_core::traits::ExecutionContext;
use gyre_core::types::NodeId;
use gyre_core::value::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Controller phase, tracked for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CyclePhase {
    Initializing,
    Iterating,
    Terminal(CycleStatus),
}

/// Terminal outcome of one cycle group execution.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    /// How the group terminated.
    pub status: CycleStatus,
    /// Number of iterations executed.
    pub iterations: u32,
}

/// Drives one contracted cycle group to termination.
pub(crate) struct CycleController<'a> {
    workflow: &'a WorkflowInner,
    group: &'a CycleGroup,
    run: &'a RunState,
    resolver: &'a ParameterResolver,
}

impl<'a> CycleController<'a> {
    pub fn new(
        workflow: &'a WorkflowInner,
        group: &'a CycleGroup,
        run: &'a RunState,
        resolver: &'a ParameterResolver,
    ) -> Self {
        Self {
            workflow,
            group,
            run,
            resolver,
        }
    }

    /// Run the group until convergence, exhaustion, timeout, or cancellation.
    ///
    /// Member results for the final iteration are recorded into the run
    /// state; the returned outcome carries the status flag.
    pub async fn run(&self) -> Result<CycleOutcome> {
        let group = self.group;
        let mut phase = CyclePhase::Initializing;
        tracing::debug!(cycle = %group.cycle_id, ?phase, "Cycle controller starting");

        // Iteration 0 sources from upstream DAG producers outside the
        // group; these values are frozen for the duration of the cycle.
        let external: HashMap<NodeId, HashMap<String, Value>> = group
            .members
            .iter()
            .map(|&node| {
                let edges: Vec<usize> = self
                    .workflow
                    .graph
                    .incoming(node)
                    .iter()
                    .copied()
                    .filter(|&idx| {
                        let from = self.workflow.graph.edge(idx).from;
                        !group.members.contains(&from)
                    })
                    .collect();
                (node, self.run.gather_edge_values(&self.workflow.graph, edges))
            })
            .collect();

        let cycle_start = Instant::now();
        let mut iteration: u32 = 0;
        let mut executed: u32 = 0;
        let mut previous: HashMap<NodeId, HashMap<String, Value>> = HashMap::new();

        phase = CyclePhase::Iterating;
        tracing::debug!(cycle = %group.cycle_id, ?phase, entries = ?group.entries, "Cycle inputs assembled");
        let status = loop {
            // Cancellation is checked at iteration boundaries only.
            if self.run.cancel.is_cancelled() {
                break CycleStatus::Cancelled;
            }

            let (current, durations) = self
                .execute_iteration(iteration, &external, &previous)
                .await?;
            executed = iteration + 1;

            let converged = self.evaluate_convergence(iteration, &current)?;
            self.emit_iteration_events(iteration, converged, &durations);

            previous = current;

            if converged {
                break CycleStatus::Converged;
            }
            if let Some(max) = group.max_iterations {
                if iteration + 1 >= max {
                    break CycleStatus::Exhausted;
                }
            }
            if let Some(timeout) = group.timeout {
                if cycle_start.elapsed() >= timeout {
                    break CycleStatus::TimedOut;
                }
            }

            iteration += 1;
        };

        phase = CyclePhase::Terminal(status);
        tracing::info!(
            cycle = %group.cycle_id,
            ?phase,
            iterations = executed,
            "Cycle terminated"
        );
        self.run.collector.collect(
            LogEvent::info(
                LogCategory::Cycle,
                format!("Cycle terminated: {:?}", status),
            )
            .with_run_id(self.run.run_id)
            .with_cycle_id(group.cycle_id.clone())
            .with_iteration(executed.saturating_sub(1)),
        );

        // The last iteration's outputs become ordinary node outputs for
        // downstream DAG consumers.
        if executed > 0 {
            let last = executed - 1;
            for &node in &group.members {
                let outputs = previous.remove(&node).unwrap_or_default();
                self.run.record_result(NodeResult {
                    node_id: node,
                    node: self.workflow.node_name(node).to_string(),
                    iteration: last,
                    outputs,
                    state: self.run.store.snapshot(&group.cycle_id, node),
                    cycle_status: Some(status),
                });
            }
        }

        Ok(CycleOutcome {
            status,
            iterations: executed,
        })
    }

    /// Execute every member once, in interior topological order.
    async fn execute_iteration(
        &self,
        iteration: u32,
        external: &HashMap<NodeId, HashMap<String, Value>>,
        previous: &HashMap<NodeId, HashMap<String, Value>>,
    ) -> Result<(HashMap<NodeId, HashMap<String, Value>>, Vec<(NodeId, Duration)>)> {
        let group = self.group;
        let graph = &self.workflow.graph;
        let mut current: HashMap<NodeId, HashMap<String, Value>> = HashMap::new();
        let mut durations: Vec<(NodeId, Duration)> = Vec::with_capacity(group.members.len());

        for &node in &group.members {
            let mut values = external.get(&node).cloned().unwrap_or_default();

            // Iteration N>0 sources the configured feedback fields from
            // iteration N-1's outputs, overriding the frozen externals.
            if iteration > 0 {
                for &idx in &group.back_edges {
                    let edge = graph.edge(idx);
                    if edge.to == node {
                        if let Some(prev_outputs) = previous.get(&edge.from) {
                            apply_edge(edge, &mut values, |field| {
                                field_value(prev_outputs, field)
                            });
                        }
                    }
                }
            }

            // Same-iteration values from upstream members.
            for &idx in &group.forward_edges {
                let edge = graph.edge(idx);
                if edge.to == node {
                    if let Some(upstream) = current.get(&edge.from) {
                        apply_edge(edge, &mut values, |field| field_value(upstream, field));
                    }
                }
            }

            let name = self.workflow.node_name(node);
            let inputs = self.resolver.resolve(
                self.run.run_id,
                node,
                name,
                &self.workflow.contracts[&node],
                &self.workflow.configs[&node],
                &values,
                self.run.overrides_for(name),
            )?;

            let snapshot = self.run.store.snapshot(&group.cycle_id, node);
            let ctx = ExecutionContext::for_iteration(
                self.run.run_id,
                node,
                group.cycle_id.clone(),
                iteration,
                snapshot.clone(),
                self.run.started_at,
                self.run.cancel.clone(),
            );

            let node_impl =
                self.workflow
                    .nodes
                    .get(&node)
                    .ok_or_else(|| GyreError::NodeNotFound {
                        node: name.to_string(),
                    })?;
            let timeout = self.workflow.node_timeout(node);
            let started = Instant::now();

            let outputs = match tokio::time::timeout(timeout, node_impl.run(ctx, inputs)).await {
                Ok(Ok(outputs)) => outputs,
                Ok(Err(e)) => {
                    return Err(GyreError::NodeExecution {
                        node_id: node,
                        run_id: self.run.run_id,
                        cause: e.to_string(),
                    });
                }
                Err(_) => {
                    return Err(GyreError::NodeTimeout {
                        node_id: node,
                        run_id: self.run.run_id,
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
            };
            durations.push((node, started.elapsed()));

            // Updated carried state is written back before the next
            // iteration begins; an unchanged state still gets a history
            // entry for this iteration.
            let state = outputs.state.unwrap_or(snapshot);
            self.run
                .store
                .record(&group.cycle_id, node, iteration, state);

            current.insert(node, outputs.outputs);
        }

        Ok((current, durations))
    }

    /// Evaluate the group's termination condition for this iteration.
    fn evaluate_convergence(
        &self,
        iteration: u32,
        current: &HashMap<NodeId, HashMap<String, Value>>,
    ) -> Result<bool> {
        let group = self.group;

        // A configured minimum-iteration threshold suppresses convergence
        // checks until it elapses.
        if iteration + 1 < group.min_iterations {
            return Ok(false);
        }

        match &group.convergence {
            None => Ok(false),
            Some(Convergence::Expression(expr)) => {
                let empty = HashMap::new();
                let terminal_outputs = current.get(&group.terminal).unwrap_or(&empty);
                let mut scope = Value::object();
                for (field, value) in terminal_outputs {
                    scope.set_field(field.clone(), value.clone());
                }
                expr.eval(&scope)
            }
            Some(Convergence::Callback(callback)) => {
                let results: HashMap<String, Value> = current
                    .iter()
                    .map(|(&node, outputs)| {
                        let mut scope = Value::object();
                        for (field, value) in outputs {
                            scope.set_field(field.clone(), value.clone());
                        }
                        (self.workflow.node_name(node).to_string(), scope)
                    })
                    .collect();
                let accumulated = self.run.store.accumulated(&group.cycle_id);
                Ok(callback(&results, iteration, &accumulated))
            }
        }
    }

    /// Emit one observability event per member for this iteration.
    fn emit_iteration_events(
        &self,
        iteration: u32,
        converged: bool,
        durations: &[(NodeId, Duration)],
    ) {
        for &(node, duration) in durations {
            tracing::debug!(
                cycle = %self.group.cycle_id,
                iteration,
                node = %node,
                duration_ms = duration.as_millis() as u64,
                converged,
                "Cycle iteration step"
            );
            let event = IterationEvent {
                cycle_id: self.group.cycle_id.clone(),
                iteration,
                node_id: node,
                duration,
                converged,
            };
            self.run.collector.collect(event.into_log_event(self.run.run_id));
        }
    }
}
