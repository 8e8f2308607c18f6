//! Run execution engine.
//!
//! The engine walks a workflow's condensation in topological order,
//! spawning every ready unit onto a bounded worker pool. Linear units
//! execute once; cycle units are handed to the cycle controller and
//! iterate to termination before their dependents become ready.
//!
//! Cancellation and the run-level timeout are cooperative: both are
//! checked at unit boundaries, and in-flight work always finishes before
//! the engine reports `Cancelled` or `TimedOut`, so the state store is
//! never left half-written.

use crate::cycle::CycleController;
use crate::report::{CycleReport, NodeResult, RunReport, RunStatus};
use crate::resolver::ParameterResolver;
use crate::run::{RunParameters, RunState};
use crate::scheduler::graph::ScheduleUnit;
use crate::workflow::{Workflow, WorkflowInner};
use dashmap::DashMap;
use gyre_core::error::{GyreError, Result};
use gyre_core::logging::{BufferedCollector, LogCategory, LogCollector, LogEvent};
use gyre_core::traits::{CancelFlag, ExecutionContext};
use gyre_core::types::{NodeId, RunId};
use gyre_core::value::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::instrument;

/// Configuration for the engine.
///
/// Branch concurrency and node timeouts are per-workflow settings; the
/// engine adds only cross-workflow concerns.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Capacity of the structured log buffer.
    pub log_buffer_capacity: usize,
    /// Engine-level run timeout cap, combined with the workflow's own
    /// `run_timeout_ms` (the tighter bound wins).
    pub run_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_buffer_capacity: gyre_core::logging::DEFAULT_BUFFER_CAPACITY,
            run_timeout_ms: None,
        }
    }
}

impl EngineConfig {
    /// Create configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `GYRE_LOG_BUFFER_CAPACITY`: Structured log buffer capacity
    /// - `GYRE_RUN_TIMEOUT_MS`: Engine-level run timeout cap
    pub fn from_env() -> Self {
        let log_buffer_capacity = std::env::var("GYRE_LOG_BUFFER_CAPACITY")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(gyre_core::logging::DEFAULT_BUFFER_CAPACITY);

        let run_timeout_ms = std::env::var("GYRE_RUN_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok());

        Self {
            log_buffer_capacity,
            run_timeout_ms,
        }
    }

    /// Set the log buffer capacity.
    pub fn with_log_buffer_capacity(mut self, capacity: usize) -> Self {
        self.log_buffer_capacity = capacity;
        self
    }

    /// Set the engine-level run timeout cap.
    pub fn with_run_timeout_ms(mut self, ms: u64) -> Self {
        self.run_timeout_ms = Some(ms);
        self
    }
}

/// The main execution engine.
pub struct Engine {
    config: EngineConfig,
    collector: Arc<BufferedCollector>,
    active: DashMap<RunId, ()>,
}

impl Engine {
    /// Create an engine with default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine with the given configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        let collector = Arc::new(BufferedCollector::new(config.log_buffer_capacity));
        Self {
            config,
            collector,
            active: DashMap::new(),
        }
    }

    /// Get the structured log collector.
    pub fn collector(&self) -> &Arc<BufferedCollector> {
        &self.collector
    }

    /// Number of runs currently in flight.
    pub fn active_run_count(&self) -> usize {
        self.active.len()
    }

    /// Execute a workflow to completion.
    ///
    /// `parameters` holds run-level overrides keyed by node name, then by
    /// parameter name. The returned report carries each node's final
    /// result and each cycle group's terminal status.
    pub async fn execute(&self, workflow: &Workflow, parameters: RunParameters) -> Result<RunReport> {
        self.execute_with_cancel(workflow, parameters, CancelFlag::new())
            .await
    }

    /// Execute a workflow with an externally controlled cancellation flag.
    #[instrument(
        skip(self, workflow, parameters, cancel),
        fields(workflow = %workflow.name(), units = %workflow.inner.condensed.len())
    )]
    pub async fn execute_with_cancel(
        &self,
        workflow: &Workflow,
        parameters: RunParameters,
        cancel: CancelFlag,
    ) -> Result<RunReport> {
        let run_id = RunId::new();
        self.active.insert(run_id, ());
        let result = self.run_to_completion(run_id, workflow, parameters, cancel).await;
        self.active.remove(&run_id);
        result
    }

    async fn run_to_completion(
        &self,
        run_id: RunId,
        workflow: &Workflow,
        parameters: RunParameters,
        cancel: CancelFlag,
    ) -> Result<RunReport> {
        let state = Arc::new(RunState::new(
            run_id,
            Arc::clone(&self.collector),
            parameters,
            cancel.clone(),
        ));
        let resolver = Arc::new(ParameterResolver::new(Arc::clone(&self.collector)));

        // The tighter of the workflow's and the engine's run budgets.
        let deadline = [
            workflow.settings().run_timeout_ms,
            self.config.run_timeout_ms,
        ]
        .into_iter()
        .flatten()
        .min()
        .map(Duration::from_millis);

        let semaphore = Arc::new(Semaphore::new(
            workflow.settings().max_concurrent_branches.max(1),
        ));

        self.collector.collect(
            LogEvent::info(LogCategory::Run, "Run started")
                .with_run_id(run_id)
                .with_field("workflow", workflow.name()),
        );
        tracing::info!(run_id = %run_id, workflow = %workflow.name(), "Started run");

        let total = workflow.inner.condensed.len();
        let mut tasks: JoinSet<Result<usize>> = JoinSet::new();
        let mut spawned = vec![false; total];
        let mut completed = vec![false; total];
        let mut interrupted: Option<RunStatus> = None;

        loop {
            // Cooperative checks happen at unit boundaries; once tripped,
            // nothing new is spawned and in-flight work drains.
            if interrupted.is_none() {
                if cancel.is_cancelled() {
                    interrupted = Some(RunStatus::Cancelled);
                } else if let Some(budget) = deadline {
                    if state.started_at.elapsed() >= budget {
                        interrupted = Some(RunStatus::TimedOut);
                    }
                }
            }

            if interrupted.is_none() {
                for &unit_idx in &workflow.inner.condensed.order {
                    if spawned[unit_idx] {
                        continue;
                    }
                    let ready = workflow.inner.condensed.predecessors[unit_idx]
                        .iter()
                        .all(|&pred| completed[pred]);
                    if !ready {
                        continue;
                    }

                    spawned[unit_idx] = true;
                    let wf = workflow.clone();
                    let st = Arc::clone(&state);
                    let res = Arc::clone(&resolver);
                    let sem = Arc::clone(&semaphore);

                    tasks.spawn(async move {
                        let _permit = sem
                            .acquire()
                            .await
                            .expect("semaphore should not be closed");
                        execute_unit(&wf, unit_idx, &st, &res).await?;
                        Ok(unit_idx)
                    });
                }
            }

            if tasks.is_empty() {
                break;
            }

            let Some(join_result) = tasks.join_next().await else {
                break;
            };

            match join_result {
                Ok(Ok(unit_idx)) => {
                    completed[unit_idx] = true;
                }
                Ok(Err(e)) => {
                    tasks.abort_all();
                    self.collector.collect(
                        LogEvent::error(LogCategory::Run, format!("Run failed: {}", e))
                            .with_run_id(run_id),
                    );
                    tracing::error!(run_id = %run_id, error = %e, "Run failed");
                    return Err(e);
                }
                Err(join_error) => {
                    tasks.abort_all();
                    let cause = if join_error.is_panic() {
                        "unit task panicked".to_string()
                    } else {
                        "unit task was cancelled".to_string()
                    };
                    tracing::error!(run_id = %run_id, error = %cause, "Task join error");
                    return Err(GyreError::NodeExecution {
                        node_id: NodeId::new(0),
                        run_id,
                        cause,
                    });
                }
            }
        }

        let status = interrupted.unwrap_or(RunStatus::Completed);

        self.collector.collect(
            LogEvent::info(LogCategory::Run, format!("Run finished: {:?}", status))
                .with_run_id(run_id),
        );
        tracing::info!(run_id = %run_id, ?status, "Run finished");

        let results: HashMap<String, NodeResult> = state
            .collect_results()
            .into_values()
            .map(|r| (r.node.clone(), r))
            .collect();

        Ok(RunReport {
            run_id,
            status,
            results,
            cycles: state.collect_cycles(),
        })
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Execute one schedulable unit.
async fn execute_unit(
    workflow: &Workflow,
    unit_idx: usize,
    state: &RunState,
    resolver: &ParameterResolver,
) -> Result<()> {
    match &workflow.inner.condensed.units[unit_idx] {
        ScheduleUnit::Single(node) => {
            execute_single(&workflow.inner, *node, state, resolver).await
        }
        ScheduleUnit::Group(group) => {
            let controller = CycleController::new(&workflow.inner, group, state, resolver);
            let outcome = controller.run().await?;
            state.record_cycle(CycleReport {
                cycle_id: group.cycle_id.clone(),
                status: outcome.status,
                iterations: outcome.iterations,
            });
            Ok(())
        }
    }
}

/// Execute one plain node.
async fn execute_single(
    inner: &WorkflowInner,
    node: NodeId,
    state: &RunState,
    resolver: &ParameterResolver,
) -> Result<()> {
    // Node-boundary cancellation check; a skipped node leaves no result
    // and the run reports `Cancelled`.
    if state.cancel.is_cancelled() {
        return Ok(());
    }

    let name = inner.node_name(node);
    let edges: Vec<usize> = inner.graph.incoming(node).to_vec();
    let values = state.gather_edge_values(&inner.graph, edges);

    let inputs = resolver.resolve(
        state.run_id,
        node,
        name,
        &inner.contracts[&node],
        &inner.configs[&node],
        &values,
        state.overrides_for(name),
    )?;

    let ctx = ExecutionContext::new(state.run_id, node, state.started_at, state.cancel.clone());
    let node_impl = inner
        .nodes
        .get(&node)
        .ok_or_else(|| GyreError::NodeNotFound {
            node: name.to_string(),
        })?;

    let timeout = inner.node_timeout(node);
    tracing::debug!(run_id = %state.run_id, node = %node, name, "Executing node");

    match tokio::time::timeout(timeout, node_impl.run(ctx, inputs)).await {
        Ok(Ok(outputs)) => {
            state.collector.collect(
                LogEvent::debug(LogCategory::Node, format!("Node completed: {}", name))
                    .with_run_id(state.run_id)
                    .with_node_id(node)
                    .with_field("output_fields", outputs.outputs.len().to_string()),
            );
            state.record_result(NodeResult {
                node_id: node,
                node: name.to_string(),
                iteration: 0,
                outputs: outputs.outputs,
                state: outputs.state.unwrap_or_else(Value::object),
                cycle_status: None,
            });
            Ok(())
        }
        Ok(Err(e)) => {
            state.collector.collect(
                LogEvent::error(LogCategory::Node, format!("Node failed: {}", name))
                    .with_run_id(state.run_id)
                    .with_node_id(node)
                    .with_field("error", e.to_string()),
            );
            Err(GyreError::NodeExecution {
                node_id: node,
                run_id: state.run_id,
                cause: e.to_string(),
            })
        }
        Err(_) => {
            state.collector.collect(
                LogEvent::error(LogCategory::Node, format!("Node timeout: {}", name))
                    .with_run_id(state.run_id)
                    .with_node_id(node),
            );
            Err(GyreError::NodeTimeout {
                node_id: node,
                run_id: state.run_id,
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }
}
