//! Common test utilities for integration tests.

#![allow(dead_code)]

use gyre_core::contract::{ParamSpec, ParamType, ParameterContract};
use gyre_core::error::GyreError;
use gyre_core::traits::{CancelFlag, ExecutionContext, Node, NodeFuture, NodeOutputs};
use gyre_core::value::Value;
use gyre_executor::prelude::*;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Once;

static TRACING: Once = Once::new();

/// Install a test subscriber honoring `RUST_LOG`, once per process.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Emits a fixed list of readings on the "values" output.
pub struct SourceNode {
    pub values: Vec<f64>,
}

impl SourceNode {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }
}

impl Node for SourceNode {
    fn declare_parameters(&self) -> ParameterContract {
        ParameterContract::new()
    }

    fn run<'a>(&'a self, _ctx: ExecutionContext, _inputs: HashMap<String, Value>) -> NodeFuture<'a> {
        let values = self.values.clone();
        Box::pin(async move { Ok(NodeOutputs::empty().with_output("values", values)) })
    }
}

/// Multiplies readings by `factor` while `needs_adjustment` holds.
pub struct ScaleNode;

impl Node for ScaleNode {
    fn declare_parameters(&self) -> ParameterContract {
        ParameterContract::new()
            .with("values", ParamSpec::required(ParamType::Array))
            .with(
                "factor",
                ParamSpec::optional(ParamType::Number).with_default(0.9),
            )
            .with(
                "needs_adjustment",
                ParamSpec::optional(ParamType::Boolean).with_default(true),
            )
    }

    fn run<'a>(&'a self, _ctx: ExecutionContext, inputs: HashMap<String, Value>) -> NodeFuture<'a> {
        Box::pin(async move {
            let factor = inputs["factor"].as_f64().unwrap_or(1.0);
            let adjust = inputs["needs_adjustment"].as_bool().unwrap_or(true);

            let values: Vec<f64> = inputs["values"]
                .inner()
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_f64())
                        .map(|v| if adjust { v * factor } else { v })
                        .collect()
                })
                .unwrap_or_default();

            Ok(NodeOutputs::empty().with_output("values", values))
        })
    }
}

/// Computes the mean and flags readings that still exceed the threshold.
///
/// Keeps a `history` list of observed averages in its carried state and
/// verifies the state snapshot invariants on every invocation.
pub struct MeanEvalNode {
    pub threshold: f64,
}

impl MeanEvalNode {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Node for MeanEvalNode {
    fn declare_parameters(&self) -> ParameterContract {
        ParameterContract::new().with("values", ParamSpec::required(ParamType::Array))
    }

    fn run<'a>(&'a self, ctx: ExecutionContext, inputs: HashMap<String, Value>) -> NodeFuture<'a> {
        let threshold = self.threshold;
        Box::pin(async move {
            // Snapshot contract: always an object, even on iteration 0.
            if !ctx.state().is_object() {
                return Err(GyreError::NodeExecution {
                    node_id: ctx.node_id(),
                    run_id: ctx.run_id(),
                    cause: "state snapshot is not an object".to_string(),
                });
            }

            let mut history: Vec<serde_json::Value> = ctx
                .state()
                .get_field("history")
                .and_then(|h| h.inner().as_array().cloned())
                .unwrap_or_default();

            if history.len() != ctx.iteration() as usize {
                return Err(GyreError::NodeExecution {
                    node_id: ctx.node_id(),
                    run_id: ctx.run_id(),
                    cause: format!(
                        "history has {} entries at iteration {}",
                        history.len(),
                        ctx.iteration()
                    ),
                });
            }

            let values: Vec<f64> = inputs["values"]
                .inner()
                .as_array()
                .map(|items| items.iter().filter_map(|v| v.as_f64()).collect())
                .unwrap_or_default();
            let average = if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            };

            history.push(json!(average));
            let mut state = Value::object();
            state.set_field("history", Value(json!(history)));

            Ok(NodeOutputs::empty()
                .with_output("values", values)
                .with_output("average", average)
                .with_output("needs_adjustment", average > threshold)
                .with_state(state))
        })
    }
}

/// Declares no parameters at all and reports how many values reached it.
pub struct CaptureNode;

impl Node for CaptureNode {
    fn declare_parameters(&self) -> ParameterContract {
        ParameterContract::new()
    }

    fn run<'a>(&'a self, _ctx: ExecutionContext, inputs: HashMap<String, Value>) -> NodeFuture<'a> {
        Box::pin(async move {
            Ok(NodeOutputs::empty().with_output("received", inputs.len() as i64))
        })
    }
}

/// Self-loop node that counts iterations through its carried state.
pub struct CounterNode;

impl Node for CounterNode {
    fn declare_parameters(&self) -> ParameterContract {
        ParameterContract::new().with(
            "count",
            ParamSpec::optional(ParamType::Number).with_default(0),
        )
    }

    fn run<'a>(&'a self, ctx: ExecutionContext, inputs: HashMap<String, Value>) -> NodeFuture<'a> {
        Box::pin(async move {
            if ctx.state().is_null() {
                return Err(GyreError::NodeExecution {
                    node_id: ctx.node_id(),
                    run_id: ctx.run_id(),
                    cause: "state snapshot is null".to_string(),
                });
            }

            let seen = ctx
                .state()
                .get_field("ticks")
                .and_then(|t| t.inner().as_array().map(Vec::len))
                .unwrap_or(0);
            if seen != ctx.iteration() as usize {
                return Err(GyreError::NodeExecution {
                    node_id: ctx.node_id(),
                    run_id: ctx.run_id(),
                    cause: format!("{} ticks at iteration {}", seen, ctx.iteration()),
                });
            }

            let mut ticks: Vec<serde_json::Value> = ctx
                .state()
                .get_field("ticks")
                .and_then(|t| t.inner().as_array().cloned())
                .unwrap_or_default();
            ticks.push(json!(ctx.iteration()));

            let mut state = Value::object();
            state.set_field("ticks", Value(json!(ticks)));

            let count = inputs["count"].as_f64().unwrap_or(0.0);
            Ok(NodeOutputs::empty()
                .with_output("count", count + 1.0)
                .with_output("ticks_before", seen as i64)
                .with_state(state))
        })
    }
}

/// Sleeps a fixed interval each invocation; used for timeout tests.
pub struct SleepNode {
    pub ms: u64,
}

impl Node for SleepNode {
    fn declare_parameters(&self) -> ParameterContract {
        ParameterContract::new().with(
            "tick",
            ParamSpec::optional(ParamType::Number).with_default(0),
        )
    }

    fn run<'a>(&'a self, _ctx: ExecutionContext, inputs: HashMap<String, Value>) -> NodeFuture<'a> {
        let ms = self.ms;
        Box::pin(async move {
            tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
            let tick = inputs["tick"].as_f64().unwrap_or(0.0);
            Ok(NodeOutputs::empty().with_output("tick", tick + 1.0))
        })
    }
}

/// Trips a cancellation flag once a target iteration is reached.
pub struct CancelAtNode {
    pub flag: CancelFlag,
    pub at_iteration: u32,
}

impl Node for CancelAtNode {
    fn declare_parameters(&self) -> ParameterContract {
        ParameterContract::new().with(
            "value",
            ParamSpec::optional(ParamType::Number).with_default(0),
        )
    }

    fn run<'a>(&'a self, ctx: ExecutionContext, inputs: HashMap<String, Value>) -> NodeFuture<'a> {
        let flag = self.flag.clone();
        let at_iteration = self.at_iteration;
        Box::pin(async move {
            if ctx.iteration() >= at_iteration {
                flag.cancel();
            }
            let value = inputs["value"].as_f64().unwrap_or(0.0);
            Ok(NodeOutputs::empty().with_output("value", value + 1.0))
        })
    }
}

/// Build the canonical refinement workflow: a source feeding an
/// adjuster/evaluator feedback pair.
pub fn refinement_workflow(
    readings: Vec<f64>,
    factor: f64,
    convergence: &str,
    max_iterations: u32,
) -> Workflow {
    let mut config = Value::object();
    config.set_field("factor", Value::float(factor));

    WorkflowBuilder::new("threshold_refinement")
        .node("source", SourceNode::new(readings), Value::null())
        .node("adjuster", ScaleNode, config)
        .node("evaluator", MeanEvalNode::new(100.0), Value::null())
        .connect(Connection::new("source.values", "adjuster.values"))
        .connect(
            Connection::new("adjuster.values", "evaluator.values")
                .as_cycle("refine")
                .with_max_iterations(max_iterations),
        )
        .connect(
            Connection::new("evaluator.values", "adjuster.values")
                .as_cycle("refine")
                .with_max_iterations(max_iterations)
                .with_convergence(convergence)
                .with_mapping("needs_adjustment", "needs_adjustment"),
        )
        .build()
        .expect("refinement workflow should build")
}
