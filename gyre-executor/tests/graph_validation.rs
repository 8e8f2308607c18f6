//! Integration tests for build-time graph validation and scheduling.

mod common;

use common::{CaptureNode, CounterNode, MeanEvalNode, ScaleNode, SourceNode, refinement_workflow};
use gyre_core::error::GyreError;
use gyre_core::value::Value;
use gyre_executor::prelude::*;

#[test]
fn cycle_without_safety_limit_rejected_at_build() {
    let result = WorkflowBuilder::new("unbounded")
        .node("a", CounterNode, Value::null())
        .connect(Connection::new("a.count", "a.count").as_cycle("loop"))
        .build();

    assert!(matches!(result, Err(GyreError::UnboundedCycle { .. })));
}

#[test]
fn unmarked_cycle_rejected_at_build() {
    let result = WorkflowBuilder::new("unmarked")
        .node("a", ScaleNode, Value::null())
        .node("b", ScaleNode, Value::null())
        .connect(Connection::new("a.values", "b.values"))
        .connect(Connection::new("b.values", "a.values"))
        .build();

    assert!(matches!(result, Err(GyreError::UnmarkedCycle { .. })));
}

#[test]
fn partially_marked_cycle_rejected_at_build() {
    // The back-edge is marked, the forward edge is not: membership is not
    // entirely explained by cycle-marked edges.
    let result = WorkflowBuilder::new("partial")
        .node("a", ScaleNode, Value::null())
        .node("b", ScaleNode, Value::null())
        .connect(Connection::new("a.values", "b.values"))
        .connect(
            Connection::new("b.values", "a.values")
                .as_cycle("loop")
                .with_max_iterations(3),
        )
        .build();

    assert!(matches!(result, Err(GyreError::UnmarkedCycle { .. })));
}

#[tokio::test]
async fn group_output_feeds_downstream_consumers() {
    // The cycle's terminal-iteration output must look like a normal node
    // output to the DAG below it.
    let workflow = WorkflowBuilder::new("downstream")
        .node(
            "source",
            SourceNode::new(vec![110.0, 120.0, 130.0, 90.0, 80.0]),
            Value::null(),
        )
        .node("adjuster", ScaleNode, Value::null())
        .node("evaluator", MeanEvalNode::new(100.0), Value::null())
        .node("final_check", MeanEvalNode::new(100.0), Value::null())
        .connect(Connection::new("source.values", "adjuster.values"))
        .connect(
            Connection::new("adjuster.values", "evaluator.values")
                .as_cycle("refine")
                .with_max_iterations(5),
        )
        .connect(
            Connection::new("evaluator.values", "adjuster.values")
                .as_cycle("refine")
                .with_max_iterations(5)
                .with_convergence("average <= 100")
                .with_mapping("needs_adjustment", "needs_adjustment"),
        )
        .connect(Connection::new("evaluator.values", "final_check.values"))
        .build()
        .unwrap();

    let engine = Engine::new();
    let report = engine.execute(&workflow, RunParameters::new()).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    let final_check = report.result("final_check").unwrap();
    assert!(final_check.output("average").unwrap().as_f64().unwrap() <= 100.0);
    assert!(final_check.cycle_status.is_none());
}

#[tokio::test]
async fn independent_cycle_groups_both_terminate() {
    let workflow = WorkflowBuilder::new("parallel_groups")
        .node("left", CounterNode, Value::null())
        .node("right", CounterNode, Value::null())
        .connect(
            Connection::new("left.count", "left.count")
                .as_cycle("left_loop")
                .with_max_iterations(3),
        )
        .connect(
            Connection::new("right.count", "right.count")
                .as_cycle("right_loop")
                .with_max_iterations(2),
        )
        .build()
        .unwrap();

    let engine = Engine::new();
    let report = engine.execute(&workflow, RunParameters::new()).await.unwrap();

    assert_eq!(report.cycle("left_loop").unwrap().iterations, 3);
    assert_eq!(report.cycle("right_loop").unwrap().iterations, 2);
    assert_eq!(
        report.result("left").unwrap().output("count").unwrap().as_f64(),
        Some(3.0)
    );
    assert_eq!(
        report.result("right").unwrap().output("count").unwrap().as_f64(),
        Some(2.0)
    );
}

#[tokio::test]
async fn independent_branches_all_complete() {
    let workflow = WorkflowBuilder::new("fanout")
        .node("source", SourceNode::new(vec![10.0, 20.0]), Value::null())
        .node("branch_a", ScaleNode, Value::null())
        .node("branch_b", ScaleNode, Value::null())
        .node("sink", CaptureNode, Value::null())
        .connect(Connection::new("source.values", "branch_a.values"))
        .connect(Connection::new("source.values", "branch_b.values"))
        .connect(Connection::new("branch_a.values", "sink.ignored"))
        .connect(Connection::new("branch_b.values", "sink.ignored_too"))
        .build()
        .unwrap();

    let engine = Engine::new();
    let report = engine.execute(&workflow, RunParameters::new()).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.results.len(), 4);
    // The sink's empty contract drops both branch deliveries.
    assert_eq!(
        report.result("sink").unwrap().output("received").unwrap().as_f64(),
        Some(0.0)
    );
}

#[tokio::test]
async fn resolution_is_idempotent_across_identical_runs() {
    let workflow = refinement_workflow(
        vec![110.0, 120.0, 130.0, 90.0, 80.0],
        0.985,
        "average <= 100",
        10,
    );

    let engine = Engine::new();
    let first = engine.execute(&workflow, RunParameters::new()).await.unwrap();
    let second = engine.execute(&workflow, RunParameters::new()).await.unwrap();

    let avg = |report: &RunReport| {
        report
            .result("evaluator")
            .unwrap()
            .output("average")
            .unwrap()
            .as_f64()
            .unwrap()
    };
    assert_eq!(avg(&first), avg(&second));
    assert_eq!(
        first.cycle("refine").unwrap().iterations,
        second.cycle("refine").unwrap().iterations
    );
}
