//! Integration tests for contract-gated parameter injection.

mod common;

use common::{CaptureNode, CounterNode, ScaleNode, SourceNode};
use gyre_core::error::GyreError;
use gyre_core::logging::LogLevel;
use gyre_core::value::Value;
use gyre_executor::prelude::*;
use serde_json::json;
use std::collections::HashMap;

#[tokio::test]
async fn empty_contract_receives_no_injected_values() {
    let workflow = WorkflowBuilder::new("capture")
        .node("capture", CaptureNode, Value::null())
        .build()
        .unwrap();

    // Matching-named runtime overrides must still be dropped.
    let parameters = RunParameters::from([(
        "capture".to_string(),
        HashMap::from([
            ("received".to_string(), Value::int(99)),
            ("values".to_string(), Value(json!([1, 2, 3]))),
        ]),
    )]);

    let engine = Engine::new();
    let report = engine.execute(&workflow, parameters).await.unwrap();

    assert_eq!(
        report.result("capture").unwrap().output("received").unwrap().as_f64(),
        Some(0.0)
    );
}

#[tokio::test]
async fn runtime_overrides_take_precedence_over_config() {
    let mut config = Value::object();
    config.set_field("factor", Value::float(0.5));

    let workflow = WorkflowBuilder::new("precedence")
        .node("source", SourceNode::new(vec![10.0]), Value::null())
        .node("adjuster", ScaleNode, config)
        .connect(Connection::new("source.values", "adjuster.values"))
        .build()
        .unwrap();

    let parameters = RunParameters::from([(
        "adjuster".to_string(),
        HashMap::from([("factor".to_string(), Value::float(3.0))]),
    )]);

    let engine = Engine::new();
    let report = engine.execute(&workflow, parameters).await.unwrap();

    let values = report.result("adjuster").unwrap().output("values").unwrap().clone();
    assert_eq!(values.inner(), &json!([30.0]));
}

#[tokio::test]
async fn missing_required_parameter_names_node_and_parameter() {
    // ScaleNode requires "values" and nothing supplies it.
    let workflow = WorkflowBuilder::new("missing")
        .node("adjuster", ScaleNode, Value::null())
        .build()
        .unwrap();

    let engine = Engine::new();
    let err = engine
        .execute(&workflow, RunParameters::new())
        .await
        .unwrap_err();

    let GyreError::MissingParameter { node, parameter } = err else {
        panic!("expected MissingParameter, got {err}");
    };
    assert_eq!(node, "adjuster");
    assert_eq!(parameter, "values");
}

#[tokio::test]
async fn dropped_parameters_are_logged() {
    let workflow = WorkflowBuilder::new("dropped")
        .node("source", SourceNode::new(vec![1.0]), Value::null())
        .build()
        .unwrap();

    let parameters = RunParameters::from([(
        "source".to_string(),
        HashMap::from([("smuggled".to_string(), Value::string("payload"))]),
    )]);

    let engine = Engine::new();
    let report = engine.execute(&workflow, parameters).await.unwrap();
    assert_eq!(report.status, RunStatus::Completed);

    let warnings = engine.collector().by_level(LogLevel::Warn);
    assert!(
        warnings
            .iter()
            .any(|e| e.fields.get("parameters").is_some_and(|p| p.contains("smuggled"))),
        "expected a dropped-parameter warning"
    );
}

#[tokio::test]
async fn all_sources_empty_resolves_declared_defaults() {
    // No connections, no config, no overrides: the optional "count"
    // default must still be delivered.
    let workflow = WorkflowBuilder::new("defaults")
        .node("counter", CounterNode, Value::null())
        .build()
        .unwrap();

    let engine = Engine::new();
    let report = engine.execute(&workflow, RunParameters::new()).await.unwrap();

    assert_eq!(
        report.result("counter").unwrap().output("count").unwrap().as_f64(),
        Some(1.0)
    );
}
