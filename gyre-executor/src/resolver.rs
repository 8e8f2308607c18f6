//! Parameter resolution and contract enforcement.
//!
//! Every node invocation's effective inputs come from three sources,
//! merged in increasing precedence:
//!
//! 1. frozen build-time configuration,
//! 2. values delivered by declared connections,
//! 3. run-level runtime overrides supplied by the caller.
//!
//! A value reaches the node **only if** its name appears in the node's
//! declared contract. Everything else is dropped and logged at WARN — a
//! deliberate security boundary against parameter-injection attacks, not
//! an oversight. After the merge, a missing required parameter aborts the
//! run before the node executes.

use gyre_core::contract::ParameterContract;
use gyre_core::error::{GyreError, Result};
use gyre_core::logging::{BufferedCollector, LogCategory, LogCollector, LogEvent};
use gyre_core::types::{NodeId, RunId};
use gyre_core::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves effective inputs for node invocations.
pub struct ParameterResolver {
    collector: Arc<BufferedCollector>,
}

impl ParameterResolver {
    /// Create a resolver logging to the given collector.
    pub fn new(collector: Arc<BufferedCollector>) -> Self {
        Self { collector }
    }

    /// Compute the effective input set for one node invocation.
    ///
    /// Resolution is a pure function of its inputs: resolving the same
    /// node and iteration twice with unchanged sources yields identical
    /// results.
    pub fn resolve(
        &self,
        run_id: RunId,
        node_id: NodeId,
        node_name: &str,
        contract: &ParameterContract,
        config: &Value,
        connection_values: &HashMap<String, Value>,
        overrides: Option<&HashMap<String, Value>>,
    ) -> Result<HashMap<String, Value>> {
        let mut effective: HashMap<String, Value> = HashMap::new();
        let mut dropped: Vec<String> = Vec::new();

        // Declared defaults seed the merge so that a node with no incoming
        // sources at all still resolves successfully.
        for (name, spec) in contract.iter() {
            if let Some(ref default) = spec.default {
                effective.insert(name.to_string(), default.clone());
            }
        }

        // (a) frozen build-time configuration
        if let serde_json::Value::Object(map) = config.inner() {
            for (name, value) in map {
                self.merge(
                    contract,
                    &mut effective,
                    &mut dropped,
                    name,
                    Value(value.clone()),
                );
            }
        }

        // (b) declared connection values
        for (name, value) in connection_values {
            self.merge(contract, &mut effective, &mut dropped, name, value.clone());
        }

        // (c) run-level runtime overrides
        if let Some(overrides) = overrides {
            for (name, value) in overrides {
                self.merge(contract, &mut effective, &mut dropped, name, value.clone());
            }
        }

        if !dropped.is_empty() {
            dropped.sort_unstable();
            tracing::warn!(
                node = node_name,
                dropped = ?dropped,
                "Dropped parameters not declared in node contract"
            );
            self.collector.collect(
                LogEvent::warn(
                    LogCategory::Parameter,
                    format!("Dropped {} undeclared parameter(s)", dropped.len()),
                )
                .with_run_id(run_id)
                .with_node_id(node_id)
                .with_field("parameters", dropped.join(",")),
            );
        }

        // Contract check runs after the full merge so an override may
        // satisfy a requirement the configuration left open.
        for name in contract.required_names() {
            if !effective.contains_key(name) {
                return Err(GyreError::MissingParameter {
                    node: node_name.to_string(),
                    parameter: name.to_string(),
                });
            }
        }

        Ok(effective)
    }

    fn merge(
        &self,
        contract: &ParameterContract,
        effective: &mut HashMap<String, Value>,
        dropped: &mut Vec<String>,
        name: &str,
        value: Value,
    ) {
        let Some(spec) = contract.get(name) else {
            dropped.push(name.to_string());
            return;
        };

        if !spec.param_type.accepts(&value) {
            tracing::warn!(
                parameter = name,
                expected = %spec.param_type,
                "Injected value does not match declared parameter type"
            );
        }

        effective.insert(name.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gyre_core::contract::{ParamSpec, ParamType};
    use serde_json::json;

    fn resolver() -> (ParameterResolver, Arc<BufferedCollector>) {
        let collector = Arc::new(BufferedCollector::with_default_capacity());
        (ParameterResolver::new(collector.clone()), collector)
    }

    fn resolve(
        contract: &ParameterContract,
        config: Value,
        connections: HashMap<String, Value>,
        overrides: Option<HashMap<String, Value>>,
    ) -> Result<HashMap<String, Value>> {
        let (resolver, _) = resolver();
        resolver.resolve(
            RunId::new(),
            NodeId::new(0),
            "test_node",
            contract,
            &config,
            &connections,
            overrides.as_ref(),
        )
    }

    #[test]
    fn precedence_config_connection_override() {
        let contract =
            ParameterContract::new().with("threshold", ParamSpec::optional(ParamType::Number));

        let config = Value(json!({"threshold": 1}));
        let connections = HashMap::from([("threshold".to_string(), Value::int(2))]);
        let overrides = HashMap::from([("threshold".to_string(), Value::int(3))]);

        let merged = resolve(&contract, config.clone(), HashMap::new(), None).unwrap();
        assert_eq!(merged["threshold"].as_f64(), Some(1.0));

        let merged = resolve(&contract, config.clone(), connections.clone(), None).unwrap();
        assert_eq!(merged["threshold"].as_f64(), Some(2.0));

        let merged = resolve(&contract, config, connections, Some(overrides)).unwrap();
        assert_eq!(merged["threshold"].as_f64(), Some(3.0));
    }

    #[test]
    fn undeclared_parameters_are_dropped_and_logged() {
        let contract =
            ParameterContract::new().with("declared", ParamSpec::optional(ParamType::Any));

        let (resolver, collector) = resolver();
        let overrides = HashMap::from([
            ("declared".to_string(), Value::int(1)),
            ("injected".to_string(), Value::string("payload")),
        ]);

        let merged = resolver
            .resolve(
                RunId::new(),
                NodeId::new(0),
                "test_node",
                &contract,
                &Value::null(),
                &HashMap::new(),
                Some(&overrides),
            )
            .unwrap();

        assert_eq!(merged.len(), 1);
        assert!(merged.contains_key("declared"));
        assert!(!merged.contains_key("injected"));

        let warnings = collector.by_level(gyre_core::logging::LogLevel::Warn);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].fields["parameters"].contains("injected"));
    }

    #[test]
    fn empty_contract_receives_nothing() {
        let contract = ParameterContract::new();
        let overrides = HashMap::from([("anything".to_string(), Value::int(1))]);

        let merged = resolve(
            &contract,
            Value(json!({"anything": 2})),
            HashMap::from([("anything".to_string(), Value::int(3))]),
            Some(overrides),
        )
        .unwrap();

        assert!(merged.is_empty());
    }

    #[test]
    fn missing_required_parameter_is_fatal() {
        let contract =
            ParameterContract::new().with("values", ParamSpec::required(ParamType::Array));

        let err = resolve(&contract, Value::null(), HashMap::new(), None).unwrap_err();
        let GyreError::MissingParameter { node, parameter } = err else {
            panic!("expected MissingParameter");
        };
        assert_eq!(node, "test_node");
        assert_eq!(parameter, "values");
    }

    #[test]
    fn all_sources_empty_still_resolves_defaults() {
        // A node with zero required parameters, no connections, and no
        // overrides must resolve successfully with its declared defaults.
        let contract = ParameterContract::new().with(
            "factor",
            ParamSpec::optional(ParamType::Number).with_default(0.9),
        );

        let merged = resolve(&contract, Value::null(), HashMap::new(), None).unwrap();
        assert_eq!(merged["factor"].as_f64(), Some(0.9));
    }

    #[test]
    fn override_satisfies_requirement() {
        let contract =
            ParameterContract::new().with("values", ParamSpec::required(ParamType::Array));

        let overrides = HashMap::from([("values".to_string(), Value(json!([1, 2])))]);
        let merged = resolve(&contract, Value::null(), HashMap::new(), Some(overrides)).unwrap();
        assert!(merged.contains_key("values"));
    }

    #[test]
    fn resolution_is_idempotent() {
        let contract = ParameterContract::new()
            .with("values", ParamSpec::required(ParamType::Array))
            .with(
                "factor",
                ParamSpec::optional(ParamType::Number).with_default(0.9),
            );

        let config = Value(json!({"factor": 0.8}));
        let connections = HashMap::from([("values".to_string(), Value(json!([110, 120])))]);

        let first = resolve(&contract, config.clone(), connections.clone(), None).unwrap();
        let second = resolve(&contract, config, connections, None).unwrap();
        assert_eq!(first, second);
    }
}
