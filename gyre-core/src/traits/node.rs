//! Node trait and related types.

use super::context::ExecutionContext;
use crate::contract::ParameterContract;
use crate::error::Result;
use crate::value::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// Output produced by one node invocation.
#[derive(Debug, Clone, Default)]
pub struct NodeOutputs {
    /// Named output field values, consumed by downstream connections.
    pub outputs: HashMap<String, Value>,
    /// Updated carried state, written back to the state store before the
    /// next iteration begins. `None` leaves the stored state unchanged.
    pub state: Option<Value>,
}

impl NodeOutputs {
    /// Create outputs from a field map.
    pub fn new(outputs: HashMap<String, Value>) -> Self {
        Self {
            outputs,
            state: None,
        }
    }

    /// Create an empty output set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add a single output field (builder style).
    pub fn with_output(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(name.into(), value.into());
        self
    }

    /// Set the updated carried state.
    pub fn with_state(mut self, state: Value) -> Self {
        self.state = Some(state);
        self
    }

    /// Get an output field by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name)
    }

    /// View the output fields as a single object value.
    ///
    /// This is the namespace convergence expressions evaluate against.
    pub fn as_scope(&self) -> Value {
        let mut scope = Value::object();
        for (name, value) in &self.outputs {
            scope.set_field(name.clone(), value.clone());
        }
        scope
    }
}

/// A boxed future for async node execution.
pub type NodeFuture<'a> = Pin<Box<dyn Future<Output = Result<NodeOutputs>> + Send + 'a>>;

/// The core trait for all GYRE nodes.
///
/// This is the entire surface the engine sees: what parameters a node
/// accepts, and how to run it. Everything a node does internally
/// (network calls, model inference, file access) is opaque to the engine.
///
/// Nodes may execute multiple times within one run (once per cycle
/// iteration) but must not keep mutable instance state between
/// invocations; carried state flows explicitly through
/// [`ExecutionContext::state`] and [`NodeOutputs::state`].
///
/// # Example
///
/// ```ignore
/// use gyre_core::prelude::*;
///
/// struct Scaler;
///
/// impl Node for Scaler {
///     fn declare_parameters(&self) -> ParameterContract {
///         ParameterContract::new()
///             .with("values", ParamSpec::required(ParamType::Array))
///             .with("factor", ParamSpec::optional(ParamType::Number).with_default(0.9))
///     }
///
///     fn run<'a>(
///         &'a self,
///         _ctx: ExecutionContext,
///         inputs: HashMap<String, Value>,
///     ) -> NodeFuture<'a> {
///         Box::pin(async move {
///             let factor = inputs["factor"].as_f64().unwrap_or(1.0);
///             // ... scale inputs["values"] by factor ...
///             Ok(NodeOutputs::empty().with_output("values", Value::null()))
///         })
///     }
/// }
/// ```
pub trait Node: Send + Sync {
    /// Declare the parameters this node accepts.
    ///
    /// The returned contract is captured once at build time and frozen;
    /// anything injected at run time that is not declared here is dropped.
    fn declare_parameters(&self) -> ParameterContract;

    /// Execute the node.
    ///
    /// # Parameters
    /// - `ctx`: Execution context (run/cycle ids, iteration, state snapshot)
    /// - `inputs`: Effective inputs after contract-gated merge
    ///
    /// # Returns
    /// Named output fields and, optionally, updated carried state.
    fn run<'a>(&'a self, ctx: ExecutionContext, inputs: HashMap<String, Value>) -> NodeFuture<'a>;
}

/// A node factory that creates node instances from configuration.
pub trait NodeFactory: Send + Sync {
    /// Get the node type name this factory creates.
    fn node_type(&self) -> &str;

    /// Create a new node instance from declarative configuration.
    fn create(&self, config: &Value) -> Result<Box<dyn Node>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outputs_builder() {
        let out = NodeOutputs::empty()
            .with_output("average", 95.0)
            .with_output("needs_adjustment", false)
            .with_state(Value::object());

        assert_eq!(out.get("average").unwrap().as_f64(), Some(95.0));
        assert_eq!(out.get("needs_adjustment").unwrap().as_bool(), Some(false));
        assert!(out.state.is_some());
    }

    #[test]
    fn outputs_as_scope() {
        let scope = NodeOutputs::empty()
            .with_output("average", 95.0)
            .as_scope();

        assert_eq!(scope.get_f64("average"), Some(95.0));
        assert!(scope.get_field("missing").is_none());
    }
}
