//! Workflow loading: definitions plus a factory registry become
//! executable workflows.

use crate::workflow::{Connection, Workflow, WorkflowBuilder};
use gyre_core::error::{GyreError, Result};
use gyre_core::flow::WorkflowDefinition;
use gyre_core::traits::NodeFactory;
use gyre_core::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of node factories, keyed by node type.
#[derive(Default)]
pub struct NodeRegistry {
    factories: HashMap<String, Box<dyn NodeFactory>>,
}

impl NodeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory. A later registration for the same type wins.
    pub fn register(&mut self, factory: Box<dyn NodeFactory>) {
        self.factories
            .insert(factory.node_type().to_string(), factory);
    }

    /// Check whether a node type is registered.
    pub fn has_type(&self, node_type: &str) -> bool {
        self.factories.contains_key(node_type)
    }

    /// Registered node types, sorted.
    pub fn node_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Create a node instance of the given type.
    pub fn create(&self, node_type: &str, config: &Value) -> Result<Box<dyn gyre_core::traits::Node>> {
        let factory = self
            .factories
            .get(node_type)
            .ok_or_else(|| GyreError::UnknownNodeType {
                node_type: node_type.to_string(),
            })?;
        factory.create(config)
    }
}

/// Compile a validated definition into an executable workflow.
///
/// Nodes are instantiated through the registry in name order, so node IDs
/// are stable across loads of the same definition.
pub fn load_workflow(definition: &WorkflowDefinition, registry: &NodeRegistry) -> Result<Workflow> {
    if let Err(errors) = definition.validate() {
        let summary: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        return Err(GyreError::InvalidTopology {
            cause: format!(
                "definition '{}' failed validation: {}",
                definition.name,
                summary.join("; ")
            ),
        });
    }

    let mut builder = WorkflowBuilder::new(definition.name.clone())
        .settings(definition.settings.clone());

    let mut names: Vec<&String> = definition.nodes.keys().collect();
    names.sort_unstable();

    for name in names {
        let node_def = &definition.nodes[name];
        let node = registry.create(&node_def.node_type, &node_def.config)?;
        builder = builder.node_arc(name.clone(), Arc::from(node), node_def.config.clone());
        if let Some(ms) = node_def.timeout_ms {
            builder = builder.node_timeout_ms(name.clone(), ms);
        }
    }

    for conn in &definition.connections {
        builder = builder.connect(Connection::from(conn));
    }

    builder.build()
}
