//! Node definition from YAML.

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// A node definition from YAML.
///
/// The definition names a node type (resolved through a factory registry)
/// and carries its frozen build-time configuration. Configuration is
/// immutable once the workflow is built.
///
/// # Example
///
/// ```yaml
/// nodes:
///   adjuster:
///     type: std::scale
///     description: Scale readings down each pass
///     config:
///       factor: 0.9
///
///   evaluator:
///     type: std::mean_check
///     config:
///       threshold: 100
///     timeout_ms: 5000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDefinition {
    /// Node type (e.g., "std::scale", "plugins::llm_refiner").
    #[serde(rename = "type")]
    pub node_type: String,

    /// Node-specific configuration, frozen at build time.
    #[serde(default)]
    pub config: Value,

    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,

    /// Timeout override for this node (milliseconds).
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl NodeDefinition {
    /// Create a new node definition.
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            config: Value::null(),
            description: None,
            timeout_ms: None,
        }
    }

    /// Set configuration.
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    /// Set description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Set timeout override.
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// Check if this is a standard library node.
    pub fn is_std(&self) -> bool {
        self.node_type.starts_with("std::")
    }

    /// Get a string config value.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.config.get_string(key)
    }

    /// Get a numeric config value.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.config.get_f64(key)
    }

    /// Get a boolean config value.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.config.get_bool(key)
    }
}
