//! Workflow definition - the top-level YAML document.

use super::validation::{ValidationLimits, ValidationResult, WorkflowValidator};
use super::{ConnectionDefinition, NodeDefinition, WorkflowSettings};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A complete workflow definition from YAML.
///
/// This is the top-level structure representing a GYRE workflow document.
///
/// # Example
///
/// ```yaml
/// name: threshold_refinement
/// version: "1.0"
/// description: Scale readings down until the average is acceptable
///
/// nodes:
///   source:
///     type: std::constant
///     config:
///       values: [110, 120, 130, 90, 80]
///
///   adjuster:
///     type: std::scale
///     config:
///       factor: 0.9
///
///   evaluator:
///     type: std::mean_check
///     config:
///       threshold: 100
///
/// connections:
///   - from: source.values
///     to: adjuster.values
///   - from: adjuster.values
///     to: evaluator.values
///     cycle: true
///     cycle_id: refine
///     max_iterations: 5
///   - from: evaluator.values
///     to: adjuster.values
///     cycle: true
///     cycle_id: refine
///     max_iterations: 5
///     convergence: "average <= 100"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Workflow name (required).
    pub name: String,

    /// Workflow version (optional, defaults to "1.0").
    #[serde(default)]
    pub version: Option<String>,

    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,

    /// Nodes in the workflow, keyed by node ID.
    #[serde(default)]
    pub nodes: HashMap<String, NodeDefinition>,

    /// Connections between nodes.
    #[serde(default)]
    pub connections: Vec<ConnectionDefinition>,

    /// Runtime settings.
    #[serde(default)]
    pub settings: WorkflowSettings,
}

impl WorkflowDefinition {
    /// Create a new workflow definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Some("1.0".to_string()),
            description: None,
            nodes: HashMap::new(),
            connections: Vec::new(),
            settings: WorkflowSettings::default(),
        }
    }

    /// Parse a workflow definition from YAML string.
    ///
    /// Note: This method does not validate size or depth limits.
    /// For untrusted input, use `from_yaml_validated`.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Parse a workflow definition from YAML string with security limits.
    pub fn from_yaml_with_limits(
        yaml: &str,
        limits: &ValidationLimits,
    ) -> Result<Self, WorkflowLoadError> {
        // Content size is checked BEFORE parsing (DoS protection).
        limits
            .validate_content_size(yaml)
            .map_err(|e| WorkflowLoadError::LimitExceeded { error: e })?;

        let value: serde_yaml::Value =
            serde_yaml::from_str(yaml).map_err(|e| WorkflowLoadError::ParseString { source: e })?;

        limits
            .validate_nesting_depth(&value)
            .map_err(|e| WorkflowLoadError::LimitExceeded { error: e })?;

        serde_yaml::from_value(value).map_err(|e| WorkflowLoadError::ParseString { source: e })
    }

    /// Parse a workflow definition from a YAML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, WorkflowLoadError> {
        Self::from_file_with_limits(path, &ValidationLimits::default())
    }

    /// Parse a workflow definition from a YAML file with security limits.
    pub fn from_file_with_limits(
        path: &std::path::Path,
        limits: &ValidationLimits,
    ) -> Result<Self, WorkflowLoadError> {
        let metadata = std::fs::metadata(path).map_err(|e| WorkflowLoadError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        if metadata.len() as usize > limits.max_file_size {
            return Err(WorkflowLoadError::LimitExceeded {
                error: super::validation::ValidationError::new(
                    super::validation::ValidationErrorKind::LimitExceeded,
                    "workflow",
                    format!(
                        "file size ({} bytes) exceeds maximum allowed ({} bytes)",
                        metadata.len(),
                        limits.max_file_size
                    ),
                ),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| WorkflowLoadError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::from_yaml_with_limits(&content, limits)
    }

    /// Serialize to YAML string.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Validate the workflow definition.
    pub fn validate(&self) -> ValidationResult {
        WorkflowValidator::new().validate(self)
    }

    /// Parse and validate in one step with default limits.
    ///
    /// This is the recommended entry point for untrusted YAML: size and
    /// depth are checked before parsing, counts and semantics after.
    pub fn from_yaml_validated(yaml: &str) -> Result<Self, WorkflowLoadError> {
        Self::from_yaml_validated_with_limits(yaml, &ValidationLimits::default())
    }

    /// Parse and validate in one step with custom limits.
    pub fn from_yaml_validated_with_limits(
        yaml: &str,
        limits: &ValidationLimits,
    ) -> Result<Self, WorkflowLoadError> {
        let workflow = Self::from_yaml_with_limits(yaml, limits)?;

        WorkflowValidator::with_limits(limits.clone())
            .validate(&workflow)
            .map_err(|errors| WorkflowLoadError::Validation { errors })?;

        Ok(workflow)
    }

    /// Set version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Add a node.
    pub fn with_node(mut self, id: impl Into<String>, node: NodeDefinition) -> Self {
        self.nodes.insert(id.into(), node);
        self
    }

    /// Add a connection.
    pub fn with_connection(mut self, connection: ConnectionDefinition) -> Self {
        self.connections.push(connection);
        self
    }

    /// Set settings.
    pub fn with_settings(mut self, settings: WorkflowSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Get the effective version (defaults to "1.0").
    pub fn effective_version(&self) -> &str {
        self.version.as_deref().unwrap_or("1.0")
    }

    /// Get a node by ID.
    pub fn get_node(&self, id: &str) -> Option<&NodeDefinition> {
        self.nodes.get(id)
    }

    /// Check if a node with the given ID exists.
    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Find connections from a given node.
    pub fn connections_from<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a ConnectionDefinition> + 'a {
        self.connections
            .iter()
            .filter(move |c| c.from_node() == node_id)
    }

    /// Find connections to a given node.
    pub fn connections_to<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a ConnectionDefinition> + 'a {
        self.connections
            .iter()
            .filter(move |c| c.to_node() == node_id)
    }

    /// Find cycle-marked connections belonging to a cycle group.
    pub fn cycle_connections<'a>(&'a self, cycle_id: &'a str) -> impl Iterator<Item = &'a ConnectionDefinition> + 'a {
        self.connections
            .iter()
            .filter(move |c| c.cycle && c.cycle_id.as_deref() == Some(cycle_id))
    }
}

/// Error loading a workflow definition.
#[derive(Debug)]
pub enum WorkflowLoadError {
    /// I/O error reading file.
    Io {
        /// Path to the file that couldn't be read.
        path: std::path::PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// YAML parse error.
    ParseString {
        /// The underlying YAML parse error.
        source: serde_yaml::Error,
    },
    /// Workflow validation failed with one or more errors.
    Validation {
        /// List of validation errors found in the workflow.
        errors: Vec<super::validation::ValidationError>,
    },
    /// Validation limit exceeded (size, depth, or count).
    LimitExceeded {
        /// The specific limit that was exceeded.
        error: super::validation::ValidationError,
    },
}

impl std::fmt::Display for WorkflowLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(
                    f,
                    "failed to read workflow file '{}': {}",
                    path.display(),
                    source
                )
            }
            Self::ParseString { source } => {
                write!(f, "failed to parse YAML: {}", source)
            }
            Self::Validation { errors } => {
                writeln!(
                    f,
                    "workflow validation failed with {} error(s):",
                    errors.len()
                )?;
                for error in errors {
                    writeln!(f, "  - {}", error)?;
                }
                Ok(())
            }
            Self::LimitExceeded { error } => {
                write!(f, "workflow validation limit exceeded: {}", error)
            }
        }
    }
}

impl std::error::Error for WorkflowLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::ParseString { source } => Some(source),
            Self::Validation { .. } => None,
            Self::LimitExceeded { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const REFINEMENT_YAML: &str = r#"
name: threshold_refinement
version: "2.0"
description: Scale readings down until the average is acceptable

nodes:
  source:
    type: std::constant
    config:
      values: [110, 120, 130, 90, 80]

  adjuster:
    type: std::scale
    config:
      factor: 0.9

  evaluator:
    type: std::mean_check
    config:
      threshold: 100

connections:
  - from: source.values
    to: adjuster.values
  - from: adjuster.values
    to: evaluator.values
    cycle: true
    cycle_id: refine
    max_iterations: 5
  - from: evaluator.values
    to: adjuster.values
    cycle: true
    cycle_id: refine
    max_iterations: 5
    convergence: "average <= 100"

settings:
  max_concurrent_branches: 4
  node_timeout_ms: 10000
"#;

    #[test]
    fn parse_complete_workflow() {
        let workflow = WorkflowDefinition::from_yaml(REFINEMENT_YAML).unwrap();

        assert_eq!(workflow.name, "threshold_refinement");
        assert_eq!(workflow.version, Some("2.0".to_string()));

        assert_eq!(workflow.nodes.len(), 3);
        assert!(workflow.has_node("source"));
        assert!(workflow.has_node("adjuster"));
        assert!(workflow.has_node("evaluator"));

        assert_eq!(workflow.connections.len(), 3);
        let back_edge = &workflow.connections[2];
        assert!(back_edge.cycle);
        assert_eq!(back_edge.max_iterations, Some(5));

        assert_eq!(workflow.settings.max_concurrent_branches, 4);
        assert_eq!(workflow.settings.node_timeout_ms, 10000);
    }

    #[test]
    fn parse_minimal_workflow() {
        let yaml = "name: simple";
        let workflow = WorkflowDefinition::from_yaml(yaml).unwrap();
        assert_eq!(workflow.name, "simple");
        assert!(workflow.nodes.is_empty());
        assert!(workflow.connections.is_empty());
    }

    #[test]
    fn validated_parse_accepts_good_workflow() {
        assert!(WorkflowDefinition::from_yaml_validated(REFINEMENT_YAML).is_ok());
    }

    #[test]
    fn unbounded_cycle_rejected() {
        let yaml = r#"
name: bad
nodes:
  a:
    type: std::constant
  b:
    type: std::scale
connections:
  - from: a
    to: b
  - from: b
    to: a
    cycle: true
    cycle_id: loop
"#;
        let result = WorkflowDefinition::from_yaml_validated(yaml);
        let Err(WorkflowLoadError::Validation { errors }) = result else {
            panic!("expected validation failure");
        };
        assert!(errors.iter().any(|e| e.message.contains("max_iterations")));
    }

    #[test]
    fn malformed_convergence_rejected() {
        let yaml = r#"
name: bad
nodes:
  a:
    type: std::constant
  b:
    type: std::scale
connections:
  - from: a
    to: b
  - from: b
    to: a
    cycle: true
    cycle_id: loop
    max_iterations: 3
    convergence: "average <= "
"#;
        let result = WorkflowDefinition::from_yaml_validated(yaml);
        let Err(WorkflowLoadError::Validation { errors }) = result else {
            panic!("expected validation failure");
        };
        assert!(errors.iter().any(|e| e.location.contains("convergence")));
    }

    #[test]
    fn unknown_reference_rejected() {
        let yaml = r#"
name: bad
nodes:
  a:
    type: std::constant
connections:
  - from: a
    to: ghost
"#;
        let result = WorkflowDefinition::from_yaml_validated(yaml);
        assert!(matches!(
            result,
            Err(WorkflowLoadError::Validation { .. })
        ));
    }

    #[test]
    fn workflow_builder() {
        let workflow = WorkflowDefinition::new("built")
            .with_version("1.0.0")
            .with_description("Built programmatically")
            .with_node("a", NodeDefinition::new("std::constant"))
            .with_node("b", NodeDefinition::new("std::scale"))
            .with_connection(ConnectionDefinition::new("a", "b"));

        assert_eq!(workflow.name, "built");
        assert_eq!(workflow.nodes.len(), 2);
        assert_eq!(workflow.connections.len(), 1);
        assert!(workflow.validate().is_ok());
    }

    #[test]
    fn to_yaml_roundtrip() {
        let workflow = WorkflowDefinition::new("roundtrip")
            .with_node("a", NodeDefinition::new("std::constant"));

        let yaml = workflow.to_yaml().unwrap();
        let parsed = WorkflowDefinition::from_yaml(&yaml).unwrap();

        assert_eq!(parsed.name, "roundtrip");
        assert_eq!(parsed.nodes.len(), 1);
    }

    #[test]
    fn query_methods() {
        let workflow = WorkflowDefinition::from_yaml(REFINEMENT_YAML).unwrap();

        let from_evaluator: Vec<_> = workflow.connections_from("evaluator").collect();
        assert_eq!(from_evaluator.len(), 1);

        let to_adjuster: Vec<_> = workflow.connections_to("adjuster").collect();
        assert_eq!(to_adjuster.len(), 2);

        let cycle_edges: Vec<_> = workflow.cycle_connections("refine").collect();
        assert_eq!(cycle_edges.len(), 2);
    }

    #[test]
    fn from_file_reads_and_validates_size() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", REFINEMENT_YAML).unwrap();

        let workflow = WorkflowDefinition::from_file(file.path()).unwrap();
        assert_eq!(workflow.name, "threshold_refinement");

        let tight = ValidationLimits {
            max_file_size: 8,
            ..Default::default()
        };
        let result = WorkflowDefinition::from_file_with_limits(file.path(), &tight);
        assert!(matches!(
            result,
            Err(WorkflowLoadError::LimitExceeded { .. })
        ));
    }
}
