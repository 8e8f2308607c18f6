//! Structural limits for untrusted workflow documents.

use super::error::{ValidationError, ValidationErrorKind};

/// Limits applied while parsing and validating a workflow definition.
///
/// Definitions may come from untrusted sources; these bounds reject
/// oversized or deeply-nested documents before they can exhaust memory or
/// the stack.
#[derive(Debug, Clone)]
pub struct ValidationLimits {
    /// Maximum YAML content size in bytes.
    pub max_content_size: usize,
    /// Maximum definition file size in bytes.
    pub max_file_size: usize,
    /// Maximum nesting depth of the document.
    pub max_nesting_depth: usize,
    /// Maximum number of nodes.
    pub max_node_count: usize,
    /// Maximum number of connections.
    pub max_connection_count: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_content_size: 10 * 1024 * 1024,
            max_file_size: 10 * 1024 * 1024,
            max_nesting_depth: 100,
            max_node_count: 1_000,
            max_connection_count: 5_000,
        }
    }
}

impl ValidationLimits {
    /// Check content size before parsing.
    pub fn validate_content_size(&self, content: &str) -> Result<(), ValidationError> {
        if content.len() > self.max_content_size {
            return Err(ValidationError::new(
                ValidationErrorKind::LimitExceeded,
                "workflow",
                format!(
                    "content size ({} bytes) exceeds maximum allowed ({} bytes)",
                    content.len(),
                    self.max_content_size
                ),
            ));
        }
        Ok(())
    }

    /// Check nesting depth of a parsed document.
    pub fn validate_nesting_depth(&self, value: &serde_yaml::Value) -> Result<(), ValidationError> {
        let depth = nesting_depth(value, 0, self.max_nesting_depth);
        if depth > self.max_nesting_depth {
            return Err(ValidationError::new(
                ValidationErrorKind::LimitExceeded,
                "workflow",
                format!(
                    "nesting depth exceeds maximum allowed ({})",
                    self.max_nesting_depth
                ),
            ));
        }
        Ok(())
    }
}

/// Compute nesting depth, giving up early once `limit` is exceeded.
fn nesting_depth(value: &serde_yaml::Value, current: usize, limit: usize) -> usize {
    if current > limit {
        return current;
    }
    match value {
        serde_yaml::Value::Mapping(map) => map
            .values()
            .map(|v| nesting_depth(v, current + 1, limit))
            .max()
            .unwrap_or(current + 1),
        serde_yaml::Value::Sequence(seq) => seq
            .iter()
            .map(|v| nesting_depth(v, current + 1, limit))
            .max()
            .unwrap_or(current + 1),
        _ => current,
    }
}
