//! Workflow runtime settings from YAML.

use serde::{Deserialize, Serialize};

/// Runtime settings for a workflow.
///
/// These settings control execution behavior like branch concurrency and
/// timeouts. Cycle-specific limits live on the cycle-marked connections,
/// not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    /// Maximum independent branches executing concurrently.
    #[serde(default = "default_max_concurrent_branches")]
    pub max_concurrent_branches: usize,

    /// Default per-node execution timeout in milliseconds.
    #[serde(default = "default_node_timeout_ms")]
    pub node_timeout_ms: u64,

    /// Optional wall-clock budget for the whole run, in milliseconds.
    #[serde(default)]
    pub run_timeout_ms: Option<u64>,
}

fn default_max_concurrent_branches() -> usize {
    8
}
fn default_node_timeout_ms() -> u64 {
    30_000
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            max_concurrent_branches: default_max_concurrent_branches(),
            node_timeout_ms: default_node_timeout_ms(),
            run_timeout_ms: None,
        }
    }
}

impl WorkflowSettings {
    /// Set the branch concurrency limit.
    pub fn with_max_concurrent_branches(mut self, max: usize) -> Self {
        self.max_concurrent_branches = max.max(1);
        self
    }

    /// Set the default node timeout.
    pub fn with_node_timeout_ms(mut self, ms: u64) -> Self {
        self.node_timeout_ms = ms;
        self
    }

    /// Set the run-level timeout.
    pub fn with_run_timeout_ms(mut self, ms: u64) -> Self {
        self.run_timeout_ms = Some(ms);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = WorkflowSettings::default();
        assert_eq!(settings.max_concurrent_branches, 8);
        assert_eq!(settings.node_timeout_ms, 30_000);
        assert!(settings.run_timeout_ms.is_none());
    }

    #[test]
    fn deserialize_partial() {
        let yaml = "max_concurrent_branches: 2";
        let settings: WorkflowSettings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.max_concurrent_branches, 2);
        assert_eq!(settings.node_timeout_ms, 30_000);
    }

    #[test]
    fn builder_floors_concurrency_at_one() {
        let settings = WorkflowSettings::default().with_max_concurrent_branches(0);
        assert_eq!(settings.max_concurrent_branches, 1);
    }
}
