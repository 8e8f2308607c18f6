//! Log event types for run execution logging.

use crate::types::{CycleId, NodeId, RunId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Log severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum LogLevel {
    /// Debugging information.
    Debug,
    /// Informational messages.
    #[default]
    Info,
    /// Warning messages.
    Warn,
    /// Error messages.
    Error,
}

impl LogLevel {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Category of log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    /// Run lifecycle events (start, complete, cancel).
    Run,
    /// Node execution events (start, complete, error).
    Node,
    /// Cycle iteration events (iterate, converge, exhaust).
    Cycle,
    /// Parameter resolution events (dropped parameters, defaults applied).
    Parameter,
    /// System/internal events.
    System,
}

impl LogCategory {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Node => "node",
            Self::Cycle => "cycle",
            Self::Parameter => "parameter",
            Self::System => "system",
        }
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A structured log event with correlation IDs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    /// Unique event ID, assigned by the collector.
    pub id: u64,
    /// Timestamp in nanoseconds since UNIX epoch.
    pub timestamp_ns: u64,
    /// Log severity level.
    pub level: LogLevel,
    /// Event category.
    pub category: LogCategory,
    /// Human-readable message.
    pub message: String,
    /// Correlated run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    /// Correlated node, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    /// Correlated cycle group, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_id: Option<CycleId>,
    /// Correlated iteration index, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,
    /// Additional structured fields.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, String>,
}

impl LogEvent {
    /// Create a new event at the given level.
    pub fn new(level: LogLevel, category: LogCategory, message: impl Into<String>) -> Self {
        let timestamp_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);

        Self {
            id: 0,
            timestamp_ns,
            level,
            category,
            message: message.into(),
            run_id: None,
            node_id: None,
            cycle_id: None,
            iteration: None,
            fields: HashMap::new(),
        }
    }

    /// Create a debug event.
    pub fn debug(category: LogCategory, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Debug, category, message)
    }

    /// Create an info event.
    pub fn info(category: LogCategory, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, category, message)
    }

    /// Create a warning event.
    pub fn warn(category: LogCategory, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warn, category, message)
    }

    /// Create an error event.
    pub fn error(category: LogCategory, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, category, message)
    }

    /// Attach a run ID.
    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Attach a node ID.
    pub fn with_node_id(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }

    /// Attach a cycle ID.
    pub fn with_cycle_id(mut self, cycle_id: CycleId) -> Self {
        self.cycle_id = Some(cycle_id);
        self
    }

    /// Attach an iteration index.
    pub fn with_iteration(mut self, iteration: u32) -> Self {
        self.iteration = Some(iteration);
        self
    }

    /// Attach a custom field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// Per-iteration observability event emitted by the cycle controller.
///
/// External monitoring systems consume these to track convergence
/// behavior; one event is emitted per node per iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationEvent {
    /// The cycle group being iterated.
    pub cycle_id: CycleId,
    /// 0-based iteration index.
    pub iteration: u32,
    /// The node that executed.
    pub node_id: NodeId,
    /// Node execution duration.
    pub duration: Duration,
    /// Whether this iteration satisfied the convergence condition.
    pub converged: bool,
}

impl IterationEvent {
    /// Convert into a structured log event.
    pub fn into_log_event(self, run_id: RunId) -> LogEvent {
        LogEvent::info(LogCategory::Cycle, "Cycle iteration")
            .with_run_id(run_id)
            .with_node_id(self.node_id)
            .with_cycle_id(self.cycle_id)
            .with_iteration(self.iteration)
            .with_field("duration_ms", self.duration.as_millis().to_string())
            .with_field("converged", self.converged.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_builder() {
        let event = LogEvent::info(LogCategory::Node, "Node completed")
            .with_node_id(NodeId::new(3))
            .with_iteration(2)
            .with_field("output_fields", "4");

        assert_eq!(event.level, LogLevel::Info);
        assert_eq!(event.node_id, Some(NodeId::new(3)));
        assert_eq!(event.iteration, Some(2));
        assert_eq!(event.fields.get("output_fields").unwrap(), "4");
    }

    #[test]
    fn level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn iteration_event_to_log_event() {
        let event = IterationEvent {
            cycle_id: CycleId::new("refine"),
            iteration: 3,
            node_id: NodeId::new(1),
            duration: Duration::from_millis(42),
            converged: true,
        };

        let log = event.into_log_event(RunId::new());
        assert_eq!(log.category, LogCategory::Cycle);
        assert_eq!(log.iteration, Some(3));
        assert_eq!(log.fields.get("converged").unwrap(), "true");
        assert_eq!(log.fields.get("duration_ms").unwrap(), "42");
    }
}
