//! Log collector for capturing and storing log events.

use super::event::{LogEvent, LogLevel};
use crate::types::{NodeId, RunId};
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Maximum number of events to keep in the default buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 10_000;

/// Trait for log event collectors.
pub trait LogCollector: Send + Sync {
    /// Collect a log event.
    fn collect(&self, event: LogEvent);

    /// Get the number of collected events.
    fn len(&self) -> usize;

    /// Check if the collector is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Thread-safe log collector with a bounded ring buffer.
///
/// Oldest events are evicted once capacity is reached.
pub struct BufferedCollector {
    /// Ring buffer of events.
    buffer: RwLock<VecDeque<LogEvent>>,
    /// Maximum buffer capacity.
    capacity: usize,
    /// Next event ID counter.
    next_id: AtomicU64,
}

impl BufferedCollector {
    /// Create a new collector with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a collector with default capacity.
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }

    /// Get the most recent N events.
    pub fn recent(&self, limit: usize) -> Vec<LogEvent> {
        let buffer = self.buffer.read();
        buffer.iter().rev().take(limit).cloned().collect()
    }

    /// Get events for a specific run.
    pub fn by_run(&self, run_id: RunId) -> Vec<LogEvent> {
        let buffer = self.buffer.read();
        buffer
            .iter()
            .filter(|e| e.run_id == Some(run_id))
            .cloned()
            .collect()
    }

    /// Get events for a specific node within a run.
    pub fn by_run_node(&self, run_id: RunId, node_id: NodeId) -> Vec<LogEvent> {
        let buffer = self.buffer.read();
        buffer
            .iter()
            .filter(|e| e.run_id == Some(run_id) && e.node_id == Some(node_id))
            .cloned()
            .collect()
    }

    /// Get events at or above a certain level.
    pub fn by_level(&self, min_level: LogLevel) -> Vec<LogEvent> {
        let buffer = self.buffer.read();
        buffer
            .iter()
            .filter(|e| e.level >= min_level)
            .cloned()
            .collect()
    }

    /// Get all events (up to capacity).
    pub fn all(&self) -> Vec<LogEvent> {
        let buffer = self.buffer.read();
        buffer.iter().cloned().collect()
    }

    /// Clear all events.
    pub fn clear(&self) {
        let mut buffer = self.buffer.write();
        buffer.clear();
    }

    /// Get buffer capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for BufferedCollector {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

impl LogCollector for BufferedCollector {
    fn collect(&self, mut event: LogEvent) {
        event.id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut buffer = self.buffer.write();
        if buffer.len() >= self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(event);
    }

    fn len(&self) -> usize {
        self.buffer.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogCategory;

    #[test]
    fn collector_assigns_ids() {
        let collector = BufferedCollector::with_default_capacity();
        collector.collect(LogEvent::info(LogCategory::System, "first"));
        collector.collect(LogEvent::info(LogCategory::System, "second"));

        let events = collector.all();
        assert_eq!(events.len(), 2);
        assert!(events[0].id < events[1].id);
    }

    #[test]
    fn ring_buffer_evicts_oldest() {
        let collector = BufferedCollector::new(2);
        collector.collect(LogEvent::info(LogCategory::System, "first"));
        collector.collect(LogEvent::info(LogCategory::System, "second"));
        collector.collect(LogEvent::info(LogCategory::System, "third"));

        let events = collector.all();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message, "second");
        assert_eq!(events[1].message, "third");
    }

    #[test]
    fn query_by_run() {
        let collector = BufferedCollector::with_default_capacity();
        let run_a = RunId::new();
        let run_b = RunId::new();

        collector.collect(LogEvent::info(LogCategory::Run, "a").with_run_id(run_a));
        collector.collect(LogEvent::info(LogCategory::Run, "b").with_run_id(run_b));

        let events = collector.by_run(run_a);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "a");
    }

    #[test]
    fn query_by_level() {
        let collector = BufferedCollector::with_default_capacity();
        collector.collect(LogEvent::debug(LogCategory::System, "noise"));
        collector.collect(LogEvent::warn(LogCategory::Parameter, "dropped"));
        collector.collect(LogEvent::error(LogCategory::Node, "failed"));

        let events = collector.by_level(LogLevel::Warn);
        assert_eq!(events.len(), 2);
    }
}
