//! Structured logging for run execution.
//!
//! Provides log events with correlation IDs (run, node, cycle, iteration)
//! and a thread-safe buffered collector. The engine also mirrors
//! significant events to `tracing`; this module is the queryable,
//! machine-readable surface that monitoring systems consume.

mod collector;
mod event;

pub use collector::{BufferedCollector, DEFAULT_BUFFER_CAPACITY, LogCollector};
pub use event::{IterationEvent, LogCategory, LogEvent, LogLevel};
