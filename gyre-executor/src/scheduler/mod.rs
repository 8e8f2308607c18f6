//! Condensed-graph scheduler and execution engine.
//!
//! This module provides the core scheduling infrastructure:
//! - [`WorkflowGraph`] - index-based graph over nodes and connections
//! - [`CondensedGraph`] - cycle groups contracted to schedulable units
//! - [`Engine`] - run execution over the condensation
//!
//! Linear units execute directly in dependency order; contracted cycle
//! groups are delegated to the cycle controller. Independent units run
//! concurrently on a bounded worker pool.

pub mod engine;
pub mod graph;

pub use engine::{Engine, EngineConfig};
pub use graph::{
    CondensedGraph, Convergence, ConvergenceCallback, CycleGroup, CycleMarker, Edge, ScheduleUnit,
    WorkflowGraph,
};
