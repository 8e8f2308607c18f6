//! GYRE Executor - Run execution engine.
//!
//! This crate provides the execution infrastructure for GYRE:
//! - Graph analysis: strongly-connected components contracted into cycle
//!   groups, condensed-DAG topological scheduling
//! - Cycle controller driving convergence-checked iteration
//! - Parameter resolver enforcing node contracts
//! - Workflow builder and definition loader
//!
//! # Example
//!
//! ```ignore
//! use gyre_executor::prelude::*;
//!
//! let workflow = WorkflowBuilder::new("refinement")
//!     .node("source", SourceNode::default(), Value::null())
//!     .node("adjuster", ScaleNode::default(), Value::null())
//!     .connect(Connection::new("source.values", "adjuster.values"))
//!     .build()?;
//!
//! let engine = Engine::new();
//! let report = engine.execute(&workflow, RunParameters::new()).await?;
//! ```

#![warn(missing_docs)]

pub mod cycle;
pub mod loader;
pub mod report;
pub mod resolver;
pub mod run;
pub mod scheduler;
pub mod workflow;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::cycle::CycleOutcome;
    pub use crate::loader::{NodeRegistry, load_workflow};
    pub use crate::report::{CycleReport, CycleStatus, NodeResult, RunReport, RunStatus};
    pub use crate::resolver::ParameterResolver;
    pub use crate::run::{RunParameters, RunState};
    pub use crate::scheduler::{
        CondensedGraph, Convergence, ConvergenceCallback, CycleGroup, CycleMarker, Edge, Engine,
        EngineConfig, ScheduleUnit, WorkflowGraph,
    };
    pub use crate::workflow::{Connection, Workflow, WorkflowBuilder};
}
