//! GYRE Core Library
//!
//! This crate provides the foundational types, traits, and implementations
//! for the GYRE workflow engine.
//!
//! # Overview
//!
//! GYRE is a convergence-driven workflow engine: workflows are dependency
//! graphs whose explicitly marked feedback subgraphs (cycle groups) are
//! re-executed until a convergence condition holds, an iteration or time
//! budget is exhausted, or the run is cancelled.
//!
//! # Key Components
//!
//! - **Contract**: Declared parameter surface of a node; undeclared inputs
//!   are dropped at injection
//! - **Flow**: Strongly-typed workflow definitions with validation
//! - **Expr**: Sandboxed convergence expression evaluator
//! - **State**: Per-run store for cycle-carried node state
//! - **Traits**: The two-method node interface and its execution context
//!
//! # Example
//!
//! ```ignore
//! use gyre_core::prelude::*;
//!
//! let workflow = WorkflowDefinition::from_yaml_validated(yaml)?;
//! let expr = ConvergenceExpr::parse("average <= 100")?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod contract;
pub mod error;
pub mod expr;
pub mod flow;
pub mod logging;
pub mod prelude;
pub mod state;
pub mod traits;
pub mod types;
pub mod value;

// Re-export key types at crate root for convenience
pub use contract::{ParamSpec, ParamType, ParameterContract};
pub use error::{GyreError, Result};
pub use expr::ConvergenceExpr;
pub use flow::{ConnectionDefinition, NodeDefinition, WorkflowDefinition, WorkflowSettings};
pub use state::StateStore;
pub use traits::{CancelFlag, ExecutionContext, Node, NodeFactory, NodeFuture, NodeOutputs};
pub use types::{CycleId, NodeId, RunId};
pub use value::Value;
