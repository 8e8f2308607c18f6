//! Prelude for convenient imports.
//!
//! This module re-exports the most commonly used types and traits.
//!
//! # Example
//!
//! ```ignore
//! use gyre_core::prelude::*;
//! ```

// Core types
pub use crate::types::{CycleId, NodeId, RunId};

// Error handling
pub use crate::error::{GyreError, Result};

// Values and contracts
pub use crate::contract::{ParamSpec, ParamType, ParameterContract};
pub use crate::value::Value;

// Node interface
pub use crate::traits::{CancelFlag, ExecutionContext, Node, NodeFactory, NodeFuture, NodeOutputs};

// Flow definitions
pub use crate::flow::{
    ConnectionDefinition, NodeDefinition, ValidationError, ValidationResult, WorkflowDefinition,
    WorkflowSettings,
};

// Convergence expressions
pub use crate::expr::ConvergenceExpr;

// State store
pub use crate::state::StateStore;

// Logging
pub use crate::logging::{
    BufferedCollector, IterationEvent, LogCategory, LogCollector, LogEvent, LogLevel,
};
