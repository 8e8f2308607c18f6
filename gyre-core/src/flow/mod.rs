//! Workflow definition types for YAML deserialization.
//!
//! This module provides strongly-typed structures for parsing YAML
//! workflow definitions:
//!
//! - [`WorkflowDefinition`] - The top-level workflow document
//! - [`NodeDefinition`] - Individual node configuration
//! - [`ConnectionDefinition`] - Connection between nodes, with cycle metadata
//!
//! # Example YAML
//!
//! ```yaml
//! name: threshold_refinement
//! version: "1.0"
//! description: Scale readings down until the average is acceptable
//!
//! nodes:
//!   source:
//!     type: std::constant
//!     config:
//!       values: [110, 120, 130, 90, 80]
//!
//!   adjuster:
//!     type: std::scale
//!     config:
//!       factor: 0.9
//!
//!   evaluator:
//!     type: std::mean_check
//!     config:
//!       threshold: 100
//!
//! connections:
//!   - from: source.values
//!     to: adjuster.values
//!   - from: adjuster.values
//!     to: evaluator.values
//!     cycle: true
//!     cycle_id: refine
//!     max_iterations: 5
//!   - from: evaluator.values
//!     to: adjuster.values
//!     cycle: true
//!     cycle_id: refine
//!     max_iterations: 5
//!     convergence: "average <= 100"
//!
//! settings:
//!   max_concurrent_branches: 4
//!   node_timeout_ms: 30000
//! ```

mod connection;
mod definition;
mod node;
mod settings;
pub mod validation;

pub use connection::ConnectionDefinition;
pub use definition::{WorkflowDefinition, WorkflowLoadError};
pub use node::NodeDefinition;
pub use settings::WorkflowSettings;
pub use validation::{ValidationError, ValidationResult};
