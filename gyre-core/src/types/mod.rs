//! Strongly-typed identifiers and shared primitives.

mod ids;

pub use ids::{CycleId, NodeId, RunId};
