//! Workflow definition validation.
//!
//! Validation is collect-all: every problem in a definition is reported in
//! one pass instead of failing on the first. Structural analysis that
//! needs the executable graph (SCC contraction, interior ordering) happens
//! later at graph build time; this layer catches everything expressible on
//! the declarative document alone.

mod error;
mod limits;
mod validator;

pub use error::{ValidationError, ValidationErrorKind};
pub use limits::ValidationLimits;
pub use validator::WorkflowValidator;

/// Result of validating a workflow definition.
pub type ValidationResult = Result<(), Vec<ValidationError>>;
