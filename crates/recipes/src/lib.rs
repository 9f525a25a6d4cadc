//! Workflow recipes: authored step sequences and their runtime cursor.
//!
//! Workflows are validated before use, step checks come from a closed set
//! of kinds evaluated by a fixed interpreter, and a [`WorkflowSession`]
//! bumps the step clock on every move.

pub mod catalog;
pub mod errors;
pub mod interpreter;
pub mod model;
pub mod optimize;
pub mod session;

pub use catalog::WorkflowCatalog;
pub use errors::{RecipeError, RecipeErrorKind, Result};
pub use interpreter::{evaluate, evaluate_spec, step_complete};
pub use model::{
    generate_id, Validation, ValidationSpec, Workflow, WorkflowFormat, WorkflowStep,
    DEFAULT_VERSION,
};
pub use optimize::{optimize, Optimization, OptimizationKind, RunStats};
pub use session::{StepPosition, WorkflowSession};
