//! Error types for marga-plan.

use thiserror::Error;

/// Planning engine error type.
///
/// Every failure aborts the current top-level engine call; partial progress
/// (milestones inserted before the failure) stays in the planner.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown constraint: {0}")]
    UnknownConstraint(String),

    #[error("No {kind} predicate registered for constraint '{name}'")]
    MissingPredicate { kind: &'static str, name: String },

    #[error("Callback failed: {0}")]
    Callback(String),

    #[error("{0} configuration is infeasible")]
    InfeasibleEndpoint(&'static str),
}

pub type Result<T> = std::result::Result<T, PlanError>;

/// Error raised inside a host callback.
///
/// Converted into [`PlanError::Callback`] at the engine boundary so the
/// host's error text survives unchanged.
#[derive(Debug, Clone)]
pub struct CallbackError(pub String);

impl CallbackError {
    pub fn new(msg: impl Into<String>) -> Self {
        CallbackError(msg.into())
    }
}

impl std::fmt::Display for CallbackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for CallbackError {}

impl From<CallbackError> for PlanError {
    fn from(e: CallbackError) -> Self {
        PlanError::Callback(e.0)
    }
}

/// Result type for host callbacks.
pub type CallbackResult<T> = std::result::Result<T, CallbackError>;
