use thiserror::Error;

/// Errors raised by the term model: evaluation, conversion and parsing of
/// the small vocabularies (performatives, policies) shared by every crate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Arithmetic or comparison over a variable with no binding
    #[error("Unbound variable: {0}")]
    Unbound(String),

    /// Operand has the wrong shape for the operation
    #[error("Type error: {0}")]
    TypeError(String),

    /// Division or modulo by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Term cannot be used where a literal is required
    #[error("Not a literal: {0}")]
    NotALiteral(String),

    /// Unrecognised speech-act performative
    #[error("Invalid performative: {0}")]
    InvalidPerformative(String),

    /// Unrecognised policy name in configuration
    #[error("Invalid policy '{value}' for {kind}")]
    InvalidPolicy { kind: &'static str, value: String },
}

/// Convenience Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Outcome of a failed environment action.
///
/// Action failures are recoverable: the scheduler turns them into goal
/// failure events for the acting agent.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    /// The environment does not implement this action
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// The action exists but its arguments are unusable
    #[error("Invalid arguments for {action}: {reason}")]
    InvalidArguments { action: String, reason: String },

    /// The acting agent is not known to the environment
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    /// The action ran and reported failure
    #[error("Action {action} failed: {reason}")]
    Failed { action: String, reason: String },
}

impl ActionError {
    pub fn invalid(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            action: action.into(),
            reason: reason.into(),
        }
    }

    pub fn failed(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            action: action.into(),
            reason: reason.into(),
        }
    }
}
