use thiserror::Error;

use mas_core::{ActionError, AgentName, CoreError};
use mas_lang::SystemError;

/// Errors raised while agents reason and while the scheduler runs them.
///
/// Only load-time errors (`System`) are fatal. Everything an intention can
/// run into is turned into a goal failure event for the owning agent; the
/// [`AgentError::kind`] of the error becomes the `error(Kind)` annotation.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No plan is applicable for a goal event
    #[error("No applicable plan for {0}")]
    NoApplicablePlan(String),

    /// Message addressed to an agent that does not exist
    #[error("Unknown recipient: {0}")]
    UnknownRecipient(AgentName),

    /// Environment rejected an action
    #[error("Action failed: {0}")]
    ActionFailure(#[from] ActionError),

    /// `?b` found no matching belief and no `+?b` plan
    #[error("Test goal failed: {0}")]
    TestGoalFailed(String),

    /// Body constraint did not hold
    #[error("Constraint failed: {0}")]
    ConstraintFailed(String),

    #[error("Unknown internal action: .{0}")]
    UnknownInternalAction(String),

    #[error("Invalid arguments for .{action}: {reason}")]
    InvalidArguments { action: String, reason: String },

    /// Internal action ran and reported failure (`.fail` among others)
    #[error("Internal action .{action} failed: {reason}")]
    InternalActionFailed { action: String, reason: String },

    #[error("Agent not found: {0}")]
    AgentNotFound(AgentName),

    #[error("Agent already exists: {0}")]
    AgentAlreadyExists(AgentName),

    /// Initial belief with unbound variables
    #[error("Belief {belief} of agent {agent} is not ground")]
    NonGroundBelief { agent: AgentName, belief: String },

    /// The scheduler owning a handle has been dropped
    #[error("Scheduler channel closed")]
    ChannelClosed,

    #[error("Evaluation error: {0}")]
    Core(#[from] CoreError),

    #[error(transparent)]
    System(#[from] SystemError),
}

impl AgentError {
    pub fn invalid(action: impl Into<String>, reason: impl Into<String>) -> Self {
        AgentError::InvalidArguments {
            action: action.into(),
            reason: reason.into(),
        }
    }

    pub fn failed(action: impl Into<String>, reason: impl Into<String>) -> Self {
        AgentError::InternalActionFailed {
            action: action.into(),
            reason: reason.into(),
        }
    }

    /// Atom used in the `error(Kind)` annotation of goal failure events.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::NoApplicablePlan(_) => "no_applicable",
            AgentError::UnknownRecipient(_) => "unknown_recipient",
            AgentError::ActionFailure(_) => "action_failed",
            AgentError::TestGoalFailed(_) => "test_goal_failed",
            AgentError::ConstraintFailed(_) => "constraint_failed",
            AgentError::UnknownInternalAction(_) => "unknown_internal_action",
            AgentError::InvalidArguments { .. } => "wrong_arguments",
            AgentError::InternalActionFailed { .. } => "ia_failed",
            AgentError::AgentNotFound(_)
            | AgentError::AgentAlreadyExists(_)
            | AgentError::NonGroundBelief { .. } => "agent",
            AgentError::ChannelClosed => "channel_closed",
            AgentError::Core(_) => "eval_error",
            AgentError::System(_) => "system",
        }
    }
}

/// Convenience Result type for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;
