use async_trait::async_trait;

use crate::error::ActionError;
use crate::id::AgentName;
use crate::term::Literal;

/// Shared world state that agents perceive and act upon.
///
/// The scheduler owns the environment and is its only caller, so actions
/// are applied one at a time in scheduler order. Implementations never see
/// concurrent mutation.
#[async_trait]
pub trait Environment: Send + Sync {
    /// Current percepts of `agent`, without annotations. The agent tags
    /// them with `source(percept)` during belief revision.
    async fn perceive(&self, agent: &AgentName) -> Vec<Literal>;

    /// Applies `action` on behalf of `agent`.
    async fn act(&mut self, agent: &AgentName, action: &Literal) -> Result<(), ActionError>;

    fn register_agent(&mut self, _agent: &AgentName) {}

    fn remove_agent(&mut self, _agent: &AgentName) {}

    /// Counter bumped whenever observable state changes. Agents whose last
    /// perception is older than this perceive again.
    fn revision(&self) -> u64 {
        0
    }
}

/// Environment with nothing to perceive; every action fails.
#[derive(Debug, Default)]
pub struct NullEnvironment;

#[async_trait]
impl Environment for NullEnvironment {
    async fn perceive(&self, _agent: &AgentName) -> Vec<Literal> {
        Vec::new()
    }

    async fn act(&mut self, _agent: &AgentName, action: &Literal) -> Result<(), ActionError> {
        Err(ActionError::UnknownAction(action.to_string()))
    }
}
