use serde::{Deserialize, Serialize};
use std::fmt;

use mas_core::{IntentionId, Trigger};

/// Pending event of one agent.
///
/// External events start a new intention when a plan is selected for them;
/// internal events were posted by an intention (`!g`, `?b` fallback, goal
/// failure) and push onto it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub trigger: Trigger,
    pub intention: Option<IntentionId>,
}

impl Event {
    pub fn external(trigger: Trigger) -> Self {
        Self {
            trigger,
            intention: None,
        }
    }

    pub fn internal(trigger: Trigger, intention: IntentionId) -> Self {
        Self {
            trigger,
            intention: Some(intention),
        }
    }

    pub fn is_external(&self) -> bool {
        self.intention.is_none()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.intention {
            Some(id) => write!(f, "{} ({})", self.trigger, id),
            None => write!(f, "{}", self.trigger),
        }
    }
}
