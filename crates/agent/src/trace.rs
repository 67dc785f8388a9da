use serde::{Deserialize, Serialize};
use std::fmt;

use mas_core::{AgentName, IntentionId, MessageId, Performative};

/// Observable decision taken during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceEvent {
    Perceived {
        added: usize,
        removed: usize,
    },
    MessageReceived {
        id: MessageId,
        from: AgentName,
        performative: Performative,
        content: String,
    },
    MessageSent {
        id: MessageId,
        to: AgentName,
        performative: Performative,
        content: String,
    },
    UnknownRecipient {
        to: AgentName,
        content: String,
    },
    PlanSelected {
        intention: IntentionId,
        trigger: String,
        plan: String,
    },
    NoApplicablePlan {
        trigger: String,
    },
    EventDiscarded {
        trigger: String,
    },
    BeliefAdded {
        belief: String,
    },
    BeliefRemoved {
        belief: String,
    },
    ActionIssued {
        intention: IntentionId,
        action: String,
    },
    ActionCompleted {
        intention: IntentionId,
        action: String,
        success: bool,
    },
    Printed {
        text: String,
    },
    IntentionFinished {
        intention: IntentionId,
    },
    IntentionFailed {
        intention: IntentionId,
        reason: String,
    },
    IntentionDropped {
        intention: IntentionId,
    },
    AgentKilled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub round: u64,
    pub agent: AgentName,
    #[serde(flatten)]
    pub event: TraceEvent,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:>5}] {:<12} ", self.round, self.agent.as_str())?;
        match &self.event {
            TraceEvent::Perceived { added, removed } => {
                write!(f, "perceived +{} -{}", added, removed)
            }
            TraceEvent::MessageReceived {
                id,
                from,
                performative,
                content,
            } => write!(f, "received {} {} {} from {}", id, performative, content, from),
            TraceEvent::MessageSent {
                id,
                to,
                performative,
                content,
            } => write!(f, "sent {} {} {} to {}", id, performative, content, to),
            TraceEvent::UnknownRecipient { to, content } => {
                write!(f, "unknown recipient {} for {}", to, content)
            }
            TraceEvent::PlanSelected {
                intention,
                trigger,
                plan,
            } => write!(f, "{} selected {} for {}", intention, plan, trigger),
            TraceEvent::NoApplicablePlan { trigger } => write!(f, "no applicable plan for {}", trigger),
            TraceEvent::EventDiscarded { trigger } => write!(f, "discarded {}", trigger),
            TraceEvent::BeliefAdded { belief } => write!(f, "+{}", belief),
            TraceEvent::BeliefRemoved { belief } => write!(f, "-{}", belief),
            TraceEvent::ActionIssued { intention, action } => {
                write!(f, "{} act {}", intention, action)
            }
            TraceEvent::ActionCompleted {
                intention,
                action,
                success,
            } => write!(
                f,
                "{} {} {}",
                intention,
                action,
                if *success { "done" } else { "failed" }
            ),
            TraceEvent::Printed { text } => write!(f, "print {}", text),
            TraceEvent::IntentionFinished { intention } => write!(f, "{} finished", intention),
            TraceEvent::IntentionFailed { intention, reason } => {
                write!(f, "{} failed: {}", intention, reason)
            }
            TraceEvent::IntentionDropped { intention } => write!(f, "{} dropped", intention),
            TraceEvent::AgentKilled => f.write_str("killed"),
        }
    }
}

/// Append-only record of a run.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    enabled: bool,
    entries: Vec<TraceEntry>,
}

impl Trace {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: Vec::new(),
        }
    }

    pub fn record(&mut self, round: u64, agent: &AgentName, event: TraceEvent) {
        if self.enabled {
            self.entries.push(TraceEntry {
                round,
                agent: agent.clone(),
                event,
            });
        }
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries of one agent, in order.
    pub fn for_agent<'a>(&'a self, agent: &'a AgentName) -> impl Iterator<Item = &'a TraceEntry> {
        self.entries.iter().filter(move |e| &e.agent == agent)
    }

    /// One JSON object per line.
    pub fn to_json_lines(&self) -> serde_json::Result<String> {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&serde_json::to_string(entry)?);
            out.push('\n');
        }
        Ok(out)
    }
}
