use mas_core::{AgentName, IdGen, IntentionId, Literal, Performative, SchedulingPolicy};

use crate::builtin::ActionRegistry;
use crate::trace::TraceEvent;

#[derive(Debug, Clone, PartialEq)]
pub enum Recipient {
    Agent(AgentName),
    /// Every other live agent
    All,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub to: Recipient,
    pub performative: Performative,
    pub content: Literal,
}

/// Environment action requested by an intention.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAction {
    pub intention: IntentionId,
    pub action: Literal,
}

/// `.wait` suspension; completes `rounds` rounds after it was issued.
#[derive(Debug, Clone, PartialEq)]
pub struct Timer {
    pub intention: IntentionId,
    pub action: Literal,
    pub rounds: u64,
}

/// Everything an agent step asks the scheduler to do on its behalf.
///
/// Agents never touch the bus or the environment directly; the scheduler
/// applies these effects after the step, in order.
#[derive(Debug, Default)]
pub struct StepEffects {
    pub outgoing: Vec<Outgoing>,
    pub actions: Vec<PendingAction>,
    pub timers: Vec<Timer>,
    pub kills: Vec<AgentName>,
    pub stop: bool,
    pub trace: Vec<TraceEvent>,
}

impl StepEffects {
    pub fn send(&mut self, to: AgentName, performative: Performative, content: Literal) {
        self.outgoing.push(Outgoing {
            to: Recipient::Agent(to),
            performative,
            content,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.outgoing.is_empty()
            && self.actions.is_empty()
            && self.timers.is_empty()
            && self.kills.is_empty()
            && !self.stop
            && self.trace.is_empty()
    }
}

/// Scheduler state lent to one agent step.
pub struct StepContext<'a> {
    pub round: u64,
    pub scheduling: SchedulingPolicy,
    pub ids: &'a mut IdGen,
    pub registry: &'a ActionRegistry,
    pub effects: StepEffects,
}

impl<'a> StepContext<'a> {
    pub fn new(
        round: u64,
        scheduling: SchedulingPolicy,
        ids: &'a mut IdGen,
        registry: &'a ActionRegistry,
    ) -> Self {
        Self {
            round,
            scheduling,
            ids,
            registry,
            effects: StepEffects::default(),
        }
    }

    pub fn into_effects(self) -> StepEffects {
        self.effects
    }
}
