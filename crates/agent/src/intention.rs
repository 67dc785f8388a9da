use serde::{Deserialize, Serialize};
use std::sync::Arc;

use mas_core::{IntentionId, Literal, Trigger, Unifier};
use mas_lang::{BodyStep, Plan};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IntentionState {
    /// Ready to run its next step
    Executing,
    /// Environment action (or `.wait` timer) in flight
    WaitingAction { action: Literal },
    /// Posted a sub-goal event that has not been handled yet
    WaitingSubgoal { trigger: Trigger },
    Finished,
}

impl IntentionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, IntentionState::Executing)
    }

    pub fn is_waiting(&self) -> bool {
        matches!(
            self,
            IntentionState::WaitingAction { .. } | IntentionState::WaitingSubgoal { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameKind {
    /// Instance of a plan selected for a trigger
    Plan,
    /// Branch of an `if` inside the frame below
    Block,
    /// `-!g` plan handling the failure of the frame below
    Recovery,
}

/// One partially executed plan (or block) on an intention stack.
#[derive(Debug, Clone)]
pub struct Frame {
    pub kind: FrameKind,
    pub label: Option<String>,
    pub priority: i64,
    /// Event trigger the plan was selected for, with the event's literal
    pub trigger: Trigger,
    pub steps: Arc<[BodyStep]>,
    pub pc: usize,
    pub unifier: Unifier,
    /// Sub-goal literal whose bindings flow back when the sub-plan finishes
    pub awaiting: Option<Literal>,
}

impl Frame {
    pub fn for_plan(kind: FrameKind, plan: &Plan, trigger: Trigger, unifier: Unifier) -> Self {
        Self {
            kind,
            label: plan.label_name().map(str::to_string),
            priority: plan.priority(),
            trigger,
            steps: plan.body.clone().into(),
            pc: 0,
            unifier,
            awaiting: None,
        }
    }

    /// Frame running `steps` on behalf of `parent`, sharing its bindings.
    pub fn block(parent: &Frame, steps: Vec<BodyStep>, unifier: Unifier) -> Self {
        Self {
            kind: FrameKind::Block,
            label: parent.label.clone(),
            priority: parent.priority,
            trigger: parent.trigger.clone(),
            steps: steps.into(),
            pc: 0,
            unifier,
            awaiting: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.pc >= self.steps.len()
    }

    pub fn current_step(&self) -> Option<&BodyStep> {
        self.steps.get(self.pc)
    }
}

/// A committed line of reasoning: a stack of frames, innermost last.
#[derive(Debug, Clone)]
pub struct Intention {
    pub id: IntentionId,
    pub stack: Vec<Frame>,
    pub state: IntentionState,
    /// Round in which the intention last ran (or was created)
    pub last_run: u64,
}

impl Intention {
    pub fn new(id: IntentionId, root: Frame, round: u64) -> Self {
        Self {
            id,
            stack: vec![root],
            state: IntentionState::Executing,
            last_run: round,
        }
    }

    pub fn top(&self) -> Option<&Frame> {
        self.stack.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut Frame> {
        self.stack.last_mut()
    }

    /// Trigger of the bottom frame: the event that created the intention.
    /// While a tail call has emptied the stack, the pending sub-goal stands
    /// in for it.
    pub fn root_trigger(&self) -> Option<&Trigger> {
        match (self.stack.first(), &self.state) {
            (Some(frame), _) => Some(&frame.trigger),
            (None, IntentionState::WaitingSubgoal { trigger }) => Some(trigger),
            (None, _) => None,
        }
    }

    pub fn priority(&self) -> i64 {
        self.top().map(|f| f.priority).unwrap_or(0)
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// Scheduling score under the priority policy: plan priority plus the
    /// number of rounds since the intention last ran.
    pub fn score(&self, round: u64) -> i64 {
        let age = round.saturating_sub(self.last_run).min(i64::MAX as u64) as i64;
        self.priority().saturating_add(age)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mas_lang::parse_agent;

    fn plan(src: &str) -> Plan {
        parse_agent(src).unwrap().plans.remove(0)
    }

    #[test]
    fn test_frame_from_plan() {
        let p = plan("@fast[priority(4)] +!go <- a; b.");
        let frame = Frame::for_plan(FrameKind::Plan, &p, p.trigger.clone(), Unifier::new());
        assert_eq!(frame.label.as_deref(), Some("fast"));
        assert_eq!(frame.priority, 4);
        assert_eq!(frame.steps.len(), 2);
        assert!(!frame.is_done());
    }

    #[test]
    fn test_score_ages() {
        let p = plan("@p[priority(2)] +!go <- a.");
        let frame = Frame::for_plan(FrameKind::Plan, &p, p.trigger.clone(), Unifier::new());
        let intention = Intention::new(IntentionId(1), frame, 10);
        assert_eq!(intention.score(10), 2);
        assert_eq!(intention.score(15), 7);
        assert!(intention.is_ready());
        assert_eq!(intention.root_trigger().unwrap().to_string(), "+!go");
    }

    #[test]
    fn test_state_predicates() {
        let waiting = IntentionState::WaitingAction {
            action: Literal::new("move"),
        };
        assert!(waiting.is_waiting());
        assert!(!waiting.is_ready());
        assert!(!IntentionState::Finished.is_waiting());
    }
}
