//! Deliberation and intention execution for [`AgentRuntime`].

use std::sync::Arc;
use tracing::{debug, warn};

use mas_core::{
    ActionError, CoreError, IntentionId, Literal, NoApplicablePolicy, Term, Trigger, TriggerKind,
    Unifier,
};
use mas_lang::BodyStep;

use crate::agent::{self_source, AgentRuntime};
use crate::builtin::{ActionContext, Outcome};
use crate::context::{PendingAction, StepContext, StepEffects, Timer};
use crate::error::{AgentError, Result};
use crate::event::Event;
use crate::intention::{Frame, FrameKind, Intention, IntentionState};
use crate::selector::ApplicablePlan;
use crate::trace::TraceEvent;

impl AgentRuntime {
    fn fresh_suffix(&mut self) -> String {
        self.fresh += 1;
        format!("e{}", self.fresh)
    }

    /// Renames the variables of an event literal apart from every plan.
    ///
    /// A suffix left by an earlier renaming is replaced rather than stacked,
    /// unless two variables of the literal would then share a name.
    fn fresh_literal(&mut self, literal: &Literal) -> Literal {
        let suffix = self.fresh_suffix();
        let mut vars = Vec::new();
        literal.collect_vars(&mut vars);
        let stems: Vec<&str> = vars
            .iter()
            .map(|v| v.split_once("__").map_or(v.as_str(), |(stem, _)| stem))
            .collect();

        let mut renaming = Unifier::new();
        for (var, stem) in vars.iter().zip(&stems) {
            let shared = stems.iter().filter(|s| *s == stem).count() > 1;
            let stem = if shared { var.as_str() } else { stem };
            renaming.unify(&Term::var(var.as_str()), &Term::var(format!("{}__{}", stem, suffix)));
        }
        renaming.apply_literal(literal)
    }

    /// Handles the oldest pending event. Returns `false` when there was none.
    pub fn deliberate(&mut self, ctx: &mut StepContext<'_>) -> bool {
        let Some(event) = self.events.pop_front() else {
            return false;
        };

        let relevant = self.plans.relevant(&event.trigger);
        let mut applicable = Vec::new();
        for (plan, un) in &relevant {
            // First context solution only.
            if let Some(solution) = self.beliefs.holds(&plan.context, un, &mut self.fresh) {
                applicable.push(ApplicablePlan {
                    plan: Arc::clone(plan),
                    unifier: solution,
                });
            }
        }

        match self.selector.select(&applicable, &mut self.rng) {
            Some(idx) => {
                let option = applicable.swap_remove(idx);
                self.adopt(event, option, ctx);
            }
            None => self.no_applicable_plan(event, relevant.is_empty(), ctx),
        }
        true
    }

    fn adopt(&mut self, event: Event, option: ApplicablePlan, ctx: &mut StepContext<'_>) {
        let kind = if event.trigger.is_goal_failure() {
            FrameKind::Recovery
        } else {
            FrameKind::Plan
        };
        let plan_text = option.plan.to_string();
        let trigger_text = event.trigger.to_string();
        let frame = Frame::for_plan(kind, &option.plan, event.trigger, option.unifier);

        let id = match event.intention {
            None => {
                let id = ctx.ids.next_intention();
                self.intentions
                    .push_back(Intention::new(id, frame, ctx.round));
                id
            }
            Some(id) => match self.intention_mut(id) {
                Some(intention) => {
                    intention.stack.push(frame);
                    intention.state = IntentionState::Executing;
                    id
                }
                None => {
                    debug!(agent = %self.name, intention = %id, trigger = %trigger_text, "Intention gone, event discarded");
                    return;
                }
            },
        };

        debug!(agent = %self.name, intention = %id, trigger = %trigger_text, plan = %plan_text, "Plan selected");
        ctx.effects.trace.push(TraceEvent::PlanSelected {
            intention: id,
            trigger: trigger_text,
            plan: plan_text,
        });
    }

    fn no_applicable_plan(&mut self, event: Event, no_relevant: bool, ctx: &mut StepContext<'_>) {
        let trigger = event.trigger.to_string();
        if !event.trigger.is_goal() {
            debug!(agent = %self.name, %trigger, no_relevant, "Belief event discarded");
            ctx.effects
                .trace
                .push(TraceEvent::EventDiscarded { trigger });
            return;
        }

        ctx.effects.trace.push(TraceEvent::NoApplicablePlan {
            trigger: trigger.clone(),
        });

        let Some(id) = event.intention else {
            warn!(agent = %self.name, %trigger, "No applicable plan, goal dropped");
            return;
        };

        if event.trigger.is_goal_failure() {
            // A failure nobody can handle ends the intention.
            self.drop_intention(id, AgentError::NoApplicablePlan(trigger), &mut ctx.effects);
        } else if event.trigger.kind == TriggerKind::Test {
            let err = AgentError::TestGoalFailed(event.trigger.literal.to_string());
            self.fail_intention(id, err, &mut ctx.effects);
        } else {
            match self.no_applicable {
                NoApplicablePolicy::DropEvent => {
                    debug!(agent = %self.name, intention = %id, %trigger, "No applicable plan, sub-goal skipped");
                    if let Some(intention) = self.intention_mut(id) {
                        intention.state = IntentionState::Executing;
                        if let Some(frame) = intention.top_mut() {
                            frame.awaiting = None;
                        }
                    }
                }
                NoApplicablePolicy::FailIntention => {
                    self.fail_intention(id, AgentError::NoApplicablePlan(trigger), &mut ctx.effects);
                }
            }
        }
    }

    /// Advances intention `id` by one step.
    pub fn execute(&mut self, id: IntentionId, ctx: &mut StepContext<'_>) {
        let Some(pos) = self.intentions.iter().position(|i| i.id == id) else {
            return;
        };
        let Some(mut intention) = self.intentions.remove(pos) else {
            return;
        };
        intention.last_run = ctx.round;

        if let Err(err) = self.advance(&mut intention, ctx) {
            if !self.recover(&mut intention, &err, &mut ctx.effects) {
                self.abandon(intention, err, &mut ctx.effects);
                return;
            }
        }
        self.finish_or_keep(intention, &mut ctx.effects);
    }

    fn advance(&mut self, intention: &mut Intention, ctx: &mut StepContext<'_>) -> Result<()> {
        Self::settle(intention)?;
        self.run_step(intention, ctx)?;
        Self::settle(intention)
    }

    fn finish_or_keep(&mut self, mut intention: Intention, effects: &mut StepEffects) {
        // An empty stack still waiting on a sub-goal is mid tail call.
        if intention.stack.is_empty() && !intention.state.is_waiting() {
            intention.state = IntentionState::Finished;
            debug!(agent = %self.name, intention = %intention.id, "Intention finished");
            effects.trace.push(TraceEvent::IntentionFinished {
                intention: intention.id,
            });
        } else {
            self.intentions.push_back(intention);
        }
    }

    /// Pops every finished frame, passing results down the stack.
    fn settle(intention: &mut Intention) -> Result<()> {
        while intention.state.is_ready() {
            if !intention.top().is_some_and(Frame::is_done) {
                break;
            }
            let Some(frame) = intention.stack.pop() else {
                break;
            };
            match frame.kind {
                FrameKind::Block => {
                    if let Some(parent) = intention.top_mut() {
                        parent.unifier = frame.unifier;
                    }
                }
                FrameKind::Plan => Self::return_to_caller(intention, &frame)?,
                FrameKind::Recovery => {
                    // The recovered goal's frame goes with it.
                    intention.stack.pop();
                    if let Some(parent) = intention.top_mut() {
                        parent.awaiting = None;
                    }
                }
            }
        }
        Ok(())
    }

    /// Unifies the result of a finished plan frame with the sub-goal its
    /// caller is waiting on.
    fn return_to_caller(intention: &mut Intention, frame: &Frame) -> Result<()> {
        let result = frame.unifier.apply_literal(&frame.trigger.literal);
        if let Some(parent) = intention.top_mut() {
            if let Some(goal) = parent.awaiting.take() {
                parent.unifier = parent
                    .unifier
                    .unifies_literal(&goal, &result)
                    .ok_or_else(|| AgentError::ConstraintFailed(format!("{} = {}", goal, result)))?;
            }
        }
        Ok(())
    }

    /// A sub-goal in last position replaces its plan frame instead of
    /// stacking on top of it. The frame must stay when a caller needs
    /// bindings the sub-goal could still produce, or when a failure plan for
    /// the frame's own goal would be lost.
    fn is_tail_call(&self, frame: &Frame, depth: usize, goal: &Literal) -> bool {
        if frame.kind != FrameKind::Plan || !frame.is_done() {
            return false;
        }
        let settled = depth == 1 || frame.unifier.apply_literal(&frame.trigger.literal).is_ground();
        let recovery_kept = !frame.trigger.is_achieve_addition()
            || frame.trigger.literal.same_predicate(goal)
            || !self.plans.has_failure_plan(&frame.trigger.literal);
        settled && recovery_kept
    }

    fn run_step(&mut self, intention: &mut Intention, ctx: &mut StepContext<'_>) -> Result<()> {
        let id = intention.id;
        let depth = intention.stack.len();
        let Some(frame) = intention.top_mut() else {
            return Ok(());
        };
        let Some(step) = frame.current_step().cloned() else {
            return Ok(());
        };
        frame.pc += 1;

        match step {
            BodyStep::Achieve(lit) => {
                let goal = frame.unifier.apply_literal(&lit);
                let mut posted = self.fresh_literal(&goal);
                posted.add_source(self_source());
                let trigger = Trigger::achieve(posted);
                if self.is_tail_call(frame, depth, &goal) {
                    if let Some(done) = intention.stack.pop() {
                        Self::return_to_caller(intention, &done)?;
                    }
                } else {
                    frame.awaiting = Some(goal);
                }
                intention.state = IntentionState::WaitingSubgoal {
                    trigger: trigger.clone(),
                };
                self.post(Event::internal(trigger, id));
            }
            BodyStep::AchieveAsync(lit) => {
                let mut goal = frame.unifier.apply_literal(&lit);
                goal.add_source(self_source());
                self.post(Event::external(Trigger::achieve(goal)));
            }
            BodyStep::Test(lit) => {
                let answer = self
                    .beliefs
                    .query(&lit, &frame.unifier, &mut self.fresh)
                    .into_iter()
                    .next();
                match answer {
                    Some(un) => frame.unifier = un,
                    None => {
                        let query = frame.unifier.apply_literal(&lit);
                        let trigger = Trigger::test(self.fresh_literal(&query));
                        if !self.plans.has_relevant(&trigger) {
                            return Err(AgentError::TestGoalFailed(query.to_string()));
                        }
                        frame.awaiting = Some(query);
                        intention.state = IntentionState::WaitingSubgoal {
                            trigger: trigger.clone(),
                        };
                        self.post(Event::internal(trigger, id));
                    }
                }
            }
            BodyStep::AddBelief(lit) => {
                let mut belief = frame.unifier.apply_literal(&lit);
                if belief.sources().next().is_none() {
                    belief.add_source(self_source());
                }
                ensure_ground(&belief)?;
                self.add_belief(belief, &mut ctx.effects);
            }
            BodyStep::RemoveBelief(lit) => {
                let mut pattern = frame.unifier.apply_literal(&lit);
                if pattern.sources().next().is_none() {
                    pattern.add_source(self_source());
                }
                // Removing a belief that is not there succeeds.
                if let Some(un) = self.beliefs.matching(&pattern, &frame.unifier).into_iter().next() {
                    let target = un.apply_literal(&pattern);
                    frame.unifier = un;
                    self.remove_belief(&target, &mut ctx.effects);
                }
            }
            BodyStep::ReplaceBelief(lit) => {
                let mut belief = frame.unifier.apply_literal(&lit);
                if belief.sources().next().is_none() {
                    belief.add_source(self_source());
                }
                ensure_ground(&belief)?;
                let stale: Vec<Literal> = self
                    .beliefs
                    .with_source(&self_source())
                    .into_iter()
                    .filter(|b| b.same_predicate(&belief))
                    .collect();
                for old in stale {
                    let target = old
                        .without_annots()
                        .with_annot(Literal::source_annot(self_source()));
                    self.remove_belief(&target, &mut ctx.effects);
                }
                self.add_belief(belief, &mut ctx.effects);
            }
            BodyStep::Internal(lit) => {
                let registry = ctx.registry;
                let action = registry
                    .get(&lit.functor)
                    .ok_or_else(|| AgentError::UnknownInternalAction(lit.functor.clone()))?;
                let mut actx = ActionContext {
                    agent: &self.name,
                    intention: id,
                    round: ctx.round,
                    beliefs: &self.beliefs,
                    fresh: &mut self.fresh,
                    rng: &mut self.rng,
                    effects: &mut ctx.effects,
                };
                match action.execute(&lit.args, &frame.unifier, &mut actx)? {
                    Outcome::Continue(un) => frame.unifier = un,
                    Outcome::Suspend { rounds } => {
                        let action = frame.unifier.apply_literal(&lit);
                        ctx.effects.timers.push(Timer {
                            intention: id,
                            action: action.clone(),
                            rounds,
                        });
                        intention.state = IntentionState::WaitingAction { action };
                    }
                }
            }
            BodyStep::Action(lit) => {
                let action = frame.unifier.apply_literal(&lit);
                debug!(agent = %self.name, intention = %id, %action, "Action issued");
                ctx.effects.trace.push(TraceEvent::ActionIssued {
                    intention: id,
                    action: action.to_string(),
                });
                ctx.effects.actions.push(PendingAction {
                    intention: id,
                    action: action.clone(),
                });
                intention.state = IntentionState::WaitingAction { action };
            }
            BodyStep::Constraint(cond) => {
                match self.beliefs.holds(&cond, &frame.unifier, &mut self.fresh) {
                    Some(un) => frame.unifier = un,
                    None => return Err(AgentError::ConstraintFailed(cond.to_string())),
                }
            }
            BodyStep::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let (branch, un) = match self.beliefs.holds(&condition, &frame.unifier, &mut self.fresh) {
                    Some(un) => (then_branch, un),
                    None => (else_branch, frame.unifier.clone()),
                };
                if branch.is_empty() {
                    frame.unifier = un;
                } else {
                    let block = Frame::block(frame, branch, un);
                    intention.stack.push(block);
                }
            }
        }
        Ok(())
    }

    /// Turns a failure of `intention` into a `-!g` event for the innermost
    /// goal that has a failure plan. Returns `false` when nothing can
    /// handle it; the intention must then be dropped.
    fn recover(&mut self, intention: &mut Intention, err: &AgentError, effects: &mut StepEffects) -> bool {
        let mut target = None;
        for (idx, frame) in intention.stack.iter().enumerate().rev() {
            match frame.kind {
                // Failing while recovering ends the intention.
                FrameKind::Recovery => break,
                FrameKind::Block => continue,
                FrameKind::Plan if frame.trigger.is_achieve_addition() => {
                    let goal = frame.unifier.apply_literal(&frame.trigger.literal);
                    let failure = Trigger::goal_failure(&goal, err.kind(), &err.to_string());
                    if self.plans.has_relevant(&failure) {
                        target = Some((idx, failure));
                        break;
                    }
                }
                FrameKind::Plan => {}
            }
        }
        if target.is_none() && intention.stack.is_empty() {
            // A tail call whose sub-goal failed before any plan was adopted.
            if let IntentionState::WaitingSubgoal { trigger } = &intention.state {
                if trigger.is_achieve_addition() {
                    let failure = Trigger::goal_failure(&trigger.literal, err.kind(), &err.to_string());
                    if self.plans.has_relevant(&failure) {
                        target = Some((0, failure));
                    }
                }
            }
        }
        let Some((idx, failure)) = target else {
            return false;
        };

        intention.stack.truncate(idx + 1);
        if let Some(frame) = intention.stack.get_mut(idx) {
            frame.awaiting = None;
        }
        let failure = Trigger {
            literal: self.fresh_literal(&failure.literal),
            ..failure
        };
        warn!(agent = %self.name, intention = %intention.id, error = %err, trigger = %failure, "Intention failed, posting goal failure");
        effects.trace.push(TraceEvent::IntentionFailed {
            intention: intention.id,
            reason: err.to_string(),
        });
        intention.state = IntentionState::WaitingSubgoal {
            trigger: failure.clone(),
        };
        self.post(Event::internal(failure, intention.id));
        true
    }

    fn abandon(&mut self, intention: Intention, err: AgentError, effects: &mut StepEffects) {
        warn!(agent = %self.name, intention = %intention.id, error = %err, "Intention dropped");
        effects.trace.push(TraceEvent::IntentionFailed {
            intention: intention.id,
            reason: err.to_string(),
        });
        effects.trace.push(TraceEvent::IntentionDropped {
            intention: intention.id,
        });
        let id = intention.id;
        self.events.retain(|e| e.intention != Some(id));
    }

    /// Fails a queued intention, recovering it when a failure plan exists.
    pub(crate) fn fail_intention(&mut self, id: IntentionId, err: AgentError, effects: &mut StepEffects) {
        let Some(pos) = self.intentions.iter().position(|i| i.id == id) else {
            return;
        };
        let Some(mut intention) = self.intentions.remove(pos) else {
            return;
        };
        if self.recover(&mut intention, &err, effects) {
            self.intentions.insert(pos, intention);
        } else {
            self.abandon(intention, err, effects);
        }
    }

    fn drop_intention(&mut self, id: IntentionId, err: AgentError, effects: &mut StepEffects) {
        if let Some(pos) = self.intentions.iter().position(|i| i.id == id) {
            if let Some(intention) = self.intentions.remove(pos) {
                self.abandon(intention, err, effects);
            }
        }
    }

    /// Resumes the intention waiting on `action`. Failures become goal
    /// failure events like any other step failure.
    pub fn deliver_action_result(
        &mut self,
        id: IntentionId,
        action: &Literal,
        result: std::result::Result<(), ActionError>,
        effects: &mut StepEffects,
    ) {
        let waiting = self
            .intention(id)
            .is_some_and(|i| matches!(i.state, IntentionState::WaitingAction { .. }));
        if !waiting {
            debug!(agent = %self.name, intention = %id, %action, "Result for a finished intention discarded");
            return;
        }

        effects.trace.push(TraceEvent::ActionCompleted {
            intention: id,
            action: action.to_string(),
            success: result.is_ok(),
        });
        match result {
            Ok(()) => {
                if let Some(intention) = self.intention_mut(id) {
                    intention.state = IntentionState::Executing;
                }
            }
            Err(err) => {
                if let Some(intention) = self.intention_mut(id) {
                    intention.state = IntentionState::Executing;
                }
                self.fail_intention(id, AgentError::ActionFailure(err), effects);
            }
        }
    }
}

fn ensure_ground(belief: &Literal) -> Result<()> {
    if belief.is_ground() {
        Ok(())
    } else {
        let mut vars = Vec::new();
        belief.collect_vars(&mut vars);
        Err(CoreError::Unbound(vars.join(", ")).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentConfig;
    use crate::builtin::ActionRegistry;
    use mas_core::{IdGen, SchedulingPolicy};
    use mas_lang::parse_agent;

    struct Harness {
        agent: AgentRuntime,
        ids: IdGen,
        registry: ActionRegistry,
        round: u64,
        effects: Vec<StepEffects>,
    }

    impl Harness {
        fn new(src: &str) -> Self {
            Self::with_config(src, AgentConfig::default())
        }

        fn with_config(src: &str, config: AgentConfig) -> Self {
            Self {
                agent: AgentRuntime::new("a".into(), 0, parse_agent(src).unwrap(), config).unwrap(),
                ids: IdGen::new(),
                registry: ActionRegistry::standard(),
                round: 0,
                effects: Vec::new(),
            }
        }

        fn step(&mut self) {
            let mut ctx = StepContext::new(self.round, SchedulingPolicy::RoundRobin, &mut self.ids, &self.registry);
            self.agent.step(Vec::new(), None, &mut ctx);
            self.effects.push(ctx.into_effects());
            self.round += 1;
        }

        fn run(&mut self, steps: usize) {
            for _ in 0..steps {
                self.step();
            }
        }

        fn trace(&self) -> Vec<TraceEvent> {
            self.effects.iter().flat_map(|e| e.trace.clone()).collect()
        }

        fn printed(&self) -> Vec<String> {
            self.trace()
                .into_iter()
                .filter_map(|e| match e {
                    TraceEvent::Printed { text } => Some(text),
                    _ => None,
                })
                .collect()
        }

        fn believes(&self, src: &str) -> bool {
            self.agent
                .beliefs()
                .contains(&mas_lang::parse_literal(src).unwrap())
        }
    }

    #[test]
    fn test_achieve_and_belief_update() {
        let mut h = Harness::new("!start. +!start <- +done; .print(\"ok\").");
        h.run(5);
        assert!(h.believes("done"));
        assert_eq!(h.printed(), vec!["ok"]);
        assert!(h.agent.is_quiescent());
        assert!(h
            .trace()
            .contains(&TraceEvent::IntentionFinished {
                intention: IntentionId(1)
            }));
    }

    #[test]
    fn test_subgoal_bindings_flow_back() {
        let mut h = Harness::new(
            "!main.
             +!main <- !double(4, X); .print(X).
             +!double(N, R) <- R = N * 2.",
        );
        h.run(10);
        assert_eq!(h.printed(), vec!["8"]);
    }

    #[test]
    fn test_rule_in_context() {
        let mut h = Harness::new(
            "age(bob, 20).
             adult(X) :- age(X, A) & A >= 18.
             !check.
             +!check : adult(bob) <- .print(yes).
             +!check <- .print(no).",
        );
        h.run(5);
        assert_eq!(h.printed(), vec!["yes"]);
    }

    #[test]
    fn test_recursion_counts_down() {
        let mut h = Harness::new(
            "!count(3).
             +!count(0) <- .print(done).
             +!count(N) : N > 0 <- .print(N); !count(N - 1).",
        );
        h.run(30);
        assert_eq!(h.printed(), vec!["3", "2", "1", "done"]);
        assert!(h.agent.intentions().next().is_none());
    }

    #[test]
    fn test_tail_recursion_keeps_stack_flat() {
        let mut h = Harness::new("!loop. +!loop <- .print(tick); !loop.");
        h.run(400);
        assert!(h.printed().len() > 100);
        let intention = h.agent.intentions().next().unwrap();
        assert!(intention.stack.len() <= 1, "depth {}", intention.stack.len());
    }

    #[test]
    fn test_tail_call_renaming_does_not_nest() {
        let mut h = Harness::new("!walk(X). +!walk(Y) <- .print(step); !walk(Y).");
        h.run(200);
        let intention = h.agent.intentions().next().unwrap();
        let root = intention.root_trigger().unwrap();
        match &root.literal.args[0] {
            Term::Var(name) => assert_eq!(name.matches("__").count(), 1, "{}", name),
            other => panic!("expected a variable, got {}", other),
        }
    }

    #[test]
    fn test_tail_call_keeps_caller_bindings() {
        let mut h = Harness::new(
            "!main.
             +!main <- !outer(X); .print(X).
             +!outer(R) <- !inner(R).
             +!inner(R) <- R = 5.",
        );
        h.run(15);
        assert_eq!(h.printed(), vec!["5"]);
    }

    #[test]
    fn test_tail_call_keeps_failure_plan() {
        let mut h = Harness::new(
            "!g.
             +!g <- !h.
             +!h <- .fail.
             -!g <- .print(recovered).",
        );
        h.run(10);
        assert_eq!(h.printed(), vec!["recovered"]);
    }

    #[test]
    fn test_tail_call_failing_before_adoption_is_recovered() {
        let config = AgentConfig {
            no_applicable: NoApplicablePolicy::FailIntention,
            ..AgentConfig::default()
        };
        let mut h = Harness::with_config(
            "!tick(2).
             +!tick(N) : N > 0 <- !tick(N - 1).
             -!tick(N) <- .print(recovered, \" \", N).",
            config,
        );
        h.run(12);
        assert_eq!(h.printed(), vec!["recovered 0"]);
        assert!(h.agent.intentions().next().is_none());
    }

    #[test]
    fn test_failure_plan_recovers() {
        let mut h = Harness::new(
            "!g.
             +!g <- .fail.
             -!g[error(E)] <- .print(recovered, \" \", E).",
        );
        h.run(10);
        assert_eq!(h.printed(), vec!["recovered ia_failed"]);
        assert!(h.agent.is_quiescent());
    }

    #[test]
    fn test_failure_propagates_to_outer_goal() {
        let mut h = Harness::new(
            "!outer.
             +!outer <- !inner; .print(unreachable).
             +!inner <- ?missing.
             -!outer <- .print(outer_recovered).
             +!after <- true.",
        );
        h.run(15);
        assert_eq!(h.printed(), vec!["outer_recovered"]);
        assert!(h.agent.intentions().next().is_none());
    }

    #[test]
    fn test_unhandled_failure_drops_intention() {
        let mut h = Harness::new("!g. +!g <- .fail; .print(never).");
        h.run(5);
        assert!(h.printed().is_empty());
        assert!(h
            .trace()
            .iter()
            .any(|e| matches!(e, TraceEvent::IntentionDropped { .. })));
        assert!(h.agent.intentions().next().is_none());
    }

    #[test]
    fn test_no_applicable_drop_event_resumes() {
        let mut h = Harness::new("!g. +!g <- !missing; .print(after).");
        h.run(6);
        assert_eq!(h.printed(), vec!["after"]);
    }

    #[test]
    fn test_no_applicable_fail_intention() {
        let config = AgentConfig {
            no_applicable: NoApplicablePolicy::FailIntention,
            ..AgentConfig::default()
        };
        let mut h = Harness::with_config(
            "!g.
             +!g <- !missing; .print(after).
             -!g[error(no_applicable)] <- .print(failed).",
            config,
        );
        h.run(8);
        assert_eq!(h.printed(), vec!["failed"]);
    }

    #[test]
    fn test_if_else() {
        let mut h = Harness::new(
            "light(on).
             !check.
             +!check <- if (light(S) & S == off) { .print(dark) } else { .print(bright) }; .print(end).",
        );
        h.run(8);
        assert_eq!(h.printed(), vec!["bright", "end"]);
    }

    #[test]
    fn test_belief_events_without_plans_are_discarded() {
        let mut h = Harness::new("x(1).");
        h.run(1);
        assert!(h
            .trace()
            .iter()
            .any(|e| matches!(e, TraceEvent::EventDiscarded { .. })));
        assert!(h.agent.is_quiescent());
    }

    #[test]
    fn test_replace_and_remove_belief() {
        let mut h = Harness::new(
            "count(0).
             !go.
             +!go <- -+count(1); -count(1); -missing.",
        );
        h.run(8);
        assert!(!h.believes("count(0)"));
        assert!(!h.believes("count(1)"));
        assert!(h.agent.intentions().next().is_none());
    }

    #[test]
    fn test_replace_removes_every_old_value() {
        let mut h = Harness::new("pos(1). pos(2). !go. +!go <- -+pos(3).");
        h.run(6);
        assert!(h.believes("pos(3)"));
        assert!(!h.believes("pos(1)"));
        assert!(!h.believes("pos(2)"));
    }

    #[test]
    fn test_test_goal_binds() {
        let mut h = Harness::new("pos(3, 4). !go. +!go <- ?pos(X, Y); .print(X, \",\", Y).");
        h.run(5);
        assert_eq!(h.printed(), vec!["3,4"]);
    }

    #[test]
    fn test_environment_action_suspends() {
        let mut h = Harness::new("!go. +!go <- move(north); .print(moved).");
        h.run(3);
        let actions: Vec<_> = h.effects.iter().flat_map(|e| e.actions.clone()).collect();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action.to_string(), "move(north)");
        assert!(h.printed().is_empty());

        let id = actions[0].intention;
        let mut effects = StepEffects::default();
        h.agent
            .deliver_action_result(id, &actions[0].action, Ok(()), &mut effects);
        h.run(2);
        assert_eq!(h.printed(), vec!["moved"]);
    }

    #[test]
    fn test_failed_action_posts_goal_failure() {
        let mut h = Harness::new(
            "!go.
             +!go <- move(north).
             -!go[error(action_failed)] <- .print(blocked).",
        );
        h.run(2);
        let pending = h.effects.iter().flat_map(|e| e.actions.clone()).next().unwrap();
        let mut effects = StepEffects::default();
        h.agent.deliver_action_result(
            pending.intention,
            &pending.action,
            Err(ActionError::failed("move", "wall")),
            &mut effects,
        );
        h.run(4);
        assert_eq!(h.printed(), vec!["blocked"]);
    }

    #[test]
    fn test_wait_suspends_with_timer() {
        let mut h = Harness::new("!go. +!go <- .wait(3); .print(woke).");
        h.run(3);
        let timers: Vec<_> = h.effects.iter().flat_map(|e| e.timers.clone()).collect();
        assert_eq!(timers.len(), 1);
        assert_eq!(timers[0].rounds, 3);
        assert!(h.printed().is_empty());
    }
}
