use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;
use tracing::{debug, warn};

use mas_core::{
    AgentName, IntentionId, Literal, Message, NoApplicablePolicy, Performative, SchedulingPolicy,
    SelectionPolicy, Term, Trigger, Unifier,
};
use mas_lang::AgentSource;

use crate::belief::BeliefBase;
use crate::context::{StepContext, StepEffects};
use crate::error::{AgentError, Result};
use crate::event::Event;
use crate::intention::Intention;
use crate::plan::PlanLibrary;
use crate::selector::{selector_for, PlanSelector};
use crate::trace::TraceEvent;

/// Per-agent reasoning settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgentConfig {
    pub selection: SelectionPolicy,
    pub no_applicable: NoApplicablePolicy,
    pub seed: u64,
}

pub(crate) fn self_source() -> Term {
    Term::atom("self")
}

pub(crate) fn percept_source() -> Term {
    Term::atom("percept")
}

/// One BDI agent: beliefs, plans, pending events and intentions.
///
/// The runtime never blocks and never talks to other agents directly.
/// Each [`AgentRuntime::step`] is one reasoning cycle whose outward effects
/// are collected in a [`StepEffects`] for the scheduler to apply.
pub struct AgentRuntime {
    pub(crate) name: AgentName,
    pub(crate) index: usize,
    pub(crate) beliefs: BeliefBase,
    pub(crate) plans: PlanLibrary,
    pub(crate) selector: Box<dyn PlanSelector>,
    pub(crate) rng: StdRng,
    pub(crate) events: VecDeque<Event>,
    pub(crate) intentions: VecDeque<Intention>,
    pub(crate) no_applicable: NoApplicablePolicy,
    /// Environment revision of the last perception
    pub(crate) perceived: Option<u64>,
    /// Counter for variable renaming; shared by events and rule queries
    pub(crate) fresh: u64,
    pub(crate) last_run: u64,
}

impl AgentRuntime {
    /// Builds the agent and queues `+b` and `+!g` events for its initial
    /// beliefs and goals. Fails if an initial belief is not ground.
    pub fn new(
        name: AgentName,
        index: usize,
        source: AgentSource,
        config: AgentConfig,
    ) -> Result<Self> {
        if let Some(belief) = source.beliefs.iter().find(|b| !b.is_ground()) {
            return Err(AgentError::NonGroundBelief {
                agent: name,
                belief: belief.to_string(),
            });
        }
        let mut agent = Self {
            name,
            index,
            beliefs: BeliefBase::new(),
            plans: PlanLibrary::new(source.plans),
            selector: selector_for(config.selection),
            rng: StdRng::seed_from_u64(config.seed),
            events: VecDeque::new(),
            intentions: VecDeque::new(),
            no_applicable: config.no_applicable,
            perceived: None,
            fresh: 0,
            last_run: 0,
        };

        for rule in source.rules {
            agent.beliefs.add_rule(rule);
        }
        for mut belief in source.beliefs {
            if belief.sources().next().is_none() {
                belief.add_source(self_source());
            }
            if agent.beliefs.add(belief.clone()) {
                agent.events.push_back(Event::external(Trigger::belief_added(belief)));
            }
        }
        for mut goal in source.goals {
            goal.add_source(self_source());
            agent.events.push_back(Event::external(Trigger::achieve(goal)));
        }

        debug!(
            agent = %agent.name,
            beliefs = agent.beliefs.len(),
            plans = agent.plans.len(),
            events = agent.events.len(),
            "Agent created"
        );
        Ok(agent)
    }

    pub fn name(&self) -> &AgentName {
        &self.name
    }

    /// Declaration order within the system.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn beliefs(&self) -> &BeliefBase {
        &self.beliefs
    }

    pub fn plans(&self) -> &PlanLibrary {
        &self.plans
    }

    pub fn intentions(&self) -> impl Iterator<Item = &Intention> {
        self.intentions.iter()
    }

    pub fn intention(&self, id: IntentionId) -> Option<&Intention> {
        self.intentions.iter().find(|i| i.id == id)
    }

    pub(crate) fn intention_mut(&mut self, id: IntentionId) -> Option<&mut Intention> {
        self.intentions.iter_mut().find(|i| i.id == id)
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn last_run(&self) -> u64 {
        self.last_run
    }

    pub fn needs_perception(&self, revision: u64) -> bool {
        self.perceived != Some(revision)
    }

    fn has_ready_intention(&self) -> bool {
        self.intentions.iter().any(Intention::is_ready)
    }

    /// Nothing left to do on its own: no events and no runnable intention.
    pub fn is_quiescent(&self) -> bool {
        self.events.is_empty() && !self.has_ready_intention()
    }

    /// Whether a step would make progress, given pending mail and the
    /// current environment revision.
    pub fn has_work(&self, has_mail: bool, revision: u64) -> bool {
        has_mail || self.needs_perception(revision) || !self.is_quiescent()
    }

    /// Score under the priority policy: best ready intention, or the rounds
    /// since the agent last ran when it only has events or mail.
    pub fn score(&self, round: u64) -> i64 {
        self.intentions
            .iter()
            .filter(|i| i.is_ready())
            .map(|i| i.score(round))
            .max()
            .unwrap_or_else(|| round.saturating_sub(self.last_run).min(i64::MAX as u64) as i64)
    }

    /// Intention to advance this step.
    pub fn next_intention(&self, policy: SchedulingPolicy, round: u64) -> Option<IntentionId> {
        let mut ready = self.intentions.iter().filter(|i| i.is_ready());
        match policy {
            SchedulingPolicy::RoundRobin => ready.next().map(|i| i.id),
            SchedulingPolicy::Priority => ready
                .fold(None, |best: Option<(i64, IntentionId)>, i| {
                    let score = i.score(round);
                    match best {
                        Some((s, id)) if s > score || (s == score && id < i.id) => best,
                        _ => Some((score, i.id)),
                    }
                })
                .map(|(_, id)| id),
        }
    }

    pub fn post(&mut self, event: Event) {
        self.events.push_back(event);
    }

    /// Posts `+!goal` from outside the agent.
    pub fn post_goal(&mut self, mut goal: Literal) {
        if goal.sources().next().is_none() {
            goal.add_source(self_source());
        }
        self.post(Event::external(Trigger::achieve(goal)));
    }

    /// Adds a ground belief, posting `+b` when the base changed.
    pub fn add_belief(&mut self, belief: Literal, effects: &mut StepEffects) -> bool {
        if !belief.is_ground() {
            warn!(agent = %self.name, %belief, "Ignoring non-ground belief");
            return false;
        }
        if !self.beliefs.add(belief.clone()) {
            return false;
        }
        effects.trace.push(TraceEvent::BeliefAdded {
            belief: belief.to_string(),
        });
        self.post(Event::external(Trigger::belief_added(belief)));
        true
    }

    /// Removes `belief` (or the given sources of it), posting `-b`.
    pub fn remove_belief(&mut self, belief: &Literal, effects: &mut StepEffects) -> bool {
        match self.beliefs.remove(belief) {
            Some(removed) => {
                effects.trace.push(TraceEvent::BeliefRemoved {
                    belief: removed.to_string(),
                });
                self.post(Event::external(Trigger::belief_removed(removed)));
                true
            }
            None => false,
        }
    }

    /// `+unknown_recipient(To, Performative, Content)` for a message that
    /// could not be delivered.
    pub fn post_unknown_recipient(&mut self, to: &AgentName, performative: Performative, content: &Literal) {
        let literal = Literal::new("unknown_recipient")
            .with_args(vec![
                Term::atom(to.as_str()),
                Term::atom(performative.as_str()),
                Term::structure(content.clone()),
            ])
            .with_annot(Literal::source_annot(self_source()));
        self.post(Event::external(Trigger::belief_added(literal)));
    }

    /// Applies incoming messages in delivery order.
    pub fn receive(&mut self, messages: Vec<Message>, effects: &mut StepEffects) {
        for msg in messages {
            debug!(agent = %self.name, message = %msg, "Message received");
            effects.trace.push(TraceEvent::MessageReceived {
                id: msg.id,
                from: msg.sender.clone(),
                performative: msg.performative,
                content: msg.content.to_string(),
            });

            let sender = Term::atom(msg.sender.as_str());
            let mut content = msg.content.without_sources();
            match msg.performative {
                Performative::Tell => {
                    content.add_source(sender);
                    self.add_belief(content, effects);
                }
                Performative::Untell => {
                    content.add_source(sender);
                    self.remove_belief(&content, effects);
                }
                Performative::Achieve => {
                    content.add_source(sender);
                    self.post(Event::external(Trigger::achieve(content)));
                }
                Performative::Unachieve => self.drop_goal(&content, effects),
                Performative::AskOne | Performative::AskAll => {
                    let answers = self.beliefs.query(&content, &Unifier::new(), &mut self.fresh);
                    let take = if msg.performative == Performative::AskOne {
                        1
                    } else {
                        answers.len()
                    };
                    for answer in answers.iter().take(take) {
                        let reply = answer.apply_literal(&content).without_sources();
                        effects.send(msg.sender.clone(), Performative::Tell, reply);
                    }
                }
            }
        }
    }

    /// Drops every intention pursuing `goal` and every pending `+!goal`.
    fn drop_goal(&mut self, goal: &Literal, effects: &mut StepEffects) {
        let pattern = Trigger::achieve(goal.clone());
        let pursues = |trigger: &Trigger| {
            trigger.same_shape(&pattern)
                && Unifier::new()
                    .unifies_literal(&pattern.literal, &trigger.literal)
                    .is_some()
        };

        let before = self.events.len();
        self.events.retain(|e| !(e.is_external() && pursues(&e.trigger)));
        let events_dropped = before - self.events.len();

        let mut kept = VecDeque::with_capacity(self.intentions.len());
        for intention in self.intentions.drain(..) {
            if intention.root_trigger().is_some_and(|t| pursues(t)) {
                effects.trace.push(TraceEvent::IntentionDropped {
                    intention: intention.id,
                });
                debug!(agent = %self.name, intention = %intention.id, goal = %goal, "Intention dropped");
            } else {
                kept.push_back(intention);
            }
        }
        self.intentions = kept;
        // Sub-goal events of dropped intentions have nowhere to go.
        let live: Vec<IntentionId> = self.intentions.iter().map(|i| i.id).collect();
        self.events
            .retain(|e| e.intention.map_or(true, |id| live.contains(&id)));

        debug!(agent = %self.name, goal = %goal, events_dropped, "Goal unachieved");
    }

    /// Synchronises `source(percept)` beliefs with the current percepts.
    pub fn perceive(&mut self, percepts: Vec<Literal>, revision: u64, effects: &mut StepEffects) {
        let source = percept_source();
        let mut removed = 0;
        for old in self.beliefs.with_source(&source) {
            if !percepts.iter().any(|p| p.same_belief(&old)) {
                let stale = old
                    .without_annots()
                    .with_annot(Literal::source_annot(source.clone()));
                if self.remove_belief(&stale, effects) {
                    removed += 1;
                }
            }
        }

        let mut added = 0;
        for percept in percepts {
            let mut belief = percept.without_sources();
            belief.add_source(source.clone());
            if self.add_belief(belief, effects) {
                added += 1;
            }
        }

        self.perceived = Some(revision);
        if added + removed > 0 {
            effects.trace.push(TraceEvent::Perceived { added, removed });
        }
    }

    /// One reasoning cycle: apply mail, perceive when the environment
    /// changed, handle one event, advance one intention by one step.
    pub fn step(
        &mut self,
        mail: Vec<Message>,
        percepts: Option<(Vec<Literal>, u64)>,
        ctx: &mut StepContext<'_>,
    ) {
        self.last_run = ctx.round;
        self.receive(mail, &mut ctx.effects);
        if let Some((percepts, revision)) = percepts {
            self.perceive(percepts, revision, &mut ctx.effects);
        }
        self.deliberate(ctx);
        if let Some(id) = self.next_intention(ctx.scheduling, ctx.round) {
            self.execute(id, ctx);
        }
    }
}
