use serde::Serialize;
use std::collections::BTreeSet;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use mas_core::{
    ActionError, AgentName, Environment, IdGen, IntentionId, Literal, Message, NoApplicablePolicy,
    SchedulingPolicy,
};
use mas_lang::{AgentBlueprint, LoadedSystem, RunSettings};

use crate::agent::{AgentConfig, AgentRuntime};
use crate::builtin::ActionRegistry;
use crate::bus::MessageBus;
use crate::context::{Recipient, StepContext, StepEffects};
use crate::error::{AgentError, Result};
use crate::trace::{Trace, TraceEvent};

pub const DEFAULT_MAX_STEPS: u64 = 10_000;

const SEED_SPREAD: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub policy: SchedulingPolicy,
    /// Rounds per [`Scheduler::run`]; `None` runs until quiescence
    pub max_steps: Option<u64>,
    pub seed: u64,
    pub no_applicable_plan: NoApplicablePolicy,
    pub record_trace: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            policy: SchedulingPolicy::RoundRobin,
            max_steps: Some(DEFAULT_MAX_STEPS),
            seed: 0,
            no_applicable_plan: NoApplicablePolicy::DropEvent,
            record_trace: true,
        }
    }
}

impl From<&RunSettings> for SchedulerConfig {
    fn from(settings: &RunSettings) -> Self {
        Self {
            policy: settings.scheduling,
            max_steps: settings.max_steps.or(Some(DEFAULT_MAX_STEPS)),
            seed: settings.seed,
            no_applicable_plan: settings.on_no_applicable_plan,
            record_trace: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// No agent had work left
    Quiescent,
    StepLimit,
    /// `.stop_mas` or [`SchedulerHandle::stop`]
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub rounds: u64,
    pub termination: Termination,
}

#[derive(Debug)]
enum Command {
    Achieve { agent: AgentName, goal: Literal },
    AddBelief { agent: AgentName, belief: Literal },
    Kill(AgentName),
    Stop,
}

/// Cloneable handle for steering a scheduler from outside its run loop.
/// Commands are applied at the start of the next round.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl SchedulerHandle {
    fn send(&self, command: Command) -> Result<()> {
        self.tx.send(command).map_err(|_| AgentError::ChannelClosed)
    }

    pub fn achieve(&self, agent: AgentName, goal: Literal) -> Result<()> {
        self.send(Command::Achieve { agent, goal })
    }

    pub fn add_belief(&self, agent: AgentName, belief: Literal) -> Result<()> {
        self.send(Command::AddBelief { agent, belief })
    }

    pub fn kill(&self, agent: AgentName) -> Result<()> {
        self.send(Command::Kill(agent))
    }

    pub fn stop(&self) -> Result<()> {
        self.send(Command::Stop)
    }
}

/// Action or timer result waiting for its delivery round.
#[derive(Debug)]
struct Completion {
    due: u64,
    agent: AgentName,
    intention: IntentionId,
    action: Literal,
    result: std::result::Result<(), ActionError>,
}

/// Runs every agent of a system in deterministic rounds.
///
/// Each round advances exactly one agent by one reasoning cycle. Given the
/// same system, seed and environment behaviour, two runs produce the same
/// trace.
pub struct Scheduler {
    config: SchedulerConfig,
    agents: Vec<AgentRuntime>,
    bus: MessageBus,
    ids: IdGen,
    registry: ActionRegistry,
    trace: Trace,
    round: u64,
    /// Declaration index the round-robin scan starts from
    cursor: usize,
    next_index: usize,
    in_flight: Vec<Completion>,
    commands: mpsc::UnboundedReceiver<Command>,
    handle: SchedulerHandle,
    registered: BTreeSet<AgentName>,
    killed: BTreeSet<AgentName>,
    stopped: bool,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_registry(config, ActionRegistry::standard())
    }

    /// Scheduler whose agents use `registry` for internal actions.
    pub fn with_registry(config: SchedulerConfig, registry: ActionRegistry) -> Self {
        let (tx, commands) = mpsc::unbounded_channel();
        Self {
            trace: Trace::new(config.record_trace),
            config,
            agents: Vec::new(),
            bus: MessageBus::new(),
            ids: IdGen::new(),
            registry,
            round: 0,
            cursor: 0,
            next_index: 0,
            in_flight: Vec::new(),
            commands,
            handle: SchedulerHandle { tx },
            registered: BTreeSet::new(),
            killed: BTreeSet::new(),
            stopped: false,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(SchedulerConfig::default())
    }

    /// Scheduler running every agent of `system`, in declaration order.
    pub fn from_system(system: &LoadedSystem, config: SchedulerConfig) -> Result<Self> {
        let mut scheduler = Self::new(config);
        for blueprint in &system.agents {
            scheduler.add_agent(blueprint.clone())?;
        }
        info!(system = %system.name, agents = scheduler.agents.len(), "System ready");
        Ok(scheduler)
    }

    pub fn add_agent(&mut self, blueprint: AgentBlueprint) -> Result<()> {
        if self.agent(&blueprint.name).is_some() {
            return Err(AgentError::AgentAlreadyExists(blueprint.name));
        }
        let index = self.next_index;
        let config = AgentConfig {
            selection: blueprint.policy,
            no_applicable: self.config.no_applicable_plan,
            seed: self.config.seed ^ (index as u64 + 1).wrapping_mul(SEED_SPREAD),
        };

        debug!(agent = %blueprint.name, index, "Adding agent");
        let agent = AgentRuntime::new(blueprint.name, index, blueprint.source, config)?;
        self.next_index += 1;
        self.bus.register(agent.name().clone());
        self.killed.remove(agent.name());
        self.agents.push(agent);
        Ok(())
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn agent(&self, name: &AgentName) -> Option<&AgentRuntime> {
        self.agents.iter().find(|a| a.name() == name)
    }

    fn agent_mut(&mut self, name: &AgentName) -> Option<&mut AgentRuntime> {
        self.agents.iter_mut().find(|a| a.name() == name)
    }

    /// Live agents in declaration order.
    pub fn agents(&self) -> impl Iterator<Item = &AgentRuntime> {
        self.agents.iter()
    }

    pub fn is_killed(&self, name: &AgentName) -> bool {
        self.killed.contains(name)
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn pending_messages(&self) -> usize {
        self.bus.pending()
    }

    /// Removes an agent: its intentions and undelivered mail are discarded
    /// and later messages to it fail with an unknown recipient.
    pub fn kill(&mut self, name: &AgentName) -> Result<()> {
        let pos = self
            .agents
            .iter()
            .position(|a| a.name() == name)
            .ok_or_else(|| AgentError::AgentNotFound(name.clone()))?;
        let agent = self.agents.remove(pos);
        let discarded = self.bus.unregister(name);
        self.in_flight.retain(|c| &c.agent != name);
        self.killed.insert(name.clone());

        info!(
            agent = %name,
            intentions = agent.intentions().count(),
            discarded_messages = discarded.len(),
            "Agent killed"
        );
        self.trace.record(self.round, name, TraceEvent::AgentKilled);
        Ok(())
    }

    /// Runs rounds until quiescence, the step limit or a stop request.
    pub async fn run(&mut self, env: &mut dyn Environment) -> RunSummary {
        let start = self.round;
        info!(
            agents = self.agents.len(),
            policy = %self.config.policy,
            seed = self.config.seed,
            "Scheduler starting"
        );

        let termination = loop {
            self.drain_commands();
            self.sync_environment(env);
            if self.stopped {
                break Termination::Stopped;
            }
            if let Some(max) = self.config.max_steps {
                if self.round - start >= max {
                    break Termination::StepLimit;
                }
            }

            self.deliver_due();
            let revision = env.revision();
            match self.pick(revision) {
                Some(idx) => self.run_agent(idx, revision, env).await,
                None if self.in_flight.is_empty() => break Termination::Quiescent,
                // Idle round while actions or timers are outstanding.
                None => {}
            }
            self.round += 1;
        };

        let summary = RunSummary {
            rounds: self.round - start,
            termination,
        };
        info!(rounds = summary.rounds, termination = ?summary.termination, "Scheduler finished");
        summary
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            debug!(?command, "Applying command");
            match command {
                Command::Achieve { agent, goal } => match self.agent_mut(&agent) {
                    Some(runtime) => runtime.post_goal(goal),
                    None => warn!(agent = %agent, "Goal for unknown agent ignored"),
                },
                Command::AddBelief { agent, belief } => {
                    let mut effects = StepEffects::default();
                    match self.agent_mut(&agent) {
                        Some(runtime) => {
                            runtime.add_belief(belief, &mut effects);
                        }
                        None => warn!(agent = %agent, "Belief for unknown agent ignored"),
                    }
                    self.record(&agent, effects.trace);
                }
                Command::Kill(agent) => {
                    if let Err(e) = self.kill(&agent) {
                        warn!(agent = %agent, error = %e, "Kill failed");
                    }
                }
                Command::Stop => self.stopped = true,
            }
        }
    }

    /// Keeps the environment's agent registry in line with the live agents.
    fn sync_environment(&mut self, env: &mut dyn Environment) {
        for agent in &self.agents {
            if self.registered.insert(agent.name().clone()) {
                env.register_agent(agent.name());
            }
        }
        let gone: Vec<AgentName> = self.registered.intersection(&self.killed).cloned().collect();
        for name in gone {
            env.remove_agent(&name);
            self.registered.remove(&name);
        }
    }

    fn deliver_due(&mut self) {
        let round = self.round;
        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.in_flight)
            .into_iter()
            .partition(|c| c.due <= round);
        self.in_flight = pending;

        for completion in due {
            let mut effects = StepEffects::default();
            match self.agent_mut(&completion.agent) {
                Some(agent) => agent.deliver_action_result(
                    completion.intention,
                    &completion.action,
                    completion.result,
                    &mut effects,
                ),
                None => {
                    debug!(agent = %completion.agent, action = %completion.action, "Result for dead agent discarded");
                }
            }
            self.record(&completion.agent, effects.trace);
        }
    }

    /// Next agent to step, or `None` when nobody has work.
    fn pick(&self, revision: u64) -> Option<usize> {
        let has_work = |a: &AgentRuntime| a.has_work(self.bus.has_pending(a.name()), revision);
        match self.config.policy {
            SchedulingPolicy::RoundRobin => {
                let n = self.agents.len();
                let start = self
                    .agents
                    .iter()
                    .position(|a| a.index() >= self.cursor)
                    .unwrap_or(0);
                (0..n)
                    .map(|k| (start + k) % n)
                    .find(|&i| has_work(&self.agents[i]))
            }
            SchedulingPolicy::Priority => self
                .agents
                .iter()
                .enumerate()
                .filter(|(_, a)| has_work(a))
                .fold(None, |best: Option<(usize, i64)>, (i, a)| {
                    let score = a.score(self.round);
                    match best {
                        Some((_, s)) if s >= score => best,
                        _ => Some((i, score)),
                    }
                })
                .map(|(i, _)| i),
        }
    }

    async fn run_agent(&mut self, idx: usize, revision: u64, env: &mut dyn Environment) {
        let name = self.agents[idx].name().clone();
        let mail = self.bus.receive(&name);
        let percepts = if self.agents[idx].needs_perception(revision) {
            Some((env.perceive(&name).await, revision))
        } else {
            None
        };

        let mut ctx = StepContext::new(self.round, self.config.policy, &mut self.ids, &self.registry);
        self.agents[idx].step(mail, percepts, &mut ctx);
        let effects = ctx.into_effects();
        self.cursor = self.agents[idx].index() + 1;

        self.apply(&name, effects, env).await;
    }

    async fn apply(&mut self, name: &AgentName, effects: StepEffects, env: &mut dyn Environment) {
        let StepEffects {
            outgoing,
            actions,
            timers,
            kills,
            stop,
            trace,
        } = effects;
        self.record(name, trace);

        for out in outgoing {
            let recipients: Vec<AgentName> = match out.to {
                Recipient::Agent(to) => vec![to],
                Recipient::All => self
                    .agents
                    .iter()
                    .map(|a| a.name().clone())
                    .filter(|n| n != name)
                    .collect(),
            };
            for to in recipients {
                self.deliver(name, to, out.performative, out.content.clone());
            }
        }

        for pending in actions {
            let result = env.act(name, &pending.action).await;
            if let Err(e) = &result {
                debug!(agent = %name, action = %pending.action, error = %e, "Action failed");
            }
            self.in_flight.push(Completion {
                due: self.round + 1,
                agent: name.clone(),
                intention: pending.intention,
                action: pending.action,
                result,
            });
        }

        for timer in timers {
            self.in_flight.push(Completion {
                due: self.round + timer.rounds,
                agent: name.clone(),
                intention: timer.intention,
                action: timer.action,
                result: Ok(()),
            });
        }

        for victim in kills {
            if let Err(e) = self.kill(&victim) {
                warn!(agent = %name, victim = %victim, error = %e, "Kill failed");
            }
        }

        if stop {
            info!(agent = %name, "Stop requested");
            self.stopped = true;
        }
    }

    fn deliver(&mut self, from: &AgentName, to: AgentName, performative: mas_core::Performative, content: Literal) {
        let message = Message {
            id: self.ids.next_message(),
            sender: from.clone(),
            receiver: to.clone(),
            performative,
            content: content.clone(),
        };
        let id = message.id;
        match self.bus.send(message) {
            Ok(()) => {
                debug!(%id, from = %from, to = %to, %performative, %content, "Message sent");
                self.trace.record(
                    self.round,
                    from,
                    TraceEvent::MessageSent {
                        id,
                        to,
                        performative,
                        content: content.to_string(),
                    },
                );
            }
            Err(_) => {
                warn!(from = %from, to = %to, %content, "Unknown recipient");
                self.trace.record(
                    self.round,
                    from,
                    TraceEvent::UnknownRecipient {
                        to: to.clone(),
                        content: content.to_string(),
                    },
                );
                if let Some(sender) = self.agent_mut(from) {
                    sender.post_unknown_recipient(&to, performative, &content);
                }
            }
        }
    }

    fn record(&mut self, agent: &AgentName, events: Vec<TraceEvent>) {
        for event in events {
            self.trace.record(self.round, agent, event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mas_core::{NullEnvironment, SelectionPolicy};
    use mas_lang::parse_agent;

    fn blueprint(name: &str, src: &str) -> AgentBlueprint {
        AgentBlueprint {
            name: name.into(),
            source: parse_agent(src).unwrap(),
            policy: SelectionPolicy::FirstMatch,
        }
    }

    fn printed(trace: &Trace, agent: &str) -> Vec<String> {
        let name = AgentName::from(agent);
        trace
            .for_agent(&name)
            .filter_map(|e| match &e.event {
                TraceEvent::Printed { text } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_empty_system_is_quiescent() {
        let mut scheduler = Scheduler::with_defaults();
        let summary = scheduler.run(&mut NullEnvironment::default()).await;
        assert_eq!(summary.termination, Termination::Quiescent);
        assert_eq!(summary.rounds, 0);
    }

    #[tokio::test]
    async fn test_duplicate_agent_rejected() {
        let mut scheduler = Scheduler::with_defaults();
        scheduler.add_agent(blueprint("a", "")).unwrap();
        assert!(matches!(
            scheduler.add_agent(blueprint("a", "")),
            Err(AgentError::AgentAlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_step_limit() {
        let mut scheduler = Scheduler::new(SchedulerConfig {
            max_steps: Some(20),
            ..SchedulerConfig::default()
        });
        scheduler
            .add_agent(blueprint("a", "!loop. +!loop <- !loop."))
            .unwrap();
        let summary = scheduler.run(&mut NullEnvironment::default()).await;
        assert_eq!(summary.termination, Termination::StepLimit);
        assert_eq!(summary.rounds, 20);
    }

    #[tokio::test]
    async fn test_stop_mas() {
        let mut scheduler = Scheduler::with_defaults();
        scheduler
            .add_agent(blueprint("a", "!go. +!go <- .stop_mas; .print(after)."))
            .unwrap();
        let summary = scheduler.run(&mut NullEnvironment::default()).await;
        assert_eq!(summary.termination, Termination::Stopped);
        assert!(printed(scheduler.trace(), "a").is_empty());
    }

    #[tokio::test]
    async fn test_handle_commands() {
        let mut scheduler = Scheduler::with_defaults();
        scheduler
            .add_agent(blueprint("a", "+!hello(X) <- .print(X)."))
            .unwrap();
        let handle = scheduler.handle();
        handle
            .achieve("a".into(), mas_lang::parse_literal("hello(world)").unwrap())
            .unwrap();
        scheduler.run(&mut NullEnvironment::default()).await;
        assert_eq!(printed(scheduler.trace(), "a"), vec!["world"]);

        handle.stop().unwrap();
        let summary = scheduler.run(&mut NullEnvironment::default()).await;
        assert_eq!(summary.termination, Termination::Stopped);
    }

    #[tokio::test]
    async fn test_unknown_recipient_event() {
        let mut scheduler = Scheduler::with_defaults();
        scheduler
            .add_agent(blueprint(
                "a",
                "!go.
                 +!go <- .send(ghost, tell, hi).
                 +unknown_recipient(To, _, _) <- .print(lost, \" \", To).",
            ))
            .unwrap();
        scheduler.run(&mut NullEnvironment::default()).await;
        assert_eq!(printed(scheduler.trace(), "a"), vec!["lost ghost"]);
        assert!(scheduler
            .trace()
            .entries()
            .iter()
            .any(|e| matches!(&e.event, TraceEvent::UnknownRecipient { to, .. } if to.as_str() == "ghost")));
    }

    #[tokio::test]
    async fn test_wait_resumes_after_rounds() {
        let mut scheduler = Scheduler::with_defaults();
        scheduler
            .add_agent(blueprint("a", "!go. +!go <- .wait(5); .print(woke)."))
            .unwrap();
        let summary = scheduler.run(&mut NullEnvironment::default()).await;
        assert_eq!(summary.termination, Termination::Quiescent);
        let woke = scheduler
            .trace()
            .entries()
            .iter()
            .find(|e| matches!(&e.event, TraceEvent::Printed { .. }))
            .map(|e| e.round)
            .unwrap();
        assert!(woke >= 5, "woke at round {}", woke);
    }

    #[test]
    fn test_config_from_settings() {
        let settings = RunSettings {
            seed: 9,
            max_steps: None,
            scheduling: SchedulingPolicy::Priority,
            on_no_applicable_plan: NoApplicablePolicy::FailIntention,
        };
        let config = SchedulerConfig::from(&settings);
        assert_eq!(config.seed, 9);
        assert_eq!(config.max_steps, Some(DEFAULT_MAX_STEPS));
        assert_eq!(config.policy, SchedulingPolicy::Priority);
    }
}
