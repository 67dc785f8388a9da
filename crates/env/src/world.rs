//! A generic percept store driven by agent actions.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;

use mas_core::{ActionError, AgentName, Environment, Literal, Term, Unifier};

/// Custom action handler. Receives the percept state, the acting agent and
/// the fully instantiated action.
pub type ActionHandler =
    Box<dyn Fn(&mut WorldState, &AgentName, &Literal) -> Result<(), ActionError> + Send + Sync>;

/// Global percepts plus per-agent percepts, with a revision counter bumped
/// on every change.
#[derive(Debug, Default, Clone)]
pub struct WorldState {
    global: Vec<Literal>,
    agents: BTreeMap<AgentName, Vec<Literal>>,
    revision: u64,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a percept seen by every agent. Returns false if already present.
    pub fn add_global(&mut self, percept: Literal) -> bool {
        if self.global.contains(&percept) {
            return false;
        }
        self.global.push(percept);
        self.revision += 1;
        true
    }

    /// Removes every global percept unifying with `pattern`.
    pub fn remove_global(&mut self, pattern: &Literal) -> usize {
        let removed = remove_matching(&mut self.global, pattern);
        if removed > 0 {
            self.revision += 1;
        }
        removed
    }

    /// Adds a percept seen only by `agent`.
    pub fn add_for(&mut self, agent: &AgentName, percept: Literal) -> bool {
        let percepts = self.agents.entry(agent.clone()).or_default();
        if percepts.contains(&percept) {
            return false;
        }
        percepts.push(percept);
        self.revision += 1;
        true
    }

    pub fn remove_for(&mut self, agent: &AgentName, pattern: &Literal) -> usize {
        let removed = self
            .agents
            .get_mut(agent)
            .map_or(0, |percepts| remove_matching(percepts, pattern));
        if removed > 0 {
            self.revision += 1;
        }
        removed
    }

    /// Global percepts followed by the agent's own, in insertion order.
    pub fn percepts(&self, agent: &AgentName) -> Vec<Literal> {
        let mut out = self.global.clone();
        if let Some(own) = self.agents.get(agent) {
            out.extend(own.iter().cloned());
        }
        out
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_registered(&self, agent: &AgentName) -> bool {
        self.agents.contains_key(agent)
    }

    fn register(&mut self, agent: &AgentName) {
        self.agents.entry(agent.clone()).or_default();
    }

    fn unregister(&mut self, agent: &AgentName) {
        if self.agents.remove(agent).is_some_and(|p| !p.is_empty()) {
            self.revision += 1;
        }
    }
}

fn remove_matching(percepts: &mut Vec<Literal>, pattern: &Literal) -> usize {
    let before = percepts.len();
    percepts.retain(|p| Unifier::new().unifies_literal(pattern, p).is_none());
    before - percepts.len()
}

/// Environment whose actions edit percepts directly.
///
/// Built-in actions:
/// - `add_percept(P)` adds `P` to the acting agent's percepts
/// - `remove_percept(P)` removes percepts matching `P`, own and global
/// - `tell_all(P)` adds `P` as a global percept
///
/// Other actions go to handlers registered with [`WorldEnvironment::on_action`].
#[derive(Default)]
pub struct WorldEnvironment {
    state: WorldState,
    handlers: BTreeMap<String, ActionHandler>,
}

impl WorldEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_percepts(percepts: impl IntoIterator<Item = Literal>) -> Self {
        let mut env = Self::new();
        for p in percepts {
            env.state.add_global(p);
        }
        env
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut WorldState {
        &mut self.state
    }

    /// Registers a handler for actions with functor `name`. Built-in
    /// action names cannot be overridden.
    pub fn on_action(&mut self, name: impl Into<String>, handler: ActionHandler) {
        self.handlers.insert(name.into(), handler);
    }

    fn percept_arg(action: &Literal) -> Result<Literal, ActionError> {
        match action.args.as_slice() {
            [term] => literal_arg(&action.functor, term),
            args => Err(ActionError::invalid(
                &action.functor,
                format!("expected 1 argument, got {}", args.len()),
            )),
        }
    }
}

fn literal_arg(action: &str, term: &Term) -> Result<Literal, ActionError> {
    if !term.is_ground() {
        return Err(ActionError::invalid(action, format!("{} is not ground", term)));
    }
    Literal::from_term(term.clone()).map_err(|e| ActionError::invalid(action, e.to_string()))
}

#[async_trait]
impl Environment for WorldEnvironment {
    async fn perceive(&self, agent: &AgentName) -> Vec<Literal> {
        self.state.percepts(agent)
    }

    async fn act(&mut self, agent: &AgentName, action: &Literal) -> Result<(), ActionError> {
        debug!(agent = %agent, action = %action, "World action");
        match action.functor.as_str() {
            "add_percept" => {
                let percept = Self::percept_arg(action)?;
                self.state.add_for(agent, percept);
                Ok(())
            }
            "remove_percept" => {
                let pattern = Self::percept_arg(action)?;
                self.state.remove_for(agent, &pattern);
                self.state.remove_global(&pattern);
                Ok(())
            }
            "tell_all" => {
                let percept = Self::percept_arg(action)?;
                self.state.add_global(percept);
                Ok(())
            }
            name => match self.handlers.get(name) {
                Some(handler) => handler(&mut self.state, agent, action),
                None => Err(ActionError::UnknownAction(action.to_string())),
            },
        }
    }

    fn register_agent(&mut self, agent: &AgentName) {
        self.state.register(agent);
    }

    fn remove_agent(&mut self, agent: &AgentName) {
        self.state.unregister(agent);
    }

    fn revision(&self) -> u64 {
        self.state.revision()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(functor: &str, args: Vec<Term>) -> Literal {
        Literal::new(functor).with_args(args)
    }

    #[tokio::test]
    async fn test_percept_actions() {
        let mut env = WorldEnvironment::with_percepts([Literal::new("day")]);
        let a = AgentName::from("a");
        let b = AgentName::from("b");
        env.register_agent(&a);
        env.register_agent(&b);

        let door = lit("door", vec![Term::atom("open")]);
        env.act(&a, &lit("add_percept", vec![Term::structure(door.clone())]))
            .await
            .unwrap();
        assert_eq!(env.perceive(&a).await, vec![Literal::new("day"), door.clone()]);
        assert_eq!(env.perceive(&b).await, vec![Literal::new("day")]);

        env.act(&b, &lit("tell_all", vec![Term::atom("alarm")]))
            .await
            .unwrap();
        assert!(env.perceive(&a).await.contains(&Literal::new("alarm")));

        // Pattern removal reaches both the agent's and the global percepts.
        let pattern = lit("door", vec![Term::var("State")]);
        env.act(&a, &lit("remove_percept", vec![Term::structure(pattern)]))
            .await
            .unwrap();
        env.act(&a, &lit("remove_percept", vec![Term::atom("alarm")]))
            .await
            .unwrap();
        assert_eq!(env.perceive(&a).await, vec![Literal::new("day")]);
    }

    #[tokio::test]
    async fn test_revision_tracks_changes() {
        let mut env = WorldEnvironment::new();
        let a = AgentName::from("a");
        let start = env.revision();

        env.act(&a, &lit("tell_all", vec![Term::atom("x")])).await.unwrap();
        let after_add = env.revision();
        assert!(after_add > start);

        // Re-adding an existing percept changes nothing.
        env.act(&a, &lit("tell_all", vec![Term::atom("x")])).await.unwrap();
        assert_eq!(env.revision(), after_add);
    }

    #[tokio::test]
    async fn test_invalid_and_unknown_actions() {
        let mut env = WorldEnvironment::new();
        let a = AgentName::from("a");

        let err = env
            .act(&a, &lit("add_percept", vec![Term::var("X")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::InvalidArguments { .. }));

        let err = env.act(&a, &Literal::new("fly")).await.unwrap_err();
        assert_eq!(err, ActionError::UnknownAction("fly".to_string()));
    }

    #[tokio::test]
    async fn test_custom_handler() {
        let mut env = WorldEnvironment::new();
        env.on_action(
            "press",
            Box::new(|state, agent, _action| {
                state.add_for(agent, Literal::new("pressed"));
                Ok(())
            }),
        );
        let a = AgentName::from("a");
        env.act(&a, &Literal::new("press")).await.unwrap();
        assert_eq!(env.perceive(&a).await, vec![Literal::new("pressed")]);
    }

    #[test]
    fn test_remove_agent_drops_its_percepts() {
        let mut env = WorldEnvironment::new();
        let a = AgentName::from("a");
        env.state_mut().add_for(&a, Literal::new("mine"));
        let rev = env.revision();
        env.remove_agent(&a);
        assert!(!env.state().is_registered(&a));
        assert!(env.revision() > rev);
    }
}
