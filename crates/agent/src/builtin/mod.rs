//! Internal actions: `.name(args)` steps run synchronously by the agent.

pub mod collections;
pub mod comm;
pub mod control;
pub mod io;
pub mod random;

use rand::rngs::StdRng;
use std::collections::BTreeMap;

use mas_core::{AgentName, IntentionId, Term, Unifier};

use crate::belief::BeliefBase;
use crate::context::StepEffects;
use crate::error::{AgentError, Result};

pub use collections::{CountAction, LengthAction, MemberAction};
pub use comm::{BroadcastAction, SendAction};
pub use control::{FailAction, KillAgentAction, MyNameAction, StopMasAction, WaitAction};
pub use io::PrintAction;
pub use random::{RandIntAction, RandomAction};

pub enum Outcome {
    /// Step done; continue with these bindings
    Continue(Unifier),
    /// Suspend the intention for a number of rounds
    Suspend { rounds: u64 },
}

/// What an internal action can see and touch of its agent.
pub struct ActionContext<'a> {
    pub agent: &'a AgentName,
    pub intention: IntentionId,
    pub round: u64,
    pub beliefs: &'a BeliefBase,
    pub fresh: &'a mut u64,
    pub rng: &'a mut StdRng,
    pub effects: &'a mut StepEffects,
}

pub trait InternalAction: Send + Sync {
    fn name(&self) -> &'static str;

    fn execute(&self, args: &[Term], un: &Unifier, ctx: &mut ActionContext<'_>) -> Result<Outcome>;
}

pub(crate) fn expect_args(action: &str, args: &[Term], count: usize) -> Result<()> {
    if args.len() == count {
        Ok(())
    } else {
        Err(AgentError::invalid(
            action,
            format!("expected {} arguments, got {}", count, args.len()),
        ))
    }
}

/// Unifies an output argument with a computed value.
pub(crate) fn bind(action: &str, un: &Unifier, arg: &Term, value: Term) -> Result<Outcome> {
    un.unifies(arg, &value)
        .map(Outcome::Continue)
        .ok_or_else(|| AgentError::failed(action, format!("{} does not unify with {}", arg, value)))
}

pub(crate) fn integer_arg(action: &str, un: &Unifier, arg: &Term) -> Result<i64> {
    let value = un.eval(arg)?;
    if value.fract() == 0.0 {
        Ok(value as i64)
    } else {
        Err(AgentError::invalid(action, format!("{} is not an integer", value)))
    }
}

pub(crate) fn name_arg(action: &str, un: &Unifier, arg: &Term) -> Result<AgentName> {
    let term = un.apply(arg);
    term.as_text()
        .map(AgentName::new)
        .ok_or_else(|| AgentError::invalid(action, format!("{} is not an agent name", term)))
}

/// Internal actions by name.
pub struct ActionRegistry {
    actions: BTreeMap<&'static str, Box<dyn InternalAction>>,
}

impl ActionRegistry {
    pub fn empty() -> Self {
        Self {
            actions: BTreeMap::new(),
        }
    }

    /// Registry with every built-in action.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(SendAction));
        registry.register(Box::new(BroadcastAction));
        registry.register(Box::new(PrintAction::print()));
        registry.register(Box::new(PrintAction::println()));
        registry.register(Box::new(MyNameAction));
        registry.register(Box::new(KillAgentAction));
        registry.register(Box::new(StopMasAction));
        registry.register(Box::new(WaitAction));
        registry.register(Box::new(FailAction));
        registry.register(Box::new(RandIntAction));
        registry.register(Box::new(RandomAction));
        registry.register(Box::new(CountAction));
        registry.register(Box::new(LengthAction));
        registry.register(Box::new(MemberAction));
        registry
    }

    /// Adds `action`, replacing any action with the same name.
    pub fn register(&mut self, action: Box<dyn InternalAction>) {
        self.actions.insert(action.name(), action);
    }

    pub fn get(&self, name: &str) -> Option<&dyn InternalAction> {
        self.actions.get(name).map(|a| a.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.actions.keys().copied()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use rand::SeedableRng;

    /// Owns everything an `ActionContext` borrows.
    pub struct Fixture {
        pub agent: AgentName,
        pub beliefs: BeliefBase,
        pub fresh: u64,
        pub rng: StdRng,
        pub effects: StepEffects,
    }

    impl Fixture {
        pub fn new(agent: &str) -> Self {
            Self {
                agent: AgentName::from(agent),
                beliefs: BeliefBase::new(),
                fresh: 0,
                rng: StdRng::seed_from_u64(42),
                effects: StepEffects::default(),
            }
        }

        pub fn run(&mut self, action: &dyn InternalAction, args: Vec<Term>) -> Result<Outcome> {
            let mut ctx = ActionContext {
                agent: &self.agent,
                intention: IntentionId(1),
                round: 0,
                beliefs: &self.beliefs,
                fresh: &mut self.fresh,
                rng: &mut self.rng,
                effects: &mut self.effects,
            };
            action.execute(&args, &Unifier::new(), &mut ctx)
        }

        pub fn bound(&mut self, action: &dyn InternalAction, args: Vec<Term>, var: &str) -> Term {
            match self.run(action, args) {
                Ok(Outcome::Continue(u)) => u.apply(&Term::var(var)),
                Ok(Outcome::Suspend { .. }) => panic!("unexpected suspension"),
                Err(e) => panic!("action failed: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry() {
        let registry = ActionRegistry::standard();
        for name in ["send", "print", "println", "rand_int", "random", "wait", "stop_mas"] {
            assert!(registry.get(name).is_some(), "missing .{}", name);
        }
        assert!(registry.get("succeed").is_none());
    }

    #[test]
    fn test_expect_args() {
        assert!(expect_args("x", &[Term::atom("a")], 1).is_ok());
        assert!(matches!(
            expect_args("x", &[], 1),
            Err(AgentError::InvalidArguments { .. })
        ));
    }
}
