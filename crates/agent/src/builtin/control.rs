use tracing::info;

use mas_core::{Term, Unifier};

use super::{bind, expect_args, integer_arg, name_arg, ActionContext, InternalAction, Outcome};
use crate::error::{AgentError, Result};

/// `.my_name(N)`
pub struct MyNameAction;

impl InternalAction for MyNameAction {
    fn name(&self) -> &'static str {
        "my_name"
    }

    fn execute(&self, args: &[Term], un: &Unifier, ctx: &mut ActionContext<'_>) -> Result<Outcome> {
        expect_args(self.name(), args, 1)?;
        bind(self.name(), un, &args[0], Term::atom(ctx.agent.as_str()))
    }
}

/// `.kill_agent(N)`; takes effect after the current step.
pub struct KillAgentAction;

impl InternalAction for KillAgentAction {
    fn name(&self) -> &'static str {
        "kill_agent"
    }

    fn execute(&self, args: &[Term], un: &Unifier, ctx: &mut ActionContext<'_>) -> Result<Outcome> {
        expect_args(self.name(), args, 1)?;
        let victim = name_arg(self.name(), un, &args[0])?;
        info!(agent = %ctx.agent, victim = %victim, "Kill requested");
        ctx.effects.kills.push(victim);
        Ok(Outcome::Continue(un.clone()))
    }
}

/// `.stop_mas`
pub struct StopMasAction;

impl InternalAction for StopMasAction {
    fn name(&self) -> &'static str {
        "stop_mas"
    }

    fn execute(&self, _args: &[Term], un: &Unifier, ctx: &mut ActionContext<'_>) -> Result<Outcome> {
        info!(agent = %ctx.agent, "Stop requested");
        ctx.effects.stop = true;
        Ok(Outcome::Continue(un.clone()))
    }
}

/// `.wait(N)`: suspends the intention for `N` scheduling rounds.
pub struct WaitAction;

impl InternalAction for WaitAction {
    fn name(&self) -> &'static str {
        "wait"
    }

    fn execute(&self, args: &[Term], un: &Unifier, _ctx: &mut ActionContext<'_>) -> Result<Outcome> {
        expect_args(self.name(), args, 1)?;
        let rounds = integer_arg(self.name(), un, &args[0])?;
        if rounds < 0 {
            return Err(AgentError::invalid(self.name(), "negative duration"));
        }
        if rounds == 0 {
            Ok(Outcome::Continue(un.clone()))
        } else {
            Ok(Outcome::Suspend {
                rounds: rounds as u64,
            })
        }
    }
}

/// `.fail`: fails the current intention.
pub struct FailAction;

impl InternalAction for FailAction {
    fn name(&self) -> &'static str {
        "fail"
    }

    fn execute(&self, _args: &[Term], _un: &Unifier, _ctx: &mut ActionContext<'_>) -> Result<Outcome> {
        Err(AgentError::failed(self.name(), "explicit failure"))
    }
}
