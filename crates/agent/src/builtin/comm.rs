use tracing::debug;

use mas_core::{Literal, Performative, Term, Unifier};

use super::{expect_args, ActionContext, InternalAction, Outcome};
use crate::context::{Outgoing, Recipient};
use crate::error::{AgentError, Result};

fn performative(action: &str, un: &Unifier, arg: &Term) -> Result<Performative> {
    let term = un.apply(arg);
    term.as_text()
        .ok_or_else(|| AgentError::invalid(action, format!("{} is not a performative", term)))?
        .parse()
        .map_err(AgentError::from)
}

fn content(un: &Unifier, arg: &Term) -> Result<Literal> {
    Ok(Literal::from_term(un.apply(arg))?)
}

/// `.send(Receiver, Performative, Content)`; `Receiver` may be a list.
pub struct SendAction;

impl InternalAction for SendAction {
    fn name(&self) -> &'static str {
        "send"
    }

    fn execute(&self, args: &[Term], un: &Unifier, ctx: &mut ActionContext<'_>) -> Result<Outcome> {
        expect_args(self.name(), args, 3)?;
        let performative = performative(self.name(), un, &args[1])?;
        let content = content(un, &args[2])?;

        let receivers = match un.apply(&args[0]) {
            Term::List(items) => items,
            single => vec![single],
        };
        for receiver in receivers {
            let to = receiver.as_text().ok_or_else(|| {
                AgentError::invalid(self.name(), format!("{} is not an agent name", receiver))
            })?;
            debug!(agent = %ctx.agent, to, %performative, %content, "Queueing message");
            ctx.effects.send(to.into(), performative, content.clone());
        }
        Ok(Outcome::Continue(un.clone()))
    }
}

/// `.broadcast(Performative, Content)` to every other agent.
pub struct BroadcastAction;

impl InternalAction for BroadcastAction {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    fn execute(&self, args: &[Term], un: &Unifier, ctx: &mut ActionContext<'_>) -> Result<Outcome> {
        expect_args(self.name(), args, 2)?;
        ctx.effects.outgoing.push(Outgoing {
            to: Recipient::All,
            performative: performative(self.name(), un, &args[0])?,
            content: content(un, &args[1])?,
        });
        Ok(Outcome::Continue(un.clone()))
    }
}
