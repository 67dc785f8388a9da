use mas_core::{Literal, Term, Unifier};

use super::{bind, expect_args, ActionContext, InternalAction, Outcome};
use crate::error::{AgentError, Result};

/// `.count(Query, N)`: number of answers for `Query` in the belief base.
pub struct CountAction;

impl InternalAction for CountAction {
    fn name(&self) -> &'static str {
        "count"
    }

    fn execute(&self, args: &[Term], un: &Unifier, ctx: &mut ActionContext<'_>) -> Result<Outcome> {
        expect_args(self.name(), args, 2)?;
        let query = Literal::from_term(un.apply(&args[0]))?;
        let count = ctx.beliefs.query(&query, un, ctx.fresh).len();
        bind(self.name(), un, &args[1], Term::number(count as f64))
    }
}

/// `.length(ListOrString, N)`
pub struct LengthAction;

impl InternalAction for LengthAction {
    fn name(&self) -> &'static str {
        "length"
    }

    fn execute(&self, args: &[Term], un: &Unifier, _ctx: &mut ActionContext<'_>) -> Result<Outcome> {
        expect_args(self.name(), args, 2)?;
        let len = match un.apply(&args[0]) {
            Term::List(items) => items.len(),
            Term::Str(s) => s.chars().count(),
            other => {
                return Err(AgentError::invalid(
                    self.name(),
                    format!("{} is neither a list nor a string", other),
                ))
            }
        };
        bind(self.name(), un, &args[1], Term::number(len as f64))
    }
}

/// `.member(X, List)`: binds `X` to the first element it unifies with.
pub struct MemberAction;

impl InternalAction for MemberAction {
    fn name(&self) -> &'static str {
        "member"
    }

    fn execute(&self, args: &[Term], un: &Unifier, _ctx: &mut ActionContext<'_>) -> Result<Outcome> {
        expect_args(self.name(), args, 2)?;
        let list = un.apply(&args[1]);
        let items = list
            .as_list()
            .ok_or_else(|| AgentError::invalid(self.name(), format!("{} is not a list", list)))?;
        items
            .iter()
            .find_map(|item| un.unifies(&args[0], item))
            .map(Outcome::Continue)
            .ok_or_else(|| AgentError::failed(self.name(), format!("no member of {} matches", list)))
    }
}
