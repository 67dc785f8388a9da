use tracing::info;

use mas_core::{Term, Unifier};

use super::{ActionContext, InternalAction, Outcome};
use crate::error::Result;
use crate::trace::TraceEvent;

/// `.print(...)` and `.println(...)`: concatenates the arguments, strings
/// without quotes, and logs the line for the agent.
pub struct PrintAction {
    name: &'static str,
}

impl PrintAction {
    pub fn print() -> Self {
        Self { name: "print" }
    }

    pub fn println() -> Self {
        Self { name: "println" }
    }
}

pub(crate) fn render(args: &[Term], un: &Unifier) -> String {
    args.iter()
        .map(|arg| match un.apply(arg) {
            Term::Str(s) => s,
            other => other.to_string(),
        })
        .collect()
}

impl InternalAction for PrintAction {
    fn name(&self) -> &'static str {
        self.name
    }

    fn execute(&self, args: &[Term], un: &Unifier, ctx: &mut ActionContext<'_>) -> Result<Outcome> {
        let text = render(args, un);
        info!(target: "mas::print", agent = %ctx.agent, "{}", text);
        ctx.effects.trace.push(TraceEvent::Printed { text });
        Ok(Outcome::Continue(un.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::test_support::Fixture;

    #[test]
    fn test_render_binds_and_unquotes() {
        let un = Unifier::new()
            .unifies(&Term::var("X"), &Term::number(3))
            .unwrap();
        let args = vec![Term::string("x = "), Term::var("X"), Term::atom(" ok")];
        assert_eq!(render(&args, &un), "x = 3 ok");
    }

    #[test]
    fn test_print_traces_text() {
        let mut fx = Fixture::new("a");
        assert!(fx.run(&PrintAction::println(), vec![Term::string("hello")]).is_ok());
        assert_eq!(
            fx.effects.trace,
            vec![TraceEvent::Printed {
                text: "hello".into()
            }]
        );
    }
}
