use serde::{Deserialize, Serialize};
use std::fmt;

use crate::term::{Literal, Term};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TriggerOp {
    Add,
    Del,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TriggerKind {
    Belief,
    Achieve,
    Test,
}

/// Triggering event: `+b`, `-b`, `+!g`, `-!g`, `+?q`, `-?q`.
///
/// Plans carry a trigger pattern; events carry a concrete trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub op: TriggerOp,
    pub kind: TriggerKind,
    pub literal: Literal,
}

impl Trigger {
    pub fn new(op: TriggerOp, kind: TriggerKind, literal: Literal) -> Self {
        Self { op, kind, literal }
    }

    pub fn belief_added(literal: Literal) -> Self {
        Self::new(TriggerOp::Add, TriggerKind::Belief, literal)
    }

    pub fn belief_removed(literal: Literal) -> Self {
        Self::new(TriggerOp::Del, TriggerKind::Belief, literal)
    }

    pub fn achieve(literal: Literal) -> Self {
        Self::new(TriggerOp::Add, TriggerKind::Achieve, literal)
    }

    pub fn test(literal: Literal) -> Self {
        Self::new(TriggerOp::Add, TriggerKind::Test, literal)
    }

    /// `-!g[error(Kind), error_msg(Msg)]`, posted when an intention fails
    /// while pursuing `g`.
    pub fn goal_failure(goal: &Literal, kind: &str, message: &str) -> Self {
        let literal = goal
            .clone()
            .with_annot(Term::Struct(Literal::new("error").with_arg(Term::atom(kind))))
            .with_annot(Term::Struct(
                Literal::new("error_msg").with_arg(Term::string(message)),
            ));
        Self::new(TriggerOp::Del, TriggerKind::Achieve, literal)
    }

    pub fn is_goal(&self) -> bool {
        matches!(self.kind, TriggerKind::Achieve | TriggerKind::Test)
    }

    pub fn is_achieve_addition(&self) -> bool {
        self.op == TriggerOp::Add && self.kind == TriggerKind::Achieve
    }

    pub fn is_goal_failure(&self) -> bool {
        self.op == TriggerOp::Del && self.kind == TriggerKind::Achieve
    }

    /// Same operator, kind and predicate; the cheap pre-filter before
    /// unification.
    pub fn same_shape(&self, other: &Trigger) -> bool {
        self.op == other.op && self.kind == other.kind && self.literal.same_predicate(&other.literal)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            TriggerOp::Add => "+",
            TriggerOp::Del => "-",
        };
        let kind = match self.kind {
            TriggerKind::Belief => "",
            TriggerKind::Achieve => "!",
            TriggerKind::Test => "?",
        };
        write!(f, "{}{}{}", op, kind, self.literal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Trigger::achieve(Literal::new("goal")).to_string(), "+!goal");
        assert_eq!(
            Trigger::belief_removed(Literal::new("at").with_arg(Term::atom("truck"))).to_string(),
            "-at(truck)"
        );
        assert_eq!(Trigger::test(Literal::new("q")).to_string(), "+?q");
    }

    #[test]
    fn test_goal_failure_annotations() {
        let t = Trigger::goal_failure(&Literal::new("deliver"), "action_failed", "blocked");
        assert!(t.is_goal_failure());
        assert_eq!(
            t.to_string(),
            "-!deliver[error(action_failed),error_msg(\"blocked\")]"
        );
    }

    #[test]
    fn test_same_shape() {
        let a = Trigger::achieve(Literal::new("g").with_arg(Term::var("X")));
        let b = Trigger::achieve(Literal::new("g").with_arg(Term::number(1.0)));
        let c = Trigger::belief_added(Literal::new("g").with_arg(Term::number(1.0)));
        assert!(a.same_shape(&b));
        assert!(!a.same_shape(&c));
    }
}
