use serde::{Deserialize, Serialize};
use std::fmt;

use mas_core::{Literal, RelOp, Term, Trigger};

/// Plan context, rule body or body constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    True,
    False,
    Literal(Literal),
    Not(Box<Condition>),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Compare(Term, RelOp, Term),
}

impl Condition {
    pub fn and(left: Condition, right: Condition) -> Self {
        Condition::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Condition, right: Condition) -> Self {
        Condition::Or(Box::new(left), Box::new(right))
    }

    pub fn rename_vars(&self, suffix: &str) -> Condition {
        match self {
            Condition::True | Condition::False => self.clone(),
            Condition::Literal(lit) => Condition::Literal(lit.rename_vars(suffix)),
            Condition::Not(c) => Condition::Not(Box::new(c.rename_vars(suffix))),
            Condition::And(l, r) => Condition::and(l.rename_vars(suffix), r.rename_vars(suffix)),
            Condition::Or(l, r) => Condition::or(l.rename_vars(suffix), r.rename_vars(suffix)),
            Condition::Compare(l, op, r) => {
                Condition::Compare(l.rename_vars(suffix), *op, r.rename_vars(suffix))
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::True => f.write_str("true"),
            Condition::False => f.write_str("false"),
            Condition::Literal(lit) => write!(f, "{}", lit),
            Condition::Not(c) => write!(f, "not ({})", c),
            Condition::And(l, r) => write!(f, "{} & {}", l, r),
            Condition::Or(l, r) => write!(f, "({} | {})", l, r),
            Condition::Compare(l, op, r) => write!(f, "{} {} {}", l, op, r),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BodyStep {
    /// `!g`: post a sub-goal and wait for it
    Achieve(Literal),
    /// `!!g`: post a goal as a new intention
    AchieveAsync(Literal),
    /// `?b`
    Test(Literal),
    /// `+b`
    AddBelief(Literal),
    /// `-b`
    RemoveBelief(Literal),
    /// `-+b`
    ReplaceBelief(Literal),
    /// `.name(args)`; the functor carries the name without the dot
    Internal(Literal),
    /// Environment action
    Action(Literal),
    Constraint(Condition),
    If {
        condition: Condition,
        then_branch: Vec<BodyStep>,
        else_branch: Vec<BodyStep>,
    },
}

impl fmt::Display for BodyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyStep::Achieve(l) => write!(f, "!{}", l),
            BodyStep::AchieveAsync(l) => write!(f, "!!{}", l),
            BodyStep::Test(l) => write!(f, "?{}", l),
            BodyStep::AddBelief(l) => write!(f, "+{}", l),
            BodyStep::RemoveBelief(l) => write!(f, "-{}", l),
            BodyStep::ReplaceBelief(l) => write!(f, "-+{}", l),
            BodyStep::Internal(l) => write!(f, ".{}", l),
            BodyStep::Action(l) => write!(f, "{}", l),
            BodyStep::Constraint(c) => write!(f, "{}", c),
            BodyStep::If { condition, .. } => write!(f, "if ({}) {{ ... }}", condition),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub label: Option<Literal>,
    pub trigger: Trigger,
    pub context: Condition,
    pub body: Vec<BodyStep>,
}

impl Plan {
    pub fn new(trigger: Trigger) -> Self {
        Self {
            label: None,
            trigger,
            context: Condition::True,
            body: Vec::new(),
        }
    }

    /// Value of a `priority(N)` label annotation, 0 otherwise.
    pub fn priority(&self) -> i64 {
        self.label
            .as_ref()
            .and_then(|label| {
                label.annots.iter().find_map(|annot| match annot {
                    Term::Struct(l) if l.functor == "priority" && l.args.len() == 1 => {
                        l.args[0].as_integer()
                    }
                    _ => None,
                })
            })
            .unwrap_or(0)
    }

    pub fn label_name(&self) -> Option<&str> {
        self.label.as_ref().map(|l| l.functor.as_str())
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(label) = &self.label {
            write!(f, "@{} ", label)?;
        }
        write!(f, "{}", self.trigger)?;
        if self.context != Condition::True {
            write!(f, " : {}", self.context)?;
        }
        Ok(())
    }
}

/// `head :- body.`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub head: Literal,
    pub body: Condition,
}

impl Rule {
    pub fn rename_vars(&self, suffix: &str) -> Rule {
        Rule {
            head: self.head.rename_vars(suffix),
            body: self.body.rename_vars(suffix),
        }
    }
}

/// Parsed content of one agent source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSource {
    pub beliefs: Vec<Literal>,
    pub rules: Vec<Rule>,
    pub goals: Vec<Literal>,
    pub plans: Vec<Plan>,
}

impl AgentSource {
    pub fn is_empty(&self) -> bool {
        self.beliefs.is_empty()
            && self.rules.is_empty()
            && self.goals.is_empty()
            && self.plans.is_empty()
    }

    /// Appends `other` after this source's own clauses.
    pub fn extend(&mut self, other: AgentSource) {
        self.beliefs.extend(other.beliefs);
        self.rules.extend(other.rules);
        self.goals.extend(other.goals);
        self.plans.extend(other.plans);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_priority_from_label() {
        let mut plan = Plan::new(Trigger::achieve(Literal::new("go")));
        assert_eq!(plan.priority(), 0);
        plan.label = Some(
            Literal::new("urgent")
                .with_annot(Term::Struct(Literal::new("priority").with_arg(Term::number(3.0)))),
        );
        assert_eq!(plan.priority(), 3);
        assert_eq!(plan.label_name(), Some("urgent"));
        assert_eq!(plan.to_string(), "@urgent[priority(3)] +!go");
    }

    #[test]
    fn test_rule_rename() {
        let rule = Rule {
            head: Literal::new("near").with_arg(Term::var("X")),
            body: Condition::Compare(Term::var("X"), RelOp::Lt, Term::number(2.0)),
        };
        let renamed = rule.rename_vars("r1");
        assert_eq!(renamed.head.args[0], Term::var("X__r1"));
        assert_eq!(
            renamed.body,
            Condition::Compare(Term::var("X__r1"), RelOp::Lt, Term::number(2.0))
        );
    }
}
