use std::collections::BTreeMap;
use std::sync::Arc;

use mas_core::{Literal, Trigger, TriggerKind, TriggerOp, Unifier};
use mas_lang::Plan;

type Key = (TriggerOp, TriggerKind, bool, String, usize);

fn key_of(trigger: &Trigger) -> Key {
    (
        trigger.op,
        trigger.kind,
        trigger.literal.negated,
        trigger.literal.functor.clone(),
        trigger.literal.arity(),
    )
}

/// Immutable, indexed set of plans. Source order is preserved inside each
/// index bucket; first-match selection depends on it.
#[derive(Debug, Clone, Default)]
pub struct PlanLibrary {
    plans: Vec<Arc<Plan>>,
    index: BTreeMap<Key, Vec<usize>>,
}

impl PlanLibrary {
    pub fn new(plans: Vec<Plan>) -> Self {
        let mut library = Self::default();
        for plan in plans {
            let idx = library.plans.len();
            library.index.entry(key_of(&plan.trigger)).or_default().push(idx);
            library.plans.push(Arc::new(plan));
        }
        library
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Plan>> {
        self.plans.iter()
    }

    /// Plans whose trigger unifies with `trigger`, with the unifier of the
    /// match.
    ///
    /// Plan variables are used as written. Callers rename the event literal
    /// apart first so that its variables cannot clash with the plan's.
    pub fn relevant(&self, trigger: &Trigger) -> Vec<(Arc<Plan>, Unifier)> {
        let Some(bucket) = self.index.get(&key_of(trigger)) else {
            return Vec::new();
        };
        bucket
            .iter()
            .filter_map(|&idx| {
                let plan = &self.plans[idx];
                Unifier::new()
                    .unifies_literal(&plan.trigger.literal, &trigger.literal)
                    .map(|u| (Arc::clone(plan), u))
            })
            .collect()
    }

    /// Whether any `-!g` plan is indexed for the predicate of `goal`,
    /// whatever its annotation patterns.
    pub fn has_failure_plan(&self, goal: &Literal) -> bool {
        let failure = Trigger::new(TriggerOp::Del, TriggerKind::Achieve, goal.clone());
        self.index.contains_key(&key_of(&failure))
    }

    pub fn has_relevant(&self, trigger: &Trigger) -> bool {
        self.index.get(&key_of(trigger)).is_some_and(|bucket| {
            bucket.iter().any(|&idx| {
                Unifier::new()
                    .unifies_literal(&self.plans[idx].trigger.literal, &trigger.literal)
                    .is_some()
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mas_core::Term;
    use mas_lang::{parse_agent, parse_literal};

    fn library(src: &str) -> PlanLibrary {
        PlanLibrary::new(parse_agent(src).unwrap().plans)
    }

    #[test]
    fn test_relevant_plans_in_source_order() {
        let lib = library(
            r#"
            +!go(X) : X > 1 <- .print(big).
            +!go(1) <- .print(one).
            +!stop <- true.
            "#,
        );
        let relevant = lib.relevant(&Trigger::achieve(parse_literal("go(1)").unwrap()));
        assert_eq!(relevant.len(), 2);
        assert_eq!(relevant[0].1.get("X"), Some(&Term::number(1.0)));
        assert!(lib.relevant(&Trigger::achieve(Literal::new("go"))).is_empty());
    }

    #[test]
    fn test_annotation_patterns() {
        let lib = library("+done[source(A)] <- .print(A).");
        let event = Trigger::belief_added(parse_literal("done[source(a)]").unwrap());
        let relevant = lib.relevant(&event);
        assert_eq!(relevant[0].1.get("A"), Some(&Term::atom("a")));

        // A plain `+done` event carries no source and is not relevant.
        assert!(!lib.has_relevant(&Trigger::belief_added(Literal::new("done"))));
    }

    #[test]
    fn test_operator_and_kind_must_match() {
        let lib = library("+!g <- true. -!g <- true.");
        assert_eq!(lib.relevant(&Trigger::achieve(Literal::new("g"))).len(), 1);
        assert!(lib.has_relevant(&Trigger::goal_failure(&Literal::new("g"), "x", "y")));
        assert!(!lib.has_relevant(&Trigger::belief_added(Literal::new("g"))));
    }

    #[test]
    fn test_failure_plan_lookup_ignores_annotations() {
        let lib = library("+!g(X) <- true. -!g(X)[error(no_applicable)] <- true.");
        assert!(lib.has_failure_plan(&parse_literal("g(1)").unwrap()));
        assert!(!lib.has_failure_plan(&Literal::new("g")));
    }
}
