use std::collections::BTreeMap;

use mas_core::{Literal, Term, Unifier};
use mas_lang::{Condition, Rule};
use tracing::warn;

/// Maximum rule nesting when answering a query.
pub const MAX_RULE_DEPTH: usize = 64;

type Key = (bool, String, usize);

fn key_of(lit: &Literal) -> Key {
    (lit.negated, lit.functor.clone(), lit.arity())
}

/// Per-agent store of ground beliefs and rules.
///
/// Beliefs that differ only in their annotations are one belief: adding
/// merges annotation sets, and a belief disappears once its last `source`
/// annotation is removed. Buckets keep insertion order so queries answer in
/// the order facts were learned.
#[derive(Debug, Clone, Default)]
pub struct BeliefBase {
    facts: BTreeMap<Key, Vec<Literal>>,
    rules: Vec<Rule>,
}

impl BeliefBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.facts.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.values().all(Vec::is_empty)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Literal> {
        self.facts.values().flatten()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Stored belief equal to `lit` up to annotations.
    pub fn find(&self, lit: &Literal) -> Option<&Literal> {
        self.facts
            .get(&key_of(lit))
            .and_then(|bucket| bucket.iter().find(|b| b.same_belief(lit)))
    }

    pub fn contains(&self, lit: &Literal) -> bool {
        self.find(lit).is_some()
    }

    /// Adds a ground belief. Returns `true` when the base changed, either by
    /// a new belief or by new annotations on an existing one.
    pub fn add(&mut self, lit: Literal) -> bool {
        debug_assert!(lit.is_ground(), "beliefs must be ground: {}", lit);
        let bucket = self.facts.entry(key_of(&lit)).or_default();
        match bucket.iter_mut().find(|b| b.same_belief(&lit)) {
            Some(existing) => {
                let mut changed = false;
                for annot in lit.annots {
                    changed |= existing.add_annot(annot);
                }
                changed
            }
            None => {
                bucket.push(lit);
                true
            }
        }
    }

    /// Removes the annotations of `lit` from the matching belief, or the
    /// whole belief when `lit` has none. A belief left without any source is
    /// dropped. Returns the belief as it was removed, for the `-b` event.
    pub fn remove(&mut self, lit: &Literal) -> Option<Literal> {
        let key = key_of(lit);
        let bucket = self.facts.get_mut(&key)?;
        let idx = bucket.iter().position(|b| b.same_belief(lit))?;

        let removed = if lit.annots.is_empty() {
            bucket.remove(idx)
        } else {
            let belief = &mut bucket[idx];
            let mut removed = belief.without_annots();
            for annot in &lit.annots {
                if belief.remove_annot(annot) {
                    removed.add_annot(annot.clone());
                }
            }
            if removed.annots.is_empty() {
                return None;
            }
            if belief.sources().next().is_none() {
                bucket.remove(idx);
            }
            removed
        };

        if bucket.is_empty() {
            self.facts.remove(&key);
        }
        Some(removed)
    }

    /// Beliefs carrying `source(source)`, in storage order.
    pub fn with_source(&self, source: &Term) -> Vec<Literal> {
        self.iter().filter(|b| b.has_source(source)).cloned().collect()
    }

    /// Facts unifying with `pattern` under `un`. Rules are not consulted.
    pub fn matching(&self, pattern: &Literal, un: &Unifier) -> Vec<Unifier> {
        self.facts
            .get(&key_of(pattern))
            .map(|bucket| {
                bucket
                    .iter()
                    .filter_map(|fact| un.unifies_literal(pattern, fact))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every answer for `pattern`: matching facts first, then rule
    /// derivations. `fresh` numbers rule variable renamings and must keep
    /// growing across queries that share a unifier.
    pub fn query(&self, pattern: &Literal, un: &Unifier, fresh: &mut u64) -> Vec<Unifier> {
        self.query_at(pattern, un, fresh, 0)
    }

    /// All unifiers under which `cond` holds.
    pub fn solve(&self, cond: &Condition, un: &Unifier, fresh: &mut u64) -> Vec<Unifier> {
        self.solve_at(cond, un, fresh, 0)
    }

    /// First unifier under which `cond` holds.
    pub fn holds(&self, cond: &Condition, un: &Unifier, fresh: &mut u64) -> Option<Unifier> {
        self.solve(cond, un, fresh).into_iter().next()
    }

    fn query_at(
        &self,
        pattern: &Literal,
        un: &Unifier,
        fresh: &mut u64,
        depth: usize,
    ) -> Vec<Unifier> {
        let mut answers = self.matching(pattern, un);

        let rules: Vec<&Rule> = self
            .rules
            .iter()
            .filter(|r| r.head.same_predicate(pattern))
            .collect();
        if rules.is_empty() {
            return answers;
        }
        if depth >= MAX_RULE_DEPTH {
            warn!(query = %pattern, "rule depth limit reached");
            return answers;
        }

        for rule in rules {
            *fresh += 1;
            let rule = rule.rename_vars(&format!("r{}", fresh));
            if let Some(u) = un.unifies_literal(&rule.head, pattern) {
                answers.extend(self.solve_at(&rule.body, &u, fresh, depth + 1));
            }
        }
        answers
    }

    fn solve_at(
        &self,
        cond: &Condition,
        un: &Unifier,
        fresh: &mut u64,
        depth: usize,
    ) -> Vec<Unifier> {
        match cond {
            Condition::True => vec![un.clone()],
            Condition::False => Vec::new(),
            Condition::Literal(lit) => self.query_at(lit, un, fresh, depth),
            Condition::Not(inner) => {
                if self.solve_at(inner, un, fresh, depth).is_empty() {
                    vec![un.clone()]
                } else {
                    Vec::new()
                }
            }
            Condition::And(left, right) => {
                let mut out = Vec::new();
                for u in self.solve_at(left, un, fresh, depth) {
                    out.extend(self.solve_at(right, &u, fresh, depth));
                }
                out
            }
            Condition::Or(left, right) => {
                let mut out = self.solve_at(left, un, fresh, depth);
                out.extend(self.solve_at(right, un, fresh, depth));
                out
            }
            Condition::Compare(a, op, b) => un.relate(*op, a, b).into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mas_lang::{parse_agent, parse_literal};

    fn lit(s: &str) -> Literal {
        parse_literal(s).unwrap()
    }

    fn base_from(src: &str) -> BeliefBase {
        let source = parse_agent(src).unwrap();
        let mut bb = BeliefBase::new();
        for b in source.beliefs {
            bb.add(b);
        }
        for r in source.rules {
            bb.add_rule(r);
        }
        bb
    }

    #[test]
    fn test_no_duplicates_and_annotation_merge() {
        let mut bb = BeliefBase::new();
        assert!(bb.add(lit("done[source(a)]")));
        assert!(!bb.add(lit("done[source(a)]")));
        assert!(bb.add(lit("done[source(b)]")));
        assert_eq!(bb.len(), 1);
        assert_eq!(bb.find(&lit("done")).unwrap().sources().count(), 2);
    }

    #[test]
    fn test_remove_source_keeps_other_sources() {
        let mut bb = BeliefBase::new();
        bb.add(lit("done[source(a)]"));
        bb.add(lit("done[source(b)]"));

        let removed = bb.remove(&lit("done[source(a)]")).unwrap();
        assert_eq!(removed.to_string(), "done[source(a)]");
        assert!(bb.contains(&lit("done")));

        bb.remove(&lit("done[source(b)]"));
        assert!(bb.is_empty());
        assert!(bb.remove(&lit("done[source(b)]")).is_none());
    }

    #[test]
    fn test_remove_without_annotations_drops_belief() {
        let mut bb = BeliefBase::new();
        bb.add(lit("pos(1,2)[source(percept)]"));
        assert!(bb.remove(&lit("pos(1,2)")).is_some());
        assert!(bb.is_empty());
    }

    #[test]
    fn test_strong_negation_is_a_different_belief() {
        let mut bb = BeliefBase::new();
        bb.add(lit("raining"));
        bb.add(lit("~raining"));
        assert_eq!(bb.len(), 2);
    }

    #[test]
    fn test_query_facts_in_order() {
        let bb = base_from("station(a, 1). station(b, 2).");
        let mut fresh = 0;
        let answers = bb.query(&lit("station(N, X)"), &Unifier::new(), &mut fresh);
        let names: Vec<_> = answers.iter().map(|u| u.apply(&Term::var("N"))).collect();
        assert_eq!(names, vec![Term::atom("a"), Term::atom("b")]);
    }

    #[test]
    fn test_rules_are_derived() {
        let bb = base_from(
            "battery(15). low :- battery(B) & B < 20. critical :- low & battery(B) & B < 5.",
        );
        let mut fresh = 0;
        assert_eq!(bb.query(&lit("low"), &Unifier::new(), &mut fresh).len(), 1);
        assert!(bb.query(&lit("critical"), &Unifier::new(), &mut fresh).is_empty());
    }

    #[test]
    fn test_recursive_rule_stops_at_depth_limit() {
        let bb = base_from("loop :- loop.");
        let mut fresh = 0;
        assert!(bb.query(&lit("loop"), &Unifier::new(), &mut fresh).is_empty());
    }

    #[test]
    fn test_solve_conditions() {
        let bb = base_from("a(1). a(2). b(2).");
        let mut fresh = 0;
        let cond = mas_lang::Parser::new("a(X) & not b(X)")
            .unwrap()
            .parse_condition()
            .unwrap();
        let answers = bb.solve(&cond, &Unifier::new(), &mut fresh);
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].apply(&Term::var("X")), Term::number(1.0));
    }
}
