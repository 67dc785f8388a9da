use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::{CoreError, Result};
use crate::term::{Literal, RelOp, Term};

/// Variable bindings produced by unification.
///
/// Bindings are kept in a `BTreeMap` so that iteration (and therefore every
/// trace derived from it) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Unifier {
    bindings: BTreeMap<String, Term>,
}

impl Unifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, var: &str) -> Option<&Term> {
        self.bindings.get(var)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Term)> {
        self.bindings.iter()
    }

    /// Follows variable chains at the top level of `term`.
    fn walk(&self, term: &Term) -> Term {
        let mut current = term.clone();
        while let Term::Var(v) = &current {
            match self.bindings.get(v) {
                Some(next) => current = next.clone(),
                None => break,
            }
        }
        current
    }

    /// Substitutes every bound variable and folds arithmetic whose operands
    /// are known.
    pub fn apply(&self, term: &Term) -> Term {
        match term {
            Term::Var(v) => match self.bindings.get(v) {
                Some(bound) => self.apply(bound),
                None => term.clone(),
            },
            Term::List(items) => Term::List(items.iter().map(|t| self.apply(t)).collect()),
            Term::Struct(lit) => Term::Struct(self.apply_literal(lit)),
            Term::Arith(op, l, r) => {
                let l = self.apply(l);
                let r = self.apply(r);
                match (&l, &r) {
                    (Term::Number(a), Term::Number(b)) => match op.apply(*a, *b) {
                        Ok(n) => Term::Number(n),
                        Err(_) => Term::Arith(*op, Box::new(l), Box::new(r)),
                    },
                    _ => Term::Arith(*op, Box::new(l), Box::new(r)),
                }
            }
            Term::Neg(t) => match self.apply(t) {
                Term::Number(n) => Term::Number(-n),
                other => Term::Neg(Box::new(other)),
            },
            other => other.clone(),
        }
    }

    pub fn apply_literal(&self, lit: &Literal) -> Literal {
        Literal {
            negated: lit.negated,
            functor: lit.functor.clone(),
            args: lit.args.iter().map(|t| self.apply(t)).collect(),
            annots: lit.annots.iter().map(|t| self.apply(t)).collect(),
        }
    }

    /// Evaluates an arithmetic term to a number.
    pub fn eval(&self, term: &Term) -> Result<f64> {
        match self.walk(term) {
            Term::Number(n) => Ok(n),
            Term::Arith(op, l, r) => op.apply(self.eval(&l)?, self.eval(&r)?),
            Term::Neg(t) => Ok(-self.eval(&t)?),
            Term::Var(v) => Err(CoreError::Unbound(v)),
            other => Err(CoreError::TypeError(format!("{} is not a number", other))),
        }
    }

    fn bind_var(&mut self, var: &str, value: &Term) -> bool {
        let value = self.apply(value);
        let mut vars = Vec::new();
        value.collect_vars(&mut vars);
        if vars.iter().any(|v| v == var) {
            return false;
        }
        self.bindings.insert(var.to_string(), value);
        true
    }

    /// Unifies two terms in place. On failure the unifier may hold partial
    /// bindings; use [`Unifier::unifies`] to keep the original intact.
    pub fn unify(&mut self, a: &Term, b: &Term) -> bool {
        let a = self.walk(a);
        let b = self.walk(b);
        match (&a, &b) {
            (Term::Var(x), Term::Var(y)) if x == y => true,
            (Term::Var(x), _) => self.bind_var(x, &b),
            (_, Term::Var(y)) => self.bind_var(y, &a),
            (Term::Arith(..) | Term::Neg(_), _) | (_, Term::Arith(..) | Term::Neg(_)) => {
                match (self.eval(&a), self.eval(&b)) {
                    (Ok(x), Ok(y)) => x == y,
                    _ => false,
                }
            }
            (Term::Number(x), Term::Number(y)) => x == y,
            (Term::Atom(x), Term::Atom(y)) => x == y,
            (Term::Str(x), Term::Str(y)) => x == y,
            (Term::List(xs), Term::List(ys)) => {
                xs.len() == ys.len() && xs.iter().zip(ys.iter()).all(|(x, y)| self.unify(x, y))
            }
            (Term::Struct(x), Term::Struct(y)) => self.unify_literals(x, y),
            (Term::Atom(x), Term::Struct(l)) | (Term::Struct(l), Term::Atom(x)) => {
                !l.negated && l.args.is_empty() && &l.functor == x
            }
            _ => false,
        }
    }

    /// Unifies `pattern` against `target`. Arguments must unify pairwise and
    /// every annotation of the pattern must unify with some annotation of
    /// the target.
    pub fn unify_literals(&mut self, pattern: &Literal, target: &Literal) -> bool {
        if !pattern.same_predicate(target) {
            return false;
        }
        for (p, t) in pattern.args.iter().zip(target.args.iter()) {
            if !self.unify(p, t) {
                return false;
            }
        }
        'annots: for annot in &pattern.annots {
            for candidate in &target.annots {
                let mut attempt = self.clone();
                if attempt.unify(annot, candidate) {
                    *self = attempt;
                    continue 'annots;
                }
            }
            return false;
        }
        true
    }

    pub fn unifies(&self, a: &Term, b: &Term) -> Option<Unifier> {
        let mut u = self.clone();
        u.unify(a, b).then_some(u)
    }

    pub fn unifies_literal(&self, pattern: &Literal, target: &Literal) -> Option<Unifier> {
        let mut u = self.clone();
        u.unify_literals(pattern, target).then_some(u)
    }

    /// Orders numbers numerically and atoms/strings lexically.
    pub fn compare(&self, a: &Term, b: &Term) -> Option<Ordering> {
        match (self.apply(a), self.apply(b)) {
            (Term::Number(x), Term::Number(y)) => x.partial_cmp(&y),
            (Term::Atom(x) | Term::Str(x), Term::Atom(y) | Term::Str(y)) => Some(x.cmp(&y)),
            _ => None,
        }
    }

    /// Evaluates `a op b`, returning the (possibly extended) unifier when the
    /// relation holds.
    pub fn relate(&self, op: RelOp, a: &Term, b: &Term) -> Option<Unifier> {
        let holds = match op {
            RelOp::Unify => return self.unifies(a, b),
            RelOp::Eq => self.apply(a) == self.apply(b),
            RelOp::Ne => self.apply(a) != self.apply(b),
            RelOp::Lt => self.compare(a, b) == Some(Ordering::Less),
            RelOp::Gt => self.compare(a, b) == Some(Ordering::Greater),
            RelOp::Le => matches!(self.compare(a, b), Some(Ordering::Less | Ordering::Equal)),
            RelOp::Ge => matches!(
                self.compare(a, b),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        };
        holds.then(|| self.clone())
    }
}
