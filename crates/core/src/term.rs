use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// Arithmetic operators allowed inside terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Mod,
}

impl ArithOp {
    pub fn apply(self, left: f64, right: f64) -> Result<f64> {
        match self {
            ArithOp::Add => Ok(left + right),
            ArithOp::Sub => Ok(left - right),
            ArithOp::Mul => Ok(left * right),
            ArithOp::Div | ArithOp::IntDiv | ArithOp::Mod if right == 0.0 => {
                Err(CoreError::DivisionByZero)
            }
            ArithOp::Div => Ok(left / right),
            ArithOp::IntDiv => Ok((left / right).trunc()),
            ArithOp::Mod => Ok(left % right),
        }
    }
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::IntDiv => " div ",
            ArithOp::Mod => " mod ",
        };
        f.write_str(s)
    }
}

/// Relational operators used in plan contexts, rule bodies and body
/// constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelOp {
    /// `=` unification
    Unify,
    /// `==` structural equality
    Eq,
    /// `\==`
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl fmt::Display for RelOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelOp::Unify => "=",
            RelOp::Eq => "==",
            RelOp::Ne => "\\==",
            RelOp::Lt => "<",
            RelOp::Gt => ">",
            RelOp::Le => "<=",
            RelOp::Ge => ">=",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Term {
    Atom(String),
    Var(String),
    Number(f64),
    Str(String),
    List(Vec<Term>),
    /// Compound term. Shares the literal representation so that
    /// annotated structures can be passed around as message contents.
    Struct(Literal),
    Arith(ArithOp, Box<Term>, Box<Term>),
    Neg(Box<Term>),
}

impl Term {
    pub fn atom(name: impl Into<String>) -> Self {
        Term::Atom(name.into())
    }

    pub fn var(name: impl Into<String>) -> Self {
        Term::Var(name.into())
    }

    pub fn string(s: impl Into<String>) -> Self {
        Term::Str(s.into())
    }

    pub fn number(n: impl Into<f64>) -> Self {
        Term::Number(n.into())
    }

    /// Builds a compound term, collapsing argument-less structures to atoms.
    pub fn structure(literal: Literal) -> Self {
        if literal.args.is_empty() && literal.annots.is_empty() && !literal.negated {
            Term::Atom(literal.functor)
        } else {
            Term::Struct(literal)
        }
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Term::Var(_))
    }

    pub fn is_ground(&self) -> bool {
        match self {
            Term::Var(_) => false,
            Term::Atom(_) | Term::Number(_) | Term::Str(_) => true,
            Term::List(items) => items.iter().all(Term::is_ground),
            Term::Struct(lit) => lit.is_ground(),
            Term::Arith(_, l, r) => l.is_ground() && r.is_ground(),
            Term::Neg(t) => t.is_ground(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Term::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        self.as_number()
            .filter(|n| n.fract() == 0.0)
            .map(|n| n as i64)
    }

    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Term::Atom(a) => Some(a),
            _ => None,
        }
    }

    /// Text of an atom or string term; used for agent names and labels.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Term::Atom(s) | Term::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Term]> {
        match self {
            Term::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn rename_vars(&self, suffix: &str) -> Term {
        match self {
            Term::Var(v) => Term::Var(format!("{}__{}", v, suffix)),
            Term::List(items) => Term::List(items.iter().map(|t| t.rename_vars(suffix)).collect()),
            Term::Struct(lit) => Term::Struct(lit.rename_vars(suffix)),
            Term::Arith(op, l, r) => Term::Arith(
                *op,
                Box::new(l.rename_vars(suffix)),
                Box::new(r.rename_vars(suffix)),
            ),
            Term::Neg(t) => Term::Neg(Box::new(t.rename_vars(suffix))),
            other => other.clone(),
        }
    }

    pub fn collect_vars(&self, out: &mut Vec<String>) {
        match self {
            Term::Var(v) => {
                if !out.contains(v) {
                    out.push(v.clone());
                }
            }
            Term::List(items) => items.iter().for_each(|t| t.collect_vars(out)),
            Term::Struct(lit) => lit.collect_vars(out),
            Term::Arith(_, l, r) => {
                l.collect_vars(out);
                r.collect_vars(out);
            }
            Term::Neg(t) => t.collect_vars(out),
            _ => {}
        }
    }
}

impl From<Literal> for Term {
    fn from(literal: Literal) -> Self {
        Term::structure(literal)
    }
}

fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{}", n)
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Term]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Atom(a) => f.write_str(a),
            Term::Var(v) => f.write_str(v),
            Term::Number(n) => write_number(f, *n),
            Term::Str(s) => {
                f.write_str("\"")?;
                for ch in s.chars() {
                    match ch {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                f.write_str("\"")
            }
            Term::List(items) => {
                f.write_str("[")?;
                write_joined(f, items)?;
                f.write_str("]")
            }
            Term::Struct(lit) => write!(f, "{}", lit),
            Term::Arith(op, l, r) => write!(f, "({}{}{})", l, op, r),
            Term::Neg(t) => write!(f, "-{}", t),
        }
    }
}

/// A predicate with arguments and annotations, optionally strongly negated
/// (`~p`). Beliefs, goals, actions and message contents are all literals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    pub negated: bool,
    pub functor: String,
    pub args: Vec<Term>,
    pub annots: Vec<Term>,
}

impl Literal {
    pub fn new(functor: impl Into<String>) -> Self {
        Self {
            negated: false,
            functor: functor.into(),
            args: Vec::new(),
            annots: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<Term>) -> Self {
        self.args = args;
        self
    }

    pub fn with_arg(mut self, arg: Term) -> Self {
        self.args.push(arg);
        self
    }

    pub fn with_annot(mut self, annot: Term) -> Self {
        self.add_annot(annot);
        self
    }

    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    pub fn is_ground(&self) -> bool {
        self.args.iter().all(Term::is_ground) && self.annots.iter().all(Term::is_ground)
    }

    /// Adds an annotation unless an identical one is already present.
    pub fn add_annot(&mut self, annot: Term) -> bool {
        if self.annots.contains(&annot) {
            false
        } else {
            self.annots.push(annot);
            true
        }
    }

    pub fn remove_annot(&mut self, annot: &Term) -> bool {
        let before = self.annots.len();
        self.annots.retain(|a| a != annot);
        before != self.annots.len()
    }

    pub fn has_annot(&self, annot: &Term) -> bool {
        self.annots.contains(annot)
    }

    /// `source(X)` annotation term.
    pub fn source_annot(source: Term) -> Term {
        Term::Struct(Literal::new("source").with_arg(source))
    }

    pub fn sources(&self) -> impl Iterator<Item = &Term> {
        self.annots.iter().filter_map(|a| match a {
            Term::Struct(l) if l.functor == "source" && l.args.len() == 1 && !l.negated => {
                l.args.first()
            }
            _ => None,
        })
    }

    pub fn has_source(&self, source: &Term) -> bool {
        self.sources().any(|s| s == source)
    }

    pub fn add_source(&mut self, source: Term) -> bool {
        self.add_annot(Self::source_annot(source))
    }

    pub fn without_sources(&self) -> Literal {
        let mut lit = self.clone();
        lit.annots.retain(|a| {
            !matches!(a, Term::Struct(l) if l.functor == "source" && l.args.len() == 1)
        });
        lit
    }

    pub fn without_annots(&self) -> Literal {
        Literal {
            annots: Vec::new(),
            ..self.clone()
        }
    }

    /// Two literals denote the same belief when they agree on everything
    /// except annotations.
    pub fn same_belief(&self, other: &Literal) -> bool {
        self.negated == other.negated && self.functor == other.functor && self.args == other.args
    }

    pub fn same_predicate(&self, other: &Literal) -> bool {
        self.negated == other.negated
            && self.functor == other.functor
            && self.args.len() == other.args.len()
    }

    pub fn from_term(term: Term) -> Result<Literal> {
        match term {
            Term::Atom(a) => Ok(Literal::new(a)),
            Term::Struct(lit) => Ok(lit),
            other => Err(CoreError::NotALiteral(other.to_string())),
        }
    }

    pub fn rename_vars(&self, suffix: &str) -> Literal {
        Literal {
            negated: self.negated,
            functor: self.functor.clone(),
            args: self.args.iter().map(|t| t.rename_vars(suffix)).collect(),
            annots: self.annots.iter().map(|t| t.rename_vars(suffix)).collect(),
        }
    }

    pub fn collect_vars(&self, out: &mut Vec<String>) {
        self.args.iter().for_each(|t| t.collect_vars(out));
        self.annots.iter().for_each(|t| t.collect_vars(out));
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("~")?;
        }
        f.write_str(&self.functor)?;
        if !self.args.is_empty() {
            f.write_str("(")?;
            write_joined(f, &self.args)?;
            f.write_str(")")?;
        }
        if !self.annots.is_empty() {
            f.write_str("[")?;
            write_joined(f, &self.annots)?;
            f.write_str("]")?;
        }
        Ok(())
    }
}
