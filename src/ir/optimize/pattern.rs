//! Structural patterns over [`Expr`] with named holes.

use std::collections::BTreeMap;

use crate::ir::{Expr, Stmt};

/// Hole name -> the sub-expression it matched.
pub type Captures = BTreeMap<String, Expr>;

/// An expression template. Holes match any sub-expression; a hole that
/// appears more than once must match equal sub-expressions each time.
#[derive(Clone, Debug, PartialEq)]
pub enum Pattern {
    Hole(String),
    ThreadIdx,
    Int(i64),
    Var(String),
    Add(Box<Pattern>, Box<Pattern>),
    Mul(Box<Pattern>, Box<Pattern>),
    Index(Box<Pattern>, Box<Pattern>),
    Call(String, Vec<Pattern>),
}

pub fn hole(name: &str) -> Pattern {
    Pattern::Hole(name.to_string())
}

impl Pattern {
    pub fn add(a: Pattern, b: Pattern) -> Pattern {
        Pattern::Add(Box::new(a), Box::new(b))
    }

    pub fn mul(a: Pattern, b: Pattern) -> Pattern {
        Pattern::Mul(Box::new(a), Box::new(b))
    }

    pub fn index(base: Pattern, offset: Pattern) -> Pattern {
        Pattern::Index(Box::new(base), Box::new(offset))
    }

    pub fn call(name: &str, args: Vec<Pattern>) -> Pattern {
        Pattern::Call(name.to_string(), args)
    }

    /// Match `expr`, extending `captures`. On failure `captures` may hold
    /// bindings from the partial match and should be discarded.
    pub fn matches(&self, expr: &Expr, captures: &mut Captures) -> bool {
        match (self, expr) {
            (Pattern::Hole(name), _) => match captures.get(name) {
                Some(bound) => bound == expr,
                None => {
                    captures.insert(name.clone(), expr.clone());
                    true
                }
            },
            (Pattern::ThreadIdx, Expr::ThreadIdx) => true,
            (Pattern::Int(p), Expr::Int(v)) => p == v,
            (Pattern::Var(p), Expr::Var(v)) => p == v,
            (Pattern::Add(pa, pb), Expr::Add(a, b))
            | (Pattern::Mul(pa, pb), Expr::Mul(a, b))
            | (Pattern::Index(pa, pb), Expr::Index(a, b)) => {
                pa.matches(a, captures) && pb.matches(b, captures)
            }
            (Pattern::Call(pn, pargs), Expr::Call(n, args)) => {
                pn == n
                    && pargs.len() == args.len()
                    && pargs
                        .iter()
                        .zip(args)
                        .all(|(p, a)| p.matches(a, captures))
            }
            _ => false,
        }
    }

    /// Build the expression this template describes. `None` if a hole
    /// has no binding.
    pub fn instantiate(&self, captures: &Captures) -> Option<Expr> {
        Some(match self {
            Pattern::Hole(name) => captures.get(name)?.clone(),
            Pattern::ThreadIdx => Expr::ThreadIdx,
            Pattern::Int(v) => Expr::Int(*v),
            Pattern::Var(v) => Expr::Var(v.clone()),
            Pattern::Add(a, b) => a.instantiate(captures)? + b.instantiate(captures)?,
            Pattern::Mul(a, b) => a.instantiate(captures)? * b.instantiate(captures)?,
            Pattern::Index(a, b) => Expr::index(a.instantiate(captures)?, b.instantiate(captures)?),
            Pattern::Call(name, args) => {
                let args = args
                    .iter()
                    .map(|a| a.instantiate(captures))
                    .collect::<Option<Vec<_>>>()?;
                Expr::call(name, args)
            }
        })
    }
}

/// Rewrite of an assignment statement: `target = value` becomes
/// `new_target = new_value`.
#[derive(Clone, Debug)]
pub struct RewriteRule {
    pub name: String,
    pub target: Pattern,
    pub value: Pattern,
    pub new_target: Pattern,
    pub new_value: Pattern,
}

impl RewriteRule {
    /// The rewritten statement, or `None` when the rule does not apply in
    /// full. A rule never produces a partially substituted statement.
    pub fn apply(&self, stmt: &Stmt) -> Option<Stmt> {
        let Stmt::Assign { target, value } = stmt else {
            return None;
        };
        let mut captures = Captures::new();
        if !self.target.matches(target, &mut captures) || !self.value.matches(value, &mut captures)
        {
            return None;
        }
        Some(Stmt::Assign {
            target: self.new_target.instantiate(&captures)?,
            value: self.new_value.instantiate(&captures)?,
        })
    }
}
