//! Operand facade: the `+`, `*` and `cross` combinators.
//!
//! Exactly three operand kinds are accepted (array, expression node,
//! scalar constant), each with one conversion into the expression
//! graph. Combinators resolve shapes immediately, so a malformed
//! combination fails here and never reaches the loop inducer.

use std::fmt;

use crate::array::ArrayId;
use crate::error::{BuildError, OpSite};
use crate::expr::{Entry, ExprGraph, Node, NodeId};
use crate::ir::{Expr, Scalar};
use crate::shape::{cross_shape, resolve_shapes};

/// An accepted operand.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Operand {
    Array(ArrayId),
    Expr(NodeId),
    Scalar(Scalar),
}

/// Any value an array program may hand to a combinator. Only some of
/// them are operands; the rest are rejected with
/// [`BuildError::UnsupportedOperandType`].
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Array(ArrayId),
    Expr(NodeId),
    Scalar(Scalar),
    /// A run-time (staged) value such as a loop index.
    Dynamic(Expr),
    Bool(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Array(_) => write!(f, "array"),
            Value::Expr(_) => write!(f, "array expression"),
            Value::Scalar(s) => write!(f, "{} constant", s.elem()),
            Value::Dynamic(e) => write!(f, "run-time value `{}`", e),
            Value::Bool(_) => write!(f, "boolean"),
        }
    }
}

/// Conversion into an [`Operand`]. `op` names the combinator asking,
/// for error messages.
pub trait IntoOperand {
    fn into_operand(self, op: &'static str) -> Result<Operand, BuildError>;
}

impl IntoOperand for Operand {
    fn into_operand(self, _op: &'static str) -> Result<Operand, BuildError> {
        Ok(self)
    }
}

impl IntoOperand for ArrayId {
    fn into_operand(self, _op: &'static str) -> Result<Operand, BuildError> {
        Ok(Operand::Array(self))
    }
}

impl IntoOperand for NodeId {
    fn into_operand(self, _op: &'static str) -> Result<Operand, BuildError> {
        Ok(Operand::Expr(self))
    }
}

impl IntoOperand for Scalar {
    fn into_operand(self, _op: &'static str) -> Result<Operand, BuildError> {
        Ok(Operand::Scalar(self))
    }
}

macro_rules! scalar_operand {
    ($($t:ty),*) => {
        $(
            impl IntoOperand for $t {
                fn into_operand(self, _op: &'static str) -> Result<Operand, BuildError> {
                    Ok(Operand::Scalar(Scalar::from(self)))
                }
            }
        )*
    };
}

scalar_operand!(i32, i64, f32, f64);

impl IntoOperand for Value {
    fn into_operand(self, op: &'static str) -> Result<Operand, BuildError> {
        match self {
            Value::Array(id) => Ok(Operand::Array(id)),
            Value::Expr(id) => Ok(Operand::Expr(id)),
            Value::Scalar(s) => Ok(Operand::Scalar(s)),
            other @ (Value::Dynamic(_) | Value::Bool(_)) => {
                Err(BuildError::UnsupportedOperandType {
                    op,
                    kind: other.to_string(),
                })
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Combinator {
    Add,
    Mul,
    Cross,
}

impl Combinator {
    fn symbol(self) -> &'static str {
        match self {
            Combinator::Add => "+",
            Combinator::Mul => "*",
            Combinator::Cross => "cross",
        }
    }
}

impl ExprGraph<'_> {
    /// Convert an operand into a node of this graph.
    pub fn node_of(&mut self, operand: impl IntoOperand) -> Result<NodeId, BuildError> {
        self.lower_operand(operand, "=")
    }

    fn lower_operand(
        &mut self,
        operand: impl IntoOperand,
        op: &'static str,
    ) -> Result<NodeId, BuildError> {
        match operand.into_operand(op)? {
            Operand::Expr(id) => {
                self.entry(id)?;
                Ok(id)
            }
            Operand::Array(id) => {
                let desc = self.arrays.get(id)?;
                let entry = Entry {
                    node: Node::ArrayRef(id),
                    shape: desc.shape.clone(),
                    elem: desc.elem,
                    text: desc.name.clone(),
                    prec: 3,
                };
                Ok(self.push(entry))
            }
            Operand::Scalar(value) => Ok(self.push(Entry {
                node: Node::Const(value),
                shape: crate::shape::Shape::scalar(),
                elem: value.elem(),
                text: value.to_string(),
                prec: 3,
            })),
        }
    }

    /// Element-wise sum.
    pub fn add(
        &mut self,
        lhs: impl IntoOperand,
        rhs: impl IntoOperand,
    ) -> Result<NodeId, BuildError> {
        self.combine(Combinator::Add, lhs, rhs)
    }

    /// Element-wise product.
    pub fn mul(
        &mut self,
        lhs: impl IntoOperand,
        rhs: impl IntoOperand,
    ) -> Result<NodeId, BuildError> {
        self.combine(Combinator::Mul, lhs, rhs)
    }

    /// Matrix product of two rank-2 operands.
    pub fn cross(
        &mut self,
        lhs: impl IntoOperand,
        rhs: impl IntoOperand,
    ) -> Result<NodeId, BuildError> {
        self.combine(Combinator::Cross, lhs, rhs)
    }

    fn combine(
        &mut self,
        op: Combinator,
        lhs: impl IntoOperand,
        rhs: impl IntoOperand,
    ) -> Result<NodeId, BuildError> {
        let lhs = lhs.into_operand(op.symbol())?;
        let rhs = rhs.into_operand(op.symbol())?;
        let l = self.lower_operand(lhs, op.symbol())?;
        let r = self.lower_operand(rhs, op.symbol())?;
        let le = self.entry(l)?;
        let re = self.entry(r)?;

        let (site, prec) = match op {
            Combinator::Add => (
                OpSite::infix(&wrap(le, 1), "+", &wrap(re, 2)),
                1,
            ),
            Combinator::Mul => (
                OpSite::infix(&wrap(le, 2), "*", &wrap(re, 3)),
                2,
            ),
            Combinator::Cross => (OpSite::call("cross", &le.text, &re.text), 3),
        };

        let shape = match op {
            Combinator::Add | Combinator::Mul => resolve_shapes(&le.shape, &re.shape).map_err(
                |_| BuildError::ShapeMismatch {
                    site: site.clone(),
                    lhs: le.shape.clone(),
                    rhs: re.shape.clone(),
                },
            )?,
            Combinator::Cross => cross_shape(&le.shape, &re.shape).map_err(|_| {
                BuildError::DimensionMismatch {
                    site: site.clone(),
                    lhs: le.shape.clone(),
                    rhs: re.shape.clone(),
                }
            })?,
        };

        let node = match op {
            Combinator::Add => Node::Add(l, r),
            Combinator::Mul => Node::Mul(l, r),
            Combinator::Cross => Node::Cross(l, r),
        };
        let elem = le.elem.join(re.elem);
        log::trace!("node `{}` : {}", site.text, shape);
        Ok(self.push(Entry {
            node,
            shape,
            elem,
            text: site.text,
            prec,
        }))
    }
}

/// Operand text, parenthesized when it binds looser than `min`.
fn wrap(entry: &Entry, min: u8) -> String {
    if entry.prec < min {
        format!("({})", entry.text)
    } else {
        entry.text.clone()
    }
}
