//! Deferred expression graphs.
//!
//! An [`ExprGraph`] is an arena scoped to one assignment statement.
//! Nodes are addressed by [`NodeId`] and every node's shape is resolved
//! when it is created, so a graph that exists is well-shaped. Once the
//! statement's root is known the graph is frozen into a [`Statement`],
//! which the loop inducer evaluates element by element.

use crate::array::{ArrayArena, ArrayId};
use crate::error::BuildError;
use crate::ir::builder::BuildContext;
use crate::ir::{ElemType, Expr, Scalar, Stmt, Ty};
use crate::shape::Shape;

/// Handle to a node of one statement's graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
    stmt: u32,
    index: u32,
}

/// Closed set of expression kinds.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Const(Scalar),
    ArrayRef(ArrayId),
    Add(NodeId, NodeId),
    Mul(NodeId, NodeId),
    /// Matrix product of two rank-2 operands.
    Cross(NodeId, NodeId),
}

#[derive(Clone, Debug)]
pub(crate) struct Entry {
    pub(crate) node: Node,
    pub(crate) shape: Shape,
    pub(crate) elem: ElemType,
    /// Rendered source-like text, used by diagnostics.
    pub(crate) text: String,
    /// Binding strength of `text`: 1 for `+`, 2 for `*`, 3 for atoms.
    pub(crate) prec: u8,
}

/// Statement-scoped expression arena. Borrows the array registry to
/// read shapes of referenced arrays.
pub struct ExprGraph<'a> {
    stmt: u32,
    entries: Vec<Entry>,
    pub(crate) arrays: &'a ArrayArena,
}

impl<'a> ExprGraph<'a> {
    pub(crate) fn new(stmt: u32, arrays: &'a ArrayArena) -> Self {
        Self {
            stmt,
            entries: Vec::new(),
            arrays,
        }
    }

    pub(crate) fn push(&mut self, entry: Entry) -> NodeId {
        let id = NodeId {
            stmt: self.stmt,
            index: self.entries.len() as u32,
        };
        self.entries.push(entry);
        id
    }

    /// Entry for a handle created by this graph.
    pub(crate) fn entry(&self, id: NodeId) -> Result<&Entry, BuildError> {
        if id.stmt != self.stmt {
            return Err(BuildError::ForeignNode);
        }
        self.entries
            .get(id.index as usize)
            .ok_or(BuildError::ForeignNode)
    }

    pub fn shape(&self, id: NodeId) -> Result<&Shape, BuildError> {
        Ok(&self.entry(id)?.shape)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, BuildError> {
        Ok(&self.entry(id)?.node)
    }

    /// Rendered text of a node, e.g. `5 * cross(x, y)`.
    pub fn text(&self, id: NodeId) -> Result<&str, BuildError> {
        Ok(&self.entry(id)?.text)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freeze the graph with `root` as the value being assigned.
    pub(crate) fn finish(self, root: NodeId) -> Result<Statement, BuildError> {
        self.entry(root)?;
        Ok(Statement {
            entries: self.entries,
            root: root.index as usize,
        })
    }
}

/// A frozen, shape-checked expression graph owned by one assignment.
#[derive(Clone, Debug)]
pub struct Statement {
    entries: Vec<Entry>,
    root: usize,
}

impl Statement {
    pub fn shape(&self) -> &Shape {
        &self.entries[self.root].shape
    }

    pub fn text(&self) -> &str {
        &self.entries[self.root].text
    }

    /// Arrays read by the statement, in node order, without repeats.
    pub fn arrays(&self) -> Vec<ArrayId> {
        let mut out = Vec::new();
        for e in &self.entries {
            if let Node::ArrayRef(id) = e.node {
                if !out.contains(&id) {
                    out.push(id);
                }
            }
        }
        out
    }

    /// Value of the root at `indices`.
    pub fn value(&self, ctx: &mut BuildContext, indices: &[Expr]) -> Result<Expr, BuildError> {
        self.value_at(ctx, self.root, indices)
    }

    /// Element expression of node `at` for the given run-time indices.
    ///
    /// A `Cross` node emits its reduction loop into the current block
    /// and yields the accumulator.
    fn value_at(
        &self,
        ctx: &mut BuildContext,
        at: usize,
        indices: &[Expr],
    ) -> Result<Expr, BuildError> {
        let fold = ctx.config.fold_constants;
        let entry = &self.entries[at];
        match &entry.node {
            Node::Const(value) => Ok(value.to_expr()),
            Node::ArrayRef(id) => {
                let desc = ctx.array(*id)?;
                if fold {
                    if let Some(value) = desc.constant {
                        return Ok(value.to_expr());
                    }
                }
                let buffer = desc.buffer(ctx.device())?.clone();
                let rank = desc.shape.rank();
                let own = indices.get(..rank).unwrap_or(indices);
                Ok(Expr::index(buffer, flat_index(&desc.shape, own)))
            }
            Node::Add(l, r) => {
                let a = self.value_at(ctx, l.index as usize, indices)?;
                let b = self.value_at(ctx, r.index as usize, indices)?;
                Ok(fold_add(a, b, fold))
            }
            Node::Mul(l, r) => {
                let a = self.value_at(ctx, l.index as usize, indices)?;
                let b = self.value_at(ctx, r.index as usize, indices)?;
                Ok(fold_mul(a, b, fold))
            }
            Node::Cross(l, r) => {
                let (l, r) = (l.index as usize, r.index as usize);
                let len = self.entries[l].shape.dims()[1];
                let (i, j) = match indices {
                    [i, j, ..] => (i.clone(), j.clone()),
                    _ => return Err(BuildError::ForeignNode),
                };
                let acc = ctx.declare("acc", Ty::Elem(entry.elem), entry.elem.zero());
                let k = ctx.fresh_name("k");
                let kv = Expr::var(&k);
                ctx.emit_for(&k, Expr::Int(len as i64), false, |ctx| {
                    let a = self.value_at(ctx, l, &[i, kv.clone()])?;
                    let b = self.value_at(ctx, r, &[kv, j])?;
                    ctx.emit(Stmt::Assign {
                        target: acc.clone(),
                        value: acc.clone() + fold_mul(a, b, fold),
                    });
                    Ok(())
                })?;
                Ok(acc)
            }
        }
    }
}

/// Flat buffer offset for `indices` into an array of `shape`:
/// `i[n-1] + D[n-1] * (i[n-2] + D[n-2] * (... i[0]))`.
pub fn flat_index(shape: &Shape, indices: &[Expr]) -> Expr {
    let dims = shape.dims();
    if dims.is_empty() || indices.is_empty() {
        return Expr::Int(0);
    }
    let mut flat = indices[0].clone();
    for d in 1..dims.len().min(indices.len()) {
        flat = indices[d].clone() + Expr::Int(dims[d] as i64) * flat;
    }
    flat
}

fn fold_add(a: Expr, b: Expr, fold: bool) -> Expr {
    if fold {
        match (&a, &b) {
            (Expr::Int(x), Expr::Int(y)) => return Expr::Int(x.wrapping_add(*y)),
            (Expr::Float(x), Expr::Float(y)) => return Expr::Float(x + y),
            _ => {}
        }
    }
    a + b
}

fn fold_mul(a: Expr, b: Expr, fold: bool) -> Expr {
    if fold {
        match (&a, &b) {
            (Expr::Int(x), Expr::Int(y)) => return Expr::Int(x.wrapping_mul(*y)),
            (Expr::Float(x), Expr::Float(y)) => return Expr::Float(x * y),
            _ => {}
        }
    }
    a * b
}
