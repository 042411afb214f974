//! Loop inducer: lowering assignments into nested index loops.
//!
//! An assignment `array = expr` becomes one loop per declared dimension
//! of the target, outer to inner, with a store at full depth. The whole
//! statement is lowered into a detached block and spliced only once it
//! succeeded, so a failing statement leaves no IR behind.

use crate::array::ArrayId;
use crate::device::Device;
use crate::error::{BuildError, OpSite};
use crate::expr::{flat_index, ExprGraph, Statement};
use crate::ir::builder::BuildContext;
use crate::ir::{Expr, Scalar, Stmt};
use crate::operand::IntoOperand;
use crate::shape::{resolve_shapes, Shape};

impl BuildContext {
    /// `target = build(graph)`.
    ///
    /// `build` combines operands into a graph scoped to this statement
    /// and returns the value to store. Node handles it creates are
    /// useless once it returns.
    pub fn assign<R: IntoOperand>(
        &mut self,
        target: ArrayId,
        build: impl FnOnce(&mut ExprGraph<'_>) -> Result<R, BuildError>,
    ) -> Result<(), BuildError> {
        let serial = self.next_statement();
        let statement = {
            let mut graph = ExprGraph::new(serial, &self.arrays);
            let value = build(&mut graph)?;
            let root = graph.node_of(value)?;
            graph.finish(root)?
        };
        self.lower_statement(target, &statement)
    }

    /// `target = source`, element by element.
    pub fn copy(&mut self, target: ArrayId, source: ArrayId) -> Result<(), BuildError> {
        self.assign(target, |_| Ok(source))
    }

    /// Store `value` into every element of `target` with one flat loop
    /// over the host buffer. The array is then known to be constant.
    ///
    /// `value` is converted to the array's element type first, so the
    /// literal stored and the constant later reads fold to agree.
    pub fn fill(&mut self, target: ArrayId, value: impl Into<Scalar>) -> Result<(), BuildError> {
        let desc = self.arrays.get(target)?;
        let value = value.into().cast(desc.elem);
        let total = desc.total_size();
        let host = desc.host.clone();
        let name = desc.name.clone();

        let var = self.fresh_name("i");
        let index = Expr::var(&var);
        self.emit_for(&var, Expr::Int(total as i64), false, |ctx| {
            ctx.emit(Stmt::Assign {
                target: Expr::index(host, index),
                value: value.to_expr(),
            });
            Ok(())
        })?;

        let desc = self.arrays.get_mut(target)?;
        desc.constant = Some(value);
        desc.residency = Device::Host;
        log::debug!("fill {} = {}", name, value);
        Ok(())
    }

    fn lower_statement(
        &mut self,
        target: ArrayId,
        statement: &Statement,
    ) -> Result<(), BuildError> {
        let desc = self.arrays.get(target)?;
        let name = desc.name.clone();
        let shape = desc.shape.clone();

        let mismatch = || BuildError::ShapeMismatch {
            site: OpSite::infix(&name, "=", statement.text()),
            lhs: shape.clone(),
            rhs: statement.shape().clone(),
        };
        let resolved = resolve_shapes(&shape, statement.shape()).map_err(|_| mismatch())?;
        if resolved != shape {
            return Err(mismatch());
        }

        if self.device == Device::Gpu {
            self.check_device_buffers(target, statement)?;
        }

        let device = self.device;
        let ((), block) = self.capture(|ctx| {
            let mut indices = Vec::with_capacity(shape.rank());
            ctx.induce_loop_at(target, &shape, statement, &mut indices)
        })?;
        self.splice(block);

        let desc = self.arrays.get_mut(target)?;
        desc.constant = None;
        desc.residency = device;
        log::debug!("lowered {} = {} on {}", name, statement.text(), device);
        Ok(())
    }

    /// Every buffer a device-scoped statement touches must exist on the
    /// device. Folded constant reads need no buffer.
    fn check_device_buffers(
        &self,
        target: ArrayId,
        statement: &Statement,
    ) -> Result<(), BuildError> {
        self.arrays.get(target)?.buffer(Device::Gpu)?;
        for id in statement.arrays() {
            let desc = self.arrays.get(id)?;
            if self.config.fold_constants && desc.constant.is_some() {
                continue;
            }
            desc.buffer(Device::Gpu)?;
        }
        Ok(())
    }

    /// Emit the loop for dimension `indices.len()` of `shape`, or the
    /// store once every dimension has an index.
    fn induce_loop_at(
        &mut self,
        target: ArrayId,
        shape: &Shape,
        statement: &Statement,
        indices: &mut Vec<Expr>,
    ) -> Result<(), BuildError> {
        let depth = indices.len();
        if depth == shape.rank() {
            let value = statement.value(self, indices)?;
            let buffer = self.arrays.get(target)?.buffer(self.device)?.clone();
            self.emit(Stmt::Assign {
                target: Expr::index(buffer, flat_index(shape, indices)),
                value,
            });
            return Ok(());
        }

        let var = self.fresh_name("i");
        let extent = Expr::Int(shape.dims()[depth] as i64);
        let kernel = self.device == Device::Gpu && depth == 0;
        indices.push(Expr::var(&var));
        self.emit_for(&var, extent, kernel, |ctx| {
            ctx.induce_loop_at(target, shape, statement, indices)
        })?;
        indices.pop();
        Ok(())
    }
}
