//! BuildContext: the explicit state of one build pass.
//!
//! A build pass runs an array program's defining routine once and
//! records what it does as IR. The context is threaded through every
//! call instead of living in globals: it owns the current execution
//! device, the live-array registry, the block stack that nested loops
//! emit into, and the target configuration.
//!
//! One context serves exactly one build. Concurrent or re-entrant
//! builds need separate contexts.

use std::collections::HashSet;

use crate::array::ArrayArena;
use crate::config::TargetConfig;
use crate::device::Device;
use crate::error::BuildError;
use crate::ir::{Expr, Param, Program, Stmt, Ty};

pub struct BuildContext {
    /// Name of the program being built.
    pub(crate) name: String,
    pub(crate) config: TargetConfig,
    /// Where code induced right now executes.
    pub(crate) device: Device,
    /// Every array declared in this build, live or released.
    pub(crate) arrays: ArrayArena,
    /// Innermost block last; `blocks[0]` is the program body.
    blocks: Vec<Vec<Stmt>>,
    params: Vec<Param>,
    /// Names already bound in the program.
    taken: HashSet<String>,
    /// Monotonic counter for numbered names (`i0`, `acc3`, ...).
    name_counter: u32,
    /// Serial of the next expression statement.
    statement_counter: u32,
}

impl BuildContext {
    pub fn new(name: &str, config: TargetConfig) -> Self {
        log::info!("build pass for '{}' (target {})", name, config.name);
        Self {
            name: name.to_string(),
            config,
            device: Device::Host,
            arrays: ArrayArena::default(),
            blocks: vec![Vec::new()],
            params: Vec::new(),
            taken: HashSet::new(),
            name_counter: 0,
            statement_counter: 0,
        }
    }

    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    /// Current execution device.
    pub fn device(&self) -> Device {
        self.device
    }

    /// Declare a run-time program parameter.
    pub fn param(&mut self, name: &str, ty: Ty) -> Expr {
        let name = self.unique_name(name);
        self.params.push(Param {
            name: name.clone(),
            ty,
        });
        Expr::Var(name)
    }

    /// `base` if free, otherwise `base1`, `base2`, ...
    pub fn unique_name(&mut self, base: &str) -> String {
        if self.taken.insert(base.to_string()) {
            return base.to_string();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}{}", base, n);
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Numbered fresh name: `prefix` followed by the next counter value.
    pub fn fresh_name(&mut self, prefix: &str) -> String {
        loop {
            let candidate = format!("{}{}", prefix, self.name_counter);
            self.name_counter += 1;
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    // ── Emission ──────────────────────────────────────────────────

    pub fn emit(&mut self, stmt: Stmt) {
        if let Some(block) = self.blocks.last_mut() {
            block.push(stmt);
        }
    }

    /// Declare a fresh run-time variable and return a reference to it.
    pub fn declare(&mut self, prefix: &str, ty: Ty, init: Expr) -> Expr {
        let name = self.fresh_name(prefix);
        self.emit(Stmt::Decl {
            name: name.clone(),
            ty,
            init,
        });
        Expr::Var(name)
    }

    /// Run `f` with emission redirected into a detached block.
    ///
    /// On error the block is dropped, so a failing statement leaves no
    /// trace in the program.
    pub fn capture<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, BuildError>,
    ) -> Result<(T, Vec<Stmt>), BuildError> {
        self.blocks.push(Vec::new());
        let result = f(self);
        let block = self.blocks.pop().unwrap_or_default();
        result.map(|value| (value, block))
    }

    /// Emit previously captured statements into the current block.
    pub fn splice(&mut self, stmts: Vec<Stmt>) {
        if let Some(block) = self.blocks.last_mut() {
            block.extend(stmts);
        }
    }

    /// `for (int var = 0; var < extent; var++) { f }`.
    pub fn emit_for(
        &mut self,
        var: &str,
        extent: Expr,
        kernel: bool,
        f: impl FnOnce(&mut Self) -> Result<(), BuildError>,
    ) -> Result<(), BuildError> {
        let ((), body) = self.capture(f)?;
        self.emit(Stmt::For {
            var: var.to_string(),
            extent,
            body,
            kernel,
        });
        Ok(())
    }

    pub(crate) fn next_statement(&mut self) -> u32 {
        let serial = self.statement_counter;
        self.statement_counter += 1;
        serial
    }

    /// End the build pass: release every live array, newest first, and
    /// return the program.
    pub fn finish(mut self) -> Program {
        let live: Vec<_> = self.arrays.live().iter().rev().copied().collect();
        for id in live {
            self.release_live(id);
        }
        let body = if self.blocks.is_empty() {
            Vec::new()
        } else {
            self.blocks.swap_remove(0)
        };
        log::info!("built '{}': {} top-level statements", self.name, body.len());
        Program {
            name: self.name,
            params: self.params,
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ElemType;

    fn ctx() -> BuildContext {
        BuildContext::new("t", TargetConfig::cuda())
    }

    #[test]
    fn test_names_are_unique() {
        let mut c = ctx();
        let p = c.param("x", Ty::Ptr(ElemType::Int));
        assert_eq!(p, Expr::var("x"));
        assert_eq!(c.unique_name("x"), "x1");
        assert_eq!(c.unique_name("x"), "x2");
        assert_eq!(c.fresh_name("i"), "i0");
        assert_eq!(c.fresh_name("i"), "i1");
        assert_eq!(c.fresh_name("k"), "k2");
    }

    #[test]
    fn test_fresh_name_skips_taken() {
        let mut c = ctx();
        c.unique_name("i0");
        assert_eq!(c.fresh_name("i"), "i1");
    }

    #[test]
    fn test_emit_for_nests() {
        let mut c = ctx();
        c.emit_for("i", Expr::Int(3), true, |c| {
            c.emit(Stmt::Call(Expr::call("f", vec![Expr::var("i")])));
            Ok(())
        })
        .unwrap();
        let p = c.finish();
        assert_eq!(p.body.len(), 1);
        assert_eq!(p.kernel_regions().len(), 1);
        assert_eq!(p.stmt_count(), 2);
    }

    #[test]
    fn test_capture_discards_on_error() {
        let mut c = ctx();
        let r = c.capture(|c| {
            c.emit(Stmt::Call(Expr::call("f", vec![])));
            Err::<(), _>(BuildError::ForeignNode)
        });
        assert!(r.is_err());
        c.emit(Stmt::Call(Expr::call("g", vec![])));
        let p = c.finish();
        assert_eq!(p.body.len(), 1);
        assert_eq!(p.count_calls("f"), 0);
    }

    #[test]
    fn test_declare() {
        let mut c = ctx();
        let v = c.declare("acc", Ty::Elem(ElemType::Float), Expr::Float(0.0));
        assert_eq!(v, Expr::var("acc0"));
        let p = c.finish();
        assert_eq!(p.body[0].to_string(), "float acc0 = 0.0;\n");
    }
}
