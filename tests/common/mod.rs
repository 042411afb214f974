//! Reference interpreter for built programs.
//!
//! Buffers hold `f64` elements (4 bytes each, as the builder sizes
//! them). Stores into an `int*` buffer truncate toward zero. An
//! assignment that mentions the thread index runs once per thread of a
//! block, in order; everything else runs once.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};

use barray::{ElemType, Expr, Program, Stmt, TargetConfig, Ty};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Val {
    Num(f64),
    Ptr(usize, i64),
}

impl Val {
    fn num(self) -> f64 {
        match self {
            Val::Num(v) => v,
            Val::Ptr(..) => panic!("expected a number, got {:?}", self),
        }
    }

    fn ptr(self) -> (usize, i64) {
        match self {
            Val::Ptr(b, o) => (b, o),
            Val::Num(_) => panic!("expected a pointer, got {:?}", self),
        }
    }
}

pub struct Machine {
    pub buffers: Vec<Vec<f64>>,
    int_buffers: HashSet<usize>,
    vars: HashMap<String, Val>,
    config: TargetConfig,
    tid: Option<i64>,
}

impl Machine {
    pub fn new(config: TargetConfig) -> Self {
        Self {
            buffers: Vec::new(),
            int_buffers: HashSet::new(),
            vars: HashMap::new(),
            config,
            tid: None,
        }
    }

    /// Run `program` with one buffer per parameter, in order, and return
    /// the parameter buffers afterwards.
    pub fn run(mut self, program: &Program, args: Vec<Vec<f64>>) -> Vec<Vec<f64>> {
        assert_eq!(program.params.len(), args.len(), "argument count");
        for (param, buf) in program.params.iter().zip(args) {
            self.buffers.push(buf);
            let id = self.buffers.len() - 1;
            if param.ty == Ty::Ptr(ElemType::Int) {
                self.int_buffers.insert(id);
            }
            self.vars.insert(param.name.clone(), Val::Ptr(id, 0));
        }
        self.exec_block(&program.body);
        self.buffers.truncate(program.params.len());
        self.buffers
    }

    fn exec_block(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.exec(stmt);
        }
    }

    fn exec(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Decl { name, ty, init } => {
                let v = self.eval(init);
                if let (Ty::Ptr(ElemType::Int), Val::Ptr(b, _)) = (ty, v) {
                    self.int_buffers.insert(b);
                }
                self.vars.insert(name.clone(), v);
            }
            Stmt::Assign { target, value } => {
                if mentions_thread(target) || mentions_thread(value) {
                    for t in 0..self.config.block_width as i64 {
                        self.tid = Some(t);
                        self.store(target, value);
                    }
                    self.tid = None;
                } else {
                    self.store(target, value);
                }
            }
            Stmt::For {
                var, extent, body, ..
            } => {
                let n = self.eval(extent).num() as i64;
                for i in 0..n {
                    self.vars.insert(var.clone(), Val::Num(i as f64));
                    self.exec_block(body);
                }
            }
            Stmt::Call(call) => {
                self.eval(call);
            }
        }
    }

    fn store(&mut self, target: &Expr, value: &Expr) {
        let v = self.eval(value);
        match target {
            Expr::Var(name) => {
                self.vars.insert(name.clone(), v);
            }
            Expr::Index(base, off) => {
                let (b, o) = self.eval(base).ptr();
                let at = o + self.eval(off).num() as i64;
                let v = if self.int_buffers.contains(&b) {
                    v.num().trunc()
                } else {
                    v.num()
                };
                self.buffers[b][at as usize] = v;
            }
            other => panic!("cannot store to {}", other),
        }
    }

    fn load(&self, (b, o): (usize, i64), at: i64) -> f64 {
        self.buffers[b][(o + at) as usize]
    }

    fn eval(&mut self, e: &Expr) -> Val {
        match e {
            Expr::Int(v) => Val::Num(*v as f64),
            Expr::Float(v) => Val::Num(*v),
            Expr::Var(name) => *self
                .vars
                .get(name)
                .unwrap_or_else(|| panic!("unbound variable {}", name)),
            Expr::ThreadIdx => Val::Num(self.tid.expect("thread index outside a block") as f64),
            Expr::Add(a, b) => match (self.eval(a), self.eval(b)) {
                (Val::Num(x), Val::Num(y)) => Val::Num(x + y),
                (Val::Ptr(p, o), Val::Num(d)) | (Val::Num(d), Val::Ptr(p, o)) => {
                    Val::Ptr(p, o + d as i64)
                }
                (x, y) => panic!("cannot add {:?} and {:?}", x, y),
            },
            Expr::Mul(a, b) => Val::Num(self.eval(a).num() * self.eval(b).num()),
            Expr::Index(base, off) => {
                let p = self.eval(base).ptr();
                let at = self.eval(off).num() as i64;
                Val::Num(self.load(p, at))
            }
            Expr::Call(name, args) => {
                let args: Vec<Val> = args.iter().map(|a| self.eval(a)).collect();
                self.call(name, &args)
            }
        }
    }

    fn call(&mut self, name: &str, args: &[Val]) -> Val {
        let rt = &self.config.runtime;
        if name == rt.malloc || name == rt.device_malloc {
            let elems = args[0].num() as usize / 4;
            self.buffers.push(vec![0.0; elems]);
            return Val::Ptr(self.buffers.len() - 1, 0);
        }
        if name == rt.copy_to_device || name == rt.copy_to_host {
            let (db, doff) = args[0].ptr();
            let src = args[1].ptr();
            let elems = args[2].num() as i64 / 4;
            for k in 0..elems {
                let v = self.load(src, k);
                self.buffers[db][(doff + k) as usize] = v;
            }
            return Val::Num(0.0);
        }
        if name == rt.free || name == rt.device_free {
            return Val::Num(0.0);
        }
        if name == self.config.fused_dot {
            let (p, q) = (args[0].ptr(), args[1].ptr());
            let width = args[2].num() as i64;
            let sum = (0..width).map(|t| self.load(p, t) * self.load(q, t)).sum();
            return Val::Num(sum);
        }
        panic!("unknown call {}", name)
    }
}

fn mentions_thread(e: &Expr) -> bool {
    let mut found = false;
    e.walk(&mut |e| found |= matches!(e, Expr::ThreadIdx));
    found
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
