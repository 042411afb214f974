//! Staged intermediate representation produced by a build pass.
//!
//! Build-time values (extents, byte counts, folded constants) are
//! literals; run-time values are named variables. Loops are structural
//! and carry their bodies, so a backend decides how to emit them and
//! which annotated loops become separate kernels.

pub mod builder;
pub mod optimize;

use std::fmt;

// ─── Types ────────────────────────────────────────────────────────

/// Element type of an array buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElemType {
    Int,
    Float,
}

impl ElemType {
    /// Size of one element in bytes.
    pub fn size(self) -> usize {
        4
    }

    /// Additive identity.
    pub fn zero(self) -> Expr {
        match self {
            ElemType::Int => Expr::Int(0),
            ElemType::Float => Expr::Float(0.0),
        }
    }

    /// Result type of an arithmetic combination.
    pub fn join(self, other: ElemType) -> ElemType {
        if self == ElemType::Float || other == ElemType::Float {
            ElemType::Float
        } else {
            ElemType::Int
        }
    }
}

impl fmt::Display for ElemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElemType::Int => write!(f, "int"),
            ElemType::Float => write!(f, "float"),
        }
    }
}

/// Type of a declared variable or parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ty {
    Elem(ElemType),
    Ptr(ElemType),
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Elem(e) => write!(f, "{}", e),
            Ty::Ptr(e) => write!(f, "{}*", e),
        }
    }
}

/// A build-time scalar constant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
}

impl Scalar {
    pub fn elem(self) -> ElemType {
        match self {
            Scalar::Int(_) => ElemType::Int,
            Scalar::Float(_) => ElemType::Float,
        }
    }

    /// The value a store into an `elem` buffer keeps: an int widens to
    /// float, a float truncates toward zero.
    pub fn cast(self, elem: ElemType) -> Scalar {
        match (self, elem) {
            (Scalar::Int(v), ElemType::Float) => Scalar::Float(v as f64),
            (Scalar::Float(v), ElemType::Int) => Scalar::Int(v.trunc() as i64),
            (s, _) => s,
        }
    }

    pub fn to_expr(self) -> Expr {
        match self {
            Scalar::Int(v) => Expr::Int(v),
            Scalar::Float(v) => Expr::Float(v),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int(v as i64)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<f32> for Scalar {
    fn from(v: f32) -> Self {
        Scalar::Float(v as f64)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{:?}", v),
        }
    }
}

// ─── Expressions ──────────────────────────────────────────────────

/// Run-time expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Var(String),
    /// Reserved device thread index. Only meaningful inside a kernel.
    ThreadIdx,
    Add(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    /// `base[offset]`
    Index(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn index(base: Expr, offset: Expr) -> Self {
        Expr::Index(Box::new(base), Box::new(offset))
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call(name.into(), args)
    }

    /// Visit this expression and every sub-expression, pre-order.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        f(self);
        match self {
            Expr::Add(a, b) | Expr::Mul(a, b) | Expr::Index(a, b) => {
                a.walk(f);
                b.walk(f);
            }
            Expr::Call(_, args) => {
                for a in args {
                    a.walk(f);
                }
            }
            Expr::Int(_) | Expr::Float(_) | Expr::Var(_) | Expr::ThreadIdx => {}
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Add(..) => 1,
            Expr::Mul(..) => 2,
            _ => 3,
        }
    }

    fn fmt_prec(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        let parens = self.precedence() < min;
        if parens {
            write!(f, "(")?;
        }
        match self {
            Expr::Int(v) => write!(f, "{}", v)?,
            Expr::Float(v) => write!(f, "{:?}", v)?,
            Expr::Var(name) => write!(f, "{}", name)?,
            Expr::ThreadIdx => write!(f, "{}", THREAD_INDEX)?,
            Expr::Add(a, b) => {
                a.fmt_prec(f, 1)?;
                write!(f, " + ")?;
                b.fmt_prec(f, 2)?;
            }
            Expr::Mul(a, b) => {
                a.fmt_prec(f, 2)?;
                write!(f, " * ")?;
                b.fmt_prec(f, 3)?;
            }
            Expr::Index(base, off) => {
                base.fmt_prec(f, 3)?;
                write!(f, "[")?;
                off.fmt_prec(f, 0)?;
                write!(f, "]")?;
            }
            Expr::Call(name, args) => {
                write!(f, "{}(", name)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    a.fmt_prec(f, 0)?;
                }
                write!(f, ")")?;
            }
        }
        if parens {
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// Spelling of [`Expr::ThreadIdx`] in rendered text.
pub const THREAD_INDEX: &str = "threadIdx.x";

impl std::ops::Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        Expr::Add(Box::new(self), Box::new(rhs))
    }
}

impl std::ops::Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        Expr::Mul(Box::new(self), Box::new(rhs))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_prec(f, 0)
    }
}

// ─── Statements ───────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Decl {
        name: String,
        ty: Ty,
        init: Expr,
    },
    /// `target = value`; the target is a variable or an indexed buffer.
    Assign {
        target: Expr,
        value: Expr,
    },
    /// `for (int var = 0; var < extent; var++)`.
    For {
        var: String,
        extent: Expr,
        body: Vec<Stmt>,
        /// Outermost loop of a nest induced under device execution.
        kernel: bool,
    },
    /// Expression evaluated for its effect (runtime calls).
    Call(Expr),
}

impl Stmt {
    /// Visit this statement and all nested statements, pre-order.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Stmt)) {
        f(self);
        if let Stmt::For { body, .. } = self {
            for s in body {
                s.walk(f);
            }
        }
    }

    /// Every expression directly owned by this statement.
    pub fn exprs(&self) -> Vec<&Expr> {
        match self {
            Stmt::Decl { init, .. } => vec![init],
            Stmt::Assign { target, value } => vec![target, value],
            Stmt::For { extent, .. } => vec![extent],
            Stmt::Call(e) => vec![e],
        }
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);
        match self {
            Stmt::Decl { name, ty, init } => writeln!(f, "{}{} {} = {};", pad, ty, name, init),
            Stmt::Assign { target, value } => writeln!(f, "{}{} = {};", pad, target, value),
            Stmt::Call(e) => writeln!(f, "{}{};", pad, e),
            Stmt::For {
                var,
                extent,
                body,
                kernel,
            } => {
                if *kernel {
                    writeln!(f, "{}#pragma kernel", pad)?;
                }
                writeln!(
                    f,
                    "{}for (int {} = 0; {} < {}; {}++) {{",
                    pad, var, var, extent, var
                )?;
                for s in body {
                    s.write(f, indent + 1)?;
                }
                writeln!(f, "{}}}", pad)
            }
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, 0)
    }
}

// ─── Program ──────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Ty,
}

/// One fully built array program.
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
}

impl Program {
    /// Total number of statements, nested ones included.
    pub fn stmt_count(&self) -> usize {
        let mut n = 0;
        for s in &self.body {
            s.walk(&mut |_| n += 1);
        }
        n
    }

    /// Number of calls to the named function anywhere in the program.
    pub fn count_calls(&self, name: &str) -> usize {
        let mut n = 0;
        for s in &self.body {
            s.walk(&mut |stmt| {
                for e in stmt.exprs() {
                    e.walk(&mut |e| {
                        if matches!(e, Expr::Call(callee, _) if callee == name) {
                            n += 1;
                        }
                    });
                }
            });
        }
        n
    }

    pub fn kernel_regions(&self) -> Vec<&Stmt> {
        kernel_regions(&self.body)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "void {}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", p.ty, p.name)?;
        }
        writeln!(f, ") {{")?;
        for s in &self.body {
            s.write(f, 1)?;
        }
        writeln!(f, "}}")
    }
}

/// Loops annotated as kernel-region candidates. A kernel loop's own
/// body is not searched: nested loops belong to the same region.
pub fn kernel_regions(body: &[Stmt]) -> Vec<&Stmt> {
    let mut out = Vec::new();
    for s in body {
        if let Stmt::For { body, kernel, .. } = s {
            if *kernel {
                out.push(s);
            } else {
                out.extend(kernel_regions(body));
            }
        }
    }
    out
}

// ─── Tests ────────────────────────────────────────────────────────
