use std::fmt;

use crate::diagnostic::Diagnostic;
use crate::shape::Shape;
use crate::span::Span;

/// Rendered text of the operation that failed, with the byte spans of
/// its two operands inside that text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpSite {
    pub text: String,
    pub lhs: Span,
    pub rhs: Span,
}

impl OpSite {
    /// Join two rendered operands with an infix operator: `lhs op rhs`.
    pub fn infix(lhs: &str, op: &str, rhs: &str) -> Self {
        let text = format!("{} {} {}", lhs, op, rhs);
        let rhs_at = lhs.len() + op.len() + 2;
        Self {
            lhs: Span::of(0, lhs),
            rhs: Span::of(rhs_at, rhs),
            text,
        }
    }

    /// Render as a call: `name(lhs, rhs)`.
    pub fn call(name: &str, lhs: &str, rhs: &str) -> Self {
        let text = format!("{}({}, {})", name, lhs, rhs);
        let lhs_at = name.len() + 1;
        let rhs_at = lhs_at + lhs.len() + 2;
        Self {
            lhs: Span::of(lhs_at, lhs),
            rhs: Span::of(rhs_at, rhs),
            text,
        }
    }

    pub fn span(&self) -> Span {
        Span::of(0, &self.text)
    }
}

impl fmt::Display for OpSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Everything that aborts the build of an array program.
///
/// All shape and operand errors are raised while the expression graph
/// is being built or checked, before any loop of the failing statement
/// is emitted.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum BuildError {
    #[error("shape mismatch in `{site}`: {lhs} vs {rhs}")]
    ShapeMismatch { site: OpSite, lhs: Shape, rhs: Shape },

    #[error("dimension mismatch in `{site}`: cannot multiply {lhs} by {rhs}")]
    DimensionMismatch { site: OpSite, lhs: Shape, rhs: Shape },

    #[error("unsupported operand to `{op}`: {kind}")]
    UnsupportedOperandType { op: &'static str, kind: String },

    #[error("array `{array}` has a zero extent in shape {shape}")]
    InvalidExtent { array: String, shape: Shape },

    #[error("array `{array}` of shape {shape} does not fit in addressable memory")]
    BufferTooLarge { array: String, shape: Shape },

    #[error("array `{0}` used after it was released")]
    ReleasedArray(String),

    #[error("array `{array}` has no device buffer; call to_device before device-scoped use")]
    NoDeviceBuffer { array: String },

    #[error("handle does not belong to the build or statement using it")]
    ForeignNode,
}

impl BuildError {
    /// Text the diagnostic's spans point into.
    pub fn source_text(&self) -> String {
        match self {
            BuildError::ShapeMismatch { site, .. } | BuildError::DimensionMismatch { site, .. } => {
                site.text.clone()
            }
            _ => String::new(),
        }
    }

    /// Convert to a renderable diagnostic over [`BuildError::source_text`].
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            BuildError::ShapeMismatch { site, lhs, rhs } => {
                Diagnostic::error("shape mismatch".to_string(), site.span())
                    .with_label(site.lhs, format!("has shape {}", lhs))
                    .with_label(site.rhs, format!("has shape {}", rhs))
                    .with_help(
                        "element-wise operands need equal shapes, or one must be a scalar"
                            .to_string(),
                    )
            }
            BuildError::DimensionMismatch { site, lhs, rhs } => {
                let mut d = Diagnostic::error("dimension mismatch".to_string(), site.span())
                    .with_label(site.lhs, format!("has shape {}", lhs))
                    .with_label(site.rhs, format!("has shape {}", rhs));
                if lhs.rank() != 2 || rhs.rank() != 2 {
                    d = d.with_note("cross is only defined for rank-2 operands".to_string());
                } else {
                    d = d.with_note(format!(
                        "inner extents differ: {} vs {}",
                        lhs.dims()[1],
                        rhs.dims()[0]
                    ));
                }
                d
            }
            other => Diagnostic::error(other.to_string(), Span::dummy()),
        }
    }
}
