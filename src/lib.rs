pub mod api;
pub mod array;
pub mod config;
pub mod device;
pub mod diagnostic;
pub mod error;
pub mod expr;
pub mod ir;
pub mod operand;
pub mod runtime;
pub mod shape;
pub mod span;

pub use api::*;
pub use array::{ArrayDesc, ArrayId};
pub use config::TargetConfig;
pub use device::Device;
pub use error::BuildError;
pub use expr::{ExprGraph, Node, NodeId};
pub use ir::builder::BuildContext;
pub use ir::{ElemType, Expr, Program, Scalar, Stmt, Ty};
pub use operand::{IntoOperand, Operand, Value};
pub use shape::Shape;
