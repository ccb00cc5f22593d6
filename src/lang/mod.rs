//! # Source Abstract Syntax Tree
//!
//! The tree handed to the compiler by the external parser. It mirrors the
//! accepted subset of a Python-like grammar: module-level definitions,
//! assignment, `if`, `while`, `return`, imports and expressions.
//!
//! Every node carries its source position so diagnostics can point back at
//! the script.

pub mod node;
pub mod program;
pub mod types;

pub use node::{BinOp, BoolOp, CmpOp, Expr, ExprKind, FunctionDef, Param, Pos, Stmt, StmtKind, UnaryOp};
pub use program::Module;
pub use types::{Type, TypeName};
