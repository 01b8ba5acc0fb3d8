//! The typed AST this backend consumes.
//!
//! The lexer, parser, and type checker are out of scope (§1) — only their
//! output, the tree defined here, is consumed. Every node that can appear in
//! source already carries its checked [`types::Type`]; this crate never
//! infers or unifies types, it only reads them.

pub mod expr;
pub mod item;
pub mod pretty;
pub mod span;
pub mod stmt;
pub mod types;
pub mod walk;

pub use expr::{
    try_eval_const_int, try_eval_const_str, BinaryOp, CalleeKind, CompoundOp, Expr, ExprKind, LogicalOp, UnaryOp,
};
pub use item::{FieldDecl, Function, GlobalVar, ImplBlock, Param, Program, RecordDecl, TraitDecl};
pub use pretty::PrettyPrint;
pub use span::Span;
pub use stmt::{Block, ForIter, MatchArm, Pattern, Stmt, StmtKind, VarDecl};
pub use types::{Type, TypeArgs};
