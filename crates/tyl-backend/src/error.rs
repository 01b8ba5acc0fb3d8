//! Emission errors.
//!
//! §7 classifies failures into four kinds. Emission is all-or-nothing: on
//! any [`EmitError`], no output file is produced. Optimizer passes use the
//! separate [`OptimizeError`], which is never fatal — the pipeline logs the
//! inconsistency and skips the pass (§7, last paragraph).

use crate::ast::Span;
use thiserror::Error;

pub type EmitResult<T> = Result<T, EmitError>;

#[derive(Debug, Error)]
pub enum EmitError {
    /// An AST construct with no lowering (e.g. an operator combination the
    /// emitter doesn't support).
    #[error("unsupported construct: {what}")]
    BadInput { what: String, span: Span },

    /// A computed RIP-relative displacement didn't fit in 32 bits.
    #[error("offset overflow: {context} exceeds a 32-bit displacement")]
    OffsetOverflow { context: String },

    /// An `extern` identifier has no entry in the PE import table.
    #[error("unresolved import: {name}")]
    ImportNotResolved { name: String },

    /// An invariant was violated — a compiler bug, not a user error.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl EmitError {
    pub fn bad_input(what: impl Into<String>, span: Span) -> Self {
        EmitError::BadInput { what: what.into(), span }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        EmitError::Internal { message: message.into() }
    }

    /// Whether this error should be reported with a source span (only
    /// `BadInput` is the user's fault at a specific location).
    pub fn span(&self) -> Option<Span> {
        match self {
            EmitError::BadInput { span, .. } => Some(*span),
            _ => None,
        }
    }
}

/// Non-fatal failures inside a single optimizer pass. The pipeline (see
/// [`crate::optimize::Pipeline`]) catches these, counts them, and emits the
/// *unoptimized* AST for that pass rather than aborting the whole
/// compilation.
#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("{pass}: invariant violated: {message}")]
    InvariantViolated { pass: &'static str, message: String },
}
