//! Single-pass native x86-64 code generator for the Tyl/Flex language,
//! plus the AST-level optimizer pipeline that runs ahead of it (§1).
//!
//! `ast` defines the checked tree this crate consumes; `optimize` mutates
//! it in place; `lower` walks the (possibly optimized) tree directly into
//! [`instr::InstrBuffer`] bytes per function; `link` merges every
//! function's buffer into one address space; `pe` hands the result to the
//! external PE-writer collaborator. `program` and `monomorphize` wire the
//! whole-program pieces together; `regalloc`, `frame`, `typetab`, and
//! `record` are the side tables the lowerer consults; `error` and
//! `diagnostic` are the failure and reporting surface.

pub mod ast;
pub mod diagnostic;
pub mod error;
pub mod frame;
pub mod instr;
pub mod link;
pub mod lower;
pub mod monomorphize;
pub mod optimize;
pub mod pe;
pub mod program;
pub mod record;
pub mod regalloc;
pub mod runtime;
#[cfg(test)]
mod testutil;
pub mod typetab;

pub use error::{EmitError, EmitResult, OptimizeError};
pub use optimize::{OptLevel, Pipeline};
pub use program::{compile_program, CompiledModule};
