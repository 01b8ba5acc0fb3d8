//! End-to-end tests: hand-built checked programs compiled and linked into
//! one byte buffer, asserting on the result of the whole pipeline rather
//! than any single pass. Real execution needs a Windows PE loader, which
//! is out of scope here (`crate::pe`'s `PeWriter` is an external
//! collaborator), so these assert on linked code shape — surviving
//! labels, specific instruction bytes, constant-folded results — instead
//! of an actual process exit code.

mod harness;
mod closures;
mod codegen;
mod optimizer;

pub use harness::*;
