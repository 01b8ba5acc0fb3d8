//! The instruction buffer and its primitive x86-64 emitters (§4.1).

mod buffer;
mod emit;
mod reg;

pub use buffer::{DataFixUp, DataFixUpKind, FixUp, InstrBuffer};
pub use emit::Cond;
pub use reg::{Gpr, Xmm};
