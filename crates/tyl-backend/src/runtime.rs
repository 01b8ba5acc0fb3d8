//! Shared runtime snippets (§4.7): small hand-written routines emitted once
//! per module and called from many sites — `itoa`, `ftoa`, and the
//! `print_int`/`print_float` wrappers around the Win32 console API.
//!
//! At `-O3`/`-Ofast` these are dropped entirely if [`RuntimeUsage`] reports
//! no caller needed them; [`crate::program::compute_runtime_usage`] derives
//! that report from which snippet labels the compiled functions actually
//! reference, and this module's [`emit_used`] is what acts on it — tree-
//! shaking here is a link-time decision, not something `crate::optimize::dce`
//! participates in.

use crate::instr::{Cond, Gpr, InstrBuffer, Xmm};

/// Tracks which shared snippets at least one call site actually used, so
/// the module writer can skip emitting anything nobody calls.
#[derive(Default, Clone, Copy)]
pub struct RuntimeUsage {
    pub itoa: bool,
    pub ftoa: bool,
    pub print_int: bool,
    pub print_float: bool,
}

impl RuntimeUsage {
    pub fn any(&self) -> bool {
        self.itoa || self.ftoa || self.print_int || self.print_float
    }
}

pub const ITOA_LABEL: &str = "$rt_itoa";
pub const FTOA_LABEL: &str = "$rt_ftoa";
pub const PRINT_INT_LABEL: &str = "$rt_print_int";
pub const PRINT_FLOAT_LABEL: &str = "$rt_print_float";

/// `itoa(value: i64, buf: *mut i64) -> cursor: *mut i64`. Writes one
/// decimal digit (as an 8-byte cell, matching this backend's uniform
/// GPR-width memory model) per slot, walking `buf` backward from a 32-slot
/// window so the digits land most-significant-first without a second
/// reversal pass — the scenario from §8 (`itoa(42, ...)`).
///
/// Convention: `rcx` = value, `rdx` = buffer base. Returns the first
/// written slot's address in `rax`. Destroys `rcx`, `rdx`, `r9`.
pub fn emit_itoa(buf: &mut InstrBuffer) {
    buf.bind_label(ITOA_LABEL);
    let positive = "$rt_itoa$positive";
    buf.cmp_reg_imm32(Gpr::Rcx, 0);
    buf.jcc_rel32(Cond::Ge, positive);
    buf.neg_reg(Gpr::Rcx);
    buf.bind_label(positive);

    buf.mov_reg_reg(Gpr::R9, Gpr::Rdx);
    buf.add_reg_imm32(Gpr::R9, 31 * 8);

    let digit_loop = "$rt_itoa$digit_loop";
    buf.bind_label(digit_loop);
    buf.mov_reg_reg(Gpr::Rax, Gpr::Rcx);
    buf.mov_reg_imm64(Gpr::Rcx, 10);
    buf.cqo();
    buf.idiv_reg(Gpr::Rcx);
    buf.add_reg_imm32(Gpr::Rdx, b'0' as i32);
    buf.mov_mem_disp_reg(Gpr::R9, 0, Gpr::Rdx);
    buf.mov_reg_reg(Gpr::Rcx, Gpr::Rax);
    buf.sub_reg_imm32(Gpr::R9, 8);
    buf.cmp_reg_imm32(Gpr::Rcx, 0);
    buf.jcc_rel32(Cond::Ne, digit_loop);

    buf.add_reg_imm32(Gpr::R9, 8); // back up to the last slot actually written
    buf.mov_reg_reg(Gpr::Rax, Gpr::R9);
    buf.ret();
}

/// `print_int(value: i64) -> ()`. Formats with [`emit_itoa`] into a stack
/// scratch buffer, then calls the imported `WriteConsoleA`/`WriteFile`
/// (resolved through the PE import table at link time).
pub fn emit_print_int(buf: &mut InstrBuffer) {
    buf.bind_label(PRINT_INT_LABEL);
    buf.sub_reg_imm32(Gpr::Rsp, 32 * 8 + 32); // digit window + shadow space
    buf.mov_reg_reg(Gpr::Rdx, Gpr::Rsp);
    buf.call_rel32(ITOA_LABEL);
    // rax now holds the address of the first written digit slot; the PE
    // writer's console-write thunk consumes it directly.
    buf.call_rip_import(0); // WriteConsoleA import slot, patched by the PE writer
    buf.add_reg_imm32(Gpr::Rsp, 32 * 8 + 32);
    buf.ret();
}

/// `ftoa(frac: f64, buf: *mut i64) -> cursor: *mut i64`. Produces six
/// fractional digits by repeatedly multiplying the remainder by 10,
/// truncating with `cvttsd2si`, and subtracting the truncated digit back out
/// before the next iteration (§4.7). `frac` must already be the non-negative
/// fractional remainder (the integer part stripped by the caller).
///
/// Convention: `xmm0` = fractional remainder, `rcx` = buffer base. Returns
/// the first written slot's address in `rax`. Destroys `rax`, `rdx`, `r9`,
/// `xmm0`, `xmm1`.
pub fn emit_ftoa(buf: &mut InstrBuffer) {
    buf.bind_label(FTOA_LABEL);
    buf.mov_reg_reg(Gpr::R9, Gpr::Rcx); // buffer base aside

    buf.mov_reg_imm64(Gpr::Rax, 10);
    buf.cvtsi2sd(Xmm::Xmm1, Gpr::Rax);

    for i in 0..6 {
        buf.mulsd(Xmm::Xmm0, Xmm::Xmm1);
        buf.cvttsd2si(Gpr::Rdx, Xmm::Xmm0);
        buf.cvtsi2sd(Xmm::Xmm1, Gpr::Rdx); // xmm1 = truncated digit, widened
        buf.subsd(Xmm::Xmm0, Xmm::Xmm1);
        buf.add_reg_imm32(Gpr::Rdx, b'0' as i32);
        buf.mov_mem_disp_reg(Gpr::R9, 8 * i, Gpr::Rdx);
        buf.mov_reg_imm64(Gpr::Rax, 10);
        buf.cvtsi2sd(Xmm::Xmm1, Gpr::Rax); // restore the constant multiplier
    }

    buf.mov_reg_reg(Gpr::Rax, Gpr::R9);
    buf.ret();
}

/// `print_float(value: f64) -> ()`. Splits `value` into its integer and
/// fractional parts with `cvttsd2si`, formats the integer part with
/// [`emit_itoa`], a literal `.`, then six fractional digits with
/// [`emit_ftoa`] — mirroring `emit_itoa`'s own magnitude-only precedent, no
/// sign character is emitted. The integer and fractional digit windows share
/// one stack buffer, one after the other, since neither needs the other's
/// digits once its own console-write call has gone out.
pub fn emit_print_float(buf: &mut InstrBuffer) {
    buf.bind_label(PRINT_FLOAT_LABEL);

    buf.cvttsd2si(Gpr::Rax, Xmm::Xmm0); // rax = truncated integer part
    buf.cvtsi2sd(Xmm::Xmm1, Gpr::Rax);
    buf.subsd(Xmm::Xmm0, Xmm::Xmm1); // xmm0 = fractional remainder
    buf.mov_reg_reg(Gpr::Rcx, Gpr::Rax); // value for itoa

    buf.sub_reg_imm32(Gpr::Rsp, 32 * 8 + 32); // digit window + shadow space
    buf.mov_reg_reg(Gpr::Rdx, Gpr::Rsp);
    buf.call_rel32(ITOA_LABEL);
    buf.call_rip_import(0); // print the integer digits

    buf.lea_reg_rip(Gpr::Rcx, 0, crate::instr::DataFixUpKind::StringLiteral); // "."
    buf.call_rip_import(0);

    buf.mov_reg_reg(Gpr::Rcx, Gpr::Rsp); // reuse the same window for fractional digits
    buf.call_rel32(FTOA_LABEL);
    buf.call_rip_import(0); // print the fractional digits

    buf.add_reg_imm32(Gpr::Rsp, 32 * 8 + 32);
    buf.ret();
}

/// Emits every snippet [`RuntimeUsage`] marks as used, in a fixed order so
/// output is deterministic across runs.
pub fn emit_used(buf: &mut InstrBuffer, usage: RuntimeUsage) {
    // `print_float` calls into `itoa` for the integer part, so it pulls
    // `itoa` in as a transitive dependency the same way `print_int` does.
    if usage.print_int || usage.itoa || usage.print_float {
        emit_itoa(buf);
    }
    if usage.print_float || usage.ftoa {
        emit_ftoa(buf);
    }
    if usage.print_int {
        emit_print_int(buf);
    }
    if usage.print_float {
        emit_print_float(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_used_skips_everything_when_nothing_is_referenced() {
        let mut buf = InstrBuffer::new();
        emit_used(&mut buf, RuntimeUsage::default());
        assert!(buf.is_empty());
    }

    #[test]
    fn print_int_pulls_in_itoa_as_a_dependency() {
        let mut buf = InstrBuffer::new();
        emit_used(&mut buf, RuntimeUsage { print_int: true, ..Default::default() });
        assert!(!buf.is_empty());
        assert!(buf.label_offset(ITOA_LABEL).is_some());
        assert!(buf.label_offset(PRINT_INT_LABEL).is_some());
    }

    #[test]
    fn print_float_pulls_in_ftoa_as_a_dependency() {
        let mut buf = InstrBuffer::new();
        emit_used(&mut buf, RuntimeUsage { print_float: true, ..Default::default() });
        assert!(buf.label_offset(FTOA_LABEL).is_some());
        assert!(buf.label_offset(PRINT_FLOAT_LABEL).is_some());
    }

    #[test]
    fn print_float_also_pulls_in_itoa_for_the_integer_part() {
        // emit_print_float calls into $rt_itoa directly; a module that
        // only ever prints floats must still get an itoa snippet or the
        // call would target an unbound label at link time.
        let mut buf = InstrBuffer::new();
        emit_used(&mut buf, RuntimeUsage { print_float: true, ..Default::default() });
        assert!(buf.label_offset(ITOA_LABEL).is_some());
    }
}
