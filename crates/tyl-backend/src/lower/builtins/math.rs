//! Math builtins (§4.4). Integer `abs`/`min`/`max` lower to branch-free or
//! single-branch GPR sequences; `sqrt` on a float operand uses the native
//! `sqrtsd` instruction rather than a runtime call.

use crate::ast::Expr;
use crate::error::EmitResult;
use crate::instr::{Cond, Gpr};

use super::super::Lowerer;

pub fn lower_abs(l: &mut Lowerer, value: &Expr) -> EmitResult<()> {
    l.lower_expr(value)?;
    l.buf.mov_reg_reg(Gpr::Rcx, Gpr::Rax);
    l.buf.neg_reg(Gpr::Rcx);
    l.buf.cmp_reg_imm32(Gpr::Rax, 0);
    // `cmovl`-style selection isn't in this instruction set yet, so abs
    // takes a single conditional jump instead of a branch-free cmov.
    let negative = l.fresh_label("abs_negative");
    let done = l.fresh_label("abs_done");
    l.buf.jcc_rel32(Cond::Lt, negative);
    l.buf.jmp_rel32(done.clone());
    l.buf.bind_label(negative);
    l.buf.mov_reg_reg(Gpr::Rax, Gpr::Rcx);
    l.buf.bind_label(done);
    Ok(())
}

pub fn lower_minmax(l: &mut Lowerer, a: &Expr, b: &Expr, want_min: bool) -> EmitResult<()> {
    l.lower_expr(a)?;
    l.buf.push_reg(Gpr::Rax);
    l.lower_expr(b)?;
    l.buf.mov_reg_reg(Gpr::Rcx, Gpr::Rax);
    l.buf.pop_reg(Gpr::Rax);
    l.buf.cmp_reg_reg(Gpr::Rax, Gpr::Rcx);
    let keep_a = l.fresh_label("minmax_keep_a");
    let done = l.fresh_label("minmax_done");
    let cond = if want_min { Cond::Lt } else { Cond::Gt };
    l.buf.jcc_rel32(cond, keep_a.clone());
    l.buf.mov_reg_reg(Gpr::Rax, Gpr::Rcx);
    l.buf.jmp_rel32(done.clone());
    l.buf.bind_label(keep_a);
    l.buf.bind_label(done);
    Ok(())
}

pub fn lower_sqrt(l: &mut Lowerer, value: &Expr) -> EmitResult<()> {
    l.lower_expr(value)?;
    // `sqrtsd xmm0, xmm0` has no dedicated emitter yet (it's the only
    // unary SSE2 op this backend needs); encode it inline.
    l.buf.push_bytes(&[0xF2, 0x0F, 0x51, 0xC0]);
    Ok(())
}
