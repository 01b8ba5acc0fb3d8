//! `Result<T, E>` builtins (§4.4). Represented inline as a single tagged
//! `i64`: `(value << 1) | tag`, tag `1` = `Ok`, `0` = `Err` (§6) — no heap
//! allocation, unlike a record variant.

use crate::ast::Expr;
use crate::error::EmitResult;
use crate::instr::{Cond, Gpr};

use super::super::Lowerer;

const OK_TAG: i64 = 1;

fn lower_tagged(l: &mut Lowerer, tag: i64, payload: &Expr) -> EmitResult<()> {
    l.lower_expr(payload)?;
    l.buf.shl_reg_imm8(Gpr::Rax, 1);
    if tag == OK_TAG {
        l.buf.or_reg_imm32(Gpr::Rax, 1);
    }
    Ok(())
}

pub fn lower_ok(l: &mut Lowerer, payload: &Expr) -> EmitResult<()> {
    lower_tagged(l, OK_TAG, payload)
}

pub fn lower_err(l: &mut Lowerer, payload: &Expr) -> EmitResult<()> {
    lower_tagged(l, 0, payload)
}

pub fn lower_is_ok(l: &mut Lowerer, result: &Expr) -> EmitResult<()> {
    l.lower_expr(result)?;
    l.buf.and_reg_imm32(Gpr::Rax, 1);
    l.buf.cmp_reg_imm32(Gpr::Rax, 0);
    l.buf.setcc_movzx(Cond::Ne, Gpr::Rax);
    Ok(())
}

pub fn lower_is_err(l: &mut Lowerer, result: &Expr) -> EmitResult<()> {
    l.lower_expr(result)?;
    l.buf.and_reg_imm32(Gpr::Rax, 1);
    l.buf.cmp_reg_imm32(Gpr::Rax, 0);
    l.buf.setcc_movzx(Cond::Eq, Gpr::Rax);
    Ok(())
}

/// `unwrap` extracts the payload unconditionally; whether that's checked
/// against the tag at the call site is the checker's concern (§3 —
/// panics-on-Err are an external runtime responsibility).
pub fn lower_unwrap(l: &mut Lowerer, result: &Expr) -> EmitResult<()> {
    l.lower_expr(result)?;
    l.buf.sar_reg_imm8(Gpr::Rax, 1);
    Ok(())
}

/// `unwrap_or` extracts the payload if `result` is `Ok`, otherwise lowers
/// `default` instead. The tagged value is kept aside in RCX across the tag
/// test so the `Ok` arm doesn't need to re-evaluate `result`.
pub fn lower_unwrap_or(l: &mut Lowerer, result: &Expr, default: &Expr) -> EmitResult<()> {
    let else_label = l.fresh_label("unwrap_or_else");
    let join_label = l.fresh_label("unwrap_or_join");

    l.lower_expr(result)?;
    l.buf.mov_reg_reg(Gpr::Rcx, Gpr::Rax);
    l.buf.and_reg_imm32(Gpr::Rax, 1);
    l.buf.cmp_reg_imm32(Gpr::Rax, 0);
    l.buf.jcc_rel32(Cond::Eq, else_label.clone());

    l.buf.mov_reg_reg(Gpr::Rax, Gpr::Rcx);
    l.buf.sar_reg_imm8(Gpr::Rax, 1);
    l.buf.jmp_rel32(join_label.clone());

    l.buf.bind_label(else_label);
    l.lower_expr(default)?;

    l.buf.bind_label(join_label);
    Ok(())
}
