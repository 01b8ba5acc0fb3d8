//! Closure literal allocation (§4.4, §4.6).
//!
//! A closure value is a heap object `[fn_ptr(8) | refcount(8) |
//! capture0(8) | capture1(8) | ...]`. The literal's own body doesn't have a
//! function entry anywhere in the program — it's queued in
//! [`super::PendingClosure`] the first time its literal is lowered, and
//! [`crate::program::compile_program`] lowers each queued body as an
//! ordinary function afterward, via [`super::Lowerer::lower_closure_function`].

use crate::ast::{Block, Type};
use crate::error::EmitResult;
use crate::instr::Gpr;

use super::{Lowerer, PendingClosure};

pub fn lower_closure_lit(l: &mut Lowerer, params: &[String], captures: &[String], body: &Block) -> EmitResult<()> {
    let label = l.fresh_label("closure");
    let total_bytes = 16 + 8 * captures.len() as i32;

    l.buf.mov_reg_imm32(Gpr::Rcx, total_bytes);
    l.buf.call_rip_import(0); // `tyl_rt_alloc` import slot
    l.buf.mov_reg_reg(Gpr::Rcx, Gpr::Rax); // base pointer survives the capture stores

    l.buf.lea_reg_rip_label(Gpr::Rax, label.clone());
    l.buf.mov_mem_disp_reg(Gpr::Rcx, 0, Gpr::Rax); // fn_ptr
    l.buf.mov_reg_imm64(Gpr::Rax, 1);
    l.buf.mov_mem_disp_reg(Gpr::Rcx, 8, Gpr::Rax); // refcount

    for (i, name) in captures.iter().enumerate() {
        l.buf.push_reg(Gpr::Rcx);
        l.lower_ident_load(name, &Type::I64)?;
        l.buf.mov_reg_reg(Gpr::Rdx, Gpr::Rax);
        l.buf.pop_reg(Gpr::Rcx);
        l.buf.mov_mem_disp_reg(Gpr::Rcx, 16 + 8 * i as i32, Gpr::Rdx);
    }
    l.buf.mov_reg_reg(Gpr::Rax, Gpr::Rcx);

    l.pending_closures.push(PendingClosure {
        label,
        params: params.to_vec(),
        captures: captures.to_vec(),
        body: body.as_ref().clone(),
    });
    Ok(())
}
