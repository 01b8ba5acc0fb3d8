//! List builtins (§4.4, §5). Layout is pinned to
//! `[len(8)][capacity(8)][elem0..]` uniformly (resolves the list layout
//! open question) — every list builtin addresses through that same shape.

use crate::ast::Expr;
use crate::error::EmitResult;
use crate::instr::Gpr;

use super::super::Lowerer;

pub fn lower_len(l: &mut Lowerer, list: &Expr) -> EmitResult<()> {
    l.lower_expr(list)?;
    l.buf.mov_reg_mem_rax(Gpr::Rax);
    Ok(())
}

/// `push(list, value)`. Growth-on-demand (reallocating when `len ==
/// capacity`) is the runtime allocator's job; this lowering always calls
/// through to `tyl_rt_list_push`, which handles both the in-place and
/// reallocating cases behind one ABI.
pub fn lower_push(l: &mut Lowerer, list: &Expr, value: &Expr) -> EmitResult<()> {
    l.lower_expr(list)?;
    l.buf.push_reg(Gpr::Rax);
    l.lower_expr(value)?;
    l.buf.mov_reg_reg(Gpr::Rdx, Gpr::Rax);
    l.buf.pop_reg(Gpr::Rcx);
    l.buf.call_rip_import(0); // tyl_rt_list_push(list, value)
    Ok(())
}

pub fn lower_pop(l: &mut Lowerer, list: &Expr) -> EmitResult<()> {
    l.lower_expr(list)?;
    l.buf.mov_reg_reg(Gpr::Rcx, Gpr::Rax);
    l.buf.call_rip_import(0); // tyl_rt_list_pop(list) -> value
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    #[test]
    fn len_loads_the_header_word() {
        let f = function("f", vec![], crate::ast::Type::I64, block(vec![]));
        let globals: &'static crate::regalloc::RegisterTable = Box::leak(Box::new(Default::default()));
        let types: &'static crate::typetab::TypeTable = Box::leak(Box::new(crate::typetab::TypeTable::new()));
        let records: &'static crate::record::RecordTable = Box::leak(Box::new(crate::record::RecordTable::build(&[])));
        let functions: &'static rustc_hash::FxHashMap<String, crate::ast::Function> = Box::leak(Box::new(Default::default()));
        let mut l = Lowerer::new(&f, globals, types, records, functions);
        lower_len(&mut l, &ident_ty("xs", crate::ast::Type::List(Box::new(crate::ast::Type::I64)))).unwrap();
        assert!(!l.buf.is_empty());
    }
}
