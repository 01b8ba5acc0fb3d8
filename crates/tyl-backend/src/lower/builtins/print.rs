//! `print`/`println` (§4.4 Builtins, §4.7 runtime snippets).
//!
//! String concatenation (`a + b` on string operands, desugared by the
//! checker into `ExprKind::Concat`) is intercepted here and expanded into
//! one print call per part instead of materializing a concatenated string —
//! the only place `Concat` is legal to encounter.

use crate::ast::{Expr, ExprKind, Type};
use crate::error::{EmitError, EmitResult};
use crate::instr::Gpr;

use super::super::Lowerer;

pub fn lower_print(l: &mut Lowerer, args: &[Expr], newline: bool) -> EmitResult<()> {
    for arg in args {
        lower_one(l, arg)?;
    }
    if newline {
        // `\n` is a single fixed string constant owned by the PE writer's
        // rodata section; the data fix-up RVA is resolved at link time.
        l.buf.call_rip_import(0);
    }
    Ok(())
}

fn lower_one(l: &mut Lowerer, arg: &Expr) -> EmitResult<()> {
    match &arg.kind {
        ExprKind::Concat(parts) => {
            for part in parts {
                lower_one(l, part)?;
            }
            Ok(())
        }
        ExprKind::StrLit(_) => {
            // The string's bytes live in the PE writer's rodata section;
            // the lowerer only needs to reference it by RVA and call the
            // console-write thunk, mirroring `print_int`'s shape.
            l.buf.lea_reg_rip(Gpr::Rcx, 0, crate::instr::DataFixUpKind::StringLiteral);
            l.buf.call_rip_import(0);
            Ok(())
        }
        _ if arg.ty == Type::I64 => {
            l.lower_expr(arg)?;
            l.buf.mov_reg_reg(Gpr::Rcx, Gpr::Rax);
            l.buf.call_rel32(crate::runtime::PRINT_INT_LABEL);
            Ok(())
        }
        _ if arg.ty == Type::F64 => {
            l.lower_expr(arg)?;
            l.buf.call_rel32(crate::runtime::PRINT_FLOAT_LABEL);
            Ok(())
        }
        _ if arg.ty == Type::Bool => {
            l.lower_expr(arg)?;
            l.buf.mov_reg_reg(Gpr::Rcx, Gpr::Rax);
            l.buf.call_rel32(crate::runtime::PRINT_INT_LABEL);
            Ok(())
        }
        _ => Err(EmitError::bad_input(format!("print of type `{}` is not supported", arg.ty), arg.span)),
    }
}
