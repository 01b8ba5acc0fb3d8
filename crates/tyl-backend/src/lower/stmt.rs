//! Statement lowerer (§4.5): control flow, declarations, loops, `match`.

use crate::ast::{Block, ForIter, MatchArm, Pattern, Stmt, StmtKind};
use crate::error::{EmitError, EmitResult};
use crate::instr::{Cond, Gpr};

use super::Lowerer;

pub fn lower_block(l: &mut Lowerer, block: &Block) -> EmitResult<()> {
    for stmt in &block.statements {
        lower_stmt(l, stmt)?;
    }
    Ok(())
}

fn lower_stmt(l: &mut Lowerer, stmt: &Stmt) -> EmitResult<()> {
    match &stmt.kind {
        StmtKind::VarDecl(decl) => lower_var_decl(l, decl),
        StmtKind::Expression(e) => {
            l.lower_expr(e)?;
            Ok(())
        }
        StmtKind::Block(b) => lower_block(l, b),
        StmtKind::Return(e) => {
            if let Some(e) = e {
                l.lower_expr(e)?;
            }
            l.buf.jmp_rel32(l.end_label());
            Ok(())
        }
        StmtKind::Break(label) => {
            let target = l.loop_target(label, false)?;
            l.buf.jmp_rel32(target);
            Ok(())
        }
        StmtKind::Continue(label) => {
            let target = l.loop_target(label, true)?;
            l.buf.jmp_rel32(target);
            Ok(())
        }
        StmtKind::If { cond, then_branch, else_branch } => lower_if(l, cond, then_branch, else_branch.as_deref()),
        StmtKind::While { cond, body, label } => lower_while(l, cond, body, label),
        StmtKind::For { var, iter, body, label } => lower_for(l, var, iter, body, label),
        StmtKind::Match { scrutinee, arms } => lower_match(l, scrutinee, arms),
    }
}

fn lower_var_decl(l: &mut Lowerer, decl: &crate::ast::VarDecl) -> EmitResult<()> {
    let name = match &decl.pattern {
        Pattern::Identifier(name) => name,
        other => {
            return Err(EmitError::bad_input(
                format!("destructuring patterns are handled by match, not var-decl: {other:?}"),
                crate::ast::Span::dummy(),
            ))
        }
    };
    if let Some(init) = &decl.initializer {
        l.lower_expr(init)?;
    } else {
        l.buf.mov_reg_imm64(Gpr::Rax, 0);
    }
    l.store_to_name(name, &decl.ty);
    Ok(())
}

fn lower_if(l: &mut Lowerer, cond: &crate::ast::Expr, then_branch: &Block, else_branch: Option<&Stmt>) -> EmitResult<()> {
    l.lower_expr(cond)?;
    l.buf.test_reg_reg(Gpr::Rax, Gpr::Rax);
    let else_label = l.fresh_label("else");
    l.buf.jz_rel32(else_label.clone());
    lower_block(l, then_branch)?;

    let then_falls_through = !then_branch.ends_in_terminator();
    let join_label = if then_falls_through && else_branch.is_some() {
        let join = l.fresh_label("if_join");
        l.buf.jmp_rel32(join.clone());
        Some(join)
    } else {
        None
    };

    l.buf.bind_label(else_label);
    if let Some(else_stmt) = else_branch {
        lower_stmt(l, else_stmt)?;
    }
    if let Some(join) = join_label {
        l.buf.bind_label(join);
    }
    Ok(())
}

fn lower_while(l: &mut Lowerer, cond: &crate::ast::Expr, body: &Block, label: &Option<String>) -> EmitResult<()> {
    let test_label = l.fresh_label("while_test");
    let break_label = l.fresh_label("while_end");
    l.push_loop(label.clone(), test_label.clone(), break_label.clone());

    l.buf.bind_label(test_label.clone());
    l.lower_expr(cond)?;
    l.buf.test_reg_reg(Gpr::Rax, Gpr::Rax);
    l.buf.jz_rel32(break_label.clone());
    lower_block(l, body)?;
    l.buf.jmp_rel32(test_label);
    l.buf.bind_label(break_label);

    l.pop_loop();
    Ok(())
}

/// Inclusive ranges use a `JG`-terminated loop, exclusive ranges `JGE` —
/// matching the distinct terminators `codegen_stmt_for.cpp` documents for
/// the two forms (§4.5).
fn lower_for(l: &mut Lowerer, var: &str, iter: &ForIter, body: &Block, label: &Option<String>) -> EmitResult<()> {
    match iter {
        ForIter::InclusiveRange { start, end } => lower_for_range(l, var, start, end, true, None, body, label),
        ForIter::ExclusiveRange { start, end, step } => {
            lower_for_range(l, var, start, end, false, step.as_ref(), body, label)
        }
        ForIter::List(list_expr) => lower_for_list(l, var, list_expr, body, label),
    }
}

#[allow(clippy::too_many_arguments)]
fn lower_for_range(
    l: &mut Lowerer,
    var: &str,
    start: &crate::ast::Expr,
    end: &crate::ast::Expr,
    inclusive: bool,
    step: Option<&crate::ast::Expr>,
    body: &Block,
    label: &Option<String>,
) -> EmitResult<()> {
    l.lower_expr(start)?;
    l.store_to_name(var, &crate::ast::Type::I64);

    let test_label = l.fresh_label("for_test");
    let continue_label = l.fresh_label("for_step");
    let break_label = l.fresh_label("for_end");
    l.push_loop(label.clone(), continue_label.clone(), break_label.clone());

    l.buf.bind_label(test_label.clone());
    l.lower_ident_load(var, &crate::ast::Type::I64)?;
    let var_reg = Gpr::Rcx; // scratch holding the loop var for the compare
    l.buf.mov_reg_reg(var_reg, Gpr::Rax);
    l.lower_expr(end)?;
    l.buf.cmp_reg_reg(var_reg, Gpr::Rax);
    if inclusive {
        l.buf.jcc_rel32(Cond::Gt, break_label.clone());
    } else {
        l.buf.jcc_rel32(Cond::Ge, break_label.clone());
    }

    lower_block(l, body)?;

    l.buf.bind_label(continue_label);
    l.lower_ident_load(var, &crate::ast::Type::I64)?;
    if let Some(step_expr) = step {
        l.lower_expr(step_expr)?;
        l.buf.mov_reg_reg(Gpr::Rdx, Gpr::Rax);
        l.lower_ident_load(var, &crate::ast::Type::I64)?;
        l.buf.add_reg_reg(Gpr::Rax, Gpr::Rdx);
    } else {
        l.buf.add_reg_imm32(Gpr::Rax, 1);
    }
    l.store_to_name(var, &crate::ast::Type::I64);
    l.buf.jmp_rel32(test_label);
    l.buf.bind_label(break_label);

    l.pop_loop();
    Ok(())
}

fn lower_for_list(l: &mut Lowerer, var: &str, list_expr: &crate::ast::Expr, body: &Block, label: &Option<String>) -> EmitResult<()> {
    let elem_ty = match &list_expr.ty {
        crate::ast::Type::List(t) => (**t).clone(),
        _ => crate::ast::Type::I64,
    };
    let list_slot = format!("$for_list${}", var);
    l.lower_expr(list_expr)?;
    l.store_to_name(&list_slot, &list_expr.ty);

    let idx_slot = format!("$for_idx${}", var);
    l.buf.mov_reg_imm64(Gpr::Rax, 0);
    l.store_to_name(&idx_slot, &crate::ast::Type::I64);

    let test_label = l.fresh_label("forlist_test");
    let continue_label = l.fresh_label("forlist_step");
    let break_label = l.fresh_label("forlist_end");
    l.push_loop(label.clone(), continue_label.clone(), break_label.clone());

    l.buf.bind_label(test_label.clone());
    l.lower_ident_load(&idx_slot, &crate::ast::Type::I64)?;
    l.buf.mov_reg_reg(Gpr::Rcx, Gpr::Rax);
    l.lower_ident_load(&list_slot, &list_expr.ty)?;
    l.buf.mov_reg_mem_disp(Gpr::Rax, Gpr::Rax, 0); // load len (header at offset 0)
    l.buf.cmp_reg_reg(Gpr::Rcx, Gpr::Rax);
    l.buf.jcc_rel32(Cond::Ge, break_label.clone());

    l.lower_ident_load(&list_slot, &list_expr.ty)?;
    l.buf.mov_reg_reg(Gpr::Rdx, Gpr::Rax);
    l.lower_ident_load(&idx_slot, &crate::ast::Type::I64)?;
    l.buf.shl_reg_imm8(Gpr::Rax, 3);
    l.buf.add_reg_imm32(Gpr::Rax, 16);
    l.buf.add_reg_reg(Gpr::Rax, Gpr::Rdx);
    l.buf.mov_reg_mem_rax(Gpr::Rax);
    l.store_to_name(var, &elem_ty);

    lower_block(l, body)?;

    l.buf.bind_label(continue_label);
    l.lower_ident_load(&idx_slot, &crate::ast::Type::I64)?;
    l.buf.add_reg_imm32(Gpr::Rax, 1);
    l.store_to_name(&idx_slot, &crate::ast::Type::I64);
    l.buf.jmp_rel32(test_label);
    l.buf.bind_label(break_label);

    l.pop_loop();
    Ok(())
}

fn lower_match(l: &mut Lowerer, scrutinee: &crate::ast::Expr, arms: &[MatchArm]) -> EmitResult<()> {
    // Unique per match statement so nested matches don't alias the same
    // stack slot for their respective scrutinees.
    let scrut_slot = l.fresh_label("match_scrutinee");
    l.lower_expr(scrutinee)?;
    l.store_to_name(&scrut_slot, &scrutinee.ty);

    let end_label = l.fresh_label("match_end");
    let mut next_label: Option<String> = None;

    for (i, arm) in arms.iter().enumerate() {
        if let Some(label) = next_label.take() {
            l.buf.bind_label(label);
        }
        let is_last = i + 1 == arms.len();
        let this_next = if is_last { None } else { Some(l.fresh_label("match_arm")) };

        lower_pattern_test(l, &arm.pattern, &scrut_slot, &scrutinee.ty, this_next.clone())?;
        lower_block(l, &arm.body)?;
        if !arm.body.ends_in_terminator() {
            l.buf.jmp_rel32(end_label.clone());
        }
        next_label = this_next;
    }
    if let Some(label) = next_label {
        l.buf.bind_label(label);
    }
    l.buf.bind_label(end_label);
    Ok(())
}

/// Emits the pattern guard; falls through on a match, jumps to
/// `next_arm` on a mismatch. Wildcard and bare-identifier patterns always
/// match (the identifier is bound as a copy of the scrutinee).
fn lower_pattern_test(
    l: &mut Lowerer,
    pattern: &Pattern,
    scrut_slot: &str,
    scrut_ty: &crate::ast::Type,
    next_arm: Option<String>,
) -> EmitResult<()> {
    match pattern {
        Pattern::Wildcard => Ok(()),
        Pattern::Identifier(name) => {
            l.lower_ident_load(scrut_slot, scrut_ty)?;
            l.store_to_name(name, scrut_ty);
            Ok(())
        }
        Pattern::Literal(lit) => {
            l.lower_ident_load(scrut_slot, scrut_ty)?;
            l.buf.mov_reg_reg(Gpr::Rcx, Gpr::Rax);
            l.lower_expr(lit)?;
            l.buf.cmp_reg_reg(Gpr::Rcx, Gpr::Rax);
            if let Some(next) = next_arm {
                l.buf.jcc_rel32(Cond::Ne, next);
            }
            Ok(())
        }
        Pattern::List(_) | Pattern::Tuple(_) | Pattern::Record { .. } => Err(EmitError::bad_input(
            "destructuring patterns beyond identifier/literal/wildcard are not yet lowered",
            crate::ast::Span::dummy(),
        )),
    }
}
