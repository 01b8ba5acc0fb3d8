//! Global-variable constification (§4.8, interprocedural).
//!
//! A global whose initializer is a compile-time constant and that is never
//! the target of an assignment anywhere in the program — in any function
//! body or the top-level statements — is safe to fold directly into every
//! read of it, skipping the global's register/stack slot entirely. Globals
//! that fail either test (non-constant initializer, or written to anywhere)
//! are left for `crate::regalloc::allocate_global` exactly as before.

use rustc_hash::FxHashSet;

use crate::ast::{try_eval_const_int, Block, Expr, ExprKind, ForIter, Program, Stmt, StmtKind};
use crate::error::OptimizeError;

pub fn run(program: &mut Program) -> Result<usize, OptimizeError> {
    let constant_globals: Vec<(String, i64)> = program
        .globals
        .iter()
        .filter_map(|g| try_eval_const_int(&g.initializer).map(|v| (g.name.clone(), v)))
        .collect();

    if constant_globals.is_empty() {
        return Ok(0);
    }

    let mut written = FxHashSet::default();
    for f in &program.functions {
        collect_written(&f.body, &mut written);
    }
    collect_written(&program.top_level, &mut written);

    let foldable: Vec<(String, i64)> = constant_globals.into_iter().filter(|(name, _)| !written.contains(name)).collect();
    if foldable.is_empty() {
        return Ok(0);
    }

    let mut transformations = 0;
    for f in program.functions.iter_mut() {
        transformations += fold_block(&mut f.body, &foldable);
    }
    transformations += fold_block(&mut program.top_level, &foldable);

    program.globals.retain(|g| !foldable.iter().any(|(name, _)| name == &g.name));

    Ok(transformations)
}

fn collect_written(block: &Block, out: &mut FxHashSet<String>) {
    for stmt in &block.statements {
        collect_written_stmt(stmt, out);
    }
}

fn collect_written_stmt(stmt: &Stmt, out: &mut FxHashSet<String>) {
    match &stmt.kind {
        StmtKind::VarDecl(decl) => {
            if let Some(init) = &decl.initializer {
                collect_written_expr(init, out);
            }
        }
        StmtKind::Expression(e) | StmtKind::Return(Some(e)) => collect_written_expr(e, out),
        StmtKind::Return(None) | StmtKind::Break(_) | StmtKind::Continue(_) => {}
        StmtKind::Block(b) => collect_written(b, out),
        StmtKind::If { cond, then_branch, else_branch } => {
            collect_written_expr(cond, out);
            collect_written(then_branch, out);
            if let Some(e) = else_branch {
                collect_written_stmt(e, out);
            }
        }
        StmtKind::While { cond, body, .. } => {
            collect_written_expr(cond, out);
            collect_written(body, out);
        }
        StmtKind::For { var, iter, body, .. } => {
            out.insert(var.clone());
            match iter {
                ForIter::InclusiveRange { start, end } => {
                    collect_written_expr(start, out);
                    collect_written_expr(end, out);
                }
                ForIter::ExclusiveRange { start, end, step } => {
                    collect_written_expr(start, out);
                    collect_written_expr(end, out);
                    if let Some(s) = step {
                        collect_written_expr(s, out);
                    }
                }
                ForIter::List(e) => collect_written_expr(e, out),
            }
            collect_written(body, out);
        }
        StmtKind::Match { scrutinee, arms } => {
            collect_written_expr(scrutinee, out);
            for arm in arms {
                collect_written(&arm.body, out);
            }
        }
    }
}

fn collect_written_expr(expr: &Expr, out: &mut FxHashSet<String>) {
    match &expr.kind {
        ExprKind::Assign { target, value } | ExprKind::CompoundAssign { target, value, .. } => {
            if let ExprKind::Ident(name) = &target.kind {
                out.insert(name.clone());
            } else {
                collect_written_expr(target, out);
            }
            collect_written_expr(value, out);
        }
        ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
            collect_written_expr(left, out);
            collect_written_expr(right, out);
        }
        ExprKind::Unary { operand, .. } => collect_written_expr(operand, out),
        ExprKind::Call { args, .. } | ExprKind::Builtin { args, .. } => args.iter().for_each(|a| collect_written_expr(a, out)),
        ExprKind::Concat(parts) | ExprKind::ListLit(parts) => parts.iter().for_each(|p| collect_written_expr(p, out)),
        ExprKind::Range { start, end, .. } => {
            collect_written_expr(start, out);
            collect_written_expr(end, out);
        }
        ExprKind::Index { base, index } => {
            collect_written_expr(base, out);
            collect_written_expr(index, out);
        }
        ExprKind::FieldAccess { object, .. } => collect_written_expr(object, out),
        ExprKind::RecordLit { fields, .. } => fields.iter().for_each(|(_, e)| collect_written_expr(e, out)),
        ExprKind::Closure { captures, .. } => out.extend(captures.iter().cloned()),
        ExprKind::IsType { value, .. } => collect_written_expr(value, out),
        _ => {}
    }
}

fn fold_block(block: &mut Block, foldable: &[(String, i64)]) -> usize {
    let mut transformations = 0;
    for stmt in block.statements.iter_mut() {
        transformations += fold_stmt(stmt, foldable);
    }
    transformations
}

fn fold_stmt(stmt: &mut Stmt, foldable: &[(String, i64)]) -> usize {
    let mut transformations = 0;
    match &mut stmt.kind {
        StmtKind::VarDecl(decl) => {
            if let Some(init) = &mut decl.initializer {
                transformations += fold_expr(init, foldable);
            }
        }
        StmtKind::Expression(e) | StmtKind::Return(Some(e)) => transformations += fold_expr(e, foldable),
        StmtKind::Return(None) | StmtKind::Break(_) | StmtKind::Continue(_) => {}
        StmtKind::Block(b) => transformations += fold_block(b, foldable),
        StmtKind::If { cond, then_branch, else_branch } => {
            transformations += fold_expr(cond, foldable);
            transformations += fold_block(then_branch, foldable);
            if let Some(e) = else_branch {
                transformations += fold_stmt(e, foldable);
            }
        }
        StmtKind::While { cond, body, .. } => {
            transformations += fold_expr(cond, foldable);
            transformations += fold_block(body, foldable);
        }
        StmtKind::For { iter, body, .. } => {
            match iter {
                ForIter::InclusiveRange { start, end } => {
                    transformations += fold_expr(start, foldable);
                    transformations += fold_expr(end, foldable);
                }
                ForIter::ExclusiveRange { start, end, step } => {
                    transformations += fold_expr(start, foldable);
                    transformations += fold_expr(end, foldable);
                    if let Some(s) = step {
                        transformations += fold_expr(s, foldable);
                    }
                }
                ForIter::List(e) => transformations += fold_expr(e, foldable),
            }
            transformations += fold_block(body, foldable);
        }
        StmtKind::Match { scrutinee, arms } => {
            transformations += fold_expr(scrutinee, foldable);
            for arm in arms.iter_mut() {
                transformations += fold_block(&mut arm.body, foldable);
            }
        }
    }
    transformations
}

fn fold_expr(expr: &mut Expr, foldable: &[(String, i64)]) -> usize {
    if let ExprKind::Ident(name) = &expr.kind {
        if let Some((_, v)) = foldable.iter().find(|(n, _)| n == name) {
            expr.kind = ExprKind::IntLit(*v);
            return 1;
        }
    }

    let mut transformations = 0;
    match &mut expr.kind {
        ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
            transformations += fold_expr(left, foldable);
            transformations += fold_expr(right, foldable);
        }
        ExprKind::Unary { operand, .. } => transformations += fold_expr(operand, foldable),
        ExprKind::Assign { target, value } | ExprKind::CompoundAssign { target, value, .. } => {
            transformations += fold_expr(target, foldable);
            transformations += fold_expr(value, foldable);
        }
        ExprKind::Call { args, .. } | ExprKind::Builtin { args, .. } => {
            for a in args.iter_mut() {
                transformations += fold_expr(a, foldable);
            }
        }
        ExprKind::Concat(parts) | ExprKind::ListLit(parts) => {
            for p in parts.iter_mut() {
                transformations += fold_expr(p, foldable);
            }
        }
        ExprKind::Range { start, end, .. } => {
            transformations += fold_expr(start, foldable);
            transformations += fold_expr(end, foldable);
        }
        ExprKind::Index { base, index } => {
            transformations += fold_expr(base, foldable);
            transformations += fold_expr(index, foldable);
        }
        ExprKind::FieldAccess { object, .. } => transformations += fold_expr(object, foldable),
        ExprKind::RecordLit { fields, .. } => {
            for (_, e) in fields.iter_mut() {
                transformations += fold_expr(e, foldable);
            }
        }
        ExprKind::IsType { value, .. } => transformations += fold_expr(value, foldable),
        _ => {}
    }
    transformations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;
    use crate::ast::{GlobalVar, Type};

    #[test]
    fn a_never_written_constant_global_is_folded_at_every_read() {
        let mut program = Program {
            globals: vec![GlobalVar { name: "LIMIT".to_string(), ty: Type::I64, initializer: int_lit(10) }],
            functions: vec![function("main", vec![], Type::I64, block(vec![return_stmt(Some(ident("LIMIT")))]))],
            ..Default::default()
        };
        let transformed = run(&mut program).unwrap();
        assert_eq!(transformed, 1);
        assert!(program.globals.is_empty());
        let StmtKind::Return(Some(e)) = &program.functions[0].body.statements[0].kind else { panic!() };
        assert!(matches!(e.kind, ExprKind::IntLit(10)));
    }

    #[test]
    fn a_global_written_anywhere_is_left_alone() {
        let mut program = Program {
            globals: vec![GlobalVar { name: "COUNTER".to_string(), ty: Type::I64, initializer: int_lit(0) }],
            functions: vec![function(
                "main",
                vec![],
                Type::I64,
                block(vec![expr_stmt(assign(ident("COUNTER"), int_lit(5))), return_stmt(Some(ident("COUNTER")))]),
            )],
            ..Default::default()
        };
        let transformed = run(&mut program).unwrap();
        assert_eq!(transformed, 0);
        assert_eq!(program.globals.len(), 1);
    }
}
