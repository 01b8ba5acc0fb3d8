//! Dead-argument elimination (§4.8, interprocedural): a parameter never
//! read in its function's body is removed from the declaration and from
//! every direct call site — "a function with one unused parameter loses
//! it everywhere" (§8 Inter-function optimization example).
//!
//! Only functions called exclusively through [`CalleeKind::Direct`] are
//! eligible. A function whose name is ever referenced as a bare value
//! (closure capture target, passed as a callback) keeps its full
//! signature, since this pass has no way to find and rewrite every
//! indirect call site consistent with a reshaped parameter list.

use rustc_hash::FxHashSet;

use crate::ast::{Block, CalleeKind, Expr, ExprKind, ForIter, Program, Stmt, StmtKind};
use crate::error::OptimizeError;

pub fn run(program: &mut Program) -> Result<usize, OptimizeError> {
    let used_as_value = collect_functions_used_as_values(program);

    let mut removed_by_function: Vec<(String, Vec<usize>)> = Vec::new();
    for f in &program.functions {
        if f.is_extern || used_as_value.contains(&f.name) || f.params.is_empty() {
            continue;
        }
        let mut reads = Vec::new();
        crate::ast::walk::block_collect_reads(&f.body, &mut reads);
        let reads: FxHashSet<&str> = reads.iter().map(|s| s.as_str()).collect();

        let dead: Vec<usize> = f
            .params
            .iter()
            .enumerate()
            .filter(|(_, p)| !reads.contains(p.name.as_str()))
            .map(|(i, _)| i)
            .collect();
        if !dead.is_empty() {
            removed_by_function.push((f.name.clone(), dead));
        }
    }

    if removed_by_function.is_empty() {
        return Ok(0);
    }

    let mut transformations = 0;
    for (name, dead) in &removed_by_function {
        if let Some(f) = program.functions.iter_mut().find(|f| &f.name == name) {
            let mut index = 0;
            f.params.retain(|_| {
                let keep = !dead.contains(&index);
                index += 1;
                keep
            });
            transformations += dead.len();
        }
    }

    for f in program.functions.iter_mut() {
        rewrite_calls_in_block(&mut f.body, &removed_by_function);
    }
    rewrite_calls_in_block(&mut program.top_level, &removed_by_function);

    Ok(transformations)
}

fn collect_functions_used_as_values(program: &Program) -> FxHashSet<String> {
    let names: FxHashSet<String> = program.functions.iter().map(|f| f.name.clone()).collect();
    let mut used = FxHashSet::default();
    for f in &program.functions {
        collect_value_refs_in_block(&f.body, &names, &mut used);
    }
    collect_value_refs_in_block(&program.top_level, &names, &mut used);
    used
}

fn collect_value_refs_in_block(block: &Block, names: &FxHashSet<String>, out: &mut FxHashSet<String>) {
    for stmt in &block.statements {
        collect_value_refs_in_stmt(stmt, names, out);
    }
}

fn collect_value_refs_in_stmt(stmt: &Stmt, names: &FxHashSet<String>, out: &mut FxHashSet<String>) {
    match &stmt.kind {
        StmtKind::VarDecl(decl) => {
            if let Some(init) = &decl.initializer {
                collect_value_refs_in_expr(init, names, out);
            }
        }
        StmtKind::Expression(e) | StmtKind::Return(Some(e)) => collect_value_refs_in_expr(e, names, out),
        StmtKind::Return(None) | StmtKind::Break(_) | StmtKind::Continue(_) => {}
        StmtKind::Block(b) => collect_value_refs_in_block(b, names, out),
        StmtKind::If { cond, then_branch, else_branch } => {
            collect_value_refs_in_expr(cond, names, out);
            collect_value_refs_in_block(then_branch, names, out);
            if let Some(e) = else_branch {
                collect_value_refs_in_stmt(e, names, out);
            }
        }
        StmtKind::While { cond, body, .. } => {
            collect_value_refs_in_expr(cond, names, out);
            collect_value_refs_in_block(body, names, out);
        }
        StmtKind::For { iter, body, .. } => {
            match iter {
                ForIter::InclusiveRange { start, end } => {
                    collect_value_refs_in_expr(start, names, out);
                    collect_value_refs_in_expr(end, names, out);
                }
                ForIter::ExclusiveRange { start, end, step } => {
                    collect_value_refs_in_expr(start, names, out);
                    collect_value_refs_in_expr(end, names, out);
                    if let Some(s) = step {
                        collect_value_refs_in_expr(s, names, out);
                    }
                }
                ForIter::List(e) => collect_value_refs_in_expr(e, names, out),
            }
            collect_value_refs_in_block(body, names, out);
        }
        StmtKind::Match { scrutinee, arms } => {
            collect_value_refs_in_expr(scrutinee, names, out);
            for arm in arms {
                collect_value_refs_in_block(&arm.body, names, out);
            }
        }
    }
}

/// A `Call { callee: Direct(_), .. }`'s own callee position doesn't count
/// as "used as a value" — it's exactly the direct-call shape this pass can
/// already rewrite. Every other appearance of a function's name (assigned
/// to a variable, captured, passed as an argument) counts.
fn collect_value_refs_in_expr(expr: &Expr, names: &FxHashSet<String>, out: &mut FxHashSet<String>) {
    match &expr.kind {
        ExprKind::Ident(name) if names.contains(name) => {
            out.insert(name.clone());
        }
        ExprKind::Call { args, .. } => args.iter().for_each(|a| collect_value_refs_in_expr(a, names, out)),
        ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
            collect_value_refs_in_expr(left, names, out);
            collect_value_refs_in_expr(right, names, out);
        }
        ExprKind::Unary { operand, .. } => collect_value_refs_in_expr(operand, names, out),
        ExprKind::Assign { target, value } | ExprKind::CompoundAssign { target, value, .. } => {
            collect_value_refs_in_expr(target, names, out);
            collect_value_refs_in_expr(value, names, out);
        }
        ExprKind::Concat(parts) | ExprKind::ListLit(parts) => parts.iter().for_each(|p| collect_value_refs_in_expr(p, names, out)),
        ExprKind::Range { start, end, .. } => {
            collect_value_refs_in_expr(start, names, out);
            collect_value_refs_in_expr(end, names, out);
        }
        ExprKind::Index { base, index } => {
            collect_value_refs_in_expr(base, names, out);
            collect_value_refs_in_expr(index, names, out);
        }
        ExprKind::FieldAccess { object, .. } => collect_value_refs_in_expr(object, names, out),
        ExprKind::RecordLit { fields, .. } => fields.iter().for_each(|(_, e)| collect_value_refs_in_expr(e, names, out)),
        ExprKind::Closure { body, .. } => collect_value_refs_in_block(body, names, out),
        ExprKind::IsType { value, .. } => collect_value_refs_in_expr(value, names, out),
        ExprKind::Builtin { args, .. } => args.iter().for_each(|a| collect_value_refs_in_expr(a, names, out)),
        _ => {}
    }
}

fn rewrite_calls_in_block(block: &mut Block, removed: &[(String, Vec<usize>)]) {
    for stmt in block.statements.iter_mut() {
        rewrite_calls_in_stmt(stmt, removed);
    }
}

fn rewrite_calls_in_stmt(stmt: &mut Stmt, removed: &[(String, Vec<usize>)]) {
    match &mut stmt.kind {
        StmtKind::VarDecl(decl) => {
            if let Some(init) = &mut decl.initializer {
                rewrite_calls_in_expr(init, removed);
            }
        }
        StmtKind::Expression(e) | StmtKind::Return(Some(e)) => rewrite_calls_in_expr(e, removed),
        StmtKind::Return(None) | StmtKind::Break(_) | StmtKind::Continue(_) => {}
        StmtKind::Block(b) => rewrite_calls_in_block(b, removed),
        StmtKind::If { cond, then_branch, else_branch } => {
            rewrite_calls_in_expr(cond, removed);
            rewrite_calls_in_block(then_branch, removed);
            if let Some(e) = else_branch {
                rewrite_calls_in_stmt(e, removed);
            }
        }
        StmtKind::While { cond, body, .. } => {
            rewrite_calls_in_expr(cond, removed);
            rewrite_calls_in_block(body, removed);
        }
        StmtKind::For { iter, body, .. } => {
            match iter {
                ForIter::InclusiveRange { start, end } => {
                    rewrite_calls_in_expr(start, removed);
                    rewrite_calls_in_expr(end, removed);
                }
                ForIter::ExclusiveRange { start, end, step } => {
                    rewrite_calls_in_expr(start, removed);
                    rewrite_calls_in_expr(end, removed);
                    if let Some(s) = step {
                        rewrite_calls_in_expr(s, removed);
                    }
                }
                ForIter::List(e) => rewrite_calls_in_expr(e, removed),
            }
            rewrite_calls_in_block(body, removed);
        }
        StmtKind::Match { scrutinee, arms } => {
            rewrite_calls_in_expr(scrutinee, removed);
            for arm in arms.iter_mut() {
                rewrite_calls_in_block(&mut arm.body, removed);
            }
        }
    }
}

fn rewrite_calls_in_expr(expr: &mut Expr, removed: &[(String, Vec<usize>)]) {
    if let ExprKind::Call { callee: CalleeKind::Direct(name), args } = &mut expr.kind {
        if let Some((_, dead)) = removed.iter().find(|(n, _)| n == name) {
            let mut index = 0;
            args.retain(|_| {
                let keep = !dead.contains(&index);
                index += 1;
                keep
            });
        }
    }

    match &mut expr.kind {
        ExprKind::Call { args, .. } | ExprKind::Builtin { args, .. } => {
            for a in args.iter_mut() {
                rewrite_calls_in_expr(a, removed);
            }
        }
        ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
            rewrite_calls_in_expr(left, removed);
            rewrite_calls_in_expr(right, removed);
        }
        ExprKind::Unary { operand, .. } => rewrite_calls_in_expr(operand, removed),
        ExprKind::Assign { target, value } | ExprKind::CompoundAssign { target, value, .. } => {
            rewrite_calls_in_expr(target, removed);
            rewrite_calls_in_expr(value, removed);
        }
        ExprKind::Concat(parts) | ExprKind::ListLit(parts) => {
            for p in parts.iter_mut() {
                rewrite_calls_in_expr(p, removed);
            }
        }
        ExprKind::Range { start, end, .. } => {
            rewrite_calls_in_expr(start, removed);
            rewrite_calls_in_expr(end, removed);
        }
        ExprKind::Index { base, index } => {
            rewrite_calls_in_expr(base, removed);
            rewrite_calls_in_expr(index, removed);
        }
        ExprKind::FieldAccess { object, .. } => rewrite_calls_in_expr(object, removed),
        ExprKind::RecordLit { fields, .. } => {
            for (_, e) in fields.iter_mut() {
                rewrite_calls_in_expr(e, removed);
            }
        }
        ExprKind::IsType { value, .. } => rewrite_calls_in_expr(value, removed),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;
    use crate::ast::Type;

    #[test]
    fn an_unused_parameter_is_dropped_from_declaration_and_call_site() {
        let mut program = Program {
            functions: vec![
                function("main", vec![], Type::I64, block(vec![return_stmt(Some(call_direct("add", vec![int_lit(1), int_lit(2)])))])),
                function(
                    "add",
                    vec![("a", Type::I64), ("unused", Type::I64)],
                    Type::I64,
                    block(vec![return_stmt(Some(ident("a")))]),
                ),
            ],
            ..Default::default()
        };
        let transformed = run(&mut program).unwrap();
        assert_eq!(transformed, 1);

        let add = program.functions.iter().find(|f| f.name == "add").unwrap();
        assert_eq!(add.params.len(), 1);
        assert_eq!(add.params[0].name, "a");

        let main = program.functions.iter().find(|f| f.name == "main").unwrap();
        let StmtKind::Return(Some(call)) = &main.body.statements[0].kind else { panic!() };
        let ExprKind::Call { args, .. } = &call.kind else { panic!() };
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn a_function_passed_as_a_value_keeps_its_full_signature() {
        let mut program = Program {
            functions: vec![
                function(
                    "main",
                    vec![],
                    Type::I64,
                    block(vec![var_decl("cb", ident("handler")), return_stmt(Some(int_lit(0)))]),
                ),
                function("handler", vec![("unused", Type::I64)], Type::I64, block(vec![return_stmt(Some(int_lit(1)))])),
            ],
            ..Default::default()
        };
        let transformed = run(&mut program).unwrap();
        assert_eq!(transformed, 0);
        let handler = program.functions.iter().find(|f| f.name == "handler").unwrap();
        assert_eq!(handler.params.len(), 1);
    }
}
