//! Dead-code elimination and reachability-based tree shaking (§4.8).
//!
//! Two independent cuts: a whole-program call graph rooted at `main` and
//! the top-level statements (which become `_start`) decides which
//! functions survive into the object at all; within each surviving
//! function, statements after a `return`/`break`/`continue` are
//! unreachable and folded `if`s with a literal-boolean condition collapse
//! to their live branch.

use rustc_hash::FxHashSet;

use crate::ast::{Block, CalleeKind, Expr, ExprKind, ForIter, Program, Stmt, StmtKind};
use crate::error::OptimizeError;

pub fn run(program: &mut Program) -> Result<usize, OptimizeError> {
    let live = reachable_functions(program);
    let before = program.functions.len();
    program.functions.retain(|f| f.is_extern || live.contains(&f.name));
    let mut transformations = before - program.functions.len();

    for f in program.functions.iter_mut() {
        transformations += simplify_block(&mut f.body);
    }
    transformations += simplify_block(&mut program.top_level);

    Ok(transformations)
}

/// Every function transitively called from `main` or the top-level
/// statements. `extern` declarations are kept separately by the caller —
/// dropping their signature here would desync the import table even if no
/// surviving code calls them.
fn reachable_functions(program: &Program) -> FxHashSet<String> {
    let names: FxHashSet<String> = program.functions.iter().map(|f| f.name.clone()).collect();
    let mut live: FxHashSet<String> = FxHashSet::default();
    let mut worklist: Vec<String> = Vec::new();

    collect_referenced_functions(&program.top_level, &names, &mut worklist);
    if names.contains("main") {
        worklist.push("main".to_string());
    }

    while let Some(name) = worklist.pop() {
        if !live.insert(name.clone()) {
            continue;
        }
        if let Some(f) = program.functions.iter().find(|f| f.name == name) {
            collect_referenced_functions(&f.body, &names, &mut worklist);
        }
    }

    live
}

fn collect_referenced_functions(block: &Block, names: &FxHashSet<String>, out: &mut Vec<String>) {
    for stmt in &block.statements {
        collect_in_stmt(stmt, names, out);
    }
}

fn collect_in_stmt(stmt: &Stmt, names: &FxHashSet<String>, out: &mut Vec<String>) {
    match &stmt.kind {
        StmtKind::VarDecl(decl) => {
            if let Some(init) = &decl.initializer {
                collect_in_expr(init, names, out);
            }
        }
        StmtKind::Expression(e) | StmtKind::Return(Some(e)) => collect_in_expr(e, names, out),
        StmtKind::Return(None) | StmtKind::Break(_) | StmtKind::Continue(_) => {}
        StmtKind::Block(b) => collect_referenced_functions(b, names, out),
        StmtKind::If { cond, then_branch, else_branch } => {
            collect_in_expr(cond, names, out);
            collect_referenced_functions(then_branch, names, out);
            if let Some(e) = else_branch {
                collect_in_stmt(e, names, out);
            }
        }
        StmtKind::While { cond, body, .. } => {
            collect_in_expr(cond, names, out);
            collect_referenced_functions(body, names, out);
        }
        StmtKind::For { iter, body, .. } => {
            match iter {
                ForIter::InclusiveRange { start, end } => {
                    collect_in_expr(start, names, out);
                    collect_in_expr(end, names, out);
                }
                ForIter::ExclusiveRange { start, end, step } => {
                    collect_in_expr(start, names, out);
                    collect_in_expr(end, names, out);
                    if let Some(s) = step {
                        collect_in_expr(s, names, out);
                    }
                }
                ForIter::List(e) => collect_in_expr(e, names, out),
            }
            collect_referenced_functions(body, names, out);
        }
        StmtKind::Match { scrutinee, arms } => {
            collect_in_expr(scrutinee, names, out);
            for arm in arms {
                collect_referenced_functions(&arm.body, names, out);
            }
        }
    }
}

/// Records every function-shaped reference: direct calls, and any bare
/// identifier that happens to name a function — covering the case where a
/// function value is passed around rather than called outright (taking its
/// address keeps it live, per §4.8).
fn collect_in_expr(expr: &Expr, names: &FxHashSet<String>, out: &mut Vec<String>) {
    match &expr.kind {
        ExprKind::Ident(name) if names.contains(name) => out.push(name.clone()),
        ExprKind::Ident(_) | ExprKind::IntLit(_) | ExprKind::FloatLit(_) | ExprKind::StrLit(_) | ExprKind::BoolLit(_) | ExprKind::NullLit => {}
        ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
            collect_in_expr(left, names, out);
            collect_in_expr(right, names, out);
        }
        ExprKind::Unary { operand, .. } => collect_in_expr(operand, names, out),
        ExprKind::Assign { target, value } | ExprKind::CompoundAssign { target, value, .. } => {
            collect_in_expr(target, names, out);
            collect_in_expr(value, names, out);
        }
        ExprKind::Call { callee, args } => {
            if let CalleeKind::Direct(name) = callee {
                out.push(name.clone());
            }
            args.iter().for_each(|a| collect_in_expr(a, names, out));
        }
        ExprKind::Concat(parts) | ExprKind::ListLit(parts) => {
            parts.iter().for_each(|p| collect_in_expr(p, names, out));
        }
        ExprKind::Range { start, end, .. } => {
            collect_in_expr(start, names, out);
            collect_in_expr(end, names, out);
        }
        ExprKind::Index { base, index } => {
            collect_in_expr(base, names, out);
            collect_in_expr(index, names, out);
        }
        ExprKind::FieldAccess { object, .. } => collect_in_expr(object, names, out),
        ExprKind::RecordLit { fields, .. } => fields.iter().for_each(|(_, e)| collect_in_expr(e, names, out)),
        ExprKind::Closure { body, .. } => collect_referenced_functions(body, names, out),
        ExprKind::IsType { value, .. } => collect_in_expr(value, names, out),
        ExprKind::Builtin { args, .. } => args.iter().for_each(|a| collect_in_expr(a, names, out)),
        ExprKind::AddressOf(operand) => collect_in_expr(operand, names, out),
    }
}

/// Truncates statements after the first terminator and folds `if`s whose
/// condition is a literal boolean to their live branch. Returns the number
/// of statements removed/folded.
fn simplify_block(block: &mut Block) -> usize {
    let mut transformations = 0;

    if let Some(cut) = block.statements.iter().position(|s| s.is_terminator()) {
        if cut + 1 < block.statements.len() {
            transformations += block.statements.len() - (cut + 1);
            block.statements.truncate(cut + 1);
        }
    }

    let mut rewritten = Vec::with_capacity(block.statements.len());
    for mut stmt in std::mem::take(&mut block.statements) {
        match &mut stmt.kind {
            StmtKind::If { cond, then_branch, else_branch } => {
                if let ExprKind::BoolLit(value) = &cond.kind {
                    let value = *value;
                    transformations += 1;
                    if value {
                        transformations += simplify_block(then_branch);
                        rewritten.push(Stmt { kind: StmtKind::Block(then_branch.clone()), span: stmt.span });
                    } else if let Some(else_stmt) = else_branch.take() {
                        transformations += collect_and_simplify(*else_stmt, &mut rewritten);
                    }
                    continue;
                }
                transformations += simplify_block(then_branch);
                if let Some(else_stmt) = else_branch {
                    transformations += simplify_nested_stmt(else_stmt);
                }
                rewritten.push(stmt);
            }
            StmtKind::While { body, .. } => {
                transformations += simplify_block(body);
                rewritten.push(stmt);
            }
            StmtKind::For { body, .. } => {
                transformations += simplify_block(body);
                rewritten.push(stmt);
            }
            StmtKind::Block(b) => {
                transformations += simplify_block(b);
                rewritten.push(stmt);
            }
            StmtKind::Match { arms, .. } => {
                for arm in arms.iter_mut() {
                    transformations += simplify_block(&mut arm.body);
                }
                rewritten.push(stmt);
            }
            _ => rewritten.push(stmt),
        }
    }
    block.statements = rewritten;

    transformations
}

fn simplify_nested_stmt(stmt: &mut Stmt) -> usize {
    match &mut stmt.kind {
        StmtKind::If { then_branch, else_branch, .. } => {
            let mut t = simplify_block(then_branch);
            if let Some(e) = else_branch {
                t += simplify_nested_stmt(e);
            }
            t
        }
        StmtKind::Block(b) => simplify_block(b),
        StmtKind::While { body, .. } | StmtKind::For { body, .. } => simplify_block(body),
        _ => 0,
    }
}

fn collect_and_simplify(mut stmt: Stmt, out: &mut Vec<Stmt>) -> usize {
    let transformations = simplify_nested_stmt(&mut stmt);
    out.push(stmt);
    transformations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    #[test]
    fn functions_unreachable_from_main_are_dropped() {
        let mut program = Program {
            functions: vec![
                function("main", vec![], crate::ast::Type::I64, block(vec![expr_stmt(call_direct("used", vec![])), return_stmt(Some(int_lit(0)))])),
                function("used", vec![], crate::ast::Type::I64, block(vec![return_stmt(Some(int_lit(1)))])),
                function("unused", vec![], crate::ast::Type::I64, block(vec![return_stmt(Some(int_lit(2)))])),
            ],
            ..Default::default()
        };
        run(&mut program).unwrap();
        let names: Vec<_> = program.functions.iter().map(|f| f.name.as_str()).collect();
        assert!(names.contains(&"main"));
        assert!(names.contains(&"used"));
        assert!(!names.contains(&"unused"));
    }

    #[test]
    fn statements_after_return_are_removed() {
        let mut body = block(vec![return_stmt(Some(int_lit(1))), expr_stmt(call_direct("used", vec![]))]);
        let removed = simplify_block(&mut body);
        assert_eq!(removed, 1);
        assert_eq!(body.statements.len(), 1);
    }

    #[test]
    fn if_true_collapses_to_then_branch() {
        let mut body = block(vec![if_stmt(
            bool_lit(true),
            block(vec![return_stmt(Some(int_lit(1)))]),
            Some(return_stmt(Some(int_lit(2)))),
        )]);
        simplify_block(&mut body);
        assert!(matches!(body.statements[0].kind, StmtKind::Block(_)));
    }
}
