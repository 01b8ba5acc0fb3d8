//! Partial inlining (§4.8, interprocedural, O2+): a direct call to a small
//! leaf function — no calls of its own, a single `return <expr>` body — is
//! replaced by substituting its arguments for its parameters directly into
//! that expression. This is "partial" in the sense the source material
//! uses the term: only this one trivial-body shape is inlined, not general
//! multi-statement functions, to keep code growth bounded without a cost
//! model.

use rustc_hash::FxHashMap;

use crate::ast::{Block, CalleeKind, Expr, ExprKind, ForIter, Program, Stmt, StmtKind};
use crate::error::OptimizeError;

/// An inlinable function: its single return expression and its parameter
/// names in declaration order, used to build the substitution map at each
/// call site.
struct Candidate {
    params: Vec<String>,
    return_expr: Expr,
}

pub fn run(program: &mut Program) -> Result<usize, OptimizeError> {
    let candidates: FxHashMap<String, Candidate> = program
        .functions
        .iter()
        .filter_map(|f| {
            if f.is_extern || f.is_generic() || !f.is_leaf() || f.body.statements.len() != 1 {
                return None;
            }
            let Stmt { kind: StmtKind::Return(Some(expr)), .. } = &f.body.statements[0] else { return None };
            Some((
                f.name.clone(),
                Candidate { params: f.params.iter().map(|p| p.name.clone()).collect(), return_expr: expr.clone() },
            ))
        })
        .collect();

    if candidates.is_empty() {
        return Ok(0);
    }

    let mut transformations = 0;
    for f in program.functions.iter_mut() {
        // A function never inlines into itself — recursive self-calls
        // would otherwise expand without bound.
        let mut local = FxHashMap::default();
        for (name, c) in &candidates {
            if name != &f.name {
                local.insert(name.clone(), c);
            }
        }
        transformations += inline_block(&mut f.body, &local);
    }
    let local: FxHashMap<&str, &Candidate> = candidates.iter().map(|(n, c)| (n.as_str(), c)).collect();
    transformations += inline_block(&mut program.top_level, &local);

    Ok(transformations)
}

fn inline_block(block: &mut Block, candidates: &FxHashMap<&str, &Candidate>) -> usize {
    let mut transformations = 0;
    for stmt in block.statements.iter_mut() {
        transformations += inline_stmt(stmt, candidates);
    }
    transformations
}

fn inline_stmt(stmt: &mut Stmt, candidates: &FxHashMap<&str, &Candidate>) -> usize {
    let mut transformations = 0;
    match &mut stmt.kind {
        StmtKind::VarDecl(decl) => {
            if let Some(init) = &mut decl.initializer {
                transformations += inline_expr(init, candidates);
            }
        }
        StmtKind::Expression(e) | StmtKind::Return(Some(e)) => transformations += inline_expr(e, candidates),
        StmtKind::Return(None) | StmtKind::Break(_) | StmtKind::Continue(_) => {}
        StmtKind::Block(b) => transformations += inline_block(b, candidates),
        StmtKind::If { cond, then_branch, else_branch } => {
            transformations += inline_expr(cond, candidates);
            transformations += inline_block(then_branch, candidates);
            if let Some(e) = else_branch {
                transformations += inline_stmt(e, candidates);
            }
        }
        StmtKind::While { cond, body, .. } => {
            transformations += inline_expr(cond, candidates);
            transformations += inline_block(body, candidates);
        }
        StmtKind::For { iter, body, .. } => {
            match iter {
                ForIter::InclusiveRange { start, end } => {
                    transformations += inline_expr(start, candidates);
                    transformations += inline_expr(end, candidates);
                }
                ForIter::ExclusiveRange { start, end, step } => {
                    transformations += inline_expr(start, candidates);
                    transformations += inline_expr(end, candidates);
                    if let Some(s) = step {
                        transformations += inline_expr(s, candidates);
                    }
                }
                ForIter::List(e) => transformations += inline_expr(e, candidates),
            }
            transformations += inline_block(body, candidates);
        }
        StmtKind::Match { scrutinee, arms } => {
            transformations += inline_expr(scrutinee, candidates);
            for arm in arms.iter_mut() {
                transformations += inline_block(&mut arm.body, candidates);
            }
        }
    }
    transformations
}

fn inline_expr(expr: &mut Expr, candidates: &FxHashMap<&str, &Candidate>) -> usize {
    let mut transformations = 0;

    if let ExprKind::Call { callee: CalleeKind::Direct(name), args } = &mut expr.kind {
        for a in args.iter_mut() {
            transformations += inline_expr(a, candidates);
        }
        if let Some(candidate) = candidates.get(name.as_str()) {
            if args.len() == candidate.params.len() {
                let subst: FxHashMap<&str, Expr> =
                    candidate.params.iter().map(|p| p.as_str()).zip(args.drain(..)).collect();
                let mut inlined = candidate.return_expr.clone();
                substitute(&mut inlined, &subst);
                *expr = inlined;
                return transformations + 1;
            }
        }
        return transformations;
    }

    match &mut expr.kind {
        ExprKind::Call { args, .. } | ExprKind::Builtin { args, .. } => {
            for a in args.iter_mut() {
                transformations += inline_expr(a, candidates);
            }
        }
        ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
            transformations += inline_expr(left, candidates);
            transformations += inline_expr(right, candidates);
        }
        ExprKind::Unary { operand, .. } => transformations += inline_expr(operand, candidates),
        ExprKind::Assign { target, value } | ExprKind::CompoundAssign { target, value, .. } => {
            transformations += inline_expr(target, candidates);
            transformations += inline_expr(value, candidates);
        }
        ExprKind::Concat(parts) | ExprKind::ListLit(parts) => {
            for p in parts.iter_mut() {
                transformations += inline_expr(p, candidates);
            }
        }
        ExprKind::Range { start, end, .. } => {
            transformations += inline_expr(start, candidates);
            transformations += inline_expr(end, candidates);
        }
        ExprKind::Index { base, index } => {
            transformations += inline_expr(base, candidates);
            transformations += inline_expr(index, candidates);
        }
        ExprKind::FieldAccess { object, .. } => transformations += inline_expr(object, candidates),
        ExprKind::RecordLit { fields, .. } => {
            for (_, e) in fields.iter_mut() {
                transformations += inline_expr(e, candidates);
            }
        }
        ExprKind::IsType { value, .. } => transformations += inline_expr(value, candidates),
        _ => {}
    }
    transformations
}

fn substitute(expr: &mut Expr, subst: &FxHashMap<&str, Expr>) {
    if let ExprKind::Ident(name) = &expr.kind {
        if let Some(replacement) = subst.get(name.as_str()) {
            *expr = replacement.clone();
            return;
        }
    }

    match &mut expr.kind {
        ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
            substitute(left, subst);
            substitute(right, subst);
        }
        ExprKind::Unary { operand, .. } => substitute(operand, subst),
        ExprKind::Assign { target, value } | ExprKind::CompoundAssign { target, value, .. } => {
            substitute(target, subst);
            substitute(value, subst);
        }
        ExprKind::Call { args, .. } | ExprKind::Builtin { args, .. } => args.iter_mut().for_each(|a| substitute(a, subst)),
        ExprKind::Concat(parts) | ExprKind::ListLit(parts) => parts.iter_mut().for_each(|p| substitute(p, subst)),
        ExprKind::Range { start, end, .. } => {
            substitute(start, subst);
            substitute(end, subst);
        }
        ExprKind::Index { base, index } => {
            substitute(base, subst);
            substitute(index, subst);
        }
        ExprKind::FieldAccess { object, .. } => substitute(object, subst),
        ExprKind::RecordLit { fields, .. } => fields.iter_mut().for_each(|(_, e)| substitute(e, subst)),
        ExprKind::IsType { value, .. } => substitute(value, subst),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;
    use crate::ast::{BinaryOp, Type};

    #[test]
    fn a_single_expression_function_is_inlined_at_its_call_site() {
        let mut program = Program {
            functions: vec![
                function(
                    "square",
                    vec![("x", Type::I64)],
                    Type::I64,
                    block(vec![return_stmt(Some(binary(BinaryOp::Mul, ident("x"), ident("x"))))]),
                ),
                function("main", vec![], Type::I64, block(vec![return_stmt(Some(call_direct("square", vec![int_lit(7)])))])),
            ],
            ..Default::default()
        };
        let transformed = run(&mut program).unwrap();
        assert_eq!(transformed, 1);
        let main = program.functions.iter().find(|f| f.name == "main").unwrap();
        let StmtKind::Return(Some(e)) = &main.body.statements[0].kind else { panic!() };
        let ExprKind::Binary { left, right, .. } = &e.kind else { panic!("expected the inlined multiplication") };
        assert!(matches!(left.kind, ExprKind::IntLit(7)));
        assert!(matches!(right.kind, ExprKind::IntLit(7)));
    }

    #[test]
    fn multi_statement_functions_are_not_inlined() {
        let mut program = Program {
            functions: vec![
                function(
                    "f",
                    vec![("x", Type::I64)],
                    Type::I64,
                    block(vec![var_decl("y", ident("x")), return_stmt(Some(ident("y")))]),
                ),
                function("main", vec![], Type::I64, block(vec![return_stmt(Some(call_direct("f", vec![int_lit(1)])))])),
            ],
            ..Default::default()
        };
        let transformed = run(&mut program).unwrap();
        assert_eq!(transformed, 0);
    }
}
