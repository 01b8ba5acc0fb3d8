//! Jump threading with range analysis (§4.8).
//!
//! Tracks exactly-known integer values and half-open ranges per local
//! through straight-line code. At an `if`, when the condition folds to a
//! literal boolean against the tracked facts, the branch is resolved the
//! same way [`crate::optimize::dce`] folds a literal `BoolLit` — except
//! here the literal comes from evaluating a comparison against a tracked
//! constant rather than appearing verbatim in the source. Each branch also
//! *records* an implied fact for its own body: `if x == 5 { .. }` records
//! `x = 5` in the then-branch; `if x < 5 { .. }` records `x ≤ 4`.

use rustc_hash::FxHashMap;

use crate::ast::{BinaryOp, Block, Expr, ExprKind, Stmt, StmtKind};
use crate::error::OptimizeError;

/// What's known about one local at a given program point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fact {
    Exact(i64),
    /// Inclusive upper bound, as produced by `x < k` (`k - 1`) or `x <= k`.
    AtMost(i64),
    /// Inclusive lower bound, as produced by `x > k` (`k + 1`) or `x >= k`.
    AtLeast(i64),
}

type Facts = FxHashMap<String, Fact>;

pub fn run(program: &mut crate::ast::Program) -> Result<usize, OptimizeError> {
    let mut transformations = 0;
    for f in program.functions.iter_mut() {
        let mut facts = Facts::default();
        transformations += thread_block(&mut f.body, &mut facts);
    }
    let mut facts = Facts::default();
    transformations += thread_block(&mut program.top_level, &mut facts);
    Ok(transformations)
}

fn thread_block(block: &mut Block, facts: &mut Facts) -> usize {
    let mut transformations = 0;
    let mut rewritten = Vec::with_capacity(block.statements.len());

    for mut stmt in std::mem::take(&mut block.statements) {
        match &mut stmt.kind {
            StmtKind::VarDecl(decl) => {
                if let Some(init) = &decl.initializer {
                    if let crate::ast::Pattern::Identifier(name) = &decl.pattern {
                        match eval(init, facts) {
                            Some(Fact::Exact(v)) => {
                                facts.insert(name.clone(), Fact::Exact(v));
                            }
                            _ => {
                                facts.remove(name);
                            }
                        }
                    }
                }
                rewritten.push(stmt);
            }
            StmtKind::Expression(e) => {
                forget_assigned(e, facts);
                rewritten.push(stmt);
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                match eval(cond, facts) {
                    Some(Fact::Exact(1)) => {
                        transformations += 1;
                        let mut then_facts = facts.clone();
                        apply_implied(cond, true, &mut then_facts);
                        transformations += thread_block(then_branch, &mut then_facts);
                        rewritten.push(Stmt { kind: StmtKind::Block(then_branch.clone()), span: stmt.span });
                        continue;
                    }
                    Some(Fact::Exact(0)) => {
                        transformations += 1;
                        if let Some(else_stmt) = else_branch.take() {
                            let mut else_facts = facts.clone();
                            apply_implied(cond, false, &mut else_facts);
                            let mut e = *else_stmt;
                            thread_stmt(&mut e, &mut else_facts);
                            rewritten.push(e);
                        }
                        continue;
                    }
                    _ => {
                        let mut then_facts = facts.clone();
                        apply_implied(cond, true, &mut then_facts);
                        transformations += thread_block(then_branch, &mut then_facts);
                        if let Some(else_stmt) = else_branch {
                            let mut else_facts = facts.clone();
                            apply_implied(cond, false, &mut else_facts);
                            transformations += thread_stmt(else_stmt, &mut else_facts);
                        }
                        // Branches may have diverging effects on facts; once
                        // we've threaded through both sides nothing about
                        // their exit state can be assumed for what follows.
                        facts.clear();
                        rewritten.push(stmt);
                    }
                }
            }
            StmtKind::While { cond, body, .. } => {
                forget_assigned_in_block(body, facts);
                let mut body_facts = facts.clone();
                apply_implied(cond, true, &mut body_facts);
                transformations += thread_block(body, &mut body_facts);
                facts.clear();
                rewritten.push(stmt);
            }
            StmtKind::For { body, .. } => {
                forget_assigned_in_block(body, facts);
                let mut body_facts = Facts::default();
                transformations += thread_block(body, &mut body_facts);
                facts.clear();
                rewritten.push(stmt);
            }
            StmtKind::Block(b) => {
                transformations += thread_block(b, facts);
                rewritten.push(stmt);
            }
            StmtKind::Match { arms, .. } => {
                for arm in arms.iter_mut() {
                    let mut arm_facts = facts.clone();
                    transformations += thread_block(&mut arm.body, &mut arm_facts);
                }
                facts.clear();
                rewritten.push(stmt);
            }
            StmtKind::Return(_) | StmtKind::Break(_) | StmtKind::Continue(_) => {
                rewritten.push(stmt);
            }
        }
    }

    block.statements = rewritten;
    transformations
}

fn thread_stmt(stmt: &mut Stmt, facts: &mut Facts) -> usize {
    match &mut stmt.kind {
        StmtKind::Block(b) => thread_block(b, facts),
        StmtKind::If { .. } => {
            let mut wrapper = Block { statements: vec![stmt.clone()] };
            let t = thread_block(&mut wrapper, facts);
            *stmt = wrapper.statements.into_iter().next().unwrap_or_else(|| stmt.clone());
            t
        }
        _ => 0,
    }
}

fn forget_assigned_in_block(block: &Block, facts: &mut Facts) {
    for stmt in &block.statements {
        if let StmtKind::Expression(e) = &stmt.kind {
            forget_assigned(e, facts);
        }
    }
}

/// A conservative approximation: any name written anywhere inside `expr`
/// (not just a top-level assignment) loses its tracked fact, since we don't
/// attempt to re-derive the new value here — [`eval`] handles that for
/// direct assignments to a constant.
fn forget_assigned(expr: &Expr, facts: &mut Facts) {
    if let ExprKind::Assign { target, .. } | ExprKind::CompoundAssign { target, .. } = &expr.kind {
        if let ExprKind::Ident(name) = &target.kind {
            facts.remove(name);
        }
    }
}

/// Folds `expr` to `Fact::Exact(1)`/`Fact::Exact(0)` for boolean-valued
/// expressions, or to the literal's own value otherwise, using `facts` for
/// any `Ident` reference.
fn eval(expr: &Expr, facts: &Facts) -> Option<Fact> {
    match &expr.kind {
        ExprKind::IntLit(v) => Some(Fact::Exact(*v)),
        ExprKind::BoolLit(v) => Some(Fact::Exact(if *v { 1 } else { 0 })),
        ExprKind::Ident(name) => facts.get(name).copied(),
        ExprKind::Binary { op, left, right } => eval_binary(*op, left, right, facts),
        _ => None,
    }
}

fn eval_binary(op: BinaryOp, left: &Expr, right: &Expr, facts: &Facts) -> Option<Fact> {
    if let (Some(Fact::Exact(l)), Some(Fact::Exact(r))) = (eval(left, facts), eval(right, facts)) {
        let result = match op {
            BinaryOp::Add => return Some(Fact::Exact(l.wrapping_add(r))),
            BinaryOp::Sub => return Some(Fact::Exact(l.wrapping_sub(r))),
            BinaryOp::Mul => return Some(Fact::Exact(l.wrapping_mul(r))),
            BinaryOp::Lt => l < r,
            BinaryOp::Le => l <= r,
            BinaryOp::Gt => l > r,
            BinaryOp::Ge => l >= r,
            BinaryOp::Eq => l == r,
            BinaryOp::Ne => l != r,
            _ => return None,
        };
        return Some(Fact::Exact(result as i64));
    }

    // No exact value for one side — fall back to range-implied facts for
    // `ident OP constant` comparisons, e.g. a prior `x < 10` making `x < 20`
    // decidable without re-reading `x`'s exact value.
    if let (ExprKind::Ident(name), ExprKind::IntLit(k)) = (&left.kind, &right.kind) {
        if let Some(fact) = facts.get(name) {
            return decide_from_range(op, *fact, *k);
        }
    }
    None
}

fn decide_from_range(op: BinaryOp, fact: Fact, k: i64) -> Option<Fact> {
    let result = match (op, fact) {
        (BinaryOp::Lt, Fact::AtMost(bound)) if bound < k => true,
        (BinaryOp::Le, Fact::AtMost(bound)) if bound <= k => true,
        (BinaryOp::Gt, Fact::AtLeast(bound)) if bound > k => true,
        (BinaryOp::Ge, Fact::AtLeast(bound)) if bound >= k => true,
        (BinaryOp::Lt, Fact::AtMost(bound)) if bound >= k => return None,
        _ => return None,
    };
    Some(Fact::Exact(result as i64))
}

/// Records the fact a branch's own body can rely on: `x == k` ⇒ `x = k` on
/// the taken side; `x < k` ⇒ `x ≤ k-1`; negated forms swap the comparison.
fn apply_implied(cond: &Expr, taken: bool, facts: &mut Facts) {
    let ExprKind::Binary { op, left, right } = &cond.kind else { return };
    let (ExprKind::Ident(name), ExprKind::IntLit(k)) = (&left.kind, &right.kind) else { return };
    let op = if taken { *op } else { negate(*op) };
    let fact = match op {
        BinaryOp::Eq => Fact::Exact(*k),
        BinaryOp::Lt => Fact::AtMost(k - 1),
        BinaryOp::Le => Fact::AtMost(*k),
        BinaryOp::Gt => Fact::AtLeast(k + 1),
        BinaryOp::Ge => Fact::AtLeast(*k),
        _ => return,
    };
    facts.insert(name.clone(), fact);
}

fn negate(op: BinaryOp) -> BinaryOp {
    match op {
        BinaryOp::Eq => BinaryOp::Ne,
        BinaryOp::Ne => BinaryOp::Eq,
        BinaryOp::Lt => BinaryOp::Ge,
        BinaryOp::Le => BinaryOp::Gt,
        BinaryOp::Gt => BinaryOp::Le,
        BinaryOp::Ge => BinaryOp::Lt,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    #[test]
    fn known_value_threads_through_a_comparison() {
        let mut body = block(vec![
            var_decl("x", int_lit(10)),
            if_stmt(
                binary(BinaryOp::Lt, ident("x"), int_lit(20)),
                block(vec![
                    if_stmt(
                        binary(BinaryOp::Lt, ident("x"), int_lit(100)),
                        block(vec![return_stmt(Some(int_lit(1)))]),
                        Some(return_stmt(Some(int_lit(2)))),
                    ),
                ]),
                Some(return_stmt(Some(int_lit(3)))),
            ),
        ]);
        let mut facts = Facts::default();
        let transformations = thread_block(&mut body, &mut facts);
        assert!(transformations >= 2);
        // Both ifs resolved down to `return 1` nested inside the threaded block.
        let StmtKind::Block(outer) = &body.statements[1].kind else { panic!("expected block") };
        let StmtKind::Block(inner) = &outer.statements[0].kind else { panic!("expected nested block") };
        assert!(matches!(inner.statements[0].kind, StmtKind::Return(Some(_))));
    }

    #[test]
    fn unrelated_conditions_are_left_alone() {
        let mut body = block(vec![if_stmt(
            binary(BinaryOp::Lt, ident("n"), int_lit(5)),
            block(vec![return_stmt(Some(int_lit(1)))]),
            None,
        )]);
        let mut facts = Facts::default();
        let transformations = thread_block(&mut body, &mut facts);
        assert_eq!(transformations, 0);
        assert!(matches!(body.statements[0].kind, StmtKind::If { .. }));
    }
}
