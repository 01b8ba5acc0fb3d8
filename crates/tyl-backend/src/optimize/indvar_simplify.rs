//! Induction-variable simplification and closed-form loop reduction (§4.8).
//!
//! Recognizes the single most common shape this language's `for` lowering
//! produces — an inclusive or exclusive integer range loop whose body is
//! exactly one `acc += <loop var or constant>` — and replaces it with the
//! closed-form arithmetic-series result, eliminating the loop label
//! entirely. Anything that doesn't match this shape (a body with more than
//! one statement, a call, a break/continue, a non-additive update) is left
//! for the emitter to lower as a real loop.

use crate::ast::{BinaryOp, Block, CompoundOp, Expr, ExprKind, ForIter, Program, Stmt, StmtKind};
use crate::error::OptimizeError;

pub fn run(program: &mut Program) -> Result<usize, OptimizeError> {
    let mut transformations = 0;
    for f in program.functions.iter_mut() {
        transformations += reduce_block(&mut f.body);
    }
    transformations += reduce_block(&mut program.top_level);
    Ok(transformations)
}

fn reduce_block(block: &mut Block) -> usize {
    let mut transformations = 0;
    for stmt in block.statements.iter_mut() {
        transformations += reduce_stmt(stmt);
    }
    transformations
}

fn reduce_stmt(stmt: &mut Stmt) -> usize {
    match &mut stmt.kind {
        StmtKind::For { var, iter, body, label: None } => {
            if let Some(replacement) = try_reduce(var, iter, body) {
                stmt.kind = replacement;
                return 1 + reduce_stmt(stmt);
            }
            reduce_block(body)
        }
        StmtKind::If { then_branch, else_branch, .. } => {
            let mut t = reduce_block(then_branch);
            if let Some(e) = else_branch {
                t += reduce_stmt(e);
            }
            t
        }
        StmtKind::While { body, .. } | StmtKind::For { body, .. } => reduce_block(body),
        StmtKind::Block(b) => reduce_block(b),
        StmtKind::Match { arms, .. } => arms.iter_mut().map(|a| reduce_block(&mut a.body)).sum(),
        _ => 0,
    }
}

/// `for i in a..b { acc += i }` (and the `acc += 1`/counter form, which
/// degenerates to `acc += (b - a)`) reduce to a single assignment using the
/// closed-form sum of an arithmetic series. Only triggers when `a`, `b`
/// fold to compile-time constants — anything reading a runtime bound keeps
/// its loop, since the reduction needs concrete bounds to compute a single
/// result.
fn try_reduce(var: &str, iter: &ForIter, body: &Block) -> Option<StmtKind> {
    if body.statements.len() != 1 {
        return None;
    }
    let Stmt { kind: StmtKind::Expression(expr), .. } = &body.statements[0] else { return None };
    let ExprKind::CompoundAssign { op: CompoundOp::Add, target, value } = &expr.kind else { return None };
    let ExprKind::Ident(acc) = &target.kind else { return None };

    let (start, end, step, inclusive) = match iter {
        ForIter::InclusiveRange { start, end } => (start, end, 1i64, true),
        ForIter::ExclusiveRange { start, end, step } => {
            let step = step.as_ref().and_then(crate::ast::try_eval_const_int).unwrap_or(1);
            (start, end, step, false)
        }
        ForIter::List(_) => return None,
    };
    if step != 1 {
        // Closed-form sum of a stepped series is still derivable but not
        // worth the complexity here; only the unit-step case is reduced.
        return None;
    }

    let a = crate::ast::try_eval_const_int(start)?;
    let b = crate::ast::try_eval_const_int(end)?;
    let last = if inclusive { b } else { b - 1 };
    if last < a {
        // Empty range: the loop never runs, so the accumulator is
        // untouched and the whole statement disappears.
        return Some(StmtKind::Block(Block { statements: vec![] }));
    }
    let count = last - a + 1;

    let sum_of_var = if matches!(&value.kind, ExprKind::Ident(name) if name == var) {
        // Sum_{i=a}^{last} i = count*(a+last)/2
        count.checked_mul(a + last)? / 2
    } else {
        crate::ast::try_eval_const_int(value)?.checked_mul(count)?
    };

    let delta = Expr::new(ExprKind::IntLit(sum_of_var), value.ty.clone(), value.span);
    let new_assign = Expr::new(
        ExprKind::CompoundAssign { op: CompoundOp::Add, target: target.clone(), value: Box::new(delta) },
        target.ty.clone(),
        expr.span,
    );
    let _ = acc;
    Some(StmtKind::Expression(new_assign))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    #[test]
    fn summing_the_loop_variable_reduces_to_a_closed_form_constant() {
        let mut f = function(
            "main",
            vec![],
            crate::ast::Type::I64,
            block(vec![
                var_decl("s", int_lit(0)),
                for_exclusive("i", int_lit(0), int_lit(100), block(vec![expr_stmt(compound_assign(CompoundOp::Add, ident("s"), ident("i")))])),
                return_stmt(Some(ident("s"))),
            ]),
        );
        reduce_block(&mut f.body);
        let StmtKind::Expression(e) = &f.body.statements[1].kind else { panic!("expected reduced expression statement") };
        let ExprKind::CompoundAssign { value, .. } = &e.kind else { panic!("expected compound assign") };
        assert_eq!(crate::ast::try_eval_const_int(value), Some(4950));
    }

    #[test]
    fn loops_with_more_than_one_statement_are_left_alone() {
        let mut body = block(vec![for_exclusive(
            "i",
            int_lit(0),
            int_lit(10),
            block(vec![
                expr_stmt(compound_assign(CompoundOp::Add, ident("s"), ident("i"))),
                expr_stmt(call_direct("noop", vec![])),
            ]),
        )]);
        let transformations = reduce_block(&mut body);
        assert_eq!(transformations, 0);
        assert!(matches!(body.statements[0].kind, StmtKind::For { .. }));
    }
}
