//! Small read-only AST queries shared by the register allocator (liveness),
//! the frame planner (leaf-function detection), and the optimizer passes
//! (call-graph construction). Not a generic visitor framework — each
//! consumer that needs to *rewrite* the AST walks it directly with its own
//! exhaustive match, per the pattern in [`crate::lower`].

use super::expr::{Expr, ExprKind};
use super::stmt::{Block, ForIter, Stmt, StmtKind};

/// True if evaluating `body` ever executes a `call`/`extern call`/closure
/// call. The frame planner uses this to decide whether a function can skip
/// the `sub rsp` adjustment entirely (§4.3).
pub fn body_contains_call(body: &Block) -> bool {
    body.statements.iter().any(stmt_contains_call)
}

fn stmt_contains_call(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::VarDecl(decl) => decl.initializer.as_ref().is_some_and(expr_contains_call),
        StmtKind::Expression(e) => expr_contains_call(e),
        StmtKind::Block(b) => body_contains_call(b),
        StmtKind::Return(e) => e.as_ref().is_some_and(expr_contains_call),
        StmtKind::Break(_) | StmtKind::Continue(_) => false,
        StmtKind::If { cond, then_branch, else_branch } => {
            expr_contains_call(cond)
                || body_contains_call(then_branch)
                || else_branch.as_ref().is_some_and(|b| stmt_contains_call(b))
        }
        StmtKind::While { cond, body, .. } => expr_contains_call(cond) || body_contains_call(body),
        StmtKind::For { iter, body, .. } => {
            let iter_has_call = match iter {
                ForIter::InclusiveRange { start, end } => {
                    expr_contains_call(start) || expr_contains_call(end)
                }
                ForIter::ExclusiveRange { start, end, step } => {
                    expr_contains_call(start)
                        || expr_contains_call(end)
                        || step.as_ref().is_some_and(expr_contains_call)
                }
                ForIter::List(e) => expr_contains_call(e),
            };
            iter_has_call || body_contains_call(body)
        }
        StmtKind::Match { scrutinee, arms } => {
            expr_contains_call(scrutinee) || arms.iter().any(|a| body_contains_call(&a.body))
        }
    }
}

pub fn expr_contains_call(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Call { .. } | ExprKind::Builtin { .. } => true,
        ExprKind::IntLit(_)
        | ExprKind::FloatLit(_)
        | ExprKind::StrLit(_)
        | ExprKind::BoolLit(_)
        | ExprKind::NullLit
        | ExprKind::Ident(_) => false,
        ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
            expr_contains_call(left) || expr_contains_call(right)
        }
        ExprKind::Unary { operand, .. } => expr_contains_call(operand),
        ExprKind::Assign { target, value } | ExprKind::CompoundAssign { target, value, .. } => {
            expr_contains_call(target) || expr_contains_call(value)
        }
        ExprKind::Concat(parts) | ExprKind::ListLit(parts) => parts.iter().any(expr_contains_call),
        ExprKind::Range { start, end, .. } => expr_contains_call(start) || expr_contains_call(end),
        ExprKind::Index { base, index } => expr_contains_call(base) || expr_contains_call(index),
        ExprKind::FieldAccess { object, .. } => expr_contains_call(object),
        ExprKind::RecordLit { fields, .. } => fields.iter().any(|(_, e)| expr_contains_call(e)),
        ExprKind::Closure { .. } => false,
        ExprKind::IsType { value, .. } => expr_contains_call(value),
        ExprKind::AddressOf(operand) => expr_contains_call(operand),
    }
}

/// Collects every identifier referenced by-read in `expr` (not assignment
/// targets). Used by the register allocator's weight pass and by dead-arg
/// elimination's usage check.
pub fn collect_reads(expr: &Expr, out: &mut Vec<String>) {
    match &expr.kind {
        ExprKind::Ident(name) => out.push(name.clone()),
        ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
            collect_reads(left, out);
            collect_reads(right, out);
        }
        ExprKind::Unary { operand, .. } => collect_reads(operand, out),
        ExprKind::Assign { target, value } => {
            // The target of a plain assignment is a write, not a read,
            // unless it's an index/field expression (which reads the base).
            if !matches!(target.kind, ExprKind::Ident(_)) {
                collect_reads(target, out);
            }
            collect_reads(value, out);
        }
        ExprKind::CompoundAssign { target, value, .. } => {
            // Compound assignment always reads its target first.
            collect_reads(target, out);
            collect_reads(value, out);
        }
        ExprKind::Call { args, .. } | ExprKind::Builtin { args, .. } => {
            args.iter().for_each(|a| collect_reads(a, out));
        }
        ExprKind::Concat(parts) | ExprKind::ListLit(parts) => {
            parts.iter().for_each(|p| collect_reads(p, out));
        }
        ExprKind::Range { start, end, .. } => {
            collect_reads(start, out);
            collect_reads(end, out);
        }
        ExprKind::Index { base, index } => {
            collect_reads(base, out);
            collect_reads(index, out);
        }
        ExprKind::FieldAccess { object, .. } => collect_reads(object, out),
        ExprKind::RecordLit { fields, .. } => {
            fields.iter().for_each(|(_, e)| collect_reads(e, out));
        }
        ExprKind::Closure { captures, .. } => out.extend(captures.iter().cloned()),
        ExprKind::IsType { value, .. } => collect_reads(value, out),
        ExprKind::AddressOf(operand) => collect_reads(operand, out),
        ExprKind::IntLit(_)
        | ExprKind::FloatLit(_)
        | ExprKind::StrLit(_)
        | ExprKind::BoolLit(_)
        | ExprKind::NullLit => {}
    }
}

pub fn block_collect_reads(block: &Block, out: &mut Vec<String>) {
    for stmt in &block.statements {
        stmt_collect_reads(stmt, out);
    }
}

fn stmt_collect_reads(stmt: &Stmt, out: &mut Vec<String>) {
    match &stmt.kind {
        StmtKind::VarDecl(decl) => {
            if let Some(init) = &decl.initializer {
                collect_reads(init, out);
            }
        }
        StmtKind::Expression(e) => collect_reads(e, out),
        StmtKind::Block(b) => block_collect_reads(b, out),
        StmtKind::Return(e) => {
            if let Some(e) = e {
                collect_reads(e, out);
            }
        }
        StmtKind::Break(_) | StmtKind::Continue(_) => {}
        StmtKind::If { cond, then_branch, else_branch } => {
            collect_reads(cond, out);
            block_collect_reads(then_branch, out);
            if let Some(b) = else_branch {
                stmt_collect_reads(b, out);
            }
        }
        StmtKind::While { cond, body, .. } => {
            collect_reads(cond, out);
            block_collect_reads(body, out);
        }
        StmtKind::For { iter, body, .. } => {
            match iter {
                ForIter::InclusiveRange { start, end } => {
                    collect_reads(start, out);
                    collect_reads(end, out);
                }
                ForIter::ExclusiveRange { start, end, step } => {
                    collect_reads(start, out);
                    collect_reads(end, out);
                    if let Some(s) = step {
                        collect_reads(s, out);
                    }
                }
                ForIter::List(e) => collect_reads(e, out),
            }
            block_collect_reads(body, out);
        }
        StmtKind::Match { scrutinee, arms } => {
            collect_reads(scrutinee, out);
            arms.iter().for_each(|a| block_collect_reads(&a.body, out));
        }
    }
}
