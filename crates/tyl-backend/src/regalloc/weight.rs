//! Variable usage weighting: reads + 2*writes, with everything inside a
//! loop counted 10x (§4.2 Function-local allocation).

use rustc_hash::FxHashMap;

use crate::ast::{Block, Expr, ExprKind, ForIter, Stmt, StmtKind};

const LOOP_MULTIPLIER: u64 = 10;

#[derive(Default)]
pub struct WeightTable {
    weights: FxHashMap<String, u64>,
}

impl WeightTable {
    pub fn get(&self, name: &str) -> u64 {
        self.weights.get(name).copied().unwrap_or(0)
    }

    fn add(&mut self, name: &str, amount: u64) {
        *self.weights.entry(name.to_string()).or_insert(0) += amount;
    }

    /// Ranks variable names by descending weight, ties broken by name for
    /// determinism (so the same input always yields the same assignment).
    pub fn ranked(&self) -> Vec<String> {
        let mut names: Vec<String> = self.weights.keys().cloned().collect();
        names.sort_by(|a, b| self.weights[b].cmp(&self.weights[a]).then_with(|| a.cmp(b)));
        names
    }
}

pub fn compute_weights(body: &Block) -> WeightTable {
    let mut table = WeightTable::default();
    walk_block(body, 0, &mut table);
    table
}

fn loop_scale(depth: u32) -> u64 {
    if depth > 0 {
        LOOP_MULTIPLIER
    } else {
        1
    }
}

fn walk_block(block: &Block, depth: u32, table: &mut WeightTable) {
    for stmt in &block.statements {
        walk_stmt(stmt, depth, table);
    }
}

fn walk_stmt(stmt: &Stmt, depth: u32, table: &mut WeightTable) {
    match &stmt.kind {
        StmtKind::VarDecl(decl) => {
            if let crate::ast::Pattern::Identifier(name) = &decl.pattern {
                table.add(name, 2 * loop_scale(depth));
            }
            if let Some(init) = &decl.initializer {
                walk_expr(init, depth, table);
            }
        }
        StmtKind::Expression(e) => walk_expr(e, depth, table),
        StmtKind::Block(b) => walk_block(b, depth, table),
        StmtKind::Return(e) => {
            if let Some(e) = e {
                walk_expr(e, depth, table);
            }
        }
        StmtKind::Break(_) | StmtKind::Continue(_) => {}
        StmtKind::If { cond, then_branch, else_branch } => {
            walk_expr(cond, depth, table);
            walk_block(then_branch, depth, table);
            if let Some(b) = else_branch {
                walk_stmt(b, depth, table);
            }
        }
        StmtKind::While { cond, body, .. } => {
            walk_expr(cond, depth, table);
            walk_block(body, depth + 1, table);
        }
        StmtKind::For { var, iter, body, .. } => {
            table.add(var, 2 * loop_scale(depth + 1));
            match iter {
                ForIter::InclusiveRange { start, end } => {
                    walk_expr(start, depth, table);
                    walk_expr(end, depth, table);
                }
                ForIter::ExclusiveRange { start, end, step } => {
                    walk_expr(start, depth, table);
                    walk_expr(end, depth, table);
                    if let Some(s) = step {
                        walk_expr(s, depth, table);
                    }
                }
                ForIter::List(e) => walk_expr(e, depth, table),
            }
            walk_block(body, depth + 1, table);
        }
        StmtKind::Match { scrutinee, arms } => {
            walk_expr(scrutinee, depth, table);
            for arm in arms {
                walk_block(&arm.body, depth, table);
            }
        }
    }
}

fn walk_expr(expr: &Expr, depth: u32, table: &mut WeightTable) {
    let scale = loop_scale(depth);
    match &expr.kind {
        ExprKind::Ident(name) => table.add(name, scale),
        ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
            walk_expr(left, depth, table);
            walk_expr(right, depth, table);
        }
        ExprKind::Unary { operand, .. } => walk_expr(operand, depth, table),
        ExprKind::Assign { target, value } => {
            if let ExprKind::Ident(name) = &target.kind {
                table.add(name, 2 * scale);
            } else {
                walk_expr(target, depth, table);
            }
            walk_expr(value, depth, table);
        }
        ExprKind::CompoundAssign { target, value, .. } => {
            if let ExprKind::Ident(name) = &target.kind {
                // read-modify-write: one read, one write.
                table.add(name, 3 * scale);
            } else {
                walk_expr(target, depth, table);
            }
            walk_expr(value, depth, table);
        }
        ExprKind::Call { args, .. } | ExprKind::Builtin { args, .. } => {
            for a in args {
                walk_expr(a, depth, table);
            }
        }
        ExprKind::Concat(parts) | ExprKind::ListLit(parts) => {
            for p in parts {
                walk_expr(p, depth, table);
            }
        }
        ExprKind::Range { start, end, .. } => {
            walk_expr(start, depth, table);
            walk_expr(end, depth, table);
        }
        ExprKind::Index { base, index } => {
            walk_expr(base, depth, table);
            walk_expr(index, depth, table);
        }
        ExprKind::FieldAccess { object, .. } => walk_expr(object, depth, table),
        ExprKind::RecordLit { fields, .. } => {
            for (_, e) in fields {
                walk_expr(e, depth, table);
            }
        }
        ExprKind::Closure { captures, .. } => {
            for c in captures {
                table.add(c, scale);
            }
        }
        ExprKind::IsType { value, .. } => walk_expr(value, depth, table),
        ExprKind::IntLit(_)
        | ExprKind::FloatLit(_)
        | ExprKind::StrLit(_)
        | ExprKind::BoolLit(_)
        | ExprKind::NullLit => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    #[test]
    fn loop_body_reads_outweigh_straight_line_reads() {
        // var x; var y; while (true) { x; } y;
        let body = block(vec![
            var_decl("x", int_lit(0)),
            var_decl("y", int_lit(0)),
            while_stmt(bool_lit(true), block(vec![expr_stmt(ident("x"))])),
            expr_stmt(ident("y")),
        ]);
        let weights = compute_weights(&body);
        assert!(weights.get("x") > weights.get("y"));
    }
}
