//! Per-function frame planning (§4.3).
//!
//! A pre-pass walks the function body before any code is emitted and
//! computes the final stack size; the frame descriptor then hands out
//! stack slots at fixed negative offsets from RBP as the statement/
//! expression lowerers request them.

use rustc_hash::FxHashMap;

use crate::ast::{walk, Block, Function};

/// Every call site reserves 32 bytes of shadow space; calls with more than
/// four arguments need `8` additional bytes per extra argument (§4.3).
fn call_arg_shadow(extra_args_beyond_four: usize) -> i32 {
    32 + 8 * extra_args_beyond_four as i32
}

/// Upper bound in bytes for one local declaration or scratch slot.
const SLOT_SIZE: i32 = 8;

/// A pre-pass over a function body used by [`FramePlanner::plan`]. Counts
/// distinct declared locals (including compiler-internal scratch names like
/// `$bytes_read`, `$list_ptr`, see §4.3) and the widest call in the body.
struct PrePass {
    local_count: i32,
    max_shadow: i32,
    has_calls: bool,
}

fn prepass_block(body: &Block, locals: &mut std::collections::HashSet<String>, shadow: &mut i32, has_calls: &mut bool) {
    use crate::ast::{ExprKind, StmtKind};

    fn visit_expr(e: &crate::ast::Expr, locals: &mut std::collections::HashSet<String>, shadow: &mut i32, has_calls: &mut bool) {
        match &e.kind {
            ExprKind::Call { args, .. } => {
                *has_calls = true;
                let extra = args.len().saturating_sub(4);
                *shadow = (*shadow).max(call_arg_shadow(extra));
                for a in args {
                    visit_expr(a, locals, shadow, has_calls);
                }
            }
            ExprKind::Builtin { args, .. } => {
                *has_calls = true;
                *shadow = (*shadow).max(call_arg_shadow(0));
                for a in args {
                    visit_expr(a, locals, shadow, has_calls);
                }
            }
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                visit_expr(left, locals, shadow, has_calls);
                visit_expr(right, locals, shadow, has_calls);
            }
            ExprKind::Unary { operand, .. } | ExprKind::IsType { value: operand, .. } => {
                visit_expr(operand, locals, shadow, has_calls)
            }
            ExprKind::Assign { target, value } | ExprKind::CompoundAssign { target, value, .. } => {
                visit_expr(target, locals, shadow, has_calls);
                visit_expr(value, locals, shadow, has_calls);
            }
            ExprKind::Concat(parts) | ExprKind::ListLit(parts) => {
                for p in parts {
                    visit_expr(p, locals, shadow, has_calls);
                }
            }
            ExprKind::Range { start, end, .. } => {
                visit_expr(start, locals, shadow, has_calls);
                visit_expr(end, locals, shadow, has_calls);
            }
            ExprKind::Index { base, index } => {
                visit_expr(base, locals, shadow, has_calls);
                visit_expr(index, locals, shadow, has_calls);
            }
            ExprKind::FieldAccess { object, .. } => visit_expr(object, locals, shadow, has_calls),
            ExprKind::RecordLit { fields, .. } => {
                for (_, v) in fields {
                    visit_expr(v, locals, shadow, has_calls);
                }
            }
            _ => {}
        }
    }

    for stmt in &body.statements {
        match &stmt.kind {
            StmtKind::VarDecl(decl) => {
                if let crate::ast::Pattern::Identifier(name) = &decl.pattern {
                    locals.insert(name.clone());
                }
                if let Some(init) = &decl.initializer {
                    visit_expr(init, locals, shadow, has_calls);
                }
            }
            StmtKind::Expression(e) => visit_expr(e, locals, shadow, has_calls),
            StmtKind::Block(b) => prepass_block(b, locals, shadow, has_calls),
            StmtKind::Return(e) => {
                if let Some(e) = e {
                    visit_expr(e, locals, shadow, has_calls);
                }
            }
            StmtKind::Break(_) | StmtKind::Continue(_) => {}
            StmtKind::If { cond, then_branch, else_branch } => {
                visit_expr(cond, locals, shadow, has_calls);
                prepass_block(then_branch, locals, shadow, has_calls);
                if let Some(b) = else_branch {
                    prepass_block(&Block { statements: vec![(**b).clone()] }, locals, shadow, has_calls);
                }
            }
            StmtKind::While { cond, body, .. } => {
                visit_expr(cond, locals, shadow, has_calls);
                prepass_block(body, locals, shadow, has_calls);
            }
            StmtKind::For { var, iter, body, .. } => {
                locals.insert(var.clone());
                match iter {
                    crate::ast::ForIter::InclusiveRange { start, end } => {
                        visit_expr(start, locals, shadow, has_calls);
                        visit_expr(end, locals, shadow, has_calls);
                    }
                    crate::ast::ForIter::ExclusiveRange { start, end, step } => {
                        visit_expr(start, locals, shadow, has_calls);
                        visit_expr(end, locals, shadow, has_calls);
                        if let Some(s) = step {
                            visit_expr(s, locals, shadow, has_calls);
                        }
                    }
                    crate::ast::ForIter::List(e) => visit_expr(e, locals, shadow, has_calls),
                }
                prepass_block(body, locals, shadow, has_calls);
            }
            StmtKind::Match { scrutinee, arms } => {
                visit_expr(scrutinee, locals, shadow, has_calls);
                for arm in arms {
                    prepass_block(&arm.body, locals, shadow, has_calls);
                }
            }
        }
    }
}

fn prepass(body: &Block) -> PrePass {
    let mut locals = std::collections::HashSet::new();
    let mut shadow = 0;
    let mut has_calls = false;
    prepass_block(body, &mut locals, &mut shadow, &mut has_calls);
    PrePass { local_count: locals.len() as i32, max_shadow: shadow, has_calls }
}

fn align_up(n: i32, align: i32) -> i32 {
    (n + align - 1) / align * align
}

/// A function's stack frame: the negative-offset mapping from variable
/// name to its stack home, plus the running allocation cursor (§3 Local
/// frame descriptor).
pub struct Frame {
    slots: FxHashMap<String, i32>,
    stack_offset: i32,
    pub function_stack_size: i32,
    pub stack_allocated: bool,
    pub saved_regs: Vec<crate::instr::Gpr>,
}

impl Frame {
    /// `base` is `0x200` for specialized generics (oversized for safety,
    /// §4.3) and `0x40` otherwise.
    pub fn plan(body: &Block, saved_regs: Vec<crate::instr::Gpr>, is_specialized_generic: bool) -> Self {
        let pp = prepass(body);
        let base: i32 = if is_specialized_generic { 0x200 } else { 0x40 };
        let locals_bytes = pp.local_count * SLOT_SIZE;
        let callee_save_bytes = SLOT_SIZE * saved_regs.len() as i32;
        let function_stack_size = align_up(base + locals_bytes + pp.max_shadow, 16);

        // Leaf functions (no calls, few locals) skip the RSP adjustment and
        // use a scratch window below RSP instead (§4.3).
        let stack_allocated = pp.has_calls || pp.local_count > 0;

        Self {
            slots: FxHashMap::default(),
            stack_offset: -callee_save_bytes,
            function_stack_size,
            stack_allocated,
            saved_regs,
        }
    }

    /// Allocates a fresh 8-byte stack slot for `name` if it doesn't already
    /// have one, returning its RBP-relative offset.
    pub fn slot_for(&mut self, name: &str) -> i32 {
        if let Some(&off) = self.slots.get(name) {
            return off;
        }
        self.stack_offset -= SLOT_SIZE;
        let off = self.stack_offset;
        debug_assert!(off >= -self.function_stack_size, "frame planner under-budgeted: {name}");
        self.slots.insert(name.to_string(), off);
        off
    }

    pub fn existing_slot(&self, name: &str) -> Option<i32> {
        self.slots.get(name).copied()
    }

    pub fn is_leaf(&self) -> bool {
        !self.stack_allocated
    }
}

pub fn is_leaf_function(f: &Function) -> bool {
    !walk::body_contains_call(&f.body) && f.body.statements.len() < 4
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    #[test]
    fn leaf_body_with_no_calls_has_no_locals_or_shadow() {
        let body = block(vec![return_stmt(Some(int_lit(7)))]);
        let pp = prepass(&body);
        assert_eq!(pp.local_count, 0);
        assert!(!pp.has_calls);
    }

    #[test]
    fn a_four_arg_call_reserves_only_the_base_shadow_space() {
        let body = block(vec![expr_stmt(call_direct("f", vec![int_lit(1), int_lit(2), int_lit(3), int_lit(4)]))]);
        let pp = prepass(&body);
        assert_eq!(pp.max_shadow, 32);
    }

    #[test]
    fn a_six_arg_call_reserves_extra_shadow_bytes() {
        let body = block(vec![expr_stmt(call_direct(
            "f",
            vec![int_lit(1), int_lit(2), int_lit(3), int_lit(4), int_lit(5), int_lit(6)],
        ))]);
        let pp = prepass(&body);
        assert_eq!(pp.max_shadow, 32 + 8 * 2);
    }

    #[test]
    fn function_stack_size_is_16_byte_aligned() {
        let body = block(vec![var_decl("a", int_lit(1))]);
        let frame = Frame::plan(&body, vec![], false);
        assert_eq!(frame.function_stack_size % 16, 0);
    }

    #[test]
    fn repeated_slot_request_returns_the_same_offset() {
        let body = block(vec![]);
        let mut frame = Frame::plan(&body, vec![], false);
        let a = frame.slot_for("x");
        let b = frame.slot_for("x");
        assert_eq!(a, b);
    }
}
