//! Register allocation (§4.2): function-local and global, both choosing
//! from the fixed callee-saved set {RBX, R12, R13, R14, R15}.

mod weight;

pub use weight::{compute_weights, WeightTable};

use rustc_hash::FxHashMap;

use crate::ast::Block;
use crate::instr::Gpr;

/// A variable is either register-resident (its entry is one of the
/// callee-saved registers) or stack-resident (absent from the table) —
/// never both (§3 Register assignment invariant).
#[derive(Default)]
pub struct RegisterTable {
    assignments: FxHashMap<String, Gpr>,
}

impl RegisterTable {
    pub fn reg_of(&self, name: &str) -> Option<Gpr> {
        self.assignments.get(name).copied()
    }

    pub fn is_resident(&self, name: &str) -> bool {
        self.assignments.contains_key(name)
    }

    /// Spills `name` to the stack. Promotion to stack is monotonic within a
    /// function: once spilled (e.g. by `&name`), it never returns to a
    /// register for the remainder of that function (§4.2).
    pub fn spill(&mut self, name: &str) {
        self.assignments.remove(name);
    }

    pub fn registers_in_use(&self) -> Vec<Gpr> {
        let mut regs: Vec<Gpr> = self.assignments.values().copied().collect();
        regs.sort_by_key(|r| r.num());
        regs.dedup();
        regs
    }

    fn assign(&mut self, name: String, reg: Gpr) {
        self.assignments.insert(name, reg);
    }
}

/// Runs once per function body: ranks every mentioned identifier by
/// `compute_weights` and assigns the top-N to callee-saved registers in
/// priority order. Parameters beyond the four Win64 delivers in
/// RCX/RDX/R8/R9 (or XMM0..3) spill to the stack regardless of weight,
/// because the caller already placed them there (§4.2).
pub fn allocate_function_local(body: &Block, excluded: &[String]) -> RegisterTable {
    let weights = compute_weights(body);
    let mut table = RegisterTable::default();
    let mut it = Gpr::CALLEE_SAVED.iter().copied();
    for name in weights.ranked() {
        if excluded.contains(&name) {
            continue;
        }
        let Some(reg) = it.next() else { break };
        table.assign(name, reg);
    }
    table
}

/// Runs once at program start over every top-level variable, reserving a
/// disjoint subset of callee-saved registers that `_start` saves on entry
/// and restores on exit (§4.2 Global allocation).
pub fn allocate_global(top_level: &Block) -> RegisterTable {
    allocate_function_local(top_level, &[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    #[test]
    fn hot_loop_variable_wins_a_register_over_cold_locals() {
        let body = block(vec![
            var_decl("hot", int_lit(0)),
            var_decl("a", int_lit(0)),
            var_decl("b", int_lit(0)),
            var_decl("c", int_lit(0)),
            var_decl("d", int_lit(0)),
            var_decl("e", int_lit(0)),
            while_stmt(bool_lit(true), block(vec![expr_stmt(ident("hot"))])),
        ]);
        let table = allocate_function_local(&body, &[]);
        assert!(table.is_resident("hot"));
    }

    #[test]
    fn address_of_spills_monotonically() {
        let mut table = RegisterTable::default();
        table.assign("x".to_string(), Gpr::Rbx);
        assert!(table.is_resident("x"));
        table.spill("x");
        assert!(!table.is_resident("x"));
    }

    #[test]
    fn excluded_names_never_receive_a_register() {
        let body = block(vec![
            var_decl("param5", int_lit(0)),
            expr_stmt(ident("param5")),
        ]);
        let table = allocate_function_local(&body, &["param5".to_string()]);
        assert!(!table.is_resident("param5"));
    }
}
