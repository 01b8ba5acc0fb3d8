//! Type-classification side tables (§3, §9 Design Notes).
//!
//! A tiny flow-insensitive abstract interpreter: per-scope maps recording
//! what the lowerer can assume about a variable's compile-time-known value
//! or shape. Unlike the original Tyl compiler (which left `const_str_vars`
//! stale across loop bodies "because strings are rarely modified" — see
//! `examples/original_source`), every map here is invalidated on *any*
//! assignment to the name, per the cleaner design §9 recommends.

use rustc_hash::FxHashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstValue {
    Int(i64),
    Float(u64), // bit pattern, so the table can live in a plain HashMap
}

#[derive(Default)]
pub struct TypeTable {
    pub float_vars: rustc_hash::FxHashSet<String>,
    const_str_vars: FxHashMap<String, String>,
    const_vars: FxHashMap<String, ConstValue>,
    /// Compile-time-known list lengths (`list_sizes`).
    list_sizes: FxHashMap<String, usize>,
    const_list_vars: FxHashMap<String, Vec<ConstValue>>,
    /// Record-typed locals → type name (`var_record_types`).
    pub var_record_types: FxHashMap<String, String>,
    pub string_returning_functions: rustc_hash::FxHashSet<String>,
    pub inferred_param_types: FxHashMap<String, crate::ast::Type>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_const_int(&mut self, name: &str, value: i64) {
        self.const_vars.insert(name.to_string(), ConstValue::Int(value));
    }

    pub fn set_const_float(&mut self, name: &str, value: f64) {
        self.const_vars.insert(name.to_string(), ConstValue::Float(value.to_bits()));
        self.float_vars.insert(name.to_string());
    }

    pub fn set_const_str(&mut self, name: &str, value: String) {
        self.const_str_vars.insert(name.to_string(), value);
    }

    pub fn set_list_size(&mut self, name: &str, size: usize, consts: Option<Vec<ConstValue>>) {
        self.list_sizes.insert(name.to_string(), size);
        if let Some(c) = consts {
            self.const_list_vars.insert(name.to_string(), c);
        }
    }

    pub fn const_int(&self, name: &str) -> Option<i64> {
        match self.const_vars.get(name) {
            Some(ConstValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn const_float(&self, name: &str) -> Option<f64> {
        match self.const_vars.get(name) {
            Some(ConstValue::Float(bits)) => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }

    pub fn const_str(&self, name: &str) -> Option<&str> {
        self.const_str_vars.get(name).map(|s| s.as_str())
    }

    pub fn list_size(&self, name: &str) -> Option<usize> {
        self.list_sizes.get(name).copied()
    }

    pub fn const_list(&self, name: &str) -> Option<&[ConstValue]> {
        self.const_list_vars.get(name).map(|v| v.as_slice())
    }

    /// Invalidates every side table entry for `name`. Called on every
    /// assignment, including inside loops — the cleaner design from §9
    /// Design Notes, deliberately not replicating the original's staleness.
    pub fn invalidate(&mut self, name: &str) {
        self.const_str_vars.remove(name);
        self.const_vars.remove(name);
        self.list_sizes.remove(name);
        self.const_list_vars.remove(name);
        self.float_vars.remove(name);
        self.var_record_types.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_clears_every_side_table_for_the_name() {
        let mut t = TypeTable::new();
        t.set_const_int("x", 5);
        t.set_const_str("x", "hi".into());
        t.set_list_size("x", 3, None);
        assert_eq!(t.const_int("x"), Some(5));
        t.invalidate("x");
        assert_eq!(t.const_int("x"), None);
        assert_eq!(t.const_str("x"), None);
        assert_eq!(t.list_size("x"), None);
    }
}
