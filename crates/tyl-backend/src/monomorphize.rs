//! Generic specialization — an external collaborator's output, reshaped
//! into the form [`crate::program::compile_program`] expects (§3).
//!
//! The type checker/monomorphizer decides which concrete `TypeArgs` each
//! generic function is instantiated with and produces one fully-typed
//! [`Function`] body per instantiation; this module only carries that
//! result across the boundary; it performs no substitution itself.

use crate::ast::{Function, Program, TypeArgs};

/// One concrete instantiation of a generic function.
#[derive(Clone)]
pub struct Specialization {
    /// `name$T1,T2` — unique per `(function, type args)` pair, used as both
    /// the call-site label and the frame's name prefix.
    pub label: String,
    pub type_args: TypeArgs,
    pub function: Function,
}

/// Everything [`crate::program::compile_program`] needs: the original
/// program (for top-level statements, records, traits, impls) plus the
/// already-monomorphized function set.
pub struct MonomorphizedProgram {
    pub source: Program,
    pub functions: Vec<Function>,
    pub specializations: Vec<Specialization>,
}

impl MonomorphizedProgram {
    /// Builds the compile-ready program from a checked [`Program`] whose
    /// generic functions have already been expanded into `specializations`
    /// by the external monomorphizer. Non-generic functions pass through
    /// unchanged.
    pub fn from_checked(source: Program, specializations: Vec<Specialization>) -> Self {
        let functions = source.functions.iter().filter(|f| !f.is_generic()).cloned().collect();
        Self { source, functions, specializations }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    #[test]
    fn generic_functions_are_excluded_from_the_direct_function_list() {
        let mut generic = function("identity", vec![("x", crate::ast::Type::Generic("T".into()))], crate::ast::Type::Generic("T".into()), block(vec![return_stmt(Some(ident("x")))]));
        generic.generic_params = vec!["T".to_string()];
        let concrete = function("main", vec![], crate::ast::Type::I64, block(vec![return_stmt(Some(int_lit(0)))]));
        let program = Program { functions: vec![generic, concrete], ..Default::default() };
        let mp = MonomorphizedProgram::from_checked(program, vec![]);
        assert_eq!(mp.functions.len(), 1);
        assert_eq!(mp.functions[0].name, "main");
    }
}
