//! Whole-program emission order (§2 data flow, §4 Lowering overview):
//! `_start`, then every function, then specialized generic instantiations,
//! then impl methods, then trait vtable trampolines, then the shared
//! runtime snippets any of the above referenced.

use rustc_hash::FxHashMap;

use crate::ast::{Function, Param, Program, Type};
use crate::error::EmitResult;
use crate::instr::InstrBuffer;
use crate::lower::{Lowerer, PendingClosure};
use crate::monomorphize::MonomorphizedProgram;
use crate::record::RecordTable;
use crate::regalloc;
use crate::runtime::{self, RuntimeUsage};
use crate::typetab::TypeTable;

/// One fully-lowered function, keyed by its final label — `_start` for the
/// top-level statements, `Type$method` for impl methods, the function's own
/// name otherwise, and a specialization suffix (`name$T1,T2`) for
/// monomorphized generics.
pub struct CompiledFunction {
    pub label: String,
    pub code: InstrBuffer,
}

pub struct CompiledModule {
    pub functions: Vec<CompiledFunction>,
    /// Bytes already finalized (fix-ups resolved to rel32 displacements
    /// computed against each function's own local labels); assembling
    /// these into one section with correct inter-function branches is the
    /// linker's job (`crate::link`), since only it knows final addresses.
    pub runtime_usage: RuntimeUsage,
}

pub fn compile_program(program: &MonomorphizedProgram, types: &TypeTable, records: &RecordTable) -> EmitResult<CompiledModule> {
    let function_table: FxHashMap<String, Function> =
        program.functions.iter().map(|f| (f.name.clone(), f.clone())).collect();
    let globals = regalloc::allocate_global(&program.source.top_level);

    let mut functions = Vec::new();
    let mut pending_closures: Vec<PendingClosure> = Vec::new();

    functions.push(compile_start(program, &globals, types, records, &function_table, &mut pending_closures)?);

    for f in &program.functions {
        let mut lowerer = Lowerer::new(f, &globals, types, records, &function_table);
        lowerer.lower_function(f)?;
        let (code, pending) = lowerer.into_parts();
        functions.push(CompiledFunction { label: f.name.clone(), code });
        pending_closures.extend(pending);
    }

    for spec in &program.specializations {
        let mut lowerer = Lowerer::new(&spec.function, &globals, types, records, &function_table);
        lowerer.lower_function(&spec.function)?;
        let (code, pending) = lowerer.into_parts();
        functions.push(CompiledFunction { label: spec.label.clone(), code });
        pending_closures.extend(pending);
    }

    for imp in &program.source.impls {
        for method in &imp.methods {
            let label = format!("{}${}", imp.type_name, method.name);
            let mut lowerer = Lowerer::new(method, &globals, types, records, &function_table);
            lowerer.lower_function(method)?;
            let (code, pending) = lowerer.into_parts();
            functions.push(CompiledFunction { label, code });
            pending_closures.extend(pending);
        }
    }

    // Closure bodies queued by any of the above: each becomes an ordinary
    // function taking the closure pointer as a hidden leading `$closure`
    // parameter (§4.6). A closure body can itself allocate a nested
    // closure, so this drains to completion rather than a single sweep.
    while let Some(pc) = pending_closures.pop() {
        let mut params = vec![Param { name: "$closure".to_string(), ty: Type::I64 }];
        params.extend(pc.params.iter().map(|name| Param { name: name.clone(), ty: Type::I64 }));
        let synthetic = Function {
            name: pc.label.clone(),
            params,
            return_ty: Type::I64,
            body: pc.body.clone(),
            generic_params: Vec::new(),
            is_extern: false,
        };
        let mut lowerer = Lowerer::new(&synthetic, &globals, types, records, &function_table);
        lowerer.lower_closure_function(&synthetic, &pc.captures)?;
        let (code, nested) = lowerer.into_parts();
        functions.push(CompiledFunction { label: pc.label, code });
        pending_closures.extend(nested);
    }

    // Trait dispatch trampolines just forward into the concrete impl the
    // checker already resolved per call site (§4.6); no additional code is
    // generated here beyond what `lower::call::lower_vtable_call` already
    // emits inline at each call site, so this loop intentionally only
    // documents the step rather than emitting anything.
    let _ = &program.source.traits;

    let runtime_usage = compute_runtime_usage(&functions);
    if runtime_usage.any() {
        let mut rt_buf = InstrBuffer::new();
        runtime::emit_used(&mut rt_buf, runtime_usage);
        functions.push(CompiledFunction { label: "$runtime".to_string(), code: rt_buf });
    }

    Ok(CompiledModule { functions, runtime_usage })
}

/// Scans every compiled function's fix-up list for direct references to a
/// shared runtime snippet's label, so [`runtime::emit_used`] only emits what
/// something in the module actually calls. Must run before the `$runtime`
/// buffer itself is appended, or its own internal calls (e.g. `print_int`
/// referencing `itoa`) would be double-counted as call-site usage — harmless
/// here since `emit_used` already accounts for that dependency, but the
/// distinction matters if this function is ever asked about a subset of
/// functions.
fn compute_runtime_usage(functions: &[CompiledFunction]) -> RuntimeUsage {
    let mut usage = RuntimeUsage::default();
    for f in functions {
        for fixup in f.code.fixups() {
            match fixup.target.as_str() {
                runtime::ITOA_LABEL => usage.itoa = true,
                runtime::FTOA_LABEL => usage.ftoa = true,
                runtime::PRINT_INT_LABEL => usage.print_int = true,
                runtime::PRINT_FLOAT_LABEL => usage.print_float = true,
                _ => {}
            }
        }
    }
    usage
}

fn compile_start(
    program: &MonomorphizedProgram,
    globals: &regalloc::RegisterTable,
    types: &TypeTable,
    records: &RecordTable,
    function_table: &FxHashMap<String, Function>,
    pending_closures: &mut Vec<PendingClosure>,
) -> EmitResult<CompiledFunction> {
    let synthetic_main = Function {
        name: "_start".to_string(),
        params: Vec::new(),
        return_ty: crate::ast::Type::Unit,
        body: program.source.top_level.clone(),
        generic_params: Vec::new(),
        is_extern: false,
    };
    let mut lowerer = Lowerer::new(&synthetic_main, globals, types, records, function_table);
    lowerer.lower_function(&synthetic_main)?;
    let (code, pending) = lowerer.into_parts();
    pending_closures.extend(pending);
    Ok(CompiledFunction { label: "_start".to_string(), code })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    #[test]
    fn an_empty_program_still_emits_a_start_label() {
        let program = Program { top_level: block(vec![return_stmt(None)]), ..Default::default() };
        let monomorphized = MonomorphizedProgram { source: program, functions: vec![], specializations: vec![] };
        let types = TypeTable::new();
        let records = RecordTable::build(&[]);
        let module = compile_program(&monomorphized, &types, &records).unwrap();
        assert!(module.functions.iter().any(|f| f.label == "_start"));
        assert!(!module.runtime_usage.any());
        assert!(!module.functions.iter().any(|f| f.label == "$runtime"));
    }

    #[test]
    fn printing_an_int_pulls_in_only_the_integer_runtime_path() {
        let program = Program {
            top_level: block(vec![expr_stmt(builtin("print", vec![int_lit(42)]))]),
            ..Default::default()
        };
        let monomorphized = MonomorphizedProgram { source: program, functions: vec![], specializations: vec![] };
        let types = TypeTable::new();
        let records = RecordTable::build(&[]);
        let module = compile_program(&monomorphized, &types, &records).unwrap();
        assert!(module.runtime_usage.print_int);
        assert!(module.runtime_usage.itoa);
        assert!(!module.runtime_usage.print_float);
        assert!(!module.runtime_usage.ftoa);
        assert!(module.functions.iter().any(|f| f.label == "$runtime"));
    }

    #[test]
    fn printing_a_float_pulls_in_the_float_runtime_path() {
        let program = Program {
            top_level: block(vec![expr_stmt(builtin("print", vec![float_lit(1.5)]))]),
            ..Default::default()
        };
        let monomorphized = MonomorphizedProgram { source: program, functions: vec![], specializations: vec![] };
        let types = TypeTable::new();
        let records = RecordTable::build(&[]);
        let module = compile_program(&monomorphized, &types, &records).unwrap();
        assert!(module.runtime_usage.print_float);
        assert!(module.runtime_usage.ftoa);
    }
}
