//! Linker orchestration (§3): merges every function's independently-lowered
//! [`InstrBuffer`] into one address space, resolving each buffer's `rel32`
//! fix-ups against the merged label table. [`InstrBuffer::finalize`] only
//! knows the labels bound *within* its own buffer — a loop's internal
//! branch targets, an if/else join — so it can't resolve a `call` to
//! another function's entry label by itself. That cross-buffer resolution
//! is this module's whole job; the PE writer (`crate::pe`) only ever sees
//! one finished code blob plus the data fix-ups rebased into it.

use rustc_hash::FxHashMap;

use crate::error::{EmitError, EmitResult};
use crate::instr::DataFixUp;
use crate::program::CompiledModule;

pub struct LinkedModule {
    pub code: Vec<u8>,
    /// Data fix-ups from every function, rebased to offsets into `code`.
    pub data_fixups: Vec<DataFixUp>,
    /// Byte offset of `_start` within `code` — the PE writer's entry point.
    pub entry_offset: u32,
}

pub fn link(module: &CompiledModule) -> EmitResult<LinkedModule> {
    let mut code = Vec::new();
    let mut bases: FxHashMap<&str, u32> = FxHashMap::default();

    for f in &module.functions {
        bases.insert(f.label.as_str(), code.len() as u32);
        code.extend_from_slice(f.code.code());
    }

    let mut data_fixups = Vec::new();
    for f in &module.functions {
        let base = bases[f.label.as_str()];
        for df in f.code.data_fixups() {
            data_fixups.push(DataFixUp { patch_offset: base + df.patch_offset, rva: df.rva, kind: df.kind });
        }
    }

    for f in &module.functions {
        let base = bases[f.label.as_str()];
        for fixup in f.code.fixups() {
            let target_offset = resolve_target(f, &fixup.target, &bases)?;
            let patch_at = base + fixup.patch_offset;
            let from = patch_at as i64 + 4;
            let disp = target_offset as i64 - from;
            if disp < i32::MIN as i64 || disp > i32::MAX as i64 {
                return Err(EmitError::OffsetOverflow { context: format!("branch/call to `{}`", fixup.target) });
            }
            let bytes = (disp as i32).to_le_bytes();
            code[patch_at as usize..patch_at as usize + 4].copy_from_slice(&bytes);
        }
    }

    let entry_offset = *bases
        .get("_start")
        .ok_or_else(|| EmitError::internal("_start was never emitted by compile_program"))?;

    Ok(LinkedModule { code, data_fixups, entry_offset })
}

/// A fix-up target is either a label this function bound internally (a
/// loop/branch join, resolved relative to the function's own base) or
/// another function's entry label (resolved relative to that function's
/// base).
fn resolve_target(
    f: &crate::program::CompiledFunction,
    target: &str,
    bases: &FxHashMap<&str, u32>,
) -> EmitResult<u32> {
    let own_base = bases[f.label.as_str()];
    if let Some(Some(local_offset)) = f.code.labels().get(target) {
        return Ok(own_base + local_offset);
    }
    if let Some(&other_base) = bases.get(target) {
        return Ok(other_base);
    }
    Err(EmitError::internal(format!("label `{target}` was never bound in `{}` or at the module level", f.label)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::InstrBuffer;
    use crate::program::CompiledFunction;

    #[test]
    fn a_call_to_another_functions_label_resolves_across_buffers() {
        let mut callee = InstrBuffer::new();
        callee.bind_label("callee");
        callee.push_u8(0xC3); // ret

        let mut caller = InstrBuffer::new();
        caller.bind_label("caller");
        caller.push_u8(0xE8); // call rel32
        caller.emit_rel32_fixup("callee");
        caller.push_u8(0xC3);

        let module = CompiledModule {
            functions: vec![
                CompiledFunction { label: "_start".to_string(), code: InstrBuffer::new() },
                CompiledFunction { label: "caller".to_string(), code: caller },
                CompiledFunction { label: "callee".to_string(), code: callee },
            ],
            runtime_usage: Default::default(),
        };

        let linked = link(&module).unwrap();
        // `_start` is empty, so `caller` starts at 0: [0xE8, disp*4, 0xC3],
        // then `callee` starts at byte 6: [0xC3]. The displacement is
        // measured from byte 5 (end of the 4-byte immediate) to byte 6.
        assert_eq!(linked.code.len(), 7);
        let disp = i32::from_le_bytes(linked.code[1..5].try_into().unwrap());
        assert_eq!(disp, 1);
    }

    #[test]
    fn missing_start_label_is_an_internal_error() {
        let module = CompiledModule { functions: vec![], runtime_usage: Default::default() };
        assert!(link(&module).is_err());
    }
}
