//! PE writer boundary (§3, §6). The actual COFF/PE image assembly —
//! section table, optional header, import/export directories, the
//! `.reloc` table — lives in an external collaborator crate. This module
//! only defines the interface that crosses the boundary and a minimal
//! in-memory test double used by this crate's own tests and by
//! `tests/e2e`.

use rustc_hash::FxHashMap;

use crate::error::EmitResult;
use crate::instr::DataFixUpKind;
use crate::link::LinkedModule;

/// One entry the PE writer needs to place in the import directory (§6).
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub dll: String,
    pub symbol: String,
}

/// One entry the PE writer needs to place in the export directory, for
/// `--dll` output (§6 Non-goals still allow building DLLs; only a
/// hand-written linker is out of scope).
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub symbol: String,
    pub ordinal: u16,
}

/// Data the lowerer asked to be embedded in `.rdata` — string literals,
/// float constants, vtables — each tagged with the [`DataFixUpKind`] that
/// explains how the code referencing it should be patched.
#[derive(Debug, Clone)]
pub struct DataRequest {
    pub kind: DataFixUpKind,
    pub bytes: Vec<u8>,
}

pub trait PeWriter {
    /// Registers a block of code under `label`, to be placed in `.text`.
    /// Returns the RVA it was ultimately assigned, once known.
    fn place_code(&mut self, label: &str, bytes: &[u8]) -> u32;

    /// Registers a data blob, returning its RVA.
    fn place_data(&mut self, request: DataRequest) -> u32;

    fn request_import(&mut self, request: ImportRequest) -> u32;

    fn request_export(&mut self, request: ExportRequest);

    /// Serializes the final image once every section is placed.
    fn finish(self) -> EmitResult<Vec<u8>>;
}

/// An in-memory double used by unit/e2e tests: no real PE structure, just
/// enough bookkeeping to assert on emission order and byte content without
/// a real linker.
#[derive(Default)]
pub struct TestPeWriter {
    pub code_sections: Vec<(String, Vec<u8>)>,
    pub data: Vec<DataRequest>,
    pub imports: Vec<ImportRequest>,
    pub exports: Vec<ExportRequest>,
    next_rva: u32,
    rvas: FxHashMap<String, u32>,
}

impl TestPeWriter {
    pub fn new() -> Self {
        Self { next_rva: 0x1000, ..Default::default() }
    }
}

impl PeWriter for TestPeWriter {
    fn place_code(&mut self, label: &str, bytes: &[u8]) -> u32 {
        let rva = self.next_rva;
        self.next_rva += bytes.len() as u32;
        self.rvas.insert(label.to_string(), rva);
        self.code_sections.push((label.to_string(), bytes.to_vec()));
        rva
    }

    fn place_data(&mut self, request: DataRequest) -> u32 {
        let rva = self.next_rva;
        self.next_rva += request.bytes.len() as u32;
        self.data.push(request);
        rva
    }

    fn request_import(&mut self, request: ImportRequest) -> u32 {
        let slot = self.imports.len() as u32;
        self.imports.push(request);
        slot
    }

    fn request_export(&mut self, request: ExportRequest) {
        self.exports.push(request);
    }

    fn finish(self) -> EmitResult<Vec<u8>> {
        Ok(self.code_sections.into_iter().flat_map(|(_, bytes)| bytes).collect())
    }
}

/// Places a whole [`LinkedModule`]'s already-relocated code into a
/// [`PeWriter`] as a single `.text` blob, plus one import request per data
/// fix-up's still-unresolved RVA — patching those addresses in is the
/// writer's job, since only it knows final section placement.
pub fn place_module(writer: &mut impl PeWriter, linked: &LinkedModule) -> EmitResult<u32> {
    let rva = writer.place_code("$module", &linked.code);
    for df in &linked.data_fixups {
        writer.place_data(DataRequest { kind: df.kind, bytes: Vec::new() });
    }
    Ok(rva + linked.entry_offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::InstrBuffer;
    use crate::program::{CompiledFunction, CompiledModule};

    #[test]
    fn placing_a_linked_module_returns_its_entry_rva() {
        let mut writer = TestPeWriter::new();
        let module = CompiledModule {
            functions: vec![CompiledFunction { label: "_start".into(), code: InstrBuffer::new() }],
            runtime_usage: Default::default(),
        };
        let linked = crate::link::link(&module).unwrap();
        let entry_rva = place_module(&mut writer, &linked).unwrap();
        assert_eq!(entry_rva, 0x1000);
        assert_eq!(writer.code_sections.len(), 1);
    }
}
