//! Record layout computation and RTTI (§3 Record type descriptor, §6 Record
//! layout).
//!
//! Layout is `[type_id(8)][field0][field1]...` with natural alignment per
//! field type and end-padding to 8 bytes (§6). Bit-fields share an 8-byte
//! word by position; reads/writes mask and shift.

use rustc_hash::FxHashMap;

use crate::ast::{FieldDecl, RecordDecl, Type};

fn field_size(ty: &Type) -> u32 {
    match ty {
        Type::Bool => 1,
        Type::I64 | Type::F64 => 8,
        // Everything heap-allocated (lists, records, closures, maps, trait
        // objects, strings) is a single pointer-sized field.
        _ => 8,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldLayout {
    pub offset: u32,
    pub size: u32,
    pub bit_width: Option<u8>,
    pub bit_shift: u8,
}

pub struct RecordLayout {
    pub type_id: u32,
    pub fields: FxHashMap<String, FieldLayout>,
    pub total_size: u32,
    offsets_computed: bool,
}

impl RecordLayout {
    /// Lazily computes field offsets the first time they're needed,
    /// matching the `offsets_computed` flag in §3.
    fn compute(decl: &RecordDecl, type_id: u32) -> Self {
        let mut fields = FxHashMap::default();
        let mut offset: u32 = 8; // type_id header
        let mut bit_cursor: Option<(u32, u8)> = None; // (word offset, next free bit)

        for FieldDecl { name, ty, bit_width } in &decl.fields {
            if let Some(width) = bit_width {
                let (word_offset, shift) = match bit_cursor {
                    Some((word_offset, shift)) if shift + width <= 64 => (word_offset, shift),
                    _ => {
                        let word_offset = offset;
                        offset += 8;
                        (word_offset, 0)
                    }
                };
                fields.insert(
                    name.clone(),
                    FieldLayout { offset: word_offset, size: 8, bit_width: Some(*width), bit_shift: shift },
                );
                bit_cursor = Some((word_offset, shift + width));
                continue;
            }
            bit_cursor = None;
            let size = field_size(ty);
            // Natural alignment: round the cursor up to the field's size.
            offset = align_up(offset, size);
            fields.insert(name.clone(), FieldLayout { offset, size, bit_width: None, bit_shift: 0 });
            offset += size;
        }

        let total_size = align_up(offset, 8);
        Self { type_id, fields, total_size, offsets_computed: true }
    }

    pub fn field(&self, name: &str) -> Option<FieldLayout> {
        self.fields.get(name).copied()
    }
}

fn align_up(n: u32, align: u32) -> u32 {
    if align == 0 {
        return n;
    }
    (n + align - 1) / align * align
}

/// All record types in a program, each with a monotonic type-id used by
/// `x is T` checks (§3).
pub struct RecordTable {
    layouts: FxHashMap<String, RecordLayout>,
}

impl RecordTable {
    pub fn build(records: &[RecordDecl]) -> Self {
        let mut layouts = FxHashMap::default();
        for (idx, decl) in records.iter().enumerate() {
            layouts.insert(decl.name.clone(), RecordLayout::compute(decl, idx as u32 + 1));
        }
        Self { layouts }
    }

    pub fn get(&self, name: &str) -> Option<&RecordLayout> {
        self.layouts.get(name)
    }

    pub fn type_id(&self, name: &str) -> Option<u32> {
        self.layouts.get(name).map(|l| l.type_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, ty: Type) -> FieldDecl {
        FieldDecl { name: name.to_string(), ty, bit_width: None }
    }

    #[test]
    fn fields_get_distinct_type_ids_per_record() {
        let records = vec![
            RecordDecl { name: "A".into(), fields: vec![] },
            RecordDecl { name: "B".into(), fields: vec![] },
        ];
        let table = RecordTable::build(&records);
        assert_ne!(table.type_id("A"), table.type_id("B"));
    }

    #[test]
    fn bool_field_is_naturally_aligned_after_type_id() {
        let records = vec![RecordDecl {
            name: "Point".into(),
            fields: vec![field("flag", Type::Bool), field("x", Type::I64)],
        }];
        let table = RecordTable::build(&records);
        let layout = table.get("Point").unwrap();
        assert_eq!(layout.field("flag").unwrap().offset, 8);
        // `x` is 8-byte aligned, so it must round past the 1-byte `flag`.
        assert_eq!(layout.field("x").unwrap().offset, 16);
    }

    #[test]
    fn bitfields_pack_into_a_shared_word() {
        let records = vec![RecordDecl {
            name: "Flags".into(),
            fields: vec![
                FieldDecl { name: "a".into(), ty: Type::I64, bit_width: Some(4) },
                FieldDecl { name: "b".into(), ty: Type::I64, bit_width: Some(4) },
            ],
        }];
        let table = RecordTable::build(&records);
        let layout = table.get("Flags").unwrap();
        let a = layout.field("a").unwrap();
        let b = layout.field("b").unwrap();
        assert_eq!(a.offset, b.offset);
        assert_eq!(b.bit_shift, 4);
    }
}
