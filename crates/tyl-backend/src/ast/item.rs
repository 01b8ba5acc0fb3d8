//! Top-level AST items: functions, records, traits, impls, and the program.

use super::stmt::Block;
use super::types::Type;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub return_ty: Type,
    pub body: Block,
    pub generic_params: Vec<String>,
    pub is_extern: bool,
}

impl Function {
    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }

    pub fn is_leaf(&self) -> bool {
        !super::walk::body_contains_call(&self.body)
    }
}

/// A record (struct) field. `bit_width` is `Some` for bit-field members that
/// pack into the shared 8-byte word described in §6.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub ty: Type,
    pub bit_width: Option<u8>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RecordDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TraitDecl {
    pub name: String,
    /// Method names in declaration order — this order *is* the vtable slot
    /// order (§4.6).
    pub methods: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ImplBlock {
    pub type_name: String,
    pub trait_name: Option<String>,
    pub methods: Vec<Function>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GlobalVar {
    pub name: String,
    pub ty: Type,
    pub initializer: super::expr::Expr,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Program {
    pub functions: Vec<Function>,
    pub records: Vec<RecordDecl>,
    pub traits: Vec<TraitDecl>,
    pub impls: Vec<ImplBlock>,
    pub globals: Vec<GlobalVar>,
    /// Top-level statements outside any function; emitted as the body of
    /// `_start` (§2 data flow).
    pub top_level: Block,
}
