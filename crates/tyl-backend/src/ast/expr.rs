//! Expression AST nodes.

use super::span::Span;
use super::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CompoundOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Who a call expression resolves to, as determined by the (external) type
/// checker. The call-site lowerer (`crate::lower::call`) switches on this
/// directly instead of re-deriving it from the callee expression.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CalleeKind {
    /// A direct reference to a known top-level function label.
    Direct(String),
    /// A reference to an `extern` function resolved through the PE import
    /// table.
    Extern(String),
    /// A local variable holding a closure value, named so the lowerer can
    /// reload the heap pointer at the call site (§4.6).
    Closure(String),
    /// `obj.method(...)` where `obj`'s static type has a matching impl.
    Method { type_name: String, method: String },
    /// `obj.method(...)` where `obj`'s type is a trait object; dispatches
    /// through the vtable.
    TraitMethod { trait_name: String, method: String, index: u32 },
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Type, span: Span) -> Self {
        Self { kind, ty, span }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum ExprKind {
    IntLit(i64),
    FloatLit(f64),
    StrLit(String),
    BoolLit(bool),
    NullLit,
    Ident(String),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    CompoundAssign {
        op: CompoundOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Call {
        callee: CalleeKind,
        args: Vec<Expr>,
    },
    /// String concatenation recognized so `print` can expand it into a
    /// sequence of per-part prints (§4.4 Builtins).
    Concat(Vec<Expr>),
    ListLit(Vec<Expr>),
    Range {
        start: Box<Expr>,
        end: Box<Expr>,
        inclusive: bool,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    FieldAccess {
        object: Box<Expr>,
        field: String,
    },
    RecordLit {
        type_name: String,
        fields: Vec<(String, Expr)>,
    },
    Closure {
        params: Vec<String>,
        captures: Vec<String>,
        body: Box<super::stmt::Block>,
    },
    IsType {
        value: Box<Expr>,
        type_name: String,
    },
    Builtin {
        name: String,
        args: Vec<Expr>,
    },
    /// `&v` — the address of a register- or stack-resident local (§3
    /// Register assignment invariant). Typed `I64`, the same opaque
    /// address-sized word every heap pointer in this language uses.
    AddressOf(Box<Expr>),
}

/// Attempts a compile-time constant fold of an integer-valued expression.
/// Mirrors `tryEvalConstant` in `codegen_expr_list.cpp`: used by the list,
/// range, and strength-reduction lowering to decide between a fully
/// compile-time path and a runtime loop.
pub fn try_eval_const_int(expr: &Expr) -> Option<i64> {
    match &expr.kind {
        ExprKind::IntLit(v) => Some(*v),
        ExprKind::Unary { op: UnaryOp::Neg, operand } => try_eval_const_int(operand).map(|v| -v),
        ExprKind::Binary { op, left, right } => {
            let l = try_eval_const_int(left)?;
            let r = try_eval_const_int(right)?;
            match op {
                BinaryOp::Add => Some(l.wrapping_add(r)),
                BinaryOp::Sub => Some(l.wrapping_sub(r)),
                BinaryOp::Mul => Some(l.wrapping_mul(r)),
                BinaryOp::Div if r != 0 => Some(l.wrapping_div(r)),
                BinaryOp::Mod if r != 0 => Some(l.wrapping_rem(r)),
                _ => None,
            }
        }
        _ => None,
    }
}

pub fn try_eval_const_str(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::StrLit(s) => Some(s.clone()),
        _ => None,
    }
}
