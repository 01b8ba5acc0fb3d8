//! Statement AST nodes.

use super::expr::Expr;
use super::span::Span;
use super::types::Type;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Pattern {
    Identifier(String),
    Wildcard,
    Literal(Expr),
    List(Vec<Pattern>),
    Tuple(Vec<Pattern>),
    Record { type_name: String, fields: Vec<(String, Pattern)> },
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VarDecl {
    pub pattern: Pattern,
    pub ty: Type,
    pub initializer: Option<Expr>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub body: Block,
}

/// The canonical loop form is `for i in a..b` (inclusive, `JG`-terminated) or
/// `for i in range(a, b[, step])` (exclusive, `JGE`-terminated) — §4.5.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum ForIter {
    InclusiveRange { start: Expr, end: Expr },
    ExclusiveRange { start: Expr, end: Expr, step: Option<Expr> },
    List(Expr),
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum StmtKind {
    VarDecl(VarDecl),
    Expression(Expr),
    Block(Block),
    Return(Option<Expr>),
    Break(Option<String>),
    Continue(Option<String>),
    If {
        cond: Expr,
        then_branch: Block,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Block,
        label: Option<String>,
    },
    For {
        var: String,
        iter: ForIter,
        body: Block,
        label: Option<String>,
    },
    Match {
        scrutinee: Expr,
        arms: Vec<MatchArm>,
    },
}

impl Stmt {
    /// A statement ends its enclosing block in a terminator iff control never
    /// falls through it. Used by the if/elif/else lowering (§4.5) to decide
    /// whether the jump-to-end after a branch can be elided.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::Return(_) | StmtKind::Break(_) | StmtKind::Continue(_)
        )
    }
}

impl Block {
    pub fn ends_in_terminator(&self) -> bool {
        self.statements.last().is_some_and(|s| s.is_terminator())
    }
}
