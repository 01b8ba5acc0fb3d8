//! AST construction helpers shared by unit and end-to-end tests. No parser
//! is in scope, so every test builds its input tree by hand (mirrors
//! `raya-compiler`'s `codegen::tests::make_reg` pattern, generalized).

#![cfg(test)]

use crate::ast::*;

pub fn span() -> Span {
    Span::dummy()
}

pub fn int_lit(v: i64) -> Expr {
    Expr::new(ExprKind::IntLit(v), Type::I64, span())
}

pub fn float_lit(v: f64) -> Expr {
    Expr::new(ExprKind::FloatLit(v), Type::F64, span())
}

pub fn str_lit(s: &str) -> Expr {
    Expr::new(ExprKind::StrLit(s.to_string()), Type::Str, span())
}

pub fn bool_lit(v: bool) -> Expr {
    Expr::new(ExprKind::BoolLit(v), Type::Bool, span())
}

pub fn ident(name: &str) -> Expr {
    Expr::new(ExprKind::Ident(name.to_string()), Type::I64, span())
}

pub fn ident_ty(name: &str, ty: Type) -> Expr {
    Expr::new(ExprKind::Ident(name.to_string()), ty, span())
}

pub fn binary(op: BinaryOp, l: Expr, r: Expr) -> Expr {
    Expr::new(
        ExprKind::Binary { op, left: Box::new(l), right: Box::new(r) },
        Type::I64,
        span(),
    )
}

pub fn logical(op: LogicalOp, l: Expr, r: Expr) -> Expr {
    Expr::new(
        ExprKind::Logical { op, left: Box::new(l), right: Box::new(r) },
        Type::Bool,
        span(),
    )
}

pub fn unary(op: UnaryOp, e: Expr) -> Expr {
    Expr::new(ExprKind::Unary { op, operand: Box::new(e) }, Type::I64, span())
}

pub fn assign(target: Expr, value: Expr) -> Expr {
    Expr::new(
        ExprKind::Assign { target: Box::new(target), value: Box::new(value) },
        Type::I64,
        span(),
    )
}

pub fn compound_assign(op: CompoundOp, target: Expr, value: Expr) -> Expr {
    Expr::new(
        ExprKind::CompoundAssign { op, target: Box::new(target), value: Box::new(value) },
        Type::I64,
        span(),
    )
}

pub fn call_direct(name: &str, args: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::Call { callee: CalleeKind::Direct(name.to_string()), args }, Type::I64, span())
}

pub fn builtin(name: &str, args: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::Builtin { name: name.to_string(), args }, Type::Unit, span())
}

pub fn list_lit(elems: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::ListLit(elems), Type::List(Box::new(Type::I64)), span())
}

pub fn range(start: Expr, end: Expr, inclusive: bool) -> Expr {
    Expr::new(
        ExprKind::Range { start: Box::new(start), end: Box::new(end), inclusive },
        Type::List(Box::new(Type::I64)),
        span(),
    )
}

pub fn index(base: Expr, idx: Expr) -> Expr {
    Expr::new(ExprKind::Index { base: Box::new(base), index: Box::new(idx) }, Type::I64, span())
}

pub fn stmt(kind: StmtKind) -> Stmt {
    Stmt { kind, span: span() }
}

pub fn var_decl(name: &str, init: Expr) -> Stmt {
    stmt(StmtKind::VarDecl(VarDecl {
        pattern: Pattern::Identifier(name.to_string()),
        ty: init.ty.clone(),
        initializer: Some(init),
    }))
}

pub fn expr_stmt(e: Expr) -> Stmt {
    stmt(StmtKind::Expression(e))
}

pub fn return_stmt(e: Option<Expr>) -> Stmt {
    stmt(StmtKind::Return(e))
}

pub fn break_stmt() -> Stmt {
    stmt(StmtKind::Break(None))
}

pub fn continue_stmt() -> Stmt {
    stmt(StmtKind::Continue(None))
}

pub fn if_stmt(cond: Expr, then_branch: Block, else_branch: Option<Stmt>) -> Stmt {
    stmt(StmtKind::If { cond, then_branch, else_branch: else_branch.map(Box::new) })
}

pub fn while_stmt(cond: Expr, body: Block) -> Stmt {
    stmt(StmtKind::While { cond, body, label: None })
}

pub fn for_inclusive(var: &str, start: Expr, end: Expr, body: Block) -> Stmt {
    stmt(StmtKind::For {
        var: var.to_string(),
        iter: ForIter::InclusiveRange { start, end },
        body,
        label: None,
    })
}

pub fn for_exclusive(var: &str, start: Expr, end: Expr, body: Block) -> Stmt {
    stmt(StmtKind::For {
        var: var.to_string(),
        iter: ForIter::ExclusiveRange { start, end, step: None },
        body,
        label: None,
    })
}

pub fn block(statements: Vec<Stmt>) -> Block {
    Block { statements }
}

pub fn function(name: &str, params: Vec<(&str, Type)>, ret: Type, body: Block) -> Function {
    Function {
        name: name.to_string(),
        params: params.into_iter().map(|(n, ty)| Param { name: n.to_string(), ty }).collect(),
        return_ty: ret,
        body,
        generic_params: Vec::new(),
        is_extern: false,
    }
}

pub fn program_with_main(body: Block) -> Program {
    Program {
        functions: vec![function("main", vec![], Type::I64, body)],
        ..Default::default()
    }
}
