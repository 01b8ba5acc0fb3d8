//! End-to-end test harness: hand-built AST in, linked machine code out.
//!
//! There's no parser in scope, so every scenario builds its checked tree
//! directly with the helpers below (duplicated from `src/testutil.rs`,
//! which is `#[cfg(test)]`-gated and invisible from here). The pipeline
//! mirrors `crate::program::compile_program`'s real data flow: optimize,
//! monomorphize (trivially, no generics in these scenarios), lower, link.

use tyl_backend::ast::*;
use tyl_backend::link::{self, LinkedModule};
use tyl_backend::monomorphize::MonomorphizedProgram;
use tyl_backend::record::RecordTable;
use tyl_backend::typetab::TypeTable;
use tyl_backend::{compile_program, CompiledModule, OptLevel, Pipeline};

pub fn span() -> Span {
    Span::dummy()
}

pub fn int_lit(v: i64) -> Expr {
    Expr::new(ExprKind::IntLit(v), Type::I64, span())
}

pub fn float_lit(v: f64) -> Expr {
    Expr::new(ExprKind::FloatLit(v), Type::F64, span())
}

pub fn ident(name: &str) -> Expr {
    Expr::new(ExprKind::Ident(name.to_string()), Type::I64, span())
}

pub fn binary(op: BinaryOp, l: Expr, r: Expr) -> Expr {
    Expr::new(ExprKind::Binary { op, left: Box::new(l), right: Box::new(r) }, Type::I64, span())
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

pub fn call_closure(name: &str, args: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::Call { callee: CalleeKind::Closure(name.to_string()), args }, Type::I64, span())
}

pub fn builtin(name: &str, args: Vec<Expr>) -> Expr {
    Expr::new(ExprKind::Builtin { name: name.to_string(), args }, Type::Unit, span())
}

pub fn address_of(operand: Expr) -> Expr {
    Expr::new(ExprKind::AddressOf(Box::new(operand)), Type::I64, span())
}

pub fn closure_lit(params: Vec<&str>, captures: Vec<&str>, body: Block) -> Expr {
    Expr::new(
        ExprKind::Closure {
            params: params.into_iter().map(str::to_string).collect(),
            captures: captures.into_iter().map(str::to_string).collect(),
            body: Box::new(body),
        },
        Type::I64,
        span(),
    )
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

pub fn if_stmt(cond: Expr, then_branch: Block, else_branch: Option<Stmt>) -> Stmt {
    stmt(StmtKind::If { cond, then_branch, else_branch: else_branch.map(Box::new) })
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

/// Runs the optimizer at `level`, then lowers and links the whole program,
/// returning the finished byte buffer plus the pre-link module (so tests
/// can additionally assert on which labels survived tree-shaking).
pub fn build(mut program: Program, level: OptLevel) -> (CompiledModule, LinkedModule) {
    Pipeline::new(level).run(&mut program);

    let types = TypeTable::new();
    let records = RecordTable::build(&program.records);
    let monomorphized = MonomorphizedProgram::from_checked(program, vec![]);

    let module = compile_program(&monomorphized, &types, &records).expect("compile_program failed");
    let linked = link::link(&module).expect("link failed");
    (module, linked)
}

pub fn program_with_main(body: Block) -> Program {
    Program { functions: vec![function("main", vec![], Type::I64, body)], ..Default::default() }
}
