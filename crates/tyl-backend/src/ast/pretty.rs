//! Pretty-printing for the post-optimizer AST, used by `--emit-ir` (§10.3).
//!
//! There's no separate IR in this backend — the optimizer mutates the AST in
//! place and the lowerer walks it directly — so unlike `raya-compiler::ir`,
//! this prints the tree itself rather than a flattened instruction list.

use std::fmt::Write;

use super::expr::{BinaryOp, CalleeKind, CompoundOp, Expr, ExprKind, LogicalOp, UnaryOp};
use super::item::{Function, Program};
use super::stmt::{Block, ForIter, Pattern, Stmt, StmtKind};

pub trait PrettyPrint {
    fn pretty_print(&self) -> String;
}

impl PrettyPrint for Program {
    fn pretty_print(&self) -> String {
        let mut out = String::new();
        for record in &self.records {
            writeln!(out, "; record {}", record.name).unwrap();
        }
        if !self.records.is_empty() {
            writeln!(out).unwrap();
        }

        for global in &self.globals {
            writeln!(out, "global {}: {} = {}", global.name, global.ty, format_expr(&global.initializer)).unwrap();
        }
        if !self.globals.is_empty() {
            writeln!(out).unwrap();
        }

        for func in &self.functions {
            out.push_str(&func.pretty_print());
            writeln!(out).unwrap();
        }

        writeln!(out, "fn _start() {{").unwrap();
        out.push_str(&format_block_indented(&self.top_level, 2));
        writeln!(out, "}}").unwrap();
        out
    }
}

impl PrettyPrint for Function {
    fn pretty_print(&self) -> String {
        let mut out = String::new();
        let params: Vec<String> = self.params.iter().map(|p| format!("{}: {}", p.name, p.ty)).collect();
        writeln!(out, "fn {}({}) -> {} {{", self.name, params.join(", "), self.return_ty).unwrap();
        out.push_str(&format_block_indented(&self.body, 2));
        writeln!(out, "}}").unwrap();
        out
    }
}

fn format_block_indented(block: &Block, indent: usize) -> String {
    let mut out = String::new();
    let prefix = " ".repeat(indent);
    for stmt in &block.statements {
        format_stmt_indented(stmt, indent, &prefix, &mut out);
    }
    out
}

fn format_stmt_indented(stmt: &Stmt, indent: usize, prefix: &str, out: &mut String) {
    match &stmt.kind {
        StmtKind::VarDecl(decl) => {
            let init = decl.initializer.as_ref().map(format_expr).unwrap_or_default();
            writeln!(out, "{prefix}let {}: {} = {}", format_pattern(&decl.pattern), decl.ty, init).unwrap();
        }
        StmtKind::Expression(expr) => writeln!(out, "{prefix}{}", format_expr(expr)).unwrap(),
        StmtKind::Block(inner) => {
            writeln!(out, "{prefix}{{").unwrap();
            out.push_str(&format_block_indented(inner, indent + 2));
            writeln!(out, "{prefix}}}").unwrap();
        }
        StmtKind::Return(expr) => match expr {
            Some(e) => writeln!(out, "{prefix}return {}", format_expr(e)).unwrap(),
            None => writeln!(out, "{prefix}return").unwrap(),
        },
        StmtKind::Break(label) => writeln!(out, "{prefix}break{}", label_suffix(label)).unwrap(),
        StmtKind::Continue(label) => writeln!(out, "{prefix}continue{}", label_suffix(label)).unwrap(),
        StmtKind::If { cond, then_branch, else_branch } => {
            writeln!(out, "{prefix}if {} {{", format_expr(cond)).unwrap();
            out.push_str(&format_block_indented(then_branch, indent + 2));
            match else_branch {
                Some(else_stmt) => {
                    writeln!(out, "{prefix}}} else {{").unwrap();
                    format_stmt_indented(else_stmt, indent + 2, &" ".repeat(indent + 2), out);
                    writeln!(out, "{prefix}}}").unwrap();
                }
                None => writeln!(out, "{prefix}}}").unwrap(),
            }
        }
        StmtKind::While { cond, body, label } => {
            writeln!(out, "{prefix}while{} {} {{", label_suffix(label), format_expr(cond)).unwrap();
            out.push_str(&format_block_indented(body, indent + 2));
            writeln!(out, "{prefix}}}").unwrap();
        }
        StmtKind::For { var, iter, body, label } => {
            writeln!(out, "{prefix}for{} {} in {} {{", label_suffix(label), var, format_iter(iter)).unwrap();
            out.push_str(&format_block_indented(body, indent + 2));
            writeln!(out, "{prefix}}}").unwrap();
        }
        StmtKind::Match { scrutinee, arms } => {
            writeln!(out, "{prefix}match {} {{", format_expr(scrutinee)).unwrap();
            for arm in arms {
                writeln!(out, "{prefix}  {} => {{", format_pattern(&arm.pattern)).unwrap();
                out.push_str(&format_block_indented(&arm.body, indent + 4));
                writeln!(out, "{prefix}  }}").unwrap();
            }
            writeln!(out, "{prefix}}}").unwrap();
        }
    }
}

fn label_suffix(label: &Option<String>) -> String {
    label.as_ref().map(|l| format!(" '{l}")).unwrap_or_default()
}

fn format_iter(iter: &ForIter) -> String {
    match iter {
        ForIter::InclusiveRange { start, end } => format!("{}..={}", format_expr(start), format_expr(end)),
        ForIter::ExclusiveRange { start, end, step: None } => format!("{}..{}", format_expr(start), format_expr(end)),
        ForIter::ExclusiveRange { start, end, step: Some(step) } => {
            format!("{}..{} step {}", format_expr(start), format_expr(end), format_expr(step))
        }
        ForIter::List(expr) => format_expr(expr),
    }
}

fn format_pattern(pattern: &Pattern) -> String {
    match pattern {
        Pattern::Identifier(name) => name.clone(),
        Pattern::Wildcard => "_".to_string(),
        Pattern::Literal(expr) => format_expr(expr),
        Pattern::List(items) => format!("[{}]", items.iter().map(format_pattern).collect::<Vec<_>>().join(", ")),
        Pattern::Tuple(items) => format!("({})", items.iter().map(format_pattern).collect::<Vec<_>>().join(", ")),
        Pattern::Record { type_name, fields } => {
            let fields: Vec<String> = fields.iter().map(|(name, p)| format!("{name}: {}", format_pattern(p))).collect();
            format!("{type_name} {{ {} }}", fields.join(", "))
        }
    }
}

fn format_expr(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::IntLit(v) => v.to_string(),
        ExprKind::FloatLit(v) => v.to_string(),
        ExprKind::StrLit(s) => format!("{s:?}"),
        ExprKind::BoolLit(b) => b.to_string(),
        ExprKind::NullLit => "null".to_string(),
        ExprKind::Ident(name) => name.clone(),
        ExprKind::Binary { op, left, right } => {
            format!("({} {} {})", format_expr(left), binary_op(*op), format_expr(right))
        }
        ExprKind::Logical { op, left, right } => {
            let sym = match op {
                LogicalOp::And => "&&",
                LogicalOp::Or => "||",
            };
            format!("({} {} {})", format_expr(left), sym, format_expr(right))
        }
        ExprKind::Unary { op, operand } => {
            let sym = match op {
                UnaryOp::Neg => "-",
                UnaryOp::Not => "!",
            };
            format!("{sym}{}", format_expr(operand))
        }
        ExprKind::Assign { target, value } => format!("{} = {}", format_expr(target), format_expr(value)),
        ExprKind::CompoundAssign { op, target, value } => {
            let sym = match op {
                CompoundOp::Add => "+=",
                CompoundOp::Sub => "-=",
                CompoundOp::Mul => "*=",
                CompoundOp::Div => "/=",
            };
            format!("{} {sym} {}", format_expr(target), format_expr(value))
        }
        ExprKind::Call { callee, args } => {
            let args: Vec<String> = args.iter().map(format_expr).collect();
            format!("{}({})", callee_name(callee), args.join(", "))
        }
        ExprKind::Concat(parts) => parts.iter().map(format_expr).collect::<Vec<_>>().join(" ++ "),
        ExprKind::ListLit(items) => format!("[{}]", items.iter().map(format_expr).collect::<Vec<_>>().join(", ")),
        ExprKind::Range { start, end, inclusive } => {
            format!("{}..{}{}", format_expr(start), if *inclusive { "=" } else { "" }, format_expr(end))
        }
        ExprKind::Index { base, index } => format!("{}[{}]", format_expr(base), format_expr(index)),
        ExprKind::FieldAccess { object, field } => format!("{}.{field}", format_expr(object)),
        ExprKind::RecordLit { type_name, fields } => {
            let fields: Vec<String> = fields.iter().map(|(name, e)| format!("{name}: {}", format_expr(e))).collect();
            format!("{type_name} {{ {} }}", fields.join(", "))
        }
        ExprKind::Closure { params, captures, body } => {
            let _ = body;
            format!("|{}| [captures: {}]", params.join(", "), captures.join(", "))
        }
        ExprKind::IsType { value, type_name } => format!("{} is {type_name}", format_expr(value)),
        ExprKind::Builtin { name, args } => {
            let args: Vec<String> = args.iter().map(format_expr).collect();
            format!("@{name}({})", args.join(", "))
        }
        ExprKind::AddressOf(operand) => format!("&{}", format_expr(operand)),
    }
}

fn callee_name(callee: &CalleeKind) -> String {
    match callee {
        CalleeKind::Direct(name) => name.clone(),
        CalleeKind::Extern(name) => format!("extern {name}"),
        CalleeKind::Closure(name) => format!("(closure){name}"),
        CalleeKind::Method { type_name, method } => format!("{type_name}.{method}"),
        CalleeKind::TraitMethod { trait_name, method, index } => format!("{trait_name}.{method}#{index}"),
    }
}

fn binary_op(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    #[test]
    fn a_function_prints_its_signature_and_body() {
        let f = function("add", vec![("a", crate::ast::Type::I64), ("b", crate::ast::Type::I64)], crate::ast::Type::I64, block(vec![return_stmt(Some(binary(crate::ast::BinaryOp::Add, ident("a"), ident("b"))))]));
        let out = f.pretty_print();
        assert!(out.contains("fn add(a: i64, b: i64) -> i64"));
        assert!(out.contains("return (a + b)"));
    }

    #[test]
    fn an_if_with_no_else_omits_the_else_block() {
        let program = Program {
            top_level: block(vec![if_stmt(bool_lit(true), block(vec![return_stmt(None)]), None)]),
            ..Default::default()
        };
        let out = program.pretty_print();
        assert!(out.contains("if true {"));
        assert!(!out.contains("else"));
    }
}
