//! Whole-pipeline optimizer scenarios: run every pass to its fixed point
//! (not just the one pass a unit test exercises) and check the AST shape
//! that's left, since that's what the lowerer actually sees.

use tyl_backend::ast::*;
use tyl_backend::{OptLevel, Pipeline};

use super::*;

#[test]
fn summing_a_loop_variable_over_a_constant_range_folds_to_4950() {
    // fn main() -> i64 { var s = 0; for i in 0..100 { s += i; } return s; }
    let mut program = program_with_main(block(vec![
        var_decl("s", int_lit(0)),
        for_exclusive(
            "i",
            int_lit(0),
            int_lit(100),
            block(vec![expr_stmt(compound_assign(CompoundOp::Add, ident("s"), ident("i")))]),
        ),
        return_stmt(Some(ident("s"))),
    ]));

    Pipeline::new(OptLevel::O2).run(&mut program);

    let main = program.functions.iter().find(|f| f.name == "main").unwrap();
    let StmtKind::Expression(e) = &main.body.statements[1].kind else {
        panic!("expected the for loop to reduce to a single expression statement, got {:?}", main.body.statements[1].kind)
    };
    let ExprKind::CompoundAssign { value, .. } = &e.kind else { panic!("expected a compound assign") };
    assert_eq!(try_eval_const_int(value), Some(4950));
}

#[test]
fn nested_ifs_over_a_known_value_collapse_to_a_single_return() {
    // fn main() -> i64 {
    //     var x = 10;
    //     if x < 20 {
    //         if x < 100 { return 1; } else { return 2; }
    //     } else {
    //         return 3;
    //     }
    // }
    let mut program = program_with_main(block(vec![
        var_decl("x", int_lit(10)),
        if_stmt(
            binary(BinaryOp::Lt, ident("x"), int_lit(20)),
            block(vec![if_stmt(
                binary(BinaryOp::Lt, ident("x"), int_lit(100)),
                block(vec![return_stmt(Some(int_lit(1)))]),
                Some(return_stmt(Some(int_lit(2)))),
            )]),
            Some(return_stmt(Some(int_lit(3)))),
        ),
    ]));

    Pipeline::new(OptLevel::O2).run(&mut program);

    let main = program.functions.iter().find(|f| f.name == "main").unwrap();
    // Every layer of threading/simplify-cfg has had up to 10 rounds to
    // converge; the only live path is `return 1`, flattened to the top.
    assert!(
        main.body.statements.iter().any(|s| matches!(&s.kind, StmtKind::Return(Some(e)) if matches!(e.kind, ExprKind::IntLit(1)))),
        "expected a top-level `return 1` after folding, got {:#?}",
        main.body.statements,
    );
    assert!(
        !contains_int_lit(&main.body, 2) && !contains_int_lit(&main.body, 3),
        "dead branches returning 2 or 3 should have been eliminated, got {:#?}",
        main.body.statements,
    );
}

fn contains_int_lit(block: &Block, v: i64) -> bool {
    block.statements.iter().any(|s| stmt_contains_int_lit(s, v))
}

fn stmt_contains_int_lit(stmt: &Stmt, v: i64) -> bool {
    match &stmt.kind {
        StmtKind::Return(Some(e)) => matches!(e.kind, ExprKind::IntLit(n) if n == v),
        StmtKind::If { then_branch, else_branch, .. } => {
            contains_int_lit(then_branch, v) || else_branch.as_ref().is_some_and(|e| stmt_contains_int_lit(e, v))
        }
        StmtKind::Block(b) => contains_int_lit(b, v),
        _ => false,
    }
}
