//! Structural check that a function body returns on every path.
//!
//! Only blocks, `if`/`else` and `switch` with a default are followed. Loops
//! never count as returning since they may run zero times or forever.

use crate::frontend::ast::{Block, Statement, StatementKind};

pub(super) fn block_returns(block: &Block) -> bool {
    statements_return(&block.statements, false)
}

/// `in_case` is set inside a switch block that has a successor, where `next`
/// hands control to a block that is checked on its own.
fn statements_return(statements: &[Statement], in_case: bool) -> bool {
    statements.iter().any(|s| statement_returns(s, in_case))
}

fn statement_returns(statement: &Statement, in_case: bool) -> bool {
    match &statement.kind {
        StatementKind::Return(_) => true,
        StatementKind::Next => in_case,
        StatementKind::Block(block) => statements_return(&block.statements, in_case),
        StatementKind::If {
            then_block,
            else_block: Some(else_block),
            ..
        } => {
            statements_return(&then_block.statements, in_case)
                && statements_return(&else_block.statements, in_case)
        }
        StatementKind::Switch(switch) => {
            let Some(default) = &switch.default else {
                return false;
            };

            switch
                .cases
                .iter()
                .all(|case| statements_return(&case.body.statements, true))
                && statements_return(&default.statements, false)
        }
        _ => false,
    }
}
