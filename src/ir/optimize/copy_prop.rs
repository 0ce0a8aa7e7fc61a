//! Trivial assignment propagation.
//!
//! For a declaring copy `v_d = v_s`, point every reader of `v_d` at `v_s`
//! and turn the copy into a nop. Skipped when either variable is ever
//! reassigned, or when some reader sits in a scope that cannot see `v_s`.

use tracing::trace;

use crate::ir::{BlockMap, ExprGraph, ExprKind};

pub fn propagate_copies(graph: &mut ExprGraph, blocks: &BlockMap) -> usize {
    let mutable = graph.mutable_ids();
    let mut changes = 0;

    for pos in 0..graph.len() {
        let expr = graph.expr_at(pos);
        if expr.kind() != ExprKind::Assignment || !graph.is_declaration(pos) {
            continue;
        }
        let Some(copy) = expr.lhs() else {
            continue;
        };
        let source = expr.arguments()[0];
        if mutable.contains(&copy) || mutable.contains(&source) {
            continue;
        }
        let Some(source_pos) = graph.position_of(source) else {
            continue;
        };

        let source_scope = blocks.scope_of(source_pos);
        let readers = graph.dependents(copy);
        if readers
            .iter()
            .any(|&r| !blocks.is_visible(source_scope, blocks.scope_of(r)))
        {
            continue;
        }

        trace!(pos, %copy, %source, readers = readers.len(), "propagate copy");
        for r in readers {
            for arg in graph.expr_at_mut(r).arguments_mut() {
                if *arg == copy {
                    *arg = source;
                }
            }
        }
        graph.expr_at_mut(pos).make_nop();
        changes += 1;
    }
    changes
}
