//! Dead code elimination.
//!
//! Live ids are the transitive dependencies of every output binding and
//! every `if` condition. An arithmetic expression writing a dead id becomes
//! a nop. Outputs, control markers and comments are always kept.

use std::collections::HashSet;

use tracing::trace;

use crate::ir::{ExprGraph, ExprId};

/// Ids reachable from the graph's side effects.
pub fn live_ids(graph: &ExprGraph) -> HashSet<ExprId> {
    let mut roots = Vec::new();
    for (_, expr) in graph.live().filter(|(_, e)| e.has_side_effects()) {
        roots.extend(expr.lhs());
        roots.extend(expr.arguments().iter().copied());
    }
    graph.transitive_dependencies(roots)
}

pub fn eliminate_dead_code(graph: &mut ExprGraph) -> usize {
    let live = live_ids(graph);
    let mut changes = 0;
    for pos in 0..graph.len() {
        let expr = graph.expr_at(pos);
        if expr.has_side_effects() {
            continue;
        }
        let Some(lhs) = expr.lhs() else {
            continue;
        };
        if !live.contains(&lhs) {
            trace!(pos, expr = %expr, "dead");
            graph.expr_at_mut(pos).make_nop();
            changes += 1;
        }
    }
    changes
}
