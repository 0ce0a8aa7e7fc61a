//! Constant folding.
//!
//! Rewrites, by operator:
//!
//! | pattern            | result        |
//! |--------------------|---------------|
//! | `x + 0`, `0 + x`   | `x`           |
//! | `x - 0`            | `x`           |
//! | `x * 1`, `1 * x`   | `x`           |
//! | `x * 0`, `0 * x`   | `0`           |
//! | `x / 1`            | `x`           |
//! | `+x`               | `x`           |
//! | `c1 op c2`         | the f64 value |
//! | `-c`               | the f64 value |
//!
//! `0 - x` is left alone (the sign of zero differs from `-x`), and so is
//! division by a constant zero. Only constants of variables that are never
//! reassigned are used.

use std::collections::HashSet;

use tracing::trace;

use crate::ir::{Expr, ExprGraph, ExprId, ExprKind, ReturnKind};

pub fn fold_constants(graph: &mut ExprGraph) -> usize {
    let mutable = graph.mutable_ids();
    let mut changes = 0;
    for pos in 0..graph.len() {
        let Some(folded) = fold(graph, graph.expr_at(pos), &mutable) else {
            continue;
        };
        trace!(pos, from = %graph.expr_at(pos), to = %folded, "fold");
        graph.expr_at_mut(pos).replace(&folded);
        changes += 1;
    }
    changes
}

fn constant_value(graph: &ExprGraph, id: ExprId, mutable: &HashSet<ExprId>) -> Option<f64> {
    if mutable.contains(&id) {
        return None;
    }
    graph
        .get(id)
        .filter(|e| e.kind() == ExprKind::Constant)
        .map(|e| e.value())
}

fn fold(graph: &ExprGraph, expr: &Expr, mutable: &HashSet<ExprId>) -> Option<Expr> {
    let lhs = expr.lhs()?;
    let copy = |source: ExprId| Some(Expr::assignment(lhs, source, ReturnKind::Scalar));
    let constant = |value: f64| Some(Expr::constant(lhs, value));

    match expr.kind() {
        ExprKind::BinaryArithmetic => {
            let (l, r) = (expr.arguments()[0], expr.arguments()[1]);
            let lc = constant_value(graph, l, mutable);
            let rc = constant_value(graph, r, mutable);

            if let (Some(a), Some(b)) = (lc, rc) {
                return match expr.name() {
                    "+" => constant(a + b),
                    "-" => constant(a - b),
                    "*" => constant(a * b),
                    "/" if b != 0.0 => constant(a / b),
                    _ => None,
                };
            }

            let is = |id: ExprId, value: f64| {
                !mutable.contains(&id) && graph.get(id).is_some_and(|e| e.is_constant_equal_to(value))
            };
            match expr.name() {
                "+" if is(r, 0.0) => copy(l),
                "+" if is(l, 0.0) => copy(r),
                "-" if is(r, 0.0) => copy(l),
                "*" if is(r, 1.0) => copy(l),
                "*" if is(l, 1.0) => copy(r),
                "*" if is(r, 0.0) || is(l, 0.0) => constant(0.0),
                "/" if is(r, 1.0) => copy(l),
                _ => None,
            }
        }
        ExprKind::UnaryArithmetic => {
            let operand = expr.arguments()[0];
            match expr.name() {
                "+" => copy(operand),
                "-" => constant_value(graph, operand, mutable).and_then(|c| constant(-c)),
                _ => None,
            }
        }
        _ => None,
    }
}
