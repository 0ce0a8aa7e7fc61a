//! Common subexpression elimination.
//!
//! Scans the graph in order and fingerprints each expression over
//! (kind, return kind, name, value, resolved arguments). Arguments are
//! resolved through copy chains first, so `v_3 = v_1; v_4 = sin(v_3)` and
//! `v_5 = sin(v_1)` share a fingerprint. The first expression with a
//! fingerprint is canonical; a later one becomes `v_later = v_canonical`
//! if the canonical expression is visible from its scope.
//!
//! Variables that are reassigned anywhere are skipped entirely, as
//! canonicals, as duplicates, and as arguments.

use std::collections::HashMap;

use tracing::trace;

use crate::ir::{BlockMap, Expr, ExprGraph, ExprId, ExprKind, ReturnKind};

/// Operators whose operands may be swapped.
const COMMUTATIVE: &[&str] = &["+", "*", "==", "!=", "&&", "||"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Fingerprint {
    kind: ExprKind,
    return_kind: ReturnKind,
    name: String,
    value_bits: u64,
    arguments: Vec<ExprId>,
}

/// Path-compressed copy aliases: every entry points at its final source.
#[derive(Default)]
struct Aliases(HashMap<ExprId, ExprId>);

impl Aliases {
    fn resolve(&self, id: ExprId) -> ExprId {
        self.0.get(&id).copied().unwrap_or(id)
    }

    fn insert(&mut self, copy: ExprId, source: ExprId) {
        let root = self.resolve(source);
        self.0.insert(copy, root);
    }
}

fn is_candidate(expr: &Expr) -> bool {
    matches!(
        expr.kind(),
        ExprKind::Constant
            | ExprKind::Input
            | ExprKind::BinaryArithmetic
            | ExprKind::UnaryArithmetic
            | ExprKind::BinaryComparison
            | ExprKind::LogicalNegation
            | ExprKind::FunctionCall
    )
}

fn fingerprint(expr: &Expr, aliases: &Aliases) -> Fingerprint {
    let mut arguments: Vec<ExprId> = expr.arguments().iter().map(|&a| aliases.resolve(a)).collect();
    if COMMUTATIVE.contains(&expr.name()) && expr.kind() != ExprKind::FunctionCall {
        arguments.sort();
    }
    Fingerprint {
        kind: expr.kind(),
        return_kind: expr.return_kind(),
        name: expr.name().to_string(),
        value_bits: expr.value().to_bits(),
        arguments,
    }
}

pub fn eliminate_common_subexpressions(graph: &mut ExprGraph, blocks: &BlockMap) -> usize {
    let mutable = graph.mutable_ids();
    let mut aliases = Aliases::default();
    let mut seen: HashMap<Fingerprint, Vec<(usize, ExprId)>> = HashMap::new();
    let mut changes = 0;

    for pos in 0..graph.len() {
        let expr = graph.expr_at(pos);
        let Some(lhs) = expr.lhs() else {
            continue;
        };
        if mutable.contains(&lhs) {
            continue;
        }

        if expr.kind() == ExprKind::Assignment {
            let source = expr.arguments()[0];
            if !mutable.contains(&source) {
                aliases.insert(lhs, source);
            }
            continue;
        }
        if !is_candidate(expr) {
            continue;
        }

        let key = fingerprint(expr, &aliases);
        if key.arguments.iter().any(|a| mutable.contains(a)) {
            continue;
        }

        let scope = blocks.scope_of(pos);
        let entries = seen.entry(key).or_default();
        let canonical = entries
            .iter()
            .find(|(p, _)| blocks.is_visible(blocks.scope_of(*p), scope))
            .copied();

        match canonical {
            Some((canonical_pos, canonical)) => {
                debug_assert!(expr.is_semantically_equivalent_to(graph.expr_at(canonical_pos)));
                let copy = Expr::assignment(lhs, canonical, expr.return_kind());
                trace!(pos, from = %expr, to = %copy, "cse");
                graph.expr_at_mut(pos).replace(&copy);
                aliases.insert(lhs, canonical);
                changes += 1;
            }
            None => entries.push((pos, lhs)),
        }
    }
    changes
}
