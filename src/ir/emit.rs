//! Emitter: turns an optimized `ExprGraph` into structured statements.
//!
//! The output is target independent. Each statement carries its nesting
//! depth; a `TargetSyntax` decides keywords, variable names and
//! terminators.

use std::collections::HashSet;

use serde::Serialize;

use super::{BlockMap, ExprGraph, ExprId, ExprKind, GraphError, ReturnKind};

/// Right-hand side of a declaration or assignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rhs {
    Constant { value: f64 },
    Input { name: String },
    Copy { source: ExprId },
    Binary { op: String, lhs: ExprId, rhs: ExprId },
    Unary { op: String, operand: ExprId },
    Not { operand: ExprId },
    Call { name: String, args: Vec<ExprId> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatementKind {
    /// Declaration without a value, emitted at the top for variables that
    /// are written or read outside the scope they are declared in.
    Variable {
        id: ExprId,
        ty: ReturnKind,
        mutable: bool,
    },
    /// `v_3 = <rhs>`, declaring `v_3`.
    Declaration {
        id: ExprId,
        ty: ReturnKind,
        mutable: bool,
        value: Rhs,
    },
    /// `v_3 = <rhs>` for an already declared `v_3`.
    Assignment { id: ExprId, value: Rhs },
    OutputWrite { name: String, source: ExprId },
    IfOpen { condition: ExprId },
    Else,
    EndIf,
    Comment { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub depth: usize,
    pub kind: StatementKind,
}

impl Statement {
    fn new(depth: usize, kind: StatementKind) -> Self {
        Self { depth, kind }
    }
}

/// Emit the live expressions of `graph` in order.
pub fn emit(graph: &ExprGraph) -> Result<Vec<Statement>, GraphError> {
    let blocks = graph.validate()?;
    let mutable = graph.mutable_ids();
    let hoisted = hoisted_ids(graph, &blocks);

    let mut out = Vec::with_capacity(graph.len() + hoisted.len());
    let mut hoisted_sorted: Vec<ExprId> = hoisted.iter().copied().collect();
    hoisted_sorted.sort();
    for id in hoisted_sorted {
        if let Some(ty) = graph.declared_return_kind(id) {
            let mutable = mutable.contains(&id);
            out.push(Statement::new(0, StatementKind::Variable { id, ty, mutable }));
        }
    }

    for (pos, expr) in graph.live() {
        let depth = blocks.depth(pos);
        let args = expr.arguments();
        let kind = match expr.kind() {
            ExprKind::If => StatementKind::IfOpen { condition: args[0] },
            ExprKind::Else => StatementKind::Else,
            ExprKind::EndIf => StatementKind::EndIf,
            ExprKind::Comment => StatementKind::Comment {
                text: expr.name().to_string(),
            },
            ExprKind::Nop => continue,
            ExprKind::Output => StatementKind::OutputWrite {
                name: expr.name().to_string(),
                source: args[0],
            },
            _ => {
                let Some(id) = expr.lhs() else {
                    continue;
                };
                let value = match expr.kind() {
                    ExprKind::Constant => Rhs::Constant {
                        value: expr.value(),
                    },
                    ExprKind::Input => Rhs::Input {
                        name: expr.name().to_string(),
                    },
                    ExprKind::Assignment => Rhs::Copy { source: args[0] },
                    ExprKind::BinaryArithmetic | ExprKind::BinaryComparison => Rhs::Binary {
                        op: expr.name().to_string(),
                        lhs: args[0],
                        rhs: args[1],
                    },
                    ExprKind::UnaryArithmetic => Rhs::Unary {
                        op: expr.name().to_string(),
                        operand: args[0],
                    },
                    ExprKind::LogicalNegation => Rhs::Not { operand: args[0] },
                    _ => Rhs::Call {
                        name: expr.name().to_string(),
                        args: args.to_vec(),
                    },
                };
                if graph.is_declaration(pos) && !hoisted.contains(&id) {
                    StatementKind::Declaration {
                        id,
                        ty: expr.return_kind(),
                        mutable: mutable.contains(&id),
                        value,
                    }
                } else {
                    StatementKind::Assignment { id, value }
                }
            }
        };
        out.push(Statement::new(depth, kind));
    }
    Ok(out)
}

/// Variables touched from a scope that cannot see their declaration.
fn hoisted_ids(graph: &ExprGraph, blocks: &BlockMap) -> HashSet<ExprId> {
    let mut hoisted = HashSet::new();
    for (pos, expr) in graph.live() {
        let scope = blocks.scope_of(pos);
        let touched = expr
            .arguments()
            .iter()
            .copied()
            .chain(expr.lhs().filter(|_| expr.kind() == ExprKind::Assignment));
        for id in touched {
            let Some(declared) = graph.position_of(id) else {
                continue;
            };
            if !blocks.is_visible(blocks.scope_of(declared), scope) {
                hoisted.insert(id);
            }
        }
    }
    hoisted
}
