//! Structural faults in a recorded expression stream.

use thiserror::Error;

use super::{ExprId, ExprKind, ReturnKind};

/// A malformed capture. Every variant carries the position (index into the
/// graph's expression list) and the kind of the offending expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("{kind} at position {position} references {id}, which is not defined yet")]
    ForwardReference {
        position: usize,
        kind: ExprKind,
        id: ExprId,
    },

    #[error("{kind} at position {position} assigns to {id}, which is not defined yet")]
    UndeclaredTarget {
        position: usize,
        kind: ExprKind,
        id: ExprId,
    },

    #[error("{kind} at position {position} redefines {id} (expected {expected})")]
    DuplicateDestination {
        position: usize,
        kind: ExprKind,
        id: ExprId,
        expected: ExprId,
    },

    #[error("{kind} at position {position} uses {id}, which is an output binding")]
    OutputBinding {
        position: usize,
        kind: ExprKind,
        id: ExprId,
    },

    #[error("if at position {position} uses {condition}, which is {found}, not boolean")]
    NonBooleanCondition {
        position: usize,
        condition: ExprId,
        found: ReturnKind,
    },

    #[error("{kind} at position {position} assigns a {found} value to {id}, which is {expected}")]
    ReturnKindMismatch {
        position: usize,
        kind: ExprKind,
        id: ExprId,
        expected: ReturnKind,
        found: ReturnKind,
    },

    #[error("else at position {position} has no matching if")]
    UnmatchedElse { position: usize },

    #[error("else at position {position} follows another else of the same if (opened at {open})")]
    DuplicateElse { position: usize, open: usize },

    #[error("endif at position {position} has no matching if")]
    UnmatchedEndIf { position: usize },

    #[error("if at position {position} is never closed")]
    UnclosedIf { position: usize },
}

impl GraphError {
    /// Position of the offending expression.
    pub fn position(&self) -> usize {
        match self {
            GraphError::ForwardReference { position, .. }
            | GraphError::UndeclaredTarget { position, .. }
            | GraphError::DuplicateDestination { position, .. }
            | GraphError::OutputBinding { position, .. }
            | GraphError::NonBooleanCondition { position, .. }
            | GraphError::ReturnKindMismatch { position, .. }
            | GraphError::UnmatchedElse { position }
            | GraphError::DuplicateElse { position, .. }
            | GraphError::UnmatchedEndIf { position }
            | GraphError::UnclosedIf { position } => *position,
        }
    }

    /// Kind of the offending expression.
    pub fn kind(&self) -> ExprKind {
        match self {
            GraphError::ForwardReference { kind, .. }
            | GraphError::UndeclaredTarget { kind, .. }
            | GraphError::DuplicateDestination { kind, .. }
            | GraphError::OutputBinding { kind, .. }
            | GraphError::ReturnKindMismatch { kind, .. } => *kind,
            GraphError::NonBooleanCondition { .. } | GraphError::UnclosedIf { .. } => ExprKind::If,
            GraphError::UnmatchedElse { .. } | GraphError::DuplicateElse { .. } => ExprKind::Else,
            GraphError::UnmatchedEndIf { .. } => ExprKind::EndIf,
        }
    }
}
