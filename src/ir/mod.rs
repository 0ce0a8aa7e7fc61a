//! Expression IR for generated derivative code.
//!
//! A recorded function is a flat list of `Expr`s in evaluation order.
//! Arithmetic expressions define one variable `v_<id>`; control expressions
//! (`if`, `else`, `endif`) mark block boundaries and define nothing.
//!
//! The pipeline is: capture into an `ExprGraph`, rewrite it in place with
//! `optimize`, turn it into `Statement`s with `emit`, then render those
//! with a `TargetSyntax`.

pub mod blocks;
pub mod dot;
pub mod emit;
pub mod error;
pub mod graph;
pub mod lower;
pub mod optimize;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use blocks::{Block, BlockMap, Branch, ScopeId};
pub use error::GraphError;
pub use graph::ExprGraph;

/// Operators accepted by `Expr::binary`.
pub const ARITHMETIC_OPERATORS: &[&str] = &["+", "-", "*", "/"];
/// Operators accepted by `Expr::unary`.
pub const UNARY_OPERATORS: &[&str] = &["+", "-"];
/// Operators accepted by `Expr::compare`.
pub const COMPARISON_OPERATORS: &[&str] = &["<", ">", "<=", ">=", "==", "!=", "&&", "||"];

// ─── Identifiers ──────────────────────────────────────────────────

/// Identifier of a generated variable. Never reused within a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExprId(pub u32);

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v_{}", self.0)
    }
}

// ─── Kinds ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExprKind {
    /// `v_0 = 3.1415`
    Constant,
    /// `v_0 = parameters[0][0]`
    Input,
    /// `residual[0] = v_51`
    Output,
    /// `v_3 = v_1`
    Assignment,
    /// `v_2 = v_0 + v_1`
    BinaryArithmetic,
    /// `v_1 = -v_0`
    UnaryArithmetic,
    /// `v_2 = v_0 < v_1`
    BinaryComparison,
    /// `v_3 = !v_2`
    LogicalNegation,
    /// `v_5 = f(v_0, v_1, ...)`
    FunctionCall,
    If,
    Else,
    EndIf,
    /// A comment line. Never optimized away.
    Comment,
    /// An empty slot left behind by an optimization.
    Nop,
}

impl ExprKind {
    /// Kinds that define a variable.
    pub fn is_arithmetic(self) -> bool {
        !matches!(
            self,
            ExprKind::If | ExprKind::Else | ExprKind::EndIf | ExprKind::Comment | ExprKind::Nop
        )
    }
}

impl fmt::Display for ExprKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExprKind::Constant => "constant",
            ExprKind::Input => "input",
            ExprKind::Output => "output",
            ExprKind::Assignment => "assignment",
            ExprKind::BinaryArithmetic => "binary arithmetic",
            ExprKind::UnaryArithmetic => "unary arithmetic",
            ExprKind::BinaryComparison => "comparison",
            ExprKind::LogicalNegation => "logical negation",
            ExprKind::FunctionCall => "function call",
            ExprKind::If => "if",
            ExprKind::Else => "else",
            ExprKind::EndIf => "endif",
            ExprKind::Comment => "comment",
            ExprKind::Nop => "nop",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReturnKind {
    Scalar,
    Boolean,
    Void,
}

impl fmt::Display for ReturnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnKind::Scalar => f.write_str("scalar"),
            ReturnKind::Boolean => f.write_str("boolean"),
            ReturnKind::Void => f.write_str("void"),
        }
    }
}

// ─── Expressions ──────────────────────────────────────────────────

/// One line of generated code.
///
/// `lhs` is `Some` exactly for arithmetic kinds. The meaning of `name`
/// depends on the kind: operator symbol, function name, input or output
/// variable name, or comment text. `value` is only meaningful for
/// constants.
#[derive(Debug, Clone)]
pub struct Expr {
    kind: ExprKind,
    return_kind: ReturnKind,
    lhs: Option<ExprId>,
    arguments: Vec<ExprId>,
    name: String,
    value: f64,
}

impl Default for Expr {
    fn default() -> Self {
        Self::nop()
    }
}

impl Expr {
    fn new(
        kind: ExprKind,
        return_kind: ReturnKind,
        lhs: Option<ExprId>,
        arguments: Vec<ExprId>,
        name: String,
        value: f64,
    ) -> Self {
        Self {
            kind,
            return_kind,
            lhs,
            arguments,
            name,
            value,
        }
    }

    // ── Constructors ──────────────────────────────────────────────

    pub fn constant(lhs: ExprId, value: f64) -> Self {
        Self::new(
            ExprKind::Constant,
            ReturnKind::Scalar,
            Some(lhs),
            Vec::new(),
            String::new(),
            value,
        )
    }

    pub fn input(lhs: ExprId, name: impl Into<String>) -> Self {
        let name = name.into();
        assert!(!name.is_empty(), "input binding needs a variable name");
        Self::new(
            ExprKind::Input,
            ReturnKind::Scalar,
            Some(lhs),
            Vec::new(),
            name,
            0.0,
        )
    }

    pub fn output(lhs: ExprId, source: ExprId, name: impl Into<String>) -> Self {
        let name = name.into();
        assert!(!name.is_empty(), "output binding needs a variable name");
        Self::new(
            ExprKind::Output,
            ReturnKind::Scalar,
            Some(lhs),
            vec![source],
            name,
            0.0,
        )
    }

    /// `lhs = source`. The return kind is the source's.
    pub fn assignment(lhs: ExprId, source: ExprId, return_kind: ReturnKind) -> Self {
        assert!(
            return_kind != ReturnKind::Void,
            "cannot assign a void expression"
        );
        Self::new(
            ExprKind::Assignment,
            return_kind,
            Some(lhs),
            vec![source],
            String::new(),
            0.0,
        )
    }

    pub fn binary(lhs: ExprId, op: &str, left: ExprId, right: ExprId) -> Self {
        assert!(
            ARITHMETIC_OPERATORS.contains(&op),
            "unknown arithmetic operator `{}`",
            op
        );
        Self::new(
            ExprKind::BinaryArithmetic,
            ReturnKind::Scalar,
            Some(lhs),
            vec![left, right],
            op.to_string(),
            0.0,
        )
    }

    pub fn unary(lhs: ExprId, op: &str, operand: ExprId) -> Self {
        assert!(
            UNARY_OPERATORS.contains(&op),
            "unknown unary operator `{}`",
            op
        );
        Self::new(
            ExprKind::UnaryArithmetic,
            ReturnKind::Scalar,
            Some(lhs),
            vec![operand],
            op.to_string(),
            0.0,
        )
    }

    pub fn compare(lhs: ExprId, op: &str, left: ExprId, right: ExprId) -> Self {
        assert!(
            COMPARISON_OPERATORS.contains(&op),
            "unknown comparison operator `{}`",
            op
        );
        Self::new(
            ExprKind::BinaryComparison,
            ReturnKind::Boolean,
            Some(lhs),
            vec![left, right],
            op.to_string(),
            0.0,
        )
    }

    pub fn not(lhs: ExprId, operand: ExprId) -> Self {
        Self::new(
            ExprKind::LogicalNegation,
            ReturnKind::Boolean,
            Some(lhs),
            vec![operand],
            "!".to_string(),
            0.0,
        )
    }

    pub fn scalar_call(lhs: ExprId, name: impl Into<String>, args: Vec<ExprId>) -> Self {
        Self::call(lhs, name.into(), args, ReturnKind::Scalar)
    }

    pub fn logical_call(lhs: ExprId, name: impl Into<String>, args: Vec<ExprId>) -> Self {
        Self::call(lhs, name.into(), args, ReturnKind::Boolean)
    }

    fn call(lhs: ExprId, name: String, args: Vec<ExprId>, return_kind: ReturnKind) -> Self {
        assert!(!name.is_empty(), "function call needs a function name");
        Self::new(
            ExprKind::FunctionCall,
            return_kind,
            Some(lhs),
            args,
            name,
            0.0,
        )
    }

    pub fn if_open(condition: ExprId) -> Self {
        Self::new(
            ExprKind::If,
            ReturnKind::Void,
            None,
            vec![condition],
            String::new(),
            0.0,
        )
    }

    pub fn if_else() -> Self {
        Self::new(
            ExprKind::Else,
            ReturnKind::Void,
            None,
            Vec::new(),
            String::new(),
            0.0,
        )
    }

    pub fn if_close() -> Self {
        Self::new(
            ExprKind::EndIf,
            ReturnKind::Void,
            None,
            Vec::new(),
            String::new(),
            0.0,
        )
    }

    pub fn comment(text: impl Into<String>) -> Self {
        Self::new(
            ExprKind::Comment,
            ReturnKind::Void,
            None,
            Vec::new(),
            text.into(),
            0.0,
        )
    }

    pub fn nop() -> Self {
        Self::new(
            ExprKind::Nop,
            ReturnKind::Void,
            None,
            Vec::new(),
            String::new(),
            0.0,
        )
    }

    // ── Accessors ─────────────────────────────────────────────────

    pub fn kind(&self) -> ExprKind {
        self.kind
    }

    pub fn return_kind(&self) -> ReturnKind {
        self.return_kind
    }

    pub fn lhs(&self) -> Option<ExprId> {
        self.lhs
    }

    pub fn arguments(&self) -> &[ExprId] {
        &self.arguments
    }

    pub(crate) fn arguments_mut(&mut self) -> &mut [ExprId] {
        &mut self.arguments
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    // ── Queries ───────────────────────────────────────────────────

    pub fn is_arithmetic(&self) -> bool {
        self.lhs.is_some()
    }

    pub fn is_control(&self) -> bool {
        matches!(self.kind, ExprKind::If | ExprKind::Else | ExprKind::EndIf)
    }

    pub fn is_nop(&self) -> bool {
        self.kind == ExprKind::Nop
    }

    /// Expressions that must survive dead-code elimination on their own.
    pub fn has_side_effects(&self) -> bool {
        self.is_control() || matches!(self.kind, ExprKind::Output | ExprKind::Comment)
    }

    /// `b = a + 0` can become `b = a` once the `0` is known.
    pub fn is_constant_equal_to(&self, constant: f64) -> bool {
        self.kind == ExprKind::Constant && self.value == constant
    }

    pub fn directly_depends_on(&self, other: ExprId) -> bool {
        self.arguments.contains(&other)
    }

    /// Same kind, return kind, name, value and argument count. The lhs
    /// and the argument ids may differ:
    ///
    /// ```text
    /// v_0 = v_1 + v_2;    v_4 = v_1 + v_3;
    /// v_0 = sin(v_1);     v_3 = sin(v_2);
    /// ```
    pub fn is_semantically_equivalent_to(&self, other: &Expr) -> bool {
        self.kind == other.kind
            && self.return_kind == other.return_kind
            && self.name == other.name
            && self.value.to_bits() == other.value.to_bits()
            && self.arguments.len() == other.arguments.len()
    }

    /// True if `self` computes exactly what `other` computes, so that
    /// `self` can become a copy of `other`'s lhs.
    pub fn is_replaceable_by(&self, other: &Expr) -> bool {
        self.is_arithmetic()
            && other.is_arithmetic()
            && !self.has_side_effects()
            && self.kind != ExprKind::Assignment
            && self.is_semantically_equivalent_to(other)
            && self.arguments == other.arguments
    }

    /// Overwrite this expression with `other`, keeping the current lhs so
    /// that expressions referencing it stay valid.
    pub fn replace(&mut self, other: &Expr) {
        let lhs = self.lhs;
        *self = other.clone();
        self.lhs = lhs;
    }

    pub fn make_nop(&mut self) {
        *self = Self::nop();
    }
}

/// Full equality, including lhs and argument ids. Values compare by bit
/// pattern so that every expression equals itself.
impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.lhs == other.lhs
            && self.arguments == other.arguments
            && self.is_semantically_equivalent_to(other)
    }
}

impl Eq for Expr {}

// ─── Display ──────────────────────────────────────────────────────

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(lhs) = self.lhs {
            write!(f, "{} = ", lhs)?;
        }
        let args = &self.arguments;
        match self.kind {
            ExprKind::Constant => write!(f, "{:?}", self.value),
            ExprKind::Input => write!(f, "input {}", self.name),
            ExprKind::Output => write!(f, "output {} <- {}", self.name, args[0]),
            ExprKind::Assignment => write!(f, "{}", args[0]),
            ExprKind::BinaryArithmetic | ExprKind::BinaryComparison => {
                write!(f, "{} {} {}", args[0], self.name, args[1])
            }
            ExprKind::UnaryArithmetic | ExprKind::LogicalNegation => {
                write!(f, "{}{}", self.name, args[0])
            }
            ExprKind::FunctionCall => {
                let list: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", self.name, list.join(", "))
            }
            ExprKind::If => write!(f, "if {}", args[0]),
            ExprKind::Else => write!(f, "else"),
            ExprKind::EndIf => write!(f, "endif"),
            ExprKind::Comment => write!(f, "// {}", self.name),
            ExprKind::Nop => write!(f, "nop"),
        }
    }
}
