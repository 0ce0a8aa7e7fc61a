//! Lowering: renders emitted `Statement`s as source text.
//!
//! Each target implements `TargetSyntax` to choose keywords, literal
//! spelling and call syntax. Structure (order and nesting) comes from the
//! statements themselves.

mod c;
mod rust;

use super::emit::{Rhs, Statement};
use super::ExprId;

pub use c::CSyntax;
pub use rust::RustSyntax;

/// Names accepted by `create_syntax`.
pub const TARGETS: &[&str] = &["c", "rust"];

/// Renders statements into source lines for one target language.
pub trait TargetSyntax: Send + Sync {
    fn target_name(&self) -> &'static str;

    /// Extension for generated files, without the dot.
    fn file_extension(&self) -> &'static str;

    /// One statement, without indentation.
    fn render_statement(&self, statement: &Statement) -> String;

    /// Spelling of a numeric literal.
    fn literal(&self, value: f64) -> String;

    /// Spelling of a call to `name`.
    fn call(&self, name: &str, args: &[ExprId]) -> String;

    /// Indentation unit, repeated once per nesting level.
    fn indent(&self) -> &'static str {
        "  "
    }

    /// Spelling of a unary arithmetic operator applied to `operand`.
    fn unary(&self, op: &str, operand: ExprId) -> String {
        format!("{}{}", op, operand)
    }

    fn rhs(&self, rhs: &Rhs) -> String {
        match rhs {
            Rhs::Constant { value } => self.literal(*value),
            Rhs::Input { name } => name.clone(),
            Rhs::Copy { source } => source.to_string(),
            Rhs::Binary { op, lhs, rhs } => format!("{} {} {}", lhs, op, rhs),
            Rhs::Unary { op, operand } => self.unary(op, *operand),
            Rhs::Not { operand } => format!("!{}", operand),
            Rhs::Call { name, args } => self.call(name, args),
        }
    }

    /// Render every statement, indented by its depth.
    fn render(&self, statements: &[Statement]) -> Vec<String> {
        statements
            .iter()
            .map(|s| {
                format!(
                    "{}{}",
                    self.indent().repeat(s.depth),
                    self.render_statement(s)
                )
            })
            .collect()
    }
}

/// Create the syntax for the given target name.
pub fn create_syntax(target: &str) -> Option<Box<dyn TargetSyntax>> {
    match target {
        "c" => Some(Box::new(CSyntax)),
        "rust" => Some(Box::new(RustSyntax)),
        _ => None,
    }
}

fn join_args(args: &[ExprId]) -> String {
    args.iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
