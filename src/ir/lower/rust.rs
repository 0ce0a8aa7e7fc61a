//! Rust syntax: `let v_3 = v_1 + v_2;`
//!
//! Math functions are called through `f64`, with C names mapped to their
//! Rust spelling (`pow` becomes `f64::powf`).

use super::{join_args, TargetSyntax};
use crate::ir::emit::{Statement, StatementKind};
use crate::ir::{ExprId, ReturnKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct RustSyntax;

/// C math names whose `f64` method is spelled differently.
const RENAMED: &[(&str, &str)] = &[
    ("pow", "powf"),
    ("fabs", "abs"),
    ("fmin", "min"),
    ("fmax", "max"),
    ("isfinite", "is_finite"),
    ("isnan", "is_nan"),
    ("isinf", "is_infinite"),
    ("isnormal", "is_normal"),
];

fn rust_type(ty: ReturnKind) -> &'static str {
    match ty {
        ReturnKind::Boolean => "bool",
        _ => "f64",
    }
}

fn binding(mutable: bool) -> &'static str {
    if mutable {
        "let mut"
    } else {
        "let"
    }
}

impl TargetSyntax for RustSyntax {
    fn target_name(&self) -> &'static str {
        "rust"
    }

    fn file_extension(&self) -> &'static str {
        "rs"
    }

    fn indent(&self) -> &'static str {
        "    "
    }

    fn render_statement(&self, statement: &Statement) -> String {
        match &statement.kind {
            StatementKind::Variable { id, ty, mutable } => {
                format!("{} {}: {};", binding(*mutable), id, rust_type(*ty))
            }
            StatementKind::Declaration {
                id, mutable, value, ..
            } => format!("{} {} = {};", binding(*mutable), id, self.rhs(value)),
            StatementKind::Assignment { id, value } => format!("{} = {};", id, self.rhs(value)),
            StatementKind::OutputWrite { name, source } => format!("{} = {};", name, source),
            StatementKind::IfOpen { condition } => format!("if {} {{", condition),
            StatementKind::Else => "} else {".to_string(),
            StatementKind::EndIf => "}".to_string(),
            StatementKind::Comment { text } => format!("// {}", text),
        }
    }

    fn unary(&self, op: &str, operand: ExprId) -> String {
        // Rust has no unary plus.
        if op == "+" {
            operand.to_string()
        } else {
            format!("{}{}", op, operand)
        }
    }

    fn literal(&self, value: f64) -> String {
        if value.is_nan() {
            "f64::NAN".to_string()
        } else if value == f64::INFINITY {
            "f64::INFINITY".to_string()
        } else if value == f64::NEG_INFINITY {
            "f64::NEG_INFINITY".to_string()
        } else {
            format!("{:?}", value)
        }
    }

    fn call(&self, name: &str, args: &[ExprId]) -> String {
        let method = RENAMED
            .iter()
            .find(|(c, _)| *c == name)
            .map_or(name, |&(_, r)| r);
        format!("f64::{}({})", method, join_args(args))
    }
}
