//! C syntax: `const double v_3 = v_1 + v_2;`

use super::{join_args, TargetSyntax};
use crate::ir::emit::{Statement, StatementKind};
use crate::ir::{ExprId, ReturnKind};

/// C99 with `<math.h>` and `<stdbool.h>`. Variables that are never
/// reassigned are declared `const`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CSyntax;

fn c_type(ty: ReturnKind) -> &'static str {
    match ty {
        ReturnKind::Boolean => "bool",
        _ => "double",
    }
}

impl TargetSyntax for CSyntax {
    fn target_name(&self) -> &'static str {
        "c"
    }

    fn file_extension(&self) -> &'static str {
        "c"
    }

    fn render_statement(&self, statement: &Statement) -> String {
        match &statement.kind {
            StatementKind::Variable { id, ty, .. } => format!("{} {};", c_type(*ty), id),
            StatementKind::Declaration {
                id,
                ty,
                mutable,
                value,
            } => {
                let qualifier = if *mutable { "" } else { "const " };
                format!("{}{} {} = {};", qualifier, c_type(*ty), id, self.rhs(value))
            }
            StatementKind::Assignment { id, value } => format!("{} = {};", id, self.rhs(value)),
            StatementKind::OutputWrite { name, source } => format!("{} = {};", name, source),
            StatementKind::IfOpen { condition } => format!("if ({}) {{", condition),
            StatementKind::Else => "} else {".to_string(),
            StatementKind::EndIf => "}".to_string(),
            StatementKind::Comment { text } => format!("// {}", text),
        }
    }

    fn literal(&self, value: f64) -> String {
        if value.is_nan() {
            "NAN".to_string()
        } else if value == f64::INFINITY {
            "INFINITY".to_string()
        } else if value == f64::NEG_INFINITY {
            "-INFINITY".to_string()
        } else {
            format!("{:?}", value)
        }
    }

    fn call(&self, name: &str, args: &[ExprId]) -> String {
        format!("{}({})", name, join_args(args))
    }
}
