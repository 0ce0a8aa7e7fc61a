use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::capture::{self, Capture};
use crate::diagnostic::{render_diagnostics, Diagnostic};
use crate::ir::emit::{emit, Statement};
use crate::ir::lower::{create_syntax, TargetSyntax, TARGETS};
use crate::ir::optimize::{optimize, OptimizeError, OptimizeReport, OptimizerConfig};
use crate::ir::{ExprGraph, GraphError};
use crate::span::Span;

#[cfg(test)]
mod tests;

/// Options controlling code generation: target syntax + optimizer passes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodegenOptions {
    /// Target syntax name (see `ir::lower::TARGETS`).
    pub target: String,
    pub optimizer: OptimizerConfig,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            target: "c".to_string(),
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl CodegenOptions {
    pub fn for_target(target: &str) -> Self {
        Self {
            target: target.to_string(),
            ..Self::default()
        }
    }

    pub fn with_optimizer(mut self, optimizer: OptimizerConfig) -> Self {
        self.optimizer = optimizer;
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodegenError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Optimize(#[from] OptimizeError),

    #[error("unknown target `{0}` (expected one of: {targets})", targets = TARGETS.join(", "))]
    UnknownTarget(String),
}

/// Output of one generation run.
#[derive(Debug, Clone, Serialize)]
pub struct Generated {
    pub target: String,
    pub statements: Vec<Statement>,
    pub lines: Vec<String>,
    pub report: OptimizeReport,
}

impl Generated {
    pub fn source(&self) -> String {
        self.lines.join("\n")
    }
}

fn resolve_target(target: &str) -> Result<Box<dyn TargetSyntax>, CodegenError> {
    create_syntax(target).ok_or_else(|| CodegenError::UnknownTarget(target.to_string()))
}

/// Optimize `graph` in place, then emit and render it.
#[instrument(skip_all, fields(target = %options.target))]
pub fn compile_graph(
    graph: &mut ExprGraph,
    options: &CodegenOptions,
) -> Result<Generated, CodegenError> {
    let syntax = resolve_target(&options.target)?;
    let report = optimize(graph, &options.optimizer)?;
    let statements = emit(graph)?;
    let lines = syntax.render(&statements);
    debug!(
        statements = statements.len(),
        lines = lines.len(),
        "generated"
    );
    Ok(Generated {
        target: syntax.target_name().to_string(),
        statements,
        lines,
        report,
    })
}

/// Compile independent graphs in parallel. Results are in input order.
pub fn compile_many(
    graphs: Vec<ExprGraph>,
    options: &CodegenOptions,
) -> Vec<Result<Generated, CodegenError>> {
    graphs
        .into_par_iter()
        .map(|mut graph| compile_graph(&mut graph, options))
        .collect()
}

/// Replay a capture script without generating code.
pub fn check(source: &str, filename: &str) -> Result<Capture, Vec<Diagnostic>> {
    capture::record(source).inspect_err(|errors| render_diagnostics(errors, filename, source))
}

/// Compile a capture script to C source.
pub fn compile(source: &str, filename: &str) -> Result<String, Vec<Diagnostic>> {
    compile_with_options(source, filename, &CodegenOptions::default()).map(|g| g.source())
}

/// Compile a capture script with options. Diagnostics are rendered to
/// stderr and returned.
pub fn compile_with_options(
    source: &str,
    filename: &str,
    options: &CodegenOptions,
) -> Result<Generated, Vec<Diagnostic>> {
    let result = compile_silent(source, options);
    if let Err(errors) = &result {
        render_diagnostics(errors, filename, source);
    }
    result
}

/// Compile a capture script with options, without rendering diagnostics.
pub fn compile_silent(
    source: &str,
    options: &CodegenOptions,
) -> Result<Generated, Vec<Diagnostic>> {
    let mut capture = capture::record(source)?;
    compile_graph(&mut capture.graph, options).map_err(|err| {
        let span = Span::new(0, source.len() as u32);
        vec![Diagnostic::error(err.to_string(), span)]
    })
}
