/// Expression graph optimizer.
///
/// Runs rewriting passes over an `ExprGraph` in place until none of them
/// reports a change. Passes never append, reorder or renumber: they
/// rewrite an expression with `Expr::replace` (which keeps its lhs) or
/// delete it with `Expr::make_nop`.
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

use super::{BlockMap, ExprGraph, GraphError};

mod copy_prop;
mod cse;
mod dce;
mod fold;
#[cfg(test)]
mod tests;

pub use copy_prop::propagate_copies;
pub use cse::eliminate_common_subexpressions;
pub use dce::{eliminate_dead_code, live_ids};
pub use fold::fold_constants;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pass {
    ConstantFolding,
    CommonSubexpressionElimination,
    DeadCodeElimination,
    CopyPropagation,
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Pass::ConstantFolding => "constant folding",
            Pass::CommonSubexpressionElimination => "common subexpression elimination",
            Pass::DeadCodeElimination => "dead code elimination",
            Pass::CopyPropagation => "copy propagation",
        };
        f.write_str(name)
    }
}

/// Which passes run, and how many rounds the pipeline may take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub max_iterations: usize,
    pub constant_folding: bool,
    pub cse: bool,
    pub dead_code_elimination: bool,
    pub copy_propagation: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            constant_folding: true,
            cse: true,
            dead_code_elimination: true,
            copy_propagation: true,
        }
    }
}

impl OptimizerConfig {
    /// Every pass disabled.
    pub fn none() -> Self {
        Self {
            constant_folding: false,
            cse: false,
            dead_code_elimination: false,
            copy_propagation: false,
            ..Self::default()
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_pass(mut self, pass: Pass, enabled: bool) -> Self {
        match pass {
            Pass::ConstantFolding => self.constant_folding = enabled,
            Pass::CommonSubexpressionElimination => self.cse = enabled,
            Pass::DeadCodeElimination => self.dead_code_elimination = enabled,
            Pass::CopyPropagation => self.copy_propagation = enabled,
        }
        self
    }

    /// Enabled passes in pipeline order.
    pub fn passes(&self) -> Vec<Pass> {
        let mut passes = Vec::new();
        if self.constant_folding {
            passes.push(Pass::ConstantFolding);
        }
        if self.cse {
            passes.push(Pass::CommonSubexpressionElimination);
        }
        if self.copy_propagation {
            passes.push(Pass::CopyPropagation);
        }
        if self.dead_code_elimination {
            passes.push(Pass::DeadCodeElimination);
        }
        passes
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptimizeError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// The pipeline did not reach a fixed point. This is an internal
    /// inconsistency, not an input error.
    #[error("optimizer did not converge after {iterations} iterations; {pass} kept rewriting the graph")]
    NoConvergence { pass: Pass, iterations: usize },
}

/// What a pipeline run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OptimizeReport {
    /// Rounds run, including the final round that changed nothing.
    pub iterations: usize,
    /// Total rewrites per pass.
    pub changes: BTreeMap<Pass, usize>,
}

impl OptimizeReport {
    pub fn total_changes(&self) -> usize {
        self.changes.values().sum()
    }
}

impl fmt::Display for OptimizeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "iterations: {}", self.iterations)?;
        for (pass, count) in &self.changes {
            writeln!(f, "{}: {}", pass, count)?;
        }
        Ok(())
    }
}

/// Run a single pass once and return its change count.
pub fn run_pass(pass: Pass, graph: &mut ExprGraph, blocks: &BlockMap) -> usize {
    match pass {
        Pass::ConstantFolding => fold_constants(graph),
        Pass::CommonSubexpressionElimination => eliminate_common_subexpressions(graph, blocks),
        Pass::DeadCodeElimination => eliminate_dead_code(graph),
        Pass::CopyPropagation => propagate_copies(graph, blocks),
    }
}

/// Apply all enabled passes until no more changes occur.
///
/// Control markers are never touched, so the block map computed up front
/// stays valid for the whole run.
#[instrument(skip_all, fields(exprs = graph.len()))]
pub fn optimize(
    graph: &mut ExprGraph,
    config: &OptimizerConfig,
) -> Result<OptimizeReport, OptimizeError> {
    let blocks = graph.validate()?;
    let passes = config.passes();
    let mut report = OptimizeReport::default();

    for iteration in 1..=config.max_iterations {
        report.iterations = iteration;
        let mut last_changed = None;
        for &pass in &passes {
            let changes = run_pass(pass, graph, &blocks);
            if changes > 0 {
                debug!(iteration, %pass, changes, "pass rewrote graph");
                *report.changes.entry(pass).or_default() += changes;
                last_changed = Some(pass);
            }
        }
        match last_changed {
            None => {
                info!(
                    iterations = iteration,
                    changes = report.total_changes(),
                    "optimizer converged"
                );
                return Ok(report);
            }
            Some(pass) if iteration == config.max_iterations => {
                return Err(OptimizeError::NoConvergence {
                    pass,
                    iterations: iteration,
                });
            }
            Some(_) => {}
        }
    }

    // Only reachable with max_iterations == 0: nothing ran.
    Ok(report)
}
