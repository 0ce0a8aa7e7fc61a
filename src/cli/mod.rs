pub mod build;
pub mod check;
pub mod graph;

use std::fs;
use std::path::Path;
use std::process;

use clap::Args;
use tracing_subscriber::EnvFilter;

use symgen::capture::Capture;
use symgen::ir::optimize::{OptimizerConfig, Pass};

/// Install the stderr log subscriber. `SYMGEN_LOG` wins over `RUST_LOG`.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env("SYMGEN_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("symgen=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Optimizer flags shared by `build` and `graph`.
#[derive(Args, Clone, Debug)]
pub struct OptimizerArgs {
    /// Optimization level: 0 disables every pass
    #[arg(short = 'O', value_name = "LEVEL", default_value_t = 1,
          value_parser = clap::value_parser!(u8).range(0..=1))]
    pub opt_level: u8,
    /// Rounds the optimizer may take before giving up
    #[arg(long, value_name = "N", default_value_t = 100)]
    pub max_iterations: usize,
    /// Disable constant folding
    #[arg(long)]
    pub no_fold: bool,
    /// Disable common subexpression elimination
    #[arg(long)]
    pub no_cse: bool,
    /// Disable dead code elimination
    #[arg(long)]
    pub no_dce: bool,
    /// Disable copy propagation
    #[arg(long)]
    pub no_copy_prop: bool,
}

impl OptimizerArgs {
    pub fn config(&self) -> OptimizerConfig {
        let base = if self.opt_level == 0 {
            OptimizerConfig::none()
        } else {
            OptimizerConfig::default()
        };
        let disabled = [
            (Pass::ConstantFolding, self.no_fold),
            (Pass::CommonSubexpressionElimination, self.no_cse),
            (Pass::DeadCodeElimination, self.no_dce),
            (Pass::CopyPropagation, self.no_copy_prop),
        ];
        disabled
            .into_iter()
            .filter(|&(_, off)| off)
            .fold(base.with_max_iterations(self.max_iterations), |config, (pass, _)| {
                config.with_pass(pass, false)
            })
    }
}

pub fn read_source(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", path.display(), e);
            process::exit(1);
        }
    }
}

/// Replay a capture script. Diagnostics are rendered; `None` on failure.
pub fn load_capture(path: &Path) -> Option<Capture> {
    let source = read_source(path);
    symgen::check(&source, &path.display().to_string()).ok()
}

/// Write `text` to `path`, or to stdout when `path` is `-`.
pub fn write_output(path: &Path, text: &str) {
    if path == Path::new("-") {
        print!("{}", text);
        return;
    }
    if let Err(e) = fs::write(path, text) {
        eprintln!("error: cannot write '{}': {}", path.display(), e);
        process::exit(1);
    }
}
