use std::path::PathBuf;
use std::process;

use clap::Args;

use super::load_capture;

#[derive(Args)]
pub struct CheckArgs {
    /// Capture scripts to check
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
}

pub fn cmd_check(args: CheckArgs) {
    let mut failed = false;
    for input in &args.inputs {
        match load_capture(input) {
            Some(capture) => eprintln!(
                "OK: {} ({} expressions, {} names)",
                input.display(),
                capture.graph.len(),
                capture.names.len()
            ),
            None => failed = true,
        }
    }
    if failed {
        process::exit(1);
    }
}
