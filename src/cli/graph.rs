use std::path::PathBuf;
use std::process;

use clap::Args;

use symgen::ir::optimize::optimize;

use super::{load_capture, write_output, OptimizerArgs};

#[derive(Args)]
pub struct GraphArgs {
    /// Capture script
    pub input: PathBuf,
    /// Output .dot file (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Optimize the graph before exporting it
    #[arg(long)]
    pub optimized: bool,
    #[command(flatten)]
    pub optimizer: OptimizerArgs,
}

pub fn cmd_graph(args: GraphArgs) {
    let Some(mut capture) = load_capture(&args.input) else {
        process::exit(1);
    };
    if args.optimized {
        if let Err(e) = optimize(&mut capture.graph, &args.optimizer.config()) {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
    let dot = capture.graph.to_dot();
    match &args.output {
        Some(path) => {
            write_output(path, &dot);
            eprintln!("Wrote {}", path.display());
        }
        None => print!("{}", dot),
    }
}
