use clap::{Parser, Subcommand};

mod cli;

use cli::build::BuildArgs;
use cli::check::CheckArgs;
use cli::graph::GraphArgs;

#[derive(Parser)]
#[command(
    name = "symgen",
    version,
    about = "Optimize recorded expression graphs and emit C or Rust"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile capture scripts to source code
    Build(BuildArgs),
    /// Replay capture scripts and report errors without generating code
    Check(CheckArgs),
    /// Export the dependency graph of a capture script as Graphviz DOT
    Graph(GraphArgs),
}

fn main() {
    cli::init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Build(args) => cli::build::cmd_build(args),
        Command::Check(args) => cli::check::cmd_check(args),
        Command::Graph(args) => cli::graph::cmd_graph(args),
    }
}
