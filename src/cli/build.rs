use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, ValueEnum};

use symgen::ir::lower::create_syntax;
use symgen::{CodegenError, CodegenOptions};

use super::{load_capture, write_output, OptimizerArgs};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Rendered source
    Text,
    /// Statements, rendered lines and optimizer report as JSON
    Json,
}

#[derive(Args)]
pub struct BuildArgs {
    /// Capture scripts to compile
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
    /// Output file, `-` for stdout (default: <input>.<ext>; single input only)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Target syntax (c or rust)
    #[arg(long, default_value = "c")]
    pub target: String,
    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
    /// Print per-pass optimization counts
    #[arg(long)]
    pub stats: bool,
    #[command(flatten)]
    pub optimizer: OptimizerArgs,
}

pub fn cmd_build(args: BuildArgs) {
    let BuildArgs {
        inputs,
        output,
        target,
        format,
        stats,
        optimizer,
    } = args;
    if output.is_some() && inputs.len() > 1 {
        eprintln!("error: --output needs a single input");
        process::exit(1);
    }
    let Some(syntax) = create_syntax(&target) else {
        eprintln!("error: {}", CodegenError::UnknownTarget(target));
        process::exit(1);
    };
    let options = CodegenOptions::for_target(&target).with_optimizer(optimizer.config());

    // Replay every script first so all capture errors are reported together.
    let captures: Vec<_> = inputs.iter().map(|input| load_capture(input)).collect();
    if captures.iter().any(Option::is_none) {
        process::exit(1);
    }
    let graphs = captures.into_iter().flatten().map(|c| c.graph).collect();

    for (input, result) in inputs.iter().zip(symgen::compile_many(graphs, &options)) {
        let generated = match result {
            Ok(generated) => generated,
            Err(e) => {
                eprintln!("error: {}: {}", input.display(), e);
                process::exit(1);
            }
        };
        if stats {
            eprint!("{}:\n{}", input.display(), generated.report);
        }

        let (text, extension) = match format {
            Format::Text => (generated.source() + "\n", syntax.file_extension()),
            Format::Json => match serde_json::to_string_pretty(&generated) {
                Ok(json) => (json + "\n", "json"),
                Err(e) => {
                    eprintln!("error: cannot serialize output: {}", e);
                    process::exit(1);
                }
            },
        };
        let out_path = output
            .clone()
            .unwrap_or_else(|| input.with_extension(extension));
        if out_path == *input {
            eprintln!(
                "error: output would overwrite '{}'; pass --output",
                input.display()
            );
            process::exit(1);
        }
        write_output(&out_path, &text);
        if out_path != Path::new("-") {
            eprintln!("Compiled -> {}", out_path.display());
        }
    }
}
