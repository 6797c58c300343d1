use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracelift::{convert_str, ConvertOptions};
use tracing_subscriber::EnvFilter;

/// tracelift — converts a traced model graph (JSON) into a Rust module.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Input trace (.json)
    input: PathBuf,

    /// Output Rust source file
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Skip the fusion passes
    #[arg(long)]
    no_fuse: bool,

    /// Name of the generated module (default: the trace name in snake case)
    #[arg(long)]
    module_name: Option<String>,

    /// Log at debug level (overridden by RUST_LOG)
    #[arg(long, short)]
    verbose: bool,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    tracing::info!(input = %cli.input.display(), "converting");

    let trace = fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;

    let options = ConvertOptions {
        fuse: !cli.no_fuse,
        module_name: cli.module_name,
    };

    let rust_code = convert_str(&trace, &options).context("conversion failed")?;

    if let Some(output_path) = cli.output {
        fs::write(&output_path, &rust_code)
            .with_context(|| format!("failed to write {}", output_path.display()))?;
        tracing::info!(output = %output_path.display(), "wrote module");
    } else {
        // Print to stdout if no output file specified
        print!("{}", rust_code);
    }
    Ok(())
}
