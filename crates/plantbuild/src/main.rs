//! plantbuild CLI - `PlantUML` diagram build pipeline.
//!
//! Provides commands for:
//! - `build`: Render every stale diagram under the configured roots
//! - `encode`: Print the server token (or URL) of a single diagram
//! - `decode`: Print the diagram source behind a server token

mod commands;
mod error;
mod output;
mod pipeline;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{BuildArgs, DecodeArgs, EncodeArgs};
use output::Output;

/// plantbuild - `PlantUML` diagram build pipeline.
#[derive(Parser)]
#[command(name = "plantbuild", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render stale diagrams.
    Build(BuildArgs),
    /// Print the server token of a diagram source file.
    Encode(EncodeArgs),
    /// Print the diagram source encoded in a server token.
    Decode(DecodeArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    let verbose = matches!(&cli.command, Commands::Build(args) if args.verbose);

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Build(args) => args.execute(),
        Commands::Encode(args) => args.execute(),
        Commands::Decode(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
