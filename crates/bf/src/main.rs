//! Bookforge CLI.
//!
//! Provides commands for:
//! - `build`: sync document trees and render the site
//! - `eval`: run one source file through the sandbox (debugging aid)

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{BuildArgs, EvalArgs};
use output::Output;

/// Bookforge - static site builder for remote document trees.
#[derive(Parser)]
#[command(name = "bf", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync document trees and render the site.
    Build(BuildArgs),
    /// Run a single source file through the sandbox.
    Eval(EvalArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    let verbose = match &cli.command {
        Commands::Build(args) => args.verbose,
        Commands::Eval(args) => args.verbose,
    };

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = match cli.command {
        Commands::Build(args) => args.execute(&output),
        Commands::Eval(args) => args.execute(&output),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
