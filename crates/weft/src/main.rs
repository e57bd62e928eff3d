//! weft CLI - filesystem-backed page tree.
//!
//! Provides commands for:
//! - `inspect`: Show how a URL path would be rendered
//! - `check`: Report pages with invalid types, missing templates or broken feeds
//! - `reindex`: Rebuild category member lists

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{CheckArgs, InspectArgs, ReindexArgs};
use output::Output;

/// weft - filesystem-backed page tree.
#[derive(Parser)]
#[command(name = "weft", version, about)]
struct Cli {
    /// Enable verbose output (log category index rewrites and rule reloads).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the render plan for a URL path as JSON.
    Inspect(InspectArgs),
    /// Walk the site and report misconfigured pages.
    Check(CheckArgs),
    /// Reconcile category membership for every categorized page.
    Reindex(ReindexArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Inspect(args) => args.execute(),
        Commands::Check(args) => args.execute(),
        Commands::Reindex(args) => args.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
