use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    compare::{self, CompareArgs},
    expand::{self, ExpandArgs},
    inspect::{self, InspectArgs},
    preflight::{self, PreflightArgs},
    run::{self, RunArgs},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "camp", about = "Experiment campaign engine", version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run pipeline stages for the batch a configuration describes.
    Run(RunArgs),
    /// Print the experiments criteria expressions expand to.
    Expand(ExpandArgs),
    /// Check executables and scheduler variables without submitting.
    Preflight(PreflightArgs),
    /// Compare delivered metrics across batch directories.
    Compare(CompareArgs),
    /// Summarize the state of a batch directory.
    Inspect(InspectArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let default = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Command::Run(args) => run::run(&args),
        Command::Expand(args) => expand::run(&args),
        Command::Preflight(args) => preflight::run(&args),
        Command::Compare(args) => compare::run(&args),
        Command::Inspect(args) => inspect::run(&args),
    }
}
