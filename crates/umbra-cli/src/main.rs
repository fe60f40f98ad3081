mod commands;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "umbra", about = "Master dark library manager for astrophotography")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan input directories and update the master library
    Update(commands::update::UpdateArgs),
    /// List the masters currently in a library
    List(commands::list::ListArgs),
    /// Show one FITS file's acquisition metadata
    Inspect(commands::inspect::InspectArgs),
    /// Print a default run configuration as TOML
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Update(args) => commands::update::run(args),
        Commands::List(args) => commands::list::run(args),
        Commands::Inspect(args) => commands::inspect::run(args),
        Commands::Config => commands::config::run(),
    }
}
