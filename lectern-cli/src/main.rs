//! # lectern CLI
//!
//! Command-line interface for the lectern static blog compiler.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lectern")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "lectern.yml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new lectern project
    Init {
        /// Target directory (defaults to current directory)
        path: Option<PathBuf>,
    },

    /// Compile entries and render the site
    Compile {
        /// Discard the cache and recompile everything
        #[arg(long)]
        force: bool,

        /// Treat unknown or broken filters as no-ops
        #[arg(long)]
        ignore: bool,
    },

    /// Remove the compilation cache
    Clean,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Init { path } => commands::init_project(path.as_deref()),
        Commands::Compile { force, ignore } => commands::compile_site(
            &cli.config,
            commands::CompileOptions {
                force,
                ignore_errors: ignore,
            },
        ),
        Commands::Clean => commands::clean_cache(&cli.config),
    }
}
