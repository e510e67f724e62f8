//! Kompox CLI
//!
//! Loads resource definitions, validates them as one batch and inspects the
//! result.

use anyhow::Result;
use clap::{Parser, Subcommand};
use kompox_core::Kind;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod kom;
mod sources;

use sources::Sources;

/// kompoxops - Kompox resource definition tool
#[derive(Parser)]
#[command(name = "kompoxops")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load, validate and dry-run projection of resource definitions
    Validate {
        #[command(flatten)]
        sources: Sources,
    },

    /// List validated resources
    List {
        #[command(flatten)]
        sources: Sources,

        /// Only list resources of this kind (Workspace, Provider, Cluster, App, Box)
        #[arg(short, long)]
        kind: Option<Kind>,

        /// Only list resources at or below this FQN (e.g. ws1/prv1)
        #[arg(long)]
        scope: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for command output
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    match cli.command {
        Commands::Validate { sources } => {
            commands::validate::run(&sources).await?;
        }
        Commands::List {
            sources,
            kind,
            scope,
            json,
        } => {
            commands::list::run(&sources, kind, scope.as_deref(), json).await?;
        }
    }

    Ok(())
}
