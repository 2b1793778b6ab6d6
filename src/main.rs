//! Discard API server.
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!                 │         coordinator          │
//!                 │  sea-orm pool · supervisor   │
//!                 └──────┬───────────────┬───────┘
//!          stdin/stdout  │  NDJSON IPC   │
//!                 ┌──────▼─────┐  ┌──────▼─────┐
//!   clients ────▶ │  worker 1  │  │  worker N  │ ◀──── clients
//!                 │ axum·relay │  │ axum·relay │
//!                 └────────────┘  └────────────┘
//!                  (one shared SO_REUSEPORT listener address)
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use discard::config::load_or_default;
use discard::coordinator::run_coordinator;
use discard::observability::init_logging;
use discard::worker::run_worker;

#[derive(Parser)]
#[command(name = "discard")]
#[command(about = "Multi-process web API backend", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Own the database and supervise workers (default)
    Coordinator,
    /// Serve HTTP, relaying queries to the coordinator over stdin/stdout
    #[command(hide = true)]
    Worker {
        #[arg(long)]
        slot: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_or_default(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Coordinator) {
        Commands::Coordinator => {
            init_logging(&config.observability, "coordinator");
            tracing::info!(version = env!("CARGO_PKG_VERSION"), "discard starting");
            run_coordinator(config, cli.config).await?;
        }
        Commands::Worker { slot } => {
            init_logging(&config.observability, &format!("worker-{slot}"));
            run_worker(config, slot).await?;
        }
    }

    Ok(())
}
