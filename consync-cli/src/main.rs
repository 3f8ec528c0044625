//! consync: push local contracts to the remote CRM.
//!
//! # Usage
//!
//! ```text
//! consync sync [--batch-size N]
//! consync sync-contract <ORDER_NO>
//! consync status <ORDER_NO> [--json]
//! consync areas [--province P] [--json]
//! consync delete <REMOTE_NO>
//! consync config init --base-url URL --username NAME [--force]
//! consync config show
//! consync daemon start|stop|status
//! consync daemon sync [--contract X] [--batch-size N]
//! consync daemon map-town <FROM> <TO>
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    areas::AreasArgs,
    config::ConfigCommand,
    daemon::DaemonCommand,
    delete::DeleteArgs,
    status::StatusArgs,
    sync::{SyncArgs, SyncContractArgs},
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "consync",
    version,
    about = "Synchronize local contracts to the remote CRM",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Push a batch of pending contracts.
    Sync(SyncArgs),

    /// Push one contract by its source order number.
    SyncContract(SyncContractArgs),

    /// Show the sync status and audit trail of one contract.
    Status(StatusArgs),

    /// List the remote area-code hierarchy.
    Areas(AreasArgs),

    /// Delete a contract on the remote side.
    Delete(DeleteArgs),

    /// Create or inspect `~/.consync/config.yaml`.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Run or talk to the background sync daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    consync_daemon::init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Sync(args) => args.run(),
        Commands::SyncContract(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Areas(args) => args.run(),
        Commands::Delete(args) => args.run(),
        Commands::Config { command } => commands::config::run(command),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
