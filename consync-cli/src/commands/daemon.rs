//! `consync daemon`: background sync daemon lifecycle and remote triggers.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde_json::Value;

use consync_daemon::paths::socket_path;
use consync_daemon::{
    request_map_town, request_status, request_stop, request_sync, start_blocking, DaemonError,
};

use super::home;

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon in the foreground (timer + socket server).
    Start,
    /// Request graceful daemon shutdown over the Unix socket.
    Stop,
    /// Query daemon runtime status over the Unix socket.
    Status,
    /// Run a sync inside the daemon and wait for its report.
    Sync(DaemonSyncArgs),
    /// Register a town-code override in the running daemon.
    MapTown(MapTownArgs),
}

#[derive(Args, Debug)]
pub struct DaemonSyncArgs {
    /// Sync only this source order number.
    #[arg(long, conflicts_with = "batch_size")]
    pub contract: Option<String>,

    /// Contracts per run; defaults to the daemon's configured batch size.
    #[arg(long)]
    pub batch_size: Option<i64>,
}

#[derive(Args, Debug)]
pub struct MapTownArgs {
    /// Source town code.
    pub from: String,
    /// Remote town code.
    pub to: String,
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let home = home()?;

    match command {
        DaemonCommand::Start => {
            start_blocking(&home).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match request_stop(&home) {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::Status => match request_status(&home) {
            Ok(status) => print_json(&status)?,
            Err(DaemonError::DaemonNotRunning { .. }) => {
                let payload = serde_json::json!({
                    "running": false,
                    "socket": socket_path(&home).display().to_string(),
                });
                print_json(&payload)?;
            }
            Err(err) => return Err(err).context("failed to query daemon status"),
        },
        DaemonCommand::Sync(args) => {
            let report = request_sync(&home, args.contract, args.batch_size)
                .context("daemon sync request failed")?;
            print_json(&report)?;
        }
        DaemonCommand::MapTown(args) => {
            let data = request_map_town(&home, &args.from, &args.to)
                .context("failed to register town override")?;
            print_json(&data)?;
        }
    }

    Ok(())
}

fn print_json(value: &Value) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to render daemon JSON")?
    );
    Ok(())
}
