//! `consync sync` / `consync sync-contract`: push contracts in-process.

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;

use consync_core::OrderNo;
use consync_sync::{BatchSummary, ContractOutcome};

use super::{home, orchestrator};

/// Arguments for `consync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Contracts per run; defaults to `sync.batch_size` from the config.
    #[arg(long)]
    pub batch_size: Option<i64>,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let (config, orchestrator) = orchestrator(&home)?;
        let batch_size = self
            .batch_size
            .unwrap_or_else(|| i64::from(config.sync.batch_size));

        let summary = orchestrator.sync(batch_size);
        print_summary(&summary);
        match summary {
            BatchSummary::TokenFailed { .. } | BatchSummary::SourceFailed { .. } => {
                bail!("{summary}")
            }
            BatchSummary::Completed { failed, .. } if failed > 0 => {
                bail!("{failed} contract(s) failed to sync")
            }
            _ => Ok(()),
        }
    }
}

/// Arguments for `consync sync-contract`.
#[derive(Args, Debug)]
pub struct SyncContractArgs {
    /// Source order number of the contract.
    pub order_no: String,
}

impl SyncContractArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let (_, orchestrator) = orchestrator(&home)?;

        let outcome = orchestrator.sync_contract(&OrderNo::from(self.order_no));
        print_outcome(&outcome);
        if !outcome.is_success() {
            bail!("{outcome}");
        }
        Ok(())
    }
}

fn print_summary(summary: &BatchSummary) {
    if let BatchSummary::Completed { outcomes, .. } = summary {
        for outcome in outcomes {
            print_outcome(outcome);
        }
    }
    let line = summary.to_string();
    match summary {
        BatchSummary::TokenFailed { .. } | BatchSummary::SourceFailed { .. } => {
            println!("{}", line.red())
        }
        BatchSummary::Idle => println!("{line}"),
        BatchSummary::Completed { failed, .. } if *failed > 0 => println!("{}", line.yellow()),
        BatchSummary::Completed { .. } => println!("{}", line.green()),
    }
}

fn print_outcome(outcome: &ContractOutcome) {
    match outcome {
        ContractOutcome::Synced { .. } => println!("  {} {outcome}", "✓".green()),
        ContractOutcome::Failed { order_no, message } => {
            println!("  {} {order_no}: {message}", "✗".red())
        }
    }
}
