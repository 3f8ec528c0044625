//! `consync delete`: remove a contract on the remote side.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use consync_core::OrderNo;

use super::{home, orchestrator};

/// Arguments for `consync delete`.
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Remote order number, as assigned by the CRM.
    pub remote_no: String,
}

impl DeleteArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let (_, orchestrator) = orchestrator(&home)?;

        let remote_no = OrderNo::from(self.remote_no);
        let message = orchestrator
            .delete_remote(&remote_no)
            .with_context(|| format!("failed to delete remote contract '{remote_no}'"))?;

        if message.is_empty() {
            println!("{} deleted {remote_no}", "✓".green());
        } else {
            println!("{} deleted {remote_no}: {message}", "✓".green());
        }
        Ok(())
    }
}
