//! `consync status`: local sync status and audit trail of one contract.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use consync_core::{OrderNo, SyncLogEntry, SyncStatus, SyncStatusRecord};
use consync_store::{SqliteStatusStore, SyncStatusStore};

use super::{home, load_config};

/// Arguments for `consync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Source order number of the contract.
    pub order_no: String,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct StatusJson {
    order_no: String,
    status: Option<StatusRecordJson>,
    logs: Vec<LogEntryJson>,
}

#[derive(Serialize)]
struct StatusRecordJson {
    status: String,
    message: String,
    remote_order_no: Option<String>,
    synced_at: String,
    created_at: String,
    updated_at: String,
}

#[derive(Serialize)]
struct LogEntryJson {
    id: i64,
    phase: String,
    content: String,
    created_at: String,
}

#[derive(Tabled)]
struct LogTableRow {
    #[tabled(rename = "time")]
    time: String,
    #[tabled(rename = "phase")]
    phase: String,
    #[tabled(rename = "content")]
    content: String,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let config = load_config(&home)?;
        let path = config.storage.status_db_at(&home);
        let store = SqliteStatusStore::open(&path)
            .with_context(|| format!("failed to open status database {}", path.display()))?;

        let order_no = OrderNo::from(self.order_no);
        let record = store
            .status(&order_no)
            .with_context(|| format!("failed to read status of '{order_no}'"))?;
        let logs = store
            .logs(&order_no)
            .with_context(|| format!("failed to read audit log of '{order_no}'"))?;

        if self.json {
            return print_json(&order_no, record, logs);
        }
        print_table(&order_no, record.as_ref(), logs);
        Ok(())
    }
}

fn print_json(
    order_no: &OrderNo,
    record: Option<SyncStatusRecord>,
    logs: Vec<SyncLogEntry>,
) -> Result<()> {
    let payload = StatusJson {
        order_no: order_no.to_string(),
        status: record.map(|r| StatusRecordJson {
            status: r.status.to_string(),
            message: r.message,
            remote_order_no: r.remote_order_no.map(|no| no.0),
            synced_at: r.synced_at.to_rfc3339(),
            created_at: r.created_at.to_rfc3339(),
            updated_at: r.updated_at.to_rfc3339(),
        }),
        logs: logs
            .into_iter()
            .map(|entry| LogEntryJson {
                id: entry.id,
                phase: entry.phase,
                content: entry.content,
                created_at: entry.created_at.to_rfc3339(),
            })
            .collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn print_table(order_no: &OrderNo, record: Option<&SyncStatusRecord>, logs: Vec<SyncLogEntry>) {
    let Some(record) = record else {
        println!("{order_no}: {}", "never synced".bright_black());
        return;
    };

    let status = match record.status {
        SyncStatus::Success => record.status.to_string().green(),
        SyncStatus::Pending => record.status.to_string().yellow(),
    };
    println!("{} {status}", order_no.to_string().bold());
    if let Some(remote) = &record.remote_order_no {
        println!("remote order: {remote}");
    }
    if !record.message.is_empty() {
        println!("message: {}", record.message);
    }
    println!("last sync: {}", local_time(record.synced_at));

    if logs.is_empty() {
        return;
    }
    let rows: Vec<LogTableRow> = logs
        .into_iter()
        .map(|entry| LogTableRow {
            time: local_time(entry.created_at),
            phase: entry.phase,
            content: entry.content,
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn local_time(at: chrono::DateTime<chrono::Utc>) -> String {
    at.with_timezone(&chrono::Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
