//! `consync areas`: remote area-code hierarchy.

use anyhow::{Context, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use super::{home, orchestrator};

/// Arguments for `consync areas`.
#[derive(Args, Debug)]
pub struct AreasArgs {
    /// Restrict to one province code.
    #[arg(long)]
    pub province: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct AreaTableRow {
    #[tabled(rename = "level")]
    level: u8,
    #[tabled(rename = "code")]
    code: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "parent")]
    parent: String,
}

impl AreasArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let (_, orchestrator) = orchestrator(&home)?;

        let areas = orchestrator
            .area_codes(self.province.as_deref())
            .context("failed to query area codes")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(areas.as_slice())
                    .context("failed to serialize area codes")?
            );
            return Ok(());
        }

        if areas.is_empty() {
            println!("No area codes returned.");
            return Ok(());
        }
        let rows: Vec<AreaTableRow> = areas
            .iter()
            .map(|area| AreaTableRow {
                level: area.level,
                code: area.code.clone(),
                name: area.name.clone(),
                parent: area.parent_code.clone(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        println!("{} area codes", areas.len());
        Ok(())
    }
}
