//! Subcommand implementations.

pub mod areas;
pub mod config;
pub mod daemon;
pub mod delete;
pub mod status;
pub mod sync;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use consync_core::Config;
use consync_sync::{pipeline, SyncOrchestrator};

pub(crate) fn home() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

pub(crate) fn load_config(home: &Path) -> Result<Config> {
    consync_core::config::load_at(home).context("failed to load config")
}

/// Load the config and wire an orchestrator over the configured databases.
pub(crate) fn orchestrator(home: &Path) -> Result<(Config, SyncOrchestrator)> {
    let config = load_config(home)?;
    let orchestrator =
        pipeline::orchestrator_at(home, &config).context("failed to open sync stores")?;
    Ok((config, orchestrator))
}
