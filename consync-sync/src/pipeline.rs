//! Shared wiring used by the CLI and the daemon.

use std::path::Path;
use std::sync::Arc;

use consync_core::{AreaCodeConverter, Config};
use consync_gateway::HttpGateway;
use consync_store::{SqliteSourceRepository, SqliteStatusStore};

use crate::error::SyncError;
use crate::orchestrator::SyncOrchestrator;

/// Build an orchestrator over the HTTP gateway and the SQLite stores named
/// by `config`, resolving default database paths under `home`.
///
/// The status database is opened (and created) before the source database
/// attaches it.
pub fn orchestrator_at(home: &Path, config: &Config) -> Result<SyncOrchestrator, SyncError> {
    let status_db = config.storage.status_db_at(home);
    let source_db = config.storage.source_db_at(home);

    let status = SqliteStatusStore::open(&status_db).map_err(SyncError::Persistence)?;
    let source =
        SqliteSourceRepository::open(&source_db, &status_db).map_err(SyncError::Source)?;
    let converter = AreaCodeConverter::with_overrides(config.town_overrides.clone());

    tracing::debug!(
        source_db = %source_db.display(),
        status_db = %status_db.display(),
        overrides = config.town_overrides.len(),
        "sync pipeline ready",
    );
    Ok(SyncOrchestrator::new(
        config,
        Arc::new(HttpGateway::new(&config.api)),
        Arc::new(source),
        Arc::new(status),
        Arc::new(converter),
    ))
}
