//! Local sync status table and append-only audit log.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use consync_core::{OrderNo, Phase, SyncLogEntry, SyncStatus, SyncStatusRecord};

use crate::error::{io_err, StoreError};
use crate::schema::status_schema_sql;

/// Persistence for per-contract sync status and the audit trail.
///
/// Implementations must be safe to share between the orchestrator and the
/// daemon's request handlers.
pub trait SyncStatusStore: Send + Sync {
    /// Insert or update the status row for `order_no`.
    ///
    /// `remote_order_no = None` keeps whatever remote number is already
    /// stored, so a later failure never erases a number the remote assigned.
    fn upsert_status(
        &self,
        order_no: &OrderNo,
        status: SyncStatus,
        message: &str,
        remote_order_no: Option<&OrderNo>,
    ) -> Result<(), StoreError>;

    /// Append one audit row. Rows are never updated or deleted.
    fn append_log(&self, order_no: &OrderNo, phase: Phase, content: &str)
        -> Result<(), StoreError>;

    fn status(&self, order_no: &OrderNo) -> Result<Option<SyncStatusRecord>, StoreError>;

    /// Audit rows for `order_no`, oldest first.
    fn logs(&self, order_no: &OrderNo) -> Result<Vec<SyncLogEntry>, StoreError>;

    /// Forget `remote_order_no` wherever it is stored, leaving status and
    /// message as they are. Returns the source order numbers that held it.
    fn clear_remote_order_no(&self, remote_order_no: &OrderNo)
        -> Result<Vec<OrderNo>, StoreError>;

    fn is_already_synced(&self, order_no: &OrderNo) -> Result<bool, StoreError> {
        Ok(self
            .status(order_no)?
            .is_some_and(|record| record.status == SyncStatus::Success))
    }
}

/// SQLite-backed [`SyncStatusStore`].
pub struct SqliteStatusStore {
    conn: Mutex<Connection>,
}

impl SqliteStatusStore {
    /// Open (or create) the status database at `path` and apply the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(&status_schema_sql(""))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SyncStatusStore for SqliteStatusStore {
    fn upsert_status(
        &self,
        order_no: &OrderNo,
        status: SyncStatus,
        message: &str,
        remote_order_no: Option<&OrderNo>,
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.conn().execute(
            r#"
            INSERT INTO contract_sync_status
              (order_no, status, message, remote_order_no, sync_time, create_time, update_time)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?5)
            ON CONFLICT(order_no) DO UPDATE SET
              status = excluded.status,
              message = excluded.message,
              remote_order_no = COALESCE(excluded.remote_order_no, contract_sync_status.remote_order_no),
              sync_time = excluded.sync_time,
              update_time = excluded.update_time
            "#,
            params![
                order_no.as_str(),
                status.code(),
                message,
                remote_order_no.map(OrderNo::as_str),
                now
            ],
        )?;
        tracing::debug!(order_no = %order_no, status = %status, "status upserted");
        Ok(())
    }

    fn append_log(
        &self,
        order_no: &OrderNo,
        phase: Phase,
        content: &str,
    ) -> Result<(), StoreError> {
        self.conn().execute(
            "INSERT INTO contract_sync_log (order_no, type, content, create_time) VALUES (?1, ?2, ?3, ?4)",
            params![order_no.as_str(), phase.as_str(), content, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn status(&self, order_no: &OrderNo) -> Result<Option<SyncStatusRecord>, StoreError> {
        let record = self
            .conn()
            .query_row(
                r#"
                SELECT order_no, status, message, remote_order_no, sync_time, create_time, update_time
                FROM contract_sync_status
                WHERE order_no = ?1
                "#,
                params![order_no.as_str()],
                status_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn logs(&self, order_no: &OrderNo) -> Result<Vec<SyncLogEntry>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, order_no, type, content, create_time FROM contract_sync_log WHERE order_no = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![order_no.as_str()], |row| {
            Ok(SyncLogEntry {
                id: row.get(0)?,
                order_no: OrderNo(row.get(1)?),
                phase: row.get(2)?,
                content: row.get(3)?,
                created_at: timestamp(row, 4)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn clear_remote_order_no(
        &self,
        remote_order_no: &OrderNo,
    ) -> Result<Vec<OrderNo>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            r#"
            UPDATE contract_sync_status
            SET remote_order_no = NULL, update_time = ?2
            WHERE remote_order_no = ?1
            RETURNING order_no
            "#,
        )?;
        let rows = stmt.query_map(
            params![remote_order_no.as_str(), Utc::now().to_rfc3339()],
            |row| row.get::<_, String>(0),
        )?;
        let mut cleared = Vec::new();
        for row in rows {
            cleared.push(OrderNo(row?));
        }
        tracing::debug!(remote_order_no = %remote_order_no, count = cleared.len(), "remote order number cleared");
        Ok(cleared)
    }
}

fn status_from_row(row: &Row<'_>) -> rusqlite::Result<SyncStatusRecord> {
    Ok(SyncStatusRecord {
        order_no: OrderNo(row.get(0)?),
        status: SyncStatus::from_code(row.get(1)?),
        message: row.get(2)?,
        remote_order_no: row
            .get::<_, Option<String>>(3)?
            .filter(|no| !no.is_empty())
            .map(OrderNo),
        synced_at: timestamp(row, 4)?,
        created_at: timestamp(row, 5)?,
        updated_at: timestamp(row, 6)?,
    })
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no(s: &str) -> OrderNo {
        OrderNo::from(s)
    }

    #[test]
    fn missing_status_is_none_and_not_synced() {
        let store = SqliteStatusStore::open_in_memory().unwrap();
        assert!(store.status(&no("HT-1")).unwrap().is_none());
        assert!(!store.is_already_synced(&no("HT-1")).unwrap());
    }

    #[test]
    fn upsert_inserts_then_updates_single_row() {
        let store = SqliteStatusStore::open_in_memory().unwrap();
        store
            .upsert_status(&no("HT-1"), SyncStatus::Pending, "first", None)
            .unwrap();
        let first = store.status(&no("HT-1")).unwrap().unwrap();

        store
            .upsert_status(&no("HT-1"), SyncStatus::Success, "second", None)
            .unwrap();
        let second = store.status(&no("HT-1")).unwrap().unwrap();

        assert_eq!(second.status, SyncStatus::Success);
        assert_eq!(second.message, "second");
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
        assert!(store.is_already_synced(&no("HT-1")).unwrap());

        let count: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM contract_sync_status", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn remote_order_no_survives_later_upserts_without_one() {
        let store = SqliteStatusStore::open_in_memory().unwrap();
        store
            .upsert_status(
                &no("HT-1"),
                SyncStatus::Pending,
                "contract created, sub-records pending",
                Some(&no("R-77")),
            )
            .unwrap();
        store
            .upsert_status(&no("HT-1"), SyncStatus::Pending, "sync failed: task", None)
            .unwrap();

        let record = store.status(&no("HT-1")).unwrap().unwrap();
        assert_eq!(record.remote_order_no, Some(no("R-77")));
        assert_eq!(record.message, "sync failed: task");
    }

    #[test]
    fn clearing_a_remote_order_no_keeps_status_and_message() {
        let store = SqliteStatusStore::open_in_memory().unwrap();
        store
            .upsert_status(&no("HT-1"), SyncStatus::Success, "{}", Some(&no("R-1")))
            .unwrap();
        store
            .upsert_status(&no("HT-2"), SyncStatus::Success, "{}", Some(&no("R-2")))
            .unwrap();

        let cleared = store.clear_remote_order_no(&no("R-1")).unwrap();
        assert_eq!(cleared, vec![no("HT-1")]);

        let record = store.status(&no("HT-1")).unwrap().unwrap();
        assert_eq!(record.remote_order_no, None);
        assert_eq!(record.status, SyncStatus::Success);
        assert_eq!(record.message, "{}");
        let other = store.status(&no("HT-2")).unwrap().unwrap();
        assert_eq!(other.remote_order_no, Some(no("R-2")));

        assert!(store.clear_remote_order_no(&no("R-1")).unwrap().is_empty());
    }

    #[test]
    fn logs_are_append_only_in_insertion_order() {
        let store = SqliteStatusStore::open_in_memory().unwrap();
        store.append_log(&no("HT-1"), Phase::Start, "{}").unwrap();
        store.append_log(&no("HT-2"), Phase::Start, "{}").unwrap();
        store.append_log(&no("HT-1"), Phase::Create, "ok").unwrap();
        store.append_log(&no("HT-1"), Phase::Complete, "done").unwrap();

        let logs = store.logs(&no("HT-1")).unwrap();
        let phases: Vec<&str> = logs.iter().map(|l| l.phase.as_str()).collect();
        assert_eq!(phases, ["START", "CREATE", "COMPLETE"]);
        assert!(logs.windows(2).all(|w| w[0].id < w[1].id));
        assert_eq!(logs[1].content, "ok");
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("status.db");
        let store = SqliteStatusStore::open(&path).unwrap();
        store
            .upsert_status(&no("HT-1"), SyncStatus::Success, "ok", None)
            .unwrap();
        drop(store);

        let reopened = SqliteStatusStore::open(&path).unwrap();
        assert!(reopened.is_already_synced(&no("HT-1")).unwrap());
    }
}
