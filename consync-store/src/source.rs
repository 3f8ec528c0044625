//! Read-only access to the source contract store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};

use consync_core::{Contract, ContractArea, ContractGuarantee, ContractTask, OrderNo};

use crate::error::StoreError;
use crate::schema::{status_schema_sql, CONTRACT_COLUMNS};

/// Source of contracts and their sub-records.
///
/// Sub-record lookups are keyed by the contract's `source_no`; the returned
/// records carry that number in `order_no` until the orchestrator rebinds
/// them to the remote number.
pub trait SourceRepository: Send + Sync {
    /// Contracts with no status row or a pending one, newest first, at most
    /// `limit`. `remote_no` is filled from the status row when one exists.
    fn pending_contracts(&self, limit: usize) -> Result<Vec<Contract>, StoreError>;

    /// A single contract regardless of its sync status.
    fn contract(&self, order_no: &OrderNo) -> Result<Option<Contract>, StoreError>;

    fn tasks(&self, order_no: &OrderNo) -> Result<Vec<ContractTask>, StoreError>;
    fn guarantees(&self, order_no: &OrderNo) -> Result<Vec<ContractGuarantee>, StoreError>;
    fn areas(&self, order_no: &OrderNo) -> Result<Vec<ContractArea>, StoreError>;
}

/// SQLite-backed [`SourceRepository`].
///
/// The status database is attached as `status` so the pending filter runs as
/// a single join.
pub struct SqliteSourceRepository {
    conn: Mutex<Connection>,
}

impl SqliteSourceRepository {
    /// Open the source database at `source` and attach the status database at
    /// `status_db`, creating the status tables there if they are missing.
    pub fn open(source: &Path, status_db: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            source,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_URI,
        )?;
        Self::from_connection(conn, status_db)
    }

    /// Wrap an already-open source connection.
    pub fn from_connection(conn: Connection, status_db: &Path) -> Result<Self, StoreError> {
        conn.execute(
            "ATTACH DATABASE ?1 AS status",
            params![status_db.to_string_lossy()],
        )?;
        conn.execute_batch(&status_schema_sql("status."))?;
        tracing::debug!(status_db = %status_db.display(), "status database attached");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn contract_select() -> String {
        let columns: Vec<String> = CONTRACT_COLUMNS.iter().map(|c| format!("c.{c}")).collect();
        format!(
            "SELECT c.contract_no, s.remote_order_no, {} FROM contract c \
             LEFT JOIN status.contract_sync_status s ON s.order_no = c.contract_no",
            columns.join(", ")
        )
    }

    fn query_list<T>(
        &self,
        sql: &str,
        order_no: &OrderNo,
        map: impl Fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![order_no.as_str()], map)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

impl SourceRepository for SqliteSourceRepository {
    fn pending_contracts(&self, limit: usize) -> Result<Vec<Contract>, StoreError> {
        let sql = format!(
            "{} WHERE s.order_no IS NULL OR s.status = 0 ORDER BY c.create_time DESC LIMIT ?1",
            Self::contract_select()
        );
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![limit], contract_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        tracing::debug!(count = out.len(), "pending contracts fetched");
        Ok(out)
    }

    fn contract(&self, order_no: &OrderNo) -> Result<Option<Contract>, StoreError> {
        let sql = format!("{} WHERE c.contract_no = ?1", Self::contract_select());
        let contract = self
            .conn()
            .query_row(&sql, params![order_no.as_str()], contract_from_row)
            .optional()?;
        Ok(contract)
    }

    fn tasks(&self, order_no: &OrderNo) -> Result<Vec<ContractTask>, StoreError> {
        self.query_list(
            "SELECT start_month, end_month, sale_amount, return_amount \
             FROM contract_task WHERE contract_no = ?1 ORDER BY rowid",
            order_no,
            |row| {
                Ok(ContractTask {
                    order_no: order_no.clone(),
                    start_month: text(row, 0)?,
                    end_month: text(row, 1)?,
                    sale_amount: text(row, 2)?,
                    return_amount: text(row, 3)?,
                })
            },
        )
    }

    fn guarantees(&self, order_no: &OrderNo) -> Result<Vec<ContractGuarantee>, StoreError> {
        self.query_list(
            "SELECT guarantee_no, guarantee_amount, guarantee_note \
             FROM contract_guarantee WHERE contract_no = ?1 ORDER BY rowid",
            order_no,
            |row| {
                Ok(ContractGuarantee {
                    order_no: order_no.clone(),
                    guarantee_no: text(row, 0)?,
                    guarantee_amount: text(row, 1)?,
                    guarantee_note: text(row, 2)?,
                })
            },
        )
    }

    fn areas(&self, order_no: &OrderNo) -> Result<Vec<ContractArea>, StoreError> {
        self.query_list(
            "SELECT code_prov, code_city, code_coun, code_town \
             FROM contract_area WHERE contract_no = ?1 ORDER BY rowid",
            order_no,
            |row| {
                Ok(ContractArea {
                    order_no: order_no.clone(),
                    code_prov: text(row, 0)?,
                    code_city: text(row, 1)?,
                    code_coun: text(row, 2)?,
                    code_town: text(row, 3)?,
                })
            },
        )
    }
}

/// Column value as text. NULL becomes `""`; numeric columns are rendered
/// as-is so amounts pass through unchanged.
fn text(row: &Row<'_>, idx: usize) -> rusqlite::Result<String> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) | ValueRef::Blob(t) => String::from_utf8_lossy(t).into_owned(),
    })
}

/// Walks the descriptive columns after `contract_no` and `remote_order_no`.
struct Columns<'a, 'r> {
    row: &'a Row<'r>,
    idx: usize,
}

impl Columns<'_, '_> {
    fn take(&mut self) -> rusqlite::Result<String> {
        let value = text(self.row, self.idx)?;
        self.idx += 1;
        Ok(value)
    }
}

fn contract_from_row(row: &Row<'_>) -> rusqlite::Result<Contract> {
    let remote_no = row
        .get::<_, Option<String>>(1)?
        .filter(|no| !no.is_empty())
        .map(OrderNo);
    let mut c = Columns { row, idx: 2 };
    Ok(Contract {
        source_no: OrderNo(text(row, 0)?),
        remote_no,
        contract_name: c.take()?,
        signcontract_date: c.take()?,
        first_check: c.take()?,
        recheck: c.take()?,
        signcontract_man: c.take()?,
        property: c.take()?,
        cust_no: c.take()?,
        contract_type: c.take()?,
        project_type: c.take()?,
        link_yes: c.take()?,
        pur_unit: c.take()?,
        zhanl_name: c.take()?,
        industry: c.take()?,
        industry_dw: c.take()?,
        project: c.take()?,
        project_name: c.take()?,
        project_addr: c.take()?,
        contract_amount: c.take()?,
        begin_date: c.take()?,
        end_date: c.take()?,
        o_unit: c.take()?,
        contract_num: c.take()?,
        note: c.take()?,
        create_code: c.take()?,
        code_prov: c.take()?,
        code_city: c.take()?,
        code_coun: c.take()?,
        code_town: c.take()?,
        dealer_agreement: c.take()?,
        year_contract: c.take()?,
        been_signed: c.take()?,
        ass_rat: c.take()?,
    })
}
