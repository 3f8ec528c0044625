//! Domain types for contract synchronization.
//!
//! Field names on the record structs mirror the remote system's wire keys so
//! the gateway can serialize them without a rename table.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Order number correlating a contract across the source and remote systems.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNo(pub String);

impl OrderNo {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for OrderNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for OrderNo {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderNo {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Authentication token issued by the remote login endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(pub String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens end up in log lines; keep them out of Debug output.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Persisted sync status of one contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    /// Never synced, or the last attempt failed.
    #[default]
    Pending,
    Success,
}

impl SyncStatus {
    /// Integer code stored in the status table (0 = pending/failed, 1 = success).
    pub fn code(self) -> i64 {
        match self {
            SyncStatus::Pending => 0,
            SyncStatus::Success => 1,
        }
    }

    pub fn from_code(code: i64) -> Self {
        if code == 1 {
            SyncStatus::Success
        } else {
            SyncStatus::Pending
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Pending => write!(f, "pending"),
            SyncStatus::Success => write!(f, "success"),
        }
    }
}

/// Audit-log phase tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Start,
    Create,
    Task,
    Guarantee,
    Area,
    Complete,
    Error,
    /// The remote contract was deleted.
    Delete,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Start => "START",
            Phase::Create => "CREATE",
            Phase::Task => "TASK",
            Phase::Guarantee => "GUARANTEE",
            Phase::Area => "AREA",
            Phase::Complete => "COMPLETE",
            Phase::Error => "ERROR",
            Phase::Delete => "DELETE",
        }
    }

    /// Parse a stored tag. Unknown tags map to `None`.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "START" => Some(Phase::Start),
            "CREATE" => Some(Phase::Create),
            "TASK" => Some(Phase::Task),
            "GUARANTEE" => Some(Phase::Guarantee),
            "AREA" => Some(Phase::Area),
            "COMPLETE" => Some(Phase::Complete),
            "ERROR" => Some(Phase::Error),
            "DELETE" => Some(Phase::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Source records
// ---------------------------------------------------------------------------

/// A contract read from the source store.
///
/// `source_no` keys the status table and sub-record lookups. `remote_no` is
/// set once the remote system has assigned an order number.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Contract {
    #[serde(skip)]
    pub source_no: OrderNo,
    #[serde(skip)]
    pub remote_no: Option<OrderNo>,
    pub contract_name: String,
    pub signcontract_date: String,
    pub first_check: String,
    pub recheck: String,
    pub signcontract_man: String,
    pub property: String,
    pub cust_no: String,
    pub contract_type: String,
    pub project_type: String,
    pub link_yes: String,
    pub pur_unit: String,
    pub zhanl_name: String,
    pub industry: String,
    pub industry_dw: String,
    pub project: String,
    pub project_name: String,
    pub project_addr: String,
    pub contract_amount: String,
    pub begin_date: String,
    pub end_date: String,
    pub o_unit: String,
    pub contract_num: String,
    pub note: String,
    pub create_code: String,
    #[serde(rename = "Code_prov")]
    pub code_prov: String,
    #[serde(rename = "Code_city")]
    pub code_city: String,
    #[serde(rename = "Code_coun")]
    pub code_coun: String,
    #[serde(rename = "Code_town")]
    pub code_town: String,
    pub dealer_agreement: String,
    pub year_contract: String,
    pub been_signed: String,
    pub ass_rat: String,
}

/// Sales / repayment task attached to a contract.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContractTask {
    pub order_no: OrderNo,
    pub start_month: String,
    pub end_month: String,
    /// Unit: ten thousand.
    pub sale_amount: String,
    pub return_amount: String,
}

/// Guarantee deposit attached to a contract.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContractGuarantee {
    pub order_no: OrderNo,
    pub guarantee_no: String,
    pub guarantee_amount: String,
    pub guarantee_note: String,
}

/// Sales area attached to a contract.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContractArea {
    pub order_no: OrderNo,
    pub code_prov: String,
    pub code_city: String,
    pub code_coun: String,
    pub code_town: String,
}

/// One node of the remote four-level area hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaCode {
    pub code: String,
    pub name: String,
    pub parent_code: String,
    /// 1 = province, 2 = city, 3 = county, 4 = town.
    pub level: u8,
}

// ---------------------------------------------------------------------------
// Local persistence records
// ---------------------------------------------------------------------------

/// One row of the status table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatusRecord {
    pub order_no: OrderNo,
    pub status: SyncStatus,
    pub message: String,
    pub remote_order_no: Option<OrderNo>,
    pub synced_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of the append-only audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncLogEntry {
    pub id: i64,
    pub order_no: OrderNo,
    /// Raw tag as stored; see [`Phase::parse`].
    pub phase: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
