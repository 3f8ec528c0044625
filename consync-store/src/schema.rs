//! SQL layouts.
//!
//! The status database is owned by this crate. The source layout is what
//! [`crate::SqliteSourceRepository`] reads; it is created by whatever feeds
//! the source store, never by consync itself.

/// Status + audit tables, optionally qualified with an attached schema name
/// (`""` or `"status."`).
pub fn status_schema_sql(schema: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {schema}contract_sync_status (
          order_no TEXT PRIMARY KEY,
          status INTEGER NOT NULL DEFAULT 0,
          message TEXT NOT NULL DEFAULT '',
          remote_order_no TEXT,
          sync_time TEXT NOT NULL,
          create_time TEXT NOT NULL,
          update_time TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS {schema}contract_sync_log (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          order_no TEXT NOT NULL,
          type TEXT NOT NULL,
          content TEXT NOT NULL,
          create_time TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS {schema}idx_contract_sync_log_order
          ON contract_sync_log(order_no, id);
        "#
    )
}

/// Expected source layout. Area codes keep the source (short) scheme.
pub const SOURCE_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS contract (
  contract_no TEXT PRIMARY KEY,
  create_time TEXT NOT NULL,
  contract_name TEXT,
  signcontract_date TEXT,
  first_check TEXT,
  recheck TEXT,
  signcontract_man TEXT,
  property TEXT,
  cust_no TEXT,
  contract_type TEXT,
  project_type TEXT,
  link_yes TEXT,
  pur_unit TEXT,
  zhanl_name TEXT,
  industry TEXT,
  industry_dw TEXT,
  project TEXT,
  project_name TEXT,
  project_addr TEXT,
  contract_amount TEXT,
  begin_date TEXT,
  end_date TEXT,
  o_unit TEXT,
  contract_num TEXT,
  note TEXT,
  create_code TEXT,
  code_prov TEXT,
  code_city TEXT,
  code_coun TEXT,
  code_town TEXT,
  dealer_agreement TEXT,
  year_contract TEXT,
  been_signed TEXT,
  ass_rat TEXT
);

CREATE TABLE IF NOT EXISTS contract_task (
  contract_no TEXT NOT NULL,
  start_month TEXT,
  end_month TEXT,
  sale_amount TEXT,
  return_amount TEXT
);

CREATE TABLE IF NOT EXISTS contract_guarantee (
  contract_no TEXT NOT NULL,
  guarantee_no TEXT,
  guarantee_amount TEXT,
  guarantee_note TEXT
);

CREATE TABLE IF NOT EXISTS contract_area (
  contract_no TEXT NOT NULL,
  code_prov TEXT,
  code_city TEXT,
  code_coun TEXT,
  code_town TEXT
);
"#;

/// Descriptive contract columns, in [`consync_core::Contract`] field order.
pub const CONTRACT_COLUMNS: [&str; 32] = [
    "contract_name",
    "signcontract_date",
    "first_check",
    "recheck",
    "signcontract_man",
    "property",
    "cust_no",
    "contract_type",
    "project_type",
    "link_yes",
    "pur_unit",
    "zhanl_name",
    "industry",
    "industry_dw",
    "project",
    "project_name",
    "project_addr",
    "contract_amount",
    "begin_date",
    "end_date",
    "o_unit",
    "contract_num",
    "note",
    "create_code",
    "code_prov",
    "code_city",
    "code_coun",
    "code_town",
    "dealer_agreement",
    "year_contract",
    "been_signed",
    "ass_rat",
];
