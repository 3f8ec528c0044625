//! consync core library: domain types, area-code transcoding, configuration.
//!
//! - [`types`]: newtypes and domain structs
//! - [`area`]: [`AreaCodeConverter`] and the reference-data hierarchy parser
//! - [`config`]: load / save `config.yaml`
//! - [`error`]: [`ConfigError`]

pub mod area;
pub mod config;
pub mod error;
pub mod types;

pub use area::{parse_area_hierarchy, AreaCodeConverter, RawAreaResponse, RawAreaRow};
pub use config::Config;
pub use error::ConfigError;
pub use types::{
    AreaCode, Contract, ContractArea, ContractGuarantee, ContractTask, OrderNo, Phase,
    SyncLogEntry, SyncStatus, SyncStatusRecord, Token,
};
