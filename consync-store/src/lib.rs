//! consync-store: local persistence.
//!
//! - [`status`]: [`SyncStatusStore`] and its SQLite implementation
//! - [`source`]: [`SourceRepository`] over the source contract database
//! - [`schema`]: table layouts for both databases

pub mod error;
pub mod schema;
pub mod source;
pub mod status;

pub use error::StoreError;
pub use source::{SourceRepository, SqliteSourceRepository};
pub use status::{SqliteStatusStore, SyncStatusStore};
