//! # consync-sync
//!
//! Token lifecycle, reference-data caching and the per-contract push
//! pipeline.
//!
//! Build a [`SyncOrchestrator`] from a gateway, a source repository and a
//! status store, then call [`SyncOrchestrator::sync`] for a batch or
//! [`SyncOrchestrator::sync_contract`] for one contract.
//! [`pipeline::orchestrator_at`] wires the HTTP gateway and SQLite stores
//! from a loaded config.

pub mod area_cache;
pub mod error;
pub mod orchestrator;
pub mod outcome;
pub mod pipeline;
pub mod token;

pub use area_cache::AreaCodeCache;
pub use error::{PushPhase, SyncError};
pub use orchestrator::SyncOrchestrator;
pub use outcome::{BatchSummary, ContractOutcome};
pub use token::{Clock, SystemClock, TokenCache};
