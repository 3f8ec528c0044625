//! Daemon runtime: periodic timer + sync processor + socket server.

mod error;
pub mod paths;
pub mod protocol;
mod runtime;

pub use error::DaemonError;
pub use protocol::{
    request_map_town, request_status, request_stop, request_sync, send_request, DaemonRequest,
    DaemonResponse,
};
pub use runtime::{init_tracing, run, serve, start_blocking, DaemonSettings, SyncReport};
