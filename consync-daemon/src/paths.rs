use std::path::{Path, PathBuf};

use consync_core::config::consync_root;

pub const DAEMON_SOCKET: &str = "daemon.sock";

pub fn socket_path(home: &Path) -> PathBuf {
    consync_root(home).join(DAEMON_SOCKET)
}
