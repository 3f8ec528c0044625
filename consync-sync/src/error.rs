//! Error types for consync-sync.

use std::fmt;

use thiserror::Error;

use consync_gateway::GatewayError;
use consync_store::StoreError;

/// Remote push phase of a single contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushPhase {
    Contract,
    Task,
    Guarantee,
    Area,
}

impl PushPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            PushPhase::Contract => "contract",
            PushPhase::Task => "task",
            PushPhase::Guarantee => "guarantee",
            PushPhase::Area => "area",
        }
    }
}

impl fmt::Display for PushPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All errors that can arise while syncing.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Login failed; carries the remote (or transport) message.
    #[error("token acquisition failed: {0}")]
    Token(String),

    /// The remote answered a push with a non-success state.
    #[error("{phase} push failed: {message}")]
    Remote { phase: PushPhase, message: String },

    /// A push never got an answer from the remote application.
    #[error("{phase} push failed (transport): {message}")]
    Transport { phase: PushPhase, message: String },

    /// Reading contracts or sub-records from the source store failed.
    #[error("source read failed: {0}")]
    Source(#[source] StoreError),

    /// Reading or writing the local status store failed.
    #[error("status store error: {0}")]
    Persistence(#[source] StoreError),

    /// The contract upsert succeeded but no order number is known.
    #[error("contract push failed: remote returned no order number")]
    NoRemoteOrderNo,

    /// Non-push gateway calls (reference data, delete).
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl SyncError {
    pub(crate) fn push(phase: PushPhase, err: GatewayError) -> Self {
        if err.is_transport() {
            SyncError::Transport {
                phase,
                message: err.message(),
            }
        } else {
            SyncError::Remote {
                phase,
                message: err.message(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_errors_name_their_phase() {
        let remote = SyncError::push(
            PushPhase::Task,
            GatewayError::Remote {
                endpoint: "task upsert",
                message: "bad month".into(),
            },
        );
        assert_eq!(remote.to_string(), "task push failed: bad month");

        let transport = SyncError::push(
            PushPhase::Area,
            GatewayError::Transport {
                endpoint: "area upsert",
                message: "timed out".into(),
            },
        );
        assert_eq!(
            transport.to_string(),
            "area push failed (transport): timed out"
        );
    }
}
