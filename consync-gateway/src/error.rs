//! Error types for consync-gateway.

use thiserror::Error;

/// All errors a [`crate::RemoteGateway`] call can return.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Network failure, timeout, or non-2xx HTTP status.
    #[error("transport error calling {endpoint}: {message}")]
    Transport {
        endpoint: &'static str,
        message: String,
    },

    /// The body could not be decoded as the expected JSON shape.
    #[error("could not decode response from {endpoint}: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The remote answered with `state != 1`.
    #[error("{endpoint} rejected the request: {message}")]
    Remote {
        endpoint: &'static str,
        message: String,
    },
}

impl GatewayError {
    /// Remote-reported message, or the transport description.
    pub fn message(&self) -> String {
        match self {
            GatewayError::Transport { message, .. } | GatewayError::Remote { message, .. } => {
                message.clone()
            }
            GatewayError::Decode { source, .. } => source.to_string(),
        }
    }

    /// True for failures that never reached the remote application layer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            GatewayError::Transport { .. } | GatewayError::Decode { .. }
        )
    }
}
