//! Channel error types.

use keynav_core::errors::{self, MessageError, RemoteError};

/// Failure of a one-way transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The other side is gone.
    #[error("transport closed")]
    Closed,
}

/// Failure of a request or notification on a [`Channel`](crate::Channel).
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The channel was torn down before a response arrived.
    #[error("channel disconnected")]
    Disconnected,
    /// No response across two liveness sweeps.
    #[error("request {id} went stale without a response")]
    Stale {
        /// Transaction id.
        id: u64,
    },
    /// The peer's handler rejected the request.
    #[error("request rejected: {0}")]
    Rejected(RemoteError),
    /// The transport refused the message.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// A typed message could not be encoded or a reply decoded.
    #[error(transparent)]
    Message(#[from] MessageError),
}

impl ChannelError {
    /// Error code of a rejection, if this is one.
    pub fn remote_code(&self) -> Option<&str> {
        match self {
            Self::Rejected(e) => Some(&e.code),
            _ => None,
        }
    }
}

impl From<ChannelError> for RemoteError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Rejected(e) => e,
            ChannelError::Message(e) => e.into(),
            ChannelError::Disconnected | ChannelError::Transport(_) => {
                Self::new(errors::FRAME_DISCONNECTED, err.to_string())
            }
            ChannelError::Stale { .. } => Self::internal(err.to_string()),
        }
    }
}
