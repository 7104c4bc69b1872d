//! Coordinator error types.

use keynav_core::errors::{self, RemoteError};
use keynav_core::{FrameId, MessageError, TabId};
use keynav_rpc::ChannelError;

/// Failure reported by a [`TabHost`](crate::host::TabHost) call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HostError(pub String);

/// Errors raised while routing or executing frame messages.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// No record for the frame; it disconnected or never registered.
    #[error("frame {frame_id} is not connected")]
    FrameDisconnected {
        /// Target frame.
        frame_id: FrameId,
    },

    /// The tab context is gone.
    #[error("tab {0} not found")]
    TabNotFound(TabId),

    /// A message arrived on a channel before `registerFrame`.
    #[error("frame has not registered")]
    NotRegistered,

    /// A request to a frame failed.
    #[error("frame {frame_id}: {source}")]
    Channel {
        /// Target frame.
        frame_id: FrameId,
        /// Underlying channel failure.
        #[source]
        source: ChannelError,
    },

    /// The host tab API failed.
    #[error("host error: {0}")]
    Host(#[from] HostError),

    /// Hint-mode operation failed.
    #[error(transparent)]
    Hint(#[from] HintError),

    /// No command is registered under the name.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// Console input matched several commands.
    #[error("ambiguous command '{input}': {}", candidates.join(", "))]
    AmbiguousCommand {
        /// What was typed.
        input: String,
        /// Every matching command name.
        candidates: Vec<String>,
    },

    /// A message could not be encoded or decoded.
    #[error(transparent)]
    Message(#[from] MessageError),

    /// The command needs an argument that was not given.
    #[error("command '{command}' needs an argument")]
    MissingArgument {
        /// Command name.
        command: String,
    },
}

impl CoordinatorError {
    /// Whether the user should see this error as a status message. Hint
    /// operations show their own messages.
    pub fn is_user_visible(&self) -> bool {
        match self {
            Self::Host(_)
            | Self::UnknownCommand(_)
            | Self::AmbiguousCommand { .. }
            | Self::MissingArgument { .. } => true,
            Self::Hint(_)
            | Self::FrameDisconnected { .. }
            | Self::TabNotFound(_)
            | Self::NotRegistered
            | Self::Message(_)
            | Self::Channel { .. } => false,
        }
    }
}

impl From<CoordinatorError> for RemoteError {
    fn from(err: CoordinatorError) -> Self {
        let code = match &err {
            CoordinatorError::FrameDisconnected { .. } | CoordinatorError::Channel { .. } => {
                errors::FRAME_DISCONNECTED
            }
            CoordinatorError::Hint(HintError::NoMatch { .. }) => errors::NO_MATCH,
            CoordinatorError::NotRegistered | CoordinatorError::Hint(_) => errors::INVALID_OPERATION,
            CoordinatorError::UnknownCommand(_)
            | CoordinatorError::AmbiguousCommand { .. }
            | CoordinatorError::MissingArgument { .. } => errors::UNSUPPORTED,
            CoordinatorError::Message(_) => errors::INVALID_MESSAGE,
            CoordinatorError::TabNotFound(_) | CoordinatorError::Host(_) => errors::INTERNAL_ERROR,
        };
        RemoteError::new(code, err.to_string())
    }
}

/// Hint-mode failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HintError {
    /// The filter matched no target; the previous filter stays.
    #[error("no match for '{text}'")]
    NoMatch {
        /// Rejected filter text.
        text: String,
    },
    /// Collection found nothing to hint.
    #[error("no hint targets")]
    NoTargets,
    /// The tab is not in hint mode.
    #[error("hint mode is not active")]
    NotActive,
}
