//! Wire-format error body and error code constants.
//!
//! Only structurally cloneable data crosses a context boundary, so a failed
//! remote handler is reported as a [`RemoteError`] rather than a live error
//! object.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Error code constants ────────────────────────────────────────────

/// Payload could not be decoded into the expected message.
pub const INVALID_MESSAGE: &str = "INVALID_MESSAGE";
/// Unexpected internal error.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
/// No request handler is registered on the receiving channel.
pub const NO_HANDLER: &str = "NO_HANDLER";
/// The handler panicked before settling.
pub const HANDLER_PANICKED: &str = "HANDLER_PANICKED";
/// Message is valid but not handled by this side.
pub const UNSUPPORTED: &str = "UNSUPPORTED";
/// Operation not valid in the current mode.
pub const INVALID_OPERATION: &str = "INVALID_OPERATION";
/// Filter text matched no hint target.
pub const NO_MATCH: &str = "NO_MATCH";
/// Target frame is not connected.
pub const FRAME_DISCONNECTED: &str = "FRAME_DISCONNECTED";

/// Serializable error description sent in a rejected response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("[{code}] {message}")]
pub struct RemoteError {
    /// Machine-readable error code (e.g. `NO_MATCH`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl RemoteError {
    /// Build an error body.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Internal error with the given message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }

    /// Recover an error body from an arbitrary rejection payload.
    ///
    /// Peers are expected to send a `RemoteError`, but anything else is kept
    /// as the message text.
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value::<Self>(value.clone()) {
            Ok(err) => err,
            Err(_) => Self::internal(match value {
                Value::String(s) => s,
                other => other.to_string(),
            }),
        }
    }

    /// Convert to a JSON payload.
    pub fn to_value(&self) -> Value {
        serde_json::json!({ "code": self.code, "message": self.message })
    }
}

/// Failure to encode or decode a typed message.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// Payload did not match the expected shape.
    #[error("invalid message payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<MessageError> for RemoteError {
    fn from(err: MessageError) -> Self {
        Self::new(INVALID_MESSAGE, err.to_string())
    }
}
