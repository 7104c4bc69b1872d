//! Wire envelopes.
//!
//! ```json
//! {"kind": "request", "id": 4, "payload": {...}}
//! {"kind": "response", "id": 4, "ok": false, "payload": {"code": "NO_MATCH", "message": "..."}}
//! {"kind": "notification", "payload": {...}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One message on a channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Envelope {
    /// Expects exactly one response with the same id.
    Request {
        /// Transaction id, unique among the sender's pending requests.
        id: u64,
        /// Message body.
        payload: Value,
    },
    /// Settles the request with the same id.
    Response {
        /// Transaction id of the request.
        id: u64,
        /// `false` when `payload` is a rejection (`RemoteError` body).
        ok: bool,
        /// Result or error body.
        payload: Value,
    },
    /// Fire-and-forget message.
    Notification {
        /// Message body.
        payload: Value,
    },
}
