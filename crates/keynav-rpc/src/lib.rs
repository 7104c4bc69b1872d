//! # keynav-rpc
//!
//! Request/response messaging over a transport that only delivers one-way
//! messages.
//!
//! - [`envelope`]: the three wire shapes (request, response, notification)
//! - [`transport`]: the [`Transport`] seam and the in-process [`MemoryTransport`]
//! - [`handler`]: request/notification handler traits and [`first_settled`]
//! - [`channel`]: [`Channel`], with its pending-transaction table and
//!   liveness sweep
//!
//! Every message that crosses a context boundary is a `serde_json::Value`;
//! typed messages from `keynav_core::messages` are encoded at the edges.

#![deny(unsafe_code)]

pub mod channel;
pub mod envelope;
pub mod errors;
pub mod handler;
pub mod pending;
pub mod transport;

pub use channel::{Channel, ChannelConfig, WeakChannel};
pub use envelope::Envelope;
pub use errors::{ChannelError, TransportError};
pub use handler::{
    NotificationHandler, RequestHandler, first_settled, notification_fn, request_fn,
};
pub use transport::{Endpoint, MemoryTransport, Transport};
