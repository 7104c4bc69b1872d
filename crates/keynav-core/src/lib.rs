//! # keynav-core
//!
//! Foundation types shared by every keynav crate:
//!
//! - **Ids**: `TabId`, `FrameId`, `FrameIdentity`, `WindowHandle`, `ElementKey`
//! - **Mode**: the closed set of interaction modes a tab can be in
//! - **Messages**: typed vocabulary exchanged between frames and the coordinator
//! - **Errors**: the serializable `RemoteError` body that crosses context boundaries
//! - **Logging**: `tracing` subscriber initialisation

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod logging;
pub mod messages;
pub mod mode;

pub use errors::{MessageError, RemoteError};
pub use ids::{ElementKey, FrameId, FrameIdentity, TabId, WindowHandle};
pub use mode::Mode;
