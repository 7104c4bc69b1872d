//! # keynav-coordinator
//!
//! The coordinating side of keynav. Every frame of every tab holds a
//! [`Channel`](keynav_rpc::Channel) to one [`Coordinator`], which keeps a
//! [`TabContext`] per tab:
//!
//! - [`tab`]: frame records, the tab's mode, typed sends to frames
//! - [`hint`]: hint sessions spanning the frame tree
//! - [`commands`]: [`CommandRegistry`] and the built-in commands
//! - [`console`]: console line parsing and prefix resolution
//! - [`host`]: the [`TabHost`] seam to the browser's tab API
//! - [`coordinator`]: message routing, registration, disconnect cleanup

#![deny(unsafe_code)]

pub mod commands;
pub mod console;
pub mod coordinator;
pub mod errors;
pub mod hint;
pub mod host;
pub mod tab;

pub use commands::{Builtin, CommandContext, CommandHandler, CommandRegistry};
pub use coordinator::Coordinator;
pub use errors::{CoordinatorError, HintError, HostError};
pub use hint::{FocusChange, HintMove, HintOptions, HintSession, HintTarget};
pub use host::TabHost;
pub use tab::{FrameRecord, TabContext};
