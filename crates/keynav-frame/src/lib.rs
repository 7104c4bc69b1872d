//! # keynav-frame
//!
//! Everything that runs inside one frame of a page:
//!
//! - [`registry`]: parent/child frame discovery over the window-level
//!   message primitive
//! - [`surface`]: the [`HintSurface`] seam to the frame's document
//! - [`labels`]: fixed-width hint label generation
//! - [`hints`]: the frame's share of a hint session
//! - [`agent`]: [`FrameAgent`], which turns key tokens into commands and
//!   answers the coordinator

#![deny(unsafe_code)]

pub mod agent;
pub mod hints;
pub mod labels;
pub mod registry;
pub mod surface;

pub use agent::{FRAME_COMMANDS, FrameAgent, FrameAgentConfig, KeyDisposition};
pub use hints::FrameHints;
pub use registry::{FrameRegistry, WindowHost};
pub use surface::{HintCandidate, HintSurface, SurfaceError};
