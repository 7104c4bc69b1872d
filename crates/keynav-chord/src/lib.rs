//! # keynav-chord
//!
//! Incremental resolution of multi-key chords.
//!
//! - [`key`]: regulation of raw key events into canonical tokens and parsing
//!   of key sequence strings from settings
//! - [`trie`]: the token trie built from one mode's key to command table
//! - [`mapper`]: the stateful [`ChordMapper`] fed one token at a time
//! - [`keymap`]: per-mode tries built and validated from settings

#![deny(unsafe_code)]

pub mod key;
pub mod keymap;
pub mod mapper;
pub mod trie;

pub use key::{KeySequenceError, Modifiers, parse_sequence, regulate};
pub use keymap::{DropReason, DroppedBinding, Keymaps};
pub use mapper::{ChordMapper, ChordOutcome};
pub use trie::{ChordNode, ChordTrie};
