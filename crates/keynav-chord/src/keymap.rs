//! Per-mode tries built from settings.
//!
//! Bad entries never fail the build: a malformed sequence or an unknown
//! command name is logged, reported in the dropped list, and skipped.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use keynav_core::Mode;
use keynav_settings::KeymapSettings;
use tracing::{debug, warn};

use crate::key::{KeySequenceError, parse_sequence};
use crate::mapper::ChordMapper;
use crate::trie::ChordTrie;

/// Why a binding was left out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// The key sequence string did not parse.
    Malformed(KeySequenceError),
    /// No handler is registered under the command name.
    UnknownCommand,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(e) => write!(f, "{e}"),
            Self::UnknownCommand => f.write_str("unknown command"),
        }
    }
}

/// A binding that was skipped while building [`Keymaps`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DroppedBinding {
    /// Mode of the table the entry came from.
    pub mode: Mode,
    /// Key sequence as written.
    pub sequence: String,
    /// Command name as written.
    pub command: String,
    /// Why it was skipped.
    pub reason: DropReason,
}

/// One [`ChordTrie`] per mode.
#[derive(Clone, Debug, Default)]
pub struct Keymaps {
    tries: HashMap<Mode, Arc<ChordTrie>>,
}

impl Keymaps {
    /// Build every mode's trie, validating command names against `known`.
    ///
    /// An empty command string unbinds the sequence and is skipped silently.
    pub fn build(settings: &KeymapSettings, known: &HashSet<String>) -> (Self, Vec<DroppedBinding>) {
        let mut tries = HashMap::new();
        let mut dropped = Vec::new();

        for mode in Mode::ALL {
            let mut trie = ChordTrie::new();
            for (sequence, command) in settings.for_mode(mode) {
                if command.is_empty() {
                    debug!(%mode, %sequence, "binding removed");
                    continue;
                }
                let reason = match parse_sequence(sequence) {
                    Ok(_) if !known.contains(command) => DropReason::UnknownCommand,
                    Ok(tokens) => {
                        if let Some(previous) = trie.insert(&tokens, command.as_str()) {
                            debug!(%mode, %sequence, %previous, "binding replaced");
                        }
                        continue;
                    }
                    Err(e) => DropReason::Malformed(e),
                };
                warn!(%mode, %sequence, %command, %reason, "dropping key binding");
                dropped.push(DroppedBinding {
                    mode,
                    sequence: sequence.clone(),
                    command: command.clone(),
                    reason,
                });
            }
            debug!(%mode, bindings = trie.len(), "keymap built");
            let _ = tries.insert(mode, Arc::new(trie));
        }

        (Self { tries }, dropped)
    }

    /// Trie for `mode` (empty if the mode has no bindings).
    pub fn trie(&self, mode: Mode) -> Arc<ChordTrie> {
        self.tries.get(&mode).cloned().unwrap_or_default()
    }

    /// Fresh idle mapper for `mode`.
    pub fn mapper(&self, mode: Mode) -> ChordMapper {
        ChordMapper::new(self.trie(mode))
    }
}
