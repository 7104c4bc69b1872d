//! Incremental chord resolution.
//!
//! # State machine
//!
//! ```text
//!            token extends, more follows
//!          ┌──────────────────────────┐
//!          ▼                          │
//! ┌──────┐ prefix ┌─────────────────┐ │
//! │ Idle │──────▶│ Pending(path)   │─┘
//! └──────┘        └─────────────────┘
//!    ▲                 │        │
//!    │ leaf reached    │        │ token does not extend:
//!    └─────────────────┘        │ emit optional command or report
//!                               │ dropped prefix, retry at top level
//!                               ▼
//! ```
//!
//! One token of lookahead only: an optional command fires when the token
//! after it fails to extend the sequence, never on a timer.

use std::sync::Arc;

use crate::trie::{ChordNode, ChordTrie};

/// Result of feeding one token.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChordOutcome {
    /// Whether the new token was part of a match (partial or complete).
    pub consumed: bool,
    /// Command of an abandoned prefix that was itself bound. Runs before
    /// `command`.
    pub optional_command: Option<String>,
    /// Command completed by this token.
    pub command: Option<String>,
    /// Tokens of an abandoned prefix that had no command of its own.
    pub dropped_prefix: Option<Vec<String>>,
}

impl ChordOutcome {
    /// Commands to run, in order.
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.optional_command
            .as_deref()
            .into_iter()
            .chain(self.command.as_deref())
    }
}

/// Stateful matcher of key tokens against one mode's [`ChordTrie`].
#[derive(Clone, Debug)]
pub struct ChordMapper {
    trie: Arc<ChordTrie>,
    pending: Vec<String>,
}

impl ChordMapper {
    /// Idle mapper over `trie`.
    pub fn new(trie: Arc<ChordTrie>) -> Self {
        Self {
            trie,
            pending: Vec::new(),
        }
    }

    /// Feed one regulated token.
    pub fn feed(&mut self, token: &str) -> ChordOutcome {
        let mut outcome = ChordOutcome::default();

        if !self.pending.is_empty() {
            let trie = Arc::clone(&self.trie);
            if let Some(node) = trie.get(&self.pending) {
                if let Some(next) = node.child(token) {
                    return self.advance(token, next, outcome);
                }
                let abandoned = std::mem::take(&mut self.pending);
                match node.command() {
                    Some(command) => outcome.optional_command = Some(command.to_string()),
                    None => outcome.dropped_prefix = Some(abandoned),
                }
            } else {
                // trie was swapped underneath a pending path
                outcome.dropped_prefix = Some(std::mem::take(&mut self.pending));
            }
        }

        let trie = Arc::clone(&self.trie);
        match trie.root().child(token) {
            Some(node) => self.advance(token, node, outcome),
            None => outcome,
        }
    }

    fn advance(&mut self, token: &str, node: &ChordNode, mut outcome: ChordOutcome) -> ChordOutcome {
        outcome.consumed = true;
        if node.has_children() {
            self.pending.push(token.to_string());
        } else {
            self.pending.clear();
            outcome.command = node.command().map(ToString::to_string);
        }
        outcome
    }

    /// Drop any partial match.
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    /// Whether a partial match is in progress.
    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Tokens of the partial match in progress.
    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    /// Replace the trie (settings reload) and reset.
    pub fn set_trie(&mut self, trie: Arc<ChordTrie>) {
        self.trie = trie;
        self.reset();
    }
}
