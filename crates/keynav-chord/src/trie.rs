//! Token trie for one mode's bindings.
//!
//! A node may carry a terminal command and children at the same time: `g`
//! bound alongside `gg` gives the `g` node both. Such a command is
//! "optional": it only fires once the next token proves the longer
//! sequence was not intended.

use std::collections::HashMap;

/// One node of a [`ChordTrie`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChordNode {
    children: HashMap<String, ChordNode>,
    command: Option<String>,
}

impl ChordNode {
    /// Child reached by `token`.
    pub fn child(&self, token: &str) -> Option<&ChordNode> {
        self.children.get(token)
    }

    /// Terminal command of this node.
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    /// Whether any longer sequence continues through this node.
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Trie of key token sequences to command names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChordTrie {
    root: ChordNode,
    len: usize,
}

impl ChordTrie {
    /// Empty trie.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `sequence` to `command`, returning the command it replaces.
    ///
    /// Empty sequences are ignored.
    pub fn insert(&mut self, sequence: &[String], command: impl Into<String>) -> Option<String> {
        if sequence.is_empty() {
            return None;
        }
        let mut node = &mut self.root;
        for token in sequence {
            node = node.children.entry(token.clone()).or_default();
        }
        let previous = node.command.replace(command.into());
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    /// The top-level node.
    pub fn root(&self) -> &ChordNode {
        &self.root
    }

    /// Node reached by following `path` from the root.
    pub fn get(&self, path: &[String]) -> Option<&ChordNode> {
        path.iter()
            .try_fold(&self.root, |node, token| node.child(token))
    }

    /// Command bound to exactly `sequence`.
    pub fn lookup(&self, sequence: &[String]) -> Option<&str> {
        self.get(sequence).and_then(ChordNode::command)
    }

    /// Number of bound sequences.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(s: &[&str]) -> Vec<String> {
        s.iter().map(|t| (*t).to_string()).collect()
    }

    #[test]
    fn insert_and_lookup() {
        let mut trie = ChordTrie::new();
        assert!(trie.insert(&seq(&["g", "g"]), "scrollTop").is_none());
        assert!(trie.insert(&seq(&["g", "t"]), "nextTab").is_none());
        assert_eq!(trie.lookup(&seq(&["g", "g"])), Some("scrollTop"));
        assert_eq!(trie.lookup(&seq(&["g"])), None);
        assert!(trie.get(&seq(&["g"])).unwrap().has_children());
        assert_eq!(trie.len(), 2);
    }

    #[test]
    fn prefix_can_hold_a_command() {
        let mut trie = ChordTrie::new();
        let _ = trie.insert(&seq(&["g", "g"]), "scrollTop");
        let _ = trie.insert(&seq(&["g"]), "goto");
        let g = trie.get(&seq(&["g"])).unwrap();
        assert_eq!(g.command(), Some("goto"));
        assert!(g.has_children());
    }

    #[test]
    fn rebinding_replaces() {
        let mut trie = ChordTrie::new();
        let _ = trie.insert(&seq(&["x"]), "closeTab");
        assert_eq!(trie.insert(&seq(&["x"]), "reloadTab").as_deref(), Some("closeTab"));
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn empty_sequence_ignored() {
        let mut trie = ChordTrie::new();
        assert!(trie.insert(&[], "x").is_none());
        assert!(trie.is_empty());
        assert!(trie.root().command().is_none());
    }
}
