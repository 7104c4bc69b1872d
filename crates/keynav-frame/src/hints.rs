//! The frame's share of a hint session.
//!
//! The coordinator only ever talks about local indices (positions in this
//! frame's candidate list). The frame maps them to [`ElementKey`]s, which
//! survive a re-collection, so the focused element can be found again after
//! the page changed.

use keynav_core::ElementKey;
use keynav_core::messages::FilterMatch;

use crate::labels;
use crate::surface::HintCandidate;

/// Local hint state of one frame.
#[derive(Debug, Default)]
pub struct FrameHints {
    candidates: Vec<HintCandidate>,
    global_indices: Vec<usize>,
    labels: Vec<String>,
    focused: Option<ElementKey>,
}

impl FrameHints {
    /// Empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the candidate list after a collection. The focused element
    /// is remembered so [`target_index`](Self::target_index) can find it.
    pub fn replace(&mut self, candidates: Vec<HintCandidate>) {
        self.candidates = candidates;
        self.global_indices.clear();
        self.labels.clear();
    }

    /// Number of local candidates.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether this frame has no candidates.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Candidate at `local_index`.
    pub fn candidate(&self, local_index: usize) -> Option<&HintCandidate> {
        self.candidates.get(local_index)
    }

    /// Record the global indices the coordinator assigned and compute the
    /// labels, returning `(element, label)` pairs to render.
    ///
    /// Extra indices beyond the local candidate count are ignored.
    pub fn assign(&mut self, global_indices: Vec<usize>, alphabet: &[char]) -> Vec<(ElementKey, String)> {
        let count = global_indices.len().min(self.candidates.len());
        self.global_indices = global_indices;
        self.global_indices.truncate(count);
        self.labels = labels::generate(count, alphabet);
        self.candidates
            .iter()
            .zip(&self.labels)
            .map(|(c, label)| (c.key, label.clone()))
            .collect()
    }

    /// Global index of a local candidate.
    pub fn global_index(&self, local_index: usize) -> Option<usize> {
        self.global_indices.get(local_index).copied()
    }

    /// Label of a local candidate.
    pub fn label(&self, local_index: usize) -> Option<&str> {
        self.labels.get(local_index).map(String::as_str)
    }

    /// Match every candidate against `text`.
    pub fn filter_matches(&self, text: &str) -> Vec<FilterMatch> {
        self.candidates
            .iter()
            .enumerate()
            .map(|(local_index, c)| FilterMatch {
                local_index,
                matched: c.matches(text),
            })
            .collect()
    }

    /// Mark the candidate at `local_index` focused, returning its element.
    pub fn focus(&mut self, local_index: usize) -> Option<ElementKey> {
        let key = self.candidates.get(local_index)?.key;
        self.focused = Some(key);
        Some(key)
    }

    /// Drop the focus mark from `local_index`, returning its element.
    pub fn blur(&mut self, local_index: usize) -> Option<ElementKey> {
        let key = self.candidates.get(local_index)?.key;
        if self.focused == Some(key) {
            self.focused = None;
        }
        Some(key)
    }

    /// Element currently marked focused.
    pub fn focused(&self) -> Option<ElementKey> {
        self.focused
    }

    /// Local index of the focused element in the current candidate list.
    pub fn target_index(&self) -> Option<usize> {
        let focused = self.focused?;
        self.candidates.iter().position(|c| c.key == focused)
    }

    /// Forget everything (hint mode ended).
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
