//! The frame's document, as far as keynav needs it.

use keynav_core::messages::{Area, HintKind};
use keynav_core::{ElementKey, Mode};
use serde_json::Value;
use thiserror::Error;

/// An element eligible for a hint in this frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HintCandidate {
    /// Stable handle of the element.
    pub key: ElementKey,
    /// Visible text.
    pub text: String,
    /// Attribute values filtering also looks at (title, alt, href, ...).
    pub attributes: Vec<String>,
}

impl HintCandidate {
    /// Candidate with no attributes.
    pub fn new(key: ElementKey, text: impl Into<String>) -> Self {
        Self {
            key,
            text: text.into(),
            attributes: Vec::new(),
        }
    }

    /// Whether every whitespace-separated term of `filter` appears,
    /// case-insensitively, in the text or some attribute.
    pub fn matches(&self, filter: &str) -> bool {
        let haystacks: Vec<String> = std::iter::once(&self.text)
            .chain(&self.attributes)
            .map(|s| s.to_lowercase())
            .collect();
        filter.split_whitespace().all(|term| {
            let term = term.to_lowercase();
            haystacks.iter().any(|h| h.contains(&term))
        })
    }
}

/// A surface operation that could not be carried out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    /// The element was removed from the document.
    #[error("element {key} is no longer in the document")]
    ElementGone {
        /// Element handle.
        key: ElementKey,
    },
    /// The surface does not implement the command.
    #[error("unsupported command '{command}'")]
    Unsupported {
        /// Command name.
        command: String,
    },
}

/// Document operations of one frame.
pub trait HintSurface: Send + Sync {
    /// Elements of this frame's own document matching `pattern` (and
    /// intersecting `area`, if given), in document order.
    fn collect(&self, kind: HintKind, pattern: &str, area: Option<Area>) -> Vec<HintCandidate>;

    /// Draw labels next to their elements, replacing any drawn before.
    fn render_labels(&self, labels: &[(ElementKey, String)]);

    /// Toggle the focus highlight; `autofocus` also moves DOM focus.
    fn set_focus(&self, key: ElementKey, focused: bool, autofocus: bool);

    /// Show or hide one element's label.
    fn set_visible(&self, key: ElementKey, visible: bool);

    /// Remove every hint decoration.
    fn clear_hints(&self);

    /// Run an element command (`click`, `openInNewTab`, `focus`, ...).
    fn run_element_command(&self, key: ElementKey, command: &str, count: u32) -> Result<(), SurfaceError>;

    /// Run a frame-local page command (`scrollDown`, `scrollTop`, ...).
    fn run_page_command(&self, command: &str, count: u32) -> Result<(), SurfaceError>;

    /// The frame entered `mode`; `data` is only given to the target frame.
    fn enter_mode(&self, mode: Mode, data: Option<&Value>);

    /// Show a one-line status message.
    fn show_message(&self, text: &str);
}
