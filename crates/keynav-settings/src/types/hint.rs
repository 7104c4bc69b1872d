//! Hint-mode settings.

use keynav_core::messages::HintKind;
use serde::{Deserialize, Serialize};

const DEFAULT_LABEL_CHARS: &str = "asdfghjkl";

/// Hint overlay settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HintSettings {
    /// Characters labels are built from. Duplicates are ignored; fewer than
    /// two distinct characters falls back to the default alphabet.
    pub label_chars: String,
    /// Move DOM focus along with the focus highlight.
    pub autofocus: bool,
    /// Selector patterns per hint kind.
    pub patterns: HintPatterns,
}

impl Default for HintSettings {
    fn default() -> Self {
        Self {
            label_chars: DEFAULT_LABEL_CHARS.to_string(),
            autofocus: true,
            patterns: HintPatterns::default(),
        }
    }
}

impl HintSettings {
    /// Deduplicated label alphabet, in configured order.
    #[must_use]
    pub fn label_alphabet(&self) -> Vec<char> {
        let chars = dedup_chars(&self.label_chars);
        if chars.len() < 2 {
            tracing::warn!(
                label_chars = %self.label_chars,
                "label alphabet needs two distinct characters, using default"
            );
            return dedup_chars(DEFAULT_LABEL_CHARS);
        }
        chars
    }
}

fn dedup_chars(s: &str) -> Vec<char> {
    let mut out: Vec<char> = Vec::new();
    for c in s.chars().filter(|c| !c.is_whitespace()) {
        if !out.contains(&c) {
            out.push(c);
        }
    }
    out
}

/// Selector patterns used to collect candidates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HintPatterns {
    /// Clickable elements.
    pub click: String,
    /// Links that can open in a new tab.
    pub new_tab: String,
    /// Focusable inputs.
    pub focus: String,
}

impl Default for HintPatterns {
    fn default() -> Self {
        Self {
            click: "a, button, input, select, textarea, summary, [onclick], [role=button], [tabindex]"
                .to_string(),
            new_tab: "a[href]".to_string(),
            focus: "input, textarea, select, [contenteditable]".to_string(),
        }
    }
}

impl HintPatterns {
    /// Pattern for `kind`.
    #[must_use]
    pub fn for_kind(&self, kind: HintKind) -> &str {
        match kind {
            HintKind::Click => &self.click,
            HintKind::NewTab => &self.new_tab,
            HintKind::Focus => &self.focus,
        }
    }
}
