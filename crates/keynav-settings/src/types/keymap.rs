//! Per-mode key bindings.
//!
//! Each table maps a key sequence string (`"gg"`, `"<C-w>h"`) to a command
//! name. Tables deep-merge per key, so a user file only lists the bindings it
//! adds or changes. Binding a sequence to `""` removes a default binding.

use std::collections::BTreeMap;

use keynav_core::Mode;
use serde::{Deserialize, Serialize};

/// Key sequence to command table.
pub type Keymap = BTreeMap<String, String>;

/// One keymap per mode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeymapSettings {
    /// Normal mode.
    pub default: Keymap,
    /// Insert mode.
    pub insert: Keymap,
    /// Visual mode.
    pub visual: Keymap,
    /// Hint mode.
    pub hint: Keymap,
    /// Console mode.
    pub console: Keymap,
}

impl KeymapSettings {
    /// The table for `mode`.
    #[must_use]
    pub fn for_mode(&self, mode: Mode) -> &Keymap {
        match mode {
            Mode::Default => &self.default,
            Mode::Insert => &self.insert,
            Mode::Visual => &self.visual,
            Mode::Hint => &self.hint,
            Mode::Console => &self.console,
        }
    }
}

fn table(entries: &[(&str, &str)]) -> Keymap {
    entries
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

impl Default for KeymapSettings {
    fn default() -> Self {
        Self {
            default: table(&[
                ("j", "scrollDown"),
                ("k", "scrollUp"),
                ("h", "scrollLeft"),
                ("l", "scrollRight"),
                ("<C-f>", "scrollPageDown"),
                ("<C-b>", "scrollPageUp"),
                ("gg", "scrollTop"),
                ("G", "scrollBottom"),
                ("gi", "focusInput"),
                ("gt", "nextTab"),
                ("gT", "prevTab"),
                ("x", "closeTab"),
                ("r", "reloadTab"),
                ("H", "historyBack"),
                ("L", "historyForward"),
                ("f", "enterHintMode"),
                ("F", "enterHintModeNewTab"),
                ("v", "enterVisualMode"),
                (":", "enterConsoleMode"),
                ("<Esc>", "escape"),
            ]),
            insert: table(&[("<Esc>", "escape"), ("<C-[>", "escape")]),
            visual: table(&[
                ("j", "scrollDown"),
                ("k", "scrollUp"),
                ("<Esc>", "escape"),
            ]),
            hint: table(&[
                ("<Tab>", "hintNext"),
                ("<S-Tab>", "hintPrev"),
                ("<Home>", "hintFirst"),
                ("<End>", "hintLast"),
                ("<CR>", "hintSelect"),
                ("<C-CR>", "hintOpenInTab"),
                ("<C-r>", "hintReconstruct"),
                ("<Esc>", "escape"),
            ]),
            console: table(&[("<Esc>", "escape")]),
        }
    }
}
