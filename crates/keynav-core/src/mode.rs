//! Interaction modes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The single interaction mode governing a tab at any time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Normal command mode.
    #[default]
    Default,
    /// Keys go to an editable element.
    Insert,
    /// Selection extension.
    Visual,
    /// Hint overlay is active.
    Hint,
    /// Command line input.
    Console,
}

impl Mode {
    /// Every mode, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Default,
        Self::Insert,
        Self::Visual,
        Self::Hint,
        Self::Console,
    ];

    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Insert => "insert",
            Self::Visual => "visual",
            Self::Hint => "hint",
            Self::Console => "console",
        }
    }

    /// Whether a digit typed in this mode may start a repeat count.
    #[must_use]
    pub const fn accepts_count(self) -> bool {
        matches!(self, Self::Default | Self::Visual)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown mode '{s}'"))
    }
}
