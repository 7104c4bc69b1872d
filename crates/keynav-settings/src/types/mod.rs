//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and implement
//! [`Default`] with production values. `#[serde(default)]` on every struct
//! allows partial JSON; missing fields get their default.

mod hint;
mod keymap;

pub use hint::*;
pub use keymap::*;

use keynav_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

/// Root settings type.
///
/// ```json
/// {
///   "keymaps": { "default": { "<C-d>": "scrollPageDown" } },
///   "hint": { "labelChars": "jkl;" }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeynavSettings {
    /// Settings schema version.
    pub version: String,
    /// Key sequence to command tables, one per mode.
    pub keymaps: KeymapSettings,
    /// Hint-mode settings.
    pub hint: HintSettings,
    /// Channel transport settings.
    pub channel: ChannelSettings,
    /// Frame discovery settings.
    pub frame: FrameSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for KeynavSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            keymaps: KeymapSettings::default(),
            hint: HintSettings::default(),
            channel: ChannelSettings::default(),
            frame: FrameSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Channel transport settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelSettings {
    /// Interval of the pending-request liveness sweep. A request unanswered
    /// across two sweeps is rejected as stale.
    pub sweep_interval_ms: u64,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            sweep_interval_ms: 30_000,
        }
    }
}

/// Frame discovery settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FrameSettings {
    /// How often a child frame re-sends `registerChild` until acknowledged.
    pub register_interval_ms: u64,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            register_interval_ms: 100,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter level (`RUST_LOG` overrides).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}
