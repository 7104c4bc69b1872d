//! # keynav-settings
//!
//! Layered configuration for keynav.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`KeynavSettings::default()`]
//! 2. **User file**: `~/.keynav/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `KEYNAV_*` overrides (highest priority)
//!
//! A [`SettingsWatcher`] reloads the file on change and hands the complete
//! new settings to a callback; consumers replace their state wholesale.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;
pub mod watcher;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
pub use watcher::SettingsWatcher;

use std::sync::OnceLock;

static SETTINGS: OnceLock<KeynavSettings> = OnceLock::new();

/// Process-wide settings, loaded on first use. A file that fails to load is
/// logged and the compiled defaults are used.
pub fn get_settings() -> &'static KeynavSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "settings failed to load, using defaults");
            KeynavSettings::default()
        })
    })
}

/// Install the process-wide settings before anything reads them. Hands
/// `settings` back if they were already set.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: KeynavSettings) -> std::result::Result<(), KeynavSettings> {
    SETTINGS.set(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_settings_are_set_once() {
        let mut first = KeynavSettings::default();
        first.logging.level = "trace".into();
        assert!(init_settings(first).is_ok());
        assert_eq!(get_settings().logging.level, "trace");

        let rejected = init_settings(KeynavSettings::default()).unwrap_err();
        assert_eq!(rejected.logging.level, "info");
        assert_eq!(get_settings().logging.level, "trace");
    }

    #[test]
    fn defaults_match_documented_values() {
        let settings = KeynavSettings::default();
        assert_eq!(settings.channel.sweep_interval_ms, 30_000);
        assert_eq!(settings.frame.register_interval_ms, 100);
        assert_eq!(settings.hint.label_chars, "asdfghjkl");
        assert_eq!(settings.logging.level, "info");
        assert_eq!(
            settings.keymaps.default.get("f").map(String::as_str),
            Some("enterHintMode")
        );
    }
}
