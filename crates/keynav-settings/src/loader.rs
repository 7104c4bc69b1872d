//! Settings layers: compiled defaults, the JSON file, `KEYNAV_*` variables.
//!
//! The file is merged over the defaults as JSON before decoding, so a user
//! file only has to name what it changes. Objects merge per key, anything
//! else replaces, `null` leaves the default in place. An empty keymap entry
//! (`"x": ""`) survives the merge and unbinds the key when keymaps are built.

use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::KeynavSettings;

/// `~/.keynav/settings.json`.
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".keynav").join("settings.json")
}

/// All three layers from the default location.
pub fn load_settings() -> Result<KeynavSettings> {
    load_settings_from_path(&settings_path())
}

/// All three layers, reading the file at `path`. A missing file is the same
/// as an empty one.
pub fn load_settings_from_path(path: &Path) -> Result<KeynavSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults with the file at `path` merged over them. No env overrides.
pub fn load_file_layer(path: &Path) -> Result<KeynavSettings> {
    let parse_error = |source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let defaults = serde_json::to_value(KeynavSettings::default())?;
    let merged = match std::fs::read_to_string(path) {
        Ok(content) => {
            debug!(path = %path.display(), "merging settings file");
            let user: Value = serde_json::from_str(&content).map_err(parse_error)?;
            deep_merge(defaults, user)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file, using defaults");
            defaults
        }
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_value(merged).map_err(parse_error)
}

/// Merge `overlay` into `base`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay.into_iter().filter(|(_, v)| !v.is_null()) {
                let merged = match base.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                let _ = base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, overlay) => overlay,
    }
}

/// Bounds for the numeric overrides, in milliseconds.
const SWEEP_INTERVAL_RANGE: (u64, u64) = (1_000, 600_000);
const REGISTER_INTERVAL_RANGE: (u64, u64) = (10, 10_000);

/// Apply `KEYNAV_*` variables. A malformed value is logged and the lower
/// layer's value kept.
pub fn apply_env_overrides(settings: &mut KeynavSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

fn apply_overrides(settings: &mut KeynavSettings, var: impl Fn(&str) -> Option<String>) {
    let get = |name: &str| var(name).filter(|v| !v.is_empty());

    if let Some(level) = get("KEYNAV_LOG_LEVEL") {
        settings.logging.level = level;
    }
    if let Some(raw) = get("KEYNAV_SWEEP_INTERVAL_MS") {
        match parse_u64_range(&raw, SWEEP_INTERVAL_RANGE.0, SWEEP_INTERVAL_RANGE.1) {
            Some(ms) => settings.channel.sweep_interval_ms = ms,
            None => warn!(key = "KEYNAV_SWEEP_INTERVAL_MS", value = %raw, "out of range, ignoring"),
        }
    }
    if let Some(raw) = get("KEYNAV_REGISTER_INTERVAL_MS") {
        match parse_u64_range(&raw, REGISTER_INTERVAL_RANGE.0, REGISTER_INTERVAL_RANGE.1) {
            Some(ms) => settings.frame.register_interval_ms = ms,
            None => warn!(key = "KEYNAV_REGISTER_INTERVAL_MS", value = %raw, "out of range, ignoring"),
        }
    }
    if let Some(raw) = get("KEYNAV_HINT_LABEL_CHARS") {
        match parse_label_chars(&raw) {
            Some(chars) => settings.hint.label_chars = chars.to_string(),
            None => warn!(key = "KEYNAV_HINT_LABEL_CHARS", value = %raw, "needs two distinct characters, ignoring"),
        }
    }
}

/// `val` as a `u64` within `min..=max`.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    val.trim().parse().ok().filter(|n| (min..=max).contains(n))
}

/// `val` if it has at least two distinct non-space characters.
pub fn parse_label_chars(val: &str) -> Option<&str> {
    let mut distinct: Vec<char> = val.chars().filter(|c| !c.is_whitespace()).collect();
    distinct.sort_unstable();
    distinct.dedup();
    (distinct.len() >= 2).then_some(val)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use assert_matches::assert_matches;

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_simple_override() {
        let merged = deep_merge(
            serde_json::json!({"a": 1, "b": 2}),
            serde_json::json!({"a": 10}),
        );
        assert_eq!(merged["a"], 10);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_nested_override() {
        let merged = deep_merge(
            serde_json::json!({"hint": {"labelChars": "asdf", "autofocus": true}}),
            serde_json::json!({"hint": {"labelChars": "jkl"}}),
        );
        assert_eq!(merged["hint"]["labelChars"], "jkl");
        assert_eq!(merged["hint"]["autofocus"], true);
    }

    #[test]
    fn merge_array_replace() {
        let merged = deep_merge(
            serde_json::json!({"items": [1, 2, 3]}),
            serde_json::json!({"items": [4, 5]}),
        );
        assert_eq!(merged["items"], serde_json::json!([4, 5]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let merged = deep_merge(
            serde_json::json!({"a": 1, "b": 2}),
            serde_json::json!({"a": null}),
        );
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let merged = deep_merge(
            serde_json::json!({"a": {"nested": true}}),
            serde_json::json!({"a": 42}),
        );
        assert_eq!(merged["a"], 42);
    }

    // ── load_file_layer ─────────────────────────────────────────────

    #[test]
    fn unreadable_path_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        // a directory cannot be read as a file
        assert_matches!(load_file_layer(dir.path()), Err(SettingsError::Read { .. }));
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_file_layer(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings, KeynavSettings::default());
    }

    #[test]
    fn load_keymap_adds_binding_and_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"keymaps": {"default": {"<C-d>": "scrollPageDown", "x": ""}}}"#,
        )
        .unwrap();

        let settings = load_file_layer(&path).unwrap();
        let default = &settings.keymaps.default;
        assert_eq!(default.get("<C-d>").unwrap(), "scrollPageDown");
        assert_eq!(default.get("gg").unwrap(), "scrollTop");
        assert_eq!(default.get("x").unwrap(), "");
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"channel": {"sweepIntervalMs": 2000}, "logging": {"format": "json"}}"#,
        )
        .unwrap();

        let settings = load_file_layer(&path).unwrap();
        assert_eq!(settings.channel.sweep_interval_ms, 2000);
        assert_eq!(settings.logging.format, keynav_core::logging::LogFormat::Json);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        assert_matches!(load_file_layer(&path), Err(SettingsError::Parse { .. }));
    }

    #[test]
    fn load_wrong_type_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"frame": {"registerIntervalMs": "soon"}}"#).unwrap();

        assert_matches!(load_file_layer(&path), Err(SettingsError::Parse { .. }));
    }

    // ── env overrides ───────────────────────────────────────────────

    fn vars(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name: &str| pairs.iter().find(|(k, _)| *k == name).map(|(_, v)| (*v).to_string())
    }

    #[test]
    fn env_overrides_apply_in_range() {
        let mut settings = KeynavSettings::default();
        apply_overrides(
            &mut settings,
            vars(&[
                ("KEYNAV_LOG_LEVEL", "debug"),
                ("KEYNAV_SWEEP_INTERVAL_MS", "5000"),
                ("KEYNAV_HINT_LABEL_CHARS", "jk"),
            ]),
        );
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.channel.sweep_interval_ms, 5000);
        assert_eq!(settings.hint.label_chars, "jk");
        assert_eq!(settings.frame.register_interval_ms, 100);
    }

    #[test]
    fn bad_env_values_keep_lower_layer() {
        let mut settings = KeynavSettings::default();
        apply_overrides(
            &mut settings,
            vars(&[
                ("KEYNAV_LOG_LEVEL", ""),
                ("KEYNAV_SWEEP_INTERVAL_MS", "5"),
                ("KEYNAV_REGISTER_INTERVAL_MS", "soon"),
                ("KEYNAV_HINT_LABEL_CHARS", "j"),
            ]),
        );
        assert_eq!(settings, KeynavSettings::default());
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_u64_bounds() {
        assert_eq!(parse_u64_range("30000", 1000, 600_000), Some(30_000));
        assert_eq!(parse_u64_range("500", 1000, 600_000), None);
        assert_eq!(parse_u64_range("700000", 1000, 600_000), None);
        assert_eq!(parse_u64_range("abc", 1000, 600_000), None);
    }

    #[test]
    fn parse_label_chars_needs_two_distinct() {
        assert_eq!(parse_label_chars("jk"), Some("jk"));
        assert_eq!(parse_label_chars("jjj"), None);
        assert_eq!(parse_label_chars("j "), None);
    }
}
