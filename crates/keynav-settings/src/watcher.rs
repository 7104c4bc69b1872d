//! Settings file watcher.
//!
//! Watches the directory containing the settings file (editors often replace
//! the file rather than writing in place) and reloads on any event touching
//! it. A file that fails to parse is logged and skipped; the callback only
//! ever sees complete, valid settings.

use std::path::{Path, PathBuf};

use notify::{RecommendedWatcher, RecursiveMode, Watcher, recommended_watcher};
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::loader::load_settings_from_path;
use crate::types::KeynavSettings;

/// Reloads settings when the file changes. Dropping it stops the watch.
pub struct SettingsWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
}

impl SettingsWatcher {
    /// Start watching `path`, invoking `on_change` with each successful reload.
    ///
    /// The callback runs on the watcher's thread.
    pub fn spawn<F>(path: &Path, on_change: F) -> Result<Self>
    where
        F: Fn(KeynavSettings) + Send + 'static,
    {
        let dir = path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .ok_or_else(|| {
                SettingsError::InvalidValue(format!("{} has no parent directory", path.display()))
            })?
            .to_path_buf();
        let file_name = path.file_name().map(ToOwned::to_owned);
        let target = path.to_path_buf();

        let mut watcher = recommended_watcher(move |res: notify::Result<notify::Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "settings watch error");
                    return;
                }
            };
            if event.kind.is_access() {
                return;
            }
            let touches_file = event
                .paths
                .iter()
                .any(|p| p.file_name().map(ToOwned::to_owned) == file_name);
            if !touches_file {
                return;
            }
            match load_settings_from_path(&target) {
                Ok(settings) => {
                    debug!(path = ?target, "settings reloaded");
                    on_change(settings);
                }
                Err(e) => warn!(path = ?target, error = %e, "settings reload failed, keeping previous"),
            }
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        Ok(Self {
            path: path.to_path_buf(),
            _watcher: watcher,
        })
    }

    /// The watched settings file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
