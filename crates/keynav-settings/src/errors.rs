//! Settings error types.

use std::path::PathBuf;

use thiserror::Error;

/// Why settings could not be loaded or watched.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not JSON, or a value has the wrong type.
    #[error("{} is not valid keynav settings: {source}", path.display())]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
    /// Compiled defaults failed to encode.
    #[error("cannot encode default settings: {0}")]
    Encode(#[from] serde_json::Error),
    /// A value is out of range or otherwise unusable.
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
    /// The file watcher could not be started.
    #[error("cannot watch settings file: {0}")]
    Watch(#[from] notify::Error),
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
