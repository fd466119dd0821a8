//! Error types
//!
//! Collaborator failures, configuration failures and trigger setup failures.
//! None of these cross the menu controller boundary: the controller logs them
//! and degrades to "no item" / "no icon".

use std::path::PathBuf;

use thiserror::Error;

use crate::model::WindowHandle;

/// Failure of an external collaborator (window system, icons, launching, input)
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The window system could not be reached or queried
    #[error("window system unavailable: {0}")]
    WindowSystem(String),

    /// The window no longer exists
    #[error("window {0} not found")]
    WindowNotFound(WindowHandle),

    /// No icon could be resolved for the given key
    #[error("no icon found for '{0}'")]
    IconNotFound(String),

    /// An icon file exists but could not be decoded
    #[error("failed to decode icon '{path}': {source}")]
    IconDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A process could not be started
    #[error("failed to launch '{path}': {source}")]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Nothing to launch for this path
    #[error("nothing to launch for '{0}'")]
    NotLaunchable(PathBuf),

    /// A keyboard shortcut string could not be parsed
    #[error("invalid keyboard shortcut '{0}'")]
    InvalidShortcut(String),

    /// The virtual input device failed
    #[error("input synthesis failed: {0}")]
    Input(#[source] std::io::Error),
}

/// Failure to load, parse or update configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not parse preset table: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("unknown menu mode '{0}'")]
    UnknownMode(String),

    #[error("unknown setting '{0}'")]
    UnknownKey(String),

    #[error("invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("could not determine the configuration directory")]
    NoConfigDir,
}

/// Errors that can occur while setting up trigger detection
#[derive(Debug, Error)]
pub enum TriggerError {
    /// No input device offers any of the configured triggers
    #[error("no input device supports the configured triggers")]
    NoDeviceFound,

    /// Permission denied - user not in input group
    #[error("permission denied accessing {0}. Add user to 'input' group: sudo usermod -aG input $USER")]
    PermissionDenied(String),

    /// The activation hotkey does not parse
    #[error("invalid activation hotkey '{0}'")]
    InvalidHotkey(String),

    /// Thread spawn failed
    #[error("thread error: {0}")]
    Thread(#[source] std::io::Error),
}
