//! Executing a selected item

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::PlatformError;
use crate::model::{ItemKind, ItemTarget, MenuItem, WindowHandle};
use crate::platform::{ActionSink, WindowSystem};

/// What happened when an item was executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The effect already happened
    Completed,
    /// A keyboard shortcut that must wait until the menu is gone and focus is
    /// back on the captured window
    Deferred(String),
}

/// Turns a chosen item into its side effect
pub struct ActionDispatcher {
    windows: Arc<dyn WindowSystem>,
    actions: Arc<dyn ActionSink>,
}

impl ActionDispatcher {
    pub fn new(windows: Arc<dyn WindowSystem>, actions: Arc<dyn ActionSink>) -> Self {
        Self { windows, actions }
    }

    /// Execute `item`, or hand back a shortcut to send later
    pub fn execute(&self, item: &MenuItem) -> Result<Dispatch, PlatformError> {
        debug!("Executing '{}' ({:?})", item.name, item.kind);
        match &item.target {
            ItemTarget::Window {
                handle,
                process_name,
                fallback,
            } => match self.windows.switch_to_window(*handle) {
                Ok(()) => Ok(Dispatch::Completed),
                Err(e) => match fallback {
                    Some(path) => {
                        warn!("Could not activate {} ({}): {}, launching instead", handle, process_name, e);
                        self.actions.launch(path)?;
                        Ok(Dispatch::Completed)
                    }
                    None => Err(e),
                },
            },
            ItemTarget::Path(path) => {
                match item.kind {
                    ItemKind::Application => self.actions.launch(path)?,
                    _ => self.actions.open(path)?,
                }
                Ok(Dispatch::Completed)
            }
            ItemTarget::Shortcut(shortcut) if shortcut.trim().is_empty() => {
                debug!("'{}' has no shortcut, nothing to send", item.name);
                Ok(Dispatch::Completed)
            }
            ItemTarget::Shortcut(shortcut) => Ok(Dispatch::Deferred(shortcut.clone())),
            ItemTarget::Media(command) => {
                self.actions.send_media_command(*command)?;
                Ok(Dispatch::Completed)
            }
            ItemTarget::Group(entries) => {
                let mut first_error = None;
                for entry in entries.iter().filter(|e| !e.path.as_os_str().is_empty()) {
                    if let Err(e) = self.actions.launch(&entry.path) {
                        warn!("Group '{}': {}", item.name, e);
                        first_error.get_or_insert(e);
                    }
                }
                match first_error {
                    Some(e) => Err(e),
                    None => Ok(Dispatch::Completed),
                }
            }
        }
    }

    /// Give focus back to the window that was active before the menu opened
    pub fn restore_focus(&self, window: WindowHandle) -> Result<(), PlatformError> {
        self.windows.switch_to_window(window)
    }

    /// Send a shortcut previously returned as `Dispatch::Deferred`
    pub fn send_deferred(&self, shortcut: &str) -> Result<(), PlatformError> {
        info!("Sending shortcut {}", shortcut);
        self.actions.send_shortcut(shortcut)
    }
}
