//! Collaborator interfaces
//!
//! The menu engine talks to the desktop only through these traits:
//! - `WindowSystem`: enumerate, inspect and activate top-level windows
//! - `IconSource`: render icons for paths, folders, groups and actions
//! - `ActionSink`: launch programs, open files, synthesize keys
//! - `MenuSurface`: the visual menu, driven by the controller
//! - `Clock`: time source for the debounce and toggle windows

use std::path::Path;
use std::time::Instant;

use crate::error::PlatformError;
use crate::lifecycle::{CloseToken, SelectionState};
use crate::model::{FocusContext, IconImage, MediaCommand, MenuItem, MenuMode, WindowHandle, WindowInfo};

/// Access to the running windows
pub trait WindowSystem: Send + Sync {
    /// Visible top-level windows, skipping the given process names
    ///
    /// May be slow; callers run it off the interaction thread.
    fn enumerate_visible_windows(&self, excluded: &[String]) -> Result<Vec<WindowInfo>, PlatformError>;

    /// Window that currently has focus
    fn foreground_window(&self) -> Option<WindowHandle>;

    /// Process owning `window`, or owning the foreground window when `None`
    fn process_name(&self, window: Option<WindowHandle>) -> Option<String>;

    /// Raise and focus a window
    fn switch_to_window(&self, handle: WindowHandle) -> Result<(), PlatformError>;

    /// Snapshot of the foreground window and its process
    fn capture_focus(&self) -> FocusContext {
        let window = self.foreground_window();
        let process_name = self.process_name(window);
        FocusContext { window, process_name }
    }
}

/// Icon rendering
pub trait IconSource: Send + Sync {
    fn icon_for_path(&self, path: &Path) -> Result<IconImage, PlatformError>;

    fn folder_icon(&self) -> Result<IconImage, PlatformError>;

    /// Composite of up to four child icons
    fn stacked_icon(&self, paths: &[&Path]) -> Result<IconImage, PlatformError>;

    /// Generic icon for a named action ("New Tab", "Save", ...)
    fn action_icon(&self, hint: &str) -> Result<IconImage, PlatformError>;

    fn media_icon(&self, command: MediaCommand) -> Result<IconImage, PlatformError>;
}

/// Side effects of selecting an item
pub trait ActionSink: Send + Sync {
    /// Start a program (executable or desktop entry)
    fn launch(&self, path: &Path) -> Result<(), PlatformError>;

    /// Open a file or folder with its default handler
    fn open(&self, path: &Path) -> Result<(), PlatformError>;

    /// Type a shortcut such as "Ctrl+Shift+T" into the focused window
    fn send_shortcut(&self, shortcut: &str) -> Result<(), PlatformError>;

    fn send_media_command(&self, command: MediaCommand) -> Result<(), PlatformError>;
}

/// The visible menu
///
/// Calls arrive from the interaction task only. Once `animate_out` has run,
/// the surface must eventually report `MenuEvent::AnimationComplete` with the
/// same token, unless `cancel_close` is called first.
pub trait MenuSurface: Send {
    /// Replace the wedges in place
    fn set_items(&mut self, items: &[MenuItem], mode: MenuMode);

    fn animate_in(&mut self);

    fn animate_out(&mut self, token: CloseToken);

    /// Abort a running close animation and show the menu again
    fn cancel_close(&mut self);

    fn set_selection(&mut self, selection: SelectionState, item: Option<&MenuItem>);

    /// Tell the user something went wrong
    fn show_notice(&mut self, message: &str);
}

/// Monotonic time source
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The real clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
