//! Linux desktop backend
//!
//! Implements the collaborator traits on COSMIC/Wayland:
//! - `WaylandWindows`: toplevel listing and activation
//! - `DesktopIcons`: freedesktop icon themes
//! - `LinuxActions`: process launching and uinput key synthesis
//!
//! `triggers` reads activation inputs from evdev devices.

pub mod apps;
pub mod icons;
pub mod input;
pub mod triggers;
pub mod windows;

use std::path::Path;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::normalize_process_name;
use crate::error::PlatformError;
use crate::model::{MediaCommand, WindowHandle, WindowInfo};
use crate::platform::{ActionSink, WindowSystem};

pub use icons::DesktopIcons;
use input::VirtualKeyboard;
use windows::{Toplevel, WindowRegistry};

/// Windows from the COSMIC compositor
#[derive(Debug, Default)]
pub struct WaylandWindows {
    registry: WindowRegistry,
}

impl WaylandWindows {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Result<Vec<Toplevel>, PlatformError> {
        let toplevels = windows::list_toplevels()?;
        self.registry.retain_only(&toplevels);
        Ok(toplevels)
    }
}

impl WindowSystem for WaylandWindows {
    fn enumerate_visible_windows(&self, excluded: &[String]) -> Result<Vec<WindowInfo>, PlatformError> {
        let excluded: Vec<String> = excluded.iter().map(|e| normalize_process_name(e)).collect();
        let windows = self
            .snapshot()?
            .into_iter()
            .filter(|t| !excluded.contains(&normalize_process_name(&t.app_id)))
            .map(|t| WindowInfo {
                handle: self.registry.handle_for(&t),
                exe_path: apps::find_desktop_file(&t.app_id),
                process_name: t.app_id,
                title: t.title,
            })
            .collect();
        Ok(windows)
    }

    fn foreground_window(&self) -> Option<WindowHandle> {
        match self.snapshot() {
            Ok(toplevels) => toplevels
                .iter()
                .find(|t| t.activated)
                .map(|t| self.registry.handle_for(t)),
            Err(e) => {
                debug!("No foreground window: {}", e);
                None
            }
        }
    }

    fn process_name(&self, window: Option<WindowHandle>) -> Option<String> {
        let handle = window.or_else(|| self.foreground_window())?;
        self.registry.resolve(handle).map(|(app_id, _)| app_id)
    }

    fn switch_to_window(&self, handle: WindowHandle) -> Result<(), PlatformError> {
        let (app_id, title) = self
            .registry
            .resolve(handle)
            .ok_or(PlatformError::WindowNotFound(handle))?;
        if windows::activate(&app_id, &title)? {
            Ok(())
        } else {
            Err(PlatformError::WindowNotFound(handle))
        }
    }
}

/// Launching and key synthesis
///
/// The virtual keyboard is created on first use and recreated after a
/// write failure.
#[derive(Default)]
pub struct LinuxActions {
    keyboard: Mutex<Option<VirtualKeyboard>>,
}

impl LinuxActions {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_keyboard(
        &self,
        f: impl FnOnce(&mut VirtualKeyboard) -> Result<(), PlatformError>,
    ) -> Result<(), PlatformError> {
        let mut slot = self.keyboard.lock();
        if slot.is_none() {
            *slot = Some(VirtualKeyboard::create()?);
        }
        let Some(keyboard) = slot.as_mut() else {
            return Err(PlatformError::WindowSystem("virtual keyboard unavailable".to_string()));
        };
        let result = f(keyboard);
        if let Err(e) = &result {
            warn!("Virtual keyboard failed, will recreate: {}", e);
            *slot = None;
        }
        result
    }
}

impl ActionSink for LinuxActions {
    fn launch(&self, path: &Path) -> Result<(), PlatformError> {
        apps::launch(path)
    }

    fn open(&self, path: &Path) -> Result<(), PlatformError> {
        apps::open(path)
    }

    fn send_shortcut(&self, shortcut: &str) -> Result<(), PlatformError> {
        let parsed = input::parse_shortcut(shortcut)?;
        self.with_keyboard(|kb| kb.tap(&parsed))
    }

    fn send_media_command(&self, command: MediaCommand) -> Result<(), PlatformError> {
        let key = input::media_key(command);
        self.with_keyboard(|kb| kb.tap_key(key))
    }
}
