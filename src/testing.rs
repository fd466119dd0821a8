//! In-memory collaborators for unit tests

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::PlatformError;
use crate::lifecycle::{CloseToken, SelectionState};
use crate::model::{IconImage, MediaCommand, MenuItem, MenuMode, WindowHandle, WindowInfo};
use crate::platform::{ActionSink, Clock, IconSource, MenuSurface, WindowSystem};

pub fn window(handle: u64, title: &str, process: &str) -> WindowInfo {
    WindowInfo {
        title: title.to_string(),
        process_name: process.to_string(),
        handle: WindowHandle(handle),
        exe_path: Some(PathBuf::from(format!("/usr/bin/{process}"))),
    }
}

#[derive(Default)]
pub struct FakeWindows {
    pub windows: Mutex<Vec<WindowInfo>>,
    pub foreground: Mutex<Option<WindowHandle>>,
    pub switched: Mutex<Vec<WindowHandle>>,
    pub fail_switch: AtomicBool,
    pub enumerations: AtomicUsize,
}

impl FakeWindows {
    pub fn with_windows(windows: Vec<WindowInfo>) -> Self {
        let foreground = windows.first().map(|w| w.handle);
        Self {
            windows: Mutex::new(windows),
            foreground: Mutex::new(foreground),
            ..Default::default()
        }
    }

    pub fn focus(&self, handle: Option<WindowHandle>) {
        *self.foreground.lock() = handle;
    }
}

impl WindowSystem for FakeWindows {
    fn enumerate_visible_windows(&self, excluded: &[String]) -> Result<Vec<WindowInfo>, PlatformError> {
        self.enumerations.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .windows
            .lock()
            .iter()
            .filter(|w| !excluded.contains(&w.process_name))
            .cloned()
            .collect())
    }

    fn foreground_window(&self) -> Option<WindowHandle> {
        *self.foreground.lock()
    }

    fn process_name(&self, window: Option<WindowHandle>) -> Option<String> {
        let handle = window.or_else(|| self.foreground_window())?;
        self.windows
            .lock()
            .iter()
            .find(|w| w.handle == handle)
            .map(|w| w.process_name.clone())
    }

    fn switch_to_window(&self, handle: WindowHandle) -> Result<(), PlatformError> {
        if self.fail_switch.load(Ordering::SeqCst) {
            return Err(PlatformError::WindowNotFound(handle));
        }
        self.switched.lock().push(handle);
        Ok(())
    }
}

/// Icons are vector paths naming what was requested
#[derive(Default)]
pub struct FakeIcons {
    pub missing: Mutex<HashSet<PathBuf>>,
    pub renders: AtomicUsize,
}

impl FakeIcons {
    fn render(&self, name: String) -> Result<IconImage, PlatformError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        Ok(IconImage::Vector(PathBuf::from(name)))
    }
}

impl IconSource for FakeIcons {
    fn icon_for_path(&self, path: &Path) -> Result<IconImage, PlatformError> {
        if self.missing.lock().contains(path) {
            return Err(PlatformError::IconNotFound(path.display().to_string()));
        }
        self.render(path.display().to_string())
    }

    fn folder_icon(&self) -> Result<IconImage, PlatformError> {
        self.render("folder".to_string())
    }

    fn stacked_icon(&self, paths: &[&Path]) -> Result<IconImage, PlatformError> {
        let names: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        self.render(format!("stack:{}", names.join("|")))
    }

    fn action_icon(&self, hint: &str) -> Result<IconImage, PlatformError> {
        self.render(format!("action:{hint}"))
    }

    fn media_icon(&self, command: MediaCommand) -> Result<IconImage, PlatformError> {
        self.render(format!("media:{}", command.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Performed {
    Launch(PathBuf),
    Open(PathBuf),
    Shortcut(String),
    Media(MediaCommand),
}

#[derive(Default)]
pub struct FakeActions {
    pub performed: Mutex<Vec<Performed>>,
    pub failing: Mutex<HashSet<PathBuf>>,
}

impl FakeActions {
    pub fn performed(&self) -> Vec<Performed> {
        self.performed.lock().clone()
    }

    pub fn fail_on(&self, path: &str) {
        self.failing.lock().insert(PathBuf::from(path));
    }

    fn check(&self, path: &Path) -> Result<(), PlatformError> {
        if self.failing.lock().contains(path) {
            return Err(PlatformError::NotLaunchable(path.to_path_buf()));
        }
        Ok(())
    }
}

impl ActionSink for FakeActions {
    fn launch(&self, path: &Path) -> Result<(), PlatformError> {
        self.check(path)?;
        self.performed.lock().push(Performed::Launch(path.to_path_buf()));
        Ok(())
    }

    fn open(&self, path: &Path) -> Result<(), PlatformError> {
        self.check(path)?;
        self.performed.lock().push(Performed::Open(path.to_path_buf()));
        Ok(())
    }

    fn send_shortcut(&self, shortcut: &str) -> Result<(), PlatformError> {
        self.performed.lock().push(Performed::Shortcut(shortcut.to_string()));
        Ok(())
    }

    fn send_media_command(&self, command: MediaCommand) -> Result<(), PlatformError> {
        self.performed.lock().push(Performed::Media(command));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    SetItems(Vec<String>, MenuMode),
    AnimateIn,
    AnimateOut(CloseToken),
    CancelClose,
    Selection(Option<usize>),
    Notice(String),
}

/// Surface that records every call into a shared log
#[derive(Clone, Default)]
pub struct RecordingSurface {
    pub calls: Arc<Mutex<Vec<SurfaceCall>>>,
}

impl RecordingSurface {
    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls.lock().clone()
    }

    /// Token passed to the most recent `animate_out`
    pub fn last_close_token(&self) -> Option<CloseToken> {
        self.calls.lock().iter().rev().find_map(|c| match c {
            SurfaceCall::AnimateOut(token) => Some(*token),
            _ => None,
        })
    }

    pub fn count(&self, wanted: &SurfaceCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == wanted).count()
    }
}

impl MenuSurface for RecordingSurface {
    fn set_items(&mut self, items: &[MenuItem], mode: MenuMode) {
        let names = items.iter().map(|i| i.name.clone()).collect();
        self.calls.lock().push(SurfaceCall::SetItems(names, mode));
    }

    fn animate_in(&mut self) {
        self.calls.lock().push(SurfaceCall::AnimateIn);
    }

    fn animate_out(&mut self, token: CloseToken) {
        self.calls.lock().push(SurfaceCall::AnimateOut(token));
    }

    fn cancel_close(&mut self) {
        self.calls.lock().push(SurfaceCall::CancelClose);
    }

    fn set_selection(&mut self, selection: SelectionState, _item: Option<&MenuItem>) {
        self.calls.lock().push(SurfaceCall::Selection(selection.current));
    }

    fn show_notice(&mut self, message: &str) {
        self.calls.lock().push(SurfaceCall::Notice(message.to_string()));
    }
}

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}
