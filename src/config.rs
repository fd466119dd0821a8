//! Configuration module for pie-menu
//!
//! Handles all user configuration for the menu:
//! - Activation triggers (hotkey chord, middle click, touchpad tap)
//! - Default mode and the right-click mode cycle
//! - Switcher exclusions, launcher favorites, per-application shortcuts
//! - Menu geometry and interaction timing
//!
//! Settings are stored as JSON in the user config directory and re-read
//! whenever the file changes, so every menu open sees current values.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::geometry::MenuGeometry;
use crate::icon_cache;
use crate::model::{GroupEntry, ItemKind, MenuMode};

/// Directory name under the platform config/data directories
pub const APP_DIR: &str = "pie-menu";

/// A favorite shown in launcher mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LauncherItem {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub kind: ItemKind,
    pub custom_icon_path: Option<PathBuf>,
    pub order: i32,
    pub group_items: Vec<GroupEntry>,
}

/// A shortcut the user configured for one application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ControllerAction {
    pub id: String,
    pub name: String,
    pub keyboard_shortcut: String,
    pub icon_path: Option<PathBuf>,
}

/// Shortcuts offered in controller mode for one process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppControllerConfig {
    pub process_name: String,
    pub app_name: String,
    pub actions: Vec<ControllerAction>,
}

/// Mode that follows each mode on a right-click in the menu center
///
/// Stored as plain strings and validated on load; entries naming unknown
/// modes are dropped. Unmapped modes follow enum rotation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct ModeCycle {
    next: BTreeMap<MenuMode, MenuMode>,
}

impl ModeCycle {
    /// Validate a raw mapping, returning the valid part and the rejected entries
    pub fn parse(raw: &BTreeMap<String, String>) -> (Self, Vec<ConfigError>) {
        let mut next = BTreeMap::new();
        let mut errors = Vec::new();
        for (from, to) in raw {
            match (from.parse::<MenuMode>(), to.parse::<MenuMode>()) {
                (Ok(from), Ok(to)) => {
                    next.insert(from, to);
                }
                (Err(e), _) | (_, Err(e)) => errors.push(e),
            }
        }
        (Self { next }, errors)
    }

    /// Mode to switch to from `current`
    pub fn next(&self, current: MenuMode) -> MenuMode {
        self.next
            .get(&current)
            .copied()
            .unwrap_or_else(|| current.next_in_rotation())
    }

    pub fn set(&mut self, from: MenuMode, to: MenuMode) {
        self.next.insert(from, to);
    }
}

impl Default for ModeCycle {
    fn default() -> Self {
        let next = MenuMode::ALL
            .iter()
            .map(|m| (*m, m.next_in_rotation()))
            .collect();
        Self { next }
    }
}

impl From<BTreeMap<String, String>> for ModeCycle {
    fn from(raw: BTreeMap<String, String>) -> Self {
        let (cycle, errors) = Self::parse(&raw);
        for e in errors {
            warn!("Ignoring mode cycle entry: {}", e);
        }
        cycle
    }
}

impl From<ModeCycle> for BTreeMap<String, String> {
    fn from(cycle: ModeCycle) -> Self {
        cycle
            .next
            .into_iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect()
    }
}

/// Second trigger press while the menu is still young
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoubleTapSettings {
    /// Switch mode instead of ignoring the press
    pub enabled: bool,
    /// Mode to switch to
    pub mode: MenuMode,
}

impl Default for DoubleTapSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: MenuMode::Launcher,
        }
    }
}

/// Menu ring dimensions in logical pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometrySettings {
    pub menu_radius: f64,
    pub icon_size: f64,
    pub inner_radius: f64,
}

impl Default for GeometrySettings {
    fn default() -> Self {
        let g = MenuGeometry::default();
        Self {
            menu_radius: g.menu_radius,
            icon_size: g.icon_size,
            inner_radius: g.inner_radius,
        }
    }
}

impl From<&GeometrySettings> for MenuGeometry {
    fn from(settings: &GeometrySettings) -> Self {
        Self {
            menu_radius: settings.menu_radius,
            icon_size: settings.icon_size,
            inner_radius: settings.inner_radius,
        }
    }
}

/// Interaction timing in milliseconds
///
/// The debounce and toggle windows were tuned by hand for a keyboard hotkey
/// and a middle mouse button; other input devices may want different values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// Input ignored for this long after the menu opens
    pub debounce_ms: u64,
    /// A repeated trigger closes the menu only after this long
    pub toggle_close_ms: u64,
    /// Raw triggers closer together than this are dropped
    pub trigger_repeat_ms: u64,
    /// Wait after restoring focus before sending a deferred shortcut
    pub focus_settle_ms: u64,
    /// Close animation length used by surfaces that do not animate themselves
    pub close_animation_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 400,
            toggle_close_ms: 700,
            trigger_repeat_ms: 500,
            focus_settle_ms: 50,
            close_animation_ms: 200,
        }
    }
}

impl TimingSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn toggle_close(&self) -> Duration {
        Duration::from_millis(self.toggle_close_ms)
    }

    pub fn trigger_repeat(&self) -> Duration {
        Duration::from_millis(self.trigger_repeat_ms)
    }

    pub fn focus_settle(&self) -> Duration {
        Duration::from_millis(self.focus_settle_ms)
    }

    pub fn close_animation(&self) -> Duration {
        Duration::from_millis(self.close_animation_ms)
    }
}

/// Complete user configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Mode opened by the activation triggers
    pub default_mode: MenuMode,
    /// Keyboard chord that opens the menu, e.g. "Ctrl+Space"
    pub activation_hotkey: String,
    /// Open the menu with the middle mouse button
    pub middle_click_trigger: bool,
    /// Open the menu with a four-finger touchpad tap
    pub touchpad_tap_trigger: bool,
    /// Process names never listed by the switcher
    pub excluded_apps: Vec<String>,
    pub launcher_items: Vec<LauncherItem>,
    pub controller_configs: Vec<AppControllerConfig>,
    pub mode_cycle: ModeCycle,
    pub double_tap: DoubleTapSettings,
    pub geometry: GeometrySettings,
    pub timing: TimingSettings,
    pub icon_cache_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_mode: MenuMode::Switcher,
            activation_hotkey: "Ctrl+Space".to_string(),
            middle_click_trigger: true,
            touchpad_tap_trigger: false,
            excluded_apps: vec![
                "pie-menu".to_string(),
                "cosmic-panel".to_string(),
                "xdg-desktop-portal".to_string(),
            ],
            launcher_items: Vec::new(),
            controller_configs: Vec::new(),
            mode_cycle: ModeCycle::default(),
            double_tap: DoubleTapSettings::default(),
            geometry: GeometrySettings::default(),
            timing: TimingSettings::default(),
            icon_cache_capacity: icon_cache::DEFAULT_CAPACITY,
        }
    }
}

impl Settings {
    /// Get the path to the settings file
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join("settings.json"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load settings from `path`, or return defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load settings, falling back to defaults on any error
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Using default settings: {}", e);
                Self::default()
            }
        }
    }

    /// Save settings to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn menu_geometry(&self) -> MenuGeometry {
        MenuGeometry::from(&self.geometry)
    }

    /// User controller config for a process, matched case-insensitively
    pub fn controller_config_for(&self, process_name: &str) -> Option<&AppControllerConfig> {
        let wanted = normalize_process_name(process_name);
        self.controller_configs
            .iter()
            .find(|c| normalize_process_name(&c.process_name) == wanted)
    }

    /// Whether the switcher should hide windows of this process
    pub fn is_excluded(&self, process_name: &str) -> bool {
        let name = normalize_process_name(process_name);
        self.excluded_apps
            .iter()
            .any(|e| normalize_process_name(e) == name)
    }
}

/// Lowercase a process name and drop a trailing ".exe"
pub fn normalize_process_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    match lower.strip_suffix(".exe") {
        Some(stem) => stem.to_string(),
        None => lower,
    }
}

/// Where the menu reads its configuration from
pub trait SettingsSource: Send + Sync {
    /// Current settings snapshot
    fn current(&self) -> Arc<Settings>;

    /// File the user edits to change settings
    fn location(&self) -> PathBuf;
}

/// File-backed settings, reloaded when the file changes on disk
pub struct SettingsStore {
    path: PathBuf,
    settings: Arc<RwLock<Arc<Settings>>>,
    _watcher: Option<RecommendedWatcher>,
}

impl SettingsStore {
    /// Open the store at `path` and start watching it
    pub fn open(path: PathBuf) -> Self {
        let settings = Arc::new(RwLock::new(Arc::new(Settings::load_or_default(&path))));
        let watcher = Self::watch(&path, settings.clone());
        Self {
            path,
            settings,
            _watcher: watcher,
        }
    }

    /// Watch the settings file's directory and reload on changes to the file
    fn watch(path: &Path, settings: Arc<RwLock<Arc<Settings>>>) -> Option<RecommendedWatcher> {
        let dir = path.parent()?.to_path_buf();
        if let Err(e) = fs::create_dir_all(&dir) {
            warn!("Cannot create config directory {:?}: {}", dir, e);
            return None;
        }

        let file = path.to_path_buf();
        let handler = move |res: notify::Result<notify::Event>| match res {
            Ok(event) if event.paths.iter().any(|p| p == &file) => {
                if event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove() {
                    debug!("Settings file changed, reloading");
                    *settings.write() = Arc::new(Settings::load_or_default(&file));
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Settings watcher error: {}", e),
        };

        let mut watcher = match notify::recommended_watcher(handler) {
            Ok(w) => w,
            Err(e) => {
                warn!("Settings changes will not be picked up: {}", e);
                return None;
            }
        };
        if let Err(e) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
            warn!("Cannot watch {:?}: {}", dir, e);
            return None;
        }
        info!("Watching settings at {:?}", path);
        Some(watcher)
    }

    /// Apply a change, save it, and publish the new snapshot
    pub fn update(&self, change: impl FnOnce(&mut Settings)) -> Result<(), ConfigError> {
        let mut next = (*self.current()).clone();
        change(&mut next);
        next.save_to(&self.path)?;
        *self.settings.write() = Arc::new(next);
        Ok(())
    }
}

impl SettingsSource for SettingsStore {
    fn current(&self) -> Arc<Settings> {
        self.settings.read().clone()
    }

    fn location(&self) -> PathBuf {
        self.path.clone()
    }
}

/// Settings that never change, for tests and one-shot commands
pub struct StaticSettings {
    settings: Arc<Settings>,
    location: PathBuf,
}

impl StaticSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Arc::new(settings),
            location: PathBuf::from("settings.json"),
        }
    }
}

impl SettingsSource for StaticSettings {
    fn current(&self) -> Arc<Settings> {
        self.settings.clone()
    }

    fn location(&self) -> PathBuf {
        self.location.clone()
    }
}
