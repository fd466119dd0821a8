//! Menu data model
//!
//! Items shown in the pie, the modes that produce them, and the handles the
//! menu exchanges with the window system.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which set of items the menu shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum MenuMode {
    /// Running windows
    #[default]
    Switcher,
    /// User-ordered favorites
    Launcher,
    /// Shortcuts for the application that had focus
    Controller,
    /// Transport and volume controls
    MusicRemote,
}

impl MenuMode {
    /// All modes in rotation order
    pub const ALL: [MenuMode; 4] = [
        Self::Switcher,
        Self::Launcher,
        Self::Controller,
        Self::MusicRemote,
    ];

    /// Next mode in enum rotation order (wraps around)
    pub fn next_in_rotation(self) -> Self {
        let index = Self::ALL.iter().position(|m| *m == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }

    /// Stable name used in configuration and on the command line
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Switcher => "Switcher",
            Self::Launcher => "Launcher",
            Self::Controller => "Controller",
            Self::MusicRemote => "MusicRemote",
        }
    }

    /// Whether item population may be slow and must run off the interaction thread
    pub fn fetches_in_background(self) -> bool {
        matches!(self, Self::Switcher)
    }
}

impl fmt::Display for MenuMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MenuMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "switcher" => Ok(Self::Switcher),
            "launcher" => Ok(Self::Launcher),
            "controller" => Ok(Self::Controller),
            "musicremote" | "music" => Ok(Self::MusicRemote),
            _ => Err(ConfigError::UnknownMode(s.to_string())),
        }
    }
}

/// Kind of a menu item, as stored in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ItemKind {
    #[default]
    Application,
    Folder,
    File,
    Action,
    MediaControl,
    Group,
}

/// Transport and volume commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaCommand {
    PlayPause,
    Next,
    Previous,
    Stop,
    VolumeUp,
    VolumeDown,
    Mute,
}

impl MediaCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PlayPause => "playpause",
            Self::Next => "next",
            Self::Previous => "previous",
            Self::Stop => "stop",
            Self::VolumeUp => "volumeup",
            Self::VolumeDown => "volumedown",
            Self::Mute => "mute",
        }
    }
}

impl FromStr for MediaCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "playpause" => Ok(Self::PlayPause),
            "next" => Ok(Self::Next),
            "previous" => Ok(Self::Previous),
            "stop" => Ok(Self::Stop),
            "volumeup" => Ok(Self::VolumeUp),
            "volumedown" => Ok(Self::VolumeDown),
            "mute" => Ok(Self::Mute),
            other => Err(format!("unknown media command '{other}'")),
        }
    }
}

/// Opaque window identifier handed out by the window system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowHandle(pub u64);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One visible top-level window as reported by the window system
#[derive(Debug, Clone, PartialEq)]
pub struct WindowInfo {
    pub title: String,
    pub process_name: String,
    pub handle: WindowHandle,
    /// Executable or desktop entry backing the window, if known
    pub exe_path: Option<PathBuf>,
}

/// The external window that had focus when the menu was opened
///
/// Captured once per open; the menu itself becomes the focused window while
/// visible, so later lookups must use this snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FocusContext {
    pub window: Option<WindowHandle>,
    pub process_name: Option<String>,
}

/// Decoded icon pixels, or a vector image left for the renderer
#[derive(Debug, Clone, PartialEq)]
pub enum IconImage {
    Raster(RgbaImage),
    Vector(PathBuf),
}

/// Shared icon reference; the cache and displayed items hold clones
pub type IconHandle = Arc<IconImage>;

/// One application inside a launcher group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GroupEntry {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
}

/// What selecting an item does
#[derive(Debug, Clone, PartialEq)]
pub enum ItemTarget {
    /// A running window; `fallback` is launched if activation fails
    Window {
        handle: WindowHandle,
        process_name: String,
        fallback: Option<PathBuf>,
    },
    /// A program, folder or file on disk
    Path(PathBuf),
    /// A keyboard shortcut for the previously focused application
    Shortcut(String),
    /// A transport or volume command
    Media(MediaCommand),
    /// Several programs launched together
    Group(Vec<GroupEntry>),
}

/// One wedge of the menu
#[derive(Debug, Clone)]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    pub kind: ItemKind,
    pub icon: Option<IconHandle>,
    pub order: i32,
    pub target: ItemTarget,
}

impl MenuItem {
    /// A running window in switcher mode
    pub fn window(info: &WindowInfo) -> Self {
        Self {
            id: format!("window-{}", info.handle.0),
            name: info.title.clone(),
            kind: ItemKind::Application,
            icon: None,
            order: 0,
            target: ItemTarget::Window {
                handle: info.handle,
                process_name: info.process_name.clone(),
                fallback: info.exe_path.clone(),
            },
        }
    }

    /// A program, folder or file (`kind` must be Application, Folder or File)
    pub fn path(id: impl Into<String>, name: impl Into<String>, kind: ItemKind, path: PathBuf) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            icon: None,
            order: 0,
            target: ItemTarget::Path(path),
        }
    }

    pub fn shortcut(id: impl Into<String>, name: impl Into<String>, shortcut: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ItemKind::Action,
            icon: None,
            order: 0,
            target: ItemTarget::Shortcut(shortcut.into()),
        }
    }

    pub fn media(name: impl Into<String>, command: MediaCommand) -> Self {
        Self {
            id: format!("media-{}", command.as_str()),
            name: name.into(),
            kind: ItemKind::MediaControl,
            icon: None,
            order: 0,
            target: ItemTarget::Media(command),
        }
    }

    pub fn group(id: impl Into<String>, name: impl Into<String>, entries: Vec<GroupEntry>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ItemKind::Group,
            icon: None,
            order: 0,
            target: ItemTarget::Group(entries),
        }
    }

    pub fn with_icon(mut self, icon: Option<IconHandle>) -> Self {
        self.icon = icon;
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Keyboard shortcut string for Action and MediaControl items
    pub fn shortcut_text(&self) -> Option<&str> {
        match &self.target {
            ItemTarget::Shortcut(s) => Some(s),
            ItemTarget::Media(cmd) => Some(cmd.as_str()),
            _ => None,
        }
    }

    /// Whether the kind and the target agree
    pub fn is_consistent(&self) -> bool {
        matches!(
            (&self.kind, &self.target),
            (ItemKind::Application, ItemTarget::Window { .. })
                | (ItemKind::Application | ItemKind::Folder | ItemKind::File, ItemTarget::Path(_))
                | (ItemKind::Action, ItemTarget::Shortcut(_))
                | (ItemKind::MediaControl, ItemTarget::Media(_))
                | (ItemKind::Group, ItemTarget::Group(_))
        )
    }
}
