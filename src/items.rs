//! Menu item population
//!
//! Builds the ordered wedge list for each mode:
//! - Switcher: one item per visible window, minus excluded processes
//! - Launcher: the user's favorites, sorted by their `order`
//! - Controller: shortcuts for the application that had focus
//! - MusicRemote: fixed transport and volume controls
//!
//! The order of the returned list is the wedge order, clockwise from the top.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{LauncherItem, Settings, SettingsSource};
use crate::error::PlatformError;
use crate::icon_cache::IconCache;
use crate::model::{
    FocusContext, IconHandle, IconImage, ItemKind, ItemTarget, MediaCommand, MenuItem, MenuMode, WindowInfo,
};
use crate::platform::{IconSource, WindowSystem};
use crate::presets::Presets;

/// Longest window title shown without truncation
const MAX_TITLE_CHARS: usize = 30;

/// Children shown in a group's stacked icon
const MAX_STACKED_ICONS: usize = 4;

/// Media controls in wedge order
const MUSIC_REMOTE: [(&str, MediaCommand); 6] = [
    ("Previous", MediaCommand::Previous),
    ("Play/Pause", MediaCommand::PlayPause),
    ("Next", MediaCommand::Next),
    ("Volume Down", MediaCommand::VolumeDown),
    ("Mute", MediaCommand::Mute),
    ("Volume Up", MediaCommand::VolumeUp),
];

/// Produces the items for each menu mode
pub struct ItemProvider {
    settings: Arc<dyn SettingsSource>,
    presets: Arc<Presets>,
    windows: Arc<dyn WindowSystem>,
    icons: Arc<dyn IconSource>,
    cache: Arc<IconCache>,
}

impl ItemProvider {
    pub fn new(
        settings: Arc<dyn SettingsSource>,
        presets: Arc<Presets>,
        windows: Arc<dyn WindowSystem>,
        icons: Arc<dyn IconSource>,
        cache: Arc<IconCache>,
    ) -> Self {
        Self {
            settings,
            presets,
            windows,
            icons,
            cache,
        }
    }

    /// Items for `mode`, using the focus captured when the menu opened
    pub fn get_items(&self, mode: MenuMode, context: &FocusContext) -> Vec<MenuItem> {
        let settings = self.settings.current();
        let items = match mode {
            MenuMode::Switcher => self.switcher_items(&settings),
            MenuMode::Launcher => self.launcher_items(&settings),
            MenuMode::Controller => self.controller_items(&settings, context),
            MenuMode::MusicRemote => self.music_remote_items(),
        };
        debug!("{} items for {}", items.len(), mode);
        items
    }

    fn switcher_items(&self, settings: &Settings) -> Vec<MenuItem> {
        let windows = match self.windows.enumerate_visible_windows(&settings.excluded_apps) {
            Ok(windows) => windows,
            Err(e) => {
                warn!("Window enumeration failed: {}", e);
                return Vec::new();
            }
        };

        windows
            .iter()
            .filter(|w| !settings.is_excluded(&w.process_name))
            .enumerate()
            .map(|(i, info)| {
                let mut item = MenuItem::window(info)
                    .with_icon(self.window_icon(info))
                    .with_order(i as i32);
                item.name = truncate_title(&info.title);
                item
            })
            .collect()
    }

    fn window_icon(&self, info: &WindowInfo) -> Option<IconHandle> {
        let path = info
            .exe_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(&info.process_name));
        self.path_icon(&path)
    }

    fn launcher_items(&self, settings: &Settings) -> Vec<MenuItem> {
        let mut items: Vec<MenuItem> = settings
            .launcher_items
            .iter()
            .filter_map(|entry| self.launcher_item(entry))
            .collect();
        // Stable: equal orders keep their configured position
        items.sort_by_key(|item| item.order);
        items
    }

    fn launcher_item(&self, entry: &LauncherItem) -> Option<MenuItem> {
        let item = match entry.kind {
            ItemKind::Group => MenuItem::group(&entry.id, &entry.name, entry.group_items.clone()),
            ItemKind::Action => {
                MenuItem::shortcut(&entry.id, &entry.name, entry.path.to_string_lossy())
            }
            ItemKind::MediaControl => {
                let command = match entry.path.to_string_lossy().parse::<MediaCommand>() {
                    Ok(command) => command,
                    Err(e) => {
                        warn!("Skipping launcher item '{}': {}", entry.name, e);
                        return None;
                    }
                };
                let mut item = MenuItem::media(&entry.name, command);
                item.id = entry.id.clone();
                item
            }
            kind => MenuItem::path(&entry.id, &entry.name, kind, entry.path.clone()),
        };

        let icon = if let Some(custom) = &entry.custom_icon_path {
            self.path_icon(custom)
        } else {
            match entry.kind {
                ItemKind::Group => {
                    let paths: Vec<&Path> = entry
                        .group_items
                        .iter()
                        .map(|g| g.path.as_path())
                        .filter(|p| !p.as_os_str().is_empty())
                        .take(MAX_STACKED_ICONS)
                        .collect();
                    self.stacked_icon(&paths)
                }
                ItemKind::Folder => self.folder_icon(),
                ItemKind::Action => self.action_icon(&entry.name),
                ItemKind::MediaControl => match &item.target {
                    ItemTarget::Media(command) => self.media_icon(*command),
                    _ => None,
                },
                ItemKind::Application | ItemKind::File => self.path_icon(&entry.path),
            }
        };

        Some(item.with_icon(icon).with_order(entry.order))
    }

    fn controller_items(&self, settings: &Settings, context: &FocusContext) -> Vec<MenuItem> {
        let Some(process) = context.process_name.as_deref().filter(|p| !p.is_empty()) else {
            debug!("Controller: no focused application captured");
            return Vec::new();
        };
        debug!("Controller: looking up shortcuts for '{}'", process);

        // 1. User configuration
        if let Some(config) = settings
            .controller_config_for(process)
            .filter(|c| !c.actions.is_empty())
        {
            return config
                .actions
                .iter()
                .enumerate()
                .map(|(i, action)| {
                    let icon = match &action.icon_path {
                        Some(path) => self.path_icon(path),
                        None => self.action_icon(&action.name),
                    };
                    let id = if action.id.is_empty() {
                        format!("action-{i}")
                    } else {
                        action.id.clone()
                    };
                    MenuItem::shortcut(id, &action.name, &action.keyboard_shortcut)
                        .with_icon(icon)
                        .with_order(i as i32)
                })
                .collect();
        }

        // 2. Bundled or user presets
        if let Some(preset) = self.presets.for_process(process) {
            debug!("Controller: using preset '{}'", preset.id);
            return preset
                .actions
                .iter()
                .enumerate()
                .map(|(i, action)| {
                    let hint = if action.icon.is_empty() {
                        &action.name
                    } else {
                        &action.icon
                    };
                    MenuItem::shortcut(format!("preset-{}-{i}", preset.id), &action.name, &action.shortcut)
                        .with_icon(self.action_icon(hint))
                        .with_order(i as i32)
                })
                .collect();
        }

        // 3. Offer to configure it
        vec![MenuItem::path(
            format!("configure-{process}"),
            format!("Configure {process}"),
            ItemKind::File,
            self.settings.location(),
        )
        .with_icon(self.action_icon("settings"))]
    }

    fn music_remote_items(&self) -> Vec<MenuItem> {
        MUSIC_REMOTE
            .iter()
            .enumerate()
            .map(|(i, (name, command))| {
                MenuItem::media(*name, *command)
                    .with_icon(self.media_icon(*command))
                    .with_order(i as i32)
            })
            .collect()
    }

    fn cached(
        &self,
        key: String,
        factory: impl FnOnce() -> Result<IconImage, PlatformError>,
    ) -> Option<IconHandle> {
        self.cache.get_or_create(&key, factory)
    }

    fn path_icon(&self, path: &Path) -> Option<IconHandle> {
        self.cached(format!("path:{}", path.display()), || self.icons.icon_for_path(path))
    }

    fn folder_icon(&self) -> Option<IconHandle> {
        self.cached("folder".to_string(), || self.icons.folder_icon())
    }

    fn stacked_icon(&self, paths: &[&Path]) -> Option<IconHandle> {
        if paths.is_empty() {
            return self.folder_icon();
        }
        let key: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        self.cached(format!("stack:{}", key.join("|")), || self.icons.stacked_icon(paths))
    }

    fn action_icon(&self, hint: &str) -> Option<IconHandle> {
        self.cached(format!("action:{}", hint.to_lowercase()), || {
            self.icons.action_icon(hint)
        })
    }

    fn media_icon(&self, command: MediaCommand) -> Option<IconHandle> {
        self.cached(format!("media:{}", command.as_str()), || {
            self.icons.media_icon(command)
        })
    }
}

/// Shorten long window titles to fit a wedge label
pub fn truncate_title(title: &str) -> String {
    if title.chars().count() > MAX_TITLE_CHARS {
        let head: String = title.chars().take(MAX_TITLE_CHARS - 3).collect();
        format!("{head}...")
    } else {
        title.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppControllerConfig, ControllerAction, StaticSettings};
    use crate::model::GroupEntry;
    use crate::presets::{Preset, PresetAction};
    use crate::testing::{window, FakeIcons, FakeWindows};
    use std::sync::atomic::Ordering;

    struct Fixture {
        provider: ItemProvider,
        icons: Arc<FakeIcons>,
        cache: Arc<IconCache>,
    }

    fn fixture(settings: Settings, windows: Vec<WindowInfo>) -> Fixture {
        let icons = Arc::new(FakeIcons::default());
        let cache = Arc::new(IconCache::new(100));
        let presets = Arc::new(Presets::from_presets(vec![Preset {
            id: "browser".into(),
            name: "Browser".into(),
            description: String::new(),
            process_names: vec!["firefox".into()],
            actions: vec![
                PresetAction {
                    name: "New Tab".into(),
                    shortcut: "Ctrl+T".into(),
                    icon: "tab-new".into(),
                },
                PresetAction {
                    name: "Back".into(),
                    shortcut: "Alt+Left".into(),
                    icon: String::new(),
                },
            ],
        }]));
        let provider = ItemProvider::new(
            Arc::new(StaticSettings::new(settings)),
            presets,
            Arc::new(FakeWindows::with_windows(windows)),
            icons.clone(),
            cache.clone(),
        );
        Fixture { provider, icons, cache }
    }

    fn context(process: &str) -> FocusContext {
        FocusContext {
            window: None,
            process_name: Some(process.to_string()),
        }
    }

    fn names(items: &[MenuItem]) -> Vec<&str> {
        items.iter().map(|i| i.name.as_str()).collect()
    }

    #[test]
    fn test_switcher_lists_windows_minus_exclusions() {
        let mut settings = Settings::default();
        settings.excluded_apps = vec!["Slack".into()];
        let f = fixture(
            settings,
            vec![
                window(1, "Inbox", "thunderbird"),
                window(2, "general", "slack"),
                window(3, "A very long document title that keeps going", "libreoffice"),
            ],
        );

        let items = f.provider.get_items(MenuMode::Switcher, &FocusContext::default());
        assert_eq!(names(&items), vec!["Inbox", "A very long document title ..."]);
        assert_eq!(items[1].name.chars().count(), 30);
        assert!(matches!(items[0].target, ItemTarget::Window { handle, .. } if handle.0 == 1));
        assert!(items.iter().all(|i| i.icon.is_some() && i.is_consistent()));
    }

    #[test]
    fn test_truncate_title_boundary() {
        let exact: String = "x".repeat(30);
        assert_eq!(truncate_title(&exact), exact);
        assert_eq!(truncate_title(&"y".repeat(31)), format!("{}...", "y".repeat(27)));
        assert_eq!(truncate_title("Ünïcödé"), "Ünïcödé");
    }

    #[test]
    fn test_launcher_sorted_by_order_with_icons() {
        let mut settings = Settings::default();
        settings.launcher_items = vec![
            LauncherItem {
                id: "docs".into(),
                name: "Documents".into(),
                path: "/home/u/Documents".into(),
                kind: ItemKind::Folder,
                order: 2,
                ..Default::default()
            },
            LauncherItem {
                id: "term".into(),
                name: "Terminal".into(),
                path: "/usr/bin/alacritty".into(),
                kind: ItemKind::Application,
                order: 1,
                ..Default::default()
            },
            LauncherItem {
                id: "work".into(),
                name: "Work".into(),
                kind: ItemKind::Group,
                order: 1,
                group_items: (0..6)
                    .map(|i| GroupEntry {
                        id: format!("g{i}"),
                        name: format!("App {i}"),
                        path: format!("/usr/bin/app{i}").into(),
                    })
                    .collect(),
                ..Default::default()
            },
        ];
        let f = fixture(settings, Vec::new());

        let items = f.provider.get_items(MenuMode::Launcher, &FocusContext::default());
        assert_eq!(names(&items), vec!["Terminal", "Work", "Documents"]);
        assert_eq!(
            items[1].icon.as_deref(),
            Some(&IconImage::Vector(
                "stack:/usr/bin/app0|/usr/bin/app1|/usr/bin/app2|/usr/bin/app3".into()
            ))
        );
        assert_eq!(items[2].icon.as_deref(), Some(&IconImage::Vector("folder".into())));
    }

    #[test]
    fn test_launcher_custom_icon_wins() {
        let mut settings = Settings::default();
        settings.launcher_items = vec![LauncherItem {
            id: "notes".into(),
            name: "Notes".into(),
            path: "/home/u/notes.md".into(),
            kind: ItemKind::File,
            custom_icon_path: Some("/icons/notes.png".into()),
            ..Default::default()
        }];
        let f = fixture(settings, Vec::new());
        let items = f.provider.get_items(MenuMode::Launcher, &FocusContext::default());
        assert_eq!(items[0].icon.as_deref(), Some(&IconImage::Vector("/icons/notes.png".into())));
    }

    #[test]
    fn test_missing_icon_degrades_to_none() {
        let mut settings = Settings::default();
        settings.launcher_items = vec![LauncherItem {
            id: "x".into(),
            name: "Gone".into(),
            path: "/opt/gone".into(),
            ..Default::default()
        }];
        let f = fixture(settings, Vec::new());
        f.icons.missing.lock().insert("/opt/gone".into());

        let items = f.provider.get_items(MenuMode::Launcher, &FocusContext::default());
        assert_eq!(items.len(), 1);
        assert!(items[0].icon.is_none());
        assert!(!f.cache.contains("path:/opt/gone"));
    }

    #[test]
    fn test_icons_come_from_cache_on_repeat() {
        let f = fixture(Settings::default(), Vec::new());
        f.provider.get_items(MenuMode::MusicRemote, &FocusContext::default());
        let first = f.icons.renders.load(Ordering::SeqCst);
        f.provider.get_items(MenuMode::MusicRemote, &FocusContext::default());
        assert_eq!(f.icons.renders.load(Ordering::SeqCst), first);
        assert_eq!(f.cache.len(), 6);
    }

    #[test]
    fn test_controller_prefers_user_config() {
        let mut settings = Settings::default();
        settings.controller_configs = vec![AppControllerConfig {
            process_name: "Firefox.exe".into(),
            app_name: "Firefox".into(),
            actions: vec![ControllerAction {
                id: "reader".into(),
                name: "Reader View".into(),
                keyboard_shortcut: "F9".into(),
                icon_path: None,
            }],
        }];
        let f = fixture(settings, Vec::new());

        let items = f.provider.get_items(MenuMode::Controller, &context("firefox"));
        assert_eq!(names(&items), vec!["Reader View"]);
        assert_eq!(items[0].shortcut_text(), Some("F9"));
        assert_eq!(items[0].icon.as_deref(), Some(&IconImage::Vector("action:Reader View".into())));
    }

    #[test]
    fn test_controller_empty_config_falls_through_to_preset() {
        let mut settings = Settings::default();
        settings.controller_configs = vec![AppControllerConfig {
            process_name: "firefox".into(),
            app_name: "Firefox".into(),
            actions: Vec::new(),
        }];
        let f = fixture(settings, Vec::new());

        let items = f.provider.get_items(MenuMode::Controller, &context("firefox"));
        assert_eq!(names(&items), vec!["New Tab", "Back"]);
        assert_eq!(items[0].icon.as_deref(), Some(&IconImage::Vector("action:tab-new".into())));
        assert_eq!(items[1].icon.as_deref(), Some(&IconImage::Vector("action:Back".into())));
    }

    #[test]
    fn test_controller_unknown_app_offers_configuration() {
        let f = fixture(Settings::default(), Vec::new());
        let items = f.provider.get_items(MenuMode::Controller, &context("foo.exe"));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Configure foo.exe");
        assert_eq!(items[0].kind, ItemKind::File);
        assert_eq!(items[0].target, ItemTarget::Path("settings.json".into()));
    }

    #[test]
    fn test_controller_without_focus_is_empty() {
        let f = fixture(Settings::default(), Vec::new());
        assert!(f.provider.get_items(MenuMode::Controller, &FocusContext::default()).is_empty());
    }

    #[test]
    fn test_music_remote_order() {
        let f = fixture(Settings::default(), Vec::new());
        let items = f.provider.get_items(MenuMode::MusicRemote, &FocusContext::default());
        assert_eq!(
            names(&items),
            vec!["Previous", "Play/Pause", "Next", "Volume Down", "Mute", "Volume Up"]
        );
        assert_eq!(items[1].shortcut_text(), Some("playpause"));
    }
}
