//! Desktop entries and process launching
//!
//! Looks up `.desktop` files for Wayland app ids, turns their `Exec` line
//! into a command, and starts programs detached from the menu. Also reads the
//! COSMIC dock favorites so an empty launcher can be seeded from them.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use crate::config::LauncherItem;
use crate::error::PlatformError;
use crate::model::ItemKind;

/// Fields of a desktop entry the menu cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopEntry {
    pub name: String,
    pub icon: Option<String>,
    pub exec: Option<String>,
}

/// Get all standard locations for desktop files
fn desktop_file_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![
        PathBuf::from("/usr/share/applications"),
        PathBuf::from("/usr/local/share/applications"),
    ];

    if let Some(data_dir) = dirs::data_local_dir() {
        dirs.push(data_dir.join("applications"));
    }

    dirs.push(PathBuf::from("/var/lib/flatpak/exports/share/applications"));
    if let Some(home) = dirs::home_dir() {
        dirs.push(home.join(".local/share/flatpak/exports/share/applications"));
    }

    dirs.push(PathBuf::from("/var/lib/snapd/desktop/applications"));
    dirs
}

/// Find the desktop file for an app id
///
/// Exact file name first, then a case-insensitive match on the full name or
/// its last dotted component ("Slack" finds "com.slack.Slack.desktop").
pub fn find_desktop_file(app_id: &str) -> Option<PathBuf> {
    if app_id.is_empty() {
        return None;
    }
    let filename = format!("{}.desktop", app_id);
    let dirs = desktop_file_dirs();

    if let Some(path) = dirs.iter().map(|d| d.join(&filename)).find(|p| p.exists()) {
        return Some(path);
    }

    let wanted = app_id.to_lowercase();
    for dir in &dirs {
        let Ok(entries) = fs::read_dir(dir) else {
            continue;
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let name = entry.file_name();
            let Some(base) = name.to_str().and_then(|n| n.strip_suffix(".desktop")) else {
                continue;
            };
            let base = base.to_lowercase();
            if base == wanted || base.rsplit('.').next() == Some(wanted.as_str()) {
                return Some(entry.path());
            }
        }
    }

    None
}

/// Parse the `[Desktop Entry]` group of a desktop file
pub fn parse_desktop_entry(content: &str) -> Option<DesktopEntry> {
    let mut name = None;
    let mut icon = None;
    let mut exec = None;
    let mut in_desktop_entry = false;

    for line in content.lines() {
        let line = line.trim();

        if line.starts_with('[') {
            in_desktop_entry = line == "[Desktop Entry]";
            continue;
        }
        if !in_desktop_entry {
            continue;
        }

        if let Some(value) = line.strip_prefix("Name=") {
            name.get_or_insert_with(|| value.to_string());
        } else if let Some(value) = line.strip_prefix("Icon=") {
            icon = Some(value.to_string());
        } else if let Some(value) = line.strip_prefix("Exec=") {
            exec = Some(value.to_string());
        }
    }

    Some(DesktopEntry {
        name: name?,
        icon,
        exec,
    })
}

pub fn load_desktop_entry(path: &Path) -> Option<DesktopEntry> {
    let content = fs::read_to_string(path).ok()?;
    parse_desktop_entry(&content)
}

/// Split an `Exec` value into program and arguments
///
/// Field codes (`%u`, `%F`, ...) are dropped, `%%` becomes `%`, and double
/// quotes group words.
pub fn exec_args(exec: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;
    let mut chars = exec.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            '\\' if in_quotes => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            '%' => match chars.next() {
                Some('%') => {
                    current.push('%');
                    has_token = true;
                }
                // Field code: drop it
                Some(_) | None => {}
            },
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        args.push(current);
    }
    args
}

/// Start `program` with `args`, detached from our stdio
fn spawn(program: &str, args: &[String], origin: &Path) -> Result<(), PlatformError> {
    debug!("Spawning {} {:?}", program, args);
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| PlatformError::Launch {
            path: origin.to_path_buf(),
            source,
        })?;

    // Reap the child so it does not linger as a zombie
    std::thread::spawn(move || {
        let _ = child.wait();
    });
    Ok(())
}

/// Launch a program given as a desktop file, an executable path, or an app id
pub fn launch(path: &Path) -> Result<(), PlatformError> {
    let desktop = if path.extension().is_some_and(|e| e == "desktop") {
        Some(path.to_path_buf())
    } else if !path.is_absolute() && path.components().count() == 1 {
        find_desktop_file(&path.to_string_lossy())
    } else {
        None
    };

    if let Some(desktop) = desktop {
        let entry = load_desktop_entry(&desktop).ok_or_else(|| PlatformError::NotLaunchable(desktop.clone()))?;
        let args = entry
            .exec
            .as_deref()
            .map(exec_args)
            .unwrap_or_default();
        let Some((program, rest)) = args.split_first() else {
            return Err(PlatformError::NotLaunchable(desktop));
        };
        info!("Launching {} ({})", entry.name, program);
        return spawn(program, rest, path);
    }

    if path.as_os_str().is_empty() {
        return Err(PlatformError::NotLaunchable(path.to_path_buf()));
    }
    if path.is_dir() {
        return open(path);
    }
    info!("Launching {:?}", path);
    spawn(&path.to_string_lossy(), &[], path)
}

/// Open a file or folder with the user's default application
pub fn open(path: &Path) -> Result<(), PlatformError> {
    if path.as_os_str().is_empty() {
        return Err(PlatformError::NotLaunchable(path.to_path_buf()));
    }
    info!("Opening {:?}", path);
    spawn("xdg-open", &[path.to_string_lossy().into_owned()], path)
}

/// Get the path to COSMIC's dock favorites config
fn favorites_path() -> Option<PathBuf> {
    let config_dir = dirs::config_dir()?;
    Some(config_dir.join("cosmic/com.system76.CosmicAppList/v1/favorites"))
}

/// Parse the dock favorites file, a RON list of app ids
pub fn parse_favorites(content: &str) -> Vec<String> {
    match ron::from_str::<Vec<String>>(content) {
        Ok(favorites) => favorites,
        Err(e) => {
            warn!("Could not parse dock favorites: {}", e);
            Vec::new()
        }
    }
}

/// App ids pinned to the COSMIC dock
pub fn read_dock_favorites() -> Vec<String> {
    let Some(path) = favorites_path() else {
        return Vec::new();
    };
    match fs::read_to_string(&path) {
        Ok(content) => parse_favorites(&content),
        Err(e) => {
            debug!("No dock favorites at {:?}: {}", path, e);
            Vec::new()
        }
    }
}

/// Launcher entries for dock favorites that have a desktop file
pub fn favorites_as_launcher_items(favorites: &[String]) -> Vec<LauncherItem> {
    favorites
        .iter()
        .filter_map(|id| {
            let path = find_desktop_file(id)?;
            let entry = load_desktop_entry(&path)?;
            Some((id, path, entry))
        })
        .enumerate()
        .map(|(i, (id, path, entry))| LauncherItem {
            id: id.clone(),
            name: entry.name,
            path,
            kind: ItemKind::Application,
            order: i as i32,
            ..Default::default()
        })
        .collect()
}
