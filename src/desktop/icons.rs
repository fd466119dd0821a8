//! Icon lookup through the freedesktop icon theme
//!
//! PNG and other raster icons are decoded and scaled to the menu's icon size.
//! SVG icons are passed through as paths for the renderer.

use std::path::{Path, PathBuf};

use image::{imageops, imageops::FilterType, RgbaImage};
use tracing::debug;

use super::apps;
use crate::error::PlatformError;
use crate::model::{IconImage, MediaCommand};
use crate::platform::IconSource;

/// Icon file extensions accepted as custom icon paths
const IMAGE_EXTENSIONS: &[&str] = &["png", "svg", "jpg", "jpeg", "xpm", "ico"];

/// Find icon path for an icon name
///
/// Absolute paths are returned as-is when they exist. Otherwise the current
/// theme is asked, then a few well-known themes directly, then common
/// alternate spellings.
pub fn find_icon_path(icon_name: &str, size: u16) -> Option<PathBuf> {
    if icon_name.starts_with('/') {
        let path = PathBuf::from(icon_name);
        return path.exists().then_some(path);
    }

    if let Some(path) = freedesktop_icons::lookup(icon_name)
        .with_size(size)
        .with_scale(1)
        .find()
    {
        return Some(path);
    }

    let icon_themes = ["Pop", "Adwaita", "hicolor", "Papirus"];
    let categories = ["apps", "actions", "places", "status", "mimetypes"];
    let sized = format!("{size}x{size}");
    let sizes = [sized.as_str(), "scalable", "symbolic"];

    for theme in icon_themes {
        for sz in sizes {
            for category in categories {
                for ext in ["svg", "png"] {
                    let path = PathBuf::from(format!(
                        "/usr/share/icons/{theme}/{sz}/{category}/{icon_name}.{ext}"
                    ));
                    if path.exists() {
                        return Some(path);
                    }
                }
            }
        }
    }

    // Symbolic icons usually only ship in small sizes
    if icon_name.ends_with("-symbolic") {
        for sym_size in [24, 16, 32, 48] {
            if let Some(path) = freedesktop_icons::lookup(icon_name)
                .with_size(sym_size)
                .with_scale(1)
                .find()
            {
                return Some(path);
            }
        }
    }

    let alternates = [
        format!("{icon_name}-desktop"),
        icon_name.replace("-browser", "-desktop"),
        icon_name.to_lowercase(),
    ];
    alternates
        .iter()
        .filter(|alt| alt.as_str() != icon_name)
        .find_map(|alt| {
            freedesktop_icons::lookup(alt)
                .with_size(size)
                .with_scale(1)
                .find()
        })
}

/// Freedesktop icon name for a free-form action label
///
/// Keywords are matched case-insensitively. An unmatched hint is used as an
/// icon name directly, so presets may name theme icons themselves.
pub fn action_icon_name(hint: &str) -> String {
    let lower = hint.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    let name = if has(&["search", "find"]) {
        "edit-find"
    } else if has(&["new tab", "new window", "add"]) {
        "list-add"
    } else if has(&["new"]) {
        "document-new"
    } else if has(&["close", "delete", "remove"]) {
        "window-close"
    } else if has(&["save"]) {
        "document-save"
    } else if has(&["undo", "back"]) {
        "go-previous"
    } else if has(&["redo", "forward"]) {
        "go-next"
    } else if has(&["refresh", "reload"]) {
        "view-refresh"
    } else if has(&["settings", "preferences", "configure"]) {
        "preferences-system"
    } else if has(&["copy"]) {
        "edit-copy"
    } else if has(&["cut"]) {
        "edit-cut"
    } else if has(&["paste"]) {
        "edit-paste"
    } else if has(&["terminal", "console"]) {
        "utilities-terminal"
    } else if has(&["code", "comment"]) {
        "text-x-script"
    } else if has(&["play", "run"]) {
        "media-playback-start"
    } else if has(&["zoom in"]) {
        "zoom-in"
    } else if has(&["zoom out"]) {
        "zoom-out"
    } else if has(&["home"]) {
        "go-home"
    } else {
        return lower.trim().replace(' ', "-");
    };
    name.to_string()
}

pub fn media_icon_name(command: MediaCommand) -> &'static str {
    match command {
        MediaCommand::PlayPause => "media-playback-start",
        MediaCommand::Next => "media-skip-forward",
        MediaCommand::Previous => "media-skip-backward",
        MediaCommand::Stop => "media-playback-stop",
        MediaCommand::VolumeUp => "audio-volume-high",
        MediaCommand::VolumeDown => "audio-volume-low",
        MediaCommand::Mute => "audio-volume-muted",
    }
}

/// Icons resolved from the installed themes
#[derive(Debug, Clone)]
pub struct DesktopIcons {
    size: u16,
}

impl DesktopIcons {
    pub fn new(size: u16) -> Self {
        Self { size: size.max(1) }
    }

    /// Load an icon file, scaling rasters to our size
    pub fn load_file(&self, path: &Path) -> Result<IconImage, PlatformError> {
        if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("svg")) {
            return Ok(IconImage::Vector(path.to_path_buf()));
        }
        let decoded = image::open(path).map_err(|source| PlatformError::IconDecode {
            path: path.to_path_buf(),
            source,
        })?;
        let size = u32::from(self.size);
        let rgba = decoded.to_rgba8();
        if rgba.width() == size && rgba.height() == size {
            return Ok(IconImage::Raster(rgba));
        }
        Ok(IconImage::Raster(imageops::resize(
            &rgba,
            size,
            size,
            FilterType::Lanczos3,
        )))
    }

    fn named(&self, name: &str) -> Result<IconImage, PlatformError> {
        let path = find_icon_path(name, self.size)
            .ok_or_else(|| PlatformError::IconNotFound(name.to_string()))?;
        self.load_file(&path)
    }

    fn from_desktop_file(&self, desktop: &Path) -> Option<IconImage> {
        let icon = apps::load_desktop_entry(desktop)?.icon?;
        match self.named(&icon) {
            Ok(image) => Some(image),
            Err(e) => {
                debug!("Icon '{}' from {:?}: {}", icon, desktop, e);
                None
            }
        }
    }
}

impl IconSource for DesktopIcons {
    fn icon_for_path(&self, path: &Path) -> Result<IconImage, PlatformError> {
        if path.is_dir() {
            return self.folder_icon();
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        match ext.as_deref() {
            Some("desktop") => {
                return self
                    .from_desktop_file(path)
                    .ok_or_else(|| PlatformError::IconNotFound(path.display().to_string()));
            }
            Some(e) if IMAGE_EXTENSIONS.contains(&e) && path.exists() => {
                return self.load_file(path);
            }
            _ => {}
        }

        // Executables and app ids: desktop entry first, then the bare name
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if stem.is_empty() {
            return Err(PlatformError::IconNotFound(path.display().to_string()));
        }
        if let Some(image) = apps::find_desktop_file(&stem).and_then(|d| self.from_desktop_file(&d)) {
            return Ok(image);
        }
        self.named(&stem)
            .or_else(|_| self.named(&stem.to_lowercase()))
            .or_else(|_| self.named("application-x-executable"))
    }

    fn folder_icon(&self) -> Result<IconImage, PlatformError> {
        self.named("folder")
    }

    fn stacked_icon(&self, paths: &[&Path]) -> Result<IconImage, PlatformError> {
        let children: Vec<IconImage> = paths
            .iter()
            .take(4)
            .filter_map(|p| self.icon_for_path(p).ok())
            .collect();
        compose_stack(&children, u32::from(self.size))
            .ok_or_else(|| PlatformError::IconNotFound("group".to_string()))
    }

    fn action_icon(&self, hint: &str) -> Result<IconImage, PlatformError> {
        let name = action_icon_name(hint);
        self.named(&name)
            .or_else(|_| self.named(&format!("{name}-symbolic")))
            .or_else(|_| self.named("system-run"))
    }

    fn media_icon(&self, command: MediaCommand) -> Result<IconImage, PlatformError> {
        let name = media_icon_name(command);
        self.named(name)
            .or_else(|_| self.named(&format!("{name}-symbolic")))
    }
}

/// Lay up to four icons out in a 2x2 grid on a transparent canvas
///
/// Vector children cannot be drawn here; when no child is a raster the first
/// vector icon stands in for the whole group.
pub fn compose_stack(children: &[IconImage], size: u32) -> Option<IconImage> {
    let rasters: Vec<&RgbaImage> = children
        .iter()
        .filter_map(|c| match c {
            IconImage::Raster(img) => Some(img),
            IconImage::Vector(_) => None,
        })
        .take(4)
        .collect();

    if rasters.is_empty() {
        return children.first().cloned();
    }

    let cell = (size / 2).max(1);
    let mut canvas = RgbaImage::new(size, size);
    for (i, img) in rasters.iter().enumerate() {
        let scaled = imageops::resize(*img, cell, cell, FilterType::Triangle);
        let x = (i as u32 % 2) * cell;
        let y = (i as u32 / 2) * cell;
        imageops::overlay(&mut canvas, &scaled, i64::from(x), i64::from(y));
    }
    Some(IconImage::Raster(canvas))
}
