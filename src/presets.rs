//! Controller presets
//!
//! A bundled table of common application shortcuts, compiled into the
//! binary from `presets/presets.ron`, overlaid with the user's own presets
//! from `user_presets.json`. A user preset replaces a bundled one that shares
//! its id or any of its process names.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{normalize_process_name, APP_DIR};
use crate::error::ConfigError;

const BUNDLED_PRESETS: &str = include_str!("../presets/presets.ron");

/// One shortcut in a preset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PresetAction {
    pub name: String,
    pub shortcut: String,
    /// Icon name hint for the wedge
    pub icon: String,
}

/// Shortcuts for one application, matched by process name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Preset {
    pub id: String,
    pub name: String,
    pub description: String,
    pub process_names: Vec<String>,
    pub actions: Vec<PresetAction>,
}

impl Preset {
    fn shares_process_with(&self, other: &Preset) -> bool {
        self.process_names.iter().any(|a| {
            other
                .process_names
                .iter()
                .any(|b| normalize_process_name(a) == normalize_process_name(b))
        })
    }

    /// Same content as `other`, ignoring icon hints and process name order
    fn same_content(&self, other: &Preset) -> bool {
        self.name == other.name
            && self.description == other.description
            && self.process_names.len() == other.process_names.len()
            && self.actions.len() == other.actions.len()
            && self
                .actions
                .iter()
                .zip(&other.actions)
                .all(|(a, b)| a.name == b.name && a.shortcut == b.shortcut)
    }
}

/// Parse the bundled preset table
pub fn bundled() -> Result<Vec<Preset>, ConfigError> {
    Ok(ron::from_str(BUNDLED_PRESETS)?)
}

/// Default location of the user preset file
pub fn default_user_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("user_presets.json"))
}

/// Merged presets with a process name index
#[derive(Debug, Default)]
struct PresetTable {
    presets: Vec<Preset>,
    by_process: HashMap<String, usize>,
}

impl PresetTable {
    fn new(presets: Vec<Preset>) -> Self {
        let mut table = Self {
            presets,
            by_process: HashMap::new(),
        };
        table.reindex();
        table
    }

    fn reindex(&mut self) {
        self.by_process.clear();
        for (index, preset) in self.presets.iter().enumerate() {
            for process in &preset.process_names {
                // First preset listing a process wins
                self.by_process
                    .entry(normalize_process_name(process))
                    .or_insert(index);
            }
        }
    }

    /// Replace the preset sharing an id or process name, or append
    fn merge(&mut self, preset: Preset) {
        let existing = self
            .presets
            .iter()
            .position(|p| p.id == preset.id || p.shares_process_with(&preset));
        match existing {
            Some(index) => self.presets[index] = preset,
            None => self.presets.push(preset),
        }
    }

    fn lookup(&self, process_name: &str) -> Option<&Preset> {
        let key = normalize_process_name(process_name);
        if key.is_empty() {
            return None;
        }

        if let Some(&index) = self.by_process.get(&key) {
            return self.presets.get(index);
        }

        // Partial match, e.g. "code" for "code-insiders"
        self.presets.iter().find(|p| {
            p.process_names.iter().any(|name| {
                let name = normalize_process_name(name);
                !name.is_empty() && (key.contains(&name) || name.contains(&key))
            })
        })
    }
}

/// Shared preset store
pub struct Presets {
    bundled: Vec<Preset>,
    table: RwLock<PresetTable>,
    user_path: Option<PathBuf>,
}

impl Presets {
    /// Load bundled presets and the user file at the default location
    pub fn load() -> Self {
        Self::load_with_user_file(default_user_path())
    }

    /// Load bundled presets and the user file at `user_path`
    pub fn load_with_user_file(user_path: Option<PathBuf>) -> Self {
        let bundled = match bundled() {
            Ok(presets) => presets,
            Err(e) => {
                warn!("Bundled presets unavailable: {}", e);
                Vec::new()
            }
        };

        let mut table = PresetTable::new(bundled.clone());
        if let Some(path) = user_path.as_deref() {
            match read_preset_file(path) {
                Ok(user) => {
                    debug!("Loaded {} user presets from {:?}", user.len(), path);
                    for preset in user {
                        table.merge(preset);
                    }
                    table.reindex();
                }
                Err(ConfigError::Io { .. }) if !path.exists() => {}
                Err(e) => warn!("Ignoring user presets: {}", e),
            }
        }

        Self {
            bundled,
            table: RwLock::new(table),
            user_path,
        }
    }

    /// Presets from an in-memory list, without a user file
    pub fn from_presets(presets: Vec<Preset>) -> Self {
        Self {
            bundled: presets.clone(),
            table: RwLock::new(PresetTable::new(presets)),
            user_path: None,
        }
    }

    /// Preset for a process: exact name first, then partial match
    pub fn for_process(&self, process_name: &str) -> Option<Preset> {
        self.table.read().lookup(process_name).cloned()
    }

    pub fn all(&self) -> Vec<Preset> {
        self.table.read().presets.clone()
    }

    /// Presets whose name, description or process names contain `query`
    pub fn search(&self, query: &str) -> Vec<Preset> {
        let query = query.trim().to_lowercase();
        let table = self.table.read();
        if query.is_empty() {
            return table.presets.clone();
        }
        table
            .presets
            .iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&query)
                    || p.description.to_lowercase().contains(&query)
                    || p.process_names.iter().any(|n| n.to_lowercase().contains(&query))
            })
            .cloned()
            .collect()
    }

    /// Merge presets from a JSON file and persist the user overlay
    ///
    /// Returns the number of presets imported.
    pub fn import(&self, path: &Path) -> Result<usize, ConfigError> {
        let imported = read_preset_file(path)?;
        let count = imported.len();
        if count == 0 {
            return Ok(0);
        }

        {
            let mut table = self.table.write();
            for (i, mut preset) in imported.into_iter().enumerate() {
                if preset.id.is_empty() {
                    preset.id = generated_id(&preset, i);
                }
                table.merge(preset);
            }
            table.reindex();
        }
        self.save_user_presets()?;
        info!("Imported {} presets from {:?}", count, path);
        Ok(count)
    }

    /// Replace a preset with the same id and persist the user overlay
    pub fn update(&self, preset: Preset) -> Result<bool, ConfigError> {
        {
            let mut table = self.table.write();
            let Some(index) = table.presets.iter().position(|p| p.id == preset.id) else {
                return Ok(false);
            };
            table.presets[index] = preset;
            table.reindex();
        }
        self.save_user_presets()?;
        Ok(true)
    }

    /// Presets that are new or differ from their bundled version
    pub fn user_overlay(&self) -> Vec<Preset> {
        self.table
            .read()
            .presets
            .iter()
            .filter(|p| {
                !self
                    .bundled
                    .iter()
                    .any(|b| b.id == p.id && b.same_content(p))
            })
            .cloned()
            .collect()
    }

    fn save_user_presets(&self) -> Result<(), ConfigError> {
        let Some(path) = self.user_path.as_deref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(&self.user_overlay()).map_err(|source| {
            ConfigError::Json {
                path: path.to_path_buf(),
                source,
            }
        })?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn read_preset_file(path: &Path) -> Result<Vec<Preset>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn generated_id(preset: &Preset, index: usize) -> String {
    let slug: String = preset
        .name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        format!("imported-{index}")
    } else {
        format!("imported-{slug}")
    }
}
