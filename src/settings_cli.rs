//! CLI settings protocol
//!
//! `--settings-describe` prints a JSON schema of the editable settings,
//! `--settings-set <key> <json>` changes one, `--settings-action <id>` runs
//! an action. Every change prints `{"ok": bool, "message": str}`.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::config::Settings;
use crate::error::ConfigError;
use crate::model::MenuMode;

fn mode_options() -> Value {
    Value::Array(
        MenuMode::ALL
            .iter()
            .map(|m| json!({"value": m.as_str(), "label": mode_label(*m)}))
            .collect(),
    )
}

fn mode_label(mode: MenuMode) -> &'static str {
    match mode {
        MenuMode::Switcher => "Window Switcher",
        MenuMode::Launcher => "Launcher",
        MenuMode::Controller => "App Controller",
        MenuMode::MusicRemote => "Music Remote",
    }
}

/// Schema of the editable settings, filled with current values
pub fn schema(config: &Settings) -> Value {
    json!({
        "title": "Pie Menu Settings",
        "description": "Configure how the radial menu opens and what it shows.",
        "sections": [
            {
                "title": "Activation",
                "items": [
                    {
                        "type": "text",
                        "key": "activation_hotkey",
                        "label": "Hotkey",
                        "value": config.activation_hotkey
                    },
                    {
                        "type": "toggle",
                        "key": "middle_click_trigger",
                        "label": "Middle Click Trigger",
                        "value": config.middle_click_trigger
                    },
                    {
                        "type": "toggle",
                        "key": "touchpad_tap_trigger",
                        "label": "Four-Finger Tap Trigger",
                        "value": config.touchpad_tap_trigger
                    },
                    {
                        "type": "select",
                        "key": "default_mode",
                        "label": "Default Mode",
                        "value": config.default_mode.as_str(),
                        "options": mode_options()
                    },
                    {
                        "type": "toggle",
                        "key": "double_tap_enabled",
                        "label": "Double Tap Switches Mode",
                        "value": config.double_tap.enabled
                    },
                    {
                        "type": "select",
                        "key": "double_tap_mode",
                        "label": "Double Tap Mode",
                        "value": config.double_tap.mode.as_str(),
                        "options": mode_options()
                    }
                ]
            },
            {
                "title": "Timing",
                "items": [
                    {
                        "type": "slider",
                        "key": "debounce_ms",
                        "label": "Ignore Input After Opening",
                        "value": config.timing.debounce_ms as f64,
                        "min": 0.0,
                        "max": 1000.0,
                        "step": 50.0,
                        "unit": "ms"
                    },
                    {
                        "type": "slider",
                        "key": "toggle_close_ms",
                        "label": "Toggle Close Delay",
                        "value": config.timing.toggle_close_ms as f64,
                        "min": 0.0,
                        "max": 2000.0,
                        "step": 50.0,
                        "unit": "ms"
                    },
                    {
                        "type": "slider",
                        "key": "focus_settle_ms",
                        "label": "Shortcut Delay",
                        "value": config.timing.focus_settle_ms as f64,
                        "min": 0.0,
                        "max": 500.0,
                        "step": 10.0,
                        "unit": "ms"
                    }
                ]
            },
            {
                "title": "Appearance",
                "items": [
                    {
                        "type": "slider",
                        "key": "menu_radius",
                        "label": "Menu Radius",
                        "value": config.geometry.menu_radius,
                        "min": 100.0,
                        "max": 300.0,
                        "step": 10.0,
                        "unit": "px"
                    },
                    {
                        "type": "slider",
                        "key": "icon_size",
                        "label": "Icon Size",
                        "value": config.geometry.icon_size,
                        "min": 24.0,
                        "max": 96.0,
                        "step": 4.0,
                        "unit": "px"
                    },
                    {
                        "type": "slider",
                        "key": "inner_radius",
                        "label": "Center Radius",
                        "value": config.geometry.inner_radius,
                        "min": 20.0,
                        "max": 100.0,
                        "step": 5.0,
                        "unit": "px"
                    }
                ]
            },
            {
                "title": "Window Switcher",
                "items": [
                    {
                        "type": "list",
                        "key": "excluded_apps",
                        "label": "Hidden Applications",
                        "value": config.excluded_apps
                    }
                ]
            }
        ],
        "actions": [
            {"id": "reset", "label": "Reset to Defaults", "style": "destructive"}
        ]
    })
}

fn parse<T: DeserializeOwned>(key: &str, value: &str) -> Result<T, ConfigError> {
    serde_json::from_str(value).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn parse_mode(key: &str, value: &str) -> Result<MenuMode, ConfigError> {
    parse::<String>(key, value)?.parse()
}

fn parse_ms(key: &str, value: &str) -> Result<u64, ConfigError> {
    let v: f64 = parse(key, value)?;
    if !(0.0..=10_000.0).contains(&v) {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be between 0 and 10000".to_string(),
        });
    }
    Ok(v as u64)
}

fn parse_radius(key: &str, value: &str) -> Result<f64, ConfigError> {
    let v: f64 = parse(key, value)?;
    if v <= 0.0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be positive".to_string(),
        });
    }
    Ok(v)
}

/// Apply one `key = json value` change to `config`
pub fn apply(config: &mut Settings, key: &str, value: &str) -> Result<&'static str, ConfigError> {
    match key {
        "activation_hotkey" => {
            let v: String = parse(key, value)?;
            if v.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "hotkey cannot be empty".to_string(),
                });
            }
            config.activation_hotkey = v;
            Ok("Updated hotkey")
        }
        "middle_click_trigger" => {
            config.middle_click_trigger = parse(key, value)?;
            Ok("Updated middle click trigger")
        }
        "touchpad_tap_trigger" => {
            config.touchpad_tap_trigger = parse(key, value)?;
            Ok("Updated touchpad tap trigger")
        }
        "default_mode" => {
            config.default_mode = parse_mode(key, value)?;
            Ok("Updated default mode")
        }
        "double_tap_enabled" => {
            config.double_tap.enabled = parse(key, value)?;
            Ok("Updated double tap")
        }
        "double_tap_mode" => {
            config.double_tap.mode = parse_mode(key, value)?;
            Ok("Updated double tap mode")
        }
        "debounce_ms" => {
            config.timing.debounce_ms = parse_ms(key, value)?;
            Ok("Updated input delay")
        }
        "toggle_close_ms" => {
            config.timing.toggle_close_ms = parse_ms(key, value)?;
            Ok("Updated toggle close delay")
        }
        "focus_settle_ms" => {
            config.timing.focus_settle_ms = parse_ms(key, value)?;
            Ok("Updated shortcut delay")
        }
        "menu_radius" => {
            config.geometry.menu_radius = parse_radius(key, value)?;
            Ok("Updated menu radius")
        }
        "icon_size" => {
            config.geometry.icon_size = parse_radius(key, value)?;
            Ok("Updated icon size")
        }
        "inner_radius" => {
            config.geometry.inner_radius = parse_radius(key, value)?;
            Ok("Updated center radius")
        }
        "excluded_apps" => {
            config.excluded_apps = parse(key, value)?;
            Ok("Updated hidden applications")
        }
        _ => Err(ConfigError::UnknownKey(key.to_string())),
    }
}

/// Run a named action against the settings file
pub fn run_action(path: &Path, id: &str) -> Result<&'static str, ConfigError> {
    match id {
        "reset" => {
            Settings::default().save_to(path)?;
            Ok("Reset to defaults")
        }
        _ => Err(ConfigError::UnknownKey(id.to_string())),
    }
}

pub fn describe(path: &Path) {
    let config = Settings::load_or_default(path);
    match serde_json::to_string_pretty(&schema(&config)) {
        Ok(text) => println!("{text}"),
        Err(e) => print_response(false, &format!("Describe failed: {e}")),
    }
}

pub fn set(path: &Path, key: &str, value: &str) {
    let mut config = Settings::load_or_default(path);
    match apply(&mut config, key, value) {
        Ok(msg) => match config.save_to(path) {
            Ok(()) => print_response(true, msg),
            Err(e) => print_response(false, &format!("Save failed: {e}")),
        },
        Err(e) => print_response(false, &e.to_string()),
    }
}

pub fn action(path: &Path, id: &str) {
    match run_action(path, id) {
        Ok(msg) => print_response(true, msg),
        Err(ConfigError::UnknownKey(id)) => print_response(false, &format!("Unknown action: {id}")),
        Err(e) => print_response(false, &format!("Action failed: {e}")),
    }
}

fn print_response(ok: bool, message: &str) {
    let resp = json!({"ok": ok, "message": message});
    println!("{}", resp);
}
