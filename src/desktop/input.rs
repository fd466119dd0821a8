//! Keyboard synthesis through a uinput virtual device
//!
//! Shortcuts such as `Ctrl+Shift+T` are parsed into evdev key codes and typed
//! into whatever window has focus. Requires write access to /dev/uinput.

use std::thread;
use std::time::Duration;

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, EventType, InputEvent, Key};
use tracing::{debug, info};

use crate::error::PlatformError;
use crate::model::MediaCommand;

/// The compositor needs a moment to pick up a new input device
const DEVICE_SETTLE: Duration = Duration::from_millis(200);

/// Gap between press and release so applications see both
const KEY_GAP: Duration = Duration::from_millis(12);

/// A parsed keyboard shortcut
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortcut {
    pub modifiers: Vec<Key>,
    pub key: Key,
}

fn modifier_from_name(name: &str) -> Option<Key> {
    match name {
        "ctrl" | "control" => Some(Key::KEY_LEFTCTRL),
        "shift" => Some(Key::KEY_LEFTSHIFT),
        "alt" => Some(Key::KEY_LEFTALT),
        "altgr" => Some(Key::KEY_RIGHTALT),
        "super" | "meta" | "logo" | "win" => Some(Key::KEY_LEFTMETA),
        _ => None,
    }
}

const LETTERS: [Key; 26] = [
    Key::KEY_A, Key::KEY_B, Key::KEY_C, Key::KEY_D, Key::KEY_E, Key::KEY_F, Key::KEY_G,
    Key::KEY_H, Key::KEY_I, Key::KEY_J, Key::KEY_K, Key::KEY_L, Key::KEY_M, Key::KEY_N,
    Key::KEY_O, Key::KEY_P, Key::KEY_Q, Key::KEY_R, Key::KEY_S, Key::KEY_T, Key::KEY_U,
    Key::KEY_V, Key::KEY_W, Key::KEY_X, Key::KEY_Y, Key::KEY_Z,
];

const DIGITS: [Key; 10] = [
    Key::KEY_0, Key::KEY_1, Key::KEY_2, Key::KEY_3, Key::KEY_4,
    Key::KEY_5, Key::KEY_6, Key::KEY_7, Key::KEY_8, Key::KEY_9,
];

const FUNCTION_KEYS: [Key; 24] = [
    Key::KEY_F1, Key::KEY_F2, Key::KEY_F3, Key::KEY_F4, Key::KEY_F5, Key::KEY_F6,
    Key::KEY_F7, Key::KEY_F8, Key::KEY_F9, Key::KEY_F10, Key::KEY_F11, Key::KEY_F12,
    Key::KEY_F13, Key::KEY_F14, Key::KEY_F15, Key::KEY_F16, Key::KEY_F17, Key::KEY_F18,
    Key::KEY_F19, Key::KEY_F20, Key::KEY_F21, Key::KEY_F22, Key::KEY_F23, Key::KEY_F24,
];

const NAMED_KEYS: &[(&str, Key)] = &[
    ("space", Key::KEY_SPACE),
    ("enter", Key::KEY_ENTER),
    ("return", Key::KEY_ENTER),
    ("tab", Key::KEY_TAB),
    ("escape", Key::KEY_ESC),
    ("esc", Key::KEY_ESC),
    ("delete", Key::KEY_DELETE),
    ("del", Key::KEY_DELETE),
    ("backspace", Key::KEY_BACKSPACE),
    ("insert", Key::KEY_INSERT),
    ("left", Key::KEY_LEFT),
    ("right", Key::KEY_RIGHT),
    ("up", Key::KEY_UP),
    ("down", Key::KEY_DOWN),
    ("home", Key::KEY_HOME),
    ("end", Key::KEY_END),
    ("pageup", Key::KEY_PAGEUP),
    ("pagedown", Key::KEY_PAGEDOWN),
    ("plus", Key::KEY_EQUAL),
    ("equal", Key::KEY_EQUAL),
    ("minus", Key::KEY_MINUS),
    ("slash", Key::KEY_SLASH),
    ("backslash", Key::KEY_BACKSLASH),
    ("grave", Key::KEY_GRAVE),
    ("comma", Key::KEY_COMMA),
    ("period", Key::KEY_DOT),
    ("semicolon", Key::KEY_SEMICOLON),
    ("apostrophe", Key::KEY_APOSTROPHE),
    ("bracketleft", Key::KEY_LEFTBRACE),
    ("bracketright", Key::KEY_RIGHTBRACE),
    ("print", Key::KEY_SYSRQ),
];

/// Key for a single (lowercase) key name, including bare modifiers
fn key_from_name(name: &str) -> Option<Key> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return match c {
            'a'..='z' => Some(LETTERS[(c as u8 - b'a') as usize]),
            '0'..='9' => Some(DIGITS[(c as u8 - b'0') as usize]),
            '+' => Some(Key::KEY_EQUAL),
            '=' => Some(Key::KEY_EQUAL),
            '-' => Some(Key::KEY_MINUS),
            '/' => Some(Key::KEY_SLASH),
            '`' => Some(Key::KEY_GRAVE),
            ',' => Some(Key::KEY_COMMA),
            '.' => Some(Key::KEY_DOT),
            _ => None,
        };
    }

    if let Some(n) = name.strip_prefix('f').and_then(|n| n.parse::<usize>().ok()) {
        return (1..=24).contains(&n).then(|| FUNCTION_KEYS[n - 1]);
    }

    NAMED_KEYS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, k)| *k)
        .or_else(|| modifier_from_name(name))
}

/// Parse `Mod+Mod+Key`; names are case-insensitive
pub fn parse_shortcut(text: &str) -> Result<Shortcut, PlatformError> {
    let invalid = || PlatformError::InvalidShortcut(text.to_string());
    let parts: Vec<String> = text
        .split('+')
        .map(|p| p.trim().to_lowercase())
        .collect();

    let (last, mods) = parts.split_last().ok_or_else(invalid)?;
    if last.is_empty() {
        return Err(invalid());
    }

    let modifiers = mods
        .iter()
        .map(|m| modifier_from_name(m).ok_or_else(invalid))
        .collect::<Result<Vec<_>, _>>()?;
    let key = key_from_name(last).ok_or_else(invalid)?;

    Ok(Shortcut { modifiers, key })
}

pub fn media_key(command: MediaCommand) -> Key {
    match command {
        MediaCommand::PlayPause => Key::KEY_PLAYPAUSE,
        MediaCommand::Next => Key::KEY_NEXTSONG,
        MediaCommand::Previous => Key::KEY_PREVIOUSSONG,
        MediaCommand::Stop => Key::KEY_STOPCD,
        MediaCommand::VolumeUp => Key::KEY_VOLUMEUP,
        MediaCommand::VolumeDown => Key::KEY_VOLUMEDOWN,
        MediaCommand::Mute => Key::KEY_MUTE,
    }
}

/// Every key the virtual keyboard may emit
fn supported_keys() -> AttributeSet<Key> {
    let mut keys = AttributeSet::<Key>::new();
    for key in LETTERS.iter().chain(&DIGITS).chain(&FUNCTION_KEYS) {
        keys.insert(*key);
    }
    for (_, key) in NAMED_KEYS {
        keys.insert(*key);
    }
    for key in [
        Key::KEY_LEFTCTRL,
        Key::KEY_LEFTSHIFT,
        Key::KEY_LEFTALT,
        Key::KEY_RIGHTALT,
        Key::KEY_LEFTMETA,
        Key::KEY_PLAYPAUSE,
        Key::KEY_NEXTSONG,
        Key::KEY_PREVIOUSSONG,
        Key::KEY_STOPCD,
        Key::KEY_VOLUMEUP,
        Key::KEY_VOLUMEDOWN,
        Key::KEY_MUTE,
    ] {
        keys.insert(key);
    }
    keys
}

fn key_event(key: Key, value: i32) -> InputEvent {
    InputEvent::new(EventType::KEY, key.code(), value)
}

/// A uinput keyboard owned by this process
pub struct VirtualKeyboard {
    device: VirtualDevice,
}

impl VirtualKeyboard {
    pub fn create() -> Result<Self, PlatformError> {
        let device = VirtualDeviceBuilder::new()
            .and_then(|b| b.name("pie-menu virtual keyboard").with_keys(&supported_keys()))
            .and_then(|b| b.build())
            .map_err(PlatformError::Input)?;
        info!("Created virtual keyboard");
        thread::sleep(DEVICE_SETTLE);
        Ok(Self { device })
    }

    /// Press modifiers, tap the key, release modifiers in reverse
    pub fn tap(&mut self, shortcut: &Shortcut) -> Result<(), PlatformError> {
        debug!("Typing {:?}", shortcut);
        let mut down: Vec<InputEvent> = shortcut.modifiers.iter().map(|m| key_event(*m, 1)).collect();
        down.push(key_event(shortcut.key, 1));
        self.device.emit(&down).map_err(PlatformError::Input)?;

        thread::sleep(KEY_GAP);

        let mut up = vec![key_event(shortcut.key, 0)];
        up.extend(shortcut.modifiers.iter().rev().map(|m| key_event(*m, 0)));
        self.device.emit(&up).map_err(PlatformError::Input)
    }

    pub fn tap_key(&mut self, key: Key) -> Result<(), PlatformError> {
        self.tap(&Shortcut {
            modifiers: Vec::new(),
            key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shortcuts() {
        assert_eq!(
            parse_shortcut("Ctrl+Shift+T").unwrap(),
            Shortcut {
                modifiers: vec![Key::KEY_LEFTCTRL, Key::KEY_LEFTSHIFT],
                key: Key::KEY_T,
            }
        );
        assert_eq!(parse_shortcut("ctrl + grave").unwrap().key, Key::KEY_GRAVE);
        assert_eq!(parse_shortcut("Alt+Home").unwrap().key, Key::KEY_HOME);
        assert_eq!(parse_shortcut("F5").unwrap().modifiers, vec![]);
        assert_eq!(parse_shortcut("F24").unwrap().key, Key::KEY_F24);
        assert_eq!(parse_shortcut("Super+1").unwrap().key, Key::KEY_1);
        assert_eq!(parse_shortcut("Space").unwrap().key, Key::KEY_SPACE);
    }

    #[test]
    fn test_parse_rejects_unknown_keys() {
        for bad in ["", "Ctrl+", "Hyper+A", "Ctrl+Banana", "F25", "A+B"] {
            assert!(
                matches!(parse_shortcut(bad), Err(PlatformError::InvalidShortcut(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_bundled_preset_shortcuts_parse() {
        for preset in crate::presets::bundled().unwrap() {
            for action in &preset.actions {
                assert!(
                    parse_shortcut(&action.shortcut).is_ok(),
                    "{} / {}: {}",
                    preset.id,
                    action.name,
                    action.shortcut
                );
            }
        }
    }
}
