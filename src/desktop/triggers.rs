//! Menu triggers read straight from input devices
//!
//! Watches evdev devices for the activation hotkey chord, a middle click, and
//! a quick four-finger tap on touchpads. Requires the user to be in the
//! 'input' group; without access the menu still works from the shell.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use evdev::{AbsoluteAxisType, Device, InputEvent, InputEventKind, Key};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use super::input::{parse_shortcut, Shortcut};
use crate::config::Settings;
use crate::error::TriggerError;

/// Maximum duration for a tap gesture (longer = swipe, not tap)
const TAP_MAX_DURATION: Duration = Duration::from_millis(250);

/// Maximum position change for a tap (in touchpad units)
const TAP_MAX_MOVEMENT: i32 = 500;

/// Which input produced a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    Hotkey,
    MiddleClick,
    TouchpadTap,
}

/// What to listen for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerConfig {
    pub hotkey: Option<Shortcut>,
    pub middle_click: bool,
    pub touchpad_tap: bool,
}

impl TriggerConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self, TriggerError> {
        let hotkey = match settings.activation_hotkey.trim() {
            "" => None,
            text => Some(
                parse_shortcut(text).map_err(|_| TriggerError::InvalidHotkey(text.to_string()))?,
            ),
        };
        Ok(Self {
            hotkey,
            middle_click: settings.middle_click_trigger,
            touchpad_tap: settings.touchpad_tap_trigger,
        })
    }

    fn is_empty(&self) -> bool {
        self.hotkey.is_none() && !self.middle_click && !self.touchpad_tap
    }
}

/// Collapse left/right variants so either side satisfies a chord
fn canonical_modifier(key: Key) -> Option<Key> {
    match key {
        Key::KEY_LEFTCTRL | Key::KEY_RIGHTCTRL => Some(Key::KEY_LEFTCTRL),
        Key::KEY_LEFTSHIFT | Key::KEY_RIGHTSHIFT => Some(Key::KEY_LEFTSHIFT),
        Key::KEY_LEFTALT => Some(Key::KEY_LEFTALT),
        Key::KEY_RIGHTALT => Some(Key::KEY_RIGHTALT),
        Key::KEY_LEFTMETA | Key::KEY_RIGHTMETA => Some(Key::KEY_LEFTMETA),
        _ => None,
    }
}

/// Tracks held modifiers and fires when the chord key goes down
#[derive(Debug)]
struct ChordState {
    chord: Shortcut,
    held: Vec<Key>,
}

impl ChordState {
    fn new(chord: Shortcut) -> Self {
        Self {
            chord,
            held: Vec::new(),
        }
    }

    /// `value` is 1 for press, 0 for release, 2 for autorepeat
    fn process(&mut self, key: Key, value: i32) -> bool {
        if let Some(modifier) = canonical_modifier(key) {
            match value {
                1 if !self.held.contains(&modifier) => self.held.push(modifier),
                0 => self.held.retain(|m| *m != modifier),
                _ => {}
            }
            // A bare modifier can itself be the chord key
            if key != self.chord.key {
                return false;
            }
        }

        if key != self.chord.key || value != 1 {
            return false;
        }
        let wanted = &self.chord.modifiers;
        let extra = self
            .held
            .iter()
            .filter(|m| Some(**m) != canonical_modifier(self.chord.key))
            .any(|m| !wanted.contains(m));
        !extra && wanted.iter().all(|m| self.held.contains(m))
    }
}

/// State machine for tracking four-finger gesture
#[derive(Debug, Clone, Copy, PartialEq)]
enum GestureState {
    Idle,
    FingersDown {
        start: Instant,
        start_x: Option<i32>,
        start_y: Option<i32>,
        max_movement: i32,
    },
}

impl GestureState {
    /// Feed one event; true when a quick, stationary tap just ended
    fn process(&mut self, kind: InputEventKind, value: i32, now: Instant) -> bool {
        match kind {
            InputEventKind::Key(Key::BTN_TOOL_QUADTAP) if value == 1 => {
                *self = GestureState::FingersDown {
                    start: now,
                    start_x: None,
                    start_y: None,
                    max_movement: 0,
                };
            }
            InputEventKind::Key(Key::BTN_TOOL_QUADTAP) if value == 0 => {
                if let GestureState::FingersDown { start, max_movement, .. } = *self {
                    *self = GestureState::Idle;
                    let duration = now.saturating_duration_since(start);
                    if duration <= TAP_MAX_DURATION && max_movement <= TAP_MAX_MOVEMENT {
                        return true;
                    }
                    debug!(
                        "Gesture ignored (duration: {:?}, movement: {}) - likely a swipe",
                        duration, max_movement
                    );
                }
            }
            InputEventKind::AbsAxis(axis) => {
                if let GestureState::FingersDown { start_x, start_y, max_movement, .. } = self {
                    let origin = match axis {
                        AbsoluteAxisType::ABS_MT_POSITION_X | AbsoluteAxisType::ABS_X => start_x,
                        AbsoluteAxisType::ABS_MT_POSITION_Y | AbsoluteAxisType::ABS_Y => start_y,
                        _ => return false,
                    };
                    match *origin {
                        Some(o) => *max_movement = (*max_movement).max((value - o).abs()),
                        None => *origin = Some(value),
                    }
                }
            }
            _ => {}
        }
        false
    }
}

/// What one device is watched for
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Roles {
    hotkey: bool,
    middle_click: bool,
    touchpad_tap: bool,
}

impl Roles {
    fn any(self) -> bool {
        self.hotkey || self.middle_click || self.touchpad_tap
    }
}

fn roles_for(device: &Device, config: &TriggerConfig) -> Roles {
    let Some(keys) = device.supported_keys() else {
        return Roles::default();
    };
    let has_abs_xy = device.supported_absolute_axes().is_some_and(|abs| {
        abs.contains(AbsoluteAxisType::ABS_X) || abs.contains(AbsoluteAxisType::ABS_MT_POSITION_X)
    });

    Roles {
        // KEY_ENTER filters out power buttons and other single-key devices
        hotkey: config
            .hotkey
            .as_ref()
            .is_some_and(|h| keys.contains(h.key) && keys.contains(Key::KEY_ENTER)),
        middle_click: config.middle_click
            && keys.contains(Key::BTN_MIDDLE)
            && device.supported_relative_axes().is_some(),
        touchpad_tap: config.touchpad_tap && keys.contains(Key::BTN_TOOL_QUADTAP) && has_abs_xy,
    }
}

fn event_device_paths() -> Vec<PathBuf> {
    let Ok(input_dir) = std::fs::read_dir("/dev/input") else {
        return Vec::new();
    };
    input_dir
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.to_string_lossy().contains("event"))
        .collect()
}

fn watch_device(mut device: Device, roles: Roles, config: TriggerConfig, tx: UnboundedSender<TriggerSource>) {
    let name = device.name().unwrap_or("Unknown").to_string();
    let mut chord = config.hotkey.filter(|_| roles.hotkey).map(ChordState::new);
    let mut gesture = GestureState::Idle;

    loop {
        let events: Vec<InputEvent> = match device.fetch_events() {
            Ok(events) => events.collect(),
            Err(e) if e.raw_os_error() == Some(libc::ENODEV) => {
                info!("Input device '{}' disconnected", name);
                return;
            }
            Err(e) => {
                warn!("Reading '{}' failed: {}", name, e);
                return;
            }
        };

        for event in events {
            let kind = event.kind();
            let fired = match kind {
                InputEventKind::Key(Key::BTN_MIDDLE) if roles.middle_click => {
                    (event.value() == 1).then_some(TriggerSource::MiddleClick)
                }
                InputEventKind::Key(key) if chord.is_some() && key != Key::BTN_TOOL_QUADTAP => chord
                    .as_mut()
                    .is_some_and(|c| c.process(key, event.value()))
                    .then_some(TriggerSource::Hotkey),
                _ if roles.touchpad_tap => gesture
                    .process(kind, event.value(), Instant::now())
                    .then_some(TriggerSource::TouchpadTap),
                _ => None,
            };

            if let Some(source) = fired {
                debug!("Trigger {:?} from '{}'", source, name);
                if tx.send(source).is_err() {
                    // Receiver gone, menu is shutting down
                    return;
                }
            }
        }
    }
}

/// Start one watcher thread per matching input device
///
/// Returns the number of devices watched. Fails when nothing matches, with
/// `PermissionDenied` if the devices exist but cannot be opened.
pub fn start_triggers(config: TriggerConfig, tx: UnboundedSender<TriggerSource>) -> Result<usize, TriggerError> {
    if config.is_empty() {
        return Ok(0);
    }

    let mut denied = None;
    let mut started = 0;
    for path in event_device_paths() {
        let device = match Device::open(&path) {
            Ok(d) => d,
            Err(e) => {
                if e.raw_os_error() == Some(libc::EACCES) {
                    denied.get_or_insert_with(|| path.display().to_string());
                }
                continue;
            }
        };

        let roles = roles_for(&device, &config);
        if !roles.any() {
            continue;
        }
        info!(
            "Watching {} ({}) for {:?}",
            device.name().unwrap_or("Unknown"),
            path.display(),
            roles
        );

        let config = config.clone();
        let tx = tx.clone();
        thread::Builder::new()
            .name("pie-trigger".to_string())
            .spawn(move || watch_device(device, roles, config, tx))
            .map_err(TriggerError::Thread)?;
        started += 1;
    }

    match (started, denied) {
        (0, Some(path)) => Err(TriggerError::PermissionDenied(path)),
        (0, None) => Err(TriggerError::NoDeviceFound),
        (n, _) => Ok(n),
    }
}
