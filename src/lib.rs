//! Pie Menu
//!
//! A cursor-anchored radial menu with four modes: a window switcher, an
//! application launcher, per-application shortcut actions, and a music
//! remote.
//!
//! The engine (`lifecycle`, `items`, `dispatch`, `geometry`, `icon_cache`)
//! only talks to the desktop through the traits in `platform`; `desktop`
//! implements them for COSMIC on Wayland.

pub mod config;
pub mod desktop;
pub mod dispatch;
pub mod error;
pub mod geometry;
pub mod icon_cache;
pub mod items;
pub mod lifecycle;
pub mod logging;
pub mod model;
pub mod platform;
pub mod presets;
pub mod settings_cli;

#[cfg(test)]
mod testing;

pub use error::{ConfigError, PlatformError, TriggerError};
pub use lifecycle::{MenuController, MenuEvent};
pub use model::{MenuItem, MenuMode};
