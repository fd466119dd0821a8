//! Running windows
//!
//! Uses the zcosmic_toplevel_info_v1 Wayland protocol to list top-level
//! windows (title, app id, activated state) and zcosmic_toplevel_manager_v1
//! to activate one. Compositors without the COSMIC protocols can still be
//! listed through ext_foreign_toplevel_list_v1, without focus state.
//!
//! Each query opens a short-lived connection, so protocol object ids are not
//! stable between calls. `WindowRegistry` hands out our own handles keyed by
//! (app id, title) instead.

use std::collections::HashMap;

use cosmic_protocols::toplevel_info::v1::client::{
    zcosmic_toplevel_handle_v1::{self, ZcosmicToplevelHandleV1},
    zcosmic_toplevel_info_v1::{self, ZcosmicToplevelInfoV1},
};
use cosmic_protocols::toplevel_management::v1::client::zcosmic_toplevel_manager_v1::{
    self, ZcosmicToplevelManagerV1,
};
use parking_lot::Mutex;
use tracing::{debug, warn};
use wayland_client::{
    protocol::wl_registry::{self, WlRegistry},
    protocol::wl_seat::{self, WlSeat},
    Connection, Dispatch, EventQueue, Proxy, QueueHandle,
};
use wayland_protocols::ext::foreign_toplevel_list::v1::client::{
    ext_foreign_toplevel_handle_v1::{self, ExtForeignToplevelHandleV1},
    ext_foreign_toplevel_list_v1::{self, ExtForeignToplevelListV1},
};

use crate::error::PlatformError;
use crate::model::WindowHandle;

/// `activated` in the toplevel state array
const STATE_ACTIVATED: u32 = 2;

/// One top-level window as reported by the compositor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toplevel {
    pub app_id: String,
    pub title: String,
    pub activated: bool,
}

#[derive(Default)]
struct PendingToplevel {
    app_id: String,
    title: String,
    activated: bool,
    handle: Option<ZcosmicToplevelHandleV1>,
}

/// Wayland state for one query
#[derive(Default)]
struct ToplevelState {
    pending: HashMap<u32, PendingToplevel>,
    /// Protocol ids in the order their first `done` arrived
    order: Vec<u32>,
    info_bound: bool,
    manager: Option<ZcosmicToplevelManagerV1>,
    seat: Option<WlSeat>,
}

impl ToplevelState {
    fn toplevels(&self) -> Vec<Toplevel> {
        self.order
            .iter()
            .filter_map(|id| self.pending.get(id))
            .map(|p| Toplevel {
                app_id: p.app_id.clone(),
                title: p.title.clone(),
                activated: p.activated,
            })
            .collect()
    }

    fn find_handle(&self, app_id: &str, title: &str) -> Option<ZcosmicToplevelHandleV1> {
        let candidates = || {
            self.order
                .iter()
                .filter_map(|id| self.pending.get(id))
                .filter(|p| p.app_id.eq_ignore_ascii_case(app_id))
        };
        candidates()
            .find(|p| p.title == title)
            .or_else(|| candidates().next())
            .and_then(|p| p.handle.clone())
    }
}

impl Dispatch<WlRegistry, ()> for ToplevelState {
    fn event(
        state: &mut Self,
        registry: &WlRegistry,
        event: wl_registry::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        if let wl_registry::Event::Global { name, interface, version } = event {
            match interface.as_str() {
                "zcosmic_toplevel_info_v1" => {
                    registry.bind::<ZcosmicToplevelInfoV1, _, _>(name, version.min(1), qh, ());
                    state.info_bound = true;
                }
                "zcosmic_toplevel_manager_v1" => {
                    state.manager = Some(registry.bind::<ZcosmicToplevelManagerV1, _, _>(
                        name,
                        version.min(2),
                        qh,
                        (),
                    ));
                }
                "wl_seat" if state.seat.is_none() => {
                    state.seat = Some(registry.bind::<WlSeat, _, _>(name, version.min(1), qh, ()));
                }
                _ => {}
            }
        }
    }
}

impl Dispatch<ZcosmicToplevelInfoV1, ()> for ToplevelState {
    fn event(
        _state: &mut Self,
        _info: &ZcosmicToplevelInfoV1,
        _event: zcosmic_toplevel_info_v1::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }

    wayland_client::event_created_child!(ToplevelState, ZcosmicToplevelInfoV1, [
        zcosmic_toplevel_info_v1::EVT_TOPLEVEL_OPCODE => (ZcosmicToplevelHandleV1, ()),
    ]);
}

impl Dispatch<ZcosmicToplevelHandleV1, ()> for ToplevelState {
    fn event(
        state: &mut Self,
        handle: &ZcosmicToplevelHandleV1,
        event: zcosmic_toplevel_handle_v1::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let id = handle.id().protocol_id();
        let entry = state.pending.entry(id).or_default();

        match event {
            zcosmic_toplevel_handle_v1::Event::AppId { app_id } => entry.app_id = app_id,
            zcosmic_toplevel_handle_v1::Event::Title { title } => entry.title = title,
            zcosmic_toplevel_handle_v1::Event::State { state: raw } => {
                entry.activated = parse_states(&raw).contains(&STATE_ACTIVATED);
            }
            zcosmic_toplevel_handle_v1::Event::Done => {
                if entry.handle.is_none() {
                    entry.handle = Some(handle.clone());
                    state.order.push(id);
                }
            }
            zcosmic_toplevel_handle_v1::Event::Closed => {
                state.pending.remove(&id);
                state.order.retain(|o| *o != id);
            }
            _ => {}
        }
    }
}

impl Dispatch<ZcosmicToplevelManagerV1, ()> for ToplevelState {
    fn event(
        _state: &mut Self,
        _manager: &ZcosmicToplevelManagerV1,
        _event: zcosmic_toplevel_manager_v1::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<WlSeat, ()> for ToplevelState {
    fn event(
        _state: &mut Self,
        _seat: &WlSeat,
        _event: wl_seat::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

/// Decode the native-endian u32 array of a `state` event
fn parse_states(raw: &[u8]) -> Vec<u32> {
    raw.chunks_exact(4)
        .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Toplevels seen through ext_foreign_toplevel_list_v1
#[derive(Default)]
struct ForeignListState {
    pending: HashMap<u32, PendingToplevel>,
    order: Vec<u32>,
    list_bound: bool,
}

impl Dispatch<WlRegistry, ()> for ForeignListState {
    fn event(
        state: &mut Self,
        registry: &WlRegistry,
        event: wl_registry::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        if let wl_registry::Event::Global { name, interface, version } = event {
            if interface == "ext_foreign_toplevel_list_v1" {
                registry.bind::<ExtForeignToplevelListV1, _, _>(name, version.min(1), qh, ());
                state.list_bound = true;
            }
        }
    }
}

impl Dispatch<ExtForeignToplevelListV1, ()> for ForeignListState {
    fn event(
        _state: &mut Self,
        _list: &ExtForeignToplevelListV1,
        _event: ext_foreign_toplevel_list_v1::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }

    wayland_client::event_created_child!(ForeignListState, ExtForeignToplevelListV1, [
        ext_foreign_toplevel_list_v1::EVT_TOPLEVEL_OPCODE => (ExtForeignToplevelHandleV1, ()),
    ]);
}

impl Dispatch<ExtForeignToplevelHandleV1, ()> for ForeignListState {
    fn event(
        state: &mut Self,
        handle: &ExtForeignToplevelHandleV1,
        event: ext_foreign_toplevel_handle_v1::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let id = handle.id().protocol_id();
        let entry = state.pending.entry(id).or_default();

        match event {
            ext_foreign_toplevel_handle_v1::Event::AppId { app_id } => entry.app_id = app_id,
            ext_foreign_toplevel_handle_v1::Event::Title { title } => entry.title = title,
            ext_foreign_toplevel_handle_v1::Event::Done => {
                if !state.order.contains(&id) {
                    state.order.push(id);
                }
            }
            ext_foreign_toplevel_handle_v1::Event::Closed => {
                state.pending.remove(&id);
                state.order.retain(|o| *o != id);
            }
            _ => {}
        }
    }
}

/// List windows through the generic foreign toplevel protocol
fn list_foreign_toplevels() -> Result<Vec<Toplevel>, PlatformError> {
    let conn = Connection::connect_to_env()
        .map_err(|e| PlatformError::WindowSystem(format!("Wayland connection failed: {e}")))?;
    let mut event_queue = conn.new_event_queue();
    let qh = event_queue.handle();
    let mut state = ForeignListState::default();
    let _registry = conn.display().get_registry(&qh, ());

    for _ in 0..3 {
        event_queue
            .roundtrip(&mut state)
            .map_err(|e| PlatformError::WindowSystem(format!("roundtrip failed: {e}")))?;
    }
    if !state.list_bound {
        return Err(PlatformError::WindowSystem(
            "no toplevel listing protocol supported by this compositor".to_string(),
        ));
    }

    Ok(state
        .order
        .iter()
        .filter_map(|id| state.pending.get(id))
        .map(|p| Toplevel {
            app_id: p.app_id.clone(),
            title: p.title.clone(),
            activated: false,
        })
        .collect())
}

/// Connect, bind globals and collect every toplevel
fn query() -> Result<(EventQueue<ToplevelState>, ToplevelState), PlatformError> {
    let conn = Connection::connect_to_env()
        .map_err(|e| PlatformError::WindowSystem(format!("Wayland connection failed: {e}")))?;

    let display = conn.display();
    let mut event_queue = conn.new_event_queue();
    let qh = event_queue.handle();
    let mut state = ToplevelState::default();
    let _registry = display.get_registry(&qh, ());

    // Globals, then toplevels, then their done events
    for _ in 0..3 {
        event_queue
            .roundtrip(&mut state)
            .map_err(|e| PlatformError::WindowSystem(format!("roundtrip failed: {e}")))?;
    }

    if !state.info_bound {
        return Err(PlatformError::WindowSystem(
            "zcosmic_toplevel_info_v1 not supported by this compositor".to_string(),
        ));
    }
    Ok((event_queue, state))
}

/// All top-level windows, in compositor order
pub fn list_toplevels() -> Result<Vec<Toplevel>, PlatformError> {
    match query() {
        Ok((_queue, state)) => Ok(state.toplevels()),
        Err(e) => {
            debug!("COSMIC toplevel info unavailable ({}), trying foreign toplevel list", e);
            list_foreign_toplevels().map_err(|_| e)
        }
    }
}

/// Activate the window with this app id, preferring an exact title match
///
/// Returns `Ok(false)` when no such window exists.
pub fn activate(app_id: &str, title: &str) -> Result<bool, PlatformError> {
    let (mut queue, mut state) = query()?;

    let manager = state.manager.clone().ok_or_else(|| {
        PlatformError::WindowSystem("zcosmic_toplevel_manager_v1 not supported".to_string())
    })?;
    let seat = state
        .seat
        .clone()
        .ok_or_else(|| PlatformError::WindowSystem("no seat available".to_string()))?;

    let Some(handle) = state.find_handle(app_id, title) else {
        return Ok(false);
    };

    debug!("Activating {} '{}'", app_id, title);
    manager.activate(&handle, &seat);
    if let Err(e) = queue.roundtrip(&mut state) {
        warn!("Roundtrip after activation failed: {}", e);
    }
    Ok(true)
}

/// Stable handles for (app id, title) pairs
#[derive(Debug, Default)]
pub struct WindowRegistry {
    inner: Mutex<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    by_key: HashMap<(String, String), WindowHandle>,
    by_handle: HashMap<WindowHandle, (String, String)>,
    next: u64,
}

impl WindowRegistry {
    /// Handle for a window, allocating one the first time it is seen
    pub fn handle_for(&self, toplevel: &Toplevel) -> WindowHandle {
        let mut inner = self.inner.lock();
        let key = (toplevel.app_id.clone(), toplevel.title.clone());
        if let Some(handle) = inner.by_key.get(&key) {
            return *handle;
        }
        inner.next += 1;
        let handle = WindowHandle(inner.next);
        inner.by_key.insert(key.clone(), handle);
        inner.by_handle.insert(handle, key);
        handle
    }

    /// (app id, title) behind a handle
    pub fn resolve(&self, handle: WindowHandle) -> Option<(String, String)> {
        self.inner.lock().by_handle.get(&handle).cloned()
    }

    /// Forget windows that no longer exist
    pub fn retain_only(&self, alive: &[Toplevel]) {
        let mut inner = self.inner.lock();
        let alive: Vec<(String, String)> = alive
            .iter()
            .map(|t| (t.app_id.clone(), t.title.clone()))
            .collect();
        inner.by_key.retain(|key, _| alive.contains(key));
        let RegistryInner { by_key, by_handle, .. } = &mut *inner;
        by_handle.retain(|handle, _| by_key.values().any(|h| h == handle));
    }
}
