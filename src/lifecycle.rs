//! Menu lifecycle controller
//!
//! The state machine behind the menu: `Closed → Opening → Open → Closing →
//! Closed`. It receives raw triggers and pointer input, asks the item
//! provider for wedges, resolves the pointer to a selection, and dispatches
//! the chosen item.
//!
//! Two timers guard against the opening gesture acting twice:
//! - input (confirm, cancel) is ignored until `ignore_input_until`
//! - a repeated trigger closes the menu only from `toggle_close_after` on
//!
//! Work that finishes later (switcher enumeration, close animations, the
//! focus settle delay) comes back as a `MenuEvent` tagged with the generation
//! or close token it belongs to. Anything from a superseded operation is
//! dropped.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::config::{Settings, SettingsSource, TimingSettings};
use crate::dispatch::{ActionDispatcher, Dispatch};
use crate::items::ItemProvider;
use crate::model::{FocusContext, MenuItem, MenuMode, WindowHandle};
use crate::platform::{Clock, MenuSurface, WindowSystem};

/// Where the menu is in its open/close cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Closed,
    Opening,
    Open,
    Closing,
}

/// Identifies one close animation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CloseToken(u64);

/// Highlighted wedge and the one highlighted before it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub current: Option<usize>,
    pub previous: Option<usize>,
}

impl SelectionState {
    /// Move the highlight, returning whether it changed
    pub fn set(&mut self, index: Option<usize>) -> bool {
        if self.current == index {
            return false;
        }
        self.previous = self.current;
        self.current = index;
        true
    }
}

/// Deadlines computed when the menu opens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingWindow {
    pub ignore_input_until: Instant,
    pub toggle_close_after: Instant,
}

impl TimingWindow {
    pub fn starting_at(now: Instant, timing: &TimingSettings) -> Self {
        Self {
            ignore_input_until: now + timing.debounce(),
            toggle_close_after: now + timing.toggle_close(),
        }
    }

    pub fn accepts_input(&self, now: Instant) -> bool {
        now >= self.ignore_input_until
    }

    pub fn allows_toggle_close(&self, now: Instant) -> bool {
        now >= self.toggle_close_after
    }
}

/// Why the menu is being dismissed without a selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Escape,
    ClickOutside,
    Deactivated,
}

/// Completion of work started by the controller
#[derive(Debug)]
pub enum MenuEvent {
    ItemsReady {
        generation: u64,
        mode: MenuMode,
        items: Vec<MenuItem>,
    },
    AnimationComplete(CloseToken),
    FocusSettled {
        generation: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchOrigin {
    /// An explicit show request; restarts the timing window
    Show,
    /// Mode switch from inside the open menu
    Switch,
}

#[derive(Debug, Clone, Copy)]
struct Fetch {
    generation: u64,
    origin: FetchOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeferredStage {
    AwaitingClose,
    AwaitingFocus,
}

/// A shortcut waiting for the menu to close and focus to return
#[derive(Debug, Clone)]
struct DeferredShortcut {
    generation: u64,
    shortcut: String,
    window: Option<WindowHandle>,
    stage: DeferredStage,
}

/// The collaborators a controller drives
pub struct Collaborators {
    pub settings: Arc<dyn SettingsSource>,
    pub provider: Arc<ItemProvider>,
    pub dispatcher: ActionDispatcher,
    pub windows: Arc<dyn WindowSystem>,
    pub clock: Arc<dyn Clock>,
}

/// Owns the menu state and reacts to input
pub struct MenuController {
    settings: Arc<dyn SettingsSource>,
    provider: Arc<ItemProvider>,
    dispatcher: ActionDispatcher,
    windows: Arc<dyn WindowSystem>,
    clock: Arc<dyn Clock>,
    surface: Box<dyn MenuSurface>,
    events: UnboundedSender<MenuEvent>,

    state: LifecycleState,
    mode: MenuMode,
    generation: u64,
    close_serial: u64,
    close_token: Option<CloseToken>,
    fetch: Option<Fetch>,
    items: Vec<MenuItem>,
    selection: SelectionState,
    timing: Option<TimingWindow>,
    context: FocusContext,
    /// Settings read at the last show
    active: Arc<Settings>,
    deferred: Option<DeferredShortcut>,
    last_trigger: Option<Instant>,
}

impl MenuController {
    pub fn new(
        collaborators: Collaborators,
        surface: Box<dyn MenuSurface>,
        events: UnboundedSender<MenuEvent>,
    ) -> Self {
        let active = collaborators.settings.current();
        Self {
            settings: collaborators.settings,
            provider: collaborators.provider,
            dispatcher: collaborators.dispatcher,
            windows: collaborators.windows,
            clock: collaborators.clock,
            surface,
            events,
            state: LifecycleState::Closed,
            mode: active.default_mode,
            generation: 0,
            close_serial: 0,
            close_token: None,
            fetch: None,
            items: Vec::new(),
            selection: SelectionState::default(),
            timing: None,
            context: FocusContext::default(),
            active,
            deferred: None,
            last_trigger: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn mode(&self) -> MenuMode {
        self.mode
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    pub fn selection(&self) -> SelectionState {
        self.selection
    }

    pub fn timing(&self) -> Option<TimingWindow> {
        self.timing
    }

    pub fn context(&self) -> &FocusContext {
        &self.context
    }

    /// Route a completion event to its handler
    pub fn handle_event(&mut self, event: MenuEvent) {
        match event {
            MenuEvent::ItemsReady {
                generation,
                mode,
                items,
            } => self.on_items_ready(generation, mode, items),
            MenuEvent::AnimationComplete(token) => self.on_animation_complete(token),
            MenuEvent::FocusSettled { generation } => self.on_focus_settled(generation),
        }
    }

    /// Open the menu in `mode`, or switch an open menu to it
    pub fn show(&mut self, mode: MenuMode) {
        self.active = self.settings.current();
        match self.state {
            LifecycleState::Closed => {
                self.context = self.windows.capture_focus();
                debug!("Captured focus {:?}", self.context);
                self.generation += 1;
                self.mode = mode;
                self.state = LifecycleState::Opening;
                self.selection = SelectionState::default();
                self.timing = None;
                info!("Opening {} menu (generation {})", mode, self.generation);
            }
            LifecycleState::Opening => {
                self.generation += 1;
                self.mode = mode;
                debug!("Show during opening supersedes previous fetch");
            }
            LifecycleState::Open => {
                self.generation += 1;
                debug!("Show while open refreshes as {}", mode);
            }
            LifecycleState::Closing => {
                self.surface.cancel_close();
                self.close_token = None;
                if let Some(deferred) = &self.deferred {
                    if deferred.generation == self.generation && deferred.stage == DeferredStage::AwaitingClose {
                        debug!("Dropping '{}' from the cancelled close", deferred.shortcut);
                        self.deferred = None;
                    }
                }
                self.state = LifecycleState::Open;
                self.generation += 1;
                // The reopening gesture gets its own debounce, and the old
                // selection must not be confirmed by it
                self.timing = Some(TimingWindow::starting_at(self.clock.now(), &self.active.timing));
                self.selection = SelectionState::default();
                self.surface.set_selection(self.selection, None);
                info!("Close cancelled, reopening as {}", mode);
            }
        }
        self.fetch_items(mode, FetchOrigin::Show);
    }

    /// Activation hotkey, mouse chord or touchpad tap
    pub fn on_trigger(&mut self) {
        let now = self.clock.now();
        let repeat = self.settings.current().timing.trigger_repeat();
        if let Some(last) = self.last_trigger {
            if now.saturating_duration_since(last) < repeat {
                debug!("Trigger repeat ignored");
                return;
            }
        }

        match self.state {
            LifecycleState::Closed | LifecycleState::Closing => {
                self.last_trigger = Some(now);
                let mode = self.settings.current().default_mode;
                self.show(mode);
            }
            LifecycleState::Opening => debug!("Trigger ignored while opening"),
            LifecycleState::Open => {
                if self.timing.is_some_and(|t| t.allows_toggle_close(now)) {
                    self.last_trigger = Some(now);
                    info!("Toggle close");
                    self.close(None);
                } else if self.active.double_tap.enabled && self.active.double_tap.mode != self.mode {
                    self.last_trigger = Some(now);
                    let mode = self.active.double_tap.mode;
                    info!("Double tap, switching to {}", mode);
                    self.switch_mode(mode);
                } else {
                    debug!("Trigger ignored, menu opened too recently");
                }
            }
        }
    }

    /// Pointer moved to `(dx, dy)` from the menu center
    pub fn on_pointer_move(&mut self, dx: f64, dy: f64) {
        if self.state != LifecycleState::Open {
            return;
        }
        let index = self
            .active
            .menu_geometry()
            .wedge_at(dx, dy, self.items.len());
        if self.selection.set(index) {
            let item = index.and_then(|i| self.items.get(i));
            self.surface.set_selection(self.selection, item);
        }
    }

    /// Click, Enter or Space: run the highlighted item and close
    pub fn on_confirm(&mut self) {
        if self.state != LifecycleState::Open {
            debug!("Confirm ignored in {:?}", self.state);
            return;
        }
        if !self.accepts_input() {
            debug!("Confirm ignored during debounce");
            return;
        }
        let item = self
            .selection
            .current
            .and_then(|i| self.items.get(i))
            .cloned();
        match &item {
            Some(item) => info!("Selected '{}'", item.name),
            None => debug!("Confirm with nothing selected"),
        }
        self.close(item);
    }

    /// Escape, click outside the ring, or the menu lost activation
    pub fn on_cancel(&mut self, reason: CancelReason) {
        if self.state != LifecycleState::Open {
            return;
        }
        if !self.accepts_input() {
            debug!("{:?} ignored during debounce", reason);
            return;
        }
        info!("Menu cancelled: {:?}", reason);
        self.close(None);
    }

    /// Left click at `(dx, dy)` from the menu center
    pub fn on_click(&mut self, dx: f64, dy: f64) {
        if self.state != LifecycleState::Open {
            return;
        }
        if self.active.menu_geometry().is_outside_ring(dx, dy) {
            self.on_cancel(CancelReason::ClickOutside);
        } else {
            self.on_pointer_move(dx, dy);
            self.on_confirm();
        }
    }

    /// Right click at `(dx, dy)`; in the center it switches mode
    pub fn on_right_click(&mut self, dx: f64, dy: f64) {
        if self.state == LifecycleState::Open && self.active.menu_geometry().is_in_center(dx, dy) {
            self.cycle_mode();
        }
    }

    /// Switch an open menu to the next mode in the cycle
    pub fn cycle_mode(&mut self) {
        if self.state != LifecycleState::Open {
            return;
        }
        let next = self.active.mode_cycle.next(self.mode);
        info!("Cycling {} -> {}", self.mode, next);
        self.switch_mode(next);
    }

    /// Close callback from the surface
    pub fn on_animation_complete(&mut self, token: CloseToken) {
        if self.state != LifecycleState::Closing || self.close_token != Some(token) {
            debug!("Stale close callback {:?} ignored", token);
            return;
        }

        self.state = LifecycleState::Closed;
        self.close_token = None;
        self.items.clear();
        self.selection = SelectionState::default();
        let context = std::mem::take(&mut self.context);
        info!("Menu closed");

        let generation = self.generation;
        let Some(deferred) = self
            .deferred
            .as_mut()
            .filter(|d| d.generation == generation && d.stage == DeferredStage::AwaitingClose)
        else {
            return;
        };

        match deferred.window.or(context.window) {
            Some(window) => {
                if let Err(e) = self.dispatcher.restore_focus(window) {
                    warn!("Could not restore focus to {}: {}", window, e);
                }
                deferred.stage = DeferredStage::AwaitingFocus;
                self.wait_for_focus(generation);
            }
            None => {
                if let Some(deferred) = self.deferred.take() {
                    self.send_shortcut(&deferred.shortcut);
                }
            }
        }
    }

    fn on_focus_settled(&mut self, generation: u64) {
        let ready = self
            .deferred
            .as_ref()
            .is_some_and(|d| d.generation == generation && d.stage == DeferredStage::AwaitingFocus);
        if !ready {
            debug!("Stale focus settle for generation {}", generation);
            return;
        }
        if let Some(deferred) = self.deferred.take() {
            self.send_shortcut(&deferred.shortcut);
        }
    }

    fn on_items_ready(&mut self, generation: u64, mode: MenuMode, items: Vec<MenuItem>) {
        let Some(fetch) = self.fetch.filter(|f| f.generation == generation) else {
            debug!("Discarding stale items for generation {}", generation);
            return;
        };
        self.fetch = None;

        match self.state {
            LifecycleState::Opening if items.is_empty() => {
                info!("{} has no items, not opening", mode);
                self.state = LifecycleState::Closed;
                self.context = FocusContext::default();
            }
            LifecycleState::Opening => {
                self.state = LifecycleState::Open;
                self.mode = mode;
                self.items = items;
                self.selection = SelectionState::default();
                self.timing = Some(TimingWindow::starting_at(self.clock.now(), &self.active.timing));
                self.surface.set_items(&self.items, mode);
                self.surface.animate_in();
                info!("Menu open with {} items", self.items.len());
            }
            LifecycleState::Open if items.is_empty() => {
                info!("{} has no items, keeping {}", mode, self.mode);
            }
            LifecycleState::Open => {
                self.mode = mode;
                self.items = items;
                self.selection = SelectionState::default();
                if fetch.origin == FetchOrigin::Show {
                    self.timing = Some(TimingWindow::starting_at(self.clock.now(), &self.active.timing));
                }
                self.surface.set_items(&self.items, mode);
                self.surface.set_selection(self.selection, None);
                debug!("Switched to {} with {} items", mode, self.items.len());
            }
            LifecycleState::Closed | LifecycleState::Closing => {
                debug!("Items arrived after close, discarded");
            }
        }
    }

    fn switch_mode(&mut self, mode: MenuMode) {
        self.generation += 1;
        self.fetch_items(mode, FetchOrigin::Switch);
    }

    fn fetch_items(&mut self, mode: MenuMode, origin: FetchOrigin) {
        let generation = self.generation;
        self.fetch = Some(Fetch { generation, origin });

        if mode.fetches_in_background() {
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                let provider = self.provider.clone();
                let context = self.context.clone();
                let events = self.events.clone();
                runtime.spawn_blocking(move || {
                    let items = provider.get_items(mode, &context);
                    let ready = MenuEvent::ItemsReady {
                        generation,
                        mode,
                        items,
                    };
                    if events.send(ready).is_err() {
                        debug!("Controller gone, items dropped");
                    }
                });
                return;
            }
        }

        let items = self.provider.get_items(mode, &self.context);
        self.on_items_ready(generation, mode, items);
    }

    fn close(&mut self, item: Option<MenuItem>) {
        self.state = LifecycleState::Closing;
        self.fetch = None;
        self.timing = None;

        if let Some(old) = &self.deferred {
            if old.generation < self.generation {
                info!("Pending '{}' superseded", old.shortcut);
                self.deferred = None;
            }
        }

        if let Some(item) = item {
            match self.dispatcher.execute(&item) {
                Ok(Dispatch::Completed) => {}
                Ok(Dispatch::Deferred(shortcut)) => {
                    debug!("Deferring {} until the menu has closed", shortcut);
                    self.deferred = Some(DeferredShortcut {
                        generation: self.generation,
                        shortcut,
                        window: self.context.window,
                        stage: DeferredStage::AwaitingClose,
                    });
                }
                Err(e) => {
                    error!("Failed to run '{}': {}", item.name, e);
                    self.surface.show_notice(&format!("Could not open {}: {}", item.name, e));
                }
            }
        }

        self.close_serial += 1;
        let token = CloseToken(self.close_serial);
        self.close_token = Some(token);
        self.surface.animate_out(token);
    }

    fn wait_for_focus(&mut self, generation: u64) {
        let delay = self.active.timing.focus_settle();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let events = self.events.clone();
                runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if events.send(MenuEvent::FocusSettled { generation }).is_err() {
                        debug!("Controller gone, focus settle dropped");
                    }
                });
            }
            Err(_) => self.on_focus_settled(generation),
        }
    }

    fn send_shortcut(&mut self, shortcut: &str) {
        if let Err(e) = self.dispatcher.send_deferred(shortcut) {
            error!("Failed to send {}: {}", shortcut, e);
            self.surface.show_notice(&format!("Could not send {shortcut}: {e}"));
        }
    }

    /// Input is only accepted once an open menu's debounce has passed
    fn accepts_input(&self) -> bool {
        self.timing
            .is_some_and(|t| t.accepts_input(self.clock.now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ControllerAction, AppControllerConfig, LauncherItem, StaticSettings};
    use crate::icon_cache::IconCache;
    use crate::model::{ItemKind, WindowInfo};
    use crate::presets::Presets;
    use crate::testing::{window, FakeActions, FakeIcons, FakeWindows, ManualClock, Performed, RecordingSurface, SurfaceCall};
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    struct Harness {
        controller: MenuController,
        events: UnboundedReceiver<MenuEvent>,
        surface: RecordingSurface,
        clock: Arc<ManualClock>,
        windows: Arc<FakeWindows>,
        actions: Arc<FakeActions>,
    }

    impl Harness {
        fn new(settings: Settings, windows: Vec<WindowInfo>) -> Self {
            let settings: Arc<dyn SettingsSource> = Arc::new(StaticSettings::new(settings));
            let windows = Arc::new(FakeWindows::with_windows(windows));
            let actions = Arc::new(FakeActions::default());
            let clock = Arc::new(ManualClock::new());
            let provider = Arc::new(ItemProvider::new(
                settings.clone(),
                Arc::new(Presets::from_presets(Vec::new())),
                windows.clone(),
                Arc::new(FakeIcons::default()),
                Arc::new(IconCache::default()),
            ));
            let surface = RecordingSurface::default();
            let (tx, rx) = unbounded_channel();
            let controller = MenuController::new(
                Collaborators {
                    settings,
                    provider,
                    dispatcher: ActionDispatcher::new(windows.clone(), actions.clone()),
                    windows: windows.clone(),
                    clock: clock.clone(),
                },
                Box::new(surface.clone()),
                tx,
            );
            Self {
                controller,
                events: rx,
                surface,
                clock,
                windows,
                actions,
            }
        }

        fn launcher(count: usize) -> Self {
            let mut settings = Settings::default();
            settings.default_mode = MenuMode::Launcher;
            settings.launcher_items = (0..count)
                .map(|i| LauncherItem {
                    id: format!("app{i}"),
                    name: format!("App {i}"),
                    path: format!("/usr/bin/app{i}").into(),
                    kind: ItemKind::Application,
                    order: i as i32,
                    ..Default::default()
                })
                .collect();
            Self::new(settings, vec![window(10, "Editor", "gedit")])
        }

        fn finish_close(&mut self) {
            let token = self.surface.last_close_token().expect("close started");
            self.controller.on_animation_complete(token);
        }

        async fn pump(&mut self) {
            let event = self.events.recv().await.expect("event");
            self.controller.handle_event(event);
        }
    }

    #[test]
    fn test_timing_window_boundaries() {
        let now = Instant::now();
        let t = TimingWindow::starting_at(now, &TimingSettings::default());
        assert!(!t.accepts_input(now + std::time::Duration::from_millis(399)));
        assert!(t.accepts_input(now + std::time::Duration::from_millis(400)));
        assert!(!t.allows_toggle_close(now + std::time::Duration::from_millis(699)));
        assert!(t.allows_toggle_close(now + std::time::Duration::from_millis(700)));
    }

    #[test]
    fn test_selection_tracks_previous() {
        let mut s = SelectionState::default();
        assert!(s.set(Some(2)));
        assert!(!s.set(Some(2)));
        assert!(s.set(None));
        assert_eq!(s, SelectionState { current: None, previous: Some(2) });
    }

    #[test]
    fn test_open_sets_timing_and_animates() {
        let mut h = Harness::launcher(3);
        h.controller.show(MenuMode::Launcher);

        assert_eq!(h.controller.state(), LifecycleState::Open);
        let timing = h.controller.timing().unwrap();
        assert_eq!(timing.ignore_input_until, h.clock.now() + std::time::Duration::from_millis(400));
        assert_eq!(timing.toggle_close_after, h.clock.now() + std::time::Duration::from_millis(700));
        assert_eq!(
            h.surface.calls(),
            vec![
                SurfaceCall::SetItems(vec!["App 0".into(), "App 1".into(), "App 2".into()], MenuMode::Launcher),
                SurfaceCall::AnimateIn,
            ]
        );
        assert_eq!(h.controller.context().process_name.as_deref(), Some("gedit"));
    }

    #[test]
    fn test_empty_mode_never_opens() {
        let mut h = Harness::launcher(0);
        h.controller.show(MenuMode::Launcher);
        assert_eq!(h.controller.state(), LifecycleState::Closed);
        assert!(h.surface.calls().is_empty());
    }

    #[test]
    fn test_toggle_close_boundary() {
        let mut h = Harness::launcher(2);
        h.controller.on_trigger();
        assert_eq!(h.controller.state(), LifecycleState::Open);

        h.clock.advance_ms(699);
        h.controller.on_trigger();
        assert_eq!(h.controller.state(), LifecycleState::Open);

        h.clock.advance_ms(2);
        h.controller.on_trigger();
        assert_eq!(h.controller.state(), LifecycleState::Closing);
    }

    #[test]
    fn test_toggle_close_is_inclusive() {
        let mut h = Harness::launcher(2);
        h.controller.on_trigger();
        h.clock.advance_ms(700);
        h.controller.on_trigger();
        assert_eq!(h.controller.state(), LifecycleState::Closing);
    }

    #[test]
    fn test_trigger_repeat_is_debounced() {
        let mut h = Harness::launcher(2);
        h.controller.on_trigger();
        h.clock.advance_ms(800);
        h.controller.on_trigger();
        assert_eq!(h.controller.state(), LifecycleState::Closing);
        h.finish_close();

        // Within 500ms of the accepted close trigger
        h.clock.advance_ms(300);
        h.controller.on_trigger();
        assert_eq!(h.controller.state(), LifecycleState::Closed);

        h.clock.advance_ms(300);
        h.controller.on_trigger();
        assert_eq!(h.controller.state(), LifecycleState::Open);
    }

    #[test]
    fn test_double_tap_switches_mode() {
        let mut settings = Settings::default();
        settings.default_mode = MenuMode::MusicRemote;
        settings.double_tap.enabled = true;
        settings.double_tap.mode = MenuMode::Controller;
        let mut h = Harness::new(settings, vec![window(3, "Doc", "libreoffice")]);

        h.controller.on_trigger();
        assert_eq!(h.controller.mode(), MenuMode::MusicRemote);
        h.clock.advance_ms(600);
        h.controller.on_trigger();
        assert_eq!(h.controller.state(), LifecycleState::Open);
        assert_eq!(h.controller.mode(), MenuMode::Controller);
        assert_eq!(h.controller.items()[0].name, "Configure libreoffice");
    }

    #[test]
    fn test_show_twice_confirms_once() {
        let mut h = Harness::launcher(4);
        h.controller.show(MenuMode::Launcher);
        h.clock.advance_ms(100);
        h.controller.show(MenuMode::Launcher);
        h.controller.on_pointer_move(0.0, -180.0);

        // Release of the second gesture lands inside its debounce window
        h.clock.advance_ms(350);
        h.controller.on_confirm();
        assert_eq!(h.controller.state(), LifecycleState::Open);
        assert!(h.actions.performed().is_empty());

        h.clock.advance_ms(100);
        h.controller.on_confirm();
        h.controller.on_confirm();
        assert_eq!(h.actions.performed(), vec![Performed::Launch("/usr/bin/app0".into())]);
        assert_eq!(h.controller.state(), LifecycleState::Closing);
    }

    #[tokio::test]
    async fn test_switcher_scenario() {
        let windows = (1..=4)
            .map(|i| window(i, &format!("Window {i}"), &format!("app{i}")))
            .collect();
        let mut h = Harness::new(Settings::default(), windows);

        h.controller.show(MenuMode::Switcher);
        assert_eq!(h.controller.state(), LifecycleState::Opening);
        h.pump().await;
        assert_eq!(h.controller.state(), LifecycleState::Open);
        assert_eq!(h.controller.items().len(), 4);

        h.controller.on_pointer_move(0.0, -180.0);
        assert_eq!(h.controller.selection().current, Some(0));
        h.controller.on_pointer_move(0.0, 0.0);
        assert_eq!(h.controller.selection().current, None);

        h.clock.advance_ms(450);
        h.controller.on_confirm();
        assert_eq!(h.controller.state(), LifecycleState::Closing);
        h.finish_close();
        assert_eq!(h.controller.state(), LifecycleState::Closed);
        assert!(h.actions.performed().is_empty());
        assert!(h.windows.switched.lock().is_empty());
    }

    #[tokio::test]
    async fn test_stale_items_are_discarded() {
        let mut settings = Settings::default();
        settings.launcher_items = vec![LauncherItem {
            id: "a".into(),
            name: "Alpha".into(),
            path: "/usr/bin/alpha".into(),
            ..Default::default()
        }];
        let mut h = Harness::new(settings, vec![window(1, "One", "one")]);

        // Switcher fetch in flight, superseded by a launcher show
        h.controller.show(MenuMode::Switcher);
        h.controller.show(MenuMode::Launcher);
        assert_eq!(h.controller.state(), LifecycleState::Open);
        assert_eq!(h.controller.mode(), MenuMode::Launcher);

        h.pump().await;
        assert_eq!(h.controller.mode(), MenuMode::Launcher);
        assert_eq!(h.controller.items()[0].name, "Alpha");
    }

    #[test]
    fn test_stale_close_callback_after_reopen() {
        let mut h = Harness::launcher(2);
        h.controller.show(MenuMode::Launcher);
        h.clock.advance_ms(500);
        h.controller.on_cancel(CancelReason::Escape);
        let stale = h.surface.last_close_token().unwrap();

        h.controller.show(MenuMode::Launcher);
        assert_eq!(h.controller.state(), LifecycleState::Open);
        assert_eq!(h.surface.count(&SurfaceCall::CancelClose), 1);
        // Reopening from Closing does not replay the open animation
        assert_eq!(h.surface.count(&SurfaceCall::AnimateIn), 1);

        h.controller.on_animation_complete(stale);
        assert_eq!(h.controller.state(), LifecycleState::Open);
    }

    #[test]
    fn test_cancel_respects_debounce() {
        let mut h = Harness::launcher(2);
        h.controller.show(MenuMode::Launcher);
        h.controller.on_cancel(CancelReason::Deactivated);
        assert_eq!(h.controller.state(), LifecycleState::Open);
        h.clock.advance_ms(400);
        h.controller.on_cancel(CancelReason::Deactivated);
        assert_eq!(h.controller.state(), LifecycleState::Closing);
    }

    #[test]
    fn test_click_outside_ring_cancels() {
        let mut h = Harness::launcher(4);
        h.controller.show(MenuMode::Launcher);
        h.clock.advance_ms(450);
        h.controller.on_click(0.0, -20.0);
        assert_eq!(h.controller.state(), LifecycleState::Closing);
        assert!(h.actions.performed().is_empty());
    }

    #[test]
    fn test_click_on_wedge_confirms_it() {
        let mut h = Harness::launcher(4);
        h.controller.show(MenuMode::Launcher);
        h.clock.advance_ms(450);
        h.controller.on_click(180.0, 0.0);
        assert_eq!(h.actions.performed(), vec![Performed::Launch("/usr/bin/app1".into())]);
    }

    #[test]
    fn test_right_click_in_center_cycles_mode() {
        let mut settings = Settings::default();
        settings.default_mode = MenuMode::MusicRemote;
        settings.mode_cycle.set(MenuMode::MusicRemote, MenuMode::Controller);
        let mut h = Harness::new(settings, vec![window(3, "Doc", "writer")]);

        h.controller.show(MenuMode::MusicRemote);
        let timing = h.controller.timing();
        h.clock.advance_ms(50);
        h.controller.on_right_click(100.0, 0.0);
        assert_eq!(h.controller.mode(), MenuMode::MusicRemote);

        h.controller.on_right_click(5.0, 5.0);
        assert_eq!(h.controller.mode(), MenuMode::Controller);
        assert_eq!(h.controller.state(), LifecycleState::Open);
        // A mode switch keeps the open timing
        assert_eq!(h.controller.timing(), timing);
        assert_eq!(h.surface.count(&SurfaceCall::AnimateIn), 1);
    }

    #[test]
    fn test_cycle_to_empty_mode_keeps_items() {
        let mut settings = Settings::default();
        settings.default_mode = MenuMode::MusicRemote;
        let mut h = Harness::new(settings, Vec::new());
        h.windows.focus(None);

        h.controller.show(MenuMode::MusicRemote);
        h.controller.cycle_mode();
        // MusicRemote rotates to Switcher; no windows, so nothing changes
        assert_eq!(h.controller.mode(), MenuMode::MusicRemote);
        assert_eq!(h.controller.items().len(), 6);
    }

    #[test]
    fn test_configure_item_for_unknown_app() {
        let mut h = Harness::new(Settings::default(), vec![window(9, "Foo", "foo.exe")]);
        h.controller.show(MenuMode::Controller);
        assert_eq!(h.controller.items().len(), 1);
        assert_eq!(h.controller.items()[0].name, "Configure foo.exe");
    }

    #[tokio::test]
    async fn test_shortcut_sent_only_after_close() {
        let mut settings = Settings::default();
        settings.timing.focus_settle_ms = 0;
        settings.controller_configs = vec![AppControllerConfig {
            process_name: "gedit".into(),
            app_name: "Text Editor".into(),
            actions: vec![ControllerAction {
                id: "save".into(),
                name: "Save".into(),
                keyboard_shortcut: "Ctrl+S".into(),
                icon_path: None,
            }],
        }];
        let mut h = Harness::new(settings, vec![window(10, "notes.txt", "gedit")]);

        h.controller.show(MenuMode::Controller);
        h.controller.on_pointer_move(0.0, -150.0);
        h.clock.advance_ms(450);
        h.controller.on_confirm();
        assert_eq!(h.controller.state(), LifecycleState::Closing);
        assert!(h.actions.performed().is_empty());

        h.finish_close();
        assert_eq!(h.controller.state(), LifecycleState::Closed);
        assert_eq!(*h.windows.switched.lock(), vec![WindowHandle(10)]);
        assert!(h.actions.performed().is_empty());

        h.pump().await;
        assert_eq!(h.actions.performed(), vec![Performed::Shortcut("Ctrl+S".into())]);
    }

    #[test]
    fn test_shortcut_without_captured_window_sends_on_close() {
        let mut settings = Settings::default();
        settings.default_mode = MenuMode::Controller;
        settings.controller_configs = vec![AppControllerConfig {
            process_name: "gedit".into(),
            app_name: "Text Editor".into(),
            actions: vec![ControllerAction {
                name: "Undo".into(),
                keyboard_shortcut: "Ctrl+Z".into(),
                ..Default::default()
            }],
        }];
        let mut h = Harness::new(settings, vec![window(10, "notes.txt", "gedit")]);
        h.controller.show(MenuMode::Controller);
        // Focus capture found a process but no window handle
        h.controller.context.window = None;
        h.controller.on_pointer_move(0.0, -150.0);
        h.clock.advance_ms(450);
        h.controller.on_confirm();
        assert!(h.actions.performed().is_empty());

        h.finish_close();
        assert_eq!(h.actions.performed(), vec![Performed::Shortcut("Ctrl+Z".into())]);
        assert!(h.windows.switched.lock().is_empty());
    }

    #[test]
    fn test_reopen_during_close_drops_pending_shortcut() {
        let mut settings = Settings::default();
        settings.controller_configs = vec![AppControllerConfig {
            process_name: "gedit".into(),
            app_name: "Text Editor".into(),
            actions: vec![ControllerAction {
                name: "Save".into(),
                keyboard_shortcut: "Ctrl+S".into(),
                ..Default::default()
            }],
        }];
        let mut h = Harness::new(settings, vec![window(10, "notes.txt", "gedit")]);
        h.controller.show(MenuMode::Controller);
        h.controller.on_pointer_move(0.0, -150.0);
        h.clock.advance_ms(450);
        h.controller.on_confirm();
        let stale = h.surface.last_close_token().unwrap();

        h.controller.show(MenuMode::Controller);
        h.clock.advance_ms(450);
        h.controller.on_cancel(CancelReason::Escape);
        h.controller.on_animation_complete(stale);
        h.finish_close();

        assert_eq!(h.controller.state(), LifecycleState::Closed);
        assert!(h.actions.performed().is_empty());
    }

    #[tokio::test]
    async fn test_reopen_during_close_does_not_confirm_again() {
        let windows = (1..=4)
            .map(|i| window(i, &format!("Window {i}"), &format!("app{i}")))
            .collect();
        let mut h = Harness::new(Settings::default(), windows);

        h.controller.show(MenuMode::Switcher);
        h.pump().await;
        h.controller.on_pointer_move(0.0, -180.0);
        h.clock.advance_ms(450);
        h.controller.on_confirm();
        assert_eq!(*h.windows.switched.lock(), vec![WindowHandle(1)]);
        assert_eq!(h.controller.state(), LifecycleState::Closing);

        // Reopen before the close animation ends, items still being fetched
        h.clock.advance_ms(50);
        h.controller.show(MenuMode::Switcher);
        assert_eq!(h.controller.state(), LifecycleState::Open);
        assert_eq!(h.controller.selection().current, None);

        h.clock.advance_ms(10);
        h.controller.on_confirm();
        h.controller.on_trigger();
        assert_eq!(h.controller.state(), LifecycleState::Open);
        assert_eq!(*h.windows.switched.lock(), vec![WindowHandle(1)]);

        h.pump().await;
        h.clock.advance_ms(450);
        h.controller.on_confirm();
        assert_eq!(h.controller.state(), LifecycleState::Closing);
        assert_eq!(*h.windows.switched.lock(), vec![WindowHandle(1)]);
    }

    #[tokio::test]
    async fn test_newer_close_supersedes_shortcut_awaiting_focus() {
        let mut settings = Settings::default();
        settings.timing.focus_settle_ms = 30;
        settings.controller_configs = vec![AppControllerConfig {
            process_name: "gedit".into(),
            app_name: "Text Editor".into(),
            actions: vec![ControllerAction {
                name: "Save".into(),
                keyboard_shortcut: "Ctrl+S".into(),
                ..Default::default()
            }],
        }];
        let mut h = Harness::new(settings, vec![window(10, "notes.txt", "gedit")]);

        h.controller.show(MenuMode::Controller);
        h.controller.on_pointer_move(0.0, -150.0);
        h.clock.advance_ms(450);
        h.controller.on_confirm();
        h.finish_close();
        assert_eq!(h.controller.state(), LifecycleState::Closed);
        assert_eq!(*h.windows.switched.lock(), vec![WindowHandle(10)]);

        // A new menu opens and is dismissed while focus is still settling
        h.clock.advance_ms(600);
        h.controller.show(MenuMode::Controller);
        h.clock.advance_ms(450);
        h.controller.on_cancel(CancelReason::Escape);
        h.finish_close();

        h.pump().await;
        assert_eq!(h.controller.state(), LifecycleState::Closed);
        assert!(h.actions.performed().is_empty());
    }

    #[test]
    fn test_launch_failure_is_reported_and_still_closes() {
        let mut h = Harness::launcher(2);
        h.actions.fail_on("/usr/bin/app0");
        h.controller.show(MenuMode::Launcher);
        h.controller.on_pointer_move(0.0, -180.0);
        h.clock.advance_ms(450);
        h.controller.on_confirm();

        assert_eq!(h.controller.state(), LifecycleState::Closing);
        assert!(h
            .surface
            .calls()
            .iter()
            .any(|c| matches!(c, SurfaceCall::Notice(m) if m.contains("App 0"))));
        h.finish_close();
        assert_eq!(h.controller.state(), LifecycleState::Closed);
    }

    #[test]
    fn test_pointer_ignored_when_not_open() {
        let mut h = Harness::launcher(2);
        h.controller.on_pointer_move(0.0, -180.0);
        assert_eq!(h.controller.selection(), SelectionState::default());
        assert!(h.surface.calls().is_empty());
    }
}
