//! Pie Menu
//!
//! Runs the radial menu engine against the COSMIC desktop. Without flags it
//! starts an interactive shell: commands on stdin and evdev triggers drive
//! the menu, and a console surface prints what a graphical menu would show.
//!
//! Flags:
//! - `--list <mode>`: print the items a mode would show and exit
//! - `--query-running`: print visible windows and exit
//! - `--presets [query]`: list (or search) application presets
//! - `--import-presets <file>`: merge presets from a JSON file
//! - `--settings-describe`, `--settings-set <key> <json>`,
//!   `--settings-action <id>`: settings protocol
//! - `-v`/`-vv`: more logging, `--no-log-file`: log to stderr only

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use pie_menu::config::{Settings, SettingsSource, SettingsStore, StaticSettings};
use pie_menu::desktop::triggers::{self, TriggerConfig};
use pie_menu::desktop::{apps, DesktopIcons, LinuxActions, WaylandWindows};
use pie_menu::dispatch::ActionDispatcher;
use pie_menu::icon_cache::IconCache;
use pie_menu::items::ItemProvider;
use pie_menu::lifecycle::{CancelReason, CloseToken, Collaborators, SelectionState};
use pie_menu::logging::{self, LogConfig};
use pie_menu::model::{MenuItem, MenuMode};
use pie_menu::platform::{MenuSurface, SystemClock, WindowSystem};
use pie_menu::presets::Presets;
use pie_menu::{settings_cli, MenuController, MenuEvent};

/// Prints the menu to stdout in place of a graphical surface
struct ConsoleSurface {
    settings: Arc<dyn SettingsSource>,
    events: UnboundedSender<MenuEvent>,
    closing: Option<JoinHandle<()>>,
}

impl ConsoleSurface {
    fn new(settings: Arc<dyn SettingsSource>, events: UnboundedSender<MenuEvent>) -> Self {
        Self {
            settings,
            events,
            closing: None,
        }
    }
}

impl MenuSurface for ConsoleSurface {
    fn set_items(&mut self, items: &[MenuItem], mode: MenuMode) {
        let geometry = self.settings.current().menu_geometry();
        println!("[{}] {} item(s)", mode, items.len());
        for (i, item) in items.iter().enumerate() {
            let (x, y) = geometry.icon_offset(i, items.len());
            let at = format!("({:+.0}, {:+.0})", x, y);
            match item.shortcut_text() {
                Some(shortcut) if !shortcut.is_empty() => {
                    println!("  {:>2} {:>12}  {} ({})", i, at, item.name, shortcut)
                }
                _ => println!("  {:>2} {:>12}  {}", i, at, item.name),
            }
        }
    }

    fn animate_in(&mut self) {
        let size = self.settings.current().menu_geometry().surface_size();
        println!("menu open ({0:.0}x{0:.0})", size);
    }

    fn animate_out(&mut self, token: CloseToken) {
        println!("menu closing");
        let delay = self.settings.current().timing.close_animation();
        let events = self.events.clone();
        if let Some(previous) = self.closing.take() {
            previous.abort();
        }
        self.closing = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if events.send(MenuEvent::AnimationComplete(token)).is_err() {
                debug!("Controller gone, close animation dropped");
            }
        }));
    }

    fn cancel_close(&mut self) {
        if let Some(closing) = self.closing.take() {
            closing.abort();
        }
        println!("menu reopened");
    }

    fn set_selection(&mut self, selection: SelectionState, item: Option<&MenuItem>) {
        match (selection.current, item) {
            (Some(i), Some(item)) => println!("> {} {}", i, item.name),
            _ => println!("> (none)"),
        }
    }

    fn show_notice(&mut self, message: &str) {
        println!("! {}", message);
    }
}

/// A line typed into the shell
#[derive(Debug, Clone, PartialEq)]
enum ShellCommand {
    Show(MenuMode),
    Trigger,
    Move(f64, f64),
    Click(f64, f64),
    RightClick(f64, f64),
    Confirm,
    Escape,
    Deactivate,
    Cycle,
    Quit,
}

fn parse_command(line: &str) -> Result<ShellCommand, String> {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default();
    let rest: Vec<&str> = words.collect();

    let offset = |rest: &[&str]| -> Result<(f64, f64), String> {
        match rest {
            [dx, dy] => {
                let dx = dx.parse::<f64>().map_err(|e| format!("bad dx '{dx}': {e}"))?;
                let dy = dy.parse::<f64>().map_err(|e| format!("bad dy '{dy}': {e}"))?;
                Ok((dx, dy))
            }
            _ => Err(format!("usage: {command} <dx> <dy>")),
        }
    };

    match command {
        "show" => match rest.as_slice() {
            [mode] => mode.parse().map(ShellCommand::Show).map_err(|e| e.to_string()),
            _ => Err("usage: show <switcher|launcher|controller|music-remote>".to_string()),
        },
        "trigger" => Ok(ShellCommand::Trigger),
        "move" => offset(&rest).map(|(x, y)| ShellCommand::Move(x, y)),
        "click" => offset(&rest).map(|(x, y)| ShellCommand::Click(x, y)),
        "right-click" => offset(&rest).map(|(x, y)| ShellCommand::RightClick(x, y)),
        "confirm" => Ok(ShellCommand::Confirm),
        "escape" => Ok(ShellCommand::Escape),
        "deactivate" => Ok(ShellCommand::Deactivate),
        "cycle" => Ok(ShellCommand::Cycle),
        "quit" | "exit" => Ok(ShellCommand::Quit),
        other => Err(format!("unknown command '{other}'")),
    }
}

/// Run one command; false once the shell should exit
fn run_command(controller: &mut MenuController, command: ShellCommand) -> bool {
    match command {
        ShellCommand::Show(mode) => controller.show(mode),
        ShellCommand::Trigger => controller.on_trigger(),
        ShellCommand::Move(dx, dy) => controller.on_pointer_move(dx, dy),
        ShellCommand::Click(dx, dy) => controller.on_click(dx, dy),
        ShellCommand::RightClick(dx, dy) => controller.on_right_click(dx, dy),
        ShellCommand::Confirm => controller.on_confirm(),
        ShellCommand::Escape => controller.on_cancel(CancelReason::Escape),
        ShellCommand::Deactivate => controller.on_cancel(CancelReason::Deactivated),
        ShellCommand::Cycle => controller.cycle_mode(),
        ShellCommand::Quit => return false,
    }
    true
}

/// Item provider wired to the desktop backend
fn build_provider(
    settings: Arc<dyn SettingsSource>,
    windows: Arc<dyn WindowSystem>,
) -> Arc<ItemProvider> {
    let current = settings.current();
    let icons = Arc::new(DesktopIcons::new(current.geometry.icon_size.round() as u16));
    let cache = Arc::new(IconCache::new(current.icon_cache_capacity));
    Arc::new(ItemProvider::new(
        settings,
        Arc::new(Presets::load()),
        windows,
        icons,
        cache,
    ))
}

/// Fill an empty launcher with the dock's favorites
fn seed_launcher(store: &SettingsStore) {
    if !store.current().launcher_items.is_empty() {
        return;
    }
    let items = apps::favorites_as_launcher_items(&apps::read_dock_favorites());
    if items.is_empty() {
        return;
    }
    let count = items.len();
    match store.update(|s| s.launcher_items = items) {
        Ok(()) => info!("Seeded launcher with {} dock favorite(s)", count),
        Err(e) => warn!("Could not save seeded launcher: {}", e),
    }
}

async fn run_shell(settings_path: PathBuf) -> ExitCode {
    let store = Arc::new(SettingsStore::open(settings_path));
    seed_launcher(&store);
    let settings: Arc<dyn SettingsSource> = store.clone();

    let windows: Arc<dyn WindowSystem> = Arc::new(WaylandWindows::new());
    let provider = build_provider(settings.clone(), windows.clone());
    let dispatcher = ActionDispatcher::new(windows.clone(), Arc::new(LinuxActions::new()));

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let surface = ConsoleSurface::new(settings.clone(), event_tx.clone());
    let mut controller = MenuController::new(
        Collaborators {
            settings: settings.clone(),
            provider,
            dispatcher,
            windows,
            clock: Arc::new(SystemClock),
        },
        Box::new(surface),
        event_tx,
    );

    let (trigger_tx, mut trigger_rx) = mpsc::unbounded_channel();
    match TriggerConfig::from_settings(&settings.current()) {
        Ok(config) => match triggers::start_triggers(config, trigger_tx.clone()) {
            Ok(n) => info!("Listening for triggers on {} device(s)", n),
            Err(e) => warn!("Input triggers unavailable: {}", e),
        },
        Err(e) => warn!("Input triggers unavailable: {}", e),
    }

    println!("pie-menu shell. Commands: show <mode>, trigger, move dx dy, click dx dy,");
    println!("right-click dx dy, confirm, escape, deactivate, cycle, quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match parse_command(&line) {
                    Ok(command) => {
                        if !run_command(&mut controller, command) {
                            break;
                        }
                    }
                    Err(message) => println!("? {message}"),
                },
                Ok(None) => break,
                Err(e) => {
                    error!("Reading stdin failed: {}", e);
                    return ExitCode::FAILURE;
                }
            },
            Some(event) = event_rx.recv() => controller.handle_event(event),
            Some(source) = trigger_rx.recv() => {
                debug!("Trigger from {:?}", source);
                controller.on_trigger();
            }
        }
    }

    // Let a close in flight finish so deferred shortcuts are not lost
    let grace = settings.current().timing.close_animation() + Duration::from_millis(100);
    let _ = tokio::time::timeout(grace, async {
        while let Some(event) = event_rx.recv().await {
            controller.handle_event(event);
        }
    })
    .await;
    drop(trigger_tx);
    ExitCode::SUCCESS
}

fn list_items(settings_path: &Path, mode: &str) -> ExitCode {
    let mode: MenuMode = match mode.parse() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let settings: Arc<dyn SettingsSource> =
        Arc::new(StaticSettings::new(Settings::load_or_default(settings_path)));
    let windows: Arc<dyn WindowSystem> = Arc::new(WaylandWindows::new());
    let context = windows.capture_focus();
    let provider = build_provider(settings, windows);

    for item in provider.get_items(mode, &context) {
        match item.shortcut_text() {
            Some(shortcut) if !shortcut.is_empty() => {
                println!("{:?}\t{}\t{}", item.kind, item.name, shortcut)
            }
            _ => println!("{:?}\t{}", item.kind, item.name),
        }
    }
    ExitCode::SUCCESS
}

fn query_running(settings_path: &Path) -> ExitCode {
    let settings = Settings::load_or_default(settings_path);
    match WaylandWindows::new().enumerate_visible_windows(&settings.excluded_apps) {
        Ok(windows) => {
            for window in windows {
                println!("{}\t{}", window.process_name, window.title);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn list_presets(query: Option<&str>) -> ExitCode {
    let presets = Presets::load();
    let found = match query {
        Some(q) => presets.search(q),
        None => presets.all(),
    };
    for preset in found {
        println!(
            "{}\t{}\t[{}]\t{} action(s)",
            preset.id,
            preset.name,
            preset.process_names.join(", "),
            preset.actions.len()
        );
    }
    ExitCode::SUCCESS
}

fn import_presets(file: &Path) -> ExitCode {
    match Presets::load().import(file) {
        Ok(n) => {
            println!("Imported {n} preset(s)");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Value following `flag`, if both are present
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).map(String::as_str)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let verbosity = args
        .iter()
        .map(|a| match a.as_str() {
            "-v" => 1,
            "-vv" => 2,
            _ => 0,
        })
        .sum::<u8>();
    let log_file = if args.iter().any(|a| a == "--no-log-file") {
        None
    } else {
        logging::default_log_file()
    };
    if let Err(e) = logging::init_logging(&LogConfig::from_verbosity(verbosity).with_log_file(log_file)) {
        eprintln!("Failed to set up logging: {e}");
    }

    let settings_path = match Settings::default_path() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if args.iter().any(|a| a == "--settings-describe") {
        settings_cli::describe(&settings_path);
        return ExitCode::SUCCESS;
    }
    if let Some(pos) = args.iter().position(|a| a == "--settings-set") {
        return match (args.get(pos + 1), args.get(pos + 2)) {
            (Some(key), Some(value)) => {
                settings_cli::set(&settings_path, key, value);
                ExitCode::SUCCESS
            }
            _ => {
                eprintln!("usage: --settings-set <key> <json-value>");
                ExitCode::FAILURE
            }
        };
    }
    if let Some(id) = flag_value(&args, "--settings-action") {
        settings_cli::action(&settings_path, id);
        return ExitCode::SUCCESS;
    }
    if let Some(pos) = args.iter().position(|a| a == "--list") {
        let Some(mode) = args.get(pos + 1) else {
            eprintln!("usage: --list <mode>");
            return ExitCode::FAILURE;
        };
        return list_items(&settings_path, mode);
    }
    if args.iter().any(|a| a == "--query-running") {
        return query_running(&settings_path);
    }
    if args.iter().any(|a| a == "--presets") {
        let query = flag_value(&args, "--presets").filter(|q| !q.starts_with('-'));
        return list_presets(query);
    }
    if let Some(pos) = args.iter().position(|a| a == "--import-presets") {
        let Some(file) = args.get(pos + 1) else {
            eprintln!("usage: --import-presets <file>");
            return ExitCode::FAILURE;
        };
        return import_presets(Path::new(file));
    }

    info!("Pie menu starting");
    run_shell(settings_path).await
}
