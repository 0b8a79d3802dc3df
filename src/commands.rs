//! Keyboard shortcuts.
//!
//! Chords are looked up Ctrl+Alt first, then Meta, then Alt. Every chord has two tables:
//! the shell-privileged one is consulted first and launches tracked shell processes, the
//! plain one launches ordinary applications.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, OnceLock,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio_util::sync::CancellationToken;

use crate::{
    child_control::ChildControl,
    config::ConfigError,
    keys::{InputEvent, KeyAction, KeyboardEvent, Keysym, Modifiers},
    utils::{cmd_string, with_mutex_lock},
};

/// The window-management operations a shortcut can trigger.
pub trait WindowManagerCommands: Send + Sync {
    fn dock_active_window_left(&self);
    fn dock_active_window_right(&self);
    fn toggle_maximized_restored(&self);
    fn toggle_always_on_top(&self);
    fn workspace_begin(&self, take_active: bool);
    fn workspace_end(&self, take_active: bool);
    fn workspace_up(&self, take_active: bool);
    fn workspace_down(&self, take_active: bool);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WmAction {
    DockLeft,
    DockRight,
    ToggleMaximized,
    ToggleAlwaysOnTop,
    WorkspaceBegin,
    WorkspaceEnd,
    WorkspaceUp,
    WorkspaceDown,
    Exit,
}

const WM_ACTIONS: &[(&str, WmAction)] = &[
    ("dock-left", WmAction::DockLeft),
    ("dock-right", WmAction::DockRight),
    ("toggle-maximized", WmAction::ToggleMaximized),
    ("toggle-always-on-top", WmAction::ToggleAlwaysOnTop),
    ("workspace-begin", WmAction::WorkspaceBegin),
    ("workspace-end", WmAction::WorkspaceEnd),
    ("workspace-up", WmAction::WorkspaceUp),
    ("workspace-down", WmAction::WorkspaceDown),
    ("exit", WmAction::Exit),
];

impl WmAction {
    pub fn from_name(name: &str) -> Option<Self> {
        WM_ACTIONS
            .iter()
            .find(|(it, _)| *it == name)
            .map(|&(_, action)| action)
    }

    pub fn name(self) -> &'static str {
        WM_ACTIONS
            .iter()
            .find(|(_, it)| *it == self)
            .map_or("?", |&(name, _)| name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Wm(WmAction),
    Launch(Vec<String>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Privilege {
    Shell,
    App,
}

/// One chord's key bindings at one privilege level.
#[derive(Clone, Debug)]
pub struct CommandIndex {
    privilege: Privilege,
    commands: HashMap<Keysym, Action>,
}

impl CommandIndex {
    pub fn new(privilege: Privilege) -> Self {
        Self {
            privilege,
            commands: HashMap::new(),
        }
    }

    /// Builds an index from `<key>:<command>` and `<key>:@<action>` entries.
    pub fn parse(privilege: Privilege, entries: &[String]) -> Result<Self, ConfigError> {
        let mut this = Self::new(privilege);
        for entry in entries {
            this.populate(entry)?;
        }
        Ok(this)
    }

    pub fn populate(&mut self, entry: &str) -> Result<(), ConfigError> {
        let Some((key, command)) = entry
            .split_once(':')
            .filter(|(key, command)| !key.is_empty() && !command.is_empty())
        else {
            return Err(ConfigError::InvalidCommand(entry.to_owned()));
        };
        let keysym =
            Keysym::from_name(key).ok_or_else(|| ConfigError::UnrecognisedKey(key.to_owned()))?;

        if let Some(name) = command.strip_prefix('@') {
            match WmAction::from_name(name) {
                Some(action) => self.map_key_to(keysym, Action::Wm(action)),
                None => log::warn!("Ignoring unknown window management action '{name}' in '{entry}'"),
            }
            return Ok(());
        }

        let argv = shell_words::split(command)
            .ok()
            .filter(|argv| !argv.is_empty())
            .ok_or_else(|| ConfigError::InvalidCommand(entry.to_owned()))?;
        self.map_key_to(keysym, Action::Launch(argv));
        Ok(())
    }

    pub fn map_key_to(&mut self, keysym: Keysym, action: Action) {
        self.commands.insert(keysym.to_lower(), action);
    }

    pub fn action_for(&self, keysym: Keysym) -> Option<&Action> {
        self.commands.get(&keysym.to_lower())
    }

    pub fn privilege(&self) -> Privilege {
        self.privilege
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct ChordTable {
    pub shell: CommandIndex,
    pub app: CommandIndex,
}

impl Default for ChordTable {
    fn default() -> Self {
        Self {
            shell: CommandIndex::new(Privilege::Shell),
            app: CommandIndex::new(Privilege::App),
        }
    }
}

impl ChordTable {
    pub fn parse(shell: &[String], app: &[String]) -> Result<Self, ConfigError> {
        Ok(Self {
            shell: CommandIndex::parse(Privilege::Shell, shell)?,
            app: CommandIndex::parse(Privilege::App, app)?,
        })
    }

    fn lookup(&self, keysym: Keysym) -> Option<(&Action, Privilege)> {
        [&self.shell, &self.app]
            .into_iter()
            .find_map(|index| Some((index.action_for(keysym)?, index.privilege())))
    }
}

#[derive(Clone, Debug, Default)]
pub struct Bindings {
    pub ctrl_alt: ChordTable,
    pub meta: ChordTable,
    pub alt: ChordTable,
}

/// State shared between the router and the window policy.
#[derive(Debug)]
pub struct CommandState {
    shell_commands_active: AtomicBool,
    app_windows: Mutex<usize>,
}

impl Default for CommandState {
    fn default() -> Self {
        Self {
            shell_commands_active: AtomicBool::new(true),
            app_windows: Mutex::new(0),
        }
    }
}

impl CommandState {
    pub fn shell_keyboard_enabled(&self) -> bool {
        self.shell_commands_active.load(Ordering::Acquire)
    }

    /// Returns the new value.
    fn toggle_shell_keyboard(&self) -> bool {
        !self.shell_commands_active.fetch_xor(true, Ordering::AcqRel)
    }

    pub fn advise_new_window_for(&self) {
        with_mutex_lock(&self.app_windows, |count| *count += 1);
    }

    pub fn advise_delete_window_for(&self) {
        with_mutex_lock(&self.app_windows, |count| *count = count.saturating_sub(1));
    }

    pub fn app_windows(&self) -> usize {
        with_mutex_lock(&self.app_windows, |count| *count)
    }
}

pub struct ShellCommands {
    state: Arc<CommandState>,
    stop: CancellationToken,
    child_control: ChildControl,
    bindings: Bindings,
    wm: OnceLock<Arc<dyn WindowManagerCommands>>,
}

impl ShellCommands {
    pub fn new(
        state: Arc<CommandState>,
        stop: CancellationToken,
        child_control: ChildControl,
        bindings: Bindings,
    ) -> Self {
        Self {
            state,
            stop,
            child_control,
            bindings,
            wm: OnceLock::new(),
        }
    }

    pub fn init_window_manager(&self, wm: Arc<dyn WindowManagerCommands>) {
        if self.wm.set(wm).is_err() {
            log::warn!("Window manager was already set");
        }
    }

    pub fn state(&self) -> &Arc<CommandState> {
        &self.state
    }

    /// Returns whether the event was consumed.
    pub fn input_event(&self, event: &InputEvent) -> bool {
        match event {
            InputEvent::Keyboard(event) => self.keyboard_shortcuts(event),
            InputEvent::Touch | InputEvent::Pointer { .. } => false,
        }
    }

    fn keyboard_shortcuts(&self, event: &KeyboardEvent) -> bool {
        if event.action != KeyAction::Down {
            return false;
        }

        let mods = event.modifiers;
        if mods.contains(Modifiers::CTRL_ALT) && event.keysym == Keysym::DELETE {
            let enabled = self.state.toggle_shell_keyboard();
            log::info!(
                "Shell shortcuts {}",
                if enabled { "enabled" } else { "disabled" }
            );
            return true;
        }

        if !self.state.shell_keyboard_enabled() {
            return false;
        }

        let table = if mods.contains(Modifiers::CTRL_ALT) {
            &self.bindings.ctrl_alt
        } else if mods.contains(Modifiers::META) {
            &self.bindings.meta
        } else if mods.contains(Modifiers::ALT) {
            &self.bindings.alt
        } else {
            return false;
        };

        let Some((action, privilege)) = table.lookup(event.keysym) else {
            return false;
        };
        self.run(action, privilege, mods.contains(Modifiers::SHIFT));
        true
    }

    fn run(&self, action: &Action, privilege: Privilege, with_shift: bool) {
        let action = match action {
            Action::Launch(argv) => {
                log::debug!("Shortcut launches '{}'", cmd_string(argv));
                match privilege {
                    Privilege::Shell => self.child_control.run_shell(argv.clone()),
                    Privilege::App => self.child_control.run_app(argv.clone()),
                };
                return;
            }
            &Action::Wm(action) => action,
        };

        let with_wm = |call: fn(&dyn WindowManagerCommands, bool)| match self.wm.get() {
            Some(wm) => call(wm.as_ref(), with_shift),
            None => log::warn!("No window manager for '{}'", action.name()),
        };
        match action {
            WmAction::DockLeft => with_wm(|wm, _| wm.dock_active_window_left()),
            WmAction::DockRight => with_wm(|wm, _| wm.dock_active_window_right()),
            WmAction::ToggleMaximized => with_wm(|wm, _| wm.toggle_maximized_restored()),
            WmAction::ToggleAlwaysOnTop => with_wm(|wm, _| wm.toggle_always_on_top()),
            WmAction::WorkspaceBegin => with_wm(|wm, take| wm.workspace_begin(take)),
            WmAction::WorkspaceEnd => with_wm(|wm, take| wm.workspace_end(take)),
            WmAction::WorkspaceUp => with_wm(|wm, take| wm.workspace_up(take)),
            WmAction::WorkspaceDown => with_wm(|wm, take| wm.workspace_down(take)),
            WmAction::Exit => self.exit(with_shift),
        }
    }

    /// Stops the session unless application windows are open. Shift forces it.
    fn exit(&self, with_shift: bool) {
        let app_windows = self.state.app_windows();
        if app_windows > 0 && !with_shift {
            log::info!("Not exiting with {app_windows} application window(s) open");
            return;
        }
        log::info!("Exit requested");
        self.stop.cancel();
    }
}
