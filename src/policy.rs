//! The window management policy: placement, docking, and the workspace bindings.

use std::sync::{Arc, Mutex};

use crate::{
    commands::{CommandState, WindowManagerCommands},
    host::{
        DepthLayer, Edges, Point, Size, WindowId, WindowInfo, WindowManagerTools,
        WindowSpecification, WindowState, WindowType, is_application,
    },
    keys::{KeyAction, KeyboardEvent, Keysym, Modifiers},
    utils::with_mutex_lock,
    workspaces::{WorkspaceHooks, WorkspaceManager},
};

pub struct WindowManagerPolicy<T> {
    tools: T,
    workspaces: WorkspaceManager,
    state: Arc<CommandState>,
}

impl<T: WindowManagerTools> WindowManagerPolicy<T> {
    pub fn new(mut tools: T, state: Arc<CommandState>, hooks: Box<dyn WorkspaceHooks>) -> Self {
        let workspaces = WorkspaceManager::new(&mut tools, hooks);
        Self {
            tools,
            workspaces,
            state,
        }
    }

    pub fn tools(&self) -> &T {
        &self.tools
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    fn active_info(&self) -> Option<WindowInfo> {
        self.tools
            .active_window()
            .and_then(|window| self.tools.info_for(window))
    }

    fn apply(&mut self, window: WindowId, mut modifications: WindowSpecification, info: &WindowInfo) {
        if modifications.state.is_some() {
            self.tools.place_and_size_for_state(&mut modifications, info);
        }
        if !modifications.is_empty() {
            self.tools.modify_window(window, &modifications);
        }
    }

    /// Creates a window for a client request. Windows without a position open centred in
    /// the application zone.
    pub fn handle_new_window(&mut self, mut request: WindowSpecification) -> WindowId {
        let zone = self.tools.active_application_zone();
        let size = *request.size.get_or_insert(Size {
            width: zone.size.width / 2,
            height: zone.size.height / 2,
        });
        request.top_left.get_or_insert(Point {
            x: zone.top_left.x + (zone.size.width - size.width) / 2,
            y: zone.top_left.y + (zone.size.height - size.height) / 2,
        });
        request.state.get_or_insert(WindowState::Restored);

        let window = self.tools.create_window(request);
        if let Some(info) = self.tools.info_for(window) {
            log::debug!("New window {window:?} '{}'", info.name);
            if is_application(info.depth_layer) {
                self.state.advise_new_window_for();
            }
        }
        self.workspaces.advise_new_window(&mut self.tools, window);
        window
    }

    pub fn handle_window_closed(&mut self, window: WindowId) {
        let Some(info) = self.tools.info_for(window) else {
            return;
        };
        if is_application(info.depth_layer) {
            self.state.advise_delete_window_for();
        }
        self.workspaces.advise_delete_window(window);
        self.tools.destroy_window(window);
    }

    /// Applies a client's modification request. Windows on hidden workspaces keep their
    /// state and size until the workspace is shown again.
    pub fn handle_modify_window(&mut self, window: WindowId, modifications: &WindowSpecification) {
        let Some(info) = self.tools.info_for(window) else {
            return;
        };
        let mut modifications = modifications.clone();
        if self.workspaces.in_hidden_workspace(window) {
            modifications.state = None;
            modifications.size = None;
        }
        self.apply(window, modifications, &info);
    }

    pub fn handle_raise_window(&mut self, window: WindowId) {
        if self.workspaces.in_hidden_workspace(window) {
            self.workspaces
                .activate_workspace_containing(&mut self.tools, window);
        }
        self.tools.select_active_window(window);
    }

    /// Base keyboard handling. Returns whether the event was consumed.
    pub fn handle_keyboard_event(&mut self, event: &KeyboardEvent) -> bool {
        if !self.state.shell_keyboard_enabled() || event.action != KeyAction::Down {
            return false;
        }
        if event.modifiers == Modifiers::ALT && event.keysym == Keysym::TAB {
            self.focus_next_application();
            return true;
        }
        false
    }

    fn focus_next_application(&mut self) {
        let candidates: Vec<WindowId> = self
            .tools
            .windows_in_workspace(self.workspaces.active_workspace())
            .into_iter()
            .filter(|&window| {
                self.tools.info_for(window).is_some_and(|info| {
                    is_application(info.depth_layer) && info.state != WindowState::Hidden
                })
            })
            .collect();
        let current = self
            .tools
            .active_window()
            .and_then(|active| candidates.iter().position(|&it| it == active));
        let next = match current {
            Some(pos) => candidates.get((pos + 1) % candidates.len()),
            None => candidates.first(),
        };
        if let Some(&next) = next {
            self.tools.select_active_window(next);
        }
    }

    pub fn dock_active_window_left(&mut self) {
        self.dock_active_window_under_lock(Edges::LEFT);
    }

    pub fn dock_active_window_right(&mut self) {
        self.dock_active_window_under_lock(Edges::RIGHT);
    }

    /// Attaches the active window to `edges`. Repeating it cycles the width through half,
    /// a third and two thirds of the application zone.
    fn dock_active_window_under_lock(&mut self, edges: Edges) {
        let Some(info) = self.active_info() else {
            return;
        };
        if !matches!(info.window_type, WindowType::Normal | WindowType::Freestyle) {
            return;
        }

        let zone_width = self.tools.active_application_zone().size.width;
        let half = zone_width / 2;
        let width = if info.state != WindowState::Attached || info.attached_edges != edges {
            half
        } else if info.size.width == half {
            zone_width / 3
        } else if info.size.width < half {
            2 * zone_width / 3
        } else {
            half
        };

        let modifications = WindowSpecification {
            state: Some(WindowState::Attached),
            attached_edges: Some(edges),
            size: Some(Size {
                width,
                height: info.size.height,
            }),
            ..Default::default()
        };
        self.apply(info.window, modifications, &info);
    }

    pub fn toggle_maximized_restored(&mut self) {
        let Some(info) = self.active_info() else {
            return;
        };
        let modifications = if info.state == WindowState::Restored {
            WindowSpecification {
                state: Some(WindowState::Maximized),
                ..Default::default()
            }
        } else {
            WindowSpecification {
                state: Some(WindowState::Restored),
                top_left: Some(info.restore_rect.top_left),
                size: Some(info.restore_rect.size),
                ..Default::default()
            }
        };
        self.apply(info.window, modifications, &info);
    }

    pub fn toggle_always_on_top(&mut self) {
        let Some(info) = self.active_info() else {
            return;
        };
        let depth_layer = match info.depth_layer {
            DepthLayer::Application => DepthLayer::AlwaysOnTop,
            DepthLayer::AlwaysOnTop => DepthLayer::Application,
            _ => return,
        };
        let modifications = WindowSpecification {
            depth_layer: Some(depth_layer),
            ..Default::default()
        };
        self.apply(info.window, modifications, &info);
    }

    pub fn workspace_begin(&mut self, take_active: bool) {
        self.workspaces.workspace_begin(&mut self.tools, take_active);
    }

    pub fn workspace_end(&mut self, take_active: bool) {
        self.workspaces.workspace_end(&mut self.tools, take_active);
    }

    pub fn workspace_up(&mut self, take_active: bool) {
        self.workspaces.workspace_up(&mut self.tools, take_active);
    }

    pub fn workspace_down(&mut self, take_active: bool) {
        self.workspaces.workspace_down(&mut self.tools, take_active);
    }
}

/// Shared access to the policy. Every command runs under its lock.
pub struct PolicyHandle<T> {
    inner: Arc<Mutex<WindowManagerPolicy<T>>>,
}

impl<T> Clone for PolicyHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: WindowManagerTools> PolicyHandle<T> {
    pub fn new(policy: WindowManagerPolicy<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(policy)),
        }
    }

    pub fn invoke_under_lock<R>(&self, f: impl FnOnce(&mut WindowManagerPolicy<T>) -> R) -> R {
        with_mutex_lock(&self.inner, f)
    }
}

impl<T: WindowManagerTools + Send> WindowManagerCommands for PolicyHandle<T> {
    fn dock_active_window_left(&self) {
        self.invoke_under_lock(WindowManagerPolicy::dock_active_window_left);
    }
    fn dock_active_window_right(&self) {
        self.invoke_under_lock(WindowManagerPolicy::dock_active_window_right);
    }
    fn toggle_maximized_restored(&self) {
        self.invoke_under_lock(WindowManagerPolicy::toggle_maximized_restored);
    }
    fn toggle_always_on_top(&self) {
        self.invoke_under_lock(WindowManagerPolicy::toggle_always_on_top);
    }
    fn workspace_begin(&self, take_active: bool) {
        self.invoke_under_lock(|policy| policy.workspace_begin(take_active));
    }
    fn workspace_end(&self, take_active: bool) {
        self.invoke_under_lock(|policy| policy.workspace_end(take_active));
    }
    fn workspace_up(&self, take_active: bool) {
        self.invoke_under_lock(|policy| policy.workspace_up(take_active));
    }
    fn workspace_down(&self, take_active: bool) {
        self.invoke_under_lock(|policy| policy.workspace_down(take_active));
    }
}
