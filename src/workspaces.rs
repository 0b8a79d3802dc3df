//! Virtual workspaces.
//!
//! Workspaces form an ordered sequence with exactly one active member. Application windows
//! outside the active workspace are hidden, and a workspace that has lost its last
//! application window is destroyed as soon as it is no longer active.

use std::collections::HashMap;

use crate::host::{
    WindowId, WindowManagerTools, WindowSpecification, WindowState, WorkspaceId, is_application,
};

/// Notifications about the workspace sequence, e.g. for a pager.
pub trait WorkspaceHooks: Send {
    fn on_workspace_create(&mut self, _workspace: WorkspaceId) {}
    fn on_workspace_activate(&mut self, _workspace: WorkspaceId) {}
    fn on_workspace_deactivate(&mut self, _workspace: WorkspaceId) {}
    fn on_workspace_destroy(&mut self, _workspace: WorkspaceId) {}
}

#[derive(Debug, Default)]
pub struct LogHooks;
impl WorkspaceHooks for LogHooks {
    fn on_workspace_create(&mut self, workspace: WorkspaceId) {
        log::debug!("Created workspace {workspace:?}");
    }
    fn on_workspace_activate(&mut self, workspace: WorkspaceId) {
        log::debug!("Activated workspace {workspace:?}");
    }
    fn on_workspace_deactivate(&mut self, workspace: WorkspaceId) {
        log::trace!("Deactivated workspace {workspace:?}");
    }
    fn on_workspace_destroy(&mut self, workspace: WorkspaceId) {
        log::debug!("Destroyed workspace {workspace:?}");
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkspaceInfo {
    pub in_hidden_workspace: bool,
    /// The state to restore when the window becomes visible again.
    pub old_state: WindowState,
}

pub struct WorkspaceManager {
    hooks: Box<dyn WorkspaceHooks>,
    workspaces: Vec<WorkspaceId>,
    active: WorkspaceId,
    workspace_to_active: HashMap<WorkspaceId, WindowId>,
    window_info: HashMap<WindowId, WorkspaceInfo>,
}

impl std::fmt::Debug for WorkspaceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceManager")
            .field("workspaces", &self.workspaces)
            .field("active", &self.active)
            .field("workspace_to_active", &self.workspace_to_active)
            .finish_non_exhaustive()
    }
}

impl WorkspaceManager {
    pub fn new<T: WindowManagerTools + ?Sized>(
        tools: &mut T,
        hooks: Box<dyn WorkspaceHooks>,
    ) -> Self {
        let first = tools.create_workspace();
        let mut this = Self {
            hooks,
            workspaces: vec![first],
            active: first,
            workspace_to_active: HashMap::new(),
            window_info: HashMap::new(),
        };
        this.hooks.on_workspace_create(first);
        this.hooks.on_workspace_activate(first);
        this
    }

    pub fn active_workspace(&self) -> WorkspaceId {
        self.active
    }

    pub fn workspaces(&self) -> &[WorkspaceId] {
        &self.workspaces
    }

    pub fn in_hidden_workspace(&self, window: WindowId) -> bool {
        self.window_info
            .get(&window)
            .is_some_and(|info| info.in_hidden_workspace)
    }

    pub fn workspace_info(&self, window: WindowId) -> Option<WorkspaceInfo> {
        self.window_info.get(&window).copied()
    }

    pub fn last_focused(&self, workspace: WorkspaceId) -> Option<WindowId> {
        self.workspace_to_active.get(&workspace).copied()
    }

    fn append_new_workspace<T: WindowManagerTools + ?Sized>(&mut self, tools: &mut T) {
        let workspace = tools.create_workspace();
        self.workspaces.push(workspace);
        self.active = workspace;
        self.hooks.on_workspace_create(workspace);
    }

    fn carried_window<T: WindowManagerTools + ?Sized>(
        tools: &T,
        take_active: bool,
    ) -> Option<WindowId> {
        take_active.then(|| tools.active_window()).flatten()
    }

    /// Switches from the active workspace to `new` and destroys the old one if it is empty.
    fn switch_to<T: WindowManagerTools + ?Sized>(
        &mut self,
        tools: &mut T,
        new: WorkspaceId,
        window: Option<WindowId>,
    ) {
        let old = self.active;
        self.active = new;
        self.change_active_workspace(tools, new, old, window);
        self.erase_if_empty(tools, old);
    }

    pub fn workspace_begin<T: WindowManagerTools + ?Sized>(
        &mut self,
        tools: &mut T,
        take_active: bool,
    ) {
        let Some(&first) = self.workspaces.first() else {
            return;
        };
        if first == self.active {
            return;
        }
        let window = Self::carried_window(&*tools, take_active);
        self.switch_to(tools, first, window);
    }

    pub fn workspace_end<T: WindowManagerTools + ?Sized>(
        &mut self,
        tools: &mut T,
        take_active: bool,
    ) {
        let old = self.active;
        let window = Self::carried_window(&*tools, take_active);
        self.append_new_workspace(tools);
        let new = self.active;
        self.change_active_workspace(tools, new, old, window);
        self.erase_if_empty(tools, old);
    }

    pub fn workspace_up<T: WindowManagerTools + ?Sized>(
        &mut self,
        tools: &mut T,
        take_active: bool,
    ) {
        let Some(pos) = self.active_position() else {
            return;
        };
        if pos == 0 {
            return;
        }
        let new = self.workspaces[pos - 1];
        let window = Self::carried_window(&*tools, take_active);
        self.switch_to(tools, new, window);
    }

    pub fn workspace_down<T: WindowManagerTools + ?Sized>(
        &mut self,
        tools: &mut T,
        take_active: bool,
    ) {
        let Some(pos) = self.active_position() else {
            return;
        };
        match self.workspaces.get(pos + 1).copied() {
            Some(new) => {
                let window = Self::carried_window(&*tools, take_active);
                self.switch_to(tools, new, window);
            }
            None => self.workspace_end(tools, take_active),
        }
    }

    fn active_position(&self) -> Option<usize> {
        let pos = self.workspaces.iter().position(|&it| it == self.active);
        if pos.is_none() {
            log::error!("Active workspace {:?} is not in the sequence", self.active);
        }
        pos
    }

    /// Activation requested from outside, e.g. by a pager.
    pub fn activate_workspace<T: WindowManagerTools + ?Sized>(
        &mut self,
        tools: &mut T,
        workspace: WorkspaceId,
    ) {
        if !self.workspaces.contains(&workspace) {
            log::warn!("Ignoring activation of unknown workspace {workspace:?}");
            return;
        }
        if workspace == self.active {
            return;
        }
        self.switch_to(tools, workspace, None);
    }

    pub fn activate_workspace_containing<T: WindowManagerTools + ?Sized>(
        &mut self,
        tools: &mut T,
        window: WindowId,
    ) {
        let containing = tools.workspaces_containing(window);
        if containing.contains(&self.active) {
            return;
        }
        if let Some(&workspace) = containing.iter().find(|it| self.workspaces.contains(it)) {
            self.switch_to(tools, workspace, None);
        }
    }

    /// Moves focus and visibility from `old` to `new`, carrying `window` along if given.
    ///
    /// The caller has already made `new` the active workspace.
    pub fn change_active_workspace<T: WindowManagerTools + ?Sized>(
        &mut self,
        tools: &mut T,
        new: WorkspaceId,
        old: WorkspaceId,
        window: Option<WindowId>,
    ) {
        if new == old {
            return;
        }
        self.hooks.on_workspace_deactivate(old);
        self.hooks.on_workspace_activate(new);

        let old_active = tools.active_window().and_then(|it| tools.info_for(it));
        let old_active_is_shell = old_active
            .as_ref()
            .is_some_and(|info| !is_application(info.depth_layer));

        // Show the remembered window first so that it is the one that picks up focus.
        if (old_active.is_none() || old_active_is_shell)
            && let Some(&remembered) = self.workspace_to_active.get(&new)
        {
            if tools.workspaces_containing(remembered).contains(&new) {
                self.apply_workspace_visible_to(tools, remembered);
            }
            if old_active_is_shell {
                tools.select_active_window(remembered);
            }
        }

        if let Some(window) = window {
            tools.remove_tree_from_workspace(window, old);
            let added = tools.add_tree_to_workspace(window, new);
            self.advise_adding_to_workspace(tools, new, &added);
        }

        for window in tools.windows_in_workspace(new) {
            if Self::is_application_window(&*tools, window) {
                self.apply_workspace_visible_to(tools, window);
            }
        }

        let old_active_window = old_active.map(|info| info.window);
        let mut hide_old_active = false;
        for window in tools.windows_in_workspace(old) {
            if !Self::is_application_window(&*tools, window) {
                continue;
            }
            if Some(window) == old_active_window {
                hide_old_active = true;
            } else {
                self.apply_workspace_hidden_to(tools, window);
            }
        }

        // Hidden last so the host hands focus to a window that is already visible.
        if hide_old_active && let Some(window) = old_active_window {
            self.apply_workspace_hidden_to(tools, window);
            self.workspace_to_active.insert(old, window);
        }
    }

    fn is_application_window<T: WindowManagerTools + ?Sized>(tools: &T, window: WindowId) -> bool {
        tools
            .info_for(window)
            .is_some_and(|info| is_application(info.depth_layer))
    }

    pub fn apply_workspace_hidden_to<T: WindowManagerTools + ?Sized>(
        &mut self,
        tools: &mut T,
        window: WindowId,
    ) {
        let Some(info) = tools.info_for(window) else {
            return;
        };
        let record = self.window_info.entry(window).or_default();
        if record.in_hidden_workspace {
            return;
        }
        record.in_hidden_workspace = true;
        record.old_state = info.state;

        let mut modifications = WindowSpecification {
            state: Some(WindowState::Hidden),
            ..Default::default()
        };
        tools.place_and_size_for_state(&mut modifications, &info);
        tools.modify_window(window, &modifications);
    }

    pub fn apply_workspace_visible_to<T: WindowManagerTools + ?Sized>(
        &mut self,
        tools: &mut T,
        window: WindowId,
    ) {
        let Some(info) = tools.info_for(window) else {
            return;
        };
        let record = self.window_info.entry(window).or_default();
        if !record.in_hidden_workspace {
            return;
        }
        record.in_hidden_workspace = false;

        let mut modifications = WindowSpecification {
            state: Some(record.old_state),
            ..Default::default()
        };
        tools.place_and_size_for_state(&mut modifications, &info);
        tools.modify_window(window, &modifications);
    }

    pub fn advise_adding_to_workspace<T: WindowManagerTools + ?Sized>(
        &mut self,
        tools: &mut T,
        workspace: WorkspaceId,
        windows: &[WindowId],
    ) {
        for &window in windows {
            if workspace == self.active {
                self.apply_workspace_visible_to(tools, window);
            } else {
                self.apply_workspace_hidden_to(tools, window);
            }
        }
    }

    /// Destroys `workspace` if no application window is left in it. The active workspace is
    /// never destroyed.
    pub fn erase_if_empty<T: WindowManagerTools + ?Sized>(
        &mut self,
        tools: &mut T,
        workspace: WorkspaceId,
    ) {
        if workspace == self.active {
            return;
        }
        let occupied = tools
            .windows_in_workspace(workspace)
            .into_iter()
            .any(|window| Self::is_application_window(&*tools, window));
        if occupied {
            return;
        }

        let before = self.workspaces.len();
        self.workspaces.retain(|&it| it != workspace);
        self.workspace_to_active.remove(&workspace);
        if self.workspaces.len() == before {
            return;
        }
        tools.destroy_workspace(workspace);
        self.hooks.on_workspace_destroy(workspace);
    }

    pub fn advise_new_window<T: WindowManagerTools + ?Sized>(
        &mut self,
        tools: &mut T,
        window: WindowId,
    ) {
        self.window_info.insert(window, WorkspaceInfo::default());
        let Some(info) = tools.info_for(window) else {
            return;
        };

        match info.parent {
            Some(parent) => {
                if self.in_hidden_workspace(parent) {
                    self.apply_workspace_hidden_to(tools, window);
                }
            }
            None => {
                let workspace = self.active;
                let added = tools.add_tree_to_workspace(window, workspace);
                self.advise_adding_to_workspace(tools, workspace, &added);
            }
        }
    }

    pub fn advise_delete_window(&mut self, window: WindowId) {
        self.window_info.remove(&window);
        self.workspace_to_active.retain(|_, it| *it != window);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{
        desktop::Desktop,
        host::{DepthLayer, WindowInfo},
    };

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<(&'static str, WorkspaceId)>>>);
    impl WorkspaceHooks for Recorder {
        fn on_workspace_create(&mut self, workspace: WorkspaceId) {
            self.0.lock().unwrap().push(("create", workspace));
        }
        fn on_workspace_activate(&mut self, workspace: WorkspaceId) {
            self.0.lock().unwrap().push(("activate", workspace));
        }
        fn on_workspace_deactivate(&mut self, workspace: WorkspaceId) {
            self.0.lock().unwrap().push(("deactivate", workspace));
        }
        fn on_workspace_destroy(&mut self, workspace: WorkspaceId) {
            self.0.lock().unwrap().push(("destroy", workspace));
        }
    }

    fn setup() -> (Desktop, WorkspaceManager) {
        let mut desktop = Desktop::default();
        let manager = WorkspaceManager::new(&mut desktop, Box::new(LogHooks));
        (desktop, manager)
    }

    fn open(desktop: &mut Desktop, manager: &mut WorkspaceManager, layer: DepthLayer) -> WindowId {
        let window = desktop.create_window(WindowSpecification {
            depth_layer: Some(layer),
            state: Some(WindowState::Restored),
            ..Default::default()
        });
        manager.advise_new_window(desktop, window);
        window
    }

    fn app(desktop: &mut Desktop, manager: &mut WorkspaceManager) -> WindowId {
        open(desktop, manager, DepthLayer::Application)
    }

    fn info(desktop: &Desktop, window: WindowId) -> WindowInfo {
        desktop.info_for(window).unwrap()
    }

    fn assert_consistent(desktop: &Desktop, manager: &WorkspaceManager) {
        assert!(!manager.workspaces().is_empty());
        assert!(manager.workspaces().contains(&manager.active_workspace()));
        assert_eq!(desktop.workspace_count(), manager.workspaces().len());
        for &workspace in manager.workspaces() {
            for window in desktop.windows_in_workspace(workspace) {
                if !is_application(info(desktop, window).depth_layer) {
                    continue;
                }
                let hidden = workspace != manager.active_workspace();
                assert_eq!(manager.in_hidden_workspace(window), hidden);
                assert_eq!(info(desktop, window).state == WindowState::Hidden, hidden);
            }
        }
    }

    #[test]
    fn starts_with_one_active_workspace() {
        let (desktop, manager) = setup();
        assert_eq!(manager.workspaces(), &[manager.active_workspace()]);
        assert_eq!(desktop.workspace_count(), 1);
    }

    #[test]
    fn up_and_begin_are_noops_at_the_head() {
        let (mut desktop, mut manager) = setup();
        let first = manager.active_workspace();
        manager.workspace_up(&mut desktop, false);
        manager.workspace_begin(&mut desktop, true);
        assert_eq!(manager.active_workspace(), first);
        assert_eq!(manager.workspaces().len(), 1);
    }

    #[test]
    fn switching_hides_and_restores_windows() {
        let (mut desktop, mut manager) = setup();
        let a = app(&mut desktop, &mut manager);
        let first = manager.active_workspace();

        manager.workspace_down(&mut desktop, false);
        let second = manager.active_workspace();
        assert_ne!(first, second);
        assert_eq!(info(&desktop, a).state, WindowState::Hidden);
        assert_eq!(manager.last_focused(first), Some(a));
        assert_eq!(desktop.active_window(), None);
        assert_consistent(&desktop, &manager);

        manager.workspace_up(&mut desktop, false);
        assert_eq!(manager.active_workspace(), first);
        assert_eq!(info(&desktop, a).state, WindowState::Restored);
        assert_eq!(desktop.active_window(), Some(a));
        // The second workspace was empty, so leaving it destroys it.
        assert_eq!(manager.workspaces(), &[first]);
        assert!(!desktop.contains_workspace(second));
        assert_consistent(&desktop, &manager);
    }

    #[test]
    fn returning_refocuses_the_last_focused_window() {
        let (mut desktop, mut manager) = setup();
        let a = app(&mut desktop, &mut manager);
        let b = app(&mut desktop, &mut manager);
        assert_eq!(desktop.active_window(), Some(b));

        manager.workspace_down(&mut desktop, false);
        manager.workspace_up(&mut desktop, false);
        assert_eq!(desktop.active_window(), Some(b));
        assert_eq!(info(&desktop, a).state, WindowState::Restored);
    }

    #[test]
    fn take_active_carries_the_focused_window() {
        let (mut desktop, mut manager) = setup();
        let a = app(&mut desktop, &mut manager);
        let b = app(&mut desktop, &mut manager);
        let first = manager.active_workspace();

        manager.workspace_down(&mut desktop, true);
        let second = manager.active_workspace();
        assert_eq!(desktop.workspaces_containing(b), vec![second]);
        assert_eq!(info(&desktop, b).state, WindowState::Restored);
        assert_eq!(info(&desktop, a).state, WindowState::Hidden);
        assert!(desktop.contains_workspace(first));
        assert_consistent(&desktop, &manager);

        manager.workspace_up(&mut desktop, true);
        // `b` came back along, leaving the second workspace empty.
        assert_eq!(manager.workspaces(), &[first]);
        assert_consistent(&desktop, &manager);
    }

    #[test]
    fn carrying_the_last_window_away_destroys_the_old_workspace() {
        let (mut desktop, mut manager) = setup();
        let a = app(&mut desktop, &mut manager);
        let first = manager.active_workspace();

        manager.workspace_end(&mut desktop, true);
        assert!(!desktop.contains_workspace(first));
        assert_eq!(manager.workspaces(), &[manager.active_workspace()]);
        assert_eq!(info(&desktop, a).state, WindowState::Restored);
    }

    #[test]
    fn empty_active_workspace_survives() {
        let (mut desktop, mut manager) = setup();
        let first = manager.active_workspace();
        manager.workspace_end(&mut desktop, false);
        let second = manager.active_workspace();
        assert!(!desktop.contains_workspace(first));
        assert_eq!(manager.workspaces(), &[second]);

        manager.erase_if_empty(&mut desktop, second);
        assert_eq!(manager.workspaces(), &[second]);
    }

    #[test]
    fn shell_focus_hands_over_to_the_remembered_window() {
        let (mut desktop, mut manager) = setup();
        let a = app(&mut desktop, &mut manager);
        let first = manager.active_workspace();
        manager.workspace_down(&mut desktop, false);

        let panel = open(&mut desktop, &mut manager, DepthLayer::Above);
        assert_eq!(desktop.active_window(), Some(panel));

        manager.workspace_up(&mut desktop, false);
        assert_eq!(manager.active_workspace(), first);
        assert_eq!(desktop.active_window(), Some(a));
        // Shell windows do not keep a workspace alive.
        assert_eq!(manager.workspaces(), &[first]);
        assert_eq!(info(&desktop, panel).state, WindowState::Restored);
    }

    #[test]
    fn no_focus_with_occupied_workspace_hides_everything() {
        let (mut desktop, mut manager) = setup();
        let a = app(&mut desktop, &mut manager);
        let b = app(&mut desktop, &mut manager);
        let first = manager.active_workspace();
        desktop.clear_focus();

        manager.workspace_down(&mut desktop, false);
        assert_eq!(info(&desktop, a).state, WindowState::Hidden);
        assert_eq!(info(&desktop, b).state, WindowState::Hidden);
        assert_eq!(manager.last_focused(first), None);

        manager.workspace_up(&mut desktop, false);
        assert_eq!(desktop.active_window(), Some(a));
        assert_consistent(&desktop, &manager);
    }

    #[test]
    fn hiding_is_idempotent_and_restores_the_exact_state() {
        let (mut desktop, mut manager) = setup();
        let a = app(&mut desktop, &mut manager);
        let mut maximize = WindowSpecification {
            state: Some(WindowState::Maximized),
            ..Default::default()
        };
        desktop.place_and_size_for_state(&mut maximize, &info(&desktop, a));
        desktop.modify_window(a, &maximize);
        let before = info(&desktop, a);

        manager.apply_workspace_hidden_to(&mut desktop, a);
        manager.apply_workspace_hidden_to(&mut desktop, a);
        assert_eq!(
            manager.workspace_info(a),
            Some(WorkspaceInfo {
                in_hidden_workspace: true,
                old_state: WindowState::Maximized,
            })
        );

        manager.apply_workspace_visible_to(&mut desktop, a);
        manager.apply_workspace_visible_to(&mut desktop, a);
        let after = info(&desktop, a);
        assert_eq!(after.state, WindowState::Maximized);
        assert_eq!((after.top_left, after.size), (before.top_left, before.size));
    }

    #[test]
    fn navigation_keeps_invariants() {
        let (mut desktop, mut manager) = setup();
        let steps: [fn(&mut WorkspaceManager, &mut Desktop); 6] = [
            |m, d| m.workspace_down(d, false),
            |m, d| m.workspace_down(d, true),
            |m, d| m.workspace_up(d, false),
            |m, d| m.workspace_up(d, true),
            |m, d| m.workspace_begin(d, true),
            |m, d| m.workspace_end(d, false),
        ];
        for round in 0..60_usize {
            if round % 4 == 0 {
                app(&mut desktop, &mut manager);
            }
            steps[(round * 7 + round / 3) % steps.len()](&mut manager, &mut desktop);
            assert_consistent(&desktop, &manager);
        }
    }

    #[test]
    fn hooks_follow_the_sequence() {
        let recorder = Recorder::default();
        let mut desktop = Desktop::default();
        let mut manager = WorkspaceManager::new(&mut desktop, Box::new(recorder.clone()));
        let first = manager.active_workspace();
        manager.workspace_down(&mut desktop, false);
        let second = manager.active_workspace();

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![
                ("create", first),
                ("activate", first),
                ("create", second),
                ("deactivate", first),
                ("activate", second),
                ("destroy", first),
            ]
        );
    }

    #[test]
    fn external_activation() {
        let (mut desktop, mut manager) = setup();
        app(&mut desktop, &mut manager);
        let first = manager.active_workspace();
        manager.workspace_down(&mut desktop, false);
        let b = app(&mut desktop, &mut manager);
        let second = manager.active_workspace();

        manager.activate_workspace(&mut desktop, first);
        assert_eq!(manager.active_workspace(), first);
        assert!(manager.in_hidden_workspace(b));

        let unknown = desktop.create_workspace();
        manager.activate_workspace(&mut desktop, unknown);
        assert_eq!(manager.active_workspace(), first);

        manager.activate_workspace_containing(&mut desktop, b);
        assert_eq!(manager.active_workspace(), second);
        assert_eq!(info(&desktop, b).state, WindowState::Restored);
    }

    #[test]
    fn children_of_hidden_parents_start_hidden() {
        let (mut desktop, mut manager) = setup();
        let parent = app(&mut desktop, &mut manager);
        manager.workspace_down(&mut desktop, false);

        let child = desktop.create_window(WindowSpecification {
            state: Some(WindowState::Restored),
            parent: Some(parent),
            ..Default::default()
        });
        manager.advise_new_window(&mut desktop, child);
        assert!(manager.in_hidden_workspace(child));
        assert_eq!(info(&desktop, child).state, WindowState::Hidden);
    }

    #[test]
    fn deleting_a_window_drops_its_records() {
        let (mut desktop, mut manager) = setup();
        let a = app(&mut desktop, &mut manager);
        let first = manager.active_workspace();
        manager.workspace_down(&mut desktop, false);
        assert_eq!(manager.last_focused(first), Some(a));

        manager.advise_delete_window(a);
        desktop.destroy_window(a);
        assert_eq!(manager.last_focused(first), None);
        assert_eq!(manager.workspace_info(a), None);
    }
}
