//! A headless, in-memory host.
//!
//! Keeps window and workspace records in slot maps and applies modifications directly.
//! Focus follows the usual compositor rules: new windows take focus, hiding the focused
//! window passes focus to the most recently focused visible application window, and the
//! first window shown while nothing is focused grabs focus.

use slotmap::SlotMap;

use crate::host::{
    DepthLayer, Edges, Rectangle, Size, WindowId, WindowInfo, WindowManagerTools,
    WindowSpecification, WindowState, WorkspaceId, is_application,
};

const DEFAULT_SIZE: Size = Size {
    width: 640,
    height: 480,
};

#[derive(Debug)]
struct WindowRecord {
    info: WindowInfo,
    children: Vec<WindowId>,
}

#[derive(Debug)]
pub struct Desktop {
    windows: SlotMap<WindowId, WindowRecord>,
    workspaces: SlotMap<WorkspaceId, Vec<WindowId>>,
    active: Option<WindowId>,
    // Least recently focused first.
    focus_history: Vec<WindowId>,
    zone: Rectangle,
}

impl Default for Desktop {
    fn default() -> Self {
        Self::new(Rectangle::new(0, 0, 1920, 1080))
    }
}

impl Desktop {
    pub fn new(zone: Rectangle) -> Self {
        Self {
            windows: SlotMap::with_key(),
            workspaces: SlotMap::with_key(),
            active: None,
            focus_history: Vec::new(),
            zone,
        }
    }

    pub fn set_application_zone(&mut self, zone: Rectangle) {
        self.zone = zone;
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    pub fn workspace_count(&self) -> usize {
        self.workspaces.len()
    }

    pub fn contains_workspace(&self, workspace: WorkspaceId) -> bool {
        self.workspaces.contains_key(workspace)
    }

    /// Drops keyboard focus without focusing anything else, as a click on the background does.
    pub fn clear_focus(&mut self) {
        self.active = None;
    }

    fn tree(&self, window: WindowId) -> Vec<WindowId> {
        let mut tree = Vec::new();
        let mut pending = vec![window];
        while let Some(next) = pending.pop() {
            if let Some(record) = self.windows.get(next) {
                tree.push(next);
                pending.extend(record.children.iter().rev().copied());
            }
        }
        tree
    }

    fn can_take_focus(&self, window: WindowId) -> bool {
        self.windows.get(window).is_some_and(|it| {
            !matches!(it.info.state, WindowState::Hidden | WindowState::Minimized)
        })
    }

    fn focus(&mut self, window: WindowId) {
        self.focus_history.retain(|&it| it != window);
        self.focus_history.push(window);
        self.active = Some(window);
    }

    fn refocus(&mut self) {
        self.active = self
            .focus_history
            .iter()
            .rev()
            .copied()
            .find(|&it| {
                self.can_take_focus(it)
                    && self
                        .windows
                        .get(it)
                        .is_some_and(|rec| is_application(rec.info.depth_layer))
            });
        log::trace!("Focus moved to {:?}", self.active);
    }
}

impl WindowManagerTools for Desktop {
    fn create_window(&mut self, spec: WindowSpecification) -> WindowId {
        let top_left = spec.top_left.unwrap_or(self.zone.top_left);
        let size = spec.size.unwrap_or(DEFAULT_SIZE);
        let parent = spec.parent.filter(|&it| self.windows.contains_key(it));
        let state = match spec.state {
            None | Some(WindowState::Unknown) => WindowState::Restored,
            Some(state) => state,
        };

        let window = self.windows.insert_with_key(|window| WindowRecord {
            info: WindowInfo {
                window,
                name: spec.name.unwrap_or_default(),
                depth_layer: spec.depth_layer.unwrap_or_default(),
                state,
                window_type: spec.window_type.unwrap_or_default(),
                top_left,
                size,
                restore_rect: Rectangle { top_left, size },
                attached_edges: spec.attached_edges.unwrap_or_default(),
                parent,
            },
            children: Vec::new(),
        });

        if let Some(parent) = parent {
            if let Some(record) = self.windows.get_mut(parent) {
                record.children.push(window);
            }
            for members in self.workspaces.values_mut() {
                if members.contains(&parent) {
                    members.push(window);
                }
            }
        }

        if self.can_take_focus(window) {
            self.focus(window);
        }
        window
    }

    fn destroy_window(&mut self, window: WindowId) {
        let Some(record) = self.windows.remove(window) else {
            return;
        };
        for child in record.children {
            if let Some(child) = self.windows.get_mut(child) {
                child.info.parent = None;
            }
        }
        if let Some(parent) = record.info.parent.and_then(|it| self.windows.get_mut(it)) {
            parent.children.retain(|&it| it != window);
        }
        for members in self.workspaces.values_mut() {
            members.retain(|&it| it != window);
        }
        self.focus_history.retain(|&it| it != window);
        if self.active == Some(window) {
            self.refocus();
        }
    }

    fn create_workspace(&mut self) -> WorkspaceId {
        self.workspaces.insert(Vec::new())
    }

    fn destroy_workspace(&mut self, workspace: WorkspaceId) {
        self.workspaces.remove(workspace);
    }

    fn active_window(&self) -> Option<WindowId> {
        self.active
    }

    fn select_active_window(&mut self, window: WindowId) {
        if self.can_take_focus(window) {
            self.focus(window);
        }
    }

    fn info_for(&self, window: WindowId) -> Option<WindowInfo> {
        self.windows.get(window).map(|it| it.info.clone())
    }

    fn windows_in_workspace(&self, workspace: WorkspaceId) -> Vec<WindowId> {
        self.workspaces.get(workspace).cloned().unwrap_or_default()
    }

    fn workspaces_containing(&self, window: WindowId) -> Vec<WorkspaceId> {
        self.workspaces
            .iter()
            .filter(|(_, members)| members.contains(&window))
            .map(|(id, _)| id)
            .collect()
    }

    fn add_tree_to_workspace(
        &mut self,
        window: WindowId,
        workspace: WorkspaceId,
    ) -> Vec<WindowId> {
        let tree = self.tree(window);
        let Some(members) = self.workspaces.get_mut(workspace) else {
            return Vec::new();
        };
        let added: Vec<_> = tree.into_iter().filter(|it| !members.contains(it)).collect();
        members.extend(&added);
        added
    }

    fn remove_tree_from_workspace(
        &mut self,
        window: WindowId,
        workspace: WorkspaceId,
    ) -> Vec<WindowId> {
        let tree = self.tree(window);
        let Some(members) = self.workspaces.get_mut(workspace) else {
            return Vec::new();
        };
        let removed: Vec<_> = tree.into_iter().filter(|it| members.contains(it)).collect();
        members.retain(|it| !removed.contains(it));
        removed
    }

    fn modify_window(&mut self, window: WindowId, modifications: &WindowSpecification) {
        let Some(record) = self.windows.get_mut(window) else {
            return;
        };
        let info = &mut record.info;
        let old_state = info.state;

        if let Some(name) = &modifications.name {
            info.name.clone_from(name);
        }
        if let Some(layer) = modifications.depth_layer {
            info.depth_layer = layer;
        }
        if let Some(window_type) = modifications.window_type {
            info.window_type = window_type;
        }
        if let Some(state) = modifications.state {
            if old_state == WindowState::Restored && state != WindowState::Restored {
                info.restore_rect = Rectangle {
                    top_left: info.top_left,
                    size: info.size,
                };
            }
            info.state = state;
        }
        if let Some(top_left) = modifications.top_left {
            info.top_left = top_left;
        }
        if let Some(size) = modifications.size {
            info.size = size;
        }
        if let Some(edges) = modifications.attached_edges {
            info.attached_edges = edges;
        }

        let new_state = info.state;
        if new_state == WindowState::Hidden && old_state != WindowState::Hidden {
            if self.active == Some(window) {
                self.refocus();
            }
        } else if old_state == WindowState::Hidden
            && new_state != WindowState::Hidden
            && self.active.is_none()
        {
            self.focus(window);
        }
    }

    fn place_and_size_for_state(&self, modifications: &mut WindowSpecification, info: &WindowInfo) {
        let zone = self.zone;
        match modifications.state {
            Some(WindowState::Maximized | WindowState::Fullscreen) => {
                modifications.top_left = Some(zone.top_left);
                modifications.size = Some(zone.size);
            }
            Some(WindowState::Attached) => {
                let edges = modifications.attached_edges.unwrap_or(info.attached_edges);
                let mut size = modifications.size.unwrap_or(info.size);
                let mut top_left = modifications.top_left.unwrap_or(info.top_left);
                if edges.contains(Edges::NORTH | Edges::SOUTH) {
                    size.height = zone.size.height;
                    top_left.y = zone.top_left.y;
                }
                if edges.contains(Edges::WEST) {
                    top_left.x = zone.top_left.x;
                } else if edges.contains(Edges::EAST) {
                    top_left.x = zone.right() - size.width;
                }
                modifications.size = Some(size);
                modifications.top_left = Some(top_left);
            }
            Some(WindowState::Restored) => {
                modifications.size.get_or_insert(info.restore_rect.size);
                modifications.top_left.get_or_insert(info.restore_rect.top_left);
            }
            _ => {}
        }
    }

    fn active_application_zone(&self) -> Rectangle {
        self.zone
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Point;

    fn app(desktop: &mut Desktop) -> WindowId {
        desktop.create_window(WindowSpecification::default())
    }

    #[test]
    fn new_windows_take_focus() {
        let mut desktop = Desktop::default();
        let a = app(&mut desktop);
        assert_eq!(desktop.active_window(), Some(a));
        let b = app(&mut desktop);
        assert_eq!(desktop.active_window(), Some(b));
    }

    #[test]
    fn hiding_the_active_window_passes_focus_back() {
        let mut desktop = Desktop::default();
        let a = app(&mut desktop);
        let b = app(&mut desktop);
        let hide = WindowSpecification {
            state: Some(WindowState::Hidden),
            ..Default::default()
        };

        desktop.modify_window(b, &hide);
        assert_eq!(desktop.active_window(), Some(a));
        desktop.modify_window(a, &hide);
        assert_eq!(desktop.active_window(), None);

        desktop.modify_window(
            b,
            &WindowSpecification {
                state: Some(WindowState::Restored),
                ..Default::default()
            },
        );
        assert_eq!(desktop.active_window(), Some(b));
    }

    #[test]
    fn children_follow_their_parent() {
        let mut desktop = Desktop::default();
        let ws = desktop.create_workspace();
        let other = desktop.create_workspace();
        let parent = app(&mut desktop);
        desktop.add_tree_to_workspace(parent, ws);
        let child = desktop.create_window(WindowSpecification {
            parent: Some(parent),
            ..Default::default()
        });

        assert_eq!(desktop.windows_in_workspace(ws), vec![parent, child]);
        assert_eq!(desktop.add_tree_to_workspace(parent, other), vec![parent, child]);
        assert_eq!(desktop.remove_tree_from_workspace(parent, ws), vec![parent, child]);
        assert!(desktop.windows_in_workspace(ws).is_empty());
        assert_eq!(desktop.workspaces_containing(child), vec![other]);
    }

    #[test]
    fn attaching_to_the_right_edge_fills_the_height() {
        let mut desktop = Desktop::new(Rectangle::new(0, 30, 1200, 800));
        let window = app(&mut desktop);
        let info = desktop.info_for(window).unwrap();
        let mut mods = WindowSpecification {
            state: Some(WindowState::Attached),
            attached_edges: Some(Edges::RIGHT),
            size: Some(Size {
                width: 400,
                height: 100,
            }),
            ..Default::default()
        };
        desktop.place_and_size_for_state(&mut mods, &info);

        assert_eq!(mods.top_left, Some(Point { x: 800, y: 30 }));
        assert_eq!(
            mods.size,
            Some(Size {
                width: 400,
                height: 800
            })
        );
    }

    #[test]
    fn leaving_restored_remembers_the_restore_rect() {
        let mut desktop = Desktop::default();
        let window = desktop.create_window(WindowSpecification {
            top_left: Some(Point { x: 10, y: 20 }),
            size: Some(Size {
                width: 300,
                height: 200,
            }),
            ..Default::default()
        });
        let info = desktop.info_for(window).unwrap();
        let mut mods = WindowSpecification {
            state: Some(WindowState::Maximized),
            ..Default::default()
        };
        desktop.place_and_size_for_state(&mut mods, &info);
        desktop.modify_window(window, &mods);

        let info = desktop.info_for(window).unwrap();
        assert_eq!(info.size, Size {
            width: 1920,
            height: 1080
        });
        assert_eq!(info.restore_rect, Rectangle::new(10, 20, 300, 200));
    }
}
