//! The window-management capabilities a host compositor provides.
//!
//! Windows and workspaces belong to the host. Everything in this crate refers to them
//! through [`WindowId`] and [`WorkspaceId`] handles and asks the host to change them
//! through [`WindowManagerTools`].

use bitflags::bitflags;

slotmap::new_key_type! {
    pub struct WindowId;
    pub struct WorkspaceId;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DepthLayer {
    Background,
    Below,
    #[default]
    Application,
    AlwaysOnTop,
    Above,
    Overlay,
}

/// Windows on these layers count towards workspace occupancy and follow workspace visibility.
pub fn is_application(layer: DepthLayer) -> bool {
    matches!(layer, DepthLayer::Application | DepthLayer::AlwaysOnTop)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WindowState {
    #[default]
    Unknown,
    Restored,
    Minimized,
    Maximized,
    VertMaximized,
    HorizMaximized,
    Fullscreen,
    Attached,
    Hidden,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WindowType {
    #[default]
    Normal,
    Utility,
    Dialog,
    Gloss,
    Freestyle,
    Menu,
    InputMethod,
    Satellite,
    Tip,
    Decoration,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Edges: u32 {
        const NORTH = 1 << 0;
        const SOUTH = 1 << 1;
        const EAST = 1 << 2;
        const WEST = 1 << 3;
    }
}

impl Edges {
    pub const LEFT: Self = Self::NORTH.union(Self::SOUTH).union(Self::WEST);
    pub const RIGHT: Self = Self::NORTH.union(Self::SOUTH).union(Self::EAST);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rectangle {
    pub top_left: Point,
    pub size: Size,
}

impl Rectangle {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            top_left: Point { x, y },
            size: Size { width, height },
        }
    }

    pub fn right(&self) -> i32 {
        self.top_left.x + self.size.width
    }
}

/// A snapshot of what the host knows about a window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowInfo {
    pub window: WindowId,
    pub name: String,
    pub depth_layer: DepthLayer,
    pub state: WindowState,
    pub window_type: WindowType,
    pub top_left: Point,
    pub size: Size,
    pub restore_rect: Rectangle,
    pub attached_edges: Edges,
    pub parent: Option<WindowId>,
}

/// A window creation or modification request. Unset fields are left alone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WindowSpecification {
    pub name: Option<String>,
    pub depth_layer: Option<DepthLayer>,
    pub state: Option<WindowState>,
    pub window_type: Option<WindowType>,
    pub top_left: Option<Point>,
    pub size: Option<Size>,
    pub attached_edges: Option<Edges>,
    pub parent: Option<WindowId>,
}

impl WindowSpecification {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub trait WindowManagerTools {
    fn create_window(&mut self, spec: WindowSpecification) -> WindowId;
    fn destroy_window(&mut self, window: WindowId);

    fn create_workspace(&mut self) -> WorkspaceId;
    fn destroy_workspace(&mut self, workspace: WorkspaceId);

    fn active_window(&self) -> Option<WindowId>;
    /// Focus `window`. Hidden or unknown windows are not selected.
    fn select_active_window(&mut self, window: WindowId);

    fn info_for(&self, window: WindowId) -> Option<WindowInfo>;
    fn windows_in_workspace(&self, workspace: WorkspaceId) -> Vec<WindowId>;
    fn workspaces_containing(&self, window: WindowId) -> Vec<WorkspaceId>;

    /// Adds `window` and its descendants, returning the windows that were not already members.
    fn add_tree_to_workspace(&mut self, window: WindowId, workspace: WorkspaceId)
    -> Vec<WindowId>;
    /// Removes `window` and its descendants, returning the windows that were members.
    fn remove_tree_from_workspace(
        &mut self,
        window: WindowId,
        workspace: WorkspaceId,
    ) -> Vec<WindowId>;

    fn modify_window(&mut self, window: WindowId, modifications: &WindowSpecification);
    /// Fills in the geometry `modifications` implies for its requested state.
    fn place_and_size_for_state(&self, modifications: &mut WindowSpecification, info: &WindowInfo);
    fn active_application_zone(&self) -> Rectangle;
}
