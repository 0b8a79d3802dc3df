//! Keyboard input as seen by the shortcut router.
//!
//! Keysym values follow the X11/xkbcommon numbering so that configuration written
//! against xkb key names resolves to the same symbols the host reports.

use std::fmt;

use bitflags::bitflags;
use xkbcommon::xkb::{self, keysyms};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Keysym(pub u32);

impl Keysym {
    pub const TAB: Self = Self(keysyms::KEY_Tab);
    pub const LEFT: Self = Self(keysyms::KEY_Left);
    pub const RIGHT: Self = Self(keysyms::KEY_Right);
    pub const DELETE: Self = Self(keysyms::KEY_Delete);

    /// Resolves an xkb key name, ignoring case. Where case matters xkb picks the lowercase
    /// symbol.
    pub fn from_name(name: &str) -> Option<Self> {
        let keysym = xkb::keysym_from_name(name, xkb::KEYSYM_CASE_INSENSITIVE);
        match keysym.raw() {
            keysyms::KEY_NoSymbol => None,
            raw => Some(Self(raw)),
        }
    }

    /// Maps uppercase Latin-1 letters onto their lowercase symbol.
    pub fn to_lower(self) -> Self {
        match self.0 {
            0x41..=0x5a | 0xc0..=0xd6 | 0xd8..=0xde => Self(self.0 + 0x20),
            _ => self,
        }
    }
}

impl fmt::Display for Keysym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&xkb::keysym_get_name(xkb::Keysym::new(self.0)))
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Modifiers: u32 {
        const SHIFT = 1 << 0;
        const CTRL = 1 << 1;
        const ALT = 1 << 2;
        const META = 1 << 3;
    }
}

impl Modifiers {
    pub const CTRL_ALT: Self = Self::CTRL.union(Self::ALT);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyAction {
    Down,
    Repeat,
    Up,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyboardEvent {
    pub action: KeyAction,
    pub modifiers: Modifiers,
    pub keysym: Keysym,
}

impl KeyboardEvent {
    pub fn down(modifiers: Modifiers, keysym: Keysym) -> Self {
        Self {
            action: KeyAction::Down,
            modifiers,
            keysym,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    Keyboard(KeyboardEvent),
    Touch,
    Pointer { x: f32, y: f32 },
}
