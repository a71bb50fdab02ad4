//! Normalized input events and the commands they map to

pub mod router;

use crate::display::{Size, WindowRole};

pub use router::{InputRouter, RepeatPolicy};

/// Keys the show reacts to. Everything else arrives as `Char` or is
/// dropped by the display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    PageDown,
    PageUp,
    Right,
    Left,
    Down,
    Up,
    Space,
    Enter,
    Backspace,
    Home,
    End,
    Escape,
    Char(char),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// What a display reports, before any interpretation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawEvent {
    /// `repeat` is set for auto-repeat while the key stays down
    KeyDown { key: Key, repeat: bool },
    KeyUp { key: Key },
    MouseDown { button: MouseButton },
    /// Positive scrolls down (forward)
    Scroll { delta: i32 },
    Resized { role: WindowRole, size: Size },
    CloseRequested,
}

impl RawEvent {
    #[must_use]
    pub const fn press(key: Key) -> Self {
        Self::KeyDown { key, repeat: false }
    }

    #[must_use]
    pub const fn repeat(key: Key) -> Self {
        Self::KeyDown { key, repeat: true }
    }
}

/// Abstract command produced by the router
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Advance(isize),
    Jump(usize),
    ToggleCountdown,
    ResetCountdown,
    Resize { role: WindowRole, size: Size },
    Quit,
}
