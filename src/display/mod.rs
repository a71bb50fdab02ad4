//! Windowing collaborator
//!
//! The coordinator talks to windows only through [`Display`]. It is
//! constructed once at startup, handed to the coordinator and torn down
//! when the coordinator is dropped.

pub mod headless;
pub mod terminal;

use std::fmt;
use std::time::Duration;

use crate::error::ShowError;
use crate::input::RawEvent;
use crate::render::DrawList;

pub use headless::{HeadlessDisplay, SubmittedFrame};
pub use terminal::TerminalDisplay;

/// The two windows of a show
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WindowRole {
    /// Full-screen slide for the room
    Audience,
    /// Operator console: slide, next slide, timer
    Presenter,
}

impl WindowRole {
    pub const ALL: [Self; 2] = [Self::Audience, Self::Presenter];

    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::Audience => Self::Presenter,
            Self::Presenter => Self::Audience,
        }
    }
}

impl fmt::Display for WindowRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audience => f.write_str("audience"),
            Self::Presenter => f.write_str("presenter"),
        }
    }
}

/// Window size in pixels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Handle to a window created by a [`Display`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u32);

/// A created window and the size it actually got
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Surface {
    pub id: SurfaceId,
    pub size: Size,
}

pub trait Display {
    /// Open a window for `role`. The display may grant a different size.
    fn create_window(&mut self, role: WindowRole, size: Size) -> Result<Surface, ShowError>;

    /// Hand over one window's frame
    fn submit_frame(&mut self, surface: SurfaceId, frame: &DrawList) -> Result<(), ShowError>;

    /// Called once after both windows were submitted for a tick
    fn end_frame(&mut self) -> Result<(), ShowError> {
        Ok(())
    }

    /// Wait up to `timeout` for input; returns everything that arrived
    fn poll_input(&mut self, timeout: Duration) -> Result<Vec<RawEvent>, ShowError>;
}
