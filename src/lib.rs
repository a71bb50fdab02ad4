// Export modules for use in tests
pub mod animation;
pub mod cache;
pub mod clock;
pub mod coordinator;
pub mod deck;
pub mod display;
pub mod error;
pub mod input;
pub mod navigation;
pub mod panic_handler;
pub mod render;
pub mod settings;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use coordinator::{Coordinator, FrameReport, ShowConfig};
pub use error::{RasterError, ShowError};
