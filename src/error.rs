//! Error taxonomy for the slide show engine

use std::path::PathBuf;

use crate::deck::Resolution;

/// Errors surfaced by the show.
///
/// Only [`ShowError::LoadFailure`] is fatal, and only at startup. Everything
/// else is recovered where it happens so the frame loop keeps running.
#[derive(Debug, thiserror::Error)]
pub enum ShowError {
    #[error("cannot load {}: {detail}", path.display())]
    LoadFailure { path: PathBuf, detail: String },

    #[error("page {index} at {resolution} could not be rasterized: {detail}")]
    RasterizationFailure {
        index: usize,
        resolution: Resolution,
        detail: String,
    },

    #[error("slide {index} is outside the deck of {len} slides")]
    OutOfRange { index: usize, len: usize },

    #[error("production of page {index} at {resolution} was superseded by a resize")]
    ResizeRace { index: usize, resolution: Resolution },

    #[error("display: {detail}")]
    Display { detail: String },
}

impl ShowError {
    pub fn load(path: impl Into<PathBuf>, detail: impl ToString) -> Self {
        Self::LoadFailure {
            path: path.into(),
            detail: detail.to_string(),
        }
    }

    pub fn display(detail: impl ToString) -> Self {
        Self::Display {
            detail: detail.to_string(),
        }
    }

    /// True for errors that must stop the process.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::LoadFailure { .. })
    }
}

/// Errors from the external rasterizer
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[cfg(feature = "pdf")]
    #[error("PDF engine: {0}")]
    Pdf(#[from] mupdf::error::Error),

    #[error("image: {0}")]
    Image(#[from] image::ImageError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("{detail}")]
    Generic { detail: String },
}

impl RasterError {
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic { detail: msg.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_load_failure_is_fatal() {
        assert!(ShowError::load("deck.pdf", "no such file").is_fatal());
        assert!(!ShowError::OutOfRange { index: 9, len: 3 }.is_fatal());
        assert!(
            !ShowError::ResizeRace {
                index: 0,
                resolution: Resolution::new(10, 10),
            }
            .is_fatal()
        );
    }

    #[test]
    fn out_of_range_message_names_the_deck_size() {
        let err = ShowError::OutOfRange { index: 7, len: 5 };
        assert_eq!(err.to_string(), "slide 7 is outside the deck of 5 slides");
    }
}
