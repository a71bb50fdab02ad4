//! Deck model and the rasterizer collaborator seam
//!
//! A [`Deck`] is the immutable list of pages discovered at load time. The
//! pixels themselves come from a [`DeckSource`], which hands every worker
//! thread its own [`Rasterizer`] so engines with non-`Send` handles (MuPDF
//! documents) can be used from a pool.

pub mod image_dir;
#[cfg(feature = "pdf")]
pub mod pdf_source;

use std::fmt;
use std::num::NonZeroU32;

use fast_image_resize as fr;

use crate::error::{RasterError, ShowError};

/// Target bounding box for a rasterization, in device pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A zero-area box cannot be rasterized into
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Rendered bitmap of one page at one resolution.
///
/// Pixels are tightly packed RGBA, `width * height * 4` bytes. `width` and
/// `height` fit inside `resolution` with the page aspect preserved.
#[derive(Clone)]
pub struct Rasterization {
    pub index: usize,
    pub resolution: Resolution,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl fmt::Debug for Rasterization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rasterization")
            .field("index", &self.index)
            .field("resolution", &self.resolution)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Rasterization {
    /// Wrap an RGBA buffer, validating its length
    pub fn from_rgba(
        index: usize,
        resolution: Resolution,
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    ) -> Result<Self, RasterError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(RasterError::generic(format!(
                "pixel buffer holds {} bytes, expected {expected} for {width}x{height}",
                pixels.len()
            )));
        }
        Ok(Self {
            index,
            resolution,
            width,
            height,
            pixels,
        })
    }

    /// Expand a packed RGB buffer with the given row stride to RGBA
    pub fn from_rgb_rows(
        index: usize,
        resolution: Resolution,
        width: u32,
        height: u32,
        stride: usize,
        channels: usize,
        samples: &[u8],
    ) -> Result<Self, RasterError> {
        if channels < 3 {
            return Err(RasterError::generic(format!(
                "Unsupported pixmap format: {channels} channels"
            )));
        }
        let row_bytes = width as usize * channels;
        if row_bytes > stride || samples.len() < stride.saturating_mul(height as usize) {
            return Err(RasterError::generic("Pixmap buffer size mismatch"));
        }

        let mut out = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height as usize {
            let row = &samples[y * stride..y * stride + row_bytes];
            for px in row.chunks_exact(channels) {
                out.extend_from_slice(&[px[0], px[1], px[2], 0xFF]);
            }
        }
        Self::from_rgba(index, resolution, width, height, out)
    }

    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
            self.pixels[offset + 3],
        ]
    }
}

/// Scale a packed RGBA buffer to an exact size
pub fn resize_rgba(
    pixels: &[u8],
    width: u32,
    height: u32,
    new_width: u32,
    new_height: u32,
) -> Result<Vec<u8>, RasterError> {
    if (width, height) == (new_width, new_height) {
        return Ok(pixels.to_vec());
    }

    let nz = |v: u32, what: &str| {
        NonZeroU32::new(v).ok_or_else(|| RasterError::generic(format!("Invalid {what}")))
    };

    let src = fr::Image::from_vec_u8(
        nz(width, "width")?,
        nz(height, "height")?,
        pixels.to_vec(),
        fr::PixelType::U8x4,
    )
    .map_err(|e| RasterError::generic(e.to_string()))?;
    let mut dst = fr::Image::new(
        nz(new_width, "target width")?,
        nz(new_height, "target height")?,
        fr::PixelType::U8x4,
    );

    let mut resizer = fr::Resizer::new(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear));
    resizer
        .resize(&src.view(), &mut dst.view_mut())
        .map_err(|e| RasterError::generic(e.to_string()))?;

    Ok(dst.into_vec())
}

/// Largest size with the given aspect ratio (width / height) that fits in the box
#[must_use]
pub fn fit_within(aspect: f32, target: Resolution) -> (u32, u32) {
    if target.is_empty() || !aspect.is_finite() || aspect <= 0.0 {
        return (0, 0);
    }
    let box_aspect = target.width as f32 / target.height as f32;
    if box_aspect >= aspect {
        // Height-limited.
        let width = (target.height as f32 * aspect).round() as u32;
        (width.clamp(1, target.width), target.height)
    } else {
        // Width-limited.
        let height = (target.width as f32 / aspect).round() as u32;
        (target.width, height.clamp(1, target.height))
    }
}

/// Page geometry as reported by the source
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Page {
    pub index: usize,
    /// Page width in source units (points for PDF, pixels for images)
    pub width: f32,
    pub height: f32,
}

impl Page {
    #[must_use]
    pub fn aspect(&self) -> f32 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }
}

/// Immutable ordered collection of pages
#[derive(Clone, Debug)]
pub struct Deck {
    pages: Vec<Page>,
    title: Option<String>,
}

impl Deck {
    /// Build a deck from page sizes in order
    #[must_use]
    pub fn new(sizes: Vec<(f32, f32)>, title: Option<String>) -> Self {
        let pages = sizes
            .into_iter()
            .enumerate()
            .map(|(index, (width, height))| Page {
                index,
                width,
                height,
            })
            .collect();
        Self { pages, title }
    }

    /// Keep only the first `limit` pages
    #[must_use]
    pub fn limited(mut self, limit: Option<usize>) -> Self {
        if let Some(limit) = limit {
            self.pages.truncate(limit);
        }
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    #[must_use]
    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Aspect ratio used for window layout (first page, 4:3 for an empty deck)
    #[must_use]
    pub fn aspect(&self) -> f32 {
        self.pages.first().map_or(4.0 / 3.0, Page::aspect)
    }
}

/// Produces bitmaps for pages. Lives on a single worker thread.
pub trait Rasterizer {
    /// Render `page` to fit inside `target`, preserving aspect ratio
    fn rasterize(&mut self, page: usize, target: Resolution) -> Result<Rasterization, RasterError>;
}

/// A loadable document
pub trait DeckSource: Send + Sync + 'static {
    /// Read page count and geometry. Failure here is a load failure.
    fn describe(&self) -> Result<Deck, ShowError>;

    /// Open an independent rasterizer for the calling thread
    fn open(&self) -> Result<Box<dyn Rasterizer>, RasterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_within_preserves_aspect() {
        assert_eq!(fit_within(16.0 / 9.0, Resolution::new(1600, 1600)), (1600, 900));
        assert_eq!(fit_within(4.0 / 3.0, Resolution::new(1920, 1080)), (1440, 1080));
        assert_eq!(fit_within(1.0, Resolution::new(0, 100)), (0, 0));
    }

    #[test]
    fn from_rgb_rows_respects_stride() {
        // 2x2 RGB image with one byte of row padding
        let samples = [
            1, 2, 3, 4, 5, 6, 0, //
            7, 8, 9, 10, 11, 12, 0,
        ];
        let raster =
            Rasterization::from_rgb_rows(0, Resolution::new(2, 2), 2, 2, 7, 3, &samples).unwrap();
        assert_eq!(raster.pixel(1, 0), [4, 5, 6, 255]);
        assert_eq!(raster.pixel(0, 1), [7, 8, 9, 255]);
    }

    #[test]
    fn from_rgba_rejects_short_buffer() {
        assert!(Rasterization::from_rgba(0, Resolution::new(2, 2), 2, 2, vec![0; 15]).is_err());
    }

    #[test]
    fn resize_rgba_keeps_solid_colour() {
        let pixels = [10u8, 20, 30, 255].repeat(4 * 4);
        let scaled = resize_rgba(&pixels, 4, 4, 8, 2).unwrap();
        assert_eq!(scaled.len(), 8 * 2 * 4);
        let close = |a: u8, b: u8| a.abs_diff(b) <= 1;
        assert!(scaled.chunks_exact(4).all(|px| {
            close(px[0], 10) && close(px[1], 20) && close(px[2], 30) && close(px[3], 255)
        }));
    }

    #[test]
    fn deck_limit_truncates_pages() {
        let deck = Deck::new(vec![(4.0, 3.0); 10], None).limited(Some(3));
        assert_eq!(deck.len(), 3);
        assert!((deck.aspect() - 4.0 / 3.0).abs() < f32::EPSILON);
    }
}
