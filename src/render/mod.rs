//! Render Compositor and draw lists
//!
//! The compositor turns one navigation snapshot into a [`DrawList`] per
//! window. Draw lists are plain data; a [`crate::display::Display`]
//! executes them, usually through the software [`Canvas`].

pub mod canvas;
pub mod compositor;
pub mod layout;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::deck::Rasterization;

pub use canvas::{Canvas, TextOverlay};
pub use compositor::{Compositor, Resources, Style};
pub use layout::{WindowLayout, fit_rect};

/// Opaque sRGB colour
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(0xFF, 0xFF, 0xFF);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `RRGGBB` with an optional leading `#`
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    #[must_use]
    pub const fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, 0xFF]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_hex(&raw).ok_or_else(|| de::Error::custom(format!("invalid colour `{raw}`")))
    }
}

/// Pixel rectangle inside a window
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[must_use]
    pub const fn right(&self) -> u32 {
        self.x + self.width
    }

    #[must_use]
    pub const fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Part of `self` inside a `width` x `height` surface
    #[must_use]
    pub fn clip(&self, width: u32, height: u32) -> Self {
        let x = self.x.min(width);
        let y = self.y.min(height);
        Self::new(x, y, self.right().min(width) - x, self.bottom().min(height) - y)
    }
}

/// Which part of a window an op belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    Slide,
    Thumbnail,
    Timer,
    Counter,
}

/// One drawing instruction
#[derive(Clone, Debug)]
pub enum DrawOp {
    Fill {
        rect: Rect,
        color: Rgb,
    },
    /// A page bitmap scaled into `dest`, composited source-over
    Image {
        slot: Slot,
        raster: Arc<Rasterization>,
        dest: Rect,
        opacity: f32,
    },
    /// Stand-in for a bitmap that is not available yet or failed
    Placeholder {
        slot: Slot,
        page: Option<usize>,
        rect: Rect,
        color: Rgb,
        opacity: f32,
        label: String,
    },
    Text {
        slot: Slot,
        text: String,
        area: Rect,
        color: Rgb,
    },
}

impl DrawOp {
    #[must_use]
    pub fn slot(&self) -> Option<Slot> {
        match self {
            Self::Fill { .. } => None,
            Self::Image { slot, .. } | Self::Placeholder { slot, .. } | Self::Text { slot, .. } => {
                Some(*slot)
            }
        }
    }
}

/// Everything needed to draw one window for one frame, bottom to top
#[derive(Clone, Debug)]
pub struct DrawList {
    pub width: u32,
    pub height: u32,
    pub clear: Rgb,
    pub ops: Vec<DrawOp>,
}

impl DrawList {
    #[must_use]
    pub fn new(width: u32, height: u32, clear: Rgb) -> Self {
        Self {
            width,
            height,
            clear,
            ops: Vec::new(),
        }
    }

    pub fn push(&mut self, op: DrawOp) {
        self.ops.push(op);
    }

    /// Pages drawn as bitmaps in `slot`, with their opacities
    #[must_use]
    pub fn images_in(&self, slot: Slot) -> Vec<(usize, f32)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Image {
                    slot: s,
                    raster,
                    opacity,
                    ..
                } if *s == slot => Some((raster.index, *opacity)),
                _ => None,
            })
            .collect()
    }

    /// Pages referenced in `slot`, drawn or stood in for
    #[must_use]
    pub fn pages_in(&self, slot: Slot) -> Vec<usize> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Image { slot: s, raster, .. } if *s == slot => Some(raster.index),
                DrawOp::Placeholder { slot: s, page, .. } if *s == slot => *page,
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn placeholders_in(&self, slot: Slot) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Placeholder { slot: s, label, .. } if *s == slot => Some(label.as_str()),
                _ => None,
            })
            .collect()
    }

    /// First text op in `slot`
    #[must_use]
    pub fn text_in(&self, slot: Slot) -> Option<(&str, Rgb)> {
        self.ops.iter().find_map(|op| match op {
            DrawOp::Text {
                slot: s,
                text,
                color,
                ..
            } if *s == slot => Some((text.as_str(), *color)),
            _ => None,
        })
    }
}
