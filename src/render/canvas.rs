//! Software executor for draw lists

use log::warn;
use rayon::prelude::*;

use crate::deck::resize_rgba;

use super::{DrawList, DrawOp, Rect, Rgb, Slot};

/// Text left for the display to draw on top of the pixels
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextOverlay {
    pub slot: Slot,
    pub text: String,
    pub area: Rect,
    pub color: Rgb,
}

/// An RGBA frame produced from a [`DrawList`]
#[derive(Clone, Debug)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub overlays: Vec<TextOverlay>,
}

impl Canvas {
    #[must_use]
    pub fn new(width: u32, height: u32, clear: Rgb) -> Self {
        Self {
            width,
            height,
            pixels: clear.to_rgba().repeat(width as usize * height as usize),
            overlays: Vec::new(),
        }
    }

    /// Execute every op in order
    #[must_use]
    pub fn render(list: &DrawList) -> Self {
        let mut canvas = Self::new(list.width, list.height, list.clear);
        for op in &list.ops {
            canvas.apply(op);
        }
        canvas
    }

    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let mut px = [0; 4];
        px.copy_from_slice(&self.pixels[offset..offset + 4]);
        px
    }

    fn apply(&mut self, op: &DrawOp) {
        match op {
            DrawOp::Fill { rect, color } => self.fill(*rect, *color, 1.0),
            DrawOp::Image {
                raster,
                dest,
                opacity,
                ..
            } => {
                // Scale to the whole destination, then draw only what is on the canvas.
                let visible = dest.clip(self.width, self.height);
                if visible.is_empty() {
                    return;
                }
                match resize_rgba(&raster.pixels, raster.width, raster.height, dest.width, dest.height)
                {
                    Ok(scaled) => self.blit(*dest, visible, &scaled, *opacity),
                    Err(e) => warn!("Could not scale page {}: {e}", raster.index),
                }
            }
            DrawOp::Placeholder {
                slot,
                rect,
                color,
                opacity,
                label,
                ..
            } => {
                self.fill(*rect, *color, *opacity);
                self.overlays.push(TextOverlay {
                    slot: *slot,
                    text: label.clone(),
                    area: *rect,
                    color: Rgb::WHITE,
                });
            }
            DrawOp::Text {
                slot,
                text,
                area,
                color,
            } => self.overlays.push(TextOverlay {
                slot: *slot,
                text: text.clone(),
                area: *area,
                color: *color,
            }),
        }
    }

    fn fill(&mut self, rect: Rect, color: Rgb, opacity: f32) {
        let rect = rect.clip(self.width, self.height);
        if rect.is_empty() {
            return;
        }
        let src = color.to_rgba();
        let alpha = opacity.clamp(0.0, 1.0);
        let stride = self.width as usize * 4;
        self.pixels
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(y, row)| {
                let y = y as u32;
                if y < rect.y || y >= rect.bottom() {
                    return;
                }
                let row = &mut row[rect.x as usize * 4..rect.right() as usize * 4];
                for dst in row.chunks_exact_mut(4) {
                    blend_pixel(dst, &src, alpha);
                }
            });
    }

    /// Composite the `visible` part of a `dest`-sized RGBA buffer, source-over
    fn blit(&mut self, dest: Rect, visible: Rect, src: &[u8], opacity: f32) {
        let alpha = opacity.clamp(0.0, 1.0);
        let stride = self.width as usize * 4;
        let src_stride = dest.width as usize * 4;
        let src_x = (visible.x - dest.x) as usize * 4;
        let span = visible.width as usize * 4;
        self.pixels
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(y, row)| {
                let y = y as u32;
                if y < visible.y || y >= visible.bottom() {
                    return;
                }
                let src_row = &src[(y - dest.y) as usize * src_stride + src_x..][..span];
                let row = &mut row[visible.x as usize * 4..visible.right() as usize * 4];
                for (dst, px) in row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
                    let a = alpha * f32::from(px[3]) / 255.0;
                    blend_pixel(dst, px, a);
                }
            });
    }
}

#[inline]
fn blend_pixel(dst: &mut [u8], src: &[u8], alpha: f32) {
    if alpha >= 1.0 {
        dst[..3].copy_from_slice(&src[..3]);
    } else if alpha > 0.0 {
        for c in 0..3 {
            let value = f32::from(src[c]) * alpha + f32::from(dst[c]) * (1.0 - alpha);
            dst[c] = value.round().clamp(0.0, 255.0) as u8;
        }
    }
    dst[3] = 0xFF;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::deck::{Rasterization, Resolution};

    fn solid(page: usize, w: u32, h: u32, rgb: [u8; 3]) -> Arc<Rasterization> {
        let pixels = [rgb[0], rgb[1], rgb[2], 255].repeat(w as usize * h as usize);
        Arc::new(Rasterization::from_rgba(page, Resolution::new(w, h), w, h, pixels).unwrap())
    }

    #[test]
    fn fill_clears_and_clips() {
        let mut list = DrawList::new(4, 4, Rgb::BLACK);
        list.push(DrawOp::Fill {
            rect: Rect::new(2, 2, 10, 10),
            color: Rgb::new(255, 0, 0),
        });
        let canvas = Canvas::render(&list);
        assert_eq!(canvas.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(canvas.pixel(3, 3), [255, 0, 0, 255]);
    }

    #[test]
    fn stacked_images_blend_to_weighted_sum() {
        let mut list = DrawList::new(2, 2, Rgb::BLACK);
        let dest = Rect::new(0, 0, 2, 2);
        list.push(DrawOp::Image {
            slot: Slot::Slide,
            raster: solid(0, 2, 2, [200, 0, 0]),
            dest,
            opacity: 1.0,
        });
        list.push(DrawOp::Image {
            slot: Slot::Slide,
            raster: solid(1, 2, 2, [0, 0, 200]),
            dest,
            opacity: 0.25,
        });
        let px = Canvas::render(&list).pixel(1, 1);
        assert_eq!(px, [150, 0, 50, 255]);
    }

    #[test]
    fn images_are_scaled_to_destination() {
        let mut list = DrawList::new(8, 8, Rgb::BLACK);
        list.push(DrawOp::Image {
            slot: Slot::Slide,
            raster: solid(0, 2, 2, [10, 200, 10]),
            dest: Rect::new(2, 2, 4, 4),
            opacity: 1.0,
        });
        let canvas = Canvas::render(&list);
        assert_eq!(canvas.pixel(1, 1), [0, 0, 0, 255]);
        let px = canvas.pixel(3, 3);
        assert!(px[1].abs_diff(200) <= 1);
    }

    #[test]
    fn image_past_the_edge_is_cropped_not_squeezed() {
        let pixels = [[255, 0, 0, 255], [255, 0, 0, 255], [0, 0, 255, 255], [0, 0, 255, 255]]
            .concat();
        let raster =
            Arc::new(Rasterization::from_rgba(0, Resolution::new(4, 1), 4, 1, pixels).unwrap());

        // Twice as wide as the canvas: only the red left half fits.
        let mut list = DrawList::new(8, 2, Rgb::BLACK);
        list.push(DrawOp::Image {
            slot: Slot::Slide,
            raster,
            dest: Rect::new(0, 0, 16, 2),
            opacity: 1.0,
        });
        let canvas = Canvas::render(&list);
        for x in [0, 5] {
            let px = canvas.pixel(x, 1);
            assert!(px[0] >= 250 && px[2] <= 5, "pixel {x} is {px:?}");
        }
    }

    #[test]
    fn text_and_placeholder_labels_become_overlays() {
        let mut list = DrawList::new(10, 10, Rgb::BLACK);
        list.push(DrawOp::Placeholder {
            slot: Slot::Thumbnail,
            page: None,
            rect: Rect::new(0, 0, 5, 5),
            color: Rgb::new(40, 40, 40),
            opacity: 1.0,
            label: "End of deck".to_string(),
        });
        list.push(DrawOp::Text {
            slot: Slot::Timer,
            text: "04:59".to_string(),
            area: Rect::new(0, 5, 10, 5),
            color: Rgb::WHITE,
        });
        let canvas = Canvas::render(&list);
        assert_eq!(canvas.pixel(0, 0), [40, 40, 40, 255]);
        let texts: Vec<_> = canvas.overlays.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, vec!["End of deck", "04:59"]);
    }
}
