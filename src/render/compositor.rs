//! Builds per-window draw lists from a navigation snapshot

use std::collections::HashMap;

use crate::animation::stacking_opacities;
use crate::cache::{CacheKey, Lookup};
use crate::display::WindowRole;
use crate::navigation::NavSnapshot;

use super::layout::{WindowLayout, fit_rect};
use super::{DrawList, DrawOp, Rect, Rgb, Slot};

/// Cache lookups resolved for one frame, keyed by page and resolution
pub type Resources = HashMap<CacheKey, Lookup>;

/// Colours used by the compositor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Style {
    pub background: Rgb,
    pub placeholder: Rgb,
    pub timer: Rgb,
    pub overtime: Rgb,
    pub label: Rgb,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            background: Rgb::BLACK,
            placeholder: Rgb::new(0x2B, 0x30, 0x3B),
            timer: Rgb::new(0xC0, 0xC5, 0xCE),
            overtime: Rgb::new(0xEC, 0x5F, 0x67),
            label: Rgb::WHITE,
        }
    }
}

/// Stateless apart from its style; both windows share one instance
#[derive(Clone, Debug, Default)]
pub struct Compositor {
    style: Style,
}

impl Compositor {
    #[must_use]
    pub fn new(style: Style) -> Self {
        Self { style }
    }

    #[must_use]
    pub fn style(&self) -> &Style {
        &self.style
    }

    /// Bitmaps this window wants for `snapshot`, in drawing order
    #[must_use]
    pub fn requirements(&self, snapshot: &NavSnapshot, layout: &WindowLayout) -> Vec<CacheKey> {
        let mut keys = Vec::new();
        let slide_res = layout.slide_resolution();
        if !slide_res.is_empty() {
            keys.extend(
                snapshot
                    .visible_layers()
                    .iter()
                    .map(|layer| CacheKey::new(layer.page, slide_res)),
            );
        }
        if layout.role == WindowRole::Presenter
            && let (Some(next), Some(res)) = (snapshot.next_index(), layout.thumbnail_resolution())
            && !res.is_empty()
        {
            keys.push(CacheKey::new(next, res));
        }
        keys
    }

    /// Draw one window. Missing bitmaps become placeholders; this never
    /// waits on the cache.
    #[must_use]
    pub fn compose(
        &self,
        snapshot: &NavSnapshot,
        layout: &WindowLayout,
        resources: &Resources,
        frame_no: u64,
    ) -> DrawList {
        let mut list = DrawList::new(layout.size.width, layout.size.height, self.style.background);
        if layout.slide.is_empty() {
            return list;
        }

        self.compose_slide(&mut list, snapshot, layout, resources, frame_no);

        if layout.role == WindowRole::Presenter {
            self.compose_thumbnail(&mut list, snapshot, layout, resources, frame_no);
            self.compose_footer(&mut list, snapshot, layout);
        }
        list
    }

    fn compose_slide(
        &self,
        list: &mut DrawList,
        snapshot: &NavSnapshot,
        layout: &WindowLayout,
        resources: &Resources,
        frame_no: u64,
    ) {
        list.push(DrawOp::Fill {
            rect: layout.slide,
            color: self.style.background,
        });

        let layers = snapshot.visible_layers();
        if layers.is_empty() {
            list.push(self.placeholder(Slot::Slide, None, layout.slide, 1.0, "No slides"));
            return;
        }

        let resolution = layout.slide_resolution();
        for (layer, opacity) in layers.iter().zip(stacking_opacities(&layers)) {
            if opacity <= 0.0 {
                continue;
            }
            let key = CacheKey::new(layer.page, resolution);
            list.push(self.page_op(Slot::Slide, key, layout.slide, opacity, resources, frame_no));
        }
    }

    fn compose_thumbnail(
        &self,
        list: &mut DrawList,
        snapshot: &NavSnapshot,
        layout: &WindowLayout,
        resources: &Resources,
        frame_no: u64,
    ) {
        let (Some(rect), Some(resolution)) = (layout.thumbnail, layout.thumbnail_resolution()) else {
            return;
        };
        if rect.is_empty() {
            return;
        }
        match snapshot.next_index() {
            Some(next) => {
                let key = CacheKey::new(next, resolution);
                list.push(self.page_op(Slot::Thumbnail, key, rect, 1.0, resources, frame_no));
            }
            None => list.push(self.placeholder(Slot::Thumbnail, None, rect, 1.0, "End of deck")),
        }
    }

    fn compose_footer(&self, list: &mut DrawList, snapshot: &NavSnapshot, layout: &WindowLayout) {
        if let Some(area) = layout.timer {
            let (text, color) = match &snapshot.countdown {
                Some(countdown) if countdown.expired => (countdown.text.clone(), self.style.overtime),
                Some(countdown) => (countdown.text.clone(), self.style.timer),
                None => ("--:--".to_string(), self.style.timer),
            };
            list.push(DrawOp::Text {
                slot: Slot::Timer,
                text,
                area,
                color,
            });
        }

        if let Some(area) = layout.counter {
            let shown = if snapshot.page_count == 0 {
                0
            } else {
                snapshot.target_index + 1
            };
            list.push(DrawOp::Text {
                slot: Slot::Counter,
                text: format!("{shown} / {}", snapshot.page_count),
                area,
                color: self.style.timer,
            });
        }
    }

    fn page_op(
        &self,
        slot: Slot,
        key: CacheKey,
        area: Rect,
        opacity: f32,
        resources: &Resources,
        frame_no: u64,
    ) -> DrawOp {
        match resources.get(&key) {
            Some(Lookup::Ready(raster)) => {
                let aspect = raster.width as f32 / raster.height.max(1) as f32;
                DrawOp::Image {
                    slot,
                    raster: raster.clone(),
                    dest: fit_rect(aspect, area),
                    opacity,
                }
            }
            Some(Lookup::Unavailable) => {
                let label = format!("Page {} unavailable", key.page + 1);
                self.placeholder(slot, Some(key.page), area, opacity, &label)
            }
            Some(Lookup::Pending) | None => {
                let dots = ".".repeat((frame_no % 4) as usize);
                let label = format!("Rasterizing{dots}");
                self.placeholder(slot, Some(key.page), area, opacity, &label)
            }
        }
    }

    fn placeholder(
        &self,
        slot: Slot,
        page: Option<usize>,
        rect: Rect,
        opacity: f32,
        label: &str,
    ) -> DrawOp {
        DrawOp::Placeholder {
            slot,
            page,
            rect,
            color: self.style.placeholder,
            opacity,
            label: label.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::animation::Animation;
    use crate::deck::{Rasterization, Resolution};
    use crate::display::Size;
    use crate::navigation::{CountdownDisplay, Layer};

    fn snapshot(current: usize, count: usize) -> NavSnapshot {
        NavSnapshot {
            page_count: count,
            current_index: current,
            target_index: current,
            animation: None,
            countdown: None,
        }
    }

    fn ready(page: usize, resolution: Resolution) -> Lookup {
        let (w, h) = (resolution.width, resolution.height);
        let pixels = vec![0x80; w as usize * h as usize * 4];
        Lookup::Ready(Arc::new(
            Rasterization::from_rgba(page, resolution, w, h, pixels).unwrap(),
        ))
    }

    fn presenter() -> WindowLayout {
        WindowLayout::for_role(WindowRole::Presenter, Size::new(200, 121), 4.0 / 3.0, 0.38)
    }

    #[test]
    fn audience_shows_only_the_slide() {
        let layout =
            WindowLayout::for_role(WindowRole::Audience, Size::new(160, 120), 4.0 / 3.0, 0.38);
        let res = layout.slide_resolution();
        let mut resources = Resources::new();
        resources.insert(CacheKey::new(2, res), ready(2, res));

        let list = Compositor::default().compose(&snapshot(2, 5), &layout, &resources, 0);
        assert_eq!(list.images_in(Slot::Slide), vec![(2, 1.0)]);
        assert!(list.pages_in(Slot::Thumbnail).is_empty());
        assert!(list.text_in(Slot::Timer).is_none());
    }

    #[test]
    fn missing_bitmaps_become_placeholders() {
        let layout = presenter();
        let mut resources = Resources::new();
        resources.insert(CacheKey::new(1, layout.slide_resolution()), Lookup::Unavailable);

        let list = Compositor::default().compose(&snapshot(1, 5), &layout, &resources, 2);
        assert_eq!(list.placeholders_in(Slot::Slide), vec!["Page 2 unavailable"]);
        assert_eq!(list.placeholders_in(Slot::Thumbnail), vec!["Rasterizing.."]);
        assert_eq!(list.pages_in(Slot::Thumbnail), vec![2]);
    }

    #[test]
    fn last_slide_thumbnail_is_end_of_deck() {
        let layout = presenter();
        let list = Compositor::default().compose(&snapshot(4, 5), &layout, &Resources::new(), 0);
        assert_eq!(list.placeholders_in(Slot::Thumbnail), vec!["End of deck"]);
        assert_eq!(list.text_in(Slot::Counter).map(|(t, _)| t), Some("5 / 5"));
    }

    #[test]
    fn expired_countdown_uses_overtime_colour() {
        let style = Style::default();
        let mut snap = snapshot(0, 3);
        snap.countdown = Some(CountdownDisplay {
            text: "00:00".to_string(),
            expired: true,
            running: true,
        });
        let list = Compositor::new(style).compose(&snap, &presenter(), &Resources::new(), 0);
        assert_eq!(list.text_in(Slot::Timer), Some(("00:00", style.overtime)));
    }

    #[test]
    fn dissolve_requires_both_pages_and_stacks_them() {
        let layout =
            WindowLayout::for_role(WindowRole::Audience, Size::new(160, 120), 4.0 / 3.0, 0.38);
        let res = layout.slide_resolution();
        let mut snap = snapshot(0, 5);
        snap.target_index = 1;
        snap.animation = Some(Animation {
            from: vec![Layer::solid(0)],
            to_index: 1,
            progress: 0.25,
        });

        let compositor = Compositor::default();
        assert_eq!(
            compositor.requirements(&snap, &layout),
            vec![CacheKey::new(0, res), CacheKey::new(1, res)]
        );

        let mut resources = Resources::new();
        resources.insert(CacheKey::new(0, res), ready(0, res));
        resources.insert(CacheKey::new(1, res), ready(1, res));
        let images = compositor.compose(&snap, &layout, &resources, 0).images_in(Slot::Slide);
        assert_eq!(images.len(), 2);
        assert!((images[0].1 - 1.0).abs() < 1e-6);
        assert!((images[1].1 - 0.25).abs() < 1e-6);
    }

    #[test]
    fn presenter_requires_the_next_slide_thumbnail() {
        let layout = presenter();
        let keys = Compositor::default().requirements(&snapshot(1, 5), &layout);
        let thumb = layout.thumbnail_resolution().unwrap();
        assert!(keys.contains(&CacheKey::new(2, thumb)));
    }
}
