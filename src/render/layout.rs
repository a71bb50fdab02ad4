//! Window geometry for the two roles

use crate::deck::{Resolution, fit_within};
use crate::display::{Size, WindowRole};

use super::Rect;

/// Presenter upper band is `height / PRESENTER_BAND_DIVISOR`
const PRESENTER_BAND_DIVISOR: f32 = 1.21;
/// Gap between the presenter's slide and thumbnail
const GUTTER: u32 = 4;

/// Largest rect of the given aspect centred in `area`
#[must_use]
pub fn fit_rect(aspect: f32, area: Rect) -> Rect {
    let (width, height) = fit_within(aspect, Resolution::new(area.width, area.height));
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

/// Where things go in one window
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowLayout {
    pub role: WindowRole,
    pub size: Size,
    pub slide: Rect,
    pub thumbnail: Option<Rect>,
    pub timer: Option<Rect>,
    pub counter: Option<Rect>,
}

impl WindowLayout {
    /// Lay out a window of `size` for slides of the given aspect
    #[must_use]
    pub fn for_role(role: WindowRole, size: Size, aspect: f32, thumbnail_ratio: f32) -> Self {
        let whole = Rect::new(0, 0, size.width, size.height);
        match role {
            WindowRole::Audience => Self {
                role,
                size,
                slide: fit_rect(aspect, whole),
                thumbnail: None,
                timer: None,
                counter: None,
            },
            WindowRole::Presenter => {
                let band = ((size.height as f32 / PRESENTER_BAND_DIVISOR).round() as u32)
                    .min(size.height);
                let ratio = thumbnail_ratio.clamp(0.1, 0.9);
                let thumb_width = (size.width as f32 * ratio).round() as u32;
                let main_width = size.width.saturating_sub(thumb_width + GUTTER);

                let main = Rect::new(0, 0, main_width, band);
                let side = Rect::new(size.width - thumb_width, 0, thumb_width, band);
                let lower = Rect::new(0, band, size.width, size.height - band);
                let half = lower.width / 2;

                Self {
                    role,
                    size,
                    slide: fit_rect(aspect, main),
                    thumbnail: Some(fit_rect(aspect, side)),
                    timer: Some(Rect::new(lower.x, lower.y, half, lower.height)),
                    counter: Some(Rect::new(
                        lower.x + half,
                        lower.y,
                        lower.width - half,
                        lower.height,
                    )),
                }
            }
        }
    }

    /// Resolution the main slide is rasterized at
    #[must_use]
    pub fn slide_resolution(&self) -> Resolution {
        Resolution::new(self.slide.width, self.slide.height)
    }

    #[must_use]
    pub fn thumbnail_resolution(&self) -> Option<Resolution> {
        self.thumbnail
            .map(|rect| Resolution::new(rect.width, rect.height))
    }

    /// Every non-empty resolution this window rasterizes at
    #[must_use]
    pub fn resolutions(&self) -> Vec<Resolution> {
        let mut out = Vec::with_capacity(2);
        for resolution in std::iter::once(self.slide_resolution()).chain(self.thumbnail_resolution())
        {
            if !resolution.is_empty() && !out.contains(&resolution) {
                out.push(resolution);
            }
        }
        out
    }
}
