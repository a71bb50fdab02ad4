//! PDF decks rendered with MuPDF

use std::path::{Path, PathBuf};

use log::debug;
use mupdf::{Colorspace, Document, Matrix};

use super::{Deck, DeckSource, Rasterization, Rasterizer, Resolution, fit_within};
use crate::error::{RasterError, ShowError};

pub struct MupdfSource {
    path: PathBuf,
}

impl MupdfSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn open_document(path: &Path) -> Result<Document, mupdf::error::Error> {
        Document::open(path.to_string_lossy().as_ref())
    }
}

impl DeckSource for MupdfSource {
    fn describe(&self) -> Result<Deck, ShowError> {
        let doc = Self::open_document(&self.path).map_err(|e| ShowError::load(&self.path, e))?;
        let page_count = doc
            .page_count()
            .map_err(|e| ShowError::load(&self.path, e))? as usize;

        let mut sizes = Vec::with_capacity(page_count);
        for index in 0..page_count {
            let page = doc
                .load_page(index as i32)
                .map_err(|e| ShowError::load(&self.path, e))?;
            let bounds = page.bounds().map_err(|e| ShowError::load(&self.path, e))?;
            sizes.push((bounds.x1 - bounds.x0, bounds.y1 - bounds.y0));
        }

        let title = doc
            .metadata(mupdf::MetadataName::Title)
            .ok()
            .filter(|t| !t.is_empty());

        debug!("Opened {} with {page_count} pages", self.path.display());
        Ok(Deck::new(sizes, title))
    }

    fn open(&self) -> Result<Box<dyn Rasterizer>, RasterError> {
        let doc = Self::open_document(&self.path)?;
        Ok(Box::new(MupdfRasterizer { doc }))
    }
}

struct MupdfRasterizer {
    doc: Document,
}

impl Rasterizer for MupdfRasterizer {
    fn rasterize(&mut self, page_num: usize, target: Resolution) -> Result<Rasterization, RasterError> {
        let page = self.doc.load_page(page_num as i32)?;
        let bounds = page.bounds()?;
        let (page_width, page_height) = (bounds.x1 - bounds.x0, bounds.y1 - bounds.y0);
        if page_width <= 0.0 || page_height <= 0.0 {
            return Err(RasterError::generic(format!("page {page_num} has no area")));
        }

        let (fit_w, _) = fit_within(page_width / page_height, target);
        if fit_w == 0 {
            return Err(RasterError::generic(format!("cannot fit page into {target}")));
        }
        let mag = fit_w as f32 / page_width;

        let rgb = Colorspace::device_rgb();
        let pixmap = page.to_pixmap(&Matrix::new_scale(mag, mag), &rgb, false, false)?;

        // MuPDF rounds outward; never hand back more than the box allows.
        let width = pixmap.width().min(target.width);
        let height = pixmap.height().min(target.height);

        Rasterization::from_rgb_rows(
            page_num,
            target,
            width,
            height,
            pixmap.stride() as usize,
            pixmap.n() as usize,
            pixmap.samples(),
        )
    }
}
