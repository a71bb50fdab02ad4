//! A directory of images presented as a deck

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::{Deck, DeckSource, Rasterization, Rasterizer, Resolution, fit_within, resize_rgba};
use crate::error::{RasterError, ShowError};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Image files of a directory in file-name order
pub fn sorted_image_paths(dir: &Path) -> Result<Vec<PathBuf>, ShowError> {
    let entries = fs::read_dir(dir).map_err(|e| ShowError::load(dir, e))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ShowError::load(dir, e))?.path();
        if !path.is_file() {
            continue;
        }
        let is_image = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()));
        if is_image {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    if paths.is_empty() {
        return Err(ShowError::load(dir, "no image files found"));
    }
    Ok(paths)
}

pub struct ImageDirSource {
    dir: PathBuf,
    paths: Vec<PathBuf>,
}

impl ImageDirSource {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ShowError> {
        let dir = dir.into();
        let paths = sorted_image_paths(&dir)?;
        debug!("Found {} images in {}", paths.len(), dir.display());
        Ok(Self { dir, paths })
    }
}

impl DeckSource for ImageDirSource {
    fn describe(&self) -> Result<Deck, ShowError> {
        let mut sizes = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            match image::image_dimensions(path) {
                Ok((w, h)) => sizes.push((w as f32, h as f32)),
                Err(e) => {
                    // Keep the slot so indices stay stable; the page will fail to rasterize.
                    warn!("Cannot read dimensions of {}: {e}", path.display());
                    sizes.push((4.0, 3.0));
                }
            }
        }
        let title = self
            .dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Ok(Deck::new(sizes, title))
    }

    fn open(&self) -> Result<Box<dyn Rasterizer>, RasterError> {
        Ok(Box::new(ImageDirRasterizer {
            paths: self.paths.clone(),
        }))
    }
}

struct ImageDirRasterizer {
    paths: Vec<PathBuf>,
}

impl Rasterizer for ImageDirRasterizer {
    fn rasterize(&mut self, page: usize, target: Resolution) -> Result<Rasterization, RasterError> {
        let path = self
            .paths
            .get(page)
            .ok_or_else(|| RasterError::generic(format!("no image for page {page}")))?;

        let rgba = image::open(path)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        let (fit_w, fit_h) = fit_within(width as f32 / height.max(1) as f32, target);
        if fit_w == 0 || fit_h == 0 {
            return Err(RasterError::generic(format!("cannot fit page into {target}")));
        }

        let pixels = resize_rgba(rgba.as_raw(), width, height, fit_w, fit_h)?;
        Rasterization::from_rgba(page, target, fit_w, fit_h, pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn write_png(dir: &Path, name: &str, w: u32, h: u32, color: [u8; 4]) {
        let img = ImageBuffer::from_pixel(w, h, Rgba(color));
        img.save(dir.join(name)).unwrap();
    }

    #[test]
    fn images_are_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "b.png", 4, 3, [0, 0, 255, 255]);
        write_png(dir.path(), "a.png", 4, 3, [255, 0, 0, 255]);
        fs::write(dir.path().join("notes.txt"), "not a slide").unwrap();

        let paths = sorted_image_paths(dir.path()).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.png", "b.png"]);
    }

    #[test]
    fn empty_directory_is_a_load_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = ImageDirSource::open(dir.path()).err().unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn rasterize_fits_inside_target() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "slide.png", 40, 30, [255, 0, 0, 255]);

        let source = ImageDirSource::open(dir.path()).unwrap();
        let deck = source.describe().unwrap();
        assert_eq!(deck.len(), 1);

        let mut rasterizer = source.open().unwrap();
        let raster = rasterizer.rasterize(0, Resolution::new(80, 80)).unwrap();
        assert_eq!((raster.width, raster.height), (80, 60));
        assert_eq!(raster.resolution, Resolution::new(80, 80));
        assert_eq!(raster.pixel(40, 30)[0], 255);
    }
}
