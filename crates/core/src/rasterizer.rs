//! Page rasterization seam
//!
//! Drawing a page to an image is left to the embedding application; the
//! session only decides when and at what scale.

use crate::error::FolioResult;
use folio_model::PageMeta;
use std::path::Path;

/// One page to draw into a PNG file.
#[derive(Debug, Clone, Copy)]
pub struct RasterJob<'a> {
    pub page: &'a PageMeta,
    /// Serialized drawing content of the page
    pub content: &'a str,
    /// Composed bitmap of the page's background page, if it has one
    pub background: Option<&'a Path>,
    pub scale: f64,
    pub output: &'a Path,
}

impl RasterJob<'_> {
    /// Output size in pixels, never smaller than 1×1.
    pub fn pixel_size(&self) -> (u32, u32) {
        let scaled = |value: u32| ((f64::from(value) * self.scale).round() as u32).max(1);
        (scaled(self.page.width), scaled(self.page.height))
    }
}

pub trait Rasterizer {
    fn rasterize(&mut self, job: &RasterJob<'_>) -> FolioResult<()>;
}

/// Rasterizer that draws nothing. Thumbnails and bitmaps are never created.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRasterizer;

impl Rasterizer for NoopRasterizer {
    fn rasterize(&mut self, _job: &RasterJob<'_>) -> FolioResult<()> {
        Ok(())
    }
}

/// Scale that fits the longer side of a `width`×`height` page into `size`.
pub fn thumbnail_scale(width: u32, height: u32, size: u32) -> f64 {
    let longest = width.max(height).max(1);
    f64::from(size) / f64::from(longest)
}
