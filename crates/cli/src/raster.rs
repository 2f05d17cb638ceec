//! Flat PNG rendering for headless use
//!
//! Pages are drawn as their background: the background page's bitmap scaled
//! to fit when there is one, the page's background color otherwise. Drawing
//! content is not interpreted.

use folio_core::{FolioError, FolioResult, RasterJob, Rasterizer};
use folio_model::Color;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

#[derive(Debug, Clone, Copy, Default)]
pub struct PngRasterizer;

impl Rasterizer for PngRasterizer {
    fn rasterize(&mut self, job: &RasterJob<'_>) -> FolioResult<()> {
        let (width, height) = job.pixel_size();
        let fill = job.page.background_color.unwrap_or(Color::WHITE);
        let mut canvas = RgbaImage::from_pixel(width, height, Rgba([fill.r, fill.g, fill.b, fill.a]));

        if let Some(background) = job.background {
            let layer = image::open(background).map_err(raster_error)?.to_rgba8();
            let layer = imageops::resize(&layer, width, height, FilterType::Triangle);
            imageops::overlay(&mut canvas, &layer, 0, 0);
        }

        canvas.save(job.output).map_err(raster_error)?;
        tracing::trace!(page = %job.page.id, width, height, "page rasterized");
        Ok(())
    }
}

fn raster_error(error: image::ImageError) -> FolioError {
    FolioError::Rasterize(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_model::{PageId, PageMeta, PageSize};

    #[test]
    fn draws_background_color_at_scaled_size() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("page.png");
        let mut meta = PageMeta::new(PageId::new(), "red", PageSize::new(400, 200));
        meta.background_color = Some(Color::rgba(255, 0, 0, 255));

        PngRasterizer
            .rasterize(&RasterJob { page: &meta, content: "", background: None, scale: 0.5, output: &output })
            .unwrap();

        let image = image::open(&output).unwrap().to_rgba8();
        assert_eq!(image.dimensions(), (200, 100));
        assert_eq!(image.get_pixel(10, 10), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn background_bitmap_is_scaled_over_the_fill() {
        let dir = tempfile::tempdir().unwrap();
        let background = dir.path().join("background.png");
        RgbaImage::from_pixel(8, 8, Rgba([0, 0, 255, 255])).save(&background).unwrap();

        let output = dir.path().join("page.png");
        let meta = PageMeta::new(PageId::new(), "blue", PageSize::new(32, 32));
        PngRasterizer
            .rasterize(&RasterJob {
                page: &meta,
                content: "",
                background: Some(&background),
                scale: 1.0,
                output: &output,
            })
            .unwrap();

        let image = image::open(&output).unwrap().to_rgba8();
        assert_eq!(image.get_pixel(16, 16), &Rgba([0, 0, 255, 255]));
    }
}
