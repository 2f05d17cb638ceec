#![allow(dead_code)]

use folio_canvas::{CanvasPool, MemoryCanvas};
use folio_core::{FolioResult, RasterJob, Rasterizer, Session, SessionConfig};
use folio_model::PageId;
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub page: PageId,
    pub scale: f64,
    pub output: PathBuf,
    pub background: Option<PathBuf>,
    pub content: String,
}

/// Writes a placeholder file for every job and remembers what it was asked.
#[derive(Debug, Clone, Default)]
pub struct RecordingRasterizer {
    pub jobs: Rc<RefCell<Vec<Recorded>>>,
}

impl RecordingRasterizer {
    pub fn thumbnails_for(&self, page: PageId) -> usize {
        self.jobs
            .borrow()
            .iter()
            .filter(|job| job.page == page && job.scale < 1.0)
            .count()
    }
}

impl Rasterizer for RecordingRasterizer {
    fn rasterize(&mut self, job: &RasterJob<'_>) -> FolioResult<()> {
        fs::write(job.output, format!("raster:{}", job.page.id))?;
        self.jobs.borrow_mut().push(Recorded {
            page: job.page.id,
            scale: job.scale,
            output: job.output.to_path_buf(),
            background: job.background.map(|path| path.to_path_buf()),
            content: job.content.to_owned(),
        });
        Ok(())
    }
}

pub fn session(capacity: usize) -> (Session<MemoryCanvas>, RecordingRasterizer) {
    session_with(capacity, SessionConfig::default())
}

pub fn session_with(capacity: usize, config: SessionConfig) -> (Session<MemoryCanvas>, RecordingRasterizer) {
    let rasterizer = RecordingRasterizer::default();
    let pool = CanvasPool::with_capacity(capacity, MemoryCanvas::new).expect("pool");
    let session = Session::new(pool, Box::new(rasterizer.clone()), config).expect("session");
    (session, rasterizer)
}
