//! Materialization of pages onto pooled canvases
//!
//! At most one page per pooled canvas is materialized. When the pool is
//! empty the least recently used materialized page is flushed to its page
//! file and gives up its canvas.

use crate::error::{FolioError, FolioResult};
use crate::page_store::PageStore;
use crate::serializer::{self, ContentSource};
use folio_canvas::{Canvas, CanvasId, CanvasPool, PoolStats};
use folio_model::PageId;

pub struct SwapManager<C> {
    pool: CanvasPool<C>,
    clock: u64,
    active: Option<PageId>,
}

impl<C: Canvas> SwapManager<C> {
    pub fn new(pool: CanvasPool<C>) -> Self {
        Self { pool, clock: 0, active: None }
    }

    pub fn pool(&self) -> &CanvasPool<C> {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut CanvasPool<C> {
        &mut self.pool
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn active(&self) -> Option<PageId> {
        self.active
    }

    /// Forget the active page without touching its canvas.
    pub fn clear_active(&mut self) {
        self.active = None;
    }

    /// Make `id` the visible page, materializing it if needed.
    ///
    /// Does nothing when `id` is already the active page.
    pub fn activate(&mut self, store: &mut PageStore, id: PageId) -> FolioResult<CanvasId> {
        if self.active == Some(id) {
            if let Some(canvas) = store.get(id)?.canvas {
                return Ok(canvas);
            }
        }

        let canvas = self.ensure_materialized(store, id, None)?;
        self.pool.show(canvas)?;

        let page = store.get(id)?;
        let (width, height) = (page.meta.width, page.meta.height);
        if let Some(surface) = self.pool.get_mut(canvas) {
            surface.set_size(width, height);
        }

        self.touch(store, id)?;
        self.active = Some(id);
        tracing::debug!(page = %id, %canvas, "page activated");
        Ok(canvas)
    }

    /// Stamp the page as used now.
    pub fn touch(&mut self, store: &mut PageStore, id: PageId) -> FolioResult<()> {
        self.clock += 1;
        store.get_mut(id)?.last_used = Some(self.clock);
        Ok(())
    }

    /// Give `id` a canvas, evicting the least recently used page if the pool
    /// is empty. `exclude` is never chosen as the victim.
    pub fn ensure_materialized(
        &mut self,
        store: &mut PageStore,
        id: PageId,
        exclude: Option<PageId>,
    ) -> FolioResult<CanvasId> {
        if let Some(canvas) = store.get(id)?.canvas {
            return Ok(canvas);
        }

        if !self.pool.available() {
            let victim = self.victim(store, id, exclude).ok_or_else(|| {
                FolioError::InvalidPoolState(format!(
                    "no materialized page can give up its canvas for {id}"
                ))
            })?;
            tracing::debug!(page = %id, %victim, "evicting least recently used page");
            self.swap_out(store, victim)?;
        }

        let canvas = self.pool.obtain()?;
        if let Err(error) = self.swap_in(store, id, canvas) {
            // The page never took ownership; hand the canvas back.
            if store.find(id).and_then(|page| page.canvas) != Some(canvas) {
                self.pool.release(canvas)?;
            }
            return Err(error);
        }
        Ok(canvas)
    }

    /// Whether `id` already has a canvas or can get one without evicting
    /// `exclude`.
    pub fn can_materialize(&self, store: &PageStore, id: PageId, exclude: Option<PageId>) -> bool {
        store.find(id).is_some_and(|page| page.is_materialized())
            || self.pool.available()
            || self.victim(store, id, exclude).is_some()
    }

    /// Least recently used materialized page other than `id` and `exclude`.
    ///
    /// Unstamped pages count as oldest; ties go to the earlier page in
    /// document order.
    pub fn victim(&self, store: &PageStore, id: PageId, exclude: Option<PageId>) -> Option<PageId> {
        store
            .pages()
            .filter(|page| page.is_materialized())
            .filter(|page| page.id() != id && Some(page.id()) != exclude)
            .min_by_key(|page| page.last_used)
            .map(|page| page.id())
    }

    /// Flush a materialized page and return its canvas to the pool.
    pub fn swap_out(&mut self, store: &mut PageStore, id: PageId) -> FolioResult<()> {
        let canvas = store
            .get(id)?
            .canvas
            .ok_or_else(|| FolioError::InvalidState(format!("page {id} is not materialized")))?;

        self.flush(store, id)?;
        self.pool.release(canvas)?;

        let page = store.get_mut(id)?;
        page.canvas = None;
        page.last_used = None;

        if self.active == Some(id) {
            self.active = None;
        }
        tracing::debug!(page = %id, %canvas, "page swapped out");
        Ok(())
    }

    /// Load a page's file onto `canvas`.
    ///
    /// The first time a page is swapped in after loading, it is fully
    /// redrawn and its content reloaded once more. Returns `true` in that
    /// case.
    pub fn swap_in(&mut self, store: &mut PageStore, id: PageId, canvas: CanvasId) -> FolioResult<bool> {
        let page = store.get(id)?;
        if page.canvas.is_some() {
            return Err(FolioError::InvalidState(format!("page {id} is already materialized")));
        }

        let document = serializer::read_page_file(&page.temp_file_path)?;
        let (width, height) = (page.meta.width, page.meta.height);
        let first_since_load = !page.invalidated_after_load;

        let surface = self
            .pool
            .get_mut(canvas)
            .ok_or_else(|| FolioError::InvalidPoolState(format!("unknown {canvas}")))?;
        surface.clear();
        surface.append_content(&document.content);
        surface.set_size(width, height);

        if first_since_load {
            surface.invalidate_all();
            surface.clear();
            surface.append_content(&document.content);
        }

        self.pool.attach(canvas, id)?;
        let page = store.get_mut(id)?;
        page.canvas = Some(canvas);
        page.invalidated_after_load = true;

        tracing::debug!(page = %id, %canvas, "page swapped in");
        Ok(first_since_load)
    }

    /// Write a materialized page's canvas content to its page file.
    pub fn flush(&self, store: &PageStore, id: PageId) -> FolioResult<()> {
        let page = store.get(id)?;
        let canvas = page
            .canvas
            .ok_or_else(|| FolioError::InvalidState(format!("page {id} is not materialized")))?;
        let surface = self
            .pool
            .get(canvas)
            .ok_or_else(|| FolioError::InvalidPoolState(format!("unknown {canvas}")))?;

        serializer::flush_to_disk(&page.meta, ContentSource::Canvas(surface), &page.temp_file_path)
    }

    /// Flush every materialized page in document order.
    pub fn flush_all(&self, store: &PageStore) -> FolioResult<()> {
        for id in self.materialized(store) {
            self.flush(store, id)?;
        }
        Ok(())
    }

    /// Return a page's canvas without flushing, for pages being deleted.
    pub fn release_page(&mut self, store: &mut PageStore, id: PageId) -> FolioResult<()> {
        let page = store.get_mut(id)?;
        if let Some(canvas) = page.canvas.take() {
            page.last_used = None;
            self.pool.release(canvas)?;
        }
        if self.active == Some(id) {
            self.active = None;
        }
        Ok(())
    }

    /// Release every canvas and forget all use stamps.
    pub fn reset(&mut self) {
        self.pool.reset();
        self.clock = 0;
        self.active = None;
    }

    /// Materialized pages in document order.
    pub fn materialized(&self, store: &PageStore) -> Vec<PageId> {
        store
            .pages()
            .filter(|page| page.is_materialized())
            .map(|page| page.id())
            .collect()
    }

    /// Current content of a page, from its canvas or its page file.
    pub fn content_of(&self, store: &PageStore, id: PageId) -> FolioResult<String> {
        let page = store.get(id)?;
        match page.canvas {
            Some(canvas) => self
                .pool
                .get(canvas)
                .map(|surface| surface.content())
                .ok_or_else(|| FolioError::InvalidPoolState(format!("unknown {canvas}"))),
            None => Ok(serializer::read_page_file(&page.temp_file_path)?.content),
        }
    }

    pub fn canvas(&self, id: CanvasId) -> Option<&C> {
        self.pool.get(id)
    }
}
