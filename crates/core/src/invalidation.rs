//! Cached bitmap invalidation and debounced thumbnail scheduling

use crate::page_store::PageStore;
use folio_model::PageId;
use folio_scheduler::{Debouncer, DebouncerStats};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::time::{Duration, Instant};

/// Default quiet period before a modified page's thumbnail is regenerated
pub const THUMBNAIL_DELAY: Duration = Duration::from_millis(3000);

#[derive(Debug)]
pub struct InvalidationTracker {
    thumbnails: Debouncer<PageId>,
}

impl Default for InvalidationTracker {
    fn default() -> Self {
        Self::new(THUMBNAIL_DELAY)
    }
}

impl InvalidationTracker {
    pub fn new(delay: Duration) -> Self {
        Self { thumbnails: Debouncer::new(delay) }
    }

    pub fn delay(&self) -> Duration {
        self.thumbnails.delay()
    }

    /// Drop the cached bitmap of `id` and of every page that shows it as a
    /// background, directly or through other backgrounds.
    ///
    /// Each affected page is stamped modified at `now` and gets its
    /// thumbnail (re)scheduled. Returns the affected pages, `id` first.
    pub fn invalidate_bitmap(&mut self, store: &mut PageStore, id: PageId, now: Instant) -> Vec<PageId> {
        let mut visited = HashSet::new();
        let mut affected = Vec::new();
        let mut pending = vec![id];

        while let Some(current) = pending.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(page) = store.find_mut(current) else {
                continue;
            };

            if let Some(bitmap) = page.bitmap_file_path.take() {
                match fs::remove_file(&bitmap) {
                    Ok(()) => {}
                    Err(error) if error.kind() == io::ErrorKind::NotFound => {}
                    Err(error) => {
                        tracing::warn!(page = %current, path = %bitmap.display(), %error, "could not remove cached bitmap");
                    }
                }
            }
            page.last_modified = Some(now);
            self.thumbnails.schedule(current, now);
            affected.push(current);

            let mut dependents = store.dependents_of(current);
            dependents.reverse();
            pending.extend(dependents);
        }

        tracing::trace!(page = %id, affected = affected.len(), "bitmap invalidated");
        affected
    }

    /// Pages whose thumbnail quiet period has elapsed by `now`.
    pub fn take_due(&mut self, now: Instant) -> Vec<PageId> {
        self.thumbnails.take_due(now)
    }

    pub fn cancel(&mut self, id: PageId) -> bool {
        self.thumbnails.cancel(&id)
    }

    pub fn cancel_all(&mut self) -> usize {
        self.thumbnails.cancel_all()
    }

    pub fn is_pending(&self, id: PageId) -> bool {
        self.thumbnails.is_pending(&id)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.thumbnails.next_deadline()
    }

    pub fn stats(&self) -> DebouncerStats {
        self.thumbnails.stats()
    }
}
