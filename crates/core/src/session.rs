//! Open document and its page lifecycle
//!
//! A [`Session`] owns everything that belongs to one open document: the
//! working directory, the pages, the pooled canvases, the thumbnail timers
//! and the recent-document bookkeeping. Every operation runs synchronously
//! on the caller's thread; pending thumbnails are produced when the caller
//! polls for them.

use crate::archive;
use crate::config::SessionConfig;
use crate::error::{FolioError, FolioResult};
use crate::invalidation::InvalidationTracker;
use crate::legacy;
use crate::page_store::{BackgroundPolicy, Direction, Page, PageStore, UseDeletedBackground};
use crate::rasterizer::{thumbnail_scale, RasterJob, Rasterizer};
use crate::serializer::{self, ContentSource};
use crate::swap::SwapManager;
use crate::workspace::Workspace;
use folio_canvas::{BackgroundImage, Canvas, CanvasPool, PoolStats};
use folio_model::{Color, DocumentProperties, FieldError, PageId, PageSize, PageSpec};
use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;
use uuid::Uuid;

const UNTITLED_DOCUMENT: &str = "Untitled";
const UNTITLED_PAGE: &str = "Untitled Page";

/// Notifications for whoever presents the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Pages were added, removed, reordered or reloaded
    DocumentChanged,
    ActivePageChanged(PageId),
    /// A page's properties or thumbnail changed
    PageInfoChanged(PageId),
    /// The modified flag changed
    StatusChanged,
    DocumentSaved(PathBuf),
}

/// Property changes for [`Session::update_page_properties`]. `None` leaves a
/// property untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageUpdate {
    pub name: Option<String>,
    pub note: Option<String>,
    pub background_color: Option<Option<Color>>,
    pub background_page_id: Option<Option<PageId>>,
    pub parent_page_id: Option<Option<PageId>>,
}

impl PageUpdate {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn background_color(mut self, color: Option<Color>) -> Self {
        self.background_color = Some(color);
        self
    }

    pub fn background_page(mut self, id: Option<PageId>) -> Self {
        self.background_page_id = Some(id);
        self
    }

    pub fn parent(mut self, id: Option<PageId>) -> Self {
        self.parent_page_id = Some(id);
        self
    }
}

pub struct Session<C> {
    config: SessionConfig,
    workspace: Workspace,
    store: PageStore,
    swap: SwapManager<C>,
    tracker: InvalidationTracker,
    rasterizer: Box<dyn Rasterizer>,
    policy: Box<dyn BackgroundPolicy>,
    properties: DocumentProperties,
    path: Option<PathBuf>,
    modified: bool,
    events: Vec<SessionEvent>,
    edits: Rc<RefCell<VecDeque<PageId>>>,
}

impl<C: Canvas> Session<C> {
    /// Start a session on a fresh one-page document.
    pub fn new(mut pool: CanvasPool<C>, rasterizer: Box<dyn Rasterizer>, config: SessionConfig) -> FolioResult<Self> {
        let edits = Rc::new(RefCell::new(VecDeque::new()));
        let sink = Rc::clone(&edits);
        pool.set_modified_listener(Box::new(move |_, page| {
            if let Some(page) = page {
                sink.borrow_mut().push_back(page);
            }
        }));

        let workspace = Workspace::new(&config.temp_prefix)?;
        let store = PageStore::new(workspace.path());

        let mut session = Self {
            tracker: InvalidationTracker::new(config.thumbnail_delay),
            config,
            workspace,
            store,
            swap: SwapManager::new(pool),
            rasterizer,
            policy: Box::new(UseDeletedBackground),
            properties: DocumentProperties::new(),
            path: None,
            modified: false,
            events: Vec::new(),
            edits,
        };
        session.new_document()?;
        session.events.clear();
        Ok(session)
    }

    pub fn with_background_policy(mut self, policy: impl BackgroundPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn set_background_policy(&mut self, policy: impl BackgroundPolicy + 'static) {
        self.policy = Box::new(policy);
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &PageStore {
        &self.store
    }

    pub fn page(&self, id: PageId) -> Option<&Page> {
        self.store.find(id)
    }

    /// Page ids in document order.
    pub fn page_ids(&self) -> Vec<PageId> {
        self.store.ids().to_vec()
    }

    pub fn active_page(&self) -> Option<PageId> {
        self.swap.active()
    }

    /// Surface of a materialized page.
    pub fn canvas(&self, id: PageId) -> Option<&C> {
        let canvas = self.store.find(id)?.canvas?;
        self.swap.canvas(canvas)
    }

    /// Materialized pages in document order.
    pub fn materialized(&self) -> Vec<PageId> {
        self.swap.materialized(&self.store)
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.swap.stats()
    }

    pub fn pool_capacity(&self) -> usize {
        self.swap.pool().capacity()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn properties(&self) -> &DocumentProperties {
        &self.properties
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(name.into(), value.into());
        self.mark_modified();
    }

    pub fn thumbnail_pending(&self, id: PageId) -> bool {
        self.tracker.is_pending(id)
    }

    pub fn next_thumbnail_deadline(&self) -> Option<Instant> {
        self.tracker.next_deadline()
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// File stem of the document path, or a placeholder for unsaved
    /// documents.
    pub fn document_name(&self) -> String {
        self.path
            .as_deref()
            .and_then(Path::file_stem)
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| UNTITLED_DOCUMENT.to_owned())
    }

    /// Discard the current document, leaving an empty one with no pages.
    pub fn reset_document(&mut self) -> FolioResult<()> {
        self.tracker.cancel_all();
        self.swap.reset();
        self.edits.borrow_mut().clear();

        self.workspace = Workspace::new(&self.config.temp_prefix)?;
        self.store = PageStore::new(self.workspace.path());
        self.properties.clear();
        self.path = None;
        self.set_modified(false);
        self.events.push(SessionEvent::DocumentChanged);
        Ok(())
    }

    /// Replace the current document with a fresh one holding a single
    /// active page.
    pub fn new_document(&mut self) -> FolioResult<PageId> {
        self.reset_document()?;
        let id = self.new_page(PageSpec::new(UNTITLED_PAGE, self.config.default_page_size))?;
        self.activate_page(id)?;
        self.set_modified(false);
        tracing::debug!(page = %id, "new document");
        Ok(id)
    }

    pub fn close(&mut self) -> FolioResult<()> {
        tracing::debug!(document = %self.document_name(), "closing document");
        self.reset_document()
    }

    /// Add a page at the end of the document. The page is not activated.
    pub fn new_page(&mut self, spec: PageSpec) -> FolioResult<PageId> {
        validate_size(spec.size)?;

        let id = self.store.create(spec);
        let page = self.store.get(id)?;
        let written = serializer::flush_to_disk(&page.meta, ContentSource::Empty, &page.temp_file_path);
        if let Err(error) = written {
            self.store.delete(id, self.policy.as_ref())?;
            return Err(error);
        }

        self.store.get_mut(id)?.invalidated_after_load = true;
        self.tracker.invalidate_bitmap(&mut self.store, id, Instant::now());

        self.mark_modified();
        self.events.push(SessionEvent::DocumentChanged);
        Ok(id)
    }

    /// Copy a page, content included, and place the copy right after it.
    pub fn duplicate_page(&mut self, id: PageId) -> FolioResult<PageId> {
        let source = self.store.get(id)?.meta.clone();
        let content = self.swap.content_of(&self.store, id)?;

        let mut spec = PageSpec::new(source.name.clone(), source.size()).with_note(source.note.clone());
        spec.background_color = source.background_color;
        spec.background_page_id = source.background_page_id;
        spec.parent_page_id = source.parent_page_id;

        let copy = self.store.create(spec);
        self.store.move_to(copy, id, false);

        let page = self.store.get(copy)?;
        serializer::flush_to_disk(&page.meta, ContentSource::Fragment(&content), &page.temp_file_path)?;
        self.store.get_mut(copy)?.invalidated_after_load = true;

        self.tracker.invalidate_bitmap(&mut self.store, copy, Instant::now());
        self.mark_modified();
        self.events.push(SessionEvent::DocumentChanged);
        Ok(copy)
    }

    /// Remove a page and its files.
    ///
    /// Returns the page that was activated in its place when the deleted
    /// page was the active one.
    pub fn delete_page(&mut self, id: PageId) -> FolioResult<Option<PageId>> {
        self.store.get(id)?;
        let was_active = self.swap.active() == Some(id);

        self.tracker.cancel(id);
        self.swap.release_page(&mut self.store, id)?;
        let deleted = self.store.delete(id, self.policy.as_ref())?;

        remove_quietly(&deleted.page.temp_file_path);
        for path in [&deleted.page.thumb_path, &deleted.page.bitmap_file_path].into_iter().flatten() {
            remove_quietly(path);
        }

        for child in &deleted.page.children {
            self.sync_page_file(*child)?;
        }
        let now = Instant::now();
        for dependent in &deleted.reassigned {
            self.sync_page_file(*dependent)?;
            self.tracker.invalidate_bitmap(&mut self.store, *dependent, now);
        }
        self.refresh_active_background(&deleted.reassigned)?;

        self.mark_modified();
        self.events.push(SessionEvent::DocumentChanged);
        tracing::debug!(page = %id, "page deleted");

        if !was_active {
            return Ok(None);
        }
        match deleted.next_active {
            Some(next) => {
                self.activate_page(next)?;
                Ok(Some(next))
            }
            None => Ok(None),
        }
    }

    /// Show a page, materializing it and applying its background.
    pub fn activate_page(&mut self, id: PageId) -> FolioResult<()> {
        if self.swap.active() == Some(id) && self.store.get(id)?.is_materialized() {
            return Ok(());
        }

        self.swap.activate(&mut self.store, id)?;
        self.apply_background(id)?;
        self.events.push(SessionEvent::ActivePageChanged(id));
        Ok(())
    }

    pub fn move_page(&mut self, id: PageId, direction: Direction) -> FolioResult<bool> {
        self.store.get(id)?;
        let moved = self.store.move_page(id, direction);
        if moved {
            self.mark_modified();
            self.events.push(SessionEvent::DocumentChanged);
        }
        Ok(moved)
    }

    /// Whether the page has a sibling on that side to swap with.
    pub fn can_move_page(&self, id: PageId, direction: Direction) -> bool {
        self.store.can_move(id, direction)
    }

    pub fn move_page_to(&mut self, id: PageId, target: PageId, before: bool) -> bool {
        let moved = self.store.move_to(id, target, before);
        if moved {
            self.mark_modified();
            self.events.push(SessionEvent::DocumentChanged);
        }
        moved
    }

    pub fn update_page_properties(&mut self, id: PageId, update: PageUpdate) -> FolioResult<()> {
        self.store.get(id)?;

        let mut reparented = false;
        if let Some(parent) = update.parent_page_id {
            reparented = self.store.set_parent(id, parent)?;
        }
        if let Some(background) = update.background_page_id {
            self.store.set_background(id, background)?;
        }

        let page = self.store.get_mut(id)?;
        if let Some(name) = update.name {
            page.meta.name = name;
        }
        if let Some(note) = update.note {
            page.meta.note = note;
        }
        if let Some(color) = update.background_color {
            page.meta.background_color = color;
        }

        self.sync_page_file(id)?;
        self.tracker.invalidate_bitmap(&mut self.store, id, Instant::now());
        self.refresh_active_background(&[id])?;

        self.mark_modified();
        self.events.push(SessionEvent::PageInfoChanged(id));
        if reparented {
            self.events.push(SessionEvent::DocumentChanged);
        }
        Ok(())
    }

    pub fn resize_page(&mut self, id: PageId, size: PageSize) -> FolioResult<()> {
        validate_size(size)?;

        let page = self.store.get_mut(id)?;
        page.meta.width = size.width;
        page.meta.height = size.height;
        if let Some(canvas) = page.canvas {
            if let Some(surface) = self.swap.pool_mut().get_mut(canvas) {
                surface.set_size(size.width, size.height);
            }
        }

        self.sync_page_file(id)?;
        self.tracker.invalidate_bitmap(&mut self.store, id, Instant::now());
        self.refresh_active_background(&[id])?;
        self.mark_modified();
        self.events.push(SessionEvent::PageInfoChanged(id));
        Ok(())
    }

    /// Change a page's drawing content.
    ///
    /// The page is materialized if needed, never at the expense of the
    /// active page. The edit is reported through the pool's modification
    /// listener, which marks the document modified and invalidates the
    /// page's bitmap.
    pub fn edit_page<R>(&mut self, id: PageId, edit: impl FnOnce(&mut C) -> R) -> FolioResult<R> {
        self.store.get(id)?;
        let active = self.swap.active().filter(|active| *active != id);
        if let Some(active) = active {
            if !self.swap.can_materialize(&self.store, id, Some(active)) {
                return self.edit_on_borrowed_canvas(active, id, edit);
            }
        }

        let canvas = self.swap.ensure_materialized(&mut self.store, id, active)?;
        self.swap.touch(&mut self.store, id)?;
        let result = self.swap.pool_mut().modify(canvas, edit)?;
        self.process_edits(Instant::now())?;
        Ok(result)
    }

    /// Edit `id` on the active page's canvas when the pool has no other one,
    /// then hand the canvas back to the active page.
    fn edit_on_borrowed_canvas<R>(
        &mut self,
        active: PageId,
        id: PageId,
        edit: impl FnOnce(&mut C) -> R,
    ) -> FolioResult<R> {
        self.swap.swap_out(&mut self.store, active)?;
        let edited = self
            .swap
            .ensure_materialized(&mut self.store, id, None)
            .and_then(|canvas| self.swap.pool_mut().modify(canvas, edit).map_err(FolioError::from));

        if self.store.get(id)?.is_materialized() {
            self.swap.swap_out(&mut self.store, id)?;
        }
        self.swap.activate(&mut self.store, active)?;
        self.apply_background(active)?;

        let result = edited?;
        self.process_edits(Instant::now())?;
        Ok(result)
    }

    pub fn invalidate_page(&mut self, id: PageId) -> FolioResult<Vec<PageId>> {
        self.invalidate_page_at(id, Instant::now())
    }

    /// Invalidate a page and its background dependents as of `now`.
    pub fn invalidate_page_at(&mut self, id: PageId, now: Instant) -> FolioResult<Vec<PageId>> {
        self.store.get(id)?;
        Ok(self.tracker.invalidate_bitmap(&mut self.store, id, now))
    }

    pub fn page_content(&self, id: PageId) -> FolioResult<String> {
        self.swap.content_of(&self.store, id)
    }

    /// Composed bitmap of a page at full size, rendered on first request.
    pub fn page_bitmap_file(&mut self, id: PageId) -> FolioResult<PathBuf> {
        let page = self.store.get(id)?;
        if let Some(path) = page.bitmap_file_path.as_ref().filter(|path| path.is_file()) {
            return Ok(path.clone());
        }

        let meta = page.meta.clone();
        let background = match meta.background_page_id {
            Some(background) => Some(self.page_bitmap_file(background)?),
            None => None,
        };
        let content = self.swap.content_of(&self.store, id)?;
        let output = self.workspace.bitmap_path(id);

        self.rasterizer.rasterize(&RasterJob {
            page: &meta,
            content: &content,
            background: background.as_deref(),
            scale: 1.0,
            output: &output,
        })?;

        if output.is_file() {
            self.store.get_mut(id)?.bitmap_file_path = Some(output.clone());
        }
        Ok(output)
    }

    pub fn poll_thumbnails(&mut self) -> Vec<PageId> {
        self.poll_thumbnails_at(Instant::now())
    }

    /// Regenerate the thumbnails whose quiet period has elapsed by `now`.
    ///
    /// Failures are logged and skipped. Returns the pages that got a new
    /// thumbnail.
    pub fn poll_thumbnails_at(&mut self, now: Instant) -> Vec<PageId> {
        let mut updated = Vec::new();
        for id in self.tracker.take_due(now) {
            if !self.store.contains(id) {
                continue;
            }
            match self.update_page_thumbnail_at(id, now) {
                Ok(_) => updated.push(id),
                Err(error) => tracing::warn!(page = %id, %error, "thumbnail update failed"),
            }
        }
        updated
    }

    pub fn update_page_thumbnail(&mut self, id: PageId) -> FolioResult<PathBuf> {
        self.update_page_thumbnail_at(id, Instant::now())
    }

    /// Rasterize a page's thumbnail into the document's `thumbnails/` folder.
    pub fn update_page_thumbnail_at(&mut self, id: PageId, now: Instant) -> FolioResult<PathBuf> {
        let meta = self.store.get(id)?.meta.clone();
        let background = match meta.background_page_id {
            Some(background) => match self.page_bitmap_file(background) {
                Ok(path) => Some(path),
                Err(error) => {
                    tracing::warn!(page = %id, %background, %error, "background bitmap unavailable");
                    None
                }
            },
            None => None,
        };
        let content = self.swap.content_of(&self.store, id)?;
        let output = self.workspace.thumbnail_path(id);

        self.rasterizer.rasterize(&RasterJob {
            page: &meta,
            content: &content,
            background: background.as_deref(),
            scale: thumbnail_scale(meta.width, meta.height, self.config.thumbnail_size),
            output: &output,
        })?;

        let page = self.store.get_mut(id)?;
        page.thumb_path = Some(output.clone());
        page.thumb_created = Some(now);

        self.events.push(SessionEvent::PageInfoChanged(id));
        tracing::debug!(page = %id, "thumbnail updated");
        Ok(output)
    }

    /// Save to the path the document was opened from or last saved to.
    pub fn save(&mut self) -> FolioResult<PathBuf> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| FolioError::InvalidState("document has never been saved".to_owned()))?;
        self.save_as(&path)?;
        Ok(path)
    }

    pub fn save_as(&mut self, path: &Path) -> FolioResult<()> {
        let now = Instant::now();
        for id in self.page_ids() {
            let stale = self.store.find(id).is_some_and(Page::thumbnail_stale);
            if !stale {
                continue;
            }
            self.tracker.cancel(id);
            if let Err(error) = self.update_page_thumbnail_at(id, now) {
                tracing::warn!(page = %id, %error, "thumbnail update failed");
            }
        }

        archive::save(&self.workspace, &self.store, &self.swap, &self.properties, path)?;

        self.path = Some(path.to_path_buf());
        self.set_modified(false);
        self.events.push(SessionEvent::DocumentSaved(path.to_path_buf()));
        self.record_recent(path);
        Ok(())
    }

    /// Open a document archive or a single-file document.
    ///
    /// On failure the session is left with a fresh one-page document and the
    /// error is returned. A missing file is also dropped from the recent
    /// documents.
    pub fn open(&mut self, path: &Path) -> FolioResult<()> {
        if !path.exists() {
            self.forget_recent(path);
            self.new_document()?;
            return Err(FolioError::DocumentNotFound(path.to_path_buf()));
        }

        match self.load(path) {
            Ok(()) => Ok(()),
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "could not open document, starting a new one");
                self.new_document()?;
                Err(error)
            }
        }
    }

    fn load(&mut self, path: &Path) -> FolioResult<()> {
        self.reset_document()?;

        let is_archive = archive::is_archive(path)?;
        let loaded = if is_archive {
            archive::load(&self.workspace, path, self.config.default_page_size)?
        } else {
            legacy::load(&self.workspace, path, self.config.default_page_size)?
        };
        self.store = loaded.store;
        self.properties = loaded.properties;

        if is_archive {
            self.path = Some(path.to_path_buf());
        } else {
            for id in self.page_ids() {
                if let Err(error) = self.update_page_thumbnail(id) {
                    tracing::warn!(page = %id, %error, "thumbnail regeneration failed");
                }
            }
        }

        if let Some(first) = self.store.first() {
            self.activate_page(first)?;
        }
        self.set_modified(false);
        self.events.push(SessionEvent::DocumentChanged);
        if is_archive {
            self.record_recent(path);
        }
        Ok(())
    }

    /// Copy the first available page thumbnail into the recent-documents
    /// thumbnail cache.
    pub fn document_thumbnail(&self) -> FolioResult<Option<PathBuf>> {
        let Some(storage) = self.config.storage.as_ref() else {
            return Ok(None);
        };
        let Some(source) = self
            .store
            .pages()
            .filter_map(|page| page.thumb_path.as_ref())
            .find(|path| path.is_file())
        else {
            return Ok(None);
        };

        let target = storage.thumb_cache_dir()?.join(format!("{}.png", Uuid::new_v4()));
        fs::copy(source, &target)?;
        Ok(Some(target))
    }

    /// Copy an external file into the document; see [`Workspace::copy_as_ref`].
    pub fn copy_as_ref(&self, source: &Path) -> FolioResult<String> {
        self.workspace.copy_as_ref(source)
    }

    pub fn ref_id_to_url(&self, id: &str) -> String {
        self.workspace.ref_id_to_url(id)
    }

    fn apply_background(&mut self, id: PageId) -> FolioResult<()> {
        let page = self.store.get(id)?;
        let Some(canvas) = page.canvas else {
            return Ok(());
        };
        let color = page.meta.background_color;
        let background = page.meta.background_page_id;

        let image = match background {
            Some(background) => match self.page_bitmap_file(background) {
                Ok(path) if path.is_file() => {
                    let size = self.store.get(background)?.meta.size();
                    Some(BackgroundImage { path, width: size.width, height: size.height })
                }
                Ok(_) => None,
                Err(error) => {
                    tracing::warn!(page = %id, %background, %error, "background bitmap unavailable");
                    None
                }
            },
            None => None,
        };

        if let Some(surface) = self.swap.pool_mut().get_mut(canvas) {
            surface.set_background_color(color);
            surface.set_background_image(image);
        }
        Ok(())
    }

    /// Rewrite the page file of an unmaterialized page after a property
    /// change. Materialized pages are written when they are swapped out.
    fn sync_page_file(&self, id: PageId) -> FolioResult<()> {
        let page = self.store.get(id)?;
        if page.is_materialized() {
            return Ok(());
        }
        let content = serializer::read_page_file(&page.temp_file_path)?.content;
        serializer::flush_to_disk(&page.meta, ContentSource::Fragment(&content), &page.temp_file_path)
    }

    fn process_edits(&mut self, now: Instant) -> FolioResult<()> {
        let edited: Vec<PageId> = self.edits.borrow_mut().drain(..).collect();
        let mut changed = Vec::new();
        for id in edited {
            if self.store.contains(id) {
                changed.extend(self.tracker.invalidate_bitmap(&mut self.store, id, now));
                self.mark_modified();
            }
        }
        self.refresh_active_background(&changed)
    }

    /// Re-apply the active page's background when the active page or any
    /// page on its background chain is in `changed`.
    fn refresh_active_background(&mut self, changed: &[PageId]) -> FolioResult<()> {
        let Some(active) = self.swap.active() else {
            return Ok(());
        };

        let mut visited = HashSet::new();
        let mut current = Some(active);
        while let Some(id) = current {
            if !visited.insert(id) {
                break;
            }
            if changed.contains(&id) {
                return self.apply_background(active);
            }
            current = self.store.find(id).and_then(|page| page.meta.background_page_id);
        }
        Ok(())
    }

    fn mark_modified(&mut self) {
        self.set_modified(true);
    }

    fn set_modified(&mut self, modified: bool) {
        if self.modified != modified {
            self.modified = modified;
            self.events.push(SessionEvent::StatusChanged);
        }
    }

    fn record_recent(&self, path: &Path) {
        let Some(storage) = self.config.storage.as_ref() else {
            return;
        };
        let thumbnail = self.document_thumbnail().unwrap_or_else(|error| {
            tracing::warn!(%error, "could not cache document thumbnail");
            None
        });
        if let Err(error) = storage.add_recent(path, thumbnail) {
            tracing::warn!(path = %path.display(), %error, "could not record recent document");
        }
    }

    fn forget_recent(&self, path: &Path) {
        let Some(storage) = self.config.storage.as_ref() else {
            return;
        };
        if let Err(error) = storage.remove_recent(path) {
            tracing::warn!(path = %path.display(), %error, "could not update recent documents");
        }
    }
}

fn validate_size(size: PageSize) -> Result<(), FieldError> {
    if size.width == 0 {
        return Err(FieldError::InvalidDimension { field: "width", value: size.width.to_string() });
    }
    if size.height == 0 {
        return Err(FieldError::InvalidDimension { field: "height", value: size.height.to_string() });
    }
    Ok(())
}

fn remove_quietly(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => tracing::warn!(path = %path.display(), %error, "could not remove file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::NoopRasterizer;
    use folio_canvas::MemoryCanvas;

    fn session(capacity: usize) -> Session<MemoryCanvas> {
        let pool = CanvasPool::with_capacity(capacity, MemoryCanvas::new).unwrap();
        Session::new(pool, Box::new(NoopRasterizer), SessionConfig::default()).unwrap()
    }

    #[test]
    fn new_session_has_one_active_page() {
        let session = session(2);
        assert_eq!(session.store().len(), 1);
        let first = session.page_ids()[0];
        assert_eq!(session.active_page(), Some(first));
        assert_eq!(session.page(first).unwrap().meta.size(), PageSize::new(800, 600));
        assert!(!session.is_modified());
        assert_eq!(session.document_name(), "Untitled");
    }

    #[test]
    fn edit_marks_modified_and_schedules_thumbnail() {
        let mut session = session(2);
        let page = session.page_ids()[0];

        session.edit_page(page, |canvas| canvas.append_content("<rect/>")).unwrap();

        assert!(session.is_modified());
        assert!(session.thumbnail_pending(page));
        assert_eq!(session.page_content(page).unwrap(), "<rect/>");
        assert!(session.drain_events().contains(&SessionEvent::StatusChanged));
    }

    #[test]
    fn duplicate_copies_content_after_source() {
        let mut session = session(1);
        let first = session.page_ids()[0];
        let second = session.new_page(PageSpec::new("second", PageSize::default())).unwrap();
        session.edit_page(first, |canvas| canvas.append_content("<g id=\"x\"/>")).unwrap();

        let copy = session.duplicate_page(first).unwrap();

        assert_eq!(session.page_ids(), vec![first, copy, second]);
        assert_eq!(session.page_content(copy).unwrap(), "<g id=\"x\"/>");
        assert!(session.page(copy).unwrap().canvas.is_none());
    }

    #[test]
    fn zero_sized_pages_are_rejected() {
        let mut session = session(1);
        let result = session.new_page(PageSpec::new("flat", PageSize::new(0, 10)));
        assert!(matches!(result, Err(FolioError::Field(_))));
        assert_eq!(session.store().len(), 1);
    }

    #[test]
    fn property_update_rewrites_unmaterialized_page_file() {
        let mut session = session(1);
        let other = session.new_page(PageSpec::new("other", PageSize::default())).unwrap();

        session
            .update_page_properties(other, PageUpdate::default().name("renamed").note("see <b>this</b>"))
            .unwrap();

        let path = session.page(other).unwrap().temp_file_path.clone();
        let stored = serializer::read_page_file(&path).unwrap().meta(PageSize::default()).unwrap();
        assert_eq!(stored.name, "renamed");
        assert_eq!(stored.note, "see <b>this</b>");
    }

    #[test]
    fn save_without_path_is_invalid_state() {
        let mut session = session(1);
        assert!(matches!(session.save(), Err(FolioError::InvalidState(_))));
    }

    #[test]
    fn close_leaves_an_empty_document() {
        let mut session = session(1);
        let old_dir = session.workspace().path().to_path_buf();

        session.close().unwrap();

        assert!(session.store().is_empty());
        assert_eq!(session.active_page(), None);
        assert!(!old_dir.exists());
    }
}
