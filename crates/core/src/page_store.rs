//! Page arena and document order
//!
//! Pages live in a map keyed by id; the document order is a separate list of
//! ids. Parent/child and background links are ids into the same map, and the
//! `children` lists are rebuilt from the document order after every
//! structural change so the two can never disagree.

use crate::error::StructureError;
use folio_canvas::CanvasId;
use folio_model::{PageId, PageMeta, PageSpec};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct Page {
    pub meta: PageMeta,

    /// Child pages in document order
    pub children: Vec<PageId>,

    /// Set while the page is materialized
    pub canvas: Option<CanvasId>,

    /// Serialized page inside the document working directory
    pub temp_file_path: PathBuf,

    pub thumb_path: Option<PathBuf>,
    pub thumb_created: Option<Instant>,
    pub last_modified: Option<Instant>,

    /// Cached composed bitmap, if one has been rendered
    pub bitmap_file_path: Option<PathBuf>,

    /// Logical use stamp; `None` sorts before every stamp
    pub last_used: Option<u64>,

    /// Whether the page has been fully redrawn since it was loaded
    pub invalidated_after_load: bool,
}

impl Page {
    /// A page whose serialization lives in `dir`.
    pub fn new(meta: PageMeta, dir: &Path) -> Self {
        let temp_file_path = dir.join(meta.id.file_name());
        Self {
            meta,
            children: Vec::new(),
            canvas: None,
            temp_file_path,
            thumb_path: None,
            thumb_created: None,
            last_modified: None,
            bitmap_file_path: None,
            last_used: None,
            invalidated_after_load: false,
        }
    }

    pub fn id(&self) -> PageId {
        self.meta.id
    }

    pub fn file_name(&self) -> String {
        self.meta.id.file_name()
    }

    pub fn is_materialized(&self) -> bool {
        self.canvas.is_some()
    }

    /// Whether the thumbnail is missing or older than the last modification.
    pub fn thumbnail_stale(&self) -> bool {
        match (self.last_modified, self.thumb_created) {
            (Some(modified), Some(created)) => modified > created || self.thumb_path.is_none(),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

/// Decides what a page that used the deleted page as its background uses
/// instead.
pub trait BackgroundPolicy {
    fn reassign(&self, deleted: &Page, dependent: &Page) -> Option<PageId>;
}

/// Dependents inherit the deleted page's own background.
#[derive(Debug, Clone, Copy, Default)]
pub struct UseDeletedBackground;

impl BackgroundPolicy for UseDeletedBackground {
    fn reassign(&self, deleted: &Page, _dependent: &Page) -> Option<PageId> {
        deleted.meta.background_page_id
    }
}

/// Dependents lose their background page.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearBackground;

impl BackgroundPolicy for ClearBackground {
    fn reassign(&self, _deleted: &Page, _dependent: &Page) -> Option<PageId> {
        None
    }
}

/// Outcome of [`PageStore::delete`].
#[derive(Debug)]
pub struct DeletedPage {
    pub page: Page,

    /// Pages whose background was reassigned; each needs invalidating
    pub reassigned: Vec<PageId>,

    /// Page to activate if the deleted page was the active one
    pub next_active: Option<PageId>,
}

#[derive(Debug, Clone)]
pub struct PageStore {
    dir: PathBuf,
    pages: HashMap<PageId, Page>,
    order: Vec<PageId>,
}

impl PageStore {
    /// An empty store whose pages serialize into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), pages: HashMap::new(), order: Vec::new() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create a page with a fresh id at the end of the document.
    ///
    /// Parent and background ids that do not resolve are dropped with a
    /// warning.
    pub fn create(&mut self, spec: PageSpec) -> PageId {
        let id = PageId::new();
        let mut meta = PageMeta::new(id, spec.name, spec.size);
        meta.note = spec.note;
        meta.background_color = spec.background_color;
        meta.background_page_id = self.resolve_reference(id, "background", spec.background_page_id);
        meta.parent_page_id = self.resolve_reference(id, "parent", spec.parent_page_id);

        let page = Page::new(meta, &self.dir);
        self.pages.insert(id, page);
        self.order.push(id);
        self.relink_children();

        tracing::debug!(page = %id, "page created");
        id
    }

    /// Add a fully built page at the end of the document.
    ///
    /// Links are not checked here; loaders call
    /// [`PageStore::resolve_references`] once every page is in.
    pub fn insert(&mut self, page: Page) -> Result<(), StructureError> {
        let id = page.id();
        if self.pages.contains_key(&id) {
            return Err(StructureError::DuplicateId(id));
        }
        self.pages.insert(id, page);
        self.order.push(id);
        Ok(())
    }

    /// Drop dangling, self-referencing and cyclic links, then rebuild the
    /// children lists.
    pub fn resolve_references(&mut self) {
        for id in self.order.clone() {
            let Some(page) = self.pages.get(&id) else { continue };
            let parent = page.meta.parent_page_id;
            let background = page.meta.background_page_id;

            let parent = self.resolve_reference(id, "parent", parent);
            let background = self.resolve_reference(id, "background", background);

            if let Some(page) = self.pages.get_mut(&id) {
                page.meta.parent_page_id = parent;
                page.meta.background_page_id = background;
            }
        }

        for id in self.order.clone() {
            if let Some(parent) = self.pages.get(&id).and_then(|page| page.meta.parent_page_id) {
                if self.is_descendant_or_self(parent, id) {
                    tracing::warn!(page = %id, %parent, "dropping cyclic parent reference");
                    if let Some(page) = self.pages.get_mut(&id) {
                        page.meta.parent_page_id = None;
                    }
                }
            }
            if let Some(background) = self.pages.get(&id).and_then(|page| page.meta.background_page_id) {
                if self.background_reaches(background, id) {
                    tracing::warn!(page = %id, %background, "dropping cyclic background reference");
                    if let Some(page) = self.pages.get_mut(&id) {
                        page.meta.background_page_id = None;
                    }
                }
            }
        }

        self.relink_children();
    }

    pub fn find(&self, id: PageId) -> Option<&Page> {
        self.pages.get(&id)
    }

    pub fn find_mut(&mut self, id: PageId) -> Option<&mut Page> {
        self.pages.get_mut(&id)
    }

    pub fn get(&self, id: PageId) -> Result<&Page, StructureError> {
        self.pages.get(&id).ok_or(StructureError::UnknownPage(id))
    }

    pub fn get_mut(&mut self, id: PageId) -> Result<&mut Page, StructureError> {
        self.pages.get_mut(&id).ok_or(StructureError::UnknownPage(id))
    }

    pub fn contains(&self, id: PageId) -> bool {
        self.pages.contains_key(&id)
    }

    /// Page ids in document order.
    pub fn ids(&self) -> &[PageId] {
        &self.order
    }

    /// Pages in document order.
    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.order.iter().filter_map(|id| self.pages.get(id))
    }

    pub fn first(&self) -> Option<PageId> {
        self.order.first().copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn index_of(&self, id: PageId) -> Option<usize> {
        self.order.iter().position(|candidate| *candidate == id)
    }

    /// Pages without a parent, in document order.
    pub fn roots(&self) -> Vec<PageId> {
        self.pages()
            .filter(|page| page.meta.parent_page_id.is_none())
            .map(Page::id)
            .collect()
    }

    /// The sibling group `id` belongs to, itself included.
    pub fn siblings(&self, id: PageId) -> Vec<PageId> {
        match self.find(id).and_then(|page| page.meta.parent_page_id) {
            Some(parent) => self.find(parent).map(|page| page.children.clone()).unwrap_or_default(),
            None => self.roots(),
        }
    }

    /// Pages that use `id` as their background, in document order.
    pub fn dependents_of(&self, id: PageId) -> Vec<PageId> {
        self.pages()
            .filter(|page| page.meta.background_page_id == Some(id))
            .map(Page::id)
            .collect()
    }

    /// Remove a page from the document.
    ///
    /// Children move up to the deleted page's parent (or become roots) and
    /// every page that used it as a background is reassigned through
    /// `policy`. The caller is responsible for the page's canvas and files.
    pub fn delete(&mut self, id: PageId, policy: &dyn BackgroundPolicy) -> Result<DeletedPage, StructureError> {
        let page = self.pages.remove(&id).ok_or(StructureError::UnknownPage(id))?;
        self.order.retain(|candidate| *candidate != id);

        let parent = page.meta.parent_page_id.filter(|parent| self.pages.contains_key(parent));
        for child in &page.children {
            if let Some(child) = self.pages.get_mut(child) {
                child.meta.parent_page_id = parent;
            }
        }

        let mut reassigned = Vec::new();
        for dependent in self.dependents_of(id) {
            let Some(current) = self.pages.get(&dependent) else { continue };
            let replacement = policy
                .reassign(&page, current)
                .filter(|candidate| *candidate != dependent && self.pages.contains_key(candidate))
                .filter(|candidate| !self.background_reaches(*candidate, dependent));

            if let Some(current) = self.pages.get_mut(&dependent) {
                current.meta.background_page_id = replacement;
            }
            reassigned.push(dependent);
        }

        self.relink_children();

        let next_active = parent
            .and_then(|parent| self.find(parent))
            .map(|parent| parent.children.first().copied().unwrap_or(parent.id()))
            .or_else(|| self.roots().first().copied());

        tracing::debug!(page = %id, reassigned = reassigned.len(), "page deleted");
        Ok(DeletedPage { page, reassigned, next_active })
    }

    /// Swap a page with its neighbour inside its sibling group.
    ///
    /// Returns `false` when the page is already at that end of the group.
    pub fn move_page(&mut self, id: PageId, direction: Direction) -> bool {
        let Some(neighbour) = self.neighbour(id, direction) else {
            return false;
        };

        let (Some(from), Some(to)) = (self.index_of(id), self.index_of(neighbour)) else {
            return false;
        };
        self.order.swap(from, to);
        self.relink_children();
        true
    }

    /// Whether [`PageStore::move_page`] would move `id` in `direction`.
    pub fn can_move(&self, id: PageId, direction: Direction) -> bool {
        self.neighbour(id, direction).is_some()
    }

    fn neighbour(&self, id: PageId, direction: Direction) -> Option<PageId> {
        if !self.contains(id) {
            return None;
        }
        let siblings = self.siblings(id);
        let index = siblings.iter().position(|candidate| *candidate == id)?;

        match direction {
            Direction::Left if index > 0 => Some(siblings[index - 1]),
            Direction::Right if index + 1 < siblings.len() => Some(siblings[index + 1]),
            _ => None,
        }
    }

    /// Move `id` immediately before or after `target` in their shared
    /// sibling group. Both pages must exist, differ, and share a parent.
    pub fn move_to(&mut self, id: PageId, target: PageId, before: bool) -> bool {
        if id == target {
            return false;
        }
        let (Some(page), Some(other)) = (self.find(id), self.find(target)) else {
            return false;
        };
        if page.meta.parent_page_id != other.meta.parent_page_id {
            return false;
        }

        self.order.retain(|candidate| *candidate != id);
        let Some(target_index) = self.index_of(target) else {
            return false;
        };
        let insert_at = if before { target_index } else { target_index + 1 };
        self.order.insert(insert_at, id);
        self.relink_children();
        true
    }

    /// Re-home a page under `parent`, or at the root level for `None`.
    ///
    /// The page moves to the end of its new sibling group. Returns
    /// `Ok(false)` when the parent is unchanged.
    pub fn set_parent(&mut self, id: PageId, parent: Option<PageId>) -> Result<bool, StructureError> {
        let current = self.get(id)?.meta.parent_page_id;
        if current == parent {
            return Ok(false);
        }

        if let Some(parent) = parent {
            if parent == id {
                return Err(StructureError::SelfReference(id));
            }
            self.get(parent)?;
            if self.is_descendant_or_self(parent, id) {
                return Err(StructureError::ParentCycle { page: id, parent });
            }
        }

        self.get_mut(id)?.meta.parent_page_id = parent;
        self.order.retain(|candidate| *candidate != id);
        self.order.push(id);
        self.relink_children();
        Ok(true)
    }

    /// Point a page at a new background page, or none.
    pub fn set_background(&mut self, id: PageId, background: Option<PageId>) -> Result<(), StructureError> {
        self.get(id)?;
        if let Some(background) = background {
            if background == id {
                return Err(StructureError::SelfReference(id));
            }
            self.get(background)?;
            if self.background_reaches(background, id) {
                return Err(StructureError::BackgroundCycle { page: id, background });
            }
        }

        self.get_mut(id)?.meta.background_page_id = background;
        Ok(())
    }

    fn resolve_reference(&self, id: PageId, kind: &str, reference: Option<PageId>) -> Option<PageId> {
        let reference = reference?;
        if reference == id {
            tracing::warn!(page = %id, kind, "dropping self reference");
            return None;
        }
        if !self.pages.contains_key(&reference) {
            tracing::warn!(page = %id, kind, %reference, "dangling page reference");
            return None;
        }
        Some(reference)
    }

    /// Whether `candidate` is `ancestor` or lies below it.
    fn is_descendant_or_self(&self, candidate: PageId, ancestor: PageId) -> bool {
        let mut seen = HashSet::new();
        let mut current = Some(candidate);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            if !seen.insert(id) {
                return false;
            }
            current = self.pages.get(&id).and_then(|page| page.meta.parent_page_id);
        }
        false
    }

    /// Whether following background links from `start` reaches `target`.
    fn background_reaches(&self, start: PageId, target: PageId) -> bool {
        let mut seen = HashSet::new();
        let mut current = Some(start);
        while let Some(id) = current {
            if id == target {
                return true;
            }
            if !seen.insert(id) {
                return false;
            }
            current = self.pages.get(&id).and_then(|page| page.meta.background_page_id);
        }
        false
    }

    fn relink_children(&mut self) {
        for page in self.pages.values_mut() {
            page.children.clear();
        }
        for id in &self.order {
            let Some(parent) = self.pages.get(id).and_then(|page| page.meta.parent_page_id) else {
                continue;
            };
            if let Some(parent) = self.pages.get_mut(&parent) {
                parent.children.push(*id);
            }
        }
    }
}
