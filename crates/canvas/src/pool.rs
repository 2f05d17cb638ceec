//! Fixed-capacity pool of rendering surfaces
//!
//! Surfaces are expensive to create, so a pool of them is built up front and
//! lent to pages while they are materialized. The pool only tracks which
//! surfaces are checked out and which page each one belongs to; choosing a
//! page to give its surface back is up to the caller.

use crate::Canvas;
use folio_model::PageId;
use std::fmt;

/// Handle to a pooled surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanvasId(pub usize);

impl fmt::Display for CanvasId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "canvas#{}", self.0)
    }
}

/// Callback invoked after a checked-out surface's content changes.
///
/// Receives the surface handle and the page it is attached to, if any.
pub type ModifiedListener = Box<dyn FnMut(CanvasId, Option<PageId>)>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("canvas pool needs at least one surface")]
    Empty,
    #[error("all {capacity} canvases are in use")]
    Exhausted { capacity: usize },
    #[error("unknown canvas: {0}")]
    UnknownCanvas(CanvasId),
    #[error("{0} is not checked out")]
    NotCheckedOut(CanvasId),
}

/// Statistics about pool usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of surfaces in the pool
    pub capacity: usize,

    /// Number of surfaces currently checked out
    pub in_use: usize,

    /// Total successful `obtain` calls
    pub obtained: u64,

    /// Total `release` calls
    pub released: u64,

    /// Number of `obtain` calls refused because every surface was in use
    pub refusals: u64,
}

struct Slot<C> {
    canvas: C,
    in_use: bool,
    owner: Option<PageId>,
}

/// Pool of reusable rendering surfaces.
///
/// # Example
///
/// ```
/// use folio_canvas::{CanvasPool, MemoryCanvas};
///
/// let mut pool = CanvasPool::with_capacity(2, MemoryCanvas::new).unwrap();
/// let first = pool.obtain().unwrap();
/// let _second = pool.obtain().unwrap();
/// assert!(!pool.available());
///
/// pool.release(first).unwrap();
/// assert!(pool.available());
/// ```
pub struct CanvasPool<C> {
    slots: Vec<Slot<C>>,
    visible: Option<CanvasId>,
    listener: Option<ModifiedListener>,
    stats: PoolStats,
}

impl<C: Canvas> CanvasPool<C> {
    /// Build a pool from already-created surfaces.
    pub fn new(canvases: Vec<C>) -> Result<Self, PoolError> {
        if canvases.is_empty() {
            return Err(PoolError::Empty);
        }

        let capacity = canvases.len();
        let slots = canvases
            .into_iter()
            .map(|canvas| Slot { canvas, in_use: false, owner: None })
            .collect();

        Ok(Self {
            slots,
            visible: None,
            listener: None,
            stats: PoolStats { capacity, ..Default::default() },
        })
    }

    /// Build a pool of `capacity` surfaces produced by `factory`.
    pub fn with_capacity(capacity: usize, factory: impl FnMut() -> C) -> Result<Self, PoolError> {
        Self::new(std::iter::repeat_with(factory).take(capacity).collect())
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Whether `obtain` would succeed right now.
    pub fn available(&self) -> bool {
        self.slots.iter().any(|slot| !slot.in_use)
    }

    /// Check out a free surface, lowest handle first.
    pub fn obtain(&mut self) -> Result<CanvasId, PoolError> {
        let Some(index) = self.slots.iter().position(|slot| !slot.in_use) else {
            self.stats.refusals += 1;
            return Err(PoolError::Exhausted { capacity: self.slots.len() });
        };

        let slot = &mut self.slots[index];
        slot.in_use = true;
        slot.owner = None;

        self.stats.obtained += 1;
        self.stats.in_use += 1;
        Ok(CanvasId(index))
    }

    /// Return a surface to the free set, clearing its page association.
    pub fn release(&mut self, id: CanvasId) -> Result<(), PoolError> {
        let slot = self.slot_mut(id)?;
        if !slot.in_use {
            return Err(PoolError::NotCheckedOut(id));
        }

        slot.in_use = false;
        slot.owner = None;
        slot.canvas.set_visible(false);

        if self.visible == Some(id) {
            self.visible = None;
        }
        self.stats.released += 1;
        self.stats.in_use = self.stats.in_use.saturating_sub(1);
        Ok(())
    }

    /// Forcibly release every surface and wipe its content.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.in_use = false;
            slot.owner = None;
            slot.canvas.clear();
            slot.canvas.set_background_color(None);
            slot.canvas.set_background_image(None);
            slot.canvas.set_visible(false);
        }
        self.visible = None;
        self.stats.in_use = 0;
    }

    /// Associate a checked-out surface with the page it now backs.
    pub fn attach(&mut self, id: CanvasId, page: PageId) -> Result<(), PoolError> {
        let slot = self.checked_out_mut(id)?;
        slot.owner = Some(page);
        Ok(())
    }

    /// Page currently backed by the surface.
    pub fn owner(&self, id: CanvasId) -> Option<PageId> {
        self.slots.get(id.0).filter(|slot| slot.in_use).and_then(|slot| slot.owner)
    }

    pub fn is_checked_out(&self, id: CanvasId) -> bool {
        self.slots.get(id.0).is_some_and(|slot| slot.in_use)
    }

    pub fn get(&self, id: CanvasId) -> Option<&C> {
        self.slots.get(id.0).map(|slot| &slot.canvas)
    }

    /// Mutable access that does not count as a content change.
    ///
    /// Used for housekeeping such as resizing or loading content; edits that
    /// should mark the page dirty go through [`CanvasPool::modify`].
    pub fn get_mut(&mut self, id: CanvasId) -> Option<&mut C> {
        self.slots.get_mut(id.0).map(|slot| &mut slot.canvas)
    }

    /// Make `id` the single visible surface.
    pub fn show(&mut self, id: CanvasId) -> Result<(), PoolError> {
        self.checked_out_mut(id)?;

        if let Some(previous) = self.visible.take() {
            if let Some(slot) = self.slots.get_mut(previous.0) {
                slot.canvas.set_visible(false);
            }
        }

        self.slots[id.0].canvas.set_visible(true);
        self.visible = Some(id);
        Ok(())
    }

    pub fn visible(&self) -> Option<CanvasId> {
        self.visible
    }

    /// Install the single content-change listener, replacing any previous one.
    pub fn set_modified_listener(&mut self, listener: ModifiedListener) {
        self.listener = Some(listener);
    }

    /// Edit a checked-out surface and notify the listener afterwards.
    pub fn modify<R>(&mut self, id: CanvasId, edit: impl FnOnce(&mut C) -> R) -> Result<R, PoolError> {
        let slot = self.checked_out_mut(id)?;
        let result = edit(&mut slot.canvas);
        let owner = slot.owner;

        if let Some(listener) = self.listener.as_mut() {
            listener(id, owner);
        }
        Ok(result)
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    fn slot_mut(&mut self, id: CanvasId) -> Result<&mut Slot<C>, PoolError> {
        self.slots.get_mut(id.0).ok_or(PoolError::UnknownCanvas(id))
    }

    fn checked_out_mut(&mut self, id: CanvasId) -> Result<&mut Slot<C>, PoolError> {
        let slot = self.slot_mut(id)?;
        if !slot.in_use {
            return Err(PoolError::NotCheckedOut(id));
        }
        Ok(slot)
    }
}
