//! Folio Canvas Library
//!
//! Rendering-surface interface and the fixed-capacity pool that hands
//! surfaces out to pages.

pub mod memory;
pub mod pool;

pub use memory::MemoryCanvas;
pub use pool::{CanvasId, CanvasPool, ModifiedListener, PoolError, PoolStats};

use folio_model::Color;
use std::path::PathBuf;

/// Bitmap composited behind a page's own content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundImage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// A rendering surface holding one page's editable content.
///
/// Content is exchanged as the serialized children of the drawing layer; the
/// surface owns how it parses and draws them.
pub trait Canvas {
    /// Remove every content node from the drawing layer.
    fn clear(&mut self);

    /// Append serialized content nodes to the drawing layer.
    fn append_content(&mut self, content: &str);

    /// Serialize the drawing layer's children.
    fn content(&self) -> String;

    fn set_size(&mut self, width: u32, height: u32);

    fn size(&self) -> (u32, u32);

    /// Drop every cached rendering so the next paint redraws all nodes.
    fn invalidate_all(&mut self);

    fn set_background_color(&mut self, color: Option<Color>);

    fn set_background_image(&mut self, image: Option<BackgroundImage>);

    fn set_visible(&mut self, visible: bool);
}
