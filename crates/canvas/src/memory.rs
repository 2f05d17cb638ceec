//! Headless canvas
//!
//! Keeps the drawing layer as its serialized text. Used by the command line
//! front-end and by tests, where no real surface exists.

use crate::{BackgroundImage, Canvas};
use folio_model::Color;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryCanvas {
    content: String,
    width: u32,
    height: u32,
    background_color: Option<Color>,
    background_image: Option<BackgroundImage>,
    visible: bool,
    invalidations: u32,
}

impl MemoryCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn background_color(&self) -> Option<Color> {
        self.background_color
    }

    pub fn background_image(&self) -> Option<&BackgroundImage> {
        self.background_image.as_ref()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// How many times a full redraw was requested.
    pub fn invalidations(&self) -> u32 {
        self.invalidations
    }
}

impl Canvas for MemoryCanvas {
    fn clear(&mut self) {
        self.content.clear();
    }

    fn append_content(&mut self, content: &str) {
        self.content.push_str(content);
    }

    fn content(&self) -> String {
        self.content.clone()
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn invalidate_all(&mut self) {
        self.invalidations += 1;
    }

    fn set_background_color(&mut self, color: Option<Color>) {
        self.background_color = color;
    }

    fn set_background_image(&mut self, image: Option<BackgroundImage>) {
        self.background_image = image;
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }
}
