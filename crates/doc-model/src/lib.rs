use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Document-level properties, kept sorted so manifests are written deterministically.
pub type DocumentProperties = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(pub Uuid);

impl PageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// File name of the page's serialization inside the document directory.
    pub fn file_name(&self) -> String {
        format!("page_{}.xml", self.0)
    }

    /// Recovers a page id from a `page_<id>.xml` file name.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_prefix("page_")?.strip_suffix(".xml")?;
        stem.parse().ok()
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PageId {
    type Err = FieldError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|_| FieldError::InvalidId(value.to_owned()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255, a: 255 };

    pub fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
    }
}

impl FromStr for Color {
    type Err = FieldError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || FieldError::InvalidColor(value.to_owned());
        let hex = value.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.is_ascii() {
            return Err(invalid());
        }

        let channel = |index: usize| {
            u8::from_str_radix(&hex[index * 2..index * 2 + 2], 16).map_err(|_| invalid())
        };

        match hex.len() {
            6 => Ok(Color::rgba(channel(0)?, channel(1)?, channel(2)?, 255)),
            8 => Ok(Color::rgba(channel(0)?, channel(1)?, channel(2)?, channel(3)?)),
            _ => Err(invalid()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: u32,
    pub height: u32,
}

impl PageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self { width: 800, height: 600 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("invalid page id: {0}")]
    InvalidId(String),
    #[error("invalid color: {0}")]
    InvalidColor(String),
    #[error("invalid dimension for {field}: {value}")]
    InvalidDimension { field: &'static str, value: String },
}

/// Persisted page properties.
///
/// The variant order is the order properties are written to page files and
/// manifests. Every conversion between property names and `PageMeta` fields
/// goes through this table, so adding a field is a compile error until both
/// `PageMeta::get` and `PageMeta::set` handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageField {
    Id,
    Name,
    Width,
    Height,
    BackgroundColor,
    BackgroundPageId,
    ParentPageId,
    Note,
}

impl PageField {
    pub const ALL: [PageField; 8] = [
        PageField::Id,
        PageField::Name,
        PageField::Width,
        PageField::Height,
        PageField::BackgroundColor,
        PageField::BackgroundPageId,
        PageField::ParentPageId,
        PageField::Note,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PageField::Id => "id",
            PageField::Name => "name",
            PageField::Width => "width",
            PageField::Height => "height",
            PageField::BackgroundColor => "backgroundColor",
            PageField::BackgroundPageId => "backgroundPageId",
            PageField::ParentPageId => "parentPageId",
            PageField::Note => "note",
        }
    }

    /// Resolves a stored property name, accepting the aliases used by
    /// single-file documents. Unknown names yield `None` and are skipped.
    pub fn from_property_name(name: &str) -> Option<Self> {
        match name {
            "id" => Some(PageField::Id),
            "name" => Some(PageField::Name),
            "width" => Some(PageField::Width),
            "height" => Some(PageField::Height),
            "backgroundColor" => Some(PageField::BackgroundColor),
            "backgroundPageId" | "background" => Some(PageField::BackgroundPageId),
            "parentPageId" | "parent" => Some(PageField::ParentPageId),
            "note" => Some(PageField::Note),
            _ => None,
        }
    }
}

/// Everything about a page that survives serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub id: PageId,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub note: String,
    pub background_color: Option<Color>,
    pub background_page_id: Option<PageId>,
    pub parent_page_id: Option<PageId>,
}

impl PageMeta {
    pub fn new(id: PageId, name: impl Into<String>, size: PageSize) -> Self {
        Self {
            id,
            name: name.into(),
            width: size.width,
            height: size.height,
            note: String::new(),
            background_color: None,
            background_page_id: None,
            parent_page_id: None,
        }
    }

    pub fn size(&self) -> PageSize {
        PageSize::new(self.width, self.height)
    }

    /// Textual value of a field, or `None` when it is empty or unset.
    pub fn get(&self, field: PageField) -> Option<String> {
        match field {
            PageField::Id => Some(self.id.to_string()),
            PageField::Name => (!self.name.is_empty()).then(|| self.name.clone()),
            PageField::Width => (self.width > 0).then(|| self.width.to_string()),
            PageField::Height => (self.height > 0).then(|| self.height.to_string()),
            PageField::BackgroundColor => self.background_color.map(|color| color.to_string()),
            PageField::BackgroundPageId => self.background_page_id.map(|id| id.to_string()),
            PageField::ParentPageId => self.parent_page_id.map(|id| id.to_string()),
            PageField::Note => (!self.note.is_empty()).then(|| self.note.clone()),
        }
    }

    pub fn set(&mut self, field: PageField, value: &str) -> Result<(), FieldError> {
        match field {
            PageField::Id => self.id = value.parse()?,
            PageField::Name => self.name = value.to_owned(),
            PageField::Width => self.width = parse_dimension("width", value)?,
            PageField::Height => self.height = parse_dimension("height", value)?,
            PageField::BackgroundColor => self.background_color = parse_optional(value)?,
            PageField::BackgroundPageId => self.background_page_id = parse_optional(value)?,
            PageField::ParentPageId => self.parent_page_id = parse_optional(value)?,
            PageField::Note => self.note = value.to_owned(),
        }
        Ok(())
    }

    /// Non-empty properties in table order.
    pub fn properties(&self) -> Vec<(PageField, String)> {
        PageField::ALL
            .iter()
            .filter_map(|field| self.get(*field).map(|value| (*field, value)))
            .collect()
    }
}

/// Stored values written by older versions for absent properties.
pub fn is_null_value(value: &str) -> bool {
    matches!(value, "" | "undefined" | "null")
}

fn parse_optional<T: FromStr<Err = FieldError>>(value: &str) -> Result<Option<T>, FieldError> {
    if is_null_value(value.trim()) {
        return Ok(None);
    }
    value.parse().map(Some)
}

fn parse_dimension(field: &'static str, value: &str) -> Result<u32, FieldError> {
    let invalid = || FieldError::InvalidDimension { field, value: value.to_owned() };
    let trimmed = value.trim();
    // Older files sometimes carry fractional sizes; truncate like an integer parse would.
    let integral = trimmed.split('.').next().unwrap_or(trimmed);
    match integral.parse::<u32>() {
        Ok(0) | Err(_) => Err(invalid()),
        Ok(parsed) => Ok(parsed),
    }
}

/// Input for creating a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSpec {
    pub name: String,
    pub size: PageSize,
    pub note: String,
    pub background_color: Option<Color>,
    pub background_page_id: Option<PageId>,
    pub parent_page_id: Option<PageId>,
}

impl PageSpec {
    pub fn new(name: impl Into<String>, size: PageSize) -> Self {
        Self { name: name.into(), size, ..Default::default() }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn with_background_color(mut self, color: Color) -> Self {
        self.background_color = Some(color);
        self
    }

    pub fn with_background_page(mut self, id: PageId) -> Self {
        self.background_page_id = Some(id);
        self
    }

    pub fn with_parent(mut self, id: PageId) -> Self {
        self.parent_page_id = Some(id);
        self
    }
}
