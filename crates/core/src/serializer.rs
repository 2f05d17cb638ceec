//! Page file reading and writing
//!
//! A page file holds the page's properties followed by its drawing content.
//! The content is stored verbatim inside `<p:Content>`, so a page that is
//! never materialized round-trips byte for byte.

use crate::error::{FolioError, FolioResult};
use folio_canvas::Canvas;
use folio_model::{is_null_value, PageField, PageId, PageMeta, PageSize};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::fs;
use std::io::Cursor;
use std::path::Path;

pub const NAMESPACE: &str = "http://www.evolus.vn/Namespace/Pencil";

/// Where the drawing content of a page comes from when it is written.
pub enum ContentSource<'a> {
    /// The page's live surface
    Canvas(&'a dyn Canvas),
    /// An already serialized fragment, written unchanged
    Fragment(&'a str),
    Empty,
}

impl ContentSource<'_> {
    fn content(&self) -> String {
        match self {
            ContentSource::Canvas(canvas) => canvas.content(),
            ContentSource::Fragment(fragment) => (*fragment).to_owned(),
            ContentSource::Empty => String::new(),
        }
    }
}

/// A parsed page file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageDocument {
    /// Stored properties in file order, null values already removed
    pub properties: Vec<(String, String)>,
    /// Raw inner XML of the content element
    pub content: String,
}

impl PageDocument {
    pub fn meta(&self, default_size: PageSize) -> FolioResult<PageMeta> {
        meta_from_properties(&self.properties, default_size)
    }
}

/// Serialize a page's properties and content to a complete page file.
pub fn serialize(meta: &PageMeta, source: ContentSource<'_>) -> FolioResult<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("p:Page");
    root.push_attribute(("xmlns:p", NAMESPACE));
    writer.write_event(Event::Start(root))?;

    write_properties(&mut writer, meta_properties(meta))?;

    let content = source.content();
    if content.is_empty() {
        writer.write_event(Event::Empty(BytesStart::new("p:Content")))?;
    } else {
        writer.write_event(Event::Start(BytesStart::new("p:Content")))?;
        writer.write_event(Event::Text(BytesText::from_escaped(content.as_str())))?;
        writer.write_event(Event::End(BytesEnd::new("p:Content")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("p:Page")))?;
    into_string(writer)
}

/// Parse a page file into its properties and raw content.
pub fn deserialize(xml: &str) -> FolioResult<PageDocument> {
    parse_page(xml, true)
}

/// Read only the property block of a page file.
pub fn read_properties(xml: &str) -> FolioResult<Vec<(String, String)>> {
    parse_page(xml, false).map(|document| document.properties)
}

/// Serialize a page and write it to `path`.
pub fn flush_to_disk(meta: &PageMeta, source: ContentSource<'_>, path: &Path) -> FolioResult<()> {
    let xml = serialize(meta, source)?;
    fs::write(path, xml)?;
    tracing::trace!(page = %meta.id, path = %path.display(), "page flushed");
    Ok(())
}

/// Read and parse the page file at `path`.
pub fn read_page_file(path: &Path) -> FolioResult<PageDocument> {
    let xml = fs::read_to_string(path)?;
    deserialize(&xml)
}

/// Properties of `meta` as name/value pairs in table order.
pub fn meta_properties(meta: &PageMeta) -> Vec<(String, String)> {
    meta.properties()
        .into_iter()
        .map(|(field, value)| (field.name().to_owned(), value))
        .collect()
}

/// Build page metadata from stored properties.
///
/// The id is mandatory. Unknown names are skipped; malformed values are
/// logged and left at their defaults.
pub fn meta_from_properties(properties: &[(String, String)], default_size: PageSize) -> FolioResult<PageMeta> {
    let id = properties
        .iter()
        .find(|(name, _)| PageField::from_property_name(name) == Some(PageField::Id))
        .map(|(_, value)| value.parse::<PageId>())
        .transpose()?
        .ok_or_else(|| FolioError::ArchiveCorrupt("page without id".to_owned()))?;

    let mut meta = PageMeta::new(id, "", default_size);
    apply_properties(&mut meta, properties);
    Ok(meta)
}

/// Copy every recognized property except the id onto `meta`.
pub fn apply_properties(meta: &mut PageMeta, properties: &[(String, String)]) {
    for (name, value) in properties {
        let Some(field) = PageField::from_property_name(name) else {
            tracing::trace!(property = %name, "skipping unknown page property");
            continue;
        };
        if field == PageField::Id || is_null_value(value) {
            continue;
        }
        if let Err(error) = meta.set(field, value) {
            tracing::warn!(page = %meta.id, property = %name, %error, "ignoring malformed page property");
        }
    }
}

pub(crate) fn write_properties<W: std::io::Write>(
    writer: &mut Writer<W>,
    properties: impl IntoIterator<Item = (String, String)>,
) -> FolioResult<()> {
    writer.write_event(Event::Start(BytesStart::new("p:Properties")))?;
    for (name, value) in properties {
        let mut property = BytesStart::new("p:Property");
        property.push_attribute(("name", name.as_str()));
        writer.write_event(Event::Start(property))?;
        writer.write_event(Event::Text(BytesText::new(&value)))?;
        writer.write_event(Event::End(BytesEnd::new("p:Property")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("p:Properties")))?;
    Ok(())
}

pub(crate) fn into_string(writer: Writer<Cursor<Vec<u8>>>) -> FolioResult<String> {
    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|error| FolioError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, error)))
}

/// Name attribute of a `Property` element.
pub(crate) fn property_name(element: &BytesStart<'_>) -> FolioResult<Option<String>> {
    for attribute in element.attributes() {
        let attribute = attribute?;
        if attribute.key.local_name().as_ref() == b"name" {
            return Ok(Some(attribute.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Collect the text of the element whose start tag was just read, up to its
/// matching end tag.
pub(crate) fn read_element_text(reader: &mut Reader<&[u8]>) -> FolioResult<String> {
    let mut text = String::new();
    let mut depth = 0usize;
    loop {
        match reader.read_event()? {
            Event::Text(raw) => text.push_str(&raw.unescape()?),
            Event::CData(raw) => text.push_str(&String::from_utf8_lossy(&raw.into_inner())),
            Event::Start(_) => depth += 1,
            Event::End(_) if depth == 0 => return Ok(text),
            Event::End(_) => depth -= 1,
            Event::Eof => return Err(FolioError::ArchiveCorrupt("unterminated property".to_owned())),
            _ => {}
        }
    }
}

/// Raw inner XML of the element whose start tag was just read.
pub(crate) fn read_raw_inner<'a>(reader: &mut Reader<&'a [u8]>, xml: &'a str, start: &BytesStart<'a>) -> FolioResult<String> {
    let span = reader.read_to_end(start.name())?;
    let start = usize::try_from(span.start).unwrap_or(usize::MAX);
    let end = usize::try_from(span.end).unwrap_or(usize::MAX);
    xml.get(start..end)
        .map(str::to_owned)
        .ok_or_else(|| FolioError::ArchiveCorrupt("content span out of range".to_owned()))
}

fn parse_page(xml: &str, with_content: bool) -> FolioResult<PageDocument> {
    let mut reader = Reader::from_str(xml);
    let mut document = PageDocument::default();
    let mut saw_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(element) => match element.local_name().as_ref() {
                b"Page" => saw_root = true,
                b"Property" => {
                    let name = property_name(&element)?;
                    let value = read_element_text(&mut reader)?;
                    if let Some(name) = name {
                        if !is_null_value(&value) {
                            document.properties.push((name, value));
                        }
                    }
                }
                b"Content" => {
                    if !with_content {
                        break;
                    }
                    document.content = read_raw_inner(&mut reader, xml, &element)?;
                }
                _ => {}
            },
            Event::Empty(element) => {
                if element.local_name().as_ref() == b"Content" && !with_content {
                    break;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(FolioError::ArchiveCorrupt("not a page file".to_owned()));
    }
    Ok(document)
}
