//! Single-file XML documents written by older versions
//!
//! The whole document, every page's content included, lives in one XML file.
//! Importing splits it into page files inside the workspace; thumbnails are
//! not stored in this format and have to be regenerated.

use crate::archive::LoadedDocument;
use crate::error::{FolioError, FolioResult};
use crate::page_store::{Page, PageStore};
use crate::serializer::{self, ContentSource};
use crate::workspace::Workspace;
use folio_model::{is_null_value, DocumentProperties, PageField, PageId, PageMeta, PageSize};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs;
use std::path::Path;

/// File extensions accepted for single-file documents.
pub const LEGACY_EXTENSIONS: [&str; 2] = ["ep", "epz"];

#[derive(Debug, Default)]
struct LegacyPage {
    properties: Vec<(String, String)>,
    content: String,
}

pub fn has_legacy_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| LEGACY_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// Import a single-file document into `workspace`.
pub fn load(workspace: &Workspace, path: &Path, default_size: PageSize) -> FolioResult<LoadedDocument> {
    if !has_legacy_extension(path) {
        return Err(FolioError::UnsupportedFormat(path.to_path_buf()));
    }

    let xml = fs::read_to_string(path)?;
    let (properties, pages) =
        parse(xml.trim_start_matches('\u{feff}'))?.ok_or_else(|| FolioError::UnsupportedFormat(path.to_path_buf()))?;

    let mut store = PageStore::new(workspace.path());
    for legacy in pages {
        let meta = page_meta(&legacy.properties, default_size)?;
        let page = Page::new(meta, workspace.path());

        serializer::flush_to_disk(&page.meta, ContentSource::Fragment(&legacy.content), &page.temp_file_path)?;
        store
            .insert(page)
            .map_err(|error| FolioError::ArchiveCorrupt(error.to_string()))?;
    }

    store.resolve_references();
    tracing::info!(path = %path.display(), pages = store.len(), "single-file document imported");
    Ok(LoadedDocument { properties, store })
}

fn page_meta(properties: &[(String, String)], default_size: PageSize) -> FolioResult<PageMeta> {
    let has_id = properties
        .iter()
        .any(|(name, _)| PageField::from_property_name(name) == Some(PageField::Id));
    if has_id {
        return serializer::meta_from_properties(properties, default_size);
    }

    let mut meta = PageMeta::new(PageId::new(), "", default_size);
    tracing::debug!(page = %meta.id, "page without id, assigning a new one");
    serializer::apply_properties(&mut meta, properties);
    Ok(meta)
}

/// `None` when the file has no document element.
fn parse(xml: &str) -> FolioResult<Option<(DocumentProperties, Vec<LegacyPage>)>> {
    let mut reader = Reader::from_str(xml);
    let mut properties = DocumentProperties::new();
    let mut pages = Vec::new();
    let mut current: Option<LegacyPage> = None;
    let mut saw_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(element) => match element.local_name().as_ref() {
                b"Document" => saw_root = true,
                b"Page" => current = Some(LegacyPage::default()),
                b"Property" => {
                    let name = serializer::property_name(&element)?;
                    let value = serializer::read_element_text(&mut reader)?;
                    let Some(name) = name else { continue };
                    if is_null_value(&value) {
                        continue;
                    }
                    match current.as_mut() {
                        Some(page) => page.properties.push((name, value)),
                        None => {
                            properties.insert(name, value);
                        }
                    }
                }
                b"Content" => {
                    let content = serializer::read_raw_inner(&mut reader, xml, &element)?;
                    if let Some(page) = current.as_mut() {
                        page.content = content;
                    }
                }
                _ => {}
            },
            Event::End(element) if element.local_name().as_ref() == b"Page" => {
                if let Some(page) = current.take() {
                    pages.push(page);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(saw_root.then_some((properties, pages)))
}
