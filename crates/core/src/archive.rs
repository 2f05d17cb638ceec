//! Zip document archives
//!
//! An archive is the zipped working directory: one file per page, a
//! `content.xml` manifest listing the pages in order, and the `thumbnails/`
//! and `refs/` folders.

use crate::error::{FolioError, FolioResult};
use crate::page_store::{Page, PageStore};
use crate::serializer::{self, NAMESPACE};
use crate::swap::SwapManager;
use crate::workspace::{Workspace, MANIFEST_FILE, THUMBNAILS_DIR};
use folio_canvas::Canvas;
use folio_model::{is_null_value, DocumentProperties, PageField, PageId, PageSize};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const ZIP_MAGIC: &[u8; 2] = b"PK";

/// Parsed `content.xml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub properties: DocumentProperties,
    pub pages: Vec<ManifestEntry>,
}

/// One page reference in the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Page file name relative to the archive root
    pub href: String,
    /// Reconstruction properties; empty for manifests that only list files
    pub properties: Vec<(String, String)>,
}

impl ManifestEntry {
    fn page_id(&self) -> Option<PageId> {
        self.properties
            .iter()
            .find(|(name, _)| PageField::from_property_name(name) == Some(PageField::Id))
            .and_then(|(_, value)| value.parse().ok())
            .or_else(|| PageId::from_file_name(&self.href))
    }
}

/// A document read from disk, not yet attached to a session.
#[derive(Debug)]
pub struct LoadedDocument {
    pub properties: DocumentProperties,
    pub store: PageStore,
}

/// Whether `path` starts with the zip signature.
pub fn is_archive(path: &Path) -> FolioResult<bool> {
    let mut magic = [0u8; 2];
    let mut file = File::open(path)?;
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(&magic == ZIP_MAGIC),
        Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(error) => Err(error.into()),
    }
}

pub fn write_manifest(store: &PageStore, properties: &DocumentProperties) -> FolioResult<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("p:Document");
    root.push_attribute(("xmlns:p", NAMESPACE));
    writer.write_event(Event::Start(root))?;

    serializer::write_properties(
        &mut writer,
        properties
            .iter()
            .filter(|(_, value)| !is_null_value(value))
            .map(|(name, value)| (name.clone(), value.clone())),
    )?;

    writer.write_event(Event::Start(BytesStart::new("p:Pages")))?;
    for page in store.pages() {
        let href = page
            .temp_file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| page.file_name());

        let mut element = BytesStart::new("p:Page");
        element.push_attribute(("href", href.as_str()));
        writer.write_event(Event::Start(element))?;
        serializer::write_properties(&mut writer, serializer::meta_properties(&page.meta))?;
        writer.write_event(Event::End(BytesEnd::new("p:Page")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("p:Pages")))?;

    writer.write_event(Event::End(BytesEnd::new("p:Document")))?;
    serializer::into_string(writer)
}

pub fn parse_manifest(xml: &str) -> FolioResult<Manifest> {
    let mut reader = Reader::from_str(xml);
    let mut manifest = Manifest::default();
    let mut current: Option<ManifestEntry> = None;
    let mut saw_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(element) => match element.local_name().as_ref() {
                b"Document" => saw_root = true,
                b"Page" => current = Some(ManifestEntry { href: href(&element)?, properties: Vec::new() }),
                b"Property" => {
                    let name = serializer::property_name(&element)?;
                    let value = serializer::read_element_text(&mut reader)?;
                    let Some(name) = name else { continue };
                    if is_null_value(&value) {
                        continue;
                    }
                    match current.as_mut() {
                        Some(entry) => entry.properties.push((name, value)),
                        None => {
                            manifest.properties.insert(name, value);
                        }
                    }
                }
                _ => {}
            },
            Event::Empty(element) if element.local_name().as_ref() == b"Page" => {
                manifest.pages.push(ManifestEntry { href: href(&element)?, properties: Vec::new() });
            }
            Event::End(element) if element.local_name().as_ref() == b"Page" => {
                if let Some(entry) = current.take() {
                    manifest.pages.push(entry);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(FolioError::ArchiveCorrupt("manifest has no document element".to_owned()));
    }
    Ok(manifest)
}

fn href(element: &BytesStart<'_>) -> FolioResult<String> {
    for attribute in element.attributes() {
        let attribute = attribute?;
        if attribute.key.local_name().as_ref() == b"href" {
            let value = attribute.unescape_value()?.into_owned();
            if !is_relative_href(&value) {
                break;
            }
            return Ok(value);
        }
    }
    Err(FolioError::ArchiveCorrupt("page entry without a valid href".to_owned()))
}

/// Plain relative path: no root, prefix, `.` or `..` components.
fn is_relative_href(href: &str) -> bool {
    let path = Path::new(href);
    path.components().next().is_some()
        && path.components().all(|component| matches!(component, Component::Normal(_)))
}

/// Location of a manifest entry's page file, which must stay inside the
/// workspace.
fn page_file_path(workspace: &Workspace, href: &str) -> FolioResult<PathBuf> {
    let path = workspace.path().join(href);
    if !is_relative_href(href) || !path.starts_with(workspace.path()) {
        return Err(FolioError::ArchiveCorrupt(format!("page file {href} is outside the document")));
    }
    Ok(path)
}

/// Flush materialized pages, write the manifest and zip the workspace to
/// `target`.
pub fn save<C: Canvas>(
    workspace: &Workspace,
    store: &PageStore,
    swap: &SwapManager<C>,
    properties: &DocumentProperties,
    target: &Path,
) -> FolioResult<()> {
    swap.flush_all(store)?;

    let manifest = write_manifest(store, properties)?;
    fs::write(workspace.manifest_path(), manifest)?;

    pack(workspace.path(), target)?;
    tracing::info!(path = %target.display(), pages = store.len(), "document saved");
    Ok(())
}

/// Zip every file under `dir` into `target`, replacing it atomically.
pub fn pack(dir: &Path, target: &Path) -> FolioResult<()> {
    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let staging = tempfile::NamedTempFile::new_in(&parent)?;

    let mut zip = ZipWriter::new(staging.reopen()?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    add_directory(&mut zip, dir, "", options)?;
    zip.finish()?;

    staging.persist(target).map_err(|error| error.error)?;
    Ok(())
}

fn add_directory(
    zip: &mut ZipWriter<File>,
    dir: &Path,
    prefix: &str,
    options: SimpleFileOptions,
) -> FolioResult<()> {
    let mut entries = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let name = format!("{prefix}{}", entry.file_name().to_string_lossy());
        let path = entry.path();
        if path.is_dir() {
            zip.add_directory(format!("{name}/"), options)?;
            add_directory(zip, &path, &format!("{name}/"), options)?;
        } else {
            zip.start_file(name, options)?;
            io::copy(&mut File::open(&path)?, zip)?;
        }
    }
    Ok(())
}

/// Unpack `archive` into the workspace and rebuild its pages.
///
/// Page content stays in the page files until a page is first swapped in.
pub fn load(workspace: &Workspace, archive: &Path, default_size: PageSize) -> FolioResult<LoadedDocument> {
    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(file).map_err(corrupt)?;
    zip.extract(workspace.path()).map_err(corrupt)?;
    workspace.ensure_layout()?;

    let manifest_path = workspace.manifest_path();
    if !manifest_path.is_file() {
        return Err(FolioError::ArchiveCorrupt(format!("missing {MANIFEST_FILE}")));
    }
    let manifest = parse_manifest(&fs::read_to_string(&manifest_path)?)?;

    let mut store = PageStore::new(workspace.path());
    let loaded_at = Instant::now();

    for entry in &manifest.pages {
        let path = page_file_path(workspace, &entry.href)?;
        if !path.is_file() {
            return Err(FolioError::ArchiveCorrupt(format!("missing page file {}", entry.href)));
        }

        let properties = if entry.properties.is_empty() {
            serializer::read_properties(&fs::read_to_string(&path)?)?
        } else {
            entry.properties.clone()
        };
        let meta = serializer::meta_from_properties(&properties, default_size)?;
        let id = meta.id;

        let mut page = Page::new(meta, workspace.path());
        page.temp_file_path = path;

        let thumbnail = workspace.thumbnail_path(id);
        if thumbnail.is_file() {
            page.thumb_path = Some(thumbnail);
            page.thumb_created = Some(loaded_at);
        }

        store
            .insert(page)
            .map_err(|error| FolioError::ArchiveCorrupt(error.to_string()))?;
    }

    store.resolve_references();
    tracing::info!(path = %archive.display(), pages = store.len(), "document loaded");
    Ok(LoadedDocument { properties: manifest.properties, store })
}

/// Copy the first page's thumbnail out of `archive` without unpacking it.
///
/// Returns `false` when the archive has no pages or no thumbnail for the
/// first one.
pub fn read_archive_thumbnail(archive: &Path, output: &Path) -> FolioResult<bool> {
    let mut zip = ZipArchive::new(File::open(archive)?).map_err(corrupt)?;

    let manifest = {
        let mut entry = zip
            .by_name(MANIFEST_FILE)
            .map_err(|_| FolioError::ArchiveCorrupt(format!("missing {MANIFEST_FILE}")))?;
        let mut xml = String::new();
        entry.read_to_string(&mut xml)?;
        parse_manifest(&xml)?
    };

    let Some(id) = manifest.pages.first().and_then(ManifestEntry::page_id) else {
        return Ok(false);
    };

    let mut thumbnail = match zip.by_name(&format!("{THUMBNAILS_DIR}/{id}.png")) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(false),
        Err(error) => return Err(error.into()),
    };

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    io::copy(&mut thumbnail, &mut File::create(output)?)?;
    Ok(true)
}

fn corrupt(error: zip::result::ZipError) -> FolioError {
    match error {
        zip::result::ZipError::Io(error) => FolioError::Io(error),
        other => FolioError::ArchiveCorrupt(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::ContentSource;
    use folio_canvas::{CanvasPool, MemoryCanvas};
    use folio_model::PageSpec;

    fn workspace() -> Workspace {
        Workspace::new("folio-test-").unwrap()
    }

    fn write_page(store: &PageStore, id: PageId, content: &str) {
        let page = store.get(id).unwrap();
        serializer::flush_to_disk(&page.meta, ContentSource::Fragment(content), &page.temp_file_path).unwrap();
    }

    #[test]
    fn manifest_round_trip() {
        let workspace = workspace();
        let mut store = PageStore::new(workspace.path());
        let a = store.create(PageSpec::new("A", PageSize::new(100, 50)));
        store.create(PageSpec::new("B", PageSize::default()).with_parent(a));

        let mut properties = DocumentProperties::new();
        properties.insert("author".to_owned(), "Ana".to_owned());
        properties.insert("stale".to_owned(), "undefined".to_owned());

        let manifest = parse_manifest(&write_manifest(&store, &properties).unwrap()).unwrap();

        assert_eq!(manifest.properties.get("author").map(String::as_str), Some("Ana"));
        assert!(!manifest.properties.contains_key("stale"));
        assert_eq!(manifest.pages.len(), 2);
        assert_eq!(manifest.pages[0].href, a.file_name());
        assert_eq!(manifest.pages[0].page_id(), Some(a));
    }

    #[test]
    fn save_and_load_round_trip() {
        let source = workspace();
        let mut store = PageStore::new(source.path());
        let a = store.create(PageSpec::new("A", PageSize::new(100, 50)));
        let b = store.create(PageSpec::new("B", PageSize::default()).with_parent(a).with_background_page(a));
        write_page(&store, a, "<g id=\"a\"/>");
        write_page(&store, b, "<g id=\"b\"/>");

        let swap = SwapManager::new(CanvasPool::with_capacity(1, MemoryCanvas::new).unwrap());
        let out = tempfile::tempdir().unwrap();
        let target = out.path().join("doc.epz");
        save(&source, &store, &swap, &DocumentProperties::new(), &target).unwrap();
        assert!(is_archive(&target).unwrap());

        let destination = workspace();
        let loaded = load(&destination, &target, PageSize::default()).unwrap();

        assert_eq!(loaded.store.ids(), &[a, b]);
        let page_b = loaded.store.get(b).unwrap();
        assert_eq!(page_b.meta.parent_page_id, Some(a));
        assert_eq!(page_b.meta.background_page_id, Some(a));
        assert!(!page_b.invalidated_after_load);
        assert_eq!(loaded.store.get(a).unwrap().children, vec![b]);
        assert_eq!(serializer::read_page_file(&page_b.temp_file_path).unwrap().content, "<g id=\"b\"/>");
    }

    #[test]
    fn manifest_without_properties_reads_page_files() {
        let source = workspace();
        let mut store = PageStore::new(source.path());
        let a = store.create(PageSpec::new("Only", PageSize::new(10, 20)));
        write_page(&store, a, "");

        let manifest = format!(
            "<p:Document xmlns:p=\"{NAMESPACE}\"><p:Pages><p:Page href=\"{}\"/></p:Pages></p:Document>",
            a.file_name()
        );
        fs::write(source.manifest_path(), manifest).unwrap();

        let out = tempfile::tempdir().unwrap();
        let target = out.path().join("doc.epz");
        pack(source.path(), &target).unwrap();

        let loaded = load(&workspace(), &target, PageSize::default()).unwrap();
        let page = loaded.store.get(a).unwrap();
        assert_eq!(page.meta.name, "Only");
        assert_eq!(page.meta.size(), PageSize::new(10, 20));
    }

    #[test]
    fn missing_page_file_is_corrupt() {
        let source = workspace();
        let mut store = PageStore::new(source.path());
        store.create(PageSpec::new("ghost", PageSize::default()));
        fs::write(source.manifest_path(), write_manifest(&store, &DocumentProperties::new()).unwrap()).unwrap();

        let out = tempfile::tempdir().unwrap();
        let target = out.path().join("doc.epz");
        pack(source.path(), &target).unwrap();

        let result = load(&workspace(), &target, PageSize::default());
        assert!(matches!(result, Err(FolioError::ArchiveCorrupt(_))));
    }

    #[test]
    fn hrefs_must_stay_inside_the_document() {
        for href in ["/tmp/page.xml", "../page.xml", "pages/../../page.xml", "./page.xml", ""] {
            let manifest = format!(
                "<p:Document xmlns:p=\"{NAMESPACE}\"><p:Pages><p:Page href=\"{href}\"/></p:Pages></p:Document>"
            );
            assert!(
                matches!(parse_manifest(&manifest), Err(FolioError::ArchiveCorrupt(_))),
                "{href} was accepted"
            );
        }

        let manifest = format!(
            "<p:Document xmlns:p=\"{NAMESPACE}\"><p:Pages><p:Page href=\"pages/page.xml\"/></p:Pages></p:Document>"
        );
        assert_eq!(parse_manifest(&manifest).unwrap().pages[0].href, "pages/page.xml");
    }

    #[test]
    fn absolute_page_file_outside_workspace_is_left_alone() {
        let outside = tempfile::tempdir().unwrap();
        let victim = outside.path().join("victim.xml");
        let id = PageId::new();
        let meta = folio_model::PageMeta::new(id, "victim", PageSize::default());
        serializer::flush_to_disk(&meta, ContentSource::Empty, &victim).unwrap();

        let source = workspace();
        let manifest = format!(
            "<p:Document xmlns:p=\"{NAMESPACE}\"><p:Pages><p:Page href=\"{}\"/></p:Pages></p:Document>",
            victim.display()
        );
        fs::write(source.manifest_path(), manifest).unwrap();
        let out = tempfile::tempdir().unwrap();
        let target = out.path().join("escape.epz");
        pack(source.path(), &target).unwrap();

        let destination = workspace();
        let result = load(&destination, &target, PageSize::default());

        assert!(matches!(result, Err(FolioError::ArchiveCorrupt(_))));
        assert!(victim.is_file());
    }

    #[test]
    fn missing_manifest_is_corrupt() {
        let source = workspace();
        let out = tempfile::tempdir().unwrap();
        let target = out.path().join("empty.epz");
        pack(source.path(), &target).unwrap();

        let result = load(&workspace(), &target, PageSize::default());
        assert!(matches!(result, Err(FolioError::ArchiveCorrupt(_))));
    }

    #[test]
    fn garbage_after_magic_is_corrupt() {
        let out = tempfile::tempdir().unwrap();
        let target = out.path().join("bad.epz");
        fs::write(&target, b"PK\x03\x04 definitely not a zip").unwrap();

        assert!(is_archive(&target).unwrap());
        assert!(load(&workspace(), &target, PageSize::default()).is_err());
    }

    #[test]
    fn first_thumbnail_is_extracted() {
        let source = workspace();
        let mut store = PageStore::new(source.path());
        let a = store.create(PageSpec::new("A", PageSize::default()));
        write_page(&store, a, "");
        fs::write(source.thumbnail_path(a), b"thumb").unwrap();
        fs::write(source.manifest_path(), write_manifest(&store, &DocumentProperties::new()).unwrap()).unwrap();

        let out = tempfile::tempdir().unwrap();
        let target = out.path().join("doc.epz");
        pack(source.path(), &target).unwrap();

        let thumb = out.path().join("cache").join("doc.png");
        assert!(read_archive_thumbnail(&target, &thumb).unwrap());
        assert_eq!(fs::read(&thumb).unwrap(), b"thumb");
    }
}
