//! Per-document working directory
//!
//! Holds the page files, the `thumbnails/` and `refs/` subdirectories and the
//! manifest while a document is open. Saving zips this directory as is.
//! Composed page bitmaps go to a second directory so they never end up in the
//! archive. Both are removed when the workspace is dropped.

use crate::error::FolioResult;
use folio_model::PageId;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

pub const MANIFEST_FILE: &str = "content.xml";
pub const THUMBNAILS_DIR: &str = "thumbnails";
pub const REFS_DIR: &str = "refs";

#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    bitmaps: TempDir,
}

impl Workspace {
    pub fn new(prefix: &str) -> FolioResult<Self> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
        let bitmaps = tempfile::Builder::new()
            .prefix(&format!("{prefix}bitmaps-"))
            .tempdir()?;

        fs::create_dir_all(dir.path().join(THUMBNAILS_DIR))?;
        fs::create_dir_all(dir.path().join(REFS_DIR))?;

        tracing::debug!(dir = %dir.path().display(), "workspace created");
        Ok(Self { dir, bitmaps })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.path().join(MANIFEST_FILE)
    }

    pub fn page_path(&self, id: PageId) -> PathBuf {
        self.path().join(id.file_name())
    }

    pub fn thumbnails_dir(&self) -> PathBuf {
        self.path().join(THUMBNAILS_DIR)
    }

    pub fn thumbnail_path(&self, id: PageId) -> PathBuf {
        self.thumbnails_dir().join(format!("{id}.png"))
    }

    pub fn refs_dir(&self) -> PathBuf {
        self.path().join(REFS_DIR)
    }

    pub fn bitmap_dir(&self) -> &Path {
        self.bitmaps.path()
    }

    pub fn bitmap_path(&self, id: PageId) -> PathBuf {
        self.bitmap_dir().join(format!("{id}.png"))
    }

    /// Recreate the fixed subdirectories, e.g. after unpacking an archive
    /// that lacked them.
    pub fn ensure_layout(&self) -> FolioResult<()> {
        fs::create_dir_all(self.thumbnails_dir())?;
        fs::create_dir_all(self.refs_dir())?;
        Ok(())
    }

    /// Copy an external file into the document and return its reference id.
    ///
    /// The id is a fresh UUID followed by the source's extension, or `.data`
    /// when it has none.
    pub fn copy_as_ref(&self, source: &Path) -> FolioResult<String> {
        let extension = source
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_else(|| ".data".to_owned());
        let id = format!("{}{extension}", Uuid::new_v4());

        fs::create_dir_all(self.refs_dir())?;
        fs::copy(source, self.ref_path(&id))?;
        tracing::debug!(source = %source.display(), %id, "copied reference asset");
        Ok(id)
    }

    pub fn ref_path(&self, id: &str) -> PathBuf {
        self.refs_dir().join(id)
    }

    /// `file://` URL of a reference asset.
    pub fn ref_id_to_url(&self, id: &str) -> String {
        file_url(&self.ref_path(id))
    }
}

pub(crate) fn file_url(path: &Path) -> String {
    let display = path.to_string_lossy().replace('\\', "/");
    if display.starts_with('/') {
        format!("file://{display}")
    } else {
        format!("file:///{display}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_created() {
        let workspace = Workspace::new("folio-test-").unwrap();
        assert!(workspace.thumbnails_dir().is_dir());
        assert!(workspace.refs_dir().is_dir());
        assert!(!workspace.bitmap_dir().starts_with(workspace.path()));

        let id = PageId::new();
        assert_eq!(workspace.page_path(id).file_name().unwrap().to_string_lossy(), id.file_name());
    }

    #[test]
    fn workspace_is_removed_on_drop() {
        let workspace = Workspace::new("folio-test-").unwrap();
        let path = workspace.path().to_path_buf();
        drop(workspace);
        assert!(!path.exists());
    }

    #[test]
    fn copy_as_ref_keeps_extension() {
        let source_dir = tempfile::tempdir().unwrap();
        let image = source_dir.path().join("logo.png");
        let blob = source_dir.path().join("blob");
        fs::write(&image, b"png").unwrap();
        fs::write(&blob, b"raw").unwrap();

        let workspace = Workspace::new("folio-test-").unwrap();
        let image_id = workspace.copy_as_ref(&image).unwrap();
        let blob_id = workspace.copy_as_ref(&blob).unwrap();

        assert!(image_id.ends_with(".png"));
        assert!(blob_id.ends_with(".data"));
        assert_eq!(fs::read(workspace.ref_path(&image_id)).unwrap(), b"png");

        let url = workspace.ref_id_to_url(&image_id);
        assert!(url.starts_with("file://"));
        assert!(url.ends_with(&image_id));
    }
}
