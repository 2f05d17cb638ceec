//! Recently opened documents, persisted under the user's local data directory.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

const RECENT_SCHEMA_VERSION: u32 = 1;

/// Maximum number of recent documents to track
pub const MAX_RECENT_DOCUMENTS: usize = 8;

const THUMB_CACHE_DIR: &str = "thumbs";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Ordered recent-document list with a cached thumbnail per entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentDocuments {
    files: Vec<PathBuf>,
    #[serde(default)]
    thumbnails: BTreeMap<PathBuf, Option<PathBuf>>,
}

impl RecentDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent first.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn thumbnail(&self, path: &Path) -> Option<&Path> {
        self.thumbnails.get(path).and_then(|thumb| thumb.as_deref())
    }

    /// Move `path` to the front with `thumbnail` as its cached preview.
    ///
    /// The list is capped at [`MAX_RECENT_DOCUMENTS`]; entries that fall off
    /// lose their thumbnail mapping.
    pub fn add(&mut self, path: impl Into<PathBuf>, thumbnail: Option<PathBuf>) {
        let path = path.into();
        self.files.retain(|existing| existing != &path);
        self.files.insert(0, path.clone());
        self.files.truncate(MAX_RECENT_DOCUMENTS);

        let mut thumbnails = BTreeMap::new();
        for file in &self.files {
            let thumb = if file == &path {
                thumbnail.clone()
            } else {
                self.thumbnails.get(file).cloned().flatten()
            };
            thumbnails.insert(file.clone(), thumb);
        }
        self.thumbnails = thumbnails;
    }

    /// Returns `true` if the path was in the list.
    pub fn remove(&mut self, path: &Path) -> bool {
        let before = self.files.len();
        self.files.retain(|existing| existing != path);
        self.thumbnails.remove(path);
        self.files.len() != before
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.thumbnails.clear();
    }

    /// Delete every file in `cache_dir` that no entry references.
    ///
    /// Returns the number of files removed.
    pub fn prune_thumbnail_cache(&self, cache_dir: &Path) -> Result<usize, StorageError> {
        if !cache_dir.exists() {
            return Ok(0);
        }

        let used: BTreeSet<&Path> = self.thumbnails.values().filter_map(|thumb| thumb.as_deref()).collect();

        let mut removed = 0;
        for entry in fs::read_dir(cache_dir)? {
            let path = entry?.path();
            if !path.is_file() || used.contains(path.as_path()) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(error) => {
                    tracing::debug!(path = %path.display(), %error, "could not prune thumbnail");
                }
            }
        }
        Ok(removed)
    }
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecentEnvelope {
    version: u32,
    recent: RecentDocuments,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("dev", "Folio", "Folio").ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the per-entry thumbnail copies, created on demand.
    pub fn thumb_cache_dir(&self) -> Result<PathBuf, StorageError> {
        let dir = self.root.join(THUMB_CACHE_DIR);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn load_recent(&self) -> Result<RecentDocuments, StorageError> {
        let path = self.recent_path();
        if !path.exists() {
            return Ok(RecentDocuments::default());
        }

        let bytes = fs::read(path)?;
        let envelope: RecentEnvelope = serde_json::from_slice(&bytes)?;

        Ok(envelope.recent)
    }

    pub fn save_recent(&self, recent: &RecentDocuments) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let envelope = RecentEnvelope { version: RECENT_SCHEMA_VERSION, recent: recent.clone() };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(self.recent_path(), bytes)?;
        Ok(())
    }

    /// Record an opened or saved document and prune stale thumbnail copies.
    pub fn add_recent(&self, path: &Path, thumbnail: Option<PathBuf>) -> Result<RecentDocuments, StorageError> {
        let mut recent = self.load_recent()?;
        recent.add(path, thumbnail);
        recent.prune_thumbnail_cache(&self.thumb_cache_dir()?)?;
        self.save_recent(&recent)?;
        Ok(recent)
    }

    pub fn remove_recent(&self, path: &Path) -> Result<RecentDocuments, StorageError> {
        let mut recent = self.load_recent()?;
        if recent.remove(path) {
            self.save_recent(&recent)?;
        }
        Ok(recent)
    }

    fn recent_path(&self) -> PathBuf {
        self.root.join("recent_documents.json")
    }
}
