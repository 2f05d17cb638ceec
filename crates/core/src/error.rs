//! Error types for document and page operations

use folio_canvas::PoolError;
use folio_model::{FieldError, PageId};
use std::io;
use std::path::PathBuf;

/// Result type for document and page operations
pub type FolioResult<T> = Result<T, FolioError>;

/// Violations of the page tree and background reference rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructureError {
    #[error("page not found: {0}")]
    UnknownPage(PageId),
    #[error("duplicate page id: {0}")]
    DuplicateId(PageId),
    #[error("page {0} cannot reference itself")]
    SelfReference(PageId),
    #[error("making {parent} the parent of {page} would create a cycle")]
    ParentCycle { page: PageId, parent: PageId },
    #[error("using {background} as the background of {page} would create a cycle")]
    BackgroundCycle { page: PageId, background: PageId },
}

#[derive(Debug, thiserror::Error)]
pub enum FolioError {
    /// An operation was called on a page in the wrong materialization state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("canvas pool exhausted ({capacity} canvases)")]
    PoolExhausted { capacity: usize },

    /// No page could give up its canvas.
    #[error("invalid pool state: {0}")]
    InvalidPoolState(String),

    #[error("corrupt document archive: {0}")]
    ArchiveCorrupt(String),

    #[error("page not found: {0}")]
    PageNotFound(PageId),

    #[error("document not found: {}", .0.display())]
    DocumentNotFound(PathBuf),

    #[error("unsupported document format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("rasterization failed: {0}")]
    Rasterize(String),

    #[error(transparent)]
    Structure(#[from] StructureError),

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("storage error: {0}")]
    Storage(#[from] folio_storage::StorageError),
}

impl FolioError {
    /// Logic errors that indicate a bug in the caller rather than bad input.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FolioError::InvalidState(_) | FolioError::PoolExhausted { .. } | FolioError::InvalidPoolState(_)
        )
    }
}

impl From<PoolError> for FolioError {
    fn from(error: PoolError) -> Self {
        match error {
            PoolError::Exhausted { capacity } => FolioError::PoolExhausted { capacity },
            other => FolioError::InvalidPoolState(other.to_string()),
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for FolioError {
    fn from(error: quick_xml::events::attributes::AttrError) -> Self {
        FolioError::Xml(error.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_canvas::CanvasId;

    #[test]
    fn pool_errors_map_to_pool_variants() {
        let exhausted: FolioError = PoolError::Exhausted { capacity: 3 }.into();
        assert!(matches!(exhausted, FolioError::PoolExhausted { capacity: 3 }));

        let unknown: FolioError = PoolError::UnknownCanvas(CanvasId(9)).into();
        assert!(matches!(unknown, FolioError::InvalidPoolState(_)));
    }

    #[test]
    fn only_logic_errors_are_fatal() {
        assert!(FolioError::InvalidState("page is not materialized".into()).is_fatal());
        assert!(FolioError::InvalidPoolState("no victim".into()).is_fatal());
        assert!(!FolioError::ArchiveCorrupt("missing content.xml".into()).is_fatal());
        assert!(!FolioError::PageNotFound(PageId::new()).is_fatal());
    }
}
