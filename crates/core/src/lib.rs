//! Page lifecycle for diagram documents
//!
//! A document is an ordered list of pages. Only a bounded number of pages
//! hold a live canvas at any time; the rest are kept as page files in a
//! per-document working directory and swapped back in on demand. Saving
//! zips the working directory into a single archive.
//!
//! [`Session`] ties the pieces together:
//!
//! - [`page_store`]: pages, document order, parent/child and background links
//! - [`serializer`]: the page file format
//! - [`swap`]: least recently used materialization onto pooled canvases
//! - [`invalidation`]: cached bitmap invalidation and debounced thumbnails
//! - [`archive`] and [`legacy`]: reading and writing documents
//! - [`workspace`]: the working directory and reference assets

pub mod archive;
pub mod config;
pub mod error;
pub mod invalidation;
pub mod legacy;
pub mod page_store;
pub mod rasterizer;
pub mod serializer;
pub mod session;
pub mod swap;
pub mod workspace;

pub use archive::{LoadedDocument, Manifest, ManifestEntry};
pub use config::{ConfigError, SessionConfig, THUMBNAIL_SIZE};
pub use error::{FolioError, FolioResult, StructureError};
pub use invalidation::{InvalidationTracker, THUMBNAIL_DELAY};
pub use page_store::{BackgroundPolicy, ClearBackground, DeletedPage, Direction, Page, PageStore, UseDeletedBackground};
pub use rasterizer::{NoopRasterizer, RasterJob, Rasterizer};
pub use serializer::{ContentSource, PageDocument};
pub use session::{PageUpdate, Session, SessionEvent};
pub use swap::SwapManager;
pub use workspace::Workspace;
