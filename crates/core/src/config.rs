//! Session configuration
//!
//! Settings can be built programmatically or read from `FOLIO_*`
//! environment variables on top of the defaults.

use folio_model::PageSize;
use folio_storage::Storage;
use std::env;
use std::time::Duration;

/// Longest side of a page thumbnail in pixels
pub const THUMBNAIL_SIZE: u32 = 256;

pub const DEFAULT_TEMP_PREFIX: &str = "folio-";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub thumbnail_size: u32,
    /// Quiet period after the last edit before a thumbnail is regenerated
    pub thumbnail_delay: Duration,
    /// Size given to new pages when none is requested
    pub default_page_size: PageSize,
    /// Prefix of the per-document working directory
    pub temp_prefix: String,
    /// Where recently used documents are recorded, if anywhere
    pub storage: Option<Storage>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            thumbnail_size: THUMBNAIL_SIZE,
            thumbnail_delay: crate::invalidation::THUMBNAIL_DELAY,
            default_page_size: PageSize::default(),
            temp_prefix: DEFAULT_TEMP_PREFIX.to_owned(),
            storage: None,
        }
    }
}

impl SessionConfig {
    pub fn with_thumbnail_size(mut self, size: u32) -> Self {
        self.thumbnail_size = size;
        self
    }

    pub fn with_thumbnail_delay(mut self, delay: Duration) -> Self {
        self.thumbnail_delay = delay;
        self
    }

    pub fn with_default_page_size(mut self, size: PageSize) -> Self {
        self.default_page_size = size;
        self
    }

    pub fn with_temp_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.temp_prefix = prefix.into();
        self
    }

    pub fn with_storage(mut self, storage: Storage) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Defaults overridden by environment variables.
    ///
    /// - `FOLIO_THUMBNAIL_SIZE`: thumbnail size in pixels
    /// - `FOLIO_THUMBNAIL_DELAY_MS`: thumbnail quiet period in milliseconds
    /// - `FOLIO_PAGE_WIDTH` / `FOLIO_PAGE_HEIGHT`: default page size
    /// - `FOLIO_TEMP_PREFIX`: working directory prefix
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(size) = read_var("FOLIO_THUMBNAIL_SIZE")? {
            config.thumbnail_size = size;
        }
        if let Some(delay) = read_var::<u64>("FOLIO_THUMBNAIL_DELAY_MS")? {
            config.thumbnail_delay = Duration::from_millis(delay);
        }
        if let Some(width) = read_var("FOLIO_PAGE_WIDTH")? {
            config.default_page_size.width = width;
        }
        if let Some(height) = read_var("FOLIO_PAGE_HEIGHT")? {
            config.default_page_size.height = height;
        }
        if let Ok(prefix) = env::var("FOLIO_TEMP_PREFIX") {
            if !prefix.is_empty() {
                config.temp_prefix = prefix;
            }
        }

        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

fn read_var<T: std::str::FromStr + PartialEq + Default>(name: &'static str) -> Result<Option<T>, ConfigError> {
    let Ok(value) = env::var(name) else {
        return Ok(None);
    };
    match value.trim().parse::<T>() {
        Ok(parsed) if parsed != T::default() => Ok(Some(parsed)),
        _ => Err(ConfigError::InvalidValue { name, value }),
    }
}
