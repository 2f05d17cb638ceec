//! Folio Scheduler Library
//!
//! Deadline-based debouncing for work that should run once a burst of
//! triggers has settled, such as regenerating a page thumbnail after edits.
//!
//! Nothing here spawns threads or sleeps. The owner polls with the current
//! time and runs whatever came due, which keeps every mutation on the
//! caller's thread.
//!
//! # Example
//!
//! ```
//! use folio_scheduler::Debouncer;
//! use std::time::{Duration, Instant};
//!
//! let mut thumbnails = Debouncer::new(Duration::from_millis(3000));
//! let start = Instant::now();
//!
//! thumbnails.schedule("page-a", start);
//! // A second trigger inside the window pushes the deadline back.
//! thumbnails.schedule("page-a", start + Duration::from_millis(1000));
//!
//! assert!(thumbnails.take_due(start + Duration::from_millis(3500)).is_empty());
//! assert_eq!(thumbnails.take_due(start + Duration::from_millis(4000)), vec!["page-a"]);
//! ```

mod debounce;

pub use debounce::{Debouncer, DebouncerStats};
