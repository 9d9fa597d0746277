//! Persistence of crawl output.
//!
//! # Submodules
//!
//! - [`json`]: writes each [`TalkRecord`] to its own JSON file
//! - [`page_list`]: reads and writes listing-page lists used to resume a crawl
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── Do_schools_kill_creativity?.json       # single-language mode
//! ├── al-Do_schools_kill_creativity?.json    # all-languages mode
//! └── resume-pages.txt                       # written when a crawl halts
//! ```

pub mod json;
pub mod page_list;

use crate::error::Result;
use crate::models::TalkRecord;

/// Somewhere records can be written, one named unit per record.
pub trait RecordStore {
    /// Persist `record` under `name`, returning where it went.
    async fn store(&self, name: &str, record: &TalkRecord) -> Result<String>;
}

impl<T: RecordStore + ?Sized> RecordStore for &T {
    async fn store(&self, name: &str, record: &TalkRecord) -> Result<String> {
        (**self).store(name, record).await
    }
}
