//! JSON file output for talk records.
//!
//! Each record is written once, pretty-printed with a 2-space indent, to
//! `{output_dir}/{name}` where `name` comes from [`TalkRecord::file_name`].

use crate::error::{CrawlError, Result};
use crate::models::TalkRecord;
use crate::outputs::RecordStore;
use crate::utils::ensure_writable_dir;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

/// A directory of JSON files, one per talk.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    /// Open `dir`, creating it if needed and checking it is writable.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        ensure_writable_dir(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl RecordStore for JsonDirStore {
    #[instrument(level = "info", skip(self, record), fields(dir = %self.dir.display()))]
    async fn store(&self, name: &str, record: &TalkRecord) -> Result<String> {
        let json = serde_json::to_string_pretty(record)?;
        let path = self.dir.join(name);
        fs::write(&path, json)
            .await
            .map_err(|e| CrawlError::storage(&path, e))?;
        info!(path = %path.display(), "Wrote talk record");
        Ok(path.display().to_string())
    }
}
