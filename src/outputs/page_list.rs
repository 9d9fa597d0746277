//! Listing-page lists on disk, one URL per line.
//!
//! Written by `discover` and by a halted crawl; read back by `crawl --page-list`
//! to resume without walking pagination again.

use crate::error::{CrawlError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

/// File name a halted crawl writes its remaining pages to.
pub const RESUME_FILE: &str = "resume-pages.txt";

#[instrument(level = "info", skip(pages), fields(count = pages.len()))]
pub async fn write_page_list(path: &Path, pages: &[String]) -> Result<()> {
    let mut body = pages.join("\n");
    body.push('\n');
    fs::write(path, body)
        .await
        .map_err(|e| CrawlError::storage(path, e))?;
    info!(path = %path.display(), "Wrote page list");
    Ok(())
}

/// Read a page list, ignoring blank lines and `#` comments.
#[instrument(level = "info")]
pub async fn read_page_list(path: &Path) -> Result<Vec<String>> {
    let body = fs::read_to_string(path)
        .await
        .map_err(|e| CrawlError::storage(path, e))?;
    let pages: Vec<String> = body
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect();
    if pages.is_empty() {
        return Err(CrawlError::Config(format!(
            "page list {} is empty",
            path.display()
        )));
    }
    Ok(pages)
}

/// Write the pages a halted crawl did not finish to `output_dir`.
///
/// Returns the file written, or `None` when nothing remains.
pub async fn save_resume_list(output_dir: &Path, remaining: &[String]) -> Result<Option<PathBuf>> {
    if remaining.is_empty() {
        return Ok(None);
    }
    let path = output_dir.join(RESUME_FILE);
    write_page_list(&path, remaining).await?;
    Ok(Some(path))
}
