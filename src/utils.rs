//! Utility functions for dates, file names and file system checks.
//!
//! - Collection-date stamping for records
//! - Posted-date conversion from the listing format
//! - File name derivation from talk titles
//! - Output directory validation

use crate::error::{CrawlError, Result};
use chrono::{Local, NaiveDate};
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Today's local date as `YYYY-MM-DD`.
///
/// Every record built during one run carries the date of the run, not of the talk.
pub fn collection_date() -> String {
    Local::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Convert a listing date such as `"Jun 2006"` to `"2006-06-01"`.
///
/// `format` is a `chrono` format string. Formats without a day component are
/// pinned to the first of the month. Returns `None` when the text does not
/// match the format.
pub fn convert_posted_date(raw: &str, format: &str) -> Option<String> {
    let raw = raw.trim();
    let parsed = NaiveDate::parse_from_str(raw, format).or_else(|_| {
        NaiveDate::parse_from_str(&format!("01 {raw}"), &format!("%d {format}"))
    });
    parsed.ok().map(|d| d.format("%Y-%m-%d").to_string())
}

/// Derive the JSON file name for a talk title.
///
/// Every whitespace character becomes `_`, path separators and control
/// characters are removed, and `.json` is appended after `prefix`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(record_file_name("", "A Talk: About Things"), "A_Talk:_About_Things.json");
/// assert_eq!(record_file_name("al-", "Yes/No"), "al-YesNo.json");
/// ```
pub fn record_file_name(prefix: &str, title: &str) -> String {
    let stem: String = title
        .chars()
        .filter(|c| !matches!(c, '/' | '\\') && !(c.is_control() && !c.is_whitespace()))
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    let stem = match stem.as_str() {
        "" | "." | ".." => "untitled".to_string(),
        _ => stem,
    };
    format!("{prefix}{stem}.json")
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then writes and removes a probe
/// file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| CrawlError::storage(path, e))?;
    let probe_path = path.join("..__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(CrawlError::storage(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_file_name_replaces_spaces_only() {
        assert_eq!(
            record_file_name("", "A Talk: About Things"),
            "A_Talk:_About_Things.json"
        );
    }

    #[test]
    fn test_record_file_name_whitespace_and_separators() {
        assert_eq!(record_file_name("al-", "Yes/No\tMaybe"), "al-YesNo_Maybe.json");
        assert_eq!(record_file_name("", "two  spaces"), "two__spaces.json");
        assert_eq!(record_file_name("", "back\\slash"), "backslash.json");
        assert_eq!(record_file_name("", "/"), "untitled.json");
    }

    #[test]
    fn test_convert_posted_date() {
        assert_eq!(
            convert_posted_date("Jun 2006", "%b %Y").as_deref(),
            Some("2006-06-01")
        );
        assert_eq!(
            convert_posted_date(" Feb 2019 \n", "%b %Y").as_deref(),
            Some("2019-02-01")
        );
        assert_eq!(
            convert_posted_date("2019-02-14", "%Y-%m-%d").as_deref(),
            Some("2019-02-14")
        );
        assert_eq!(convert_posted_date("sometime", "%b %Y"), None);
    }

    #[test]
    fn test_collection_date_shape() {
        let today = collection_date();
        assert_eq!(today.len(), 10);
        assert!(NaiveDate::parse_from_str(&today, "%Y-%m-%d").is_ok());
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        ensure_writable_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert!(!nested.join("..__probe_write__").exists());
    }
}
