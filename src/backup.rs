//! Timestamped copies of files about to be overwritten.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};

use crate::error::Result;

const TIMESTAMP: &str = "%Y%m%d_%H%M%S";

/// Backup path for `path` taken at `timestamp`:
/// `<dir>/<stem>_backup_<YYYYmmdd_HHMMSS><.ext>`.
pub fn backup_path(path: &Path, timestamp: NaiveDateTime) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut name = format!("{stem}_backup_{}", timestamp.format(TIMESTAMP));
    if let Some(ext) = path.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    path.with_file_name(name)
}

/// Copy `path` next to itself under a timestamped name.
pub fn create_backup(path: &Path) -> Result<PathBuf> {
    let backup = backup_path(path, Local::now().naive_local());
    std::fs::copy(path, &backup)?;
    tracing::debug!(source = %path.display(), backup = %backup.display(), "created backup");
    Ok(backup)
}

/// True if `path` is named like a file made by [`create_backup`].
pub fn is_backup(path: &Path) -> bool {
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    let Some((_, stamp)) = stem.rsplit_once("_backup_") else {
        return false;
    };
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP).is_ok()
}
