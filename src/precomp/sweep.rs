use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::Context as _;
use serde::Serialize;
use walkdir::WalkDir;

use crate::foundation::error::PolicyResult;
use crate::precomp::layout::PASS1_DIR;

/// Retention window applied when the caller does not pass one.
pub const DEFAULT_RETENTION_DAYS: u64 = 7;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Options for [`clean_precomp_cache`].
#[derive(Clone, Debug)]
pub struct CleanOptions {
    /// Root containing `pass1/`.
    pub cache_root: PathBuf,
    /// Keep entries modified within this many days.
    pub retention_days: Option<u64>,
    /// Reference time; the current time when `None`.
    pub now: Option<SystemTime>,
}

impl CleanOptions {
    /// Default retention for `cache_root`.
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            retention_days: None,
            now: None,
        }
    }
}

/// Outcome of [`clean_precomp_cache`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanResult {
    /// Cache entry directories that were removed.
    pub deleted_paths: Vec<PathBuf>,
    /// `<compositionId>/<cacheKey>` directories inspected.
    pub scanned_cache_directories: u64,
}

/// Delete pass-1 cache entries whose directory mtime is older than the retention window.
///
/// Only `<cacheRoot>/pass1` is swept; `final/` entries are left for external cleanup.
#[tracing::instrument(skip_all, fields(root = %opts.cache_root.display()))]
pub fn clean_precomp_cache(opts: &CleanOptions) -> PolicyResult<CleanResult> {
    let pass1_root = opts.cache_root.join(PASS1_DIR);
    if !pass1_root.is_dir() {
        return Ok(CleanResult::default());
    }

    let retention_days = opts.retention_days.unwrap_or(DEFAULT_RETENTION_DAYS);
    let now = opts.now.unwrap_or_else(SystemTime::now);
    let cutoff = now
        .checked_sub(DAY.saturating_mul(u32::try_from(retention_days).unwrap_or(u32::MAX)))
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut out = CleanResult::default();
    for dir in cache_entry_dirs(&pass1_root)? {
        out.scanned_cache_directories += 1;
        let modified = std::fs::metadata(&dir)
            .and_then(|m| m.modified())
            .with_context(|| format!("stat cache directory '{}'", dir.display()))?;
        if modified < cutoff {
            std::fs::remove_dir_all(&dir)
                .with_context(|| format!("delete cache directory '{}'", dir.display()))?;
            tracing::info!(path = %dir.display(), "deleted expired cache entry");
            out.deleted_paths.push(dir);
        }
    }

    tracing::debug!(
        scanned = out.scanned_cache_directories,
        deleted = out.deleted_paths.len(),
        retention_days,
        "cache sweep finished"
    );
    Ok(out)
}

fn cache_entry_dirs(pass1_root: &Path) -> PolicyResult<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(pass1_root)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("walk '{}'", pass1_root.display()))?;
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        }
    }
    Ok(dirs)
}

#[cfg(test)]
#[path = "../../tests/unit/precomp/sweep.rs"]
mod tests;
