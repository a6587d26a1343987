// Path metrics
// Best-effort recursive size and last-modification helpers

use super::error::SweepError;
use chrono::{DateTime, Utc};
use jwalk::{Parallelism, WalkDir};
use std::fs;
use std::path::Path;

/// Build a serial, non-following walker
/// Measurement already runs one task per candidate, so the walk itself stays on
/// the calling thread
fn walker(root: &Path) -> WalkDir {
    WalkDir::new(root)
        .parallelism(Parallelism::Serial)
        .skip_hidden(false) // .bin, .cache and dotfiles count too
        .follow_links(false) // Don't follow symlinks to avoid loops and double counting
}

/// The root must be a readable directory; everything below it is best-effort
fn check_root(root: &Path, operation: &str) -> Result<(), SweepError> {
    fs::read_dir(root)
        .map(|_| ())
        .map_err(|e| SweepError::from_io_error(e, operation, Some(root.to_path_buf())))
}

/// Sum the sizes of all non-directory entries under `root`
///
/// Entries whose metadata cannot be read contribute zero. Symbolic links are
/// counted by their own size, never by their target.
pub fn directory_size(root: &Path) -> Result<u64, SweepError> {
    check_root(root, "measuring directory")?;

    let mut total = 0u64;
    for entry in walker(root).into_iter().flatten() {
        if entry.file_type().is_dir() {
            continue;
        }
        if let Ok(metadata) = entry.metadata() {
            total += metadata.len();
        }
    }

    Ok(total)
}

/// Latest modification time among all non-directory entries under `root`
///
/// Returns the Unix epoch when the subtree holds no readable files.
pub fn last_modified(root: &Path) -> Result<DateTime<Utc>, SweepError> {
    check_root(root, "reading modification times in")?;

    let mut latest = DateTime::<Utc>::UNIX_EPOCH;
    for entry in walker(root).into_iter().flatten() {
        if entry.file_type().is_dir() {
            continue;
        }
        let modified = entry
            .metadata()
            .ok()
            .and_then(|metadata| metadata.modified().ok())
            .map(DateTime::<Utc>::from);
        if let Some(modified) = modified {
            if modified > latest {
                latest = modified;
            }
        }
    }

    Ok(latest)
}

/// Whole days between `last_modified` and `now`, floor-truncated and never negative
pub fn staleness_days(last_modified: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let hours = (now - last_modified).num_hours();
    if hours <= 0 {
        0
    } else {
        (hours / 24) as u64
    }
}
