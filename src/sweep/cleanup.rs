// Candidate cleanup
// Deletes a directory tree first, then patches the index to match

use super::error::SweepError;
use super::index::Index;
use super::path_utils;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Deletes candidate directories and keeps the index consistent
pub struct Cleaner {
    index: Arc<Index>,
}

impl Cleaner {
    /// Create a Cleaner over the process-wide index
    pub fn new() -> Self {
        Self::with_index(Index::global())
    }

    pub fn with_index(index: Arc<Index>) -> Self {
        Self { index }
    }

    /// Delete one candidate directory and drop it from the index
    ///
    /// Nothing is touched unless `path` is an existing directory. Once the tree
    /// is removed the deletion stands: a failure to update the index afterwards
    /// is reported as `IndexReconcileFailed` and never rolled back.
    pub fn delete(&self, path: &Path) -> Result<(), SweepError> {
        // symlink_metadata so a link to a directory is rejected rather than followed
        let metadata = fs::symlink_metadata(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SweepError::CandidateNotFound {
                path: path.to_path_buf(),
            },
            _ => SweepError::from_io_error(e, "inspecting", Some(path.to_path_buf())),
        })?;
        if !metadata.is_dir() {
            return Err(SweepError::NotADirectory {
                path: path.to_path_buf(),
            });
        }

        // Resolve the key before the directory disappears
        let key = path_utils::try_canonicalize(path)
            .map_err(|e| SweepError::from_io_error(e, "resolving", Some(path.to_path_buf())))?;

        fs::remove_dir_all(&key).map_err(|e| SweepError::DeletionFailed {
            path: key.clone(),
            source: e,
        })?;
        info!("deleted {}", key.display());

        self.reconcile(&key).inspect_err(|e| {
            warn!("{} deleted but index is stale: {}", key.display(), e.headline());
        })
    }

    /// Delete each path in order, collecting every outcome
    ///
    /// A failure on one path does not stop the others, and nothing is undone.
    pub fn delete_all<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<(PathBuf, Result<(), SweepError>)> {
        paths
            .iter()
            .map(|path| {
                let path = path.as_ref();
                (path.to_path_buf(), self.delete(path))
            })
            .collect()
    }

    fn reconcile(&self, key: &Path) -> Result<(), SweepError> {
        let reconcile_error = |e: SweepError| SweepError::IndexReconcileFailed {
            path: key.to_path_buf(),
            reason: e.headline(),
        };

        // No index on disk means nothing to reconcile
        if !self.index.load().map_err(reconcile_error)? {
            return Ok(());
        }

        self.index.delete(key);
        self.index.save().map_err(reconcile_error)
    }
}

impl Default for Cleaner {
    fn default() -> Self {
        Self::new()
    }
}
