// Centralized error handling module
// Error types with path context for scanning, indexing and cleanup

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Main error type for the sweep engine
#[derive(Debug)]
pub enum SweepError {
    /// File system errors with context
    DirectoryNotFound { path: PathBuf },
    PermissionDenied { path: PathBuf, operation: String },
    IoError { path: Option<PathBuf>, operation: String, source: io::Error },

    /// Index errors
    IndexParseError { path: PathBuf, reason: String },
    IndexWriteError { path: PathBuf, reason: String },

    /// Cleanup pre-condition and deletion errors
    CandidateNotFound { path: PathBuf },
    NotADirectory { path: PathBuf },
    DeletionFailed { path: PathBuf, source: io::Error },

    /// The directory is gone but the index could not be patched
    IndexReconcileFailed { path: PathBuf, reason: String },

    /// CLI errors
    InvalidStaleness { value: String },
}

impl fmt::Display for SweepError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SweepError::DirectoryNotFound { path } => {
                write!(f, "Directory not found: {}\n", path.display())?;
                write!(f, "Suggestion: Check that the directory path is correct and the directory exists")
            }
            SweepError::PermissionDenied { path, operation } => {
                write!(f, "Permission denied while {}: {}\n", operation, path.display())?;
                write!(f, "Suggestion: Check directory permissions or run with appropriate privileges")
            }
            SweepError::IoError { path, operation, source } => {
                if let Some(p) = path {
                    write!(f, "I/O error while {} {}: {}\n", operation, p.display(), source)?;
                } else {
                    write!(f, "I/O error while {}: {}\n", operation, source)?;
                }
                write!(f, "Suggestion: Check permissions and disk space")
            }

            SweepError::IndexParseError { path, reason } => {
                write!(f, "Error parsing index {}: {}\n", path.display(), reason)?;
                write!(f, "Suggestion: Run the scan with --reset-cache to rebuild the index")
            }
            SweepError::IndexWriteError { path, reason } => {
                write!(f, "Failed to write index {}: {}\n", path.display(), reason)?;
                write!(f, "Suggestion: Check disk space and write permissions")
            }

            SweepError::CandidateNotFound { path } => {
                write!(f, "{} does not exist or has already been deleted\n", path.display())?;
                write!(f, "Suggestion: Rescan to refresh the list of directories")
            }
            SweepError::NotADirectory { path } => {
                write!(f, "Not a directory: {}\n", path.display())?;
                write!(f, "Suggestion: Only directories reported by a scan can be cleaned")
            }
            SweepError::DeletionFailed { path, source } => {
                write!(f, "Failed to delete {}: {}\n", path.display(), source)?;
                write!(f, "Suggestion: Check that no process holds files open inside the directory")
            }

            SweepError::IndexReconcileFailed { path, reason } => {
                write!(f, "Deleted {} but the index could not be updated: {}\n", path.display(), reason)?;
                write!(f, "Suggestion: The directory is gone; rescan with --reset-cache to refresh the index")
            }

            SweepError::InvalidStaleness { value } => {
                write!(f, "Invalid staleness value: {}\n", value)?;
                write!(f, "Suggestion: Use a whole number of days, or a number followed by d, h, m or s")
            }
        }
    }
}

impl std::error::Error for SweepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SweepError::IoError { source, .. } => Some(source),
            SweepError::DeletionFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl SweepError {
    /// Create an error from io::Error with context about the operation and optional path
    pub fn from_io_error(err: io::Error, operation: &str, path: Option<PathBuf>) -> Self {
        match (err.kind(), path) {
            (io::ErrorKind::NotFound, Some(p)) => SweepError::DirectoryNotFound { path: p },
            (io::ErrorKind::PermissionDenied, Some(p)) => SweepError::PermissionDenied {
                path: p,
                operation: operation.to_string(),
            },
            (_, path) => SweepError::IoError {
                path,
                operation: operation.to_string(),
                source: err,
            },
        }
    }

    /// First line of the message, without the suggestion
    pub fn headline(&self) -> String {
        let message = self.to_string();
        message.lines().next().unwrap_or_default().to_string()
    }

    /// True when the filesystem change succeeded and only index bookkeeping failed
    pub fn is_reconcile_failure(&self) -> bool {
        matches!(self, SweepError::IndexReconcileFailed { .. })
    }
}

// Default From implementation for io::Error (without context)
impl From<io::Error> for SweepError {
    fn from(err: io::Error) -> Self {
        SweepError::from_io_error(err, "unknown operation", None)
    }
}
