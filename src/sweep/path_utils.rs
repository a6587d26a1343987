// Path normalization utilities
// Index keys are absolute paths, so every path entering the engine or the
// cleaner goes through here first

use std::io;
use std::path::{Component, Path, PathBuf};

/// Canonicalize a path if it exists, otherwise make it absolute lexically
/// This keeps keys for already-deleted directories comparable with stored ones
pub fn try_canonicalize(path: &Path) -> io::Result<PathBuf> {
    if path.exists() {
        path.canonicalize()
    } else {
        absolutize(path)
    }
}

/// Resolve a relative path against the current directory without touching the filesystem
pub fn absolutize(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(clean_path(path))
    } else {
        Ok(clean_path(&std::env::current_dir()?.join(path)))
    }
}

/// Check whether `path` lies at or below `root`, comparing whole components
/// `/a/bc` is not under `/a/b`
pub fn is_under(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

/// Clean a path by removing redundant components like "." and ".."
/// This provides a normalized form without requiring the path to exist
pub fn clean_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => continue,
            Component::ParentDir => {
                // Only pop if the last component is a normal segment
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                    continue;
                }
                components.push(component);
            }
            _ => components.push(component),
        }
    }

    let mut result = PathBuf::new();
    for component in components {
        result.push(component);
    }

    if result.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        result
    }
}
