//! Cache root directory management.

use std::fs;
use std::path::{Path, PathBuf};

/// Owns the on-disk cache root and creates directories beneath it on demand.
///
/// Filesystem failures are logged and reported as `None`; they never
/// propagate as errors. Creating a directory that already exists succeeds.
#[derive(Debug, Clone)]
pub struct CacheRoot {
    path: PathBuf,
}

impl CacheRoot {
    /// Create a manager for the cache rooted at `path`.
    ///
    /// Nothing is created until [`ensure_cache_root`](Self::ensure_cache_root)
    /// is called.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The configured cache root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the cache root if needed and return it.
    pub fn ensure_cache_root(&self) -> Option<PathBuf> {
        self.ensure_directory_exists(&self.path)
    }

    /// Create `path` (and its parents) if needed and return it.
    pub fn ensure_directory_exists(&self, path: &Path) -> Option<PathBuf> {
        match fs::create_dir_all(path) {
            Ok(()) => Some(path.to_path_buf()),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot create cache directory");
                None
            }
        }
    }
}
