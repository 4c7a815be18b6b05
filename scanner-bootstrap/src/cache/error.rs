//! Error types for the artifact cache.
//!
//! These never leave the cache: [`ArtifactCache`](super::ArtifactCache)
//! logs them and reports a [`CacheResult::Failure`](super::CacheResult)
//! carrying the rendered message.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::unpack::UnpackError;

/// Result type for internal cache operations.
pub type CacheOpResult<T> = Result<T, CacheError>;

/// Errors that can occur while looking up or populating a cache entry.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The artifact's archive format is not supported.
    #[error("unsupported artifact {filename}: {source}")]
    Unsupported {
        filename: String,
        source: UnpackError,
    },

    /// A directory could not be created.
    #[error("cannot create cache directory {}", path.display())]
    DirectoryUnavailable { path: PathBuf },

    /// A file or directory operation failed.
    #[error("{operation} {}: {source}", path.display())]
    Filesystem {
        operation: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    /// Fetching or writing the archive bytes failed.
    #[error("failed to download {filename}: {reason}")]
    Download { filename: String, reason: String },

    /// The archive does not hash to the expected value.
    #[error("checksum mismatch for {}: expected {expected}", path.display())]
    Integrity { path: PathBuf, expected: String },

    /// The archive could not be unpacked.
    #[error("failed to unpack {}: {source}", archive.display())]
    Extraction {
        archive: PathBuf,
        source: UnpackError,
    },

    /// Unpacking succeeded but the executable is not where it should be.
    #[error("executable {} not found after unpacking", path.display())]
    MissingExecutable { path: PathBuf },

    /// The extraction directory exists without the expected executable.
    #[error("incomplete extraction at {}: {} is missing", dir.display(), executable.display())]
    IncompleteExtraction { dir: PathBuf, executable: PathBuf },

    /// A descriptor field would place cache paths outside their directory.
    #[error("invalid {field} '{value}' in artifact descriptor")]
    InvalidDescriptor { field: &'static str, value: String },
}

impl CacheError {
    /// Whether this failure was caused by an archive escaping its directory.
    pub fn is_path_traversal(&self) -> bool {
        matches!(
            self,
            Self::Extraction { source, .. } if source.is_path_traversal()
        )
    }

    pub(crate) fn invalid_descriptor(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            field,
            value: value.into(),
        }
    }

    pub(crate) fn filesystem(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: io::Error,
    ) -> Self {
        Self::Filesystem {
            operation,
            path: path.into(),
            source,
        }
    }
}
