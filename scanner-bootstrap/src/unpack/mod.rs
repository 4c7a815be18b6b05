//! Archive unpacking for cached artifacts.
//!
//! Two unpackers share the [`Unpacker`] contract:
//! - [`ZipUnpacker`] for `.zip` archives
//! - [`TarGzUnpacker`] for `.tar.gz` / `.tgz` archives
//!
//! Both resolve every entry against the target directory before touching the
//! filesystem and abort with [`UnpackError::PathTraversal`] when an entry
//! would land outside of it ("zip-slip").
//!
//! # Example
//!
//! ```ignore
//! use std::fs::File;
//! use scanner_bootstrap::unpack::unpacker_for;
//!
//! let unpacker = unpacker_for("jre.tar.gz")?;
//! let mut archive = File::open("jre.tar.gz")?;
//! let files = unpacker.unpack(&mut archive, Path::new("jre.tar.gz_extracted"))?;
//! ```

mod tar_gz;
mod zip;

use std::fmt;
use std::fs;
use std::io::{self, Read, Seek};
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

pub use self::tar_gz::TarGzUnpacker;
pub use self::zip::ZipUnpacker;

/// Result type for unpack operations.
pub type UnpackResult<T> = Result<T, UnpackError>;

/// Errors that can occur while unpacking an archive.
#[derive(Debug, Error)]
pub enum UnpackError {
    /// An entry resolves outside of the target directory.
    #[error("archive entry '{entry}' resolves outside of {}", target.display())]
    PathTraversal { entry: String, target: PathBuf },

    /// The archive itself is corrupt or truncated.
    #[error("malformed {format} archive: {reason}")]
    Malformed {
        format: ArchiveFormat,
        reason: String,
    },

    /// Writing an entry to disk failed.
    #[error("failed to extract {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    /// No unpacker handles this file name.
    #[error("unsupported archive format: {0}")]
    UnsupportedFormat(String),
}

impl UnpackError {
    /// Whether this error is a rejected path traversal attempt.
    pub fn is_path_traversal(&self) -> bool {
        matches!(self, Self::PathTraversal { .. })
    }

    pub(crate) fn traversal(entry: &Path, target: &Path) -> Self {
        Self::PathTraversal {
            entry: entry.to_string_lossy().into_owned(),
            target: target.to_path_buf(),
        }
    }

    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Supported archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// Zip archive.
    Zip,
    /// Gzip-compressed tarball.
    TarGz,
}

impl ArchiveFormat {
    /// Detect the format from a file name, ignoring case.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else {
            None
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zip => f.write_str("zip"),
            Self::TarGz => f.write_str("tar.gz"),
        }
    }
}

/// A seekable byte stream, as required by the zip central directory.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// Extracts an archive stream into a directory.
pub trait Unpacker: Send + Sync + fmt::Debug {
    /// The format this unpacker handles.
    fn format(&self) -> ArchiveFormat;

    /// Unpack `archive` into `target`, creating `target` first.
    ///
    /// Returns the number of files written. On error the target directory may
    /// hold a partial tree and must not be trusted.
    fn unpack(&self, archive: &mut dyn ReadSeek, target: &Path) -> UnpackResult<usize>;
}

/// Select the unpacker for an artifact file name.
///
/// Fails with [`UnpackError::UnsupportedFormat`] for unknown extensions so
/// callers can bail out before any download happens.
pub fn unpacker_for(filename: &str) -> UnpackResult<Box<dyn Unpacker>> {
    match ArchiveFormat::from_filename(filename) {
        Some(ArchiveFormat::Zip) => Ok(Box::new(ZipUnpacker)),
        Some(ArchiveFormat::TarGz) => Ok(Box::new(TarGzUnpacker)),
        None => Err(UnpackError::UnsupportedFormat(filename.to_string())),
    }
}

/// Lexically normalize an archive entry path.
///
/// Returns `None` when the path is absolute or climbs above its root.
pub(crate) fn normalize_entry(entry: &Path) -> Option<PathBuf> {
    let mut normalized = PathBuf::new();
    let mut depth = 0usize;

    for component in entry.components() {
        match component {
            Component::Normal(part) => {
                normalized.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                normalized.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    Some(normalized)
}

/// Resolve `entry` against `target`, rejecting anything that escapes it.
pub fn resolve_within(target: &Path, entry: &Path) -> UnpackResult<PathBuf> {
    normalize_entry(entry)
        .map(|relative| target.join(relative))
        .ok_or_else(|| UnpackError::traversal(entry, target))
}

pub(crate) fn create_dir_all(path: &Path) -> UnpackResult<()> {
    fs::create_dir_all(path).map_err(|e| UnpackError::io(path, e))
}
