//! Content-addressed artifact cache.
//!
//! This module provides:
//! - Cache root management (`root`)
//! - The cache failure taxonomy (`error`)
//! - [`ArtifactCache`], which answers "is this artifact cached?" and turns a
//!   download into a published cache entry
//!
//! # Layout
//!
//! ```text
//! <root>/<sha256>/<filename>                          raw archive
//! <root>/<sha256>/<filename>_extracted/               unpacked tree
//! <root>/<sha256>/<filename>_extracted/<executable>   proof of a usable entry
//! ```
//!
//! # Concurrency
//!
//! Independent processes may share one cache root. No locks are taken:
//! every write lands in a uniquely named temporary file or directory inside
//! `<root>/<sha256>/` and becomes visible through a single rename. A writer
//! that loses the rename race discards its own work and adopts the winner's.

mod error;
mod root;

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};

use tempfile::{NamedTempFile, TempDir};

use crate::artifact::ArtifactDescriptor;
use crate::checksum;
use crate::unpack::{self, Unpacker};

pub use error::{CacheError, CacheOpResult};
pub use root::CacheRoot;

/// Outcome of a cache lookup or download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheResult {
    /// The artifact is cached; the path points at its executable.
    Hit(PathBuf),
    /// Nothing usable is cached; a download may be attempted.
    Miss,
    /// The cache is unusable or this attempt failed.
    Failure(String),
}

impl CacheResult {
    /// Whether this is a [`CacheResult::Hit`].
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    /// The executable path of a hit.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Hit(path) => Some(path),
            _ => None,
        }
    }
}

impl fmt::Display for CacheResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hit(path) => write!(f, "hit {}", path.display()),
            Self::Miss => f.write_str("miss"),
            Self::Failure(message) => write!(f, "failure {}", message),
        }
    }
}

/// Artifact cache rooted at a single directory.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: CacheRoot,
}

impl ArtifactCache {
    /// Create a cache rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: CacheRoot::new(root),
        }
    }

    /// The cache root manager.
    pub fn root(&self) -> &CacheRoot {
        &self.root
    }

    /// Directory holding everything cached for `descriptor`.
    pub fn artifact_dir(&self, descriptor: &ArtifactDescriptor) -> PathBuf {
        self.root.path().join(&descriptor.sha256)
    }

    /// Where the raw archive for `descriptor` lives.
    pub fn archive_path(&self, descriptor: &ArtifactDescriptor) -> PathBuf {
        self.artifact_dir(descriptor).join(&descriptor.filename)
    }

    /// Where `descriptor` is unpacked to.
    pub fn extraction_dir(&self, descriptor: &ArtifactDescriptor) -> PathBuf {
        self.artifact_dir(descriptor)
            .join(descriptor.extraction_dir_name())
    }

    /// Check whether `descriptor` is cached and usable.
    ///
    /// An extraction directory without the expected executable is reported
    /// as a failure, never as a miss: it is not repaired in place.
    pub fn is_cached(&self, descriptor: &ArtifactDescriptor) -> CacheResult {
        match self.lookup(descriptor) {
            Ok(Some(path)) => {
                tracing::debug!(path = %path.display(), "Cache hit");
                CacheResult::Hit(path)
            }
            Ok(None) => {
                tracing::debug!(artifact = %descriptor, "Cache miss");
                CacheResult::Miss
            }
            Err(e) => {
                tracing::warn!(artifact = %descriptor, error = %e, "Cache lookup failed");
                CacheResult::Failure(e.to_string())
            }
        }
    }

    /// Download, verify, unpack and publish `descriptor`.
    ///
    /// `fetch` is only called when no archive is on disk yet. It returns the
    /// archive byte stream.
    pub fn download<F, R, E>(&self, descriptor: &ArtifactDescriptor, fetch: F) -> CacheResult
    where
        F: FnOnce() -> Result<R, E>,
        R: Read,
        E: fmt::Display,
    {
        match self.populate(descriptor, fetch) {
            Ok(path) => {
                tracing::info!(path = %path.display(), "Artifact cached");
                CacheResult::Hit(path)
            }
            Err(e) => {
                tracing::warn!(artifact = %descriptor, error = %e, "Failed to cache artifact");
                CacheResult::Failure(e.to_string())
            }
        }
    }

    fn lookup(&self, descriptor: &ArtifactDescriptor) -> CacheOpResult<Option<PathBuf>> {
        validate_descriptor(descriptor)?;

        let root = self
            .root
            .ensure_cache_root()
            .ok_or_else(|| CacheError::DirectoryUnavailable {
                path: self.root.path().to_path_buf(),
            })?;
        let extraction = root
            .join(&descriptor.sha256)
            .join(descriptor.extraction_dir_name());

        if !extraction.exists() {
            return Ok(None);
        }

        let executable = extraction.join(executable_relative_path(descriptor)?);
        if executable.is_file() {
            Ok(Some(executable))
        } else {
            Err(CacheError::IncompleteExtraction {
                dir: extraction,
                executable: descriptor.relative_executable_path.clone(),
            })
        }
    }

    fn populate<F, R, E>(&self, descriptor: &ArtifactDescriptor, fetch: F) -> CacheOpResult<PathBuf>
    where
        F: FnOnce() -> Result<R, E>,
        R: Read,
        E: fmt::Display,
    {
        validate_descriptor(descriptor)?;

        let unpacker =
            unpack::unpacker_for(&descriptor.filename).map_err(|source| CacheError::Unsupported {
                filename: descriptor.filename.clone(),
                source,
            })?;
        let executable = executable_relative_path(descriptor)?;

        let artifact_dir = self.artifact_dir(descriptor);
        let artifact_dir = self
            .root
            .ensure_directory_exists(&artifact_dir)
            .ok_or(CacheError::DirectoryUnavailable { path: artifact_dir })?;
        let archive = artifact_dir.join(&descriptor.filename);

        if archive.is_file() {
            tracing::debug!(path = %archive.display(), "Archive already present, skipping download");
        } else if let Err(e) = self.download_archive(descriptor, &artifact_dir, &archive, fetch) {
            tracing::warn!(artifact = %descriptor, error = %e, "Download failed");
            if matches!(e, CacheError::Integrity { .. }) || !archive.is_file() {
                return Err(e);
            }
            tracing::info!(
                path = %archive.display(),
                "Archive was published by another process, using it"
            );
        }

        self.verify_archive(descriptor, &archive)?;
        self.unpack_archive(descriptor, unpacker.as_ref(), &archive, &artifact_dir, &executable)
    }

    /// Stream the archive into a private temp file, verify it and move it
    /// into place.
    fn download_archive<F, R, E>(
        &self,
        descriptor: &ArtifactDescriptor,
        artifact_dir: &Path,
        archive: &Path,
        fetch: F,
    ) -> CacheOpResult<()>
    where
        F: FnOnce() -> Result<R, E>,
        R: Read,
        E: fmt::Display,
    {
        tracing::info!(artifact = %descriptor, "Starting download");

        let download_failed = |reason: String| CacheError::Download {
            filename: descriptor.filename.clone(),
            reason,
        };

        let mut temp = tempfile::Builder::new()
            .prefix(".download-")
            .suffix(".part")
            .tempfile_in(artifact_dir)
            .map_err(|e| CacheError::filesystem("cannot create temporary file in", artifact_dir, e))?;

        // Dropping `temp` on any early return deletes the partial download
        let mut stream = fetch().map_err(|e| download_failed(e.to_string()))?;
        let bytes = io::copy(&mut stream, temp.as_file_mut())
            .map_err(|e| download_failed(e.to_string()))?;
        temp.as_file_mut()
            .sync_all()
            .map_err(|e| download_failed(e.to_string()))?;

        let verified = temp
            .as_file_mut()
            .seek(SeekFrom::Start(0))
            .map(|_| checksum::verify_checksum(temp.as_file_mut(), &descriptor.sha256))
            .unwrap_or(false);
        if !verified {
            tracing::warn!(
                artifact = %descriptor,
                expected = %descriptor.sha256,
                "Checksum mismatch on downloaded archive"
            );
            discard_temp_file(temp);
            return Err(CacheError::Integrity {
                path: archive.to_path_buf(),
                expected: descriptor.sha256.clone(),
            });
        }

        set_published_mode(temp.path(), 0o644);
        match temp.persist_noclobber(archive) {
            Ok(_) => {
                tracing::info!(path = %archive.display(), bytes, "Download succeeded");
                Ok(())
            }
            Err(e) if archive.is_file() => {
                tracing::debug!(
                    path = %archive.display(),
                    "Another process published the archive first, discarding own download"
                );
                discard_temp_file(e.file);
                Ok(())
            }
            Err(e) => Err(CacheError::filesystem("cannot move download to", archive, e.error)),
        }
    }

    /// Verify the on-disk archive; a mismatching archive is deleted.
    fn verify_archive(&self, descriptor: &ArtifactDescriptor, archive: &Path) -> CacheOpResult<()> {
        if checksum::verify_file_checksum(archive, &descriptor.sha256) {
            tracing::debug!(path = %archive.display(), "Archive checksum verified");
            return Ok(());
        }

        tracing::warn!(
            path = %archive.display(),
            expected = %descriptor.sha256,
            "Checksum mismatch, deleting archive"
        );
        if let Err(e) = fs::remove_file(archive) {
            tracing::warn!(path = %archive.display(), error = %e, "Failed to delete archive");
        }

        Err(CacheError::Integrity {
            path: archive.to_path_buf(),
            expected: descriptor.sha256.clone(),
        })
    }

    /// Unpack into a private staging directory and publish it by rename.
    fn unpack_archive(
        &self,
        descriptor: &ArtifactDescriptor,
        unpacker: &dyn Unpacker,
        archive: &Path,
        artifact_dir: &Path,
        executable: &Path,
    ) -> CacheOpResult<PathBuf> {
        let extraction = artifact_dir.join(descriptor.extraction_dir_name());
        let final_executable = extraction.join(executable);

        let staging = tempfile::Builder::new()
            .prefix(".extract-")
            .tempdir_in(artifact_dir)
            .map_err(|e| {
                CacheError::filesystem("cannot create temporary directory in", artifact_dir, e)
            })?;

        tracing::info!(archive = %archive.display(), format = %unpacker.format(), "Extracting archive");

        if let Err(e) = extract_into(unpacker, archive, staging.path()) {
            if e.is_path_traversal() {
                tracing::error!(
                    archive = %archive.display(),
                    error = %e,
                    "Archive entry escapes the extraction directory, refusing to unpack"
                );
            } else {
                tracing::warn!(archive = %archive.display(), error = %e, "Extraction failed");
            }
            discard_staging_dir(staging);
            return Err(e);
        }

        if !staging.path().join(executable).is_file() {
            tracing::warn!(
                archive = %archive.display(),
                executable = %executable.display(),
                "Extraction failed, executable missing"
            );
            discard_staging_dir(staging);
            return Err(CacheError::MissingExecutable {
                path: executable.to_path_buf(),
            });
        }

        set_published_mode(staging.path(), 0o755);
        match fs::rename(staging.path(), &extraction) {
            Ok(()) => {
                tracing::info!(path = %extraction.display(), "Extraction succeeded");
                Ok(final_executable)
            }
            Err(_) if final_executable.is_file() => {
                tracing::debug!(
                    path = %extraction.display(),
                    "Another process published the extraction first, discarding own copy"
                );
                discard_staging_dir(staging);
                Ok(final_executable)
            }
            Err(e) => {
                discard_staging_dir(staging);
                Err(CacheError::filesystem(
                    "cannot publish extraction to",
                    extraction,
                    e,
                ))
            }
        }
    }
}

fn extract_into(unpacker: &dyn Unpacker, archive: &Path, target: &Path) -> CacheOpResult<usize> {
    let mut file =
        File::open(archive).map_err(|e| CacheError::filesystem("cannot open", archive, e))?;
    unpacker
        .unpack(&mut file, target)
        .map_err(|source| CacheError::Extraction {
            archive: archive.to_path_buf(),
            source,
        })
}

/// Check the fields that become path components under the cache root.
///
/// The digest must be hex and the file name a single plain component, so
/// neither can climb out of `<root>/<sha256>/`.
fn validate_descriptor(descriptor: &ArtifactDescriptor) -> CacheOpResult<()> {
    let sha256 = &descriptor.sha256;
    if sha256.is_empty() || !sha256.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CacheError::invalid_descriptor("sha256", sha256.as_str()));
    }

    let filename = &descriptor.filename;
    let mut components = Path::new(filename).components();
    let single_component = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single_component || filename.contains(&['/', '\\'][..]) {
        return Err(CacheError::invalid_descriptor("filename", filename.as_str()));
    }

    Ok(())
}

/// The descriptor's executable path, normalized and confined to the
/// extraction directory.
fn executable_relative_path(descriptor: &ArtifactDescriptor) -> CacheOpResult<PathBuf> {
    unpack::resolve_within(Path::new(""), &descriptor.relative_executable_path)
        .ok()
        .filter(|path| !path.as_os_str().is_empty())
        .ok_or_else(|| {
            CacheError::invalid_descriptor(
                "executable path",
                descriptor.relative_executable_path.display().to_string(),
            )
        })
}

/// Temp files and directories are created owner-only; published entries are
/// readable by everyone sharing the cache.
#[cfg(unix)]
fn set_published_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(mode)) {
        tracing::warn!(path = %path.display(), error = %e, "Failed to set permissions");
    }
}

#[cfg(not(unix))]
fn set_published_mode(_path: &Path, _mode: u32) {}

fn discard_temp_file(temp: NamedTempFile) {
    let path = temp.path().to_path_buf();
    if let Err(e) = temp.close() {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove temporary download");
    }
}

fn discard_staging_dir(staging: TempDir) {
    let path = staging.path().to_path_buf();
    if let Err(e) = staging.close() {
        tracing::warn!(
            path = %path.display(),
            error = %e,
            "Failed to remove temporary extraction directory"
        );
    }
}
