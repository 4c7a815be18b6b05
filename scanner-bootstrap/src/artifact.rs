//! Artifact identity types.
//!
//! An artifact is a downloadable archive the scanner needs at runtime: the
//! Java runtime (JRE) or the analysis engine. Both are described by the same
//! [`ArtifactDescriptor`] shape and cached under their expected checksum.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// The kind of artifact being provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Java runtime used to launch the scanner engine.
    Jre,
    /// The analysis engine itself.
    Engine,
}

impl ArtifactKind {
    /// All kinds, in provisioning order.
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::Jre, ArtifactKind::Engine];

    /// Human-readable name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Jre => "JRE",
            Self::Engine => "engine",
        }
    }

    /// Whether metadata for this kind depends on the host OS and architecture.
    pub fn requires_platform(&self) -> bool {
        matches!(self, Self::Jre)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable description of a cacheable artifact.
///
/// The `sha256` doubles as the cache partition key, so two descriptors with
/// the same checksum and filename always map to the same cache entry.
///
/// # Example
///
/// ```
/// use scanner_bootstrap::ArtifactDescriptor;
///
/// let jre = ArtifactDescriptor::new("jre.tar.gz", "abc123", "jdk/bin/java");
/// assert_eq!(jre.extraction_dir_name(), "jre.tar.gz_extracted");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactDescriptor {
    /// Archive file name; its extension selects the unpacker.
    pub filename: String,

    /// Expected SHA-256 of the archive, hex encoded.
    pub sha256: String,

    /// Path of the executable inside the unpacked tree.
    pub relative_executable_path: PathBuf,
}

impl ArtifactDescriptor {
    /// Create a new descriptor.
    pub fn new(
        filename: impl Into<String>,
        sha256: impl Into<String>,
        relative_executable_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            filename: filename.into(),
            sha256: sha256.into(),
            relative_executable_path: relative_executable_path.into(),
        }
    }

    /// Name of the directory the archive is unpacked into.
    pub fn extraction_dir_name(&self) -> String {
        format!("{}_extracted", self.filename)
    }

    /// The executable path relative to the extraction directory.
    pub fn executable(&self) -> &Path {
        &self.relative_executable_path
    }
}

impl fmt::Display for ArtifactDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.filename, self.sha256)
    }
}

/// Artifact metadata as returned by the provisioning server.
///
/// Carries everything needed to build an [`ArtifactDescriptor`] plus the
/// optional information needed to download the archive.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    /// Server-side identifier, used to build the download endpoint.
    #[serde(default)]
    pub id: Option<String>,

    /// Archive file name.
    pub filename: String,

    /// Expected SHA-256 of the archive.
    pub sha256: String,

    /// Executable path inside the archive.
    #[serde(alias = "javaPath")]
    pub executable_path: String,

    /// Direct download location, if the server hands one out.
    #[serde(default)]
    pub download_url: Option<String>,
}

impl ArtifactMetadata {
    /// Build the cache descriptor for this metadata.
    pub fn descriptor(&self) -> ArtifactDescriptor {
        ArtifactDescriptor::new(&self.filename, &self.sha256, &self.executable_path)
    }
}
