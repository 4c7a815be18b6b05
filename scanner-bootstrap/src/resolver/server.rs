//! The provisioning server seam.

use std::io::Read;
use std::sync::Arc;

use thiserror::Error;

use crate::artifact::{ArtifactKind, ArtifactMetadata};
use crate::platform::Platform;

/// Result type for provisioning server calls.
pub type ProvisioningResult<T> = Result<T, ProvisioningError>;

/// Errors raised while talking to the provisioning server.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// The HTTP client could not be built.
    #[error("failed to create HTTP client: {0}")]
    Client(String),

    /// The request could not be sent or the body not read.
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// The server answered with an unexpected status.
    #[error("request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    /// The response body could not be parsed.
    #[error("failed to parse response from {url}: {reason}")]
    Parse { url: String, reason: String },

    /// Metadata carries neither a download URL nor an identifier.
    #[error("no download location for {0}")]
    NoDownloadLocation(String),
}

/// Everything the resolver needs from the remote server.
///
/// Implementations decide how metadata is looked up and how archive bytes
/// are fetched; the resolver only sequences the calls.
pub trait ProvisioningServer {
    /// Whether the server can provision artifacts of this kind.
    fn supports_provisioning(&self, kind: ArtifactKind) -> bool;

    /// Look up the artifact for `platform`. `Ok(None)` means "not found".
    fn fetch_metadata(
        &self,
        kind: ArtifactKind,
        platform: &Platform,
    ) -> ProvisioningResult<Option<ArtifactMetadata>>;

    /// Open a byte stream over the artifact archive.
    fn download(
        &self,
        kind: ArtifactKind,
        metadata: &ArtifactMetadata,
    ) -> ProvisioningResult<Box<dyn Read + Send>>;
}

impl<T: ProvisioningServer + ?Sized> ProvisioningServer for &T {
    fn supports_provisioning(&self, kind: ArtifactKind) -> bool {
        (**self).supports_provisioning(kind)
    }

    fn fetch_metadata(
        &self,
        kind: ArtifactKind,
        platform: &Platform,
    ) -> ProvisioningResult<Option<ArtifactMetadata>> {
        (**self).fetch_metadata(kind, platform)
    }

    fn download(
        &self,
        kind: ArtifactKind,
        metadata: &ArtifactMetadata,
    ) -> ProvisioningResult<Box<dyn Read + Send>> {
        (**self).download(kind, metadata)
    }
}

impl<T: ProvisioningServer + ?Sized> ProvisioningServer for Arc<T> {
    fn supports_provisioning(&self, kind: ArtifactKind) -> bool {
        (**self).supports_provisioning(kind)
    }

    fn fetch_metadata(
        &self,
        kind: ArtifactKind,
        platform: &Platform,
    ) -> ProvisioningResult<Option<ArtifactMetadata>> {
        (**self).fetch_metadata(kind, platform)
    }

    fn download(
        &self,
        kind: ArtifactKind,
        metadata: &ArtifactMetadata,
    ) -> ProvisioningResult<Box<dyn Read + Send>> {
        (**self).download(kind, metadata)
    }
}
