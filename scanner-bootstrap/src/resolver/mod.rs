//! Artifact resolution.
//!
//! A [`Resolver`] provisions one artifact kind. It checks whether
//! provisioning applies at all, then runs the metadata → cache lookup →
//! download sequence, retrying the whole sequence once:
//!
//! ```text
//! explicit path? ── skip? ── server support? ── OS/arch known?
//!                                                     │
//!             ┌───────────────────────────────────────┘
//!             ▼
//!      fetch metadata ──► is_cached ──► Hit ───────────────► path
//!             │               │
//!         not found          Miss ──► download ──► Hit ────► path
//!             │               │            │
//!          give up         Failure      Failure ──► retry once, then give up
//! ```
//!
//! Giving up is not an error: the caller falls back to whatever executable
//! the system provides.

mod server;

use std::path::PathBuf;
use std::sync::Arc;

use crate::artifact::ArtifactKind;
use crate::cache::{ArtifactCache, CacheResult};
use crate::platform::Platform;
use crate::telemetry::{LogTelemetry, ProvisioningOutcome, TelemetrySink};

pub use server::{ProvisioningError, ProvisioningResult, ProvisioningServer};

/// Number of times the full resolution sequence is attempted.
pub const MAX_ATTEMPTS: usize = 2;

/// Caller-side inputs for one resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveRequest {
    /// Executable supplied by the user; provisioning is not needed.
    pub explicit_path: Option<PathBuf>,

    /// Provisioning was explicitly turned off.
    pub skip: bool,

    /// Platform to request platform-specific artifacts for.
    pub platform: Platform,
}

impl ResolveRequest {
    /// A request for `platform` with no overrides.
    pub fn for_platform(platform: Platform) -> Self {
        Self {
            platform,
            ..Default::default()
        }
    }

    /// Use an explicit executable instead of provisioning.
    pub fn with_explicit_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_path = Some(path.into());
        self
    }

    /// Skip provisioning entirely.
    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }
}

/// Result of one pass through the metadata → cache → download sequence.
enum Attempt {
    Resolved {
        path: PathBuf,
        outcome: ProvisioningOutcome,
    },
    NoMetadata,
    Failed(String),
}

/// Provisions one artifact kind into the cache.
pub struct Resolver<S: ProvisioningServer> {
    kind: ArtifactKind,
    server: S,
    cache: ArtifactCache,
    telemetry: Arc<dyn TelemetrySink>,
}

impl<S: ProvisioningServer> Resolver<S> {
    /// Create a resolver for `kind` backed by `server` and `cache`.
    pub fn new(kind: ArtifactKind, server: S, cache: ArtifactCache) -> Self {
        Self {
            kind,
            server,
            cache,
            telemetry: Arc::new(LogTelemetry),
        }
    }

    /// Report outcomes to `telemetry`.
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// The artifact kind this resolver provisions.
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// The cache this resolver populates.
    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// Resolve the artifact to a local executable path.
    ///
    /// Returns `None` when provisioning does not apply or did not succeed.
    pub fn resolve(&self, request: &ResolveRequest) -> Option<PathBuf> {
        if let Some(outcome) = self.skip_reason(request) {
            self.telemetry.record(self.kind, outcome);
            return None;
        }

        for attempt in 1..=MAX_ATTEMPTS {
            match self.attempt(&request.platform) {
                Attempt::Resolved { path, outcome } => {
                    tracing::info!(
                        kind = %self.kind,
                        path = %path.display(),
                        outcome = %outcome,
                        "Artifact resolved"
                    );
                    self.telemetry.record(self.kind, outcome);
                    return Some(path);
                }
                Attempt::NoMetadata => {
                    tracing::warn!(
                        kind = %self.kind,
                        platform = %request.platform,
                        "No artifact metadata available, giving up"
                    );
                    break;
                }
                Attempt::Failed(reason) if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        kind = %self.kind,
                        attempt,
                        reason = %reason,
                        "Provisioning attempt failed, retrying"
                    );
                }
                Attempt::Failed(reason) => {
                    tracing::warn!(
                        kind = %self.kind,
                        attempts = attempt,
                        reason = %reason,
                        "Provisioning failed, falling back"
                    );
                }
            }
        }

        self.telemetry.record(self.kind, ProvisioningOutcome::Failed);
        None
    }

    /// Check the preconditions, in order. `Some` means provisioning does not apply.
    fn skip_reason(&self, request: &ResolveRequest) -> Option<ProvisioningOutcome> {
        if let Some(path) = &request.explicit_path {
            tracing::info!(
                kind = %self.kind,
                path = %path.display(),
                "Executable supplied by the user, skipping provisioning"
            );
            return Some(ProvisioningOutcome::UserSupplied);
        }

        if request.skip {
            tracing::info!(kind = %self.kind, "Provisioning disabled");
            return Some(ProvisioningOutcome::Disabled);
        }

        if !self.server.supports_provisioning(self.kind) {
            tracing::info!(kind = %self.kind, "Server does not support provisioning");
            return Some(ProvisioningOutcome::UnsupportedByServer);
        }

        if self.kind.requires_platform() {
            if request.platform.os.is_none() {
                tracing::info!(kind = %self.kind, "Operating system unknown, skipping provisioning");
                return Some(ProvisioningOutcome::UnsupportedNoOS);
            }
            if request.platform.arch.is_none() {
                tracing::info!(kind = %self.kind, "Architecture unknown, skipping provisioning");
                return Some(ProvisioningOutcome::UnsupportedNoArch);
            }
        }

        None
    }

    fn attempt(&self, platform: &Platform) -> Attempt {
        let metadata = match self.server.fetch_metadata(self.kind, platform) {
            Ok(Some(metadata)) => metadata,
            Ok(None) => return Attempt::NoMetadata,
            Err(e) => return Attempt::Failed(e.to_string()),
        };
        let descriptor = metadata.descriptor();

        match self.cache.is_cached(&descriptor) {
            CacheResult::Hit(path) => {
                return Attempt::Resolved {
                    path,
                    outcome: ProvisioningOutcome::CacheHit,
                }
            }
            CacheResult::Failure(message) => return Attempt::Failed(message),
            CacheResult::Miss => {}
        }

        match self
            .cache
            .download(&descriptor, || self.server.download(self.kind, &metadata))
        {
            CacheResult::Hit(path) => Attempt::Resolved {
                path,
                outcome: ProvisioningOutcome::Downloaded,
            },
            CacheResult::Failure(message) => Attempt::Failed(message),
            CacheResult::Miss => Attempt::Failed("download did not produce a cache entry".into()),
        }
    }
}
