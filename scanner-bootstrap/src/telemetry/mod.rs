//! Provisioning telemetry.
//!
//! Every resolution attempt ends in exactly one [`ProvisioningOutcome`],
//! which is handed to a [`TelemetrySink`]. [`ProvisioningMetrics`] is the
//! built-in sink: lock-free atomic counters per artifact kind and outcome.
//!
//! ```text
//! Resolver ─────► TelemetrySink ─────► ProvisioningMetrics ─────► TelemetrySnapshot
//!                 (trait)              (atomic counters)          (point-in-time copy)
//! ```
//!
//! # Example
//!
//! ```
//! use scanner_bootstrap::telemetry::{ProvisioningMetrics, ProvisioningOutcome, TelemetrySink};
//! use scanner_bootstrap::ArtifactKind;
//!
//! let metrics = ProvisioningMetrics::new();
//! metrics.record(ArtifactKind::Jre, ProvisioningOutcome::Downloaded);
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.count(ArtifactKind::Jre, ProvisioningOutcome::Downloaded), 1);
//! ```

mod metrics;

use std::fmt;

use crate::artifact::ArtifactKind;

pub use metrics::{ProvisioningMetrics, TelemetrySnapshot};

/// Final outcome of one resolution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProvisioningOutcome {
    /// The caller asked to skip provisioning.
    Disabled,
    /// The server cannot provision this artifact.
    UnsupportedByServer,
    /// The operating system could not be determined.
    UnsupportedNoOS,
    /// The architecture could not be determined.
    UnsupportedNoArch,
    /// The caller supplied its own executable.
    UserSupplied,
    /// The artifact was already cached.
    CacheHit,
    /// The artifact was downloaded into the cache.
    Downloaded,
    /// Provisioning was attempted and failed.
    Failed,
}

impl ProvisioningOutcome {
    /// All outcomes, in declaration order.
    pub const ALL: [ProvisioningOutcome; 8] = [
        Self::Disabled,
        Self::UnsupportedByServer,
        Self::UnsupportedNoOS,
        Self::UnsupportedNoArch,
        Self::UserSupplied,
        Self::CacheHit,
        Self::Downloaded,
        Self::Failed,
    ];

    /// Stable name reported to telemetry backends.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Disabled => "Disabled",
            Self::UnsupportedByServer => "UnsupportedByServer",
            Self::UnsupportedNoOS => "UnsupportedNoOS",
            Self::UnsupportedNoArch => "UnsupportedNoArch",
            Self::UserSupplied => "UserSupplied",
            Self::CacheHit => "CacheHit",
            Self::Downloaded => "Downloaded",
            Self::Failed => "Failed",
        }
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for ProvisioningOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives the final outcome of each resolution attempt.
pub trait TelemetrySink: Send + Sync {
    /// Record the outcome for one artifact kind.
    fn record(&self, kind: ArtifactKind, outcome: ProvisioningOutcome);
}

/// Sink that only logs outcomes.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTelemetry;

impl TelemetrySink for LogTelemetry {
    fn record(&self, kind: ArtifactKind, outcome: ProvisioningOutcome) {
        tracing::debug!(kind = %kind, outcome = %outcome, "Provisioning outcome");
    }
}
