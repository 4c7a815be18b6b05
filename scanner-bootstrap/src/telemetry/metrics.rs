//! Atomic outcome counters.

use std::sync::atomic::{AtomicU64, Ordering};

use super::{ProvisioningOutcome, TelemetrySink};
use crate::artifact::ArtifactKind;

const OUTCOMES: usize = ProvisioningOutcome::ALL.len();

fn kind_index(kind: ArtifactKind) -> usize {
    match kind {
        ArtifactKind::Jre => 0,
        ArtifactKind::Engine => 1,
    }
}

/// Outcome counters for every artifact kind.
#[derive(Debug, Default)]
pub struct ProvisioningMetrics {
    counters: [[AtomicU64; OUTCOMES]; 2],
}

impl ProvisioningMetrics {
    /// Create zeroed metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a point-in-time copy of all counters.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let mut counts = [[0u64; OUTCOMES]; 2];
        for (kind, row) in self.counters.iter().enumerate() {
            for (outcome, counter) in row.iter().enumerate() {
                counts[kind][outcome] = counter.load(Ordering::Relaxed);
            }
        }
        TelemetrySnapshot { counts }
    }
}

impl TelemetrySink for ProvisioningMetrics {
    fn record(&self, kind: ArtifactKind, outcome: ProvisioningOutcome) {
        self.counters[kind_index(kind)][outcome.index()].fetch_add(1, Ordering::Relaxed);
        tracing::debug!(kind = %kind, outcome = %outcome, "Provisioning outcome");
    }
}

/// Point-in-time copy of [`ProvisioningMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TelemetrySnapshot {
    counts: [[u64; OUTCOMES]; 2],
}

impl TelemetrySnapshot {
    /// How often `outcome` was recorded for `kind`.
    pub fn count(&self, kind: ArtifactKind, outcome: ProvisioningOutcome) -> u64 {
        self.counts[kind_index(kind)][outcome.index()]
    }

    /// Total outcomes recorded for `kind`.
    pub fn total(&self, kind: ArtifactKind) -> u64 {
        self.counts[kind_index(kind)].iter().sum()
    }

    /// Non-zero `(kind, outcome, count)` triples, for reporting.
    pub fn entries(&self) -> Vec<(ArtifactKind, ProvisioningOutcome, u64)> {
        ArtifactKind::ALL
            .iter()
            .flat_map(|&kind| {
                ProvisioningOutcome::ALL
                    .iter()
                    .map(move |&outcome| (kind, outcome, self.count(kind, outcome)))
            })
            .filter(|&(_, _, count)| count > 0)
            .collect()
    }
}
