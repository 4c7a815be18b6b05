//! Common types shared across CLI commands.

use std::path::PathBuf;

use clap::ValueEnum;
use scanner_bootstrap::{ArtifactKind, ProvisioningConfig};

/// Artifact selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ArtifactArg {
    /// Java runtime used to launch the scanner engine
    Jre,
    /// The analysis engine
    Engine,
}

impl From<ArtifactArg> for ArtifactKind {
    fn from(arg: ArtifactArg) -> Self {
        match arg {
            ArtifactArg::Jre => ArtifactKind::Jre,
            ArtifactArg::Engine => ArtifactKind::Engine,
        }
    }
}

/// Cache root from the CLI, falling back to the environment default.
pub fn resolve_cache_root(cli_cache_root: Option<PathBuf>) -> PathBuf {
    cli_cache_root.unwrap_or_else(|| ProvisioningConfig::from_env().cache_root)
}
