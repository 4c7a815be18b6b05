//! Provision one artifact into the cache.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use scanner_bootstrap::config::parse_server_version;
use scanner_bootstrap::{
    ArtifactCache, ArtifactKind, HttpProvisioningServer, Platform, ProvisioningConfig,
    ProvisioningMetrics, Resolver, TelemetrySink,
};

use super::common::ArtifactArg;
use crate::error::CliError;

/// Arguments for `provision`.
#[derive(Debug, Args)]
pub struct ProvisionArgs {
    /// Artifact to provision
    #[arg(value_enum)]
    pub artifact: ArtifactArg,

    /// Base URL of the provisioning API
    #[arg(long)]
    pub server_url: Option<String>,

    /// Bearer token for the provisioning API
    #[arg(long)]
    pub token: Option<String>,

    /// Server version, e.g. 10.6.0.92116
    #[arg(long)]
    pub server_version: Option<String>,

    /// The server is the cloud offering
    #[arg(long)]
    pub cloud: bool,

    /// Cache root directory (default: $SONAR_USER_HOME/cache or ~/.sonar/cache)
    #[arg(long)]
    pub cache_root: Option<PathBuf>,

    /// Skip provisioning
    #[arg(long)]
    pub skip: bool,

    /// Use this executable instead of provisioning
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Override the detected operating system
    #[arg(long)]
    pub os: Option<String>,

    /// Override the detected architecture
    #[arg(long)]
    pub arch: Option<String>,
}

/// Apply the command line on top of `base`.
pub fn build_config(
    args: &ProvisionArgs,
    base: ProvisioningConfig,
) -> Result<ProvisioningConfig, CliError> {
    let kind = ArtifactKind::from(args.artifact);

    let server_url = args
        .server_url
        .clone()
        .or(base.server_url.clone())
        .ok_or_else(|| CliError::Config("--server-url is required".to_string()))?;

    let mut config = base.with_server_url(server_url).with_cloud(args.cloud);
    if let Some(token) = &args.token {
        config = config.with_token(token);
    }
    if let Some(version) = &args.server_version {
        config = config.with_server_version(parse_server_version(version)?);
    }
    if let Some(root) = &args.cache_root {
        config = config.with_cache_root(root);
    }
    if args.skip {
        config = config.with_skip(kind, true);
    }
    if let Some(path) = &args.path {
        config = config.with_explicit_path(kind, path);
    }
    Ok(config)
}

/// Run `provision`. Returns whether an executable was resolved.
pub fn run(args: ProvisionArgs) -> Result<bool, CliError> {
    let kind = ArtifactKind::from(args.artifact);
    let config = build_config(&args, ProvisioningConfig::from_env())?;
    let platform = Platform::current().with_overrides(args.os.clone(), args.arch.clone());

    tracing::debug!(
        kind = %kind,
        platform = %platform,
        cache_root = %config.cache_root.display(),
        "Provisioning"
    );

    let server = HttpProvisioningServer::new(&config)?;
    let metrics = Arc::new(ProvisioningMetrics::new());
    let resolver = Resolver::new(kind, server, ArtifactCache::new(&config.cache_root))
        .with_telemetry(Arc::clone(&metrics) as Arc<dyn TelemetrySink>);

    // A user-supplied executable is used as is
    let request = config.request_for(kind, platform);
    let resolved = resolver
        .resolve(&request)
        .or_else(|| request.explicit_path.clone());

    for (kind, outcome, count) in metrics.snapshot().entries() {
        tracing::debug!(kind = %kind, outcome = %outcome, count, "Outcome");
    }

    match resolved {
        Some(path) => {
            println!("{}", path.display());
            Ok(true)
        }
        None => {
            eprintln!("No {} provisioned, falling back to the system default", kind);
            Ok(false)
        }
    }
}
