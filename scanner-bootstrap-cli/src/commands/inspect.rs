//! Inspect one cache entry without downloading anything.

use std::path::PathBuf;

use clap::Args;
use scanner_bootstrap::{ArtifactCache, ArtifactDescriptor, CacheResult};

use super::common::resolve_cache_root;

/// Arguments for `inspect`.
#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Archive file name, e.g. jre.tar.gz
    #[arg(long)]
    pub filename: String,

    /// Expected SHA-256 of the archive
    #[arg(long)]
    pub sha256: String,

    /// Executable path inside the unpacked archive
    #[arg(long)]
    pub executable: PathBuf,

    /// Cache root directory (default: $SONAR_USER_HOME/cache or ~/.sonar/cache)
    #[arg(long)]
    pub cache_root: Option<PathBuf>,
}

/// Look the entry up in the cache.
pub fn inspect(args: &InspectArgs) -> CacheResult {
    let cache = ArtifactCache::new(resolve_cache_root(args.cache_root.clone()));
    let descriptor = ArtifactDescriptor::new(&args.filename, &args.sha256, &args.executable);
    cache.is_cached(&descriptor)
}

/// Run `inspect`. Returns whether the entry is a hit.
pub fn run(args: InspectArgs) -> bool {
    let result = inspect(&args);
    println!("{}", result);
    result.is_hit()
}
