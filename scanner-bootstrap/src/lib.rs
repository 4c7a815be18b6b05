//! Scanner Bootstrap - artifact provisioning for the scanner bootstrapper
//!
//! Resolves the two artifacts the scanner needs at runtime, a Java runtime
//! and the analysis engine, into a local, content-addressed cache shared by
//! concurrent scanner processes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐   metadata / bytes   ┌──────────────────────┐
//! │ Resolver │◄────────────────────►│ ProvisioningServer   │ (http adapter)
//! └────┬─────┘                      └──────────────────────┘
//!      │ is_cached / download
//!      ▼
//! ┌──────────────┐  verify   ┌──────────┐
//! │ ArtifactCache│──────────►│ checksum │
//! │              │  unpack   ┌──────────┐
//! │              │──────────►│ unpack   │ (zip, tar.gz)
//! └──────┬───────┘           └──────────┘
//!        ▼
//!   <root>/<sha256>/<filename>_extracted/<executable>
//! ```
//!
//! # Example
//!
//! ```no_run
//! use scanner_bootstrap::{
//!     ArtifactCache, ArtifactKind, HttpProvisioningServer, Platform, ProvisioningConfig, Resolver,
//! };
//!
//! let config = ProvisioningConfig::from_env().with_server_url("https://sonar.example.com/api/v2");
//! let server = HttpProvisioningServer::new(&config).unwrap();
//! let resolver = Resolver::new(ArtifactKind::Jre, server, ArtifactCache::new(&config.cache_root));
//!
//! if let Some(java) = resolver.resolve(&config.request_for(ArtifactKind::Jre, Platform::current())) {
//!     println!("using {}", java.display());
//! }
//! ```

pub mod artifact;
pub mod cache;
pub mod checksum;
pub mod config;
pub mod http;
pub mod logging;
pub mod platform;
pub mod resolver;
pub mod telemetry;
pub mod unpack;

#[cfg(test)]
mod test_support;

pub use artifact::{ArtifactDescriptor, ArtifactKind, ArtifactMetadata};
pub use cache::{ArtifactCache, CacheError, CacheResult, CacheRoot};
pub use config::{ConfigError, ProvisioningConfig};
pub use http::HttpProvisioningServer;
pub use platform::Platform;
pub use resolver::{
    ProvisioningError, ProvisioningResult, ProvisioningServer, ResolveRequest, Resolver,
};
pub use telemetry::{ProvisioningMetrics, ProvisioningOutcome, TelemetrySink};
pub use unpack::{ArchiveFormat, UnpackError, Unpacker};
