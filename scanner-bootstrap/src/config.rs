//! Configuration for artifact provisioning.

use std::path::PathBuf;
use std::time::Duration;

use semver::Version;
use thiserror::Error;

use crate::artifact::ArtifactKind;
use crate::platform::Platform;
use crate::resolver::ResolveRequest;

/// Overrides the scanner home directory.
pub const ENV_USER_HOME: &str = "SONAR_USER_HOME";
/// Turns JRE provisioning off when `true` or `1`.
pub const ENV_SKIP_JRE: &str = "SONAR_SCANNER_SKIP_JRE_PROVISIONING";
/// Path of a user-supplied Java executable.
pub const ENV_JAVA_EXE: &str = "SONAR_SCANNER_JAVA_EXE_PATH";
/// Path of a user-supplied engine jar.
pub const ENV_ENGINE_JAR: &str = "SONAR_SCANNER_ENGINE_JAR_PATH";

/// Default HTTP request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 300; // 5 minutes

/// Oldest server release that can provision artifacts.
pub const MIN_PROVISIONING_VERSION: Version = Version::new(10, 6, 0);

/// Errors raised while building a configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A server version string could not be parsed.
    #[error("invalid server version '{0}'")]
    InvalidVersion(String),
}

/// Configuration for provisioning the JRE and the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisioningConfig {
    /// Root of the artifact cache.
    pub cache_root: PathBuf,

    /// Base URL of the provisioning API.
    pub server_url: Option<String>,

    /// Bearer token sent to the provisioning API.
    pub token: Option<String>,

    /// Version reported by the server, if known.
    pub server_version: Option<Version>,

    /// Whether the server is the cloud offering.
    pub is_cloud: bool,

    /// HTTP request timeout.
    pub timeout: Duration,

    /// Skip JRE provisioning.
    pub skip_jre_provisioning: bool,

    /// Skip engine provisioning.
    pub skip_engine_provisioning: bool,

    /// User-supplied Java executable.
    pub jre_path: Option<PathBuf>,

    /// User-supplied engine jar.
    pub engine_path: Option<PathBuf>,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            cache_root: default_cache_root(None),
            server_url: None,
            token: None,
            server_version: None,
            is_cloud: false,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            skip_jre_provisioning: false,
            skip_engine_provisioning: false,
            jre_path: None,
            engine_path: None,
        }
    }
}

impl ProvisioningConfig {
    /// Create a configuration talking to `server_url`.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: Some(server_url.into()),
            ..Default::default()
        }
    }

    /// Load overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load overrides through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Self {
            cache_root: default_cache_root(non_empty(ENV_USER_HOME).map(PathBuf::from)),
            skip_jre_provisioning: non_empty(ENV_SKIP_JRE)
                .map(|value| parse_flag(&value))
                .unwrap_or(false),
            jre_path: non_empty(ENV_JAVA_EXE).map(PathBuf::from),
            engine_path: non_empty(ENV_ENGINE_JAR).map(PathBuf::from),
            ..Default::default()
        }
    }

    /// Set the cache root.
    pub fn with_cache_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_root = path.into();
        self
    }

    /// Set the server URL.
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    /// Set the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the server version.
    pub fn with_server_version(mut self, version: Version) -> Self {
        self.server_version = Some(version);
        self
    }

    /// Mark the server as the cloud offering.
    pub fn with_cloud(mut self, is_cloud: bool) -> Self {
        self.is_cloud = is_cloud;
        self
    }

    /// Set the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable skipping provisioning of `kind`.
    pub fn with_skip(mut self, kind: ArtifactKind, skip: bool) -> Self {
        match kind {
            ArtifactKind::Jre => self.skip_jre_provisioning = skip,
            ArtifactKind::Engine => self.skip_engine_provisioning = skip,
        }
        self
    }

    /// Use a user-supplied executable for `kind`.
    pub fn with_explicit_path(mut self, kind: ArtifactKind, path: impl Into<PathBuf>) -> Self {
        let path = Some(path.into());
        match kind {
            ArtifactKind::Jre => self.jre_path = path,
            ArtifactKind::Engine => self.engine_path = path,
        }
        self
    }

    /// Whether the configured server can provision artifacts at all.
    pub fn server_supports_provisioning(&self) -> bool {
        self.is_cloud
            || self
                .server_version
                .as_ref()
                .is_some_and(|version| *version >= MIN_PROVISIONING_VERSION)
    }

    /// Build the resolve request for `kind` on `platform`.
    pub fn request_for(&self, kind: ArtifactKind, platform: Platform) -> ResolveRequest {
        let (explicit_path, skip) = match kind {
            ArtifactKind::Jre => (self.jre_path.clone(), self.skip_jre_provisioning),
            ArtifactKind::Engine => (self.engine_path.clone(), self.skip_engine_provisioning),
        };
        ResolveRequest {
            explicit_path,
            skip,
            platform,
        }
    }
}

/// Parse a server version leniently.
///
/// Servers report four-part versions such as `10.6.0.92116`; only the first
/// three numeric components are kept and missing ones default to zero.
pub fn parse_server_version(raw: &str) -> Result<Version, ConfigError> {
    let invalid = || ConfigError::InvalidVersion(raw.to_string());

    let mut parts = [0u64; 3];
    let mut components = raw.trim().split('.');
    for (i, slot) in parts.iter_mut().enumerate() {
        match components.next() {
            Some(component) => *slot = component.parse().map_err(|_| invalid())?,
            None if i > 0 => break,
            None => return Err(invalid()),
        }
    }
    Ok(Version::new(parts[0], parts[1], parts[2]))
}

/// `<user_home>/cache`, with the user home defaulting to `~/.sonar`.
fn default_cache_root(user_home: Option<PathBuf>) -> PathBuf {
    user_home
        .or_else(|| dirs::home_dir().map(|home| home.join(".sonar")))
        .unwrap_or_else(|| PathBuf::from(".sonar"))
        .join("cache")
}

fn parse_flag(value: &str) -> bool {
    let value = value.trim();
    value.eq_ignore_ascii_case("true") || value == "1"
}
