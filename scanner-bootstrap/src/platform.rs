//! Host operating system and architecture detection.
//!
//! Names follow the provisioning server's vocabulary (`linux`, `alpine`,
//! `windows`, `macos`; `x64`, `aarch64`). Anything else is reported as
//! unknown so that platform-specific provisioning is skipped.

use std::fmt;
use std::path::Path;

/// Marker file present on Alpine Linux (musl) installations.
const ALPINE_RELEASE: &str = "/etc/alpine-release";

/// The platform an artifact is requested for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Platform {
    /// Operating system name, if known.
    pub os: Option<String>,
    /// CPU architecture name, if known.
    pub arch: Option<String>,
}

impl Platform {
    /// Create a platform from explicit values.
    pub fn new(os: Option<String>, arch: Option<String>) -> Self {
        Self { os, arch }
    }

    /// Detect the platform this binary runs on.
    pub fn current() -> Self {
        Self {
            os: os_name(std::env::consts::OS, Path::new(ALPINE_RELEASE).exists())
                .map(str::to_string),
            arch: arch_name(std::env::consts::ARCH).map(str::to_string),
        }
    }

    /// Replace detected values with explicit overrides, when given.
    pub fn with_overrides(mut self, os: Option<String>, arch: Option<String>) -> Self {
        if os.is_some() {
            self.os = os;
        }
        if arch.is_some() {
            self.arch = arch;
        }
        self
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.os.as_deref().unwrap_or("unknown"),
            self.arch.as_deref().unwrap_or("unknown")
        )
    }
}

fn os_name(os: &str, alpine: bool) -> Option<&'static str> {
    match os {
        "linux" if alpine => Some("alpine"),
        "linux" => Some("linux"),
        "windows" => Some("windows"),
        "macos" => Some("macos"),
        _ => None,
    }
}

fn arch_name(arch: &str) -> Option<&'static str> {
    match arch {
        "x86_64" => Some("x64"),
        "aarch64" => Some("aarch64"),
        _ => None,
    }
}
