//! Single source of truth for version information.

use serde::{Deserialize, Serialize};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `git describe` of the build tree, `-dirty` when it had local changes
pub const GIT_SHA: &str = env!("TECHCARE_GIT_SHA");

/// UTC build date
pub const BUILD_DATE: &str = env!("TECHCARE_BUILD_DATE");

/// Target triple, e.g. x86_64-unknown-linux-gnu
pub const BUILD_TARGET: &str = env!("TECHCARE_BUILD_TARGET");

/// `debug` or `release`
pub const BUILD_PROFILE: &str = env!("TECHCARE_BUILD_PROFILE");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_sha: String,
    pub build_date: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub profile: String,
}

impl VersionInfo {
    pub fn current() -> Self {
        Self {
            version: VERSION.to_string(),
            git_sha: GIT_SHA.to_string(),
            build_date: BUILD_DATE.to_string(),
            target: BUILD_TARGET.to_string(),
            profile: BUILD_PROFILE.to_string(),
        }
    }
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {})", self.version, self.git_sha, self.build_date)?;
        if self.profile == "debug" {
            write!(f, " [debug]")?;
        }
        Ok(())
    }
}
