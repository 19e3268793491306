//! Shared types and domain logic for TechCare components.
//!
//! Everything in this crate is pure: no filesystem, network or process access.
//! The daemon feeds it collected evidence, the CLI renders what it returns.

pub mod advice;
pub mod api;
pub mod chat;
pub mod error;
pub mod format;
pub mod guide;
pub mod repair;
pub mod report;
pub mod roles;
pub mod schedule;
pub mod version;

pub use error::TechcareError;
pub use report::{Category, DiagnosticReport, HealthStatus, Problem, Severity};
pub use roles::{Permission, PermissionSet, Role};
pub use version::{VersionInfo, BUILD_DATE, GIT_SHA, VERSION};

/// Default listen address for techcared
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:7870";

/// Default server URL used by techcarectl
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:7870";

/// System config file path
pub const CONFIG_PATH: &str = "/etc/techcare/config.toml";

/// State directory for techcared
pub const STATE_DIR: &str = "/var/lib/techcare";

/// API version prefix
pub const API_PREFIX: &str = "/v1";
