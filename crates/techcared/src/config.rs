//! Configuration management for techcared.
//!
//! A file named by `--config` or `TECHCARE_CONFIG` must load. Otherwise
//! /etc/techcare/config.toml, then `$XDG_CONFIG_HOME/techcare/config.toml`,
//! or defaults.

use crate::analyzers::Thresholds;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use techcare_shared::{CONFIG_PATH, DEFAULT_LISTEN_ADDR, STATE_DIR};
use tracing::{info, warn};

/// Environment variable overriding the config path
pub const CONFIG_ENV: &str = "TECHCARE_CONFIG";

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Allowed CORS origins; empty means same-origin only
    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_listen() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            cors_origins: Vec::new(),
            request_timeout_secs: default_request_timeout(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl ServerConfig {
    /// Diagnostics take a few seconds; never time out below that
    pub fn effective_request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.clamp(5, 600))
    }

    pub fn effective_body_limit(&self) -> usize {
        self.body_limit_bytes.clamp(1024, 1024 * 1024)
    }
}

/// Token and bootstrap account settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret; generated per process when empty
    #[serde(default)]
    pub jwt_secret: String,

    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: u64,

    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: u64,

    /// Admin account created when the user store is empty
    #[serde(default = "default_bootstrap_user")]
    pub bootstrap_admin: String,

    #[serde(default)]
    pub bootstrap_password: Option<String>,

    #[serde(default = "default_bootstrap_email")]
    pub bootstrap_email: String,
}

fn default_access_ttl() -> u64 {
    15 * 60
}

fn default_refresh_ttl() -> u64 {
    7 * 24 * 3600
}

fn default_bootstrap_user() -> String {
    "admin".to_string()
}

fn default_bootstrap_email() -> String {
    "admin@localhost".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            access_ttl_secs: default_access_ttl(),
            refresh_ttl_secs: default_refresh_ttl(),
            bootstrap_admin: default_bootstrap_user(),
            bootstrap_password: None,
            bootstrap_email: default_bootstrap_email(),
        }
    }
}

impl AuthConfig {
    pub fn effective_access_ttl(&self) -> u64 {
        self.access_ttl_secs.clamp(60, 24 * 3600)
    }

    pub fn effective_refresh_ttl(&self) -> u64 {
        self.refresh_ttl_secs
            .clamp(self.effective_access_ttl(), 90 * 24 * 3600)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(STATE_DIR)
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// How long a collected snapshot is reused
    #[serde(default = "default_snapshot_ttl")]
    pub snapshot_ttl_secs: u64,

    /// host:port used for the connectivity probe
    #[serde(default = "default_connectivity_target")]
    pub connectivity_target: String,

    #[serde(default = "default_connectivity_timeout")]
    pub connectivity_timeout_ms: u64,

    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    #[serde(default)]
    pub thresholds: Thresholds,
}

fn default_snapshot_ttl() -> u64 {
    300
}

fn default_connectivity_target() -> String {
    "1.1.1.1:443".to_string()
}

fn default_connectivity_timeout() -> u64 {
    2000
}

fn default_history_limit() -> usize {
    20
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            snapshot_ttl_secs: default_snapshot_ttl(),
            connectivity_target: default_connectivity_target(),
            connectivity_timeout_ms: default_connectivity_timeout(),
            history_limit: default_history_limit(),
            thresholds: Thresholds::default(),
        }
    }
}

impl DiagnosticsConfig {
    pub fn effective_snapshot_ttl(&self) -> Duration {
        Duration::from_secs(self.snapshot_ttl_secs.min(3600))
    }

    pub fn effective_connectivity_timeout(&self) -> Duration {
        Duration::from_millis(self.connectivity_timeout_ms.clamp(100, 10_000))
    }

    /// Clamp a requested history size
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.history_limit).clamp(1, 500)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanerConfig {
    /// Extra temp roots scanned besides /tmp, /var/tmp and ~/.cache
    #[serde(default)]
    pub extra_temp_roots: Vec<PathBuf>,

    /// Directories searched for rotated logs
    #[serde(default = "default_log_dirs")]
    pub log_dirs: Vec<PathBuf>,

    /// Root of the large-file search; home directory when unset
    #[serde(default)]
    pub large_file_root: Option<PathBuf>,

    #[serde(default = "default_large_file_min")]
    pub large_file_min_mb: u64,

    #[serde(default = "default_large_file_count")]
    pub large_file_count: usize,

    #[serde(default = "default_download_age")]
    pub download_age_days: u64,

    /// Files younger than this are never removed
    #[serde(default = "default_min_age")]
    pub min_age_secs: u64,
}

fn default_log_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("/var/log")]
}

fn default_large_file_min() -> u64 {
    100
}

fn default_large_file_count() -> usize {
    20
}

fn default_download_age() -> u64 {
    30
}

fn default_min_age() -> u64 {
    3600
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            extra_temp_roots: Vec::new(),
            log_dirs: default_log_dirs(),
            large_file_root: None,
            large_file_min_mb: default_large_file_min(),
            large_file_count: default_large_file_count(),
            download_age_days: default_download_age(),
            min_age_secs: default_min_age(),
        }
    }
}

impl CleanerConfig {
    pub fn effective_large_file_count(&self) -> usize {
        self.large_file_count.clamp(1, 200)
    }

    pub fn effective_large_file_min_bytes(&self) -> u64 {
        self.large_file_min_mb.max(1).saturating_mul(1024 * 1024)
    }

    /// Capped at ten years
    pub fn effective_download_age(&self) -> Duration {
        Duration::from_secs(self.download_age_days.min(3650) * 24 * 3600)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    #[serde(default = "default_idle_ttl")]
    pub idle_ttl_secs: u64,

    #[serde(default = "default_max_per_user")]
    pub max_per_user: usize,
}

fn default_idle_ttl() -> u64 {
    3600
}

fn default_max_per_user() -> usize {
    10
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: default_idle_ttl(),
            max_per_user: default_max_per_user(),
        }
    }
}

impl SessionsConfig {
    pub fn effective_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs.clamp(60, 7 * 24 * 3600))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_scheduler_enabled")]
    pub enabled: bool,

    #[serde(default = "default_tick")]
    pub tick_secs: u64,
}

fn default_scheduler_enabled() -> bool {
    true
}

fn default_tick() -> u64 {
    60
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_scheduler_enabled(),
            tick_secs: default_tick(),
        }
    }
}

impl SchedulerConfig {
    pub fn effective_tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs.clamp(5, 3600))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// tracing filter directive; RUST_LOG wins when set
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,

    #[serde(default)]
    pub cleaner: CleanerConfig,

    #[serde(default)]
    pub sessions: SessionsConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// The file named by `--config` or `TECHCARE_CONFIG`, if any
    fn requested_path(explicit: Option<&Path>) -> Option<PathBuf> {
        explicit.map(Path::to_path_buf).or_else(|| {
            std::env::var(CONFIG_ENV)
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
        })
    }

    /// Default config locations, highest priority first
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_PATH)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("techcare").join("config.toml"));
        }
        paths
    }

    /// Load the requested config file, which must be valid, or the first
    /// readable default location, or defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = Self::requested_path(explicit) {
            return Self::load_from_path(&path)
                .with_context(|| format!("cannot load config {}", path.display()));
        }
        for path in Self::search_paths() {
            if !path.exists() {
                continue;
            }
            match Self::load_from_path(&path) {
                Ok(config) => return Ok(config),
                Err(e) => warn!("Ignoring invalid config {}: {}", path.display(), e),
            }
        }
        info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Load config from specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.listen, "127.0.0.1:7870");
        assert_eq!(config.server.body_limit_bytes, 64 * 1024);
        assert_eq!(config.auth.access_ttl_secs, 900);
        assert_eq!(config.auth.refresh_ttl_secs, 604_800);
        assert_eq!(config.diagnostics.snapshot_ttl_secs, 300);
        assert_eq!(config.cleaner.min_age_secs, 3600);
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
[server]
listen = "0.0.0.0:9000"
cors_origins = ["http://localhost:5173"]

[diagnostics]
snapshot_ttl_secs = 60

[diagnostics.thresholds]
disk_critical_percent = 98.0

[log]
level = "debug"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:9000");
        assert_eq!(config.server.cors_origins.len(), 1);
        assert_eq!(config.diagnostics.snapshot_ttl_secs, 60);
        assert_eq!(config.diagnostics.thresholds.disk_critical_percent, 98.0);
        // Defaults for missing fields
        assert_eq!(config.diagnostics.thresholds.disk_high_percent, 90.0);
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_effective_clamps() {
        let toml_str = r#"
[server]
request_timeout_secs = 1
body_limit_bytes = 10

[auth]
access_ttl_secs = 5
refresh_ttl_secs = 1

[scheduler]
tick_secs = 0
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.effective_request_timeout(), Duration::from_secs(5));
        assert_eq!(config.server.effective_body_limit(), 1024);
        assert_eq!(config.auth.effective_access_ttl(), 60);
        assert_eq!(config.auth.effective_refresh_ttl(), 60);
        assert_eq!(config.scheduler.effective_tick(), Duration::from_secs(5));
        assert_eq!(config.diagnostics.effective_limit(Some(0)), 1);
        assert_eq!(config.diagnostics.effective_limit(None), 20);
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[scheduler]\nenabled = false\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert!(!config.scheduler.enabled);
    }

    #[test]
    fn test_explicit_path_must_load() {
        let dir = TempDir::new().unwrap();
        let bad = dir.path().join("config.toml");
        fs::write(&bad, "[server\nlisten = ").unwrap();
        assert!(Config::load(Some(&bad)).is_err());
        assert!(Config::load(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_age_and_size_clamps_do_not_overflow() {
        let config: Config = toml::from_str(
            "[cleaner]\ndownload_age_days = 9223372036854775807\nlarge_file_min_mb = 9223372036854775807\n",
        )
        .unwrap();
        assert_eq!(
            config.cleaner.effective_download_age(),
            Duration::from_secs(3650 * 24 * 3600)
        );
        assert_eq!(config.cleaner.effective_large_file_min_bytes(), u64::MAX);
    }

    #[test]
    fn test_invalid_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[server\nlisten = ").unwrap();
        assert!(Config::load_from_path(&path).is_err());
    }
}
