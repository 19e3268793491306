//! Application state shared across handlers.

use crate::auth::TokenIssuer;
use crate::cleaner::Cleaner;
use crate::config::Config;
use crate::diagnostics::DiagnosticService;
use crate::maintenance::MaintenanceStore;
use crate::repairs::RepairStore;
use crate::repository::DiagnosticRepository;
use crate::sessions::SessionStore;
use crate::snapshot::SnapshotSource;
use crate::users::UserStore;
use std::fs;
use std::sync::Arc;
use std::time::Instant;
use techcare_shared::error::Result;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

pub struct AppState {
    pub config: Config,
    pub started_at: Instant,
    pub diagnostics: DiagnosticService,
    pub cleaner: Arc<Cleaner>,
    pub tokens: TokenIssuer,
    pub users: RwLock<UserStore>,
    pub sessions: Mutex<SessionStore>,
    pub repairs: RwLock<RepairStore>,
    pub maintenance: RwLock<MaintenanceStore>,
}

impl AppState {
    /// Open every store under `storage.data_dir` and bootstrap the admin account
    pub fn new(config: Config, source: Arc<dyn SnapshotSource>, cleaner: Cleaner) -> Result<Self> {
        let data_dir = config.storage.data_dir.clone();
        fs::create_dir_all(&data_dir)?;
        info!("  Data directory: {}", data_dir.display());

        let diagnostics = DiagnosticService::new(
            source,
            config.diagnostics.thresholds.clone(),
            config.diagnostics.effective_snapshot_ttl(),
            DiagnosticRepository::open(&data_dir)?,
        );

        let mut users = UserStore::open(&data_dir)?;
        if let Some(password) = users.bootstrap_admin(
            &config.auth.bootstrap_admin,
            &config.auth.bootstrap_email,
            config.auth.bootstrap_password.as_deref(),
        )? {
            // Only shown once, on first start
            info!("  Initial password for '{}': {}", config.auth.bootstrap_admin, password);
        }

        Ok(Self {
            tokens: TokenIssuer::from_config(&config.auth),
            sessions: Mutex::new(SessionStore::new(
                config.sessions.effective_idle_ttl(),
                config.sessions.max_per_user,
            )),
            started_at: Instant::now(),
            diagnostics,
            cleaner: Arc::new(cleaner),
            users: RwLock::new(users),
            repairs: RwLock::new(RepairStore::open(&data_dir)?),
            maintenance: RwLock::new(MaintenanceStore::open(&data_dir)?),
            config,
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
