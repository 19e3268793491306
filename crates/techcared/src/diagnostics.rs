//! Diagnostic runs: collect, analyze, score, advise, persist.

use crate::analyzers::{AnalyzerRegistry, Thresholds};
use crate::cache::TtlCache;
use crate::repository::DiagnosticRepository;
use crate::snapshot::{collect_async, SnapshotSource, SystemSnapshot};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use techcare_shared::error::Result;
use techcare_shared::report::{Category, DiagnosticReport, DiagnosticSummary, SystemInfo};
use techcare_shared::TechcareError;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

pub struct DiagnosticService {
    source: Arc<dyn SnapshotSource>,
    registry: AnalyzerRegistry,
    thresholds: Thresholds,
    snapshots: Mutex<TtlCache<(), SystemSnapshot>>,
    repository: RwLock<DiagnosticRepository>,
}

impl DiagnosticService {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        thresholds: Thresholds,
        snapshot_ttl: Duration,
        repository: DiagnosticRepository,
    ) -> Self {
        Self {
            source,
            registry: AnalyzerRegistry::new(),
            thresholds,
            snapshots: Mutex::new(TtlCache::new(snapshot_ttl)),
            repository: RwLock::new(repository),
        }
    }

    pub fn categories(&self) -> Vec<Category> {
        self.registry.categories()
    }

    /// Cached snapshot, collected on a blocking thread when stale.
    /// The lock is held while collecting so concurrent runs share one collection.
    pub async fn snapshot(&self) -> Result<SystemSnapshot> {
        let mut cache = self.snapshots.lock().await;
        if let Some(snapshot) = cache.get(&()) {
            debug!("  Snapshot cache hit");
            return Ok(snapshot);
        }
        let snapshot = collect_async(self.source.clone())
            .await
            .map_err(|e| TechcareError::Collector(e.to_string()))?;
        cache.insert((), snapshot.clone());
        Ok(snapshot)
    }

    pub async fn invalidate_snapshot(&self) {
        self.snapshots.lock().await.clear();
    }

    pub async fn system_info(&self) -> Result<SystemInfo> {
        Ok(self.snapshot().await?.system)
    }

    /// Run every analyzer for `user_id` and store the report
    pub async fn run(&self, user_id: &str) -> Result<DiagnosticReport> {
        let started = Instant::now();
        let snapshot = self.snapshot().await?;
        let components = self.registry.run_all(&snapshot, &self.thresholds);

        let report = DiagnosticReport::assemble(
            uuid::Uuid::new_v4().to_string(),
            user_id.to_string(),
            Utc::now(),
            started.elapsed().as_millis() as u64,
            snapshot.system,
            components,
        );

        self.repository.write().await.save(&report)?;
        info!(
            "  Diagnostic {} for {}: score {} ({}), {} problems",
            report.id,
            user_id,
            report.health_score,
            report.status,
            report.problems.len()
        );
        Ok(report)
    }

    pub async fn latest(&self, user_id: &str) -> Result<DiagnosticReport> {
        self.repository.read().await.latest(user_id)
    }

    /// One report; `owner` restricts the lookup to that user's reports
    pub async fn get(&self, id: &str, owner: Option<&str>) -> Result<DiagnosticReport> {
        self.repository.read().await.get_by_id(id, owner)
    }

    pub async fn history(&self, user_id: &str, limit: usize) -> Vec<DiagnosticSummary> {
        self.repository.read().await.history(user_id, limit)
    }

    pub async fn all(&self, limit: usize) -> Vec<DiagnosticSummary> {
        self.repository.read().await.all(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::fixtures;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingSource {
        snapshot: SystemSnapshot,
        calls: AtomicUsize,
    }

    impl SnapshotSource for CountingSource {
        fn collect(&self) -> SystemSnapshot {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.snapshot.clone()
        }
    }

    fn service(dir: &TempDir, snapshot: SystemSnapshot, ttl: Duration) -> (DiagnosticService, Arc<CountingSource>) {
        let source = Arc::new(CountingSource {
            snapshot,
            calls: AtomicUsize::new(0),
        });
        let repo = DiagnosticRepository::open(dir.path()).unwrap();
        let service = DiagnosticService::new(source.clone(), Thresholds::default(), ttl, repo);
        (service, source)
    }

    #[tokio::test]
    async fn test_healthy_run_is_excellent() {
        let dir = TempDir::new().unwrap();
        let (service, _) = service(&dir, fixtures::healthy(), Duration::from_secs(300));
        let report = service.run("alice").await.unwrap();
        assert_eq!(report.health_score, 100);
        assert_eq!(report.components.len(), 7);
        assert_eq!(service.latest("alice").await.unwrap().id, report.id);
    }

    #[tokio::test]
    async fn test_problems_lower_score() {
        let dir = TempDir::new().unwrap();
        let mut snap = fixtures::healthy();
        snap.cpu.usage_percent = 95.0;
        snap.security.firewall = crate::snapshot::FirewallState::Inactive;
        let (service, _) = service(&dir, snap, Duration::from_secs(300));
        let report = service.run("alice").await.unwrap();
        // two High problems at 10 points each
        assert_eq!(report.health_score, 80);
        assert!(report.recommendations.len() >= 2);
    }

    #[tokio::test]
    async fn test_snapshot_is_cached() {
        let dir = TempDir::new().unwrap();
        let (service, source) = service(&dir, fixtures::healthy(), Duration::from_secs(300));
        service.run("alice").await.unwrap();
        service.run("alice").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.history("alice", 10).await.len(), 2);

        service.invalidate_snapshot().await;
        service.system_info().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_recollects() {
        let dir = TempDir::new().unwrap();
        let (service, source) = service(&dir, fixtures::healthy(), Duration::ZERO);
        service.snapshot().await.unwrap();
        service.snapshot().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
