//! Scheduled maintenance plans and the background scheduler.

use crate::state::AppState;
use crate::store::{read_json, write_json_atomic};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use techcare_shared::api::{CleanRequest, MaintenanceRun};
use techcare_shared::error::Result;
use techcare_shared::schedule::{MaintenancePlan, PlanDraft};
use techcare_shared::TechcareError;
use tokio::sync::watch;
use tracing::{error, info};

/// Scheduled runs kept in memory for the run log
pub const RUN_LOG_CAPACITY: usize = 100;

pub struct MaintenanceStore {
    path: PathBuf,
    plans: Vec<MaintenancePlan>,
    runs: VecDeque<MaintenanceRun>,
}

impl MaintenanceStore {
    pub fn open(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join("maintenance.json");
        let plans = read_json(&path)?.unwrap_or_default();
        Ok(Self {
            path,
            plans,
            runs: VecDeque::new(),
        })
    }

    /// Persist a changed copy before swapping it in
    fn commit<T>(
        &mut self,
        change: impl FnOnce(&mut Vec<MaintenancePlan>) -> Result<T>,
    ) -> Result<T> {
        let mut plans = self.plans.clone();
        let out = change(&mut plans)?;
        write_json_atomic(&self.path, &plans)?;
        self.plans = plans;
        Ok(out)
    }

    pub fn list(&self, user_id: &str) -> Vec<MaintenancePlan> {
        let mut plans: Vec<MaintenancePlan> = self
            .plans
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        plans.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        plans
    }

    pub fn get(&self, id: &str, user_id: &str) -> Result<MaintenancePlan> {
        self.plans
            .iter()
            .find(|p| p.id == id && p.user_id == user_id)
            .cloned()
            .ok_or_else(|| TechcareError::not_found(format!("maintenance plan {}", id)))
    }

    pub fn create(
        &mut self,
        user_id: &str,
        draft: PlanDraft,
        now: DateTime<Utc>,
    ) -> Result<MaintenancePlan> {
        let plan = MaintenancePlan::create(
            uuid::Uuid::new_v4().to_string(),
            user_id.to_string(),
            draft,
            now,
        )?;
        self.commit(|plans| {
            plans.push(plan.clone());
            Ok(())
        })?;
        info!("  Maintenance plan '{}' created for {}", plan.name, user_id);
        Ok(plan)
    }

    pub fn update(
        &mut self,
        id: &str,
        user_id: &str,
        draft: PlanDraft,
        now: DateTime<Utc>,
    ) -> Result<MaintenancePlan> {
        self.commit(|plans| {
            let plan = plans
                .iter_mut()
                .find(|p| p.id == id && p.user_id == user_id)
                .ok_or_else(|| TechcareError::not_found(format!("maintenance plan {}", id)))?;
            plan.apply(draft, now)?;
            Ok(plan.clone())
        })
    }

    pub fn delete(&mut self, id: &str, user_id: &str) -> Result<()> {
        self.commit(|plans| {
            let before = plans.len();
            plans.retain(|p| !(p.id == id && p.user_id == user_id));
            if plans.len() == before {
                return Err(TechcareError::not_found(format!("maintenance plan {}", id)));
            }
            Ok(())
        })
    }

    /// Enabled plans whose next run is at or before `now`
    pub fn due(&self, now: DateTime<Utc>) -> Vec<MaintenancePlan> {
        self.plans.iter().filter(|p| p.is_due(now)).cloned().collect()
    }

    pub fn record_run(&mut self, run: MaintenanceRun) {
        if self.runs.len() == RUN_LOG_CAPACITY {
            self.runs.pop_front();
        }
        self.runs.push_back(run);
    }

    /// Newest first, `limit` defaults to 20
    pub fn recent_runs(&self, limit: Option<usize>) -> Vec<MaintenanceRun> {
        let limit = limit.unwrap_or(20).clamp(1, RUN_LOG_CAPACITY);
        self.runs.iter().rev().take(limit).cloned().collect()
    }

    pub fn mark_run(&mut self, id: &str, now: DateTime<Utc>) -> Result<()> {
        self.commit(|plans| {
            let plan = plans
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| TechcareError::not_found(format!("maintenance plan {}", id)))?;
            plan.mark_run(now);
            Ok(())
        })
    }
}

/// Run every due plan once. Returns how many ran.
pub async fn run_due(state: &Arc<AppState>, now: DateTime<Utc>) -> usize {
    let due = state.maintenance.read().await.due(now);
    let mut ran = 0;

    for plan in due {
        let cleaner = state.cleaner.clone();
        let request = CleanRequest {
            kinds: plan.cleaning.clone(),
            dry_run: false,
            older_than_secs: None,
        };
        let mut run = MaintenanceRun {
            plan_id: plan.id.clone(),
            plan_name: plan.name.clone(),
            user_id: plan.user_id.clone(),
            at: now,
            removed_files: 0,
            freed_bytes: 0,
            failed: 0,
            error: None,
        };
        match tokio::task::spawn_blocking(move || cleaner.clean(&request)).await {
            Ok(summary) => {
                info!(
                    "  Maintenance '{}' ({}): {} files, {} freed, {} failed",
                    plan.name, plan.id, summary.removed_files, summary.freed, summary.failed
                );
                run.removed_files = summary.removed_files;
                run.freed_bytes = summary.freed_bytes;
                run.failed = summary.failed;
            }
            Err(e) => {
                error!("  Maintenance '{}' crashed: {}", plan.name, e);
                run.error = Some(e.to_string());
            }
        }

        let mut store = state.maintenance.write().await;
        // Reschedule even after a failure so a broken plan does not spin
        if let Err(e) = store.mark_run(&plan.id, now) {
            error!("  Could not record maintenance run {}: {}", plan.id, e);
            run.error.get_or_insert_with(|| e.to_string());
        }
        store.record_run(run);
        ran += 1;
    }
    ran
}

/// Tick until `shutdown` flips to true
pub async fn run_scheduler(
    state: Arc<AppState>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("  Maintenance scheduler running every {}s", interval.as_secs());
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_due(&state, Utc::now()).await;
                state.sessions.lock().await.prune();
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!("  Maintenance scheduler stopped");
}
