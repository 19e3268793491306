//! Repair plans generated from diagnostic reports, stored per user.

use crate::store::{read_json, write_json_atomic};
use chrono::Utc;
use std::path::{Path, PathBuf};
use techcare_shared::api::StepUpdate;
use techcare_shared::error::Result;
use techcare_shared::repair::RepairPlan;
use techcare_shared::report::DiagnosticReport;
use techcare_shared::TechcareError;
use tracing::info;

fn plan_mut<'a>(plans: &'a mut [RepairPlan], id: &str, user_id: &str) -> Result<&'a mut RepairPlan> {
    plans
        .iter_mut()
        .find(|p| p.id == id && p.user_id == user_id)
        .ok_or_else(|| TechcareError::not_found(format!("repair plan {}", id)))
}

pub struct RepairStore {
    path: PathBuf,
    plans: Vec<RepairPlan>,
}

impl RepairStore {
    pub fn open(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join("repair_plans.json");
        let plans = read_json(&path)?.unwrap_or_default();
        Ok(Self { path, plans })
    }

    /// Persist a changed copy before swapping it in
    fn commit<T>(&mut self, change: impl FnOnce(&mut Vec<RepairPlan>) -> Result<T>) -> Result<T> {
        let mut plans = self.plans.clone();
        let out = change(&mut plans)?;
        write_json_atomic(&self.path, &plans)?;
        self.plans = plans;
        Ok(out)
    }

    pub fn create(&mut self, user_id: &str, report: &DiagnosticReport) -> Result<RepairPlan> {
        let plan = RepairPlan::generate(
            uuid::Uuid::new_v4().to_string(),
            user_id.to_string(),
            &report.problems,
            Some(report.id.clone()),
            Utc::now(),
        );
        self.commit(|plans| {
            plans.push(plan.clone());
            Ok(())
        })?;
        info!(
            "  Repair plan {} with {} steps from diagnostic {}",
            plan.id,
            plan.steps.len(),
            report.id
        );
        Ok(plan)
    }

    /// A user's plans, newest first
    pub fn list(&self, user_id: &str) -> Vec<RepairPlan> {
        let mut plans: Vec<RepairPlan> = self
            .plans
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        plans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        plans
    }

    pub fn get(&self, id: &str, user_id: &str) -> Result<RepairPlan> {
        self.plans
            .iter()
            .find(|p| p.id == id && p.user_id == user_id)
            .cloned()
            .ok_or_else(|| TechcareError::not_found(format!("repair plan {}", id)))
    }

    pub fn complete_step(&mut self, id: &str, user_id: &str, step_id: &str) -> Result<StepUpdate> {
        self.commit(|plans| {
            let plan = plan_mut(plans, id, user_id)?;
            let step = plan.complete_step(step_id)?.clone();
            Ok(StepUpdate {
                step,
                progress: plan.progress(),
                finished: plan.is_finished(),
            })
        })
    }

    pub fn skip_step(&mut self, id: &str, user_id: &str, step_id: &str) -> Result<StepUpdate> {
        self.commit(|plans| {
            let plan = plan_mut(plans, id, user_id)?;
            let step = plan.skip_step(step_id)?.clone();
            Ok(StepUpdate {
                step,
                progress: plan.progress(),
                finished: plan.is_finished(),
            })
        })
    }

    pub fn delete(&mut self, id: &str, user_id: &str) -> Result<()> {
        self.commit(|plans| {
            let before = plans.len();
            plans.retain(|p| !(p.id == id && p.user_id == user_id));
            if plans.len() == before {
                return Err(TechcareError::not_found(format!("repair plan {}", id)));
            }
            Ok(())
        })
    }
}
