//! Diagnostic report persistence.
//!
//! One JSON file per report at `<data_dir>/diagnostics/<user_id>/<id>.json`,
//! with an in-memory index of summaries rebuilt on open.

use crate::store::{read_json, write_json_atomic};
use std::fs;
use std::path::{Path, PathBuf};
use techcare_shared::error::Result;
use techcare_shared::report::{DiagnosticReport, DiagnosticSummary};
use techcare_shared::TechcareError;
use tracing::{info, warn};

pub struct DiagnosticRepository {
    root: PathBuf,
    /// Sorted newest first
    index: Vec<DiagnosticSummary>,
}

impl DiagnosticRepository {
    pub fn open(data_dir: &Path) -> Result<Self> {
        let root = data_dir.join("diagnostics");
        fs::create_dir_all(&root)?;

        let mut index = Vec::new();
        for user_dir in fs::read_dir(&root)?.flatten() {
            if !user_dir.path().is_dir() {
                continue;
            }
            for entry in fs::read_dir(user_dir.path())?.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                match read_json::<DiagnosticReport>(&path) {
                    Ok(Some(report)) => index.push(report.summary()),
                    Ok(None) => {}
                    Err(e) => warn!("Skipping diagnostic {}: {}", path.display(), e),
                }
            }
        }

        let mut repo = Self { root, index };
        repo.sort_index();
        info!("  Loaded {} diagnostic reports", repo.index.len());
        Ok(repo)
    }

    fn sort_index(&mut self) {
        self.index.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
    }

    fn path_for(&self, user_id: &str, id: &str) -> PathBuf {
        self.root.join(user_id).join(format!("{}.json", id))
    }

    pub fn save(&mut self, report: &DiagnosticReport) -> Result<()> {
        if !is_safe_component(&report.user_id) || !is_safe_component(&report.id) {
            return Err(TechcareError::validation("invalid report identifiers"));
        }
        write_json_atomic(&self.path_for(&report.user_id, &report.id), report)?;
        self.index.retain(|s| s.id != report.id);
        self.index.push(report.summary());
        self.sort_index();
        Ok(())
    }

    /// Report by id; when `user_id` is given the report must belong to that user
    pub fn get_by_id(&self, id: &str, user_id: Option<&str>) -> Result<DiagnosticReport> {
        let summary = self
            .index
            .iter()
            .find(|s| s.id == id && user_id.map_or(true, |u| s.user_id == u))
            .ok_or_else(|| TechcareError::not_found(format!("diagnostic {}", id)))?;
        read_json(&self.path_for(&summary.user_id, &summary.id))?
            .ok_or_else(|| TechcareError::not_found(format!("diagnostic {}", id)))
    }

    pub fn latest(&self, user_id: &str) -> Result<DiagnosticReport> {
        let id = self
            .index
            .iter()
            .find(|s| s.user_id == user_id)
            .map(|s| s.id.clone())
            .ok_or_else(|| TechcareError::not_found("no diagnostics yet"))?;
        self.get_by_id(&id, Some(user_id))
    }

    /// A user's reports, newest first
    pub fn history(&self, user_id: &str, limit: usize) -> Vec<DiagnosticSummary> {
        self.index
            .iter()
            .filter(|s| s.user_id == user_id)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Every user's reports, newest first
    pub fn all(&self, limit: usize) -> Vec<DiagnosticSummary> {
        self.index.iter().take(limit).cloned().collect()
    }

    pub fn delete(&mut self, id: &str, user_id: Option<&str>) -> Result<()> {
        let pos = self
            .index
            .iter()
            .position(|s| s.id == id && user_id.map_or(true, |u| s.user_id == u))
            .ok_or_else(|| TechcareError::not_found(format!("diagnostic {}", id)))?;
        let summary = self.index.remove(pos);
        match fs::remove_file(self.path_for(&summary.user_id, &summary.id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Ids become path components; reject separators and dot segments
fn is_safe_component(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && s != ".."
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
