//! HTTP API request and response types shared by techcared and techcarectl.

use crate::chat::ChatMessage;
use crate::guide::{CompletionReport, GuideKind, GuideSession, GuideStep, MaintenanceGuide, SessionState};
use crate::repair::{Progress, RepairStep};
use crate::report::Category;
use crate::roles::Role;
use crate::schedule::CleaningKind;
use crate::version::VersionInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error body returned on every non-2xx response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: VersionInfo,
    pub uptime_secs: u64,
    pub analyzers: Vec<Category>,
}

// ============================================================================
// Auth and users
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    HighContrast,
}

impl Theme {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            "high_contrast" | "contrast" => Some(Theme::HighContrast),
            _ => None,
        }
    }
}

pub const MIN_FONT_SCALE: f32 = 0.8;
pub const MAX_FONT_SCALE: f32 = 1.6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default = "default_font_scale")]
    pub font_scale: f32,
}

fn default_font_scale() -> f32 {
    1.0
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            font_scale: default_font_scale(),
        }
    }
}

impl Preferences {
    /// Font scale clamped to the supported range
    pub fn effective_font_scale(&self) -> f32 {
        if self.font_scale.is_finite() {
            self.font_scale.clamp(MIN_FONT_SCALE, MAX_FONT_SCALE)
        } else {
            default_font_scale()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserView {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub preferences: Preferences,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
    pub role: Role,
    pub dashboard_path: String,
    pub user: UserView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub active: Option<bool>,
}

// ============================================================================
// Diagnostics and cleaner
// ============================================================================

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathUsage {
    pub path: String,
    pub bytes: u64,
    pub files: u64,
    pub formatted: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LargeFile {
    pub path: String,
    pub bytes: u64,
    pub formatted: String,
    pub modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskSpace {
    pub mount: String,
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub used_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupAnalysis {
    pub temp: Vec<PathUsage>,
    pub browser_caches: Vec<PathUsage>,
    pub logs: Vec<PathUsage>,
    pub downloads: Option<PathUsage>,
    pub recycle_bin: Option<PathUsage>,
    pub large_files: Vec<LargeFile>,
    pub disk_space: Vec<DiskSpace>,
    pub total_reclaimable_bytes: u64,
    pub total_reclaimable: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanRequest {
    pub kinds: Vec<CleaningKind>,
    #[serde(default)]
    pub dry_run: bool,
    /// Only files older than this are removed (default one hour)
    #[serde(default)]
    pub older_than_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanSummary {
    pub removed_files: u64,
    pub freed_bytes: u64,
    pub freed: String,
    pub failed: u64,
    pub dry_run: bool,
}

/// Outcome of one scheduled maintenance run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceRun {
    pub plan_id: String,
    pub plan_name: String,
    pub user_id: String,
    pub at: DateTime<Utc>,
    pub removed_files: u64,
    pub freed_bytes: u64,
    pub failed: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Repair
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateRepairPlanRequest {
    /// Diagnostic to plan from; latest when absent
    #[serde(default)]
    pub diagnostic_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepUpdate {
    pub step: RepairStep,
    pub progress: Progress,
    pub finished: bool,
}

// ============================================================================
// Chat and guides
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideStepView {
    pub title: String,
    pub description: String,
    pub instructions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl From<&GuideStep> for GuideStepView {
    fn from(step: &GuideStep) -> Self {
        Self {
            title: step.title.to_string(),
            description: step.description.to_string(),
            instructions: step.instructions.iter().map(|s| s.to_string()).collect(),
            details: step.details.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideSummary {
    pub kind: GuideKind,
    pub title: String,
    pub description: String,
    pub steps: Vec<GuideStepView>,
}

impl From<&MaintenanceGuide> for GuideSummary {
    fn from(guide: &MaintenanceGuide) -> Self {
        Self {
            kind: guide.kind,
            title: guide.title.to_string(),
            description: guide.description.to_string(),
            steps: guide.steps.iter().map(GuideStepView::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideStatus {
    pub kind: GuideKind,
    pub title: String,
    /// Zero-based index of the current step
    pub current: usize,
    pub total: usize,
    pub step: GuideStepView,
    pub completed: Vec<usize>,
    pub progress: u8,
    pub state: SessionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<CompletionReport>,
}

impl From<&GuideSession> for GuideStatus {
    fn from(session: &GuideSession) -> Self {
        let state = session.state();
        Self {
            kind: session.kind,
            title: session.guide().title.to_string(),
            current: session.current,
            total: session.total_steps(),
            step: GuideStepView::from(session.current_step()),
            completed: session.completed.iter().copied().collect(),
            progress: session.progress(),
            state,
            report: (state == SessionState::Finished).then(|| session.completion_report()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartGuideRequest {
    pub kind: GuideKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSessionCreated {
    pub id: String,
    pub greeting: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSessionView {
    pub id: String,
    pub history: Vec<ChatMessage>,
    #[serde(default)]
    pub guide: Option<GuideStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_scale_clamped() {
        let prefs = Preferences {
            theme: Theme::Dark,
            font_scale: 3.0,
        };
        assert_eq!(prefs.effective_font_scale(), MAX_FONT_SCALE);
        let prefs = Preferences {
            theme: Theme::Dark,
            font_scale: f32::NAN,
        };
        assert_eq!(prefs.effective_font_scale(), 1.0);
    }

    #[test]
    fn test_guide_status_reports_on_finish() {
        let mut session = GuideSession::start(GuideKind::Startup);
        for _ in 0..session.total_steps() {
            session.complete_current();
        }
        let status = GuideStatus::from(&session);
        assert_eq!(status.state, SessionState::Finished);
        assert_eq!(status.progress, 100);
        let report = status.report.unwrap();
        assert_eq!(report.completed_steps.len(), status.total);
    }

    #[test]
    fn test_preferences_defaults() {
        let prefs: Preferences = serde_json::from_str("{}").unwrap();
        assert_eq!(prefs, Preferences::default());
    }
}
