//! Diagnostic report model.
//!
//! Severity-ranked problems, per-component scores and the overall health
//! score. Scoring is threshold-driven and deterministic.

use crate::advice::Recommendation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Problem severity (stable ordering, Critical is highest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low = 0,
    Medium = 1,
    High = 2,
    Critical = 3,
}

impl Severity {
    /// Points subtracted from the overall health score per problem
    pub fn weight(&self) -> u8 {
        match self {
            Severity::Critical => 15,
            Severity::High => 10,
            Severity::Medium => 5,
            Severity::Low => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Diagnostic area a problem belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Cpu,
    Memory,
    Disk,
    Network,
    Startup,
    Security,
    Driver,
    General,
}

impl Category {
    /// All analyzer-backed categories, in execution order
    pub const ANALYZED: [Category; 7] = [
        Category::Cpu,
        Category::Memory,
        Category::Disk,
        Category::Network,
        Category::Startup,
        Category::Security,
        Category::Driver,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Cpu => "cpu",
            Category::Memory => "memory",
            Category::Disk => "disk",
            Category::Network => "network",
            Category::Startup => "startup",
            Category::Security => "security",
            Category::Driver => "driver",
            Category::General => "general",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Some(Category::Cpu),
            "memory" | "ram" => Some(Category::Memory),
            "disk" | "storage" => Some(Category::Disk),
            "network" => Some(Category::Network),
            "startup" => Some(Category::Startup),
            "security" => Some(Category::Security),
            "driver" | "drivers" => Some(Category::Driver),
            "general" => Some(Category::General),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Cpu => "Processor",
            Category::Memory => "Memory",
            Category::Disk => "Storage",
            Category::Network => "Network",
            Category::Startup => "Startup",
            Category::Security => "Security",
            Category::Driver => "Drivers",
            Category::General => "General",
        }
    }

    /// Infer a category from free text by keyword.
    pub fn infer(text: &str) -> Category {
        let text = text.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| text.contains(w));

        if has(&["cpu", "processor", "core"]) {
            Category::Cpu
        } else if has(&["memory", "ram", "swap"]) {
            Category::Memory
        } else if has(&["disk", "hdd", "ssd", "storage", "space"]) {
            Category::Disk
        } else if has(&["network", "wifi", "internet", "connection", "ethernet", "latency"]) {
            Category::Network
        } else if has(&["startup", "boot"]) {
            Category::Startup
        } else if has(&["security", "antivirus", "firewall", "virus", "update"]) {
            Category::Security
        } else if has(&["driver", "device", "module"]) {
            Category::Driver
        } else {
            Category::General
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single detected problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub category: Category,
    pub severity: Severity,
    /// Short title (e.g., "High CPU usage")
    pub title: String,
    /// Evidence-backed description (e.g., "CPU usage is 92.4%")
    pub description: String,
    /// Suggested fix
    pub solution: String,
}

impl Problem {
    pub fn new(
        category: Category,
        severity: Severity,
        title: impl Into<String>,
        description: impl Into<String>,
        solution: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity,
            title: title.into(),
            description: description.into(),
            solution: solution.into(),
        }
    }
}

/// Sort problems: severity desc, category asc, title asc
pub fn sort_problems(problems: &mut [Problem]) {
    problems.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.category.cmp(&b.category))
            .then_with(|| a.title.cmp(&b.title))
    });
}

/// Score accumulator used by analyzers. Starts at 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreCard {
    points: i32,
}

impl Default for ScoreCard {
    fn default() -> Self {
        Self { points: 100 }
    }
}

impl ScoreCard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deduct(&mut self, points: u32) {
        self.points = self.points.saturating_sub(points.min(i32::MAX as u32) as i32);
    }

    pub fn score(&self) -> u8 {
        self.points.clamp(0, 100) as u8
    }
}

/// Overall health score from a problem list (0-100)
pub fn health_score(problems: &[Problem]) -> u8 {
    let mut card = ScoreCard::new();
    for problem in problems {
        card.deduct(problem.severity.weight() as u32);
    }
    card.score()
}

/// Overall system status derived from the health score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Critical,
    Fair,
    Good,
    Excellent,
}

impl HealthStatus {
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=u8::MAX => HealthStatus::Excellent,
            70..=89 => HealthStatus::Good,
            50..=69 => HealthStatus::Fair,
            _ => HealthStatus::Critical,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Excellent => write!(f, "Excellent"),
            Self::Good => write!(f, "Good"),
            Self::Fair => write!(f, "Fair"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

/// Result of one analyzer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentReport {
    pub category: Category,
    /// Component health score (0-100)
    pub score: u8,
    /// Key facts shown alongside the score (e.g. "usage_percent": 42.0)
    #[serde(default)]
    pub summary: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub problems: Vec<Problem>,
    /// Set when the analyzer could not evaluate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentReport {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            score: 100,
            summary: BTreeMap::new(),
            problems: Vec::new(),
            error: None,
        }
    }

    /// Report for an analyzer that had no evidence to work with
    pub fn failed(category: Category, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let problem = Problem::new(
            category,
            Severity::High,
            format!("{} analysis failed", category.display_name()),
            reason.clone(),
            "Check the daemon logs for details.",
        );
        Self {
            category,
            score: 0,
            summary: BTreeMap::new(),
            problems: vec![problem],
            error: Some(reason),
        }
    }

    pub fn fact(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.summary.insert(key.to_string(), value.into());
    }
}

/// Basic host identity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub hostname: String,
    pub os_name: String,
    pub os_version: String,
    pub kernel: String,
    pub architecture: String,
    pub cpu_model: String,
    pub cpu_cores: u32,
    pub cpu_threads: u32,
    pub memory_total_bytes: u64,
    pub boot_time: Option<DateTime<Utc>>,
    pub uptime_seconds: u64,
}

/// Complete diagnostic run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub system: SystemInfo,
    pub components: BTreeMap<Category, ComponentReport>,
    /// All problems, sorted by severity desc
    pub problems: Vec<Problem>,
    pub recommendations: Vec<Recommendation>,
    pub health_score: u8,
    pub status: HealthStatus,
}

impl DiagnosticReport {
    /// Assemble a report from component results (pure, deterministic)
    pub fn assemble(
        id: String,
        user_id: String,
        created_at: DateTime<Utc>,
        duration_ms: u64,
        system: SystemInfo,
        components: Vec<ComponentReport>,
    ) -> Self {
        let mut problems: Vec<Problem> = components
            .iter()
            .flat_map(|c| c.problems.iter().cloned())
            .collect();
        sort_problems(&mut problems);

        let health_score = health_score(&problems);
        let recommendations = crate::advice::generate(&problems);

        Self {
            id,
            user_id,
            created_at,
            duration_ms,
            system,
            components: components.into_iter().map(|c| (c.category, c)).collect(),
            problems,
            recommendations,
            health_score,
            status: HealthStatus::from_score(health_score),
        }
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.problems.iter().filter(|p| p.severity == severity).count()
    }

    pub fn summary(&self) -> DiagnosticSummary {
        DiagnosticSummary {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            created_at: self.created_at,
            health_score: self.health_score,
            status: self.status,
            critical: self.count_by_severity(Severity::Critical),
            high: self.count_by_severity(Severity::High),
            medium: self.count_by_severity(Severity::Medium),
            low: self.count_by_severity(Severity::Low),
        }
    }
}

/// History entry for a diagnostic run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticSummary {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub health_score: u8,
    pub status: HealthStatus,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem(category: Category, severity: Severity, title: &str) -> Problem {
        Problem::new(category, severity, title, title, "fix it")
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_health_score_weights() {
        assert_eq!(health_score(&[]), 100);
        let problems = vec![
            problem(Category::Cpu, Severity::Critical, "a"),
            problem(Category::Memory, Severity::High, "b"),
            problem(Category::Disk, Severity::Medium, "c"),
            problem(Category::Network, Severity::Low, "d"),
        ];
        assert_eq!(health_score(&problems), 100 - 15 - 10 - 5 - 2);
    }

    #[test]
    fn test_health_score_clamps_at_zero() {
        let problems: Vec<Problem> = (0..10)
            .map(|i| problem(Category::Disk, Severity::Critical, &format!("p{}", i)))
            .collect();
        assert_eq!(health_score(&problems), 0);
    }

    #[test]
    fn test_status_bands() {
        assert_eq!(HealthStatus::from_score(100), HealthStatus::Excellent);
        assert_eq!(HealthStatus::from_score(90), HealthStatus::Excellent);
        assert_eq!(HealthStatus::from_score(89), HealthStatus::Good);
        assert_eq!(HealthStatus::from_score(70), HealthStatus::Good);
        assert_eq!(HealthStatus::from_score(50), HealthStatus::Fair);
        assert_eq!(HealthStatus::from_score(49), HealthStatus::Critical);
    }

    #[test]
    fn test_category_inference() {
        assert_eq!(Category::infer("High CPU usage (92%)"), Category::Cpu);
        assert_eq!(Category::infer("Swap usage is high"), Category::Memory);
        assert_eq!(Category::infer("Low free space on /home"), Category::Disk);
        assert_eq!(Category::infer("Internet connection lost"), Category::Network);
        assert_eq!(Category::infer("Firewall inactive"), Category::Security);
        assert_eq!(Category::infer("Device without driver"), Category::Driver);
        assert_eq!(Category::infer("Something odd"), Category::General);
    }

    #[test]
    fn test_problem_sort_is_stable() {
        let mut problems = vec![
            problem(Category::Network, Severity::Low, "z"),
            problem(Category::Disk, Severity::Critical, "b"),
            problem(Category::Cpu, Severity::Critical, "a"),
            problem(Category::Cpu, Severity::Medium, "c"),
        ];
        sort_problems(&mut problems);
        let titles: Vec<&str> = problems.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c", "z"]);
    }

    #[test]
    fn test_failed_component() {
        let report = ComponentReport::failed(Category::Disk, "no disks listed");
        assert_eq!(report.score, 0);
        assert_eq!(report.problems.len(), 1);
        assert_eq!(report.problems[0].severity, Severity::High);
        assert!(report.error.is_some());
    }

    #[test]
    fn test_scorecard_saturates() {
        let mut card = ScoreCard::new();
        card.deduct(30);
        assert_eq!(card.score(), 70);
        card.deduct(500);
        assert_eq!(card.score(), 0);
        card.deduct(u32::MAX);
        card.deduct(u32::MAX);
        card.deduct(u32::MAX);
        assert_eq!(card.score(), 0);
    }
}
