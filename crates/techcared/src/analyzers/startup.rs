//! Programs started with the user session.

use super::{Analyzer, Thresholds};
use crate::snapshot::SystemSnapshot;
use techcare_shared::report::{Category, ComponentReport, Problem, ScoreCard, Severity};

pub struct StartupAnalyzer;

impl Analyzer for StartupAnalyzer {
    fn category(&self) -> Category {
        Category::Startup
    }

    fn analyze(&self, snapshot: &SystemSnapshot, t: &Thresholds) -> ComponentReport {
        let startup = &snapshot.startup;
        let mut report = ComponentReport::new(Category::Startup);
        let mut card = ScoreCard::new();

        let count = startup.item_count();
        report.fact("startup_items", count);
        report.fact("user_services", startup.user_services.len());
        report.fact("autostart_entries", startup.autostart.len());
        if let Some(services) = &startup.system_services {
            report.fact("system_services", services.len());
        }

        let severity = if count > t.startup_high_items {
            card.deduct(15);
            Some(Severity::High)
        } else if count > t.startup_medium_items {
            card.deduct(8);
            Some(Severity::Medium)
        } else {
            None
        };

        if let Some(severity) = severity {
            report.problems.push(Problem::new(
                Category::Startup,
                severity,
                "Too many startup programs",
                format!("{} programs start with your session", count),
                "Disable autostart entries and user services you do not need.",
            ));
        }

        report.score = card.score();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::fixtures;

    fn with_items(n: usize) -> SystemSnapshot {
        let mut snap = fixtures::healthy();
        snap.startup.autostart = (0..n).map(|i| format!("app{}", i)).collect();
        snap.startup.user_services.clear();
        snap
    }

    #[test]
    fn test_thresholds() {
        let t = Thresholds::default();
        assert!(StartupAnalyzer.analyze(&with_items(8), &t).problems.is_empty());

        let report = StartupAnalyzer.analyze(&with_items(9), &t);
        assert_eq!(report.problems[0].severity, Severity::Medium);
        assert_eq!(report.score, 92);

        let report = StartupAnalyzer.analyze(&with_items(16), &t);
        assert_eq!(report.problems[0].severity, Severity::High);
        assert_eq!(report.score, 85);
    }

    #[test]
    fn test_system_services_not_counted() {
        let mut snap = with_items(2);
        snap.startup.system_services = Some((0..40).map(|i| format!("s{}.service", i)).collect());
        let report = StartupAnalyzer.analyze(&snap, &Thresholds::default());
        assert!(report.problems.is_empty());
        assert_eq!(report.summary["system_services"], 40);
    }
}
