//! Free space per mounted filesystem.

use super::{round1, Analyzer, Thresholds};
use crate::snapshot::SystemSnapshot;
use techcare_shared::format::format_bytes;
use techcare_shared::report::{Category, ComponentReport, Problem, ScoreCard, Severity};

pub struct DiskAnalyzer;

impl Analyzer for DiskAnalyzer {
    fn category(&self) -> Category {
        Category::Disk
    }

    fn analyze(&self, snapshot: &SystemSnapshot, t: &Thresholds) -> ComponentReport {
        if snapshot.disks.is_empty() {
            return ComponentReport::failed(Category::Disk, "No disks were reported by the system");
        }

        let mut report = ComponentReport::new(Category::Disk);
        let mut card = ScoreCard::new();

        let mut total = 0u64;
        let mut available = 0u64;
        for disk in snapshot.disks.iter().filter(|d| !d.removable) {
            total += disk.total_bytes;
            available += disk.available_bytes;

            let used = disk.used_percent();
            let (severity, points) = if used > t.disk_critical_percent {
                (Severity::Critical, 30)
            } else if used > t.disk_high_percent {
                (Severity::High, 15)
            } else if used > t.disk_medium_percent {
                (Severity::Medium, 5)
            } else {
                continue;
            };

            card.deduct(points);
            report.problems.push(Problem::new(
                Category::Disk,
                severity,
                format!("Low disk space on {}", disk.mount),
                format!(
                    "{} is {:.1}% full, {} of free space left",
                    disk.mount,
                    used,
                    format_bytes(disk.available_bytes)
                ),
                "Free disk space by removing files you no longer need or run the cleaner.",
            ));
        }

        report.fact("disks", snapshot.disks.len());
        report.fact("total", format_bytes(total));
        report.fact("available", format_bytes(available));
        if total > 0 {
            let used = total.saturating_sub(available) as f64 / total as f64 * 100.0;
            report.fact("used_percent", round1(used));
        }

        report.score = card.score();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::fixtures::{self, GB};
    use crate::snapshot::DiskSnapshot;

    fn disk(mount: &str, total: u64, available: u64, removable: bool) -> DiskSnapshot {
        DiskSnapshot {
            mount: mount.into(),
            fs_type: "ext4".into(),
            total_bytes: total,
            available_bytes: available,
            removable,
            ..Default::default()
        }
    }

    #[test]
    fn test_severity_per_mount() {
        let mut snap = fixtures::healthy();
        snap.disks = vec![
            disk("/", 100 * GB, 3 * GB, false),
            disk("/home", 100 * GB, 8 * GB, false),
            disk("/data", 100 * GB, 15 * GB, false),
        ];
        let report = DiskAnalyzer.analyze(&snap, &Thresholds::default());
        let severities: Vec<Severity> = report.problems.iter().map(|p| p.severity).collect();
        assert_eq!(
            severities,
            vec![Severity::Critical, Severity::High, Severity::Medium]
        );
        assert_eq!(report.problems[0].title, "Low disk space on /");
        assert!(report.problems[0].description.contains("free space"));
        assert_eq!(report.score, 100 - 30 - 15 - 5);
    }

    #[test]
    fn test_removable_ignored() {
        let mut snap = fixtures::healthy();
        snap.disks.push(disk("/media/usb", 16 * GB, 0, true));
        let report = DiskAnalyzer.analyze(&snap, &Thresholds::default());
        assert!(report.problems.is_empty());
        assert_eq!(report.summary["disks"], 2);
    }

    #[test]
    fn test_no_disks_fails() {
        let mut snap = fixtures::healthy();
        snap.disks.clear();
        let report = DiskAnalyzer.analyze(&snap, &Thresholds::default());
        assert_eq!(report.score, 0);
        assert_eq!(report.problems[0].severity, Severity::High);
    }
}
