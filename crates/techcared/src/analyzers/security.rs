//! Firewall state and pending updates.

use super::{Analyzer, Thresholds};
use crate::snapshot::{FirewallState, SystemSnapshot};
use techcare_shared::report::{Category, ComponentReport, Problem, ScoreCard, Severity};

pub struct SecurityAnalyzer;

impl Analyzer for SecurityAnalyzer {
    fn category(&self) -> Category {
        Category::Security
    }

    fn analyze(&self, snapshot: &SystemSnapshot, _t: &Thresholds) -> ComponentReport {
        let sec = &snapshot.security;
        let mut report = ComponentReport::new(Category::Security);
        let mut card = ScoreCard::new();

        report.fact(
            "firewall",
            match sec.firewall {
                FirewallState::Active => "active",
                FirewallState::Inactive => "inactive",
                FirewallState::Unknown => "unknown",
            },
        );
        if let Some(tool) = &sec.firewall_tool {
            report.fact("firewall_tool", tool.clone());
        }

        match sec.firewall {
            FirewallState::Active => {}
            FirewallState::Inactive => {
                card.deduct(25);
                report.problems.push(Problem::new(
                    Category::Security,
                    Severity::High,
                    "Firewall inactive",
                    "The firewall is installed but not filtering traffic",
                    "Enable the firewall, e.g. `sudo ufw enable`.",
                ));
            }
            FirewallState::Unknown => {
                card.deduct(2);
                report.problems.push(Problem::new(
                    Category::Security,
                    Severity::Low,
                    "Firewall state unknown",
                    "No supported firewall tool reported its state",
                    "Install and enable a firewall such as ufw or firewalld.",
                ));
            }
        }

        if let Some(pending) = sec.pending_updates {
            report.fact("pending_updates", pending);
            if pending > 0 {
                card.deduct(15);
                report.problems.push(Problem::new(
                    Category::Security,
                    Severity::Medium,
                    "Pending system updates",
                    format!("{} package update(s) are waiting to be installed", pending),
                    "Install the pending updates with your package manager.",
                ));
            }
        }

        report.score = card.score();
        report
    }
}
