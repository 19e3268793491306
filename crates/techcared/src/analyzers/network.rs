//! Connectivity, latency and interface error counters.

use super::{Analyzer, Thresholds};
use crate::snapshot::SystemSnapshot;
use techcare_shared::report::{Category, ComponentReport, Problem, ScoreCard, Severity};

pub struct NetworkAnalyzer;

impl Analyzer for NetworkAnalyzer {
    fn category(&self) -> Category {
        Category::Network
    }

    fn analyze(&self, snapshot: &SystemSnapshot, t: &Thresholds) -> ComponentReport {
        let net = &snapshot.network;
        let mut report = ComponentReport::new(Category::Network);
        let mut card = ScoreCard::new();

        report.fact("interfaces", net.interfaces.len());

        match &net.connectivity {
            Some(probe) if !probe.connected => {
                report.fact("connected", false);
                card.deduct(50);
                report.problems.push(Problem::new(
                    Category::Network,
                    Severity::High,
                    "No connectivity",
                    format!("The system is disconnected, {} is unreachable", probe.target),
                    "Check the network cable or Wi-Fi connection and restart the router.",
                ));
            }
            Some(probe) => {
                report.fact("connected", true);
                match probe.latency_ms {
                    Some(ms) if ms <= t.latency_ms => {
                        report.fact("latency_ms", ms);
                    }
                    latency => {
                        let description = match latency {
                            Some(ms) => {
                                report.fact("latency_ms", ms);
                                format!("Connection latency is {} ms", ms)
                            }
                            None => "Connection latency could not be measured".to_string(),
                        };
                        card.deduct(25);
                        report.problems.push(Problem::new(
                            Category::Network,
                            Severity::Medium,
                            "High network latency",
                            description,
                            "Move closer to the router or use a wired connection.",
                        ));
                    }
                }
            }
            None => {
                card.deduct(2);
                report.problems.push(Problem::new(
                    Category::Network,
                    Severity::Low,
                    "High network latency",
                    "Connectivity could not be tested, latency is unknown",
                    "Make sure the network service is running.",
                ));
            }
        }

        for iface in &net.interfaces {
            let errors = iface.rx_errors + iface.tx_errors;
            if errors == 0 {
                continue;
            }
            card.deduct(2);
            report.problems.push(Problem::new(
                Category::Network,
                Severity::Low,
                format!("Network interface errors on {}", iface.name),
                format!("{} reported {} errors", iface.name, errors),
                format!("Check the cable or driver for {}.", iface.name),
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
    use crate::snapshot::Connectivity;

    #[test]
    fn test_disconnected() {
        let mut snap = fixtures::healthy();
        snap.network.connectivity = Some(Connectivity {
            target: "1.1.1.1:443".into(),
            connected: false,
            latency_ms: None,
        });
        let report = NetworkAnalyzer.analyze(&snap, &Thresholds::default());
        assert_eq!(report.problems.len(), 1);
        assert_eq!(report.problems[0].title, "No connectivity");
        assert!(report.problems[0].description.contains("disconnected"));
        assert_eq!(report.score, 50);
    }

    #[test]
    fn test_slow_link() {
        let mut snap = fixtures::healthy();
        if let Some(c) = snap.network.connectivity.as_mut() {
            c.latency_ms = Some(450);
        }
        let report = NetworkAnalyzer.analyze(&snap, &Thresholds::default());
        assert_eq!(report.problems[0].severity, Severity::Medium);
        assert_eq!(report.problems[0].description, "Connection latency is 450 ms");
        assert_eq!(report.score, 75);
    }

    #[test]
    fn test_probe_missing_and_interface_errors() {
        let mut snap = fixtures::healthy();
        snap.network.connectivity = None;
        snap.network.interfaces[0].rx_errors = 3;
        snap.network.interfaces[0].tx_errors = 1;
        let report = NetworkAnalyzer.analyze(&snap, &Thresholds::default());
        assert_eq!(report.problems.len(), 2);
        assert!(report.problems.iter().all(|p| p.severity == Severity::Low));
        assert_eq!(report.problems[1].description, "eth0 reported 4 errors");
        assert_eq!(report.score, 96);
    }
}
