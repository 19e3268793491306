//! CPU usage, per-core saturation, temperature and load.

use super::{round1, Analyzer, Thresholds};
use crate::snapshot::SystemSnapshot;
use techcare_shared::report::{Category, ComponentReport, Problem, ScoreCard, Severity};

pub struct CpuAnalyzer;

impl Analyzer for CpuAnalyzer {
    fn category(&self) -> Category {
        Category::Cpu
    }

    fn analyze(&self, snapshot: &SystemSnapshot, t: &Thresholds) -> ComponentReport {
        let cpu = &snapshot.cpu;
        if cpu.logical_threads == 0 {
            return ComponentReport::failed(Category::Cpu, "No CPU information was collected");
        }

        let mut report = ComponentReport::new(Category::Cpu);
        let mut card = ScoreCard::new();

        report.fact("brand", cpu.brand.clone());
        report.fact("threads", cpu.logical_threads);
        if let Some(cores) = cpu.physical_cores {
            report.fact("cores", cores);
        }
        report.fact("usage_percent", round1(cpu.usage_percent as f64));
        report.fact("frequency_mhz", cpu.frequency_mhz);
        report.fact("load_1m", cpu.load_average[0]);

        let usage = cpu.usage_percent;
        if usage > t.cpu_high_percent {
            card.deduct(20);
            report.problems.push(Problem::new(
                Category::Cpu,
                Severity::High,
                "High CPU usage",
                format!("CPU usage is {:.1}%", usage),
                "Close programs that use a lot of CPU or check for runaway processes.",
            ));
        } else if usage > t.cpu_medium_percent {
            card.deduct(10);
            report.problems.push(Problem::new(
                Category::Cpu,
                Severity::Medium,
                "High CPU usage",
                format!("CPU usage is {:.1}%", usage),
                "Monitor the programs using the CPU and close the ones you do not need.",
            ));
        }

        let overloaded = cpu
            .per_core
            .iter()
            .filter(|u| **u > t.core_overload_percent)
            .count();
        if overloaded > 0 {
            card.deduct(5);
            report.problems.push(Problem::new(
                Category::Cpu,
                Severity::Medium,
                "Overloaded CPU cores",
                format!(
                    "{} of {} cores are above {:.0}% usage",
                    overloaded,
                    cpu.per_core.len(),
                    t.core_overload_percent
                ),
                "A single-threaded task may be stuck; check the busiest process.",
            ));
        }

        if let Some(temp) = cpu.temperature_c {
            report.fact("temperature_c", round1(temp as f64));
            if temp >= t.cpu_temp_critical_c {
                card.deduct(25);
                report.problems.push(Problem::new(
                    Category::Cpu,
                    Severity::Critical,
                    "High CPU temperature",
                    format!("CPU temperature is {:.1} °C", temp),
                    "Check the fans and clean dust from the cooling system.",
                ));
            } else if temp >= t.cpu_temp_high_c {
                card.deduct(10);
                report.problems.push(Problem::new(
                    Category::Cpu,
                    Severity::High,
                    "High CPU temperature",
                    format!("CPU temperature is {:.1} °C", temp),
                    "Make sure the air vents are not blocked.",
                ));
            }
        }

        let per_core = cpu.load_average[0] / cpu.logical_threads as f64;
        if per_core > t.load_per_core {
            card.deduct(5);
            report.problems.push(Problem::new(
                Category::Cpu,
                Severity::Medium,
                "High system load",
                format!(
                    "Load average is {:.2} for {} threads",
                    cpu.load_average[0], cpu.logical_threads
                ),
                "Too many processes are waiting for the CPU; reduce background work.",
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

    #[test]
    fn test_high_usage() {
        let mut snap = fixtures::healthy();
        snap.cpu.usage_percent = 92.0;
        let report = CpuAnalyzer.analyze(&snap, &Thresholds::default());
        assert_eq!(report.problems.len(), 1);
        assert_eq!(report.problems[0].severity, Severity::High);
        assert_eq!(report.problems[0].description, "CPU usage is 92.0%");
        assert_eq!(report.score, 80);
    }

    #[test]
    fn test_medium_usage_boundary() {
        let mut snap = fixtures::healthy();
        snap.cpu.usage_percent = 70.0;
        assert!(CpuAnalyzer
            .analyze(&snap, &Thresholds::default())
            .problems
            .is_empty());
        snap.cpu.usage_percent = 70.5;
        let report = CpuAnalyzer.analyze(&snap, &Thresholds::default());
        assert_eq!(report.problems[0].severity, Severity::Medium);
        assert_eq!(report.score, 90);
    }

    #[test]
    fn test_temperature_and_cores() {
        let mut snap = fixtures::healthy();
        snap.cpu.temperature_c = Some(88.0);
        snap.cpu.per_core[0] = 99.0;
        let report = CpuAnalyzer.analyze(&snap, &Thresholds::default());
        let severities: Vec<Severity> = report.problems.iter().map(|p| p.severity).collect();
        assert!(severities.contains(&Severity::Critical));
        assert!(severities.contains(&Severity::Medium));
        assert_eq!(report.score, 100 - 25 - 5);
    }

    #[test]
    fn test_load_per_core() {
        let mut snap = fixtures::healthy();
        snap.cpu.load_average = [20.0, 10.0, 5.0];
        let report = CpuAnalyzer.analyze(&snap, &Thresholds::default());
        assert_eq!(report.problems[0].title, "High system load");
    }

    #[test]
    fn test_missing_cpu_fails() {
        let mut snap = fixtures::healthy();
        snap.cpu.logical_threads = 0;
        let report = CpuAnalyzer.analyze(&snap, &Thresholds::default());
        assert_eq!(report.score, 0);
        assert!(report.error.is_some());
    }
}
