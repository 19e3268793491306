//! RAM, swap and per-process memory pressure.

use super::{round1, Analyzer, Thresholds};
use crate::snapshot::SystemSnapshot;
use techcare_shared::format::format_bytes;
use techcare_shared::report::{Category, ComponentReport, Problem, ScoreCard, Severity};

const MB: u64 = 1024 * 1024;

/// At most this many process problems are reported
const MAX_PROCESS_PROBLEMS: usize = 3;

pub struct MemoryAnalyzer;

impl Analyzer for MemoryAnalyzer {
    fn category(&self) -> Category {
        Category::Memory
    }

    fn analyze(&self, snapshot: &SystemSnapshot, t: &Thresholds) -> ComponentReport {
        let mem = &snapshot.memory;
        if mem.total_bytes == 0 {
            return ComponentReport::failed(Category::Memory, "No memory information was collected");
        }

        let mut report = ComponentReport::new(Category::Memory);
        let mut card = ScoreCard::new();

        let usage = mem.used_bytes as f64 / mem.total_bytes as f64 * 100.0;
        report.fact("total", format_bytes(mem.total_bytes));
        report.fact("available", format_bytes(mem.available_bytes));
        report.fact("usage_percent", round1(usage));

        let usage_problem = |severity, solution: &str| {
            Problem::new(
                Category::Memory,
                severity,
                "High memory usage",
                format!("Memory usage is {:.1}%", usage),
                solution,
            )
        };
        if usage > t.memory_critical_percent {
            card.deduct(40);
            report.problems.push(usage_problem(
                Severity::Critical,
                "Close programs you are not using or restart the computer.",
            ));
        } else if usage > t.memory_high_percent {
            card.deduct(20);
            report.problems.push(usage_problem(
                Severity::High,
                "Close programs you are not using.",
            ));
        } else if usage > t.memory_medium_percent {
            card.deduct(10);
            report.problems.push(usage_problem(
                Severity::Medium,
                "Keep an eye on programs with growing memory use.",
            ));
        }

        if mem.swap_total_bytes > 0 {
            let swap = mem.swap_used_bytes as f64 / mem.swap_total_bytes as f64 * 100.0;
            report.fact("swap_percent", round1(swap));
            if swap > t.swap_high_percent {
                card.deduct(15);
                report.problems.push(Problem::new(
                    Category::Memory,
                    Severity::High,
                    "High swap usage",
                    format!("Swap usage is {:.1}%", swap),
                    "The system is short of RAM; close programs or consider more memory capacity.",
                ));
            }
        }

        let available_mb = mem.available_bytes / MB;
        if available_mb < t.available_critical_mb {
            card.deduct(30);
            report.problems.push(Problem::new(
                Category::Memory,
                Severity::Critical,
                "Low available memory",
                format!("Only {} MB of memory is available", available_mb),
                "Close programs immediately to avoid the system freezing.",
            ));
        } else if available_mb < t.available_high_mb {
            card.deduct(15);
            report.problems.push(Problem::new(
                Category::Memory,
                Severity::High,
                "Low available memory",
                format!("Only {} MB of memory is available", available_mb),
                "Close programs you are not using.",
            ));
        }

        for process in mem
            .top_processes
            .iter()
            .filter(|p| p.percent > t.process_share_percent)
            .take(MAX_PROCESS_PROBLEMS)
        {
            card.deduct(10);
            report.problems.push(Problem::new(
                Category::Memory,
                Severity::High,
                format!("Memory-hungry process: {}", process.name),
                format!(
                    "{} (pid {}) uses {:.1}% of RAM ({})",
                    process.name,
                    process.pid,
                    process.percent,
                    format_bytes(process.bytes)
                ),
                format!("Restart or close {} if it keeps growing.", process.name),
            ));
        }

        report.score = card.score();
        report
    }
}
