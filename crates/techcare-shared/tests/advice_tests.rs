//! Golden tests for ADVISE (rule-based recommendations).
//!
//! Tests verify:
//! - Category templates fire on evidence words
//! - Duplicates and near-duplicates collapse
//! - Output is deterministic regardless of problem order

use techcare_shared::advice::{format_text, generate, NO_PROBLEMS_TEXT};
use techcare_shared::report::{Category, Problem, Severity};

fn cpu_usage(percent: f64) -> Problem {
    Problem::new(
        Category::Cpu,
        Severity::High,
        "High CPU usage",
        format!("CPU usage is {:.1}%", percent),
        "Close programs that use a lot of CPU.",
    )
}

fn disk_space(mount: &str, severity: Severity) -> Problem {
    Problem::new(
        Category::Disk,
        severity,
        format!("Low disk space on {}", mount),
        format!("Only a small amount of free space left on {}", mount),
        "Remove files you no longer need.",
    )
}

#[test]
fn test_cpu_template_and_solution() {
    let recs = generate(&[cpu_usage(92.0)]);
    let texts: Vec<&str> = recs.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "Close programs that use a lot of CPU.",
            "Reduce the number of running applications to lower CPU usage.",
        ]
    );
    assert!(recs.iter().all(|r| r.severity == Severity::High));
    assert!(recs.iter().all(|r| r.category == Category::Cpu));
}

#[test]
fn test_general_problem_is_recategorized() {
    let problem = Problem::new(
        Category::General,
        Severity::High,
        "Firewall inactive",
        "No active firewall was found",
        "",
    );
    let recs = generate(&[problem]);
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].category, Category::Security);
    assert!(recs[0].text.contains("Enable the firewall"));
}

#[test]
fn test_exact_duplicates_keep_highest_severity() {
    let recs = generate(&[
        disk_space("/", Severity::Medium),
        disk_space("/home", Severity::Critical),
    ]);
    let solution: Vec<_> = recs
        .iter()
        .filter(|r| r.text == "Remove files you no longer need.")
        .collect();
    assert_eq!(solution.len(), 1);
    assert_eq!(solution[0].severity, Severity::Critical);
}

#[test]
fn test_sorted_by_severity_then_text() {
    let recs = generate(&[disk_space("/", Severity::Low), cpu_usage(95.0)]);
    for pair in recs.windows(2) {
        assert!(
            pair[0].severity > pair[1].severity
                || (pair[0].severity == pair[1].severity && pair[0].text <= pair[1].text)
        );
    }
    assert_eq!(recs[0].severity, Severity::High);
}

#[test]
fn test_deterministic_across_input_order() {
    let problems = vec![
        cpu_usage(90.0),
        disk_space("/", Severity::Critical),
        Problem::new(
            Category::Network,
            Severity::Medium,
            "High network latency",
            "Latency to 1.1.1.1:443 is 450 ms",
            "Check your connection quality.",
        ),
    ];
    let mut reversed = problems.clone();
    reversed.reverse();
    assert_eq!(generate(&problems), generate(&reversed));
}

#[test]
fn test_empty_and_text_format() {
    let recs = generate(&[]);
    assert_eq!(format_text(&recs), format!("1. [LOW] {}", NO_PROBLEMS_TEXT));
}
