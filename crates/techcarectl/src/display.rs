//! Display helpers for techcarectl output.

use owo_colors::OwoColorize;
use techcare_shared::api::{
    CleanSummary, CleanupAnalysis, GuideStatus, GuideSummary, HealthResponse, MaintenanceRun,
    PathUsage, UserView,
};
use techcare_shared::format::{format_bytes, format_duration_secs};
use techcare_shared::repair::{RepairPlan, StepStatus};
use techcare_shared::report::{DiagnosticReport, DiagnosticSummary, HealthStatus};
use techcare_shared::schedule::{Frequency, MaintenancePlan};
use techcare_shared::Severity;

/// Key column width
const KW: usize = 14;

const HR: &str = "------------------------------------------------------------";

pub fn print_kv(key: &str, value: &str) {
    println!("{:width$} {}", key.dimmed(), value, width = KW);
}

pub fn print_header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", HR.dimmed());
}

/// Colored severity tag
pub fn severity_tag(severity: Severity) -> String {
    let tag = format!("[{}]", severity);
    match severity {
        Severity::Critical => tag.bright_red().bold().to_string(),
        Severity::High => tag.bright_red().to_string(),
        Severity::Medium => tag.yellow().to_string(),
        Severity::Low => tag.dimmed().to_string(),
    }
}

pub fn status_colored(status: HealthStatus, score: u8) -> String {
    let text = format!("{}/100 {}", score, status);
    match status {
        HealthStatus::Excellent => text.bright_green().to_string(),
        HealthStatus::Good => text.green().to_string(),
        HealthStatus::Fair => text.yellow().to_string(),
        HealthStatus::Critical => text.bright_red().to_string(),
    }
}

pub fn print_health(health: &HealthResponse) {
    print_header("techcared");
    print_kv("status", &health.status.bright_green().to_string());
    print_kv(
        "version",
        &format!(
            "{} ({} built {})",
            health.version.version, health.version.git_sha, health.version.build_date
        ),
    );
    if !health.version.target.is_empty() {
        print_kv(
            "build",
            &format!("{} {}", health.version.target, health.version.profile),
        );
    }
    print_kv("uptime", &format_duration_secs(health.uptime_secs));
    let analyzers: Vec<&str> = health.analyzers.iter().map(|c| c.as_str()).collect();
    print_kv("analyzers", &analyzers.join(", "));
}

pub fn print_report(report: &DiagnosticReport) {
    print_header(&format!("Diagnostic {}", report.id));
    print_kv("host", &report.system.hostname);
    print_kv(
        "os",
        &format!("{} {}", report.system.os_name, report.system.os_version),
    );
    print_kv("when", &report.created_at.to_rfc3339());
    print_kv("took", &format!("{} ms", report.duration_ms));
    print_kv("health", &status_colored(report.status, report.health_score));

    print_header("Components");
    for component in report.components.values() {
        let score = match &component.error {
            Some(err) => format!("failed: {}", err).bright_red().to_string(),
            None => format!("{}/100", component.score),
        };
        print_kv(component.category.display_name(), &score);
    }

    print_header("Problems");
    if report.problems.is_empty() {
        println!("  {}", "No problems found".bright_green());
    }
    for problem in &report.problems {
        println!("  {} {}", severity_tag(problem.severity), problem.title.bold());
        println!("      {}", problem.description);
        if !problem.solution.is_empty() {
            println!("      {} {}", "fix:".dimmed(), problem.solution);
        }
    }

    print_header("Recommendations");
    for (i, rec) in report.recommendations.iter().enumerate() {
        println!("  {}. {} {}", i + 1, severity_tag(rec.severity), rec.text);
    }
    println!();
}

pub fn print_history(items: &[DiagnosticSummary]) {
    if items.is_empty() {
        println!("No diagnostics yet. Run: techcarectl diagnose");
        return;
    }
    println!(
        "{:36}  {:20}  {:16}  {}",
        "ID".bold(),
        "WHEN".bold(),
        "HEALTH".bold(),
        "C/H/M/L".bold()
    );
    for s in items {
        println!(
            "{:36}  {:20}  {:16}  {}/{}/{}/{}",
            s.id,
            s.created_at.format("%Y-%m-%d %H:%M:%S"),
            status_colored(s.status, s.health_score),
            s.critical,
            s.high,
            s.medium,
            s.low
        );
    }
}

fn print_usage(label: &str, usage: &PathUsage) {
    println!(
        "  {:14} {:>12}  {:>7} files  {}",
        label,
        usage.formatted,
        usage.files,
        usage.path.dimmed()
    );
}

pub fn print_analysis(analysis: &CleanupAnalysis) {
    print_header("Reclaimable space");
    for usage in &analysis.temp {
        print_usage("temp", usage);
    }
    for usage in &analysis.browser_caches {
        print_usage("browser cache", usage);
    }
    for usage in &analysis.logs {
        print_usage("logs", usage);
    }
    if let Some(usage) = &analysis.downloads {
        print_usage("downloads", usage);
    }
    if let Some(usage) = &analysis.recycle_bin {
        print_usage("recycle bin", usage);
    }
    print_kv("total", &analysis.total_reclaimable.bold().to_string());

    if !analysis.large_files.is_empty() {
        print_header("Large files");
        for file in &analysis.large_files {
            println!("  {:>12}  {}", file.formatted, file.path);
        }
    }

    print_header("Disks");
    for disk in &analysis.disk_space {
        let used = format!("{:.1}% used", disk.used_percent);
        let used = if disk.used_percent >= 90.0 {
            used.bright_red().to_string()
        } else {
            used
        };
        print_kv(&disk.mount, &used);
    }
    println!();
}

pub fn print_clean_summary(summary: &CleanSummary) {
    let verb = if summary.dry_run { "Would remove" } else { "Removed" };
    println!(
        "{} {} files, {} freed",
        verb,
        summary.removed_files,
        summary.freed.bold()
    );
    if summary.failed > 0 {
        println!("{}", format!("{} files could not be removed", summary.failed).yellow());
    }
}

pub fn print_repair_plan(plan: &RepairPlan) {
    let progress = plan.progress();
    print_header(&format!(
        "Repair plan {} ({}/{} done, {}%)",
        plan.id, progress.completed, progress.total, progress.percent
    ));
    for step in &plan.steps {
        let mark = match step.status {
            StepStatus::Completed => "[x]".bright_green().to_string(),
            StepStatus::Skipped => "[-]".dimmed().to_string(),
            StepStatus::Pending => "[ ]".to_string(),
        };
        println!("  {} {:12} {}", mark, step.id.dimmed(), step.title);
    }
    println!();
}

pub fn print_repair_plans(plans: &[RepairPlan]) {
    if plans.is_empty() {
        println!("No repair plans. Run: techcarectl repair plan");
        return;
    }
    for plan in plans {
        let progress = plan.progress();
        println!(
            "{}  {}  {}/{} steps  {}",
            plan.id,
            plan.created_at.format("%Y-%m-%d %H:%M"),
            progress.completed,
            progress.total,
            plan.diagnostic_id.as_deref().unwrap_or("-").dimmed()
        );
    }
}

fn describe_frequency(frequency: &Frequency) -> String {
    match frequency {
        Frequency::Daily => "daily".to_string(),
        Frequency::Weekly { weekday } => format!("weekly on {}", weekday),
        Frequency::Monthly { day } => format!("monthly on day {}", day),
    }
}

pub fn print_maintenance_plans(plans: &[MaintenancePlan]) {
    if plans.is_empty() {
        println!("No maintenance plans.");
        return;
    }
    for plan in plans {
        let kinds: Vec<&str> = plan.cleaning.iter().map(|k| k.as_str()).collect();
        let next = plan
            .next_run
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "disabled".to_string());
        println!("{}  {}", plan.id.dimmed(), plan.name.bold());
        println!(
            "    {} at {}, cleans {}; next {}",
            describe_frequency(&plan.frequency),
            plan.time.format("%H:%M"),
            kinds.join(", "),
            next
        );
    }
}

pub fn print_maintenance_runs(runs: &[MaintenanceRun]) {
    if runs.is_empty() {
        println!("No scheduled runs yet.");
        return;
    }
    for run in runs {
        let outcome = match &run.error {
            Some(e) => format!("{} {}", "failed:".red(), e),
            None => format!(
                "{} files, {} freed, {} failed",
                run.removed_files,
                format_bytes(run.freed_bytes),
                run.failed
            ),
        };
        println!(
            "{}  {}  {}",
            run.at.format("%Y-%m-%d %H:%M UTC").dimmed(),
            run.plan_name.bold(),
            outcome
        );
    }
}

pub fn print_guides(guides: &[GuideSummary]) {
    for guide in guides {
        println!(
            "{:12} {} ({} steps)",
            guide.kind.as_str().bold(),
            guide.title,
            guide.steps.len()
        );
        println!("             {}", guide.description.dimmed());
    }
}

pub fn print_guide_status(status: &GuideStatus) {
    println!(
        "{} {}/{} ({}%)",
        status.title.bold(),
        status.current + 1,
        status.total,
        status.progress
    );
    println!("  {}", status.step.title.bold());
    println!("  {}", status.step.description);
    for (i, line) in status.step.instructions.iter().enumerate() {
        println!("    {}. {}", i + 1, line);
    }
    if let Some(report) = &status.report {
        println!(
            "{}",
            format!(
                "Guide finished: {}/{} steps in {}",
                report.completed_steps.len(),
                report.total_steps,
                format_duration_secs(report.duration_secs.max(0) as u64)
            )
            .bright_green()
        );
    }
}

pub fn print_users(users: &[UserView]) {
    for user in users {
        let active = if user.active {
            "active".green().to_string()
        } else {
            "disabled".bright_red().to_string()
        };
        println!(
            "{:36}  {:16} {:14} {:8}  {}",
            user.id,
            user.username,
            user.role.as_str(),
            active,
            user.email.dimmed()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_frequency() {
        assert_eq!(describe_frequency(&Frequency::Daily), "daily");
        assert_eq!(
            describe_frequency(&Frequency::Monthly { day: 15 }),
            "monthly on day 15"
        );
        assert_eq!(
            describe_frequency(&Frequency::Weekly {
                weekday: chrono::Weekday::Mon
            }),
            "weekly on Mon"
        );
    }

    #[test]
    fn test_severity_tag_contains_label() {
        assert!(severity_tag(Severity::High).contains("HIGH"));
    }
}
