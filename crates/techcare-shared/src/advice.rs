//! Rule-based recommendations (ADVISE).
//!
//! Turns detected problems into short, deduplicated actions. Category
//! templates are keyed on evidence words in the problem text; each problem's
//! own solution is always considered too.

use crate::report::{Category, Problem, Severity};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Returned when a diagnostic found nothing to act on
pub const NO_PROBLEMS_TEXT: &str = "No significant problems were found on this system.";

/// Word-set similarity above which two recommendations are merged
const SIMILARITY_THRESHOLD: f64 = 0.5;

/// A single actionable recommendation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub text: String,
    pub severity: Severity,
    pub category: Category,
}

impl Recommendation {
    fn new(text: &str, severity: Severity, category: Category) -> Self {
        Self {
            text: text.to_string(),
            severity,
            category,
        }
    }
}

/// Template triggered when any problem in the category mentions one of the words
struct Template {
    triggers: &'static [&'static str],
    text: &'static str,
}

const CPU_TEMPLATES: &[Template] = &[
    Template {
        triggers: &["usage", "overloaded", "load"],
        text: "Reduce the number of running applications to lower CPU usage.",
    },
    Template {
        triggers: &["temperature", "overheat"],
        text: "Check the computer's cooling system and clean accumulated dust.",
    },
];

const MEMORY_TEMPLATES: &[Template] = &[
    Template {
        triggers: &["usage", "available"],
        text: "Close unused applications to free RAM.",
    },
    Template {
        triggers: &["leak", "increasing"],
        text: "Identify and restart applications that are leaking memory.",
    },
    Template {
        triggers: &["capacity"],
        text: "Consider upgrading the system RAM for better performance.",
    },
];

const DISK_TEMPLATES: &[Template] = &[
    Template {
        triggers: &["space"],
        text: "Free disk space by deleting unnecessary files or running the cleaner.",
    },
    Template {
        triggers: &["health", "failure"],
        text: "Back up your important data, the disk may be showing signs of failure.",
    },
    Template {
        triggers: &["fragment"],
        text: "Defragment the disk to improve performance.",
    },
];

const NETWORK_TEMPLATES: &[Template] = &[
    Template {
        triggers: &["disconnected", "no connectivity"],
        text: "Check your internet connection, network cable or Wi-Fi signal.",
    },
    Template {
        triggers: &["latency", "slow"],
        text: "Check link quality or move closer to the router.",
    },
    Template {
        triggers: &["errors"],
        text: "Restart the network adapter or check the physical connection for problems.",
    },
];

const STARTUP_TEMPLATES: &[Template] = &[Template {
    triggers: &[""],
    text: "Reduce the number of programs that start with the system to improve boot time.",
}];

const SECURITY_TEMPLATES: &[Template] = &[
    Template {
        triggers: &["firewall"],
        text: "Enable the firewall to protect the system against external threats.",
    },
    Template {
        triggers: &["update"],
        text: "Keep the system updated to protect against security vulnerabilities.",
    },
];

const DRIVER_TEMPLATES: &[Template] = &[
    Template {
        triggers: &["missing", "without driver"],
        text: "Install the missing drivers so every device works correctly.",
    },
    Template {
        triggers: &["outdated", "failed", "problem"],
        text: "Update outdated drivers to improve stability and performance.",
    },
];

fn templates_for(category: Category) -> &'static [Template] {
    match category {
        Category::Cpu => CPU_TEMPLATES,
        Category::Memory => MEMORY_TEMPLATES,
        Category::Disk => DISK_TEMPLATES,
        Category::Network => NETWORK_TEMPLATES,
        Category::Startup => STARTUP_TEMPLATES,
        Category::Security => SECURITY_TEMPLATES,
        Category::Driver => DRIVER_TEMPLATES,
        Category::General => &[],
    }
}

/// Category used for grouping: explicit, or inferred from the description
fn effective_category(problem: &Problem) -> Category {
    match problem.category {
        Category::General => Category::infer(&problem.description),
        other => other,
    }
}

/// Generate recommendations for a set of problems
pub fn generate(problems: &[Problem]) -> Vec<Recommendation> {
    if problems.is_empty() {
        return vec![Recommendation::new(
            NO_PROBLEMS_TEXT,
            Severity::Low,
            Category::General,
        )];
    }

    let mut groups: BTreeMap<Category, Vec<&Problem>> = BTreeMap::new();
    for problem in problems {
        groups.entry(effective_category(problem)).or_default().push(problem);
    }

    let mut candidates = Vec::new();
    for (category, group) in &groups {
        for template in templates_for(*category) {
            let severity = group
                .iter()
                .filter(|p| matches_any(p, template.triggers))
                .map(|p| p.severity)
                .max();
            if let Some(severity) = severity {
                candidates.push(Recommendation::new(template.text, severity, *category));
            }
        }

        for problem in group {
            if !problem.solution.trim().is_empty() {
                candidates.push(Recommendation::new(
                    problem.solution.trim(),
                    problem.severity,
                    *category,
                ));
            }
        }
    }

    if candidates.is_empty() {
        candidates = problems
            .iter()
            .map(|p| {
                Recommendation::new(
                    &format!("Fix the problem: {}", p.description),
                    p.severity,
                    effective_category(p),
                )
            })
            .collect();
    }

    let mut recommendations = merge_similar(dedupe_exact(candidates));
    recommendations.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.text.cmp(&b.text)));
    recommendations
}

fn matches_any(problem: &Problem, triggers: &[&str]) -> bool {
    let haystack = format!("{} {}", problem.title, problem.description).to_lowercase();
    triggers.iter().any(|t| haystack.contains(t))
}

/// Collapse identical texts, keeping the highest severity
fn dedupe_exact(candidates: Vec<Recommendation>) -> Vec<Recommendation> {
    let mut by_text: BTreeMap<String, Recommendation> = BTreeMap::new();
    for rec in candidates {
        by_text
            .entry(rec.text.clone())
            .and_modify(|existing| {
                existing.severity = existing.severity.max(rec.severity);
                existing.category = existing.category.min(rec.category);
            })
            .or_insert(rec);
    }
    by_text.into_values().collect()
}

/// Merge near-duplicates, keeping the longer text and the higher severity.
/// Input order is text-sorted so the result does not depend on problem order.
fn merge_similar(mut items: Vec<Recommendation>) -> Vec<Recommendation> {
    let mut i = 0;
    while i < items.len() {
        let mut j = i + 1;
        while j < items.len() {
            if similarity(&items[i].text, &items[j].text) > SIMILARITY_THRESHOLD {
                let other = items.remove(j);
                let keep = &mut items[i];
                if other.text.len() > keep.text.len() {
                    keep.text = other.text;
                    keep.category = other.category;
                }
                keep.severity = keep.severity.max(other.severity);
            } else {
                j += 1;
            }
        }
        i += 1;
    }
    items
}

fn word_set(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity of the two texts' word sets
pub fn similarity(a: &str, b: &str) -> f64 {
    let wa = word_set(a);
    let wb = word_set(b);
    let union = wa.union(&wb).count();
    if union == 0 {
        return 0.0;
    }
    wa.intersection(&wb).count() as f64 / union as f64
}

/// Plain text list, one numbered recommendation per line
pub fn format_text(recommendations: &[Recommendation]) -> String {
    recommendations
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. [{}] {}", i + 1, r.severity, r.text))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_markdown(recommendations: &[Recommendation]) -> String {
    let mut out = String::from("## Recommendations\n\n");
    if recommendations.is_empty() {
        out.push_str("_None._\n");
        return out;
    }
    for r in recommendations {
        out.push_str(&format!(
            "- **{}** ({}): {}\n",
            r.severity,
            r.category.display_name(),
            r.text
        ));
    }
    out
}
