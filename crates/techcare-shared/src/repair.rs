//! Repair guides and step-tracked repair plans.

use crate::error::{Result, TechcareError};
use crate::report::{Category, Problem};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Static repair guide for a known problem
#[derive(Debug, Clone, Copy)]
pub struct RepairGuide {
    pub category: Category,
    pub title: &'static str,
    /// Matched case-insensitively against problem titles
    pub pattern: &'static str,
    pub steps: &'static [&'static str],
}

const GUIDES: &[RepairGuide] = &[
    RepairGuide {
        category: Category::Cpu,
        title: "High CPU usage",
        pattern: "High CPU usage",
        steps: &[
            "Identify the processes consuming the most CPU (top or htop)",
            "Close applications you are not using",
            "Scan the system for malware",
            "Restart the computer",
        ],
    },
    RepairGuide {
        category: Category::Cpu,
        title: "High CPU temperature",
        pattern: "High CPU temperature",
        steps: &[
            "Check that all fans are spinning",
            "Clean dust from the heat sink and fan",
            "Check the thermal paste between the processor and heat sink",
            "Keep the air vents unobstructed",
        ],
    },
    RepairGuide {
        category: Category::Memory,
        title: "Low available memory",
        pattern: "Low available memory",
        steps: &[
            "Close applications you are not using",
            "Restart the computer",
            "Increase the swap size",
            "Consider installing more RAM",
        ],
    },
    RepairGuide {
        category: Category::Memory,
        title: "Memory leak",
        pattern: "Memory leak",
        steps: &[
            "Identify the application whose memory keeps growing",
            "Update the application to its latest version",
            "Restart the application periodically",
            "Report the problem to the developer if it persists",
        ],
    },
    RepairGuide {
        category: Category::Disk,
        title: "Disk almost full",
        pattern: "Low disk space",
        steps: &[
            "Run the cleaner to analyze reclaimable space",
            "Remove applications you no longer use",
            "Clear temporary files and caches",
            "Move large files to external or cloud storage",
        ],
    },
    RepairGuide {
        category: Category::Disk,
        title: "Fragmented disk",
        pattern: "Fragmentation",
        steps: &[
            "Run the filesystem's defragmentation tool",
            "Consider migrating to an SSD if the disk is an HDD",
            "Avoid filling the disk to full capacity",
            "Check the disk for errors with fsck",
        ],
    },
    RepairGuide {
        category: Category::Startup,
        title: "Too many startup programs",
        pattern: "Too many startup programs",
        steps: &[
            "List enabled services with systemctl list-unit-files --state=enabled",
            "Disable services and autostart entries you do not need",
            "Remove unused entries from ~/.config/autostart",
            "Consider delaying non-essential programs",
        ],
    },
    RepairGuide {
        category: Category::Driver,
        title: "Outdated drivers",
        pattern: "Outdated drivers",
        steps: &[
            "Identify the drivers that need updating",
            "Install the latest kernel and firmware packages",
            "Install vendor drivers following the vendor's instructions",
            "Restart the computer after installing",
        ],
    },
    RepairGuide {
        category: Category::Driver,
        title: "Drivers with problems",
        pattern: "Device without driver",
        steps: &[
            "Check which kernel module supports the device (lspci -k)",
            "Install the package that provides the module",
            "Load the module or restart the computer",
            "Verify that the problem is resolved",
        ],
    },
    RepairGuide {
        category: Category::Security,
        title: "Firewall disabled",
        pattern: "Firewall inactive",
        steps: &[
            "Install a firewall front-end such as ufw or firewalld",
            "Enable the firewall service",
            "Allow the services you need",
            "Verify that the firewall is active",
        ],
    },
    RepairGuide {
        category: Category::Security,
        title: "Updates pending",
        pattern: "Pending system updates",
        steps: &[
            "Refresh the package lists",
            "Install all pending updates",
            "Restart services or the computer if the kernel was updated",
            "Enable automatic security updates",
        ],
    },
    RepairGuide {
        category: Category::Network,
        title: "Slow connection",
        pattern: "High network latency",
        steps: &[
            "Restart the router and modem",
            "Move closer to the router or use a cable",
            "Check for applications using the connection heavily",
            "Contact your provider if latency stays high",
        ],
    },
    RepairGuide {
        category: Category::Network,
        title: "Unstable connectivity",
        pattern: "No connectivity",
        steps: &[
            "Check the cable or Wi-Fi connection",
            "Restart the network interface",
            "Check DNS settings",
            "Restart the router",
        ],
    },
];

/// All built-in repair guides
pub fn guides() -> &'static [RepairGuide] {
    GUIDES
}

/// Find a guide whose pattern matches the problem title (either direction)
pub fn find_guide(category: Category, problem_title: &str) -> Option<&'static RepairGuide> {
    let title = problem_title.trim().to_lowercase();
    if title.is_empty() {
        return None;
    }
    GUIDES.iter().find(|g| {
        let pattern = g.pattern.to_lowercase();
        g.category == category && (title.contains(&pattern) || pattern.contains(&title))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Completed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairStep {
    /// `<category>-<n>`, n is 1-based across the plan
    pub id: String,
    pub order: usize,
    pub title: String,
    pub description: String,
    pub category: Category,
    /// Title of the problem this step addresses
    pub problem: String,
    pub status: StepStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
}

impl Progress {
    pub fn new(completed: usize, total: usize) -> Self {
        let percent = if total == 0 {
            0
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u8
        };
        Self {
            completed,
            total,
            percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairPlan {
    pub id: String,
    pub user_id: String,
    pub diagnostic_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub steps: Vec<RepairStep>,
}

impl RepairPlan {
    /// Build a plan from problems: guide steps where a guide matches,
    /// otherwise the problem's own solution as a single step.
    pub fn generate(
        id: String,
        user_id: String,
        problems: &[Problem],
        diagnostic_id: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut steps: Vec<RepairStep> = Vec::new();

        for problem in problems {
            let mut push = |title: String, description: String| {
                let order = steps.len() + 1;
                steps.push(RepairStep {
                    id: format!("{}-{}", problem.category, order),
                    order,
                    title,
                    description,
                    category: problem.category,
                    problem: problem.title.clone(),
                    status: StepStatus::Pending,
                });
            };

            match find_guide(problem.category, &problem.title) {
                Some(guide) => {
                    for (i, step) in guide.steps.iter().enumerate() {
                        push(format!("Step {}: {}", i + 1, step), step.to_string());
                    }
                }
                None => {
                    let solution = if problem.solution.trim().is_empty() {
                        "There is no specific solution for this problem.".to_string()
                    } else {
                        problem.solution.clone()
                    };
                    push("Recommended solution".to_string(), solution);
                }
            }
        }

        Self {
            id,
            user_id,
            diagnostic_id,
            created_at,
            steps,
        }
    }

    fn step_mut(&mut self, step_id: &str) -> Result<&mut RepairStep> {
        self.steps
            .iter_mut()
            .find(|s| s.id == step_id)
            .ok_or_else(|| TechcareError::not_found(format!("repair step {}", step_id)))
    }

    pub fn complete_step(&mut self, step_id: &str) -> Result<&RepairStep> {
        let step = self.step_mut(step_id)?;
        step.status = StepStatus::Completed;
        Ok(step)
    }

    pub fn skip_step(&mut self, step_id: &str) -> Result<&RepairStep> {
        let step = self.step_mut(step_id)?;
        if step.status == StepStatus::Completed {
            return Err(TechcareError::InvalidState(format!(
                "step {} is already completed",
                step_id
            )));
        }
        step.status = StepStatus::Skipped;
        Ok(step)
    }

    /// Completed steps over total (skipped steps do not count as completed)
    pub fn progress(&self) -> Progress {
        let completed = self
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count();
        Progress::new(completed, self.steps.len())
    }

    /// No step left pending
    pub fn is_finished(&self) -> bool {
        self.steps.iter().all(|s| s.status != StepStatus::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Severity;

    fn plan(problems: &[Problem]) -> RepairPlan {
        RepairPlan::generate("p1".into(), "u1".into(), problems, None, Utc::now())
    }

    #[test]
    fn test_find_guide_both_directions() {
        assert!(find_guide(Category::Disk, "Low disk space on /home").is_some());
        assert!(find_guide(Category::Cpu, "high cpu").is_some());
        assert!(find_guide(Category::Cpu, "Low disk space").is_none());
    }

    #[test]
    fn test_empty_title_has_no_guide() {
        assert!(find_guide(Category::Disk, "").is_none());
        assert!(find_guide(Category::Cpu, "   ").is_none());

        let problems = vec![Problem::new(Category::Disk, Severity::Low, "", "", "Tidy up.")];
        let plan = plan(&problems);
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].title, "Recommended solution");
        assert_eq!(plan.steps[0].description, "Tidy up.");
    }

    #[test]
    fn test_generate_with_guide() {
        let problems = vec![Problem::new(
            Category::Cpu,
            Severity::High,
            "High CPU usage",
            "CPU usage is 92%",
            "Close apps",
        )];
        let plan = plan(&problems);
        assert_eq!(plan.steps.len(), 4);
        assert_eq!(plan.steps[0].id, "cpu-1");
        assert!(plan.steps[0].title.starts_with("Step 1: "));
        assert_eq!(plan.steps[3].order, 4);
    }

    #[test]
    fn test_generate_fallback_step() {
        let problems = vec![Problem::new(
            Category::General,
            Severity::Low,
            "Odd thing",
            "Something odd",
            "Restart the computer",
        )];
        let plan = plan(&problems);
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].title, "Recommended solution");
        assert_eq!(plan.steps[0].description, "Restart the computer");
        assert_eq!(plan.steps[0].id, "general-1");
    }

    #[test]
    fn test_progress_and_finish() {
        let problems = vec![Problem::new(
            Category::Security,
            Severity::High,
            "Firewall inactive",
            "No active firewall",
            "Enable ufw",
        )];
        let mut plan = plan(&problems);
        assert_eq!(plan.progress().percent, 0);
        plan.complete_step("security-1").unwrap();
        plan.complete_step("security-2").unwrap();
        assert_eq!(plan.progress().percent, 50);
        plan.skip_step("security-3").unwrap();
        plan.skip_step("security-4").unwrap();
        assert!(plan.is_finished());
        assert!(plan.skip_step("security-1").is_err());
        assert!(matches!(
            plan.complete_step("nope"),
            Err(TechcareError::NotFound(_))
        ));
    }
}
