//! Guided maintenance: step catalog and the step/progress state machine.

use crate::chat::StepContext;
use crate::error::{Result, TechcareError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuideKind {
    Slowness,
    DiskSpace,
    Startup,
    Drivers,
    Security,
}

impl GuideKind {
    pub const ALL: [GuideKind; 5] = [
        GuideKind::Slowness,
        GuideKind::DiskSpace,
        GuideKind::Startup,
        GuideKind::Drivers,
        GuideKind::Security,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GuideKind::Slowness => "slowness",
            GuideKind::DiskSpace => "disk_space",
            GuideKind::Startup => "startup",
            GuideKind::Drivers => "drivers",
            GuideKind::Security => "security",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "slowness" | "slow" => Some(GuideKind::Slowness),
            "disk_space" | "disk" | "space" => Some(GuideKind::DiskSpace),
            "startup" | "boot" => Some(GuideKind::Startup),
            "drivers" | "driver" => Some(GuideKind::Drivers),
            "security" => Some(GuideKind::Security),
            _ => None,
        }
    }
}

impl std::fmt::Display for GuideKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GuideStep {
    pub title: &'static str,
    pub description: &'static str,
    pub instructions: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<&'static str>,
    /// Why the step matters, used by the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceGuide {
    pub kind: GuideKind,
    pub title: &'static str,
    pub description: &'static str,
    pub steps: &'static [GuideStep],
}

const SLOWNESS_STEPS: &[GuideStep] = &[
    GuideStep {
        title: "Check running programs",
        description: "Find out which programs are consuming your system's resources.",
        instructions: &[
            "Open a terminal",
            "Run top (or htop if installed)",
            "Press P to sort by CPU or M to sort by memory",
            "Note programs with high CPU or memory values",
        ],
        details: Some(
            "Programs constantly using more than 30% CPU or more than 500 MB of memory can slow the system down.",
        ),
        rationale: Some("knowing what consumes resources tells you what to close"),
    },
    GuideStep {
        title: "Close unnecessary programs",
        description: "End programs that are consuming resources without need.",
        instructions: &[
            "Quit applications you are not using from their own menu",
            "For unresponsive programs, note the PID in top",
            "Run kill <PID>, or kill -9 <PID> if it does not exit",
            "Repeat for other unnecessary programs",
        ],
        details: Some("Do not end system processes. Focus on applications you recognize."),
        rationale: Some("every closed program returns CPU time and memory to the system"),
    },
    GuideStep {
        title: "Clear temporary files",
        description: "Temporary files take space and can reduce performance.",
        instructions: &[
            "Run techcarectl clean analyze to see reclaimable space",
            "Run techcarectl clean run --kinds temp-files",
            "Files in use are skipped, which is normal",
        ],
        details: None,
        rationale: Some("a full disk slows down caching and swapping"),
    },
    GuideStep {
        title: "Disable startup programs",
        description: "Many programs start automatically and keep consuming resources.",
        instructions: &[
            "List autostart entries in ~/.config/autostart",
            "Remove the entries you do not need",
            "Disable unneeded services with systemctl disable <name>",
        ],
        details: None,
        rationale: Some("fewer background programs leave more resources for your work"),
    },
    GuideStep {
        title: "Restart the computer",
        description: "Restarting applies all changes and clears the system memory.",
        instructions: &["Save your work", "Close all programs", "Restart the computer"],
        details: None,
        rationale: None,
    },
];

const DISK_SPACE_STEPS: &[GuideStep] = &[
    GuideStep {
        title: "Check current disk space",
        description: "First, check how much space is available right now.",
        instructions: &["Open a terminal", "Run df -h", "Note the Use% of each filesystem"],
        details: Some("Keep at least 15% of each disk free."),
        rationale: Some("it gives a baseline to measure the cleanup against"),
    },
    GuideStep {
        title: "Run the cleaner",
        description: "Remove temporary files and caches safely.",
        instructions: &[
            "Run techcarectl clean analyze",
            "Review the reclaimable space per category",
            "Run techcarectl clean run",
        ],
        details: None,
        rationale: Some("temporary files and caches are the safest space to reclaim"),
    },
    GuideStep {
        title: "Uninstall unused programs",
        description: "Remove programs you no longer use to free valuable space.",
        instructions: &[
            "List installed packages with your package manager",
            "Remove packages you no longer need",
            "Remove orphaned dependencies",
        ],
        details: None,
        rationale: None,
    },
    GuideStep {
        title: "Find and remove large files",
        description: "Locate files that take a lot of space and that you may not need.",
        instructions: &[
            "Review the large files listed by techcarectl clean analyze",
            "Move them to external storage or delete them",
        ],
        details: Some("Check the Downloads folder first, it often holds forgotten installers."),
        rationale: Some("a few large files often account for most of the used space"),
    },
];

const STARTUP_STEPS: &[GuideStep] = &[
    GuideStep {
        title: "Measure current boot time",
        description: "First, check how long the system takes to start.",
        instructions: &["Run systemd-analyze", "Run systemd-analyze blame", "Note the slowest units"],
        details: None,
        rationale: Some("it shows which units actually delay the boot"),
    },
    GuideStep {
        title: "Disable unnecessary services",
        description: "Services you do not use still start at every boot.",
        instructions: &[
            "Run systemctl list-unit-files --state=enabled --type=service",
            "Disable services you do not need with systemctl disable <name>",
        ],
        details: Some("Do not disable services you do not recognize without checking first."),
        rationale: Some("each disabled service shortens the boot and frees memory"),
    },
    GuideStep {
        title: "Review autostart entries",
        description: "Desktop autostart entries run at every login.",
        instructions: &["Open ~/.config/autostart", "Remove the entries you do not need"],
        details: None,
        rationale: None,
    },
];

const DRIVERS_STEPS: &[GuideStep] = &[
    GuideStep {
        title: "Identify devices without drivers",
        description: "Find devices that have no kernel driver bound.",
        instructions: &["Run lspci -k", "Look for devices without a 'Kernel driver in use' line"],
        details: None,
        rationale: Some("devices without drivers do not work or work poorly"),
    },
    GuideStep {
        title: "Install updates",
        description: "Kernel and firmware updates bring newer drivers.",
        instructions: &[
            "Update the system with your package manager",
            "Install the linux-firmware package if available",
        ],
        details: None,
        rationale: Some("most drivers ship with the kernel and firmware packages"),
    },
    GuideStep {
        title: "Verify after restart",
        description: "Check that the devices work after the update.",
        instructions: &["Restart the computer", "Run lspci -k again", "Test the device"],
        details: None,
        rationale: None,
    },
];

const SECURITY_STEPS: &[GuideStep] = &[
    GuideStep {
        title: "Check the firewall",
        description: "Make sure a firewall is active.",
        instructions: &["Run sudo ufw status (or firewall-cmd --state)", "Enable it if inactive"],
        details: None,
        rationale: Some("the firewall blocks unwanted incoming connections"),
    },
    GuideStep {
        title: "Apply security updates",
        description: "Install pending updates, security patches included.",
        instructions: &["Refresh package lists", "Install all pending updates"],
        details: None,
        rationale: Some("updates close known vulnerabilities"),
    },
    GuideStep {
        title: "Scan for malware",
        description: "Run a full scan of your home directory.",
        instructions: &["Install ClamAV", "Run clamscan -r ~"],
        details: None,
        rationale: None,
    },
    GuideStep {
        title: "Review firewall rules",
        description: "Allow only the services you need.",
        instructions: &["List rules with sudo ufw status numbered", "Delete rules you do not need"],
        details: None,
        rationale: None,
    },
];

const CATALOG: &[MaintenanceGuide] = &[
    MaintenanceGuide {
        kind: GuideKind::Slowness,
        title: "Computer Performance Optimization",
        description: "Follow the steps below to speed up your computer",
        steps: SLOWNESS_STEPS,
    },
    MaintenanceGuide {
        kind: GuideKind::DiskSpace,
        title: "Free Up Disk Space",
        description: "Follow the steps below to find and remove unnecessary files",
        steps: DISK_SPACE_STEPS,
    },
    MaintenanceGuide {
        kind: GuideKind::Startup,
        title: "Faster Startup",
        description: "Follow the steps below to reduce your computer's boot time",
        steps: STARTUP_STEPS,
    },
    MaintenanceGuide {
        kind: GuideKind::Drivers,
        title: "Driver Check",
        description: "Follow the steps below to make sure every device has a working driver",
        steps: DRIVERS_STEPS,
    },
    MaintenanceGuide {
        kind: GuideKind::Security,
        title: "Security Checkup",
        description: "Follow the steps below to keep your computer safe",
        steps: SECURITY_STEPS,
    },
];

pub fn catalog() -> &'static [MaintenanceGuide] {
    CATALOG
}

impl MaintenanceGuide {
    pub fn for_kind(kind: GuideKind) -> &'static MaintenanceGuide {
        // CATALOG holds one entry per GuideKind
        CATALOG
            .iter()
            .find(|g| g.kind == kind)
            .unwrap_or(&CATALOG[0])
    }
}

impl From<&GuideStep> for StepContext {
    fn from(step: &GuideStep) -> Self {
        StepContext {
            title: step.title.to_string(),
            instructions: step.instructions.join("\n"),
            detailed_instructions: step.details.map(|d| {
                format!("{}\n\n{}", step.instructions.join("\n"), d)
            }),
            rationale: step.rationale.map(str::to_string),
            benefit: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    InProgress,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideSession {
    pub kind: GuideKind,
    pub current: usize,
    pub completed: BTreeSet<usize>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionReport {
    pub kind: GuideKind,
    pub title: String,
    pub completed_steps: Vec<String>,
    pub total_steps: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_secs: i64,
}

impl GuideSession {
    pub fn start(kind: GuideKind) -> Self {
        Self {
            kind,
            current: 0,
            completed: BTreeSet::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn guide(&self) -> &'static MaintenanceGuide {
        MaintenanceGuide::for_kind(self.kind)
    }

    pub fn total_steps(&self) -> usize {
        self.guide().steps.len()
    }

    pub fn current_step(&self) -> &'static GuideStep {
        &self.guide().steps[self.current]
    }

    pub fn step_context(&self) -> StepContext {
        StepContext::from(self.current_step())
    }

    pub fn next(&mut self) -> Result<usize> {
        if self.current + 1 >= self.total_steps() {
            return Err(TechcareError::InvalidState(
                "already at the last step".to_string(),
            ));
        }
        self.current += 1;
        Ok(self.current)
    }

    pub fn previous(&mut self) -> Result<usize> {
        if self.current == 0 {
            return Err(TechcareError::InvalidState(
                "already at the first step".to_string(),
            ));
        }
        self.current -= 1;
        Ok(self.current)
    }

    /// Mark the current step done and move to the next incomplete one
    pub fn complete_current(&mut self) -> SessionState {
        if self.completed.insert(self.current) {
            let total = self.total_steps();
            if self.completed.len() == total {
                self.finished_at = Some(Utc::now());
            } else if let Some(next) = (self.current + 1..total)
                .chain(0..self.current)
                .find(|i| !self.completed.contains(i))
            {
                self.current = next;
            }
        }
        self.state()
    }

    pub fn is_step_completed(&self, index: usize) -> bool {
        self.completed.contains(&index)
    }

    /// Completed share of steps, rounded percent
    pub fn progress(&self) -> u8 {
        let total = self.total_steps();
        if total == 0 {
            return 0;
        }
        ((self.completed.len() as f64 / total as f64) * 100.0).round() as u8
    }

    pub fn state(&self) -> SessionState {
        if self.completed.len() == self.total_steps() {
            SessionState::Finished
        } else {
            SessionState::InProgress
        }
    }

    pub fn completion_report(&self) -> CompletionReport {
        let guide = self.guide();
        let end = self.finished_at.unwrap_or_else(Utc::now);
        CompletionReport {
            kind: self.kind,
            title: guide.title.to_string(),
            completed_steps: self
                .completed
                .iter()
                .filter_map(|i| guide.steps.get(*i))
                .map(|s| s.title.to_string())
                .collect(),
            total_steps: guide.steps.len(),
            started_at: self.started_at,
            finished_at: self.finished_at,
            duration_secs: (end - self.started_at).num_seconds().max(0),
        }
    }

    pub fn reset(&mut self) {
        self.current = 0;
        self.completed.clear();
        self.started_at = Utc::now();
        self.finished_at = None;
    }
}
