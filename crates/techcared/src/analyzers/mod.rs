//! Analyzers: pure functions from a `SystemSnapshot` to a `ComponentReport`.
//!
//! Each analyzer owns one category, applies threshold rules and deducts
//! points from a 100-point scorecard.

use crate::snapshot::SystemSnapshot;
use serde::{Deserialize, Serialize};
use techcare_shared::report::{Category, ComponentReport};

pub mod cpu;
pub mod disk;
pub mod driver;
pub mod memory;
pub mod network;
pub mod security;
pub mod startup;

/// Rule thresholds, configurable under `[diagnostics.thresholds]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_cpu_high")]
    pub cpu_high_percent: f32,
    #[serde(default = "default_cpu_medium")]
    pub cpu_medium_percent: f32,
    #[serde(default = "default_core_overload")]
    pub core_overload_percent: f32,
    #[serde(default = "default_temp_critical")]
    pub cpu_temp_critical_c: f32,
    #[serde(default = "default_temp_high")]
    pub cpu_temp_high_c: f32,
    #[serde(default = "default_load_per_core")]
    pub load_per_core: f64,

    #[serde(default = "default_mem_critical")]
    pub memory_critical_percent: f64,
    #[serde(default = "default_mem_high")]
    pub memory_high_percent: f64,
    #[serde(default = "default_mem_medium")]
    pub memory_medium_percent: f64,
    #[serde(default = "default_swap_high")]
    pub swap_high_percent: f64,
    #[serde(default = "default_available_critical")]
    pub available_critical_mb: u64,
    #[serde(default = "default_available_high")]
    pub available_high_mb: u64,
    #[serde(default = "default_process_share")]
    pub process_share_percent: f64,

    #[serde(default = "default_disk_critical")]
    pub disk_critical_percent: f64,
    #[serde(default = "default_disk_high")]
    pub disk_high_percent: f64,
    #[serde(default = "default_disk_medium")]
    pub disk_medium_percent: f64,

    #[serde(default = "default_latency")]
    pub latency_ms: u64,

    #[serde(default = "default_startup_high")]
    pub startup_high_items: usize,
    #[serde(default = "default_startup_medium")]
    pub startup_medium_items: usize,
}

fn default_cpu_high() -> f32 {
    85.0
}

fn default_cpu_medium() -> f32 {
    70.0
}

fn default_core_overload() -> f32 {
    90.0
}

fn default_temp_critical() -> f32 {
    85.0
}

fn default_temp_high() -> f32 {
    75.0
}

fn default_load_per_core() -> f64 {
    2.0
}

fn default_mem_critical() -> f64 {
    90.0
}

fn default_mem_high() -> f64 {
    80.0
}

fn default_mem_medium() -> f64 {
    70.0
}

fn default_swap_high() -> f64 {
    70.0
}

fn default_available_critical() -> u64 {
    500
}

fn default_available_high() -> u64 {
    1000
}

fn default_process_share() -> f64 {
    25.0
}

fn default_disk_critical() -> f64 {
    95.0
}

fn default_disk_high() -> f64 {
    90.0
}

fn default_disk_medium() -> f64 {
    80.0
}

fn default_latency() -> u64 {
    300
}

fn default_startup_high() -> usize {
    15
}

fn default_startup_medium() -> usize {
    8
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu_high_percent: default_cpu_high(),
            cpu_medium_percent: default_cpu_medium(),
            core_overload_percent: default_core_overload(),
            cpu_temp_critical_c: default_temp_critical(),
            cpu_temp_high_c: default_temp_high(),
            load_per_core: default_load_per_core(),
            memory_critical_percent: default_mem_critical(),
            memory_high_percent: default_mem_high(),
            memory_medium_percent: default_mem_medium(),
            swap_high_percent: default_swap_high(),
            available_critical_mb: default_available_critical(),
            available_high_mb: default_available_high(),
            process_share_percent: default_process_share(),
            disk_critical_percent: default_disk_critical(),
            disk_high_percent: default_disk_high(),
            disk_medium_percent: default_disk_medium(),
            latency_ms: default_latency(),
            startup_high_items: default_startup_high(),
            startup_medium_items: default_startup_medium(),
        }
    }
}

/// One diagnostic area
pub trait Analyzer: Send + Sync {
    fn category(&self) -> Category;

    fn analyze(&self, snapshot: &SystemSnapshot, thresholds: &Thresholds) -> ComponentReport;
}

/// Registry of all analyzers, in execution order
pub struct AnalyzerRegistry {
    analyzers: Vec<Box<dyn Analyzer>>,
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        let analyzers: Vec<Box<dyn Analyzer>> = vec![
            Box::new(cpu::CpuAnalyzer),
            Box::new(memory::MemoryAnalyzer),
            Box::new(disk::DiskAnalyzer),
            Box::new(network::NetworkAnalyzer),
            Box::new(startup::StartupAnalyzer),
            Box::new(security::SecurityAnalyzer),
            Box::new(driver::DriverAnalyzer),
        ];
        Self { analyzers }
    }

    pub fn all(&self) -> &[Box<dyn Analyzer>] {
        &self.analyzers
    }

    pub fn get(&self, category: Category) -> Option<&dyn Analyzer> {
        self.analyzers
            .iter()
            .find(|a| a.category() == category)
            .map(|a| a.as_ref())
    }

    pub fn categories(&self) -> Vec<Category> {
        self.analyzers.iter().map(|a| a.category()).collect()
    }

    /// Run every analyzer over one snapshot
    pub fn run_all(&self, snapshot: &SystemSnapshot, thresholds: &Thresholds) -> Vec<ComponentReport> {
        self.analyzers
            .iter()
            .map(|a| a.analyze(snapshot, thresholds))
            .collect()
    }
}

/// Round to one decimal for report facts
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::snapshot::*;
    use techcare_shared::report::SystemInfo;

    pub const GB: u64 = 1024 * 1024 * 1024;

    /// A healthy machine: every analyzer should report no problems
    pub fn healthy() -> SystemSnapshot {
        SystemSnapshot {
            collected_at: chrono::Utc::now(),
            system: SystemInfo {
                hostname: "testbox".into(),
                os_name: "Linux".into(),
                cpu_threads: 8,
                memory_total_bytes: 16 * GB,
                ..Default::default()
            },
            cpu: CpuSnapshot {
                brand: "Test CPU".into(),
                vendor: "GenuineTest".into(),
                physical_cores: Some(4),
                logical_threads: 8,
                usage_percent: 12.0,
                per_core: vec![10.0; 8],
                frequency_mhz: 3200,
                temperature_c: Some(45.0),
                load_average: [0.5, 0.4, 0.3],
            },
            memory: MemorySnapshot {
                total_bytes: 16 * GB,
                used_bytes: 4 * GB,
                available_bytes: 12 * GB,
                swap_total_bytes: 2 * GB,
                swap_used_bytes: 0,
                top_processes: vec![ProcessMemory {
                    pid: 42,
                    name: "firefox".into(),
                    bytes: GB,
                    percent: 6.25,
                }],
            },
            disks: vec![DiskSnapshot {
                mount: "/".into(),
                fs_type: "ext4".into(),
                total_bytes: 500 * GB,
                available_bytes: 300 * GB,
                kind: DiskKind::Ssd,
                removable: false,
            }],
            network: NetworkSnapshot {
                interfaces: vec![InterfaceStats {
                    name: "eth0".into(),
                    rx_bytes: 1000,
                    tx_bytes: 1000,
                    rx_errors: 0,
                    tx_errors: 0,
                }],
                connectivity: Some(Connectivity {
                    target: "1.1.1.1:443".into(),
                    connected: true,
                    latency_ms: Some(20),
                }),
            },
            startup: StartupSnapshot {
                system_services: Some(vec!["ssh.service".into()]),
                user_services: vec![],
                autostart: vec!["nm-applet".into()],
            },
            security: SecuritySnapshot {
                firewall: FirewallState::Active,
                firewall_tool: Some("ufw".into()),
                pending_updates: Some(0),
            },
            drivers: DriverSnapshot {
                pci_devices: Some(vec![PciDevice {
                    slot: "0000:00:02.0".into(),
                    class: "0x030000".into(),
                    vendor_id: "0x8086".into(),
                    device_id: "0x3e92".into(),
                    driver: Some("i915".into()),
                }]),
                failed_module_units: vec![],
            },
        }
    }
}
