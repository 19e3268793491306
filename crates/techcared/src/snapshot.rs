//! System evidence collection.
//!
//! A `SystemSnapshot` is gathered on a blocking thread from sysinfo, `/sys`
//! and a few helper commands. Every part is best effort: a failing collector
//! leaves its part empty and logs a warning.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};
use sysinfo::{Components, Disks, Networks, System};
use techcare_shared::report::SystemInfo;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub collected_at: DateTime<Utc>,
    pub system: SystemInfo,
    pub cpu: CpuSnapshot,
    pub memory: MemorySnapshot,
    pub disks: Vec<DiskSnapshot>,
    pub network: NetworkSnapshot,
    pub startup: StartupSnapshot,
    pub security: SecuritySnapshot,
    pub drivers: DriverSnapshot,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub brand: String,
    pub vendor: String,
    pub physical_cores: Option<u32>,
    pub logical_threads: u32,
    pub usage_percent: f32,
    pub per_core: Vec<f32>,
    pub frequency_mhz: u64,
    pub temperature_c: Option<f32>,
    /// 1, 5 and 15 minute load averages
    pub load_average: [f64; 3],
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessMemory {
    pub pid: u32,
    pub name: String,
    pub bytes: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub available_bytes: u64,
    pub swap_total_bytes: u64,
    pub swap_used_bytes: u64,
    /// Largest processes by resident memory, descending
    pub top_processes: Vec<ProcessMemory>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiskKind {
    Ssd,
    Hdd,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskSnapshot {
    pub mount: String,
    pub fs_type: String,
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub kind: DiskKind,
    pub removable: bool,
}

impl DiskSnapshot {
    pub fn used_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        let used = self.total_bytes.saturating_sub(self.available_bytes);
        used as f64 / self.total_bytes as f64 * 100.0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterfaceStats {
    pub name: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Connectivity {
    pub target: String,
    pub connected: bool,
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub interfaces: Vec<InterfaceStats>,
    /// `None` when the probe could not run
    pub connectivity: Option<Connectivity>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartupSnapshot {
    /// Enabled system services; `None` without systemd
    pub system_services: Option<Vec<String>>,
    /// Enabled user services
    pub user_services: Vec<String>,
    /// XDG autostart entries (file stems)
    pub autostart: Vec<String>,
}

impl StartupSnapshot {
    /// Programs started for the user session
    pub fn item_count(&self) -> usize {
        self.user_services.len() + self.autostart.len()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirewallState {
    Active,
    Inactive,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecuritySnapshot {
    pub firewall: FirewallState,
    pub firewall_tool: Option<String>,
    /// `None` when no supported package manager answered
    pub pending_updates: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PciDevice {
    pub slot: String,
    /// PCI class code, e.g. "0x030000"
    pub class: String,
    pub vendor_id: String,
    pub device_id: String,
    pub driver: Option<String>,
}

impl PciDevice {
    pub fn is_bridge(&self) -> bool {
        self.class.trim_start_matches("0x").starts_with("06")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriverSnapshot {
    /// `None` when /sys/bus/pci is not readable
    pub pci_devices: Option<Vec<PciDevice>>,
    pub failed_module_units: Vec<String>,
}

/// Source of snapshots; the daemon uses `HostCollector`, tests inject fixed data.
pub trait SnapshotSource: Send + Sync {
    fn collect(&self) -> SystemSnapshot;
}

/// Collects a snapshot of the local host
#[derive(Debug, Clone)]
pub struct HostCollector {
    pub connectivity_target: String,
    pub connectivity_timeout: Duration,
    pub top_processes: usize,
}

impl HostCollector {
    pub fn new(connectivity_target: impl Into<String>, connectivity_timeout: Duration) -> Self {
        Self {
            connectivity_target: connectivity_target.into(),
            connectivity_timeout,
            top_processes: 10,
        }
    }
}

impl SnapshotSource for HostCollector {
    fn collect(&self) -> SystemSnapshot {
        let started = Instant::now();
        let mut sys = System::new_all();
        // usage needs two samples
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_cpu();

        let cpu = collect_cpu(&sys);
        let memory = collect_memory(&sys, self.top_processes);
        let system = collect_system_info(&sys);

        let snapshot = SystemSnapshot {
            collected_at: Utc::now(),
            system,
            cpu,
            memory,
            disks: collect_disks(),
            network: NetworkSnapshot {
                interfaces: collect_interfaces(),
                connectivity: probe_connectivity(
                    &self.connectivity_target,
                    self.connectivity_timeout,
                ),
            },
            startup: collect_startup(),
            security: collect_security(),
            drivers: collect_drivers(),
        };
        debug!("Snapshot collected in {} ms", started.elapsed().as_millis());
        snapshot
    }
}

fn collect_system_info(sys: &System) -> SystemInfo {
    let boot = System::boot_time();
    SystemInfo {
        hostname: System::host_name().unwrap_or_default(),
        os_name: System::name().unwrap_or_else(|| "Linux".to_string()),
        os_version: System::os_version().unwrap_or_default(),
        kernel: System::kernel_version().unwrap_or_default(),
        architecture: std::env::consts::ARCH.to_string(),
        cpu_model: sys
            .cpus()
            .first()
            .map(|c| c.brand().trim().to_string())
            .unwrap_or_default(),
        cpu_cores: sys.physical_core_count().unwrap_or(0) as u32,
        cpu_threads: sys.cpus().len() as u32,
        memory_total_bytes: sys.total_memory(),
        boot_time: DateTime::from_timestamp(boot as i64, 0),
        uptime_seconds: System::uptime(),
    }
}

fn collect_cpu(sys: &System) -> CpuSnapshot {
    let cpus = sys.cpus();
    let load = System::load_average();
    CpuSnapshot {
        brand: cpus
            .first()
            .map(|c| c.brand().trim().to_string())
            .unwrap_or_default(),
        vendor: cpus
            .first()
            .map(|c| c.vendor_id().to_string())
            .unwrap_or_default(),
        physical_cores: sys.physical_core_count().map(|n| n as u32),
        logical_threads: cpus.len() as u32,
        usage_percent: sys.global_cpu_info().cpu_usage(),
        per_core: cpus.iter().map(|c| c.cpu_usage()).collect(),
        frequency_mhz: cpus.first().map(|c| c.frequency()).unwrap_or(0),
        temperature_c: cpu_temperature(),
        load_average: [load.one, load.five, load.fifteen],
    }
}

/// Hottest CPU sensor, or hottest sensor overall if none is labeled as CPU
fn cpu_temperature() -> Option<f32> {
    let components = Components::new_with_refreshed_list();
    let readings: Vec<(String, f32)> = components
        .list()
        .iter()
        .map(|c| (c.label().to_lowercase(), c.temperature()))
        .filter(|(_, t)| t.is_finite() && *t > 0.0)
        .collect();

    let is_cpu = |label: &str| {
        ["cpu", "core", "package", "tctl", "tdie", "k10temp"]
            .iter()
            .any(|k| label.contains(k))
    };
    let cpu_max = readings
        .iter()
        .filter(|(l, _)| is_cpu(l))
        .map(|(_, t)| *t)
        .fold(None, |acc: Option<f32>, t| Some(acc.map_or(t, |a| a.max(t))));

    cpu_max.or_else(|| {
        readings
            .iter()
            .map(|(_, t)| *t)
            .fold(None, |acc: Option<f32>, t| Some(acc.map_or(t, |a| a.max(t))))
    })
}

fn collect_memory(sys: &System, top: usize) -> MemorySnapshot {
    let total = sys.total_memory();
    let mut processes: Vec<ProcessMemory> = sys
        .processes()
        .iter()
        .map(|(pid, p)| ProcessMemory {
            pid: pid.as_u32(),
            name: p.name().to_string(),
            bytes: p.memory(),
            percent: if total > 0 {
                p.memory() as f64 / total as f64 * 100.0
            } else {
                0.0
            },
        })
        .collect();
    processes.sort_by(|a, b| b.bytes.cmp(&a.bytes).then_with(|| a.pid.cmp(&b.pid)));
    processes.truncate(top);

    MemorySnapshot {
        total_bytes: total,
        used_bytes: sys.used_memory(),
        available_bytes: sys.available_memory(),
        swap_total_bytes: sys.total_swap(),
        swap_used_bytes: sys.used_swap(),
        top_processes: processes,
    }
}

const PSEUDO_FILESYSTEMS: &[&str] = &["tmpfs", "devtmpfs", "overlay", "squashfs", "ramfs"];

/// Mounted, non-pseudo filesystems
pub fn collect_disks() -> Vec<DiskSnapshot> {
    let disks = Disks::new_with_refreshed_list();
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();

    for disk in disks.list() {
        let fs_type = disk.file_system().to_string_lossy().to_string();
        let mount = disk.mount_point().to_string_lossy().to_string();
        if PSEUDO_FILESYSTEMS.contains(&fs_type.as_str()) || !seen.insert(mount.clone()) {
            continue;
        }
        out.push(DiskSnapshot {
            mount,
            fs_type,
            total_bytes: disk.total_space(),
            available_bytes: disk.available_space(),
            kind: match disk.kind() {
                sysinfo::DiskKind::SSD => DiskKind::Ssd,
                sysinfo::DiskKind::HDD => DiskKind::Hdd,
                _ => DiskKind::Unknown,
            },
            removable: disk.is_removable(),
        });
    }

    if out.is_empty() {
        warn!("No disks reported by the system");
    }
    out
}

fn collect_interfaces() -> Vec<InterfaceStats> {
    let networks = Networks::new_with_refreshed_list();
    let mut out: Vec<InterfaceStats> = networks
        .list()
        .iter()
        .filter(|(name, _)| name.as_str() != "lo")
        .map(|(name, data)| InterfaceStats {
            name: name.clone(),
            rx_bytes: data.total_received(),
            tx_bytes: data.total_transmitted(),
            rx_errors: data.total_errors_on_received(),
            tx_errors: data.total_errors_on_transmitted(),
        })
        .collect();
    out.sort_by(|a, b| a.name.cmp(&b.name));
    out
}

/// TCP connect to `target` ("host:port") and time it
pub fn probe_connectivity(target: &str, timeout: Duration) -> Option<Connectivity> {
    let addrs: Vec<_> = match target.to_socket_addrs() {
        Ok(addrs) => addrs.collect(),
        Err(e) => {
            // Name resolution failing usually means no network at all
            debug!("Cannot resolve {}: {}", target, e);
            return Some(Connectivity {
                target: target.to_string(),
                connected: false,
                latency_ms: None,
            });
        }
    };
    let addr = addrs.first()?;

    let started = Instant::now();
    let connected = TcpStream::connect_timeout(addr, timeout).is_ok();
    Some(Connectivity {
        target: target.to_string(),
        connected,
        latency_ms: connected.then(|| started.elapsed().as_millis() as u64),
    })
}

/// Run a helper command; `None` if it cannot be spawned
fn command_output(program: &str, args: &[&str]) -> Option<(i32, String)> {
    match Command::new(program).args(args).output() {
        Ok(out) => Some((
            out.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&out.stdout).to_string(),
        )),
        Err(e) => {
            debug!("{} unavailable: {}", program, e);
            None
        }
    }
}

fn unit_names(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|l| l.split_whitespace().next())
        .filter(|n| n.ends_with(".service"))
        .map(str::to_string)
        .collect()
}

fn collect_startup() -> StartupSnapshot {
    let list_args = [
        "list-unit-files",
        "--state=enabled",
        "--type=service",
        "--no-legend",
        "--no-pager",
    ];
    let system_services = match command_output("systemctl", &list_args) {
        Some((0, out)) => Some(unit_names(&out)),
        _ => {
            warn!("Could not list enabled services");
            None
        }
    };

    let mut user_args = vec!["--user"];
    user_args.extend_from_slice(&list_args);
    let user_services = match command_output("systemctl", &user_args) {
        Some((0, out)) => unit_names(&out),
        _ => Vec::new(),
    };

    let mut autostart_dirs: Vec<PathBuf> = vec![PathBuf::from("/etc/xdg/autostart")];
    if let Some(config) = dirs::config_dir() {
        autostart_dirs.push(config.join("autostart"));
    }

    StartupSnapshot {
        system_services,
        user_services,
        autostart: autostart_entries(&autostart_dirs),
    }
}

/// Desktop entries in autostart dirs, skipping hidden ones.
/// Later dirs override earlier ones with the same file name.
pub fn autostart_entries(dirs: &[PathBuf]) -> Vec<String> {
    let mut entries = std::collections::BTreeMap::new();
    for dir in dirs {
        let Ok(read) = fs::read_dir(dir) else {
            continue;
        };
        for entry in read.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("desktop") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let hidden = fs::read_to_string(&path)
                .map(|c| {
                    c.lines().any(|l| {
                        let l = l.trim();
                        l == "Hidden=true" || l == "X-GNOME-Autostart-enabled=false"
                    })
                })
                .unwrap_or(false);
            entries.insert(stem.to_string(), !hidden);
        }
    }
    entries
        .into_iter()
        .filter(|(_, enabled)| *enabled)
        .map(|(name, _)| name)
        .collect()
}

fn collect_security() -> SecuritySnapshot {
    let (firewall, firewall_tool) = detect_firewall();
    let pending_updates = pending_updates();
    if pending_updates.is_none() {
        warn!("Could not determine pending updates");
    }
    SecuritySnapshot {
        firewall,
        firewall_tool,
        pending_updates,
    }
}

/// Parse `ufw status` output
pub fn parse_ufw_status(output: &str) -> FirewallState {
    let Ok(re) = Regex::new(r"(?m)^Status:\s*(\w+)") else {
        return FirewallState::Unknown;
    };
    match re.captures(output).and_then(|c| c.get(1)).map(|m| m.as_str()) {
        Some("active") => FirewallState::Active,
        Some("inactive") => FirewallState::Inactive,
        _ => FirewallState::Unknown,
    }
}

fn detect_firewall() -> (FirewallState, Option<String>) {
    if let Some((_, out)) = command_output("ufw", &["status"]) {
        let state = parse_ufw_status(&out);
        if state != FirewallState::Unknown {
            return (state, Some("ufw".to_string()));
        }
    }

    if let Some((_, out)) = command_output("firewall-cmd", &["--state"]) {
        match out.trim() {
            "running" => return (FirewallState::Active, Some("firewalld".to_string())),
            "not running" => return (FirewallState::Inactive, Some("firewalld".to_string())),
            _ => {}
        }
    }

    if let Some((0, out)) = command_output("nft", &["list", "ruleset"]) {
        let state = if out.contains("chain") {
            FirewallState::Active
        } else {
            FirewallState::Inactive
        };
        return (state, Some("nftables".to_string()));
    }

    (FirewallState::Unknown, None)
}

/// Count lines of `apt list --upgradable`
pub fn count_apt_upgradable(output: &str) -> u32 {
    output
        .lines()
        .filter(|l| l.contains("[upgradable"))
        .count() as u32
}

fn pending_updates() -> Option<u32> {
    // checkupdates exits 2 when there is nothing to update
    match command_output("checkupdates", &[]) {
        Some((0, out)) => return Some(out.lines().filter(|l| !l.trim().is_empty()).count() as u32),
        Some((2, _)) => return Some(0),
        _ => {}
    }

    if let Some((0, out)) = command_output("apt", &["list", "--upgradable"]) {
        return Some(count_apt_upgradable(&out));
    }

    // dnf exits 100 when updates are available
    match command_output("dnf", &["check-update", "-q"]) {
        Some((0, _)) => Some(0),
        Some((100, out)) => Some(
            out.lines()
                .filter(|l| !l.trim().is_empty() && !l.starts_with(' '))
                .count() as u32,
        ),
        _ => None,
    }
}

fn collect_drivers() -> DriverSnapshot {
    let pci_devices = read_pci_devices(Path::new("/sys/bus/pci/devices"));
    if pci_devices.is_none() {
        warn!("Could not read PCI devices");
    }

    let failed_module_units = match command_output(
        "systemctl",
        &["list-units", "--state=failed", "--no-legend", "--plain", "--no-pager"],
    ) {
        Some((0, out)) => unit_names(&out)
            .into_iter()
            .filter(|u| u.contains("modprobe") || u.contains("modules-load"))
            .collect(),
        _ => Vec::new(),
    };

    DriverSnapshot {
        pci_devices,
        failed_module_units,
    }
}

/// Read PCI devices from a sysfs-style directory
pub fn read_pci_devices(root: &Path) -> Option<Vec<PciDevice>> {
    let read_attr = |dir: &Path, name: &str| {
        fs::read_to_string(dir.join(name))
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };

    let mut devices: Vec<PciDevice> = fs::read_dir(root)
        .ok()?
        .flatten()
        .map(|entry| {
            let dir = entry.path();
            PciDevice {
                slot: entry.file_name().to_string_lossy().to_string(),
                class: read_attr(&dir, "class"),
                vendor_id: read_attr(&dir, "vendor"),
                device_id: read_attr(&dir, "device"),
                driver: fs::read_link(dir.join("driver"))
                    .ok()
                    .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string())),
            }
        })
        .collect();
    devices.sort_by(|a, b| a.slot.cmp(&b.slot));
    Some(devices)
}

/// Collect on a blocking thread
pub async fn collect_async(
    source: std::sync::Arc<dyn SnapshotSource>,
) -> Result<SystemSnapshot, tokio::task::JoinError> {
    tokio::task::spawn_blocking(move || source.collect()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_ufw_status() {
        assert_eq!(
            parse_ufw_status("Status: active\n\nTo Action From\n"),
            FirewallState::Active
        );
        assert_eq!(parse_ufw_status("Status: inactive\n"), FirewallState::Inactive);
        assert_eq!(
            parse_ufw_status("ERROR: You need to be root"),
            FirewallState::Unknown
        );
    }

    #[test]
    fn test_count_apt_upgradable() {
        let out = "Listing...\nfirefox/jammy-updates 126.0 amd64 [upgradable from: 125.0]\nlibc6/jammy 2.35 amd64 [upgradable from: 2.34]\n";
        assert_eq!(count_apt_upgradable(out), 2);
        assert_eq!(count_apt_upgradable("Listing...\n"), 0);
    }

    #[test]
    fn test_unit_names() {
        let out = "ssh.service enabled enabled\ncups.service enabled enabled\nfoo.socket enabled\n";
        assert_eq!(unit_names(out), vec!["ssh.service", "cups.service"]);
    }

    #[test]
    fn test_disk_used_percent() {
        let disk = DiskSnapshot {
            mount: "/".into(),
            total_bytes: 200,
            available_bytes: 50,
            ..Default::default()
        };
        assert_eq!(disk.used_percent(), 75.0);
        assert_eq!(DiskSnapshot::default().used_percent(), 0.0);
    }

    #[test]
    fn test_autostart_entries_respect_hidden() {
        let system = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        fs::write(system.path().join("a.desktop"), "[Desktop Entry]\nName=A\n").unwrap();
        fs::write(system.path().join("b.desktop"), "[Desktop Entry]\nName=B\n").unwrap();
        fs::write(system.path().join("notes.txt"), "x").unwrap();
        // user override hides b
        fs::write(user.path().join("b.desktop"), "[Desktop Entry]\nHidden=true\n").unwrap();
        fs::write(user.path().join("c.desktop"), "[Desktop Entry]\nName=C\n").unwrap();

        let entries =
            autostart_entries(&[system.path().to_path_buf(), user.path().to_path_buf()]);
        assert_eq!(entries, vec!["a", "c"]);
    }

    #[test]
    fn test_read_pci_devices() {
        let root = TempDir::new().unwrap();
        let gpu = root.path().join("0000:01:00.0");
        fs::create_dir_all(&gpu).unwrap();
        fs::write(gpu.join("class"), "0x030000\n").unwrap();
        fs::write(gpu.join("vendor"), "0x10de\n").unwrap();
        fs::write(gpu.join("device"), "0x1c82\n").unwrap();

        let devices = read_pci_devices(root.path()).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].vendor_id, "0x10de");
        assert!(devices[0].driver.is_none());
        assert!(!devices[0].is_bridge());
        assert!(read_pci_devices(&root.path().join("missing")).is_none());
    }
}
