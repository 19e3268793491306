//! PCI devices without a bound driver and failed module-loading units.

use super::{Analyzer, Thresholds};
use crate::snapshot::SystemSnapshot;
use techcare_shared::report::{Category, ComponentReport, Problem, ScoreCard, Severity};

pub struct DriverAnalyzer;

impl Analyzer for DriverAnalyzer {
    fn category(&self) -> Category {
        Category::Driver
    }

    fn analyze(&self, snapshot: &SystemSnapshot, _t: &Thresholds) -> ComponentReport {
        let drivers = &snapshot.drivers;
        let Some(devices) = &drivers.pci_devices else {
            return ComponentReport::failed(Category::Driver, "PCI devices could not be read");
        };

        let mut report = ComponentReport::new(Category::Driver);
        let mut card = ScoreCard::new();

        let unbound: Vec<_> = devices
            .iter()
            .filter(|d| !d.is_bridge() && d.driver.is_none())
            .collect();
        report.fact("pci_devices", devices.len());
        report.fact("without_driver", unbound.len());

        for device in unbound {
            card.deduct(5);
            report.problems.push(Problem::new(
                Category::Driver,
                Severity::Medium,
                format!("Device without driver: {}", device.slot),
                format!(
                    "Driver missing for PCI device {} (vendor {}, device {}, class {})",
                    device.slot, device.vendor_id, device.device_id, device.class
                ),
                "Install the driver package or firmware for this device.",
            ));
        }

        for unit in &drivers.failed_module_units {
            card.deduct(5);
            report.problems.push(Problem::new(
                Category::Driver,
                Severity::Medium,
                format!("Failed kernel module unit: {}", unit),
                format!("{} failed to load its kernel modules", unit),
                format!("Inspect `journalctl -u {}` and fix the module configuration.", unit),
            ));
        }

        report.score = card.score();
        report
    }
}
