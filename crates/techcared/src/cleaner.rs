//! Disk cleanup: temp files, browser caches, rotated logs, old downloads, trash.
//!
//! Only regular files older than an age cutoff are removed. Directories and
//! symlinks are never touched, and a file that cannot be removed is counted
//! as failed without aborting the run.

use crate::config::CleanerConfig;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use techcare_shared::api::{CleanRequest, CleanSummary, CleanupAnalysis, DiskSpace, LargeFile, PathUsage};
use techcare_shared::error::Result;
use techcare_shared::format::format_bytes;
use techcare_shared::schedule::CleaningKind;
use techcare_shared::TechcareError;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Never descended into by the large-file search
const SKIP_ROOTS: &[&str] = &[
    "/proc",
    "/sys",
    "/dev",
    "/run",
    "/mnt",
    "/media",
    "/lost+found",
];

/// Browser cache directories relative to the user cache dir
const BROWSER_CACHES: &[&str] = &[
    "mozilla/firefox",
    "chromium",
    "google-chrome",
    "BraveSoftware",
    "vivaldi",
];

/// `app.log.1`, `app.log.2.gz`, `syslog.3.gz`, `old.gz`
const ROTATED_LOG_PATTERN: &str = r"(\.log\.\d+(\.gz)?|\.\d+\.gz|\.gz)$";

/// Where each cleaning kind looks
#[derive(Debug, Clone, Default)]
pub struct CleanerPaths {
    pub temp_roots: Vec<PathBuf>,
    pub browser_caches: Vec<PathBuf>,
    /// Searched for rotated logs only
    pub log_dirs: Vec<PathBuf>,
    /// Parent of per-application data dirs; every `<app>/logs` is cleaned
    pub app_data: Option<PathBuf>,
    pub downloads: Option<PathBuf>,
    pub trash: Option<PathBuf>,
    pub large_file_root: Option<PathBuf>,
}

impl CleanerPaths {
    /// Standard locations for the current user
    pub fn for_current_user(config: &CleanerConfig) -> Self {
        let cache = dirs::cache_dir();
        let data = dirs::data_dir();

        let mut temp_roots = vec![PathBuf::from("/tmp"), PathBuf::from("/var/tmp")];
        temp_roots.extend(cache.clone());
        temp_roots.extend(config.extra_temp_roots.iter().cloned());

        let browser_caches = cache
            .as_ref()
            .map(|c| BROWSER_CACHES.iter().map(|b| c.join(b)).collect())
            .unwrap_or_default();

        Self {
            temp_roots,
            browser_caches,
            log_dirs: config.log_dirs.clone(),
            trash: data.as_ref().map(|d| d.join("Trash").join("files")),
            app_data: data,
            downloads: dirs::download_dir(),
            large_file_root: config.large_file_root.clone().or_else(dirs::home_dir),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selector {
    All,
    RotatedLogs,
}

#[derive(Debug, Clone)]
struct Target {
    root: PathBuf,
    selector: Selector,
    /// Subtrees owned by another kind
    exclude: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
struct FileEntry {
    path: PathBuf,
    bytes: u64,
    modified: Option<SystemTime>,
}

pub struct Cleaner {
    paths: CleanerPaths,
    rotated: Regex,
    min_age: Duration,
    download_age: Duration,
    large_file_min_bytes: u64,
    large_file_count: usize,
}

impl Cleaner {
    pub fn new(paths: CleanerPaths, config: &CleanerConfig) -> Result<Self> {
        let rotated = Regex::new(ROTATED_LOG_PATTERN)
            .map_err(|e| TechcareError::Internal(format!("rotated log pattern: {}", e)))?;
        Ok(Self {
            paths,
            rotated,
            min_age: Duration::from_secs(config.min_age_secs),
            download_age: config.effective_download_age(),
            large_file_min_bytes: config.effective_large_file_min_bytes(),
            large_file_count: config.effective_large_file_count(),
        })
    }

    pub fn from_config(config: &CleanerConfig) -> Result<Self> {
        Self::new(CleanerPaths::for_current_user(config), config)
    }

    fn targets(&self, kind: CleaningKind) -> Vec<Target> {
        let all = |root: &Path| Target {
            root: root.to_path_buf(),
            selector: Selector::All,
            exclude: Vec::new(),
        };

        let targets: Vec<Target> = match kind {
            CleaningKind::TempFiles => self
                .paths
                .temp_roots
                .iter()
                .map(|root| Target {
                    exclude: self.paths.browser_caches.clone(),
                    ..all(root.as_path())
                })
                .collect(),
            CleaningKind::BrowserCache => self
                .paths
                .browser_caches
                .iter()
                .map(|p| all(p.as_path()))
                .collect(),
            CleaningKind::Logs => {
                let mut targets: Vec<Target> = self
                    .paths
                    .log_dirs
                    .iter()
                    .map(|root| Target {
                        selector: Selector::RotatedLogs,
                        ..all(root.as_path())
                    })
                    .collect();
                targets.extend(self.app_log_dirs().iter().map(|p| all(p.as_path())));
                targets
            }
            CleaningKind::Downloads => self
                .paths
                .downloads
                .iter()
                .map(|p| all(p.as_path()))
                .collect(),
            CleaningKind::RecycleBin => self
                .paths
                .trash
                .iter()
                .map(|p| all(p.as_path()))
                .collect(),
        };

        targets.into_iter().filter(|t| t.root.is_dir()).collect()
    }

    /// `<app_data>/<app>/logs` directories
    fn app_log_dirs(&self) -> Vec<PathBuf> {
        let Some(data) = &self.paths.app_data else {
            return Vec::new();
        };
        let Ok(read) = fs::read_dir(data) else {
            return Vec::new();
        };
        let mut dirs: Vec<PathBuf> = read
            .flatten()
            .map(|e| e.path().join("logs"))
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();
        dirs
    }

    fn scan(&self, target: &Target) -> Vec<FileEntry> {
        WalkDir::new(&target.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !target.exclude.iter().any(|x| e.path() == x.as_path()))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| match target.selector {
                Selector::All => true,
                Selector::RotatedLogs => self.rotated.is_match(&e.file_name().to_string_lossy()),
            })
            .filter_map(|e| {
                let md = e.metadata().ok()?;
                Some(FileEntry {
                    path: e.into_path(),
                    bytes: md.len(),
                    modified: md.modified().ok(),
                })
            })
            .collect()
    }

    /// Files of `kind` under `target` old enough to remove
    fn removable(&self, kind: CleaningKind, target: &Target, cutoff: Duration) -> Vec<FileEntry> {
        let cutoff = match kind {
            CleaningKind::Downloads => cutoff.max(self.download_age),
            _ => cutoff,
        };
        let now = SystemTime::now();
        self.scan(target)
            .into_iter()
            .filter(|f| {
                f.modified
                    .map(|m| now.duration_since(m).unwrap_or(Duration::ZERO) >= cutoff)
                    .unwrap_or(false)
            })
            .collect()
    }

    fn usage(&self, kind: CleaningKind) -> Vec<PathUsage> {
        self.targets(kind)
            .iter()
            .map(|target| {
                let files = self.removable(kind, target, self.min_age);
                let bytes = files.iter().map(|f| f.bytes).sum();
                PathUsage {
                    path: target.root.display().to_string(),
                    bytes,
                    files: files.len() as u64,
                    formatted: format_bytes(bytes),
                }
            })
            .collect()
    }

    /// Merge several roots into one entry (downloads, trash)
    fn single_usage(&self, kind: CleaningKind) -> Option<PathUsage> {
        let usages = self.usage(kind);
        let first = usages.first()?.path.clone();
        let bytes = usages.iter().map(|u| u.bytes).sum();
        Some(PathUsage {
            path: first,
            bytes,
            files: usages.iter().map(|u| u.files).sum(),
            formatted: format_bytes(bytes),
        })
    }

    /// Largest regular files under the large-file root
    pub fn large_files(&self) -> Vec<LargeFile> {
        let Some(root) = &self.paths.large_file_root else {
            return Vec::new();
        };
        let mut files: Vec<LargeFile> = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !SKIP_ROOTS.iter().any(|s| e.path().starts_with(s)))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let md = e.metadata().ok()?;
                if md.len() < self.large_file_min_bytes {
                    return None;
                }
                Some(LargeFile {
                    path: e.path().display().to_string(),
                    bytes: md.len(),
                    formatted: format_bytes(md.len()),
                    modified: md.modified().ok().map(DateTime::<Utc>::from),
                })
            })
            .collect();
        files.sort_by(|a, b| b.bytes.cmp(&a.bytes).then_with(|| a.path.cmp(&b.path)));
        files.truncate(self.large_file_count);
        files
    }

    /// Measure what a clean would reclaim. Blocking.
    pub fn analyze(&self) -> CleanupAnalysis {
        let temp = self.usage(CleaningKind::TempFiles);
        let browser_caches = self.usage(CleaningKind::BrowserCache);
        let logs = self.usage(CleaningKind::Logs);
        let downloads = self.single_usage(CleaningKind::Downloads);
        let recycle_bin = self.single_usage(CleaningKind::RecycleBin);

        let total: u64 = temp
            .iter()
            .chain(&browser_caches)
            .chain(&logs)
            .chain(downloads.iter())
            .chain(recycle_bin.iter())
            .map(|u| u.bytes)
            .sum();

        let disk_space = crate::snapshot::collect_disks()
            .into_iter()
            .map(|d| DiskSpace {
                used_percent: (d.used_percent() * 10.0).round() / 10.0,
                mount: d.mount,
                total_bytes: d.total_bytes,
                free_bytes: d.available_bytes,
            })
            .collect();

        CleanupAnalysis {
            temp,
            browser_caches,
            logs,
            downloads,
            recycle_bin,
            large_files: self.large_files(),
            disk_space,
            total_reclaimable_bytes: total,
            total_reclaimable: format_bytes(total),
        }
    }

    /// Remove (or count, on dry run) old files of the requested kinds. Blocking.
    pub fn clean(&self, request: &CleanRequest) -> CleanSummary {
        let cutoff = request
            .older_than_secs
            .map(Duration::from_secs)
            .unwrap_or(self.min_age)
            .max(self.min_age);

        let mut kinds = request.kinds.clone();
        kinds.sort();
        kinds.dedup();

        let mut summary = CleanSummary {
            dry_run: request.dry_run,
            ..Default::default()
        };

        for kind in kinds {
            for target in self.targets(kind) {
                for file in self.removable(kind, &target, cutoff) {
                    if request.dry_run {
                        summary.removed_files += 1;
                        summary.freed_bytes += file.bytes;
                        continue;
                    }
                    match fs::remove_file(&file.path) {
                        Ok(()) => {
                            summary.removed_files += 1;
                            summary.freed_bytes += file.bytes;
                        }
                        Err(e) => {
                            debug!("Could not remove {}: {}", file.path.display(), e);
                            summary.failed += 1;
                        }
                    }
                }
            }
        }

        summary.freed = format_bytes(summary.freed_bytes);
        info!(
            "  Cleanup{}: {} files, {} freed, {} failed",
            if summary.dry_run { " (dry run)" } else { "" },
            summary.removed_files,
            summary.freed,
            summary.failed
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(min_age_secs: u64) -> CleanerConfig {
        CleanerConfig {
            min_age_secs,
            large_file_min_mb: 1,
            ..Default::default()
        }
    }

    fn write(path: &Path, bytes: usize) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, vec![b'x'; bytes]).unwrap();
    }

    fn layout(root: &Path) -> CleanerPaths {
        let cache = root.join("cache");
        CleanerPaths {
            temp_roots: vec![root.join("tmp"), cache.clone()],
            browser_caches: vec![cache.join("chromium")],
            log_dirs: vec![root.join("log")],
            app_data: Some(root.join("share")),
            downloads: Some(root.join("Downloads")),
            trash: Some(root.join("share/Trash/files")),
            large_file_root: Some(root.join("home")),
        }
    }

    #[test]
    fn test_rotated_log_pattern() {
        let re = Regex::new(ROTATED_LOG_PATTERN).unwrap();
        assert!(re.is_match("syslog.log.1"));
        assert!(re.is_match("app.log.2.gz"));
        assert!(re.is_match("kern.3.gz"));
        assert!(!re.is_match("app.log"));
        assert!(!re.is_match("notes.txt"));
    }

    #[test]
    fn test_analyze_separates_kinds() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(&root.join("tmp/a.tmp"), 100);
        write(&root.join("cache/thumbs/b"), 50);
        write(&root.join("cache/chromium/Default/Cache/c"), 300);
        write(&root.join("log/app.log"), 10);
        write(&root.join("log/app.log.1"), 20);
        write(&root.join("share/someapp/logs/run.txt"), 5);
        write(&root.join("share/Trash/files/old.doc"), 7);

        let cleaner = Cleaner::new(layout(root), &config(0)).unwrap();
        let analysis = cleaner.analyze();

        let temp_bytes: u64 = analysis.temp.iter().map(|u| u.bytes).sum();
        assert_eq!(temp_bytes, 150);
        assert_eq!(analysis.browser_caches[0].bytes, 300);
        let log_bytes: u64 = analysis.logs.iter().map(|u| u.bytes).sum();
        assert_eq!(log_bytes, 25);
        assert_eq!(analysis.recycle_bin.as_ref().map(|u| u.files), Some(1));
        // Downloads dir does not exist
        assert!(analysis.downloads.is_none());
        assert_eq!(analysis.total_reclaimable_bytes, 150 + 300 + 25 + 7);
    }

    #[test]
    fn test_dry_run_keeps_files() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(&root.join("tmp/a.tmp"), 100);

        let cleaner = Cleaner::new(layout(root), &config(0)).unwrap();
        let summary = cleaner.clean(&CleanRequest {
            kinds: vec![CleaningKind::TempFiles],
            dry_run: true,
            older_than_secs: None,
        });
        assert_eq!(summary.removed_files, 1);
        assert_eq!(summary.freed_bytes, 100);
        assert!(summary.dry_run);
        assert!(root.join("tmp/a.tmp").exists());
    }

    #[test]
    fn test_clean_removes_files_not_dirs() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(&root.join("tmp/sub/a.tmp"), 100);
        write(&root.join("log/app.log"), 10);
        write(&root.join("log/app.log.1"), 20);

        let cleaner = Cleaner::new(layout(root), &config(0)).unwrap();
        let summary = cleaner.clean(&CleanRequest {
            kinds: vec![CleaningKind::TempFiles, CleaningKind::Logs, CleaningKind::Logs],
            dry_run: false,
            older_than_secs: None,
        });
        assert_eq!(summary.removed_files, 2);
        assert_eq!(summary.freed_bytes, 120);
        assert_eq!(summary.failed, 0);
        assert!(root.join("tmp/sub").is_dir());
        assert!(root.join("log/app.log").exists());
        assert!(!root.join("log/app.log.1").exists());
    }

    #[test]
    fn test_young_files_survive() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(&root.join("tmp/fresh.tmp"), 100);

        let cleaner = Cleaner::new(layout(root), &config(3600)).unwrap();
        // a shorter request cannot undercut the configured minimum
        let summary = cleaner.clean(&CleanRequest {
            kinds: vec![CleaningKind::TempFiles],
            dry_run: false,
            older_than_secs: Some(0),
        });
        assert_eq!(summary.removed_files, 0);
        assert!(root.join("tmp/fresh.tmp").exists());
    }

    #[test]
    fn test_large_files_sorted_and_capped() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let mb = 1024 * 1024;
        write(&root.join("home/small.bin"), 1000);
        write(&root.join("home/one.bin"), mb + 1);
        write(&root.join("home/deep/two.bin"), 2 * mb);

        let mut cfg = config(0);
        cfg.large_file_count = 1;
        let cleaner = Cleaner::new(layout(root), &cfg).unwrap();
        let files = cleaner.large_files();
        assert_eq!(files.len(), 1);
        assert!(files[0].path.ends_with("two.bin"));
    }
}
