//! Embeds build metadata reported by `techcared` in `/v1/health`.
//!
//! Packagers building from a tarball can set `TECHCARE_GIT_SHA`, and
//! `SOURCE_DATE_EPOCH` pins the build date for reproducible builds.

use std::env;
use std::process::Command;

fn git_revision() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=8"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let rev = String::from_utf8(output.stdout).ok()?.trim().to_string();
    (!rev.is_empty()).then_some(rev)
}

fn build_date() -> String {
    env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(chrono::Utc::now)
        .format("%Y-%m-%d")
        .to_string()
}

fn main() {
    let revision = env::var("TECHCARE_GIT_SHA")
        .ok()
        .filter(|s| !s.is_empty())
        .or_else(git_revision)
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=TECHCARE_GIT_SHA={}", revision);
    println!("cargo:rustc-env=TECHCARE_BUILD_DATE={}", build_date());
    println!(
        "cargo:rustc-env=TECHCARE_BUILD_TARGET={}",
        env::var("TARGET").unwrap_or_default()
    );
    println!(
        "cargo:rustc-env=TECHCARE_BUILD_PROFILE={}",
        env::var("PROFILE").unwrap_or_default()
    );

    println!("cargo:rerun-if-env-changed=TECHCARE_GIT_SHA");
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
    // A missing path would force a rerun on every build
    for path in ["../../.git/HEAD", "../../.git/index"] {
        if std::path::Path::new(path).exists() {
            println!("cargo:rerun-if-changed={}", path);
        }
    }
}
