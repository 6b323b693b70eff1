//! Requirement checks run before any destructive action.

use anyhow::Result;
use pibake_error::BakeError;
use std::path::{Path, PathBuf};

/// External tools the pipeline shells out to.
pub const REQUIRED_TOOLS: &[&str] = &[
    "parted",
    "losetup",
    "wipefs",
    "partprobe",
    "mkfs.vfat",
    "mkfs.ext4",
    "blkid",
    "bsdtar",
    "arch-chroot",
];

/// Binfmt helper needed to chroot into an aarch64 rootfs from a foreign host.
pub const EMULATOR: &str = "qemu-aarch64-static";

/// Host inputs for the checks; injectable so tests never depend on the
/// machine they run on.
#[derive(Debug, Clone)]
pub struct PreflightConfig {
    pub required_binaries: Vec<String>,
    pub path_env: String,
    pub host_arch: String,
    pub effective_uid: u32,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            required_binaries: REQUIRED_TOOLS.iter().map(|t| t.to_string()).collect(),
            path_env: std::env::var("PATH").unwrap_or_default(),
            host_arch: std::env::consts::ARCH.to_string(),
            effective_uid: nix::unistd::Uid::effective().as_raw(),
        }
    }
}

pub fn run() -> Result<()> {
    run_with(&PreflightConfig::default())
}

pub fn run_with(cfg: &PreflightConfig) -> Result<()> {
    log::info!("🧪 Preflight checks");

    if cfg.effective_uid != 0 {
        return Err(BakeError::NotRoot.into());
    }

    for tool in &cfg.required_binaries {
        if find_executable_in_path(tool, &cfg.path_env).is_none() {
            return Err(BakeError::MissingTool(tool.clone()).into());
        }
        log::info!("✅ {}", tool);
    }

    if cfg.host_arch != "aarch64" && find_executable_in_path(EMULATOR, &cfg.path_env).is_none() {
        return Err(BakeError::MissingEmulator(EMULATOR.to_string()).into());
    }

    log::info!("✅ Preflight complete");
    Ok(())
}

fn find_executable_in_path(bin: &str, path_env: &str) -> Option<PathBuf> {
    for dir in path_env.split(':').filter(|d| !d.is_empty()) {
        let candidate = Path::new(dir).join(bin);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
