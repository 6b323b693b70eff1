//! Run-scoped resource tracking and teardown.
//!
//! Every acquired resource (mounts in order, the loop device, the temporary
//! mount-point directory) is registered here, and a single `teardown` call on
//! every exit path of the run releases them in reverse order. Each step is
//! best-effort: teardown must never mask the run's primary outcome.

use log::info;
use pibake_hal::InstallerHal;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct CleanupGuard {
    mounts: Vec<PathBuf>,
    loop_device: Option<String>,
    work_dir: Option<PathBuf>,
}

impl CleanupGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mount target. Teardown unmounts in reverse registration
    /// order.
    pub fn push_mount(&mut self, target: impl Into<PathBuf>) {
        self.mounts.push(target.into());
    }

    pub fn set_loop_device(&mut self, device: impl Into<String>) {
        self.loop_device = Some(device.into());
    }

    pub fn set_work_dir(&mut self, dir: impl Into<PathBuf>) {
        self.work_dir = Some(dir.into());
    }

    /// Release everything acquired so far. Idempotent: safe to call when
    /// nothing (or only some things) were acquired, and safe to call twice.
    pub fn teardown(&mut self, hal: &dyn InstallerHal, dry_run: bool) {
        if self.mounts.is_empty() && self.loop_device.is_none() && self.work_dir.is_none() {
            return;
        }
        info!("🧹 Cleaning up...");

        for target in std::mem::take(&mut self.mounts).iter().rev() {
            unmount_best_effort(hal, target, dry_run);
        }

        if let Some(loop_device) = self.loop_device.take() {
            if let Err(err) = hal.losetup_detach(&loop_device, dry_run) {
                log::debug!("loop detach {} failed: {}", loop_device, err);
            }
        }

        if let Some(dir) = self.work_dir.take() {
            // Only removes an empty directory; a still-populated mount point
            // stays behind for the operator to inspect.
            if let Err(err) = fs::remove_dir(&dir) {
                log::debug!("remove {} failed: {}", dir.display(), err);
            }
        }

        let _ = hal.udev_settle();
    }
}

fn unmount_best_effort(hal: &dyn InstallerHal, target: &Path, dry_run: bool) {
    match hal.is_mounted(target) {
        Ok(true) => {}
        Ok(false) => return,
        Err(err) => {
            log::debug!("mount probe for {} failed: {}", target.display(), err);
            return;
        }
    }
    if let Err(err) = hal.unmount_detach(target, dry_run) {
        log::debug!("unmount {} failed: {}", target.display(), err);
    }
}
