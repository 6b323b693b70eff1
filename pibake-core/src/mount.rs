//! Target filesystem mounting: root + boot, then host bind-mounts for the
//! chroot.

use crate::cleanup::CleanupGuard;
use crate::partition::PartitionSet;
use anyhow::{Context, Result};
use log::info;
use pibake_hal::{InstallerHal, MountOptions};
use std::fs;
use std::path::{Path, PathBuf};

/// Host directories exposed inside the chroot, in mount order.
pub const BIND_DIRS: &[&str] = &["dev", "dev/pts", "proc", "sys"];

/// Mount root then boot beneath a unique temporary directory. Registers
/// every mount (and the directory) with the guard.
pub fn mount_target(
    hal: &dyn InstallerHal,
    set: &PartitionSet,
    guard: &mut CleanupGuard,
    dry_run: bool,
) -> Result<PathBuf> {
    // In dry-run mode nothing is mounted, so no directory is created either;
    // the path only feeds the DRY RUN log lines.
    let work_dir = if dry_run {
        std::env::temp_dir().join("pibake-dry-run")
    } else {
        let dir = tempfile::Builder::new()
            .prefix("pibake-")
            .tempdir()
            .context("failed to create mount-point directory")?
            .keep();
        guard.set_work_dir(&dir);
        dir
    };

    info!("📂 Mounting {} at {}", set.root, work_dir.display());
    hal.mount_device(
        Path::new(&set.root),
        &work_dir,
        Some("ext4"),
        MountOptions::new(),
        dry_run,
    )
    .map_err(anyhow::Error::new)
    .with_context(|| format!("failed to mount root partition {}", set.root))?;
    guard.push_mount(&work_dir);

    let boot = work_dir.join("boot");
    if !dry_run {
        fs::create_dir_all(&boot)?;
    }
    info!("📂 Mounting {} at {}", set.boot, boot.display());
    hal.mount_device(
        Path::new(&set.boot),
        &boot,
        Some("vfat"),
        MountOptions::new(),
        dry_run,
    )
    .map_err(anyhow::Error::new)
    .with_context(|| format!("failed to mount boot partition {}", set.boot))?;
    guard.push_mount(&boot);

    Ok(work_dir)
}

/// Bind host /dev, /dev/pts, /proc and /sys into the target for the chroot.
pub fn bind_host_dirs(
    hal: &dyn InstallerHal,
    root: &Path,
    guard: &mut CleanupGuard,
    dry_run: bool,
) -> Result<()> {
    for dir in BIND_DIRS {
        let source = Path::new("/").join(dir);
        let target = root.join(dir);
        if !dry_run {
            fs::create_dir_all(&target)?;
        }
        hal.bind_mount(&source, &target, dry_run)
            .map_err(anyhow::Error::new)
            .with_context(|| format!("failed to bind-mount {}", source.display()))?;
        guard.push_mount(&target);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::partition_set;
    use pibake_hal::{FakeHal, Operation};

    #[test]
    fn mounts_root_then_boot_under_a_fresh_dir() {
        let hal = FakeHal::new();
        let mut guard = CleanupGuard::new();
        let set = partition_set("/dev/loop7");

        let root = mount_target(&hal, &set, &mut guard, false).unwrap();
        assert!(root.exists());

        let ops = hal.operations();
        assert_eq!(ops.len(), 2);
        assert!(
            matches!(&ops[0], Operation::Mount { device, target, fstype }
                if device == Path::new("/dev/loop7p2") && target == &root && fstype.as_deref() == Some("ext4"))
        );
        assert!(
            matches!(&ops[1], Operation::Mount { device, target, fstype }
                if device == Path::new("/dev/loop7p1") && target == &root.join("boot") && fstype.as_deref() == Some("vfat"))
        );

        guard.teardown(&hal, false);
        assert!(!hal.is_path_mounted(&root));
        assert!(!hal.is_path_mounted(&root.join("boot")));
    }

    #[test]
    fn dry_run_creates_no_directories() {
        let hal = FakeHal::new();
        let mut guard = CleanupGuard::new();
        let set = partition_set("/dev/loop7");

        let root = mount_target(&hal, &set, &mut guard, true).unwrap();
        assert!(!root.exists());
        assert!(!root.join("boot").exists());

        bind_host_dirs(&hal, &root, &mut guard, true).unwrap();
        assert!(!root.exists());

        guard.teardown(&hal, true);
        assert!(!root.exists());
    }

    #[test]
    fn binds_host_dirs_in_order() {
        let hal = FakeHal::new();
        let mut guard = CleanupGuard::new();
        let dir = tempfile::tempdir().unwrap();

        bind_host_dirs(&hal, dir.path(), &mut guard, false).unwrap();

        let binds: Vec<_> = hal
            .operations()
            .into_iter()
            .filter_map(|op| match op {
                Operation::BindMount { source, .. } => Some(source),
                _ => None,
            })
            .collect();
        assert_eq!(
            binds,
            vec![
                PathBuf::from("/dev"),
                PathBuf::from("/dev/pts"),
                PathBuf::from("/proc"),
                PathBuf::from("/sys"),
            ]
        );
    }
}
