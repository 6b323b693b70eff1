//! Two-partition MBR layout: FAT32 boot + ext4 root.

use anyhow::{Context, Result};
use log::{info, warn};
use pibake_hal::{
    path::partition_path, FormatOptions, InstallerHal, PartedOp, PartedOptions, WipeFsOptions,
};
use std::path::Path;
use std::time::Duration;

/// Bounded delay for the kernel to register freshly created partition nodes.
const SETTLE_DELAY: Duration = Duration::from_secs(2);

pub const BOOT_LABEL: &str = "BOOT";

#[derive(Debug, Clone, Copy)]
pub struct PartitionLayout {
    pub boot_size_mib: u64,
}

impl Default for PartitionLayout {
    fn default() -> Self {
        Self { boot_size_mib: 256 }
    }
}

/// Boot and root partition device paths for a disk, following the
/// loop/nvme/mmcblk naming rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSet {
    pub boot: String,
    pub root: String,
}

pub fn partition_set(device: &str) -> PartitionSet {
    PartitionSet {
        boot: partition_path(device, 1),
        root: partition_path(device, 2),
    }
}

/// The ordered parted operations for the layout. Pure; the execution order
/// is exactly this list.
pub fn partition_plan(layout: &PartitionLayout) -> Vec<PartedOp> {
    let boot_end = format!("{}MiB", 1 + layout.boot_size_mib);
    vec![
        PartedOp::MkLabel {
            label: "msdos".to_string(),
        },
        PartedOp::MkPart {
            part_type: "primary".to_string(),
            fs_type: "fat32".to_string(),
            start: "1MiB".to_string(),
            end: boot_end.clone(),
        },
        PartedOp::SetFlag {
            part_num: 1,
            flag: "boot".to_string(),
            state: "on".to_string(),
        },
        PartedOp::MkPart {
            part_type: "primary".to_string(),
            fs_type: "ext4".to_string(),
            start: boot_end,
            end: "100%".to_string(),
        },
    ]
}

/// Write the partition table. Strictly ordered; there is no rollback of a
/// partially written table.
pub fn apply(
    hal: &dyn InstallerHal,
    device: &str,
    layout: &PartitionLayout,
    dry_run: bool,
) -> Result<()> {
    let disk = Path::new(device);
    info!("🔪 Creating MBR partition table on {}", device);

    hal.wipefs_all(disk, &WipeFsOptions::new(dry_run, true))
        .map_err(anyhow::Error::new)
        .context("wipefs failed")?;

    for op in partition_plan(layout) {
        hal.parted(disk, op, &PartedOptions::new(dry_run, true))
            .map_err(anyhow::Error::new)
            .context("partitioning failed")?;
    }

    settle(hal, disk, dry_run);
    Ok(())
}

/// Wait for the kernel to surface the new partition devices. The explicit
/// re-probe is advisory: partition table reloads race with udev and a busy
/// device often re-reads on its own, so failure here is never fatal.
fn settle(hal: &dyn InstallerHal, disk: &Path, dry_run: bool) {
    if !dry_run {
        std::thread::sleep(SETTLE_DELAY);
    }
    if let Err(err) = hal.udev_settle() {
        log::debug!("udev settle failed: {}", err);
    }
    if let Err(err) = hal.partprobe(disk, dry_run) {
        warn!("⚠️ partprobe {} failed (continuing): {}", disk.display(), err);
    }
}

/// Format both partitions. Failure here is fatal.
pub fn format(hal: &dyn InstallerHal, set: &PartitionSet, dry_run: bool) -> Result<()> {
    info!("✨ Formatting boot partition (FAT32): {}", set.boot);
    hal.format_vfat(
        Path::new(&set.boot),
        BOOT_LABEL,
        &FormatOptions::new(dry_run, true),
    )
    .map_err(anyhow::Error::new)
    .context("mkfs.vfat failed")?;

    info!("✨ Formatting root partition (ext4): {}", set.root);
    hal.format_ext4(
        Path::new(&set.root),
        &FormatOptions::new(dry_run, true).with_args(vec!["-F".to_string()]),
    )
    .map_err(anyhow::Error::new)
    .context("mkfs.ext4 failed")?;

    Ok(())
}
