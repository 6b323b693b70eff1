//! Static boot configuration for the Pi firmware and the booted system:
//! config.txt, cmdline.txt and fstab.

use anyhow::{Context, Result};
use log::info;
use pibake_hal::InstallerHal;
use std::fs;
use std::path::Path;

/// Firmware settings for the aarch64 Arch ARM kernel.
const CONFIG_TXT: &str = "\
# pibake generated
arm_64bit=1
enable_uart=1
dtoverlay=vc4-kms-v3d
max_framebuffers=2
disable_overscan=1
gpu_mem=128
";

/// Kernel command line. Root is referenced by UUID so the image boots from
/// any slot the card lands in.
fn cmdline(root_uuid: &str) -> String {
    format!(
        "root=UUID={} rw rootwait console=serial0,115200 console=tty1 fsck.repair=yes\n",
        root_uuid
    )
}

fn fstab(boot_uuid: &str, root_uuid: &str) -> String {
    format!(
        "# <device>  <dir>  <type>  <options>  <dump>  <fsck>\n\
         UUID={}  /      ext4  defaults,noatime  0  1\n\
         UUID={}  /boot  vfat  defaults          0  2\n",
        root_uuid, boot_uuid
    )
}

/// Filesystem UUIDs of the formatted boot and root partitions.
#[derive(Debug, Clone)]
pub struct PartitionUuids {
    pub boot: String,
    pub root: String,
}

/// Probe the UUIDs of the formatted partitions. In dry-run mode the
/// partitions were never created, so placeholders stand in and `blkid` is
/// not consulted.
pub fn probe_uuids(
    hal: &dyn InstallerHal,
    boot: &str,
    root: &str,
    dry_run: bool,
) -> Result<PartitionUuids> {
    if dry_run {
        info!("DRY RUN: blkid {} / {}", boot, root);
        return Ok(PartitionUuids {
            boot: "XXXX-XXXX".to_string(),
            root: "00000000-0000-0000-0000-000000000000".to_string(),
        });
    }
    Ok(PartitionUuids {
        boot: hal
            .blkid_uuid(Path::new(boot))
            .map_err(anyhow::Error::new)
            .with_context(|| format!("blkid failed for {}", boot))?,
        root: hal
            .blkid_uuid(Path::new(root))
            .map_err(anyhow::Error::new)
            .with_context(|| format!("blkid failed for {}", root))?,
    })
}

/// Write config.txt and cmdline.txt into the mounted boot partition and
/// fstab into the mounted root.
pub fn write(root_dir: &Path, uuids: &PartitionUuids, dry_run: bool) -> Result<()> {
    if dry_run {
        info!("DRY RUN: write config.txt, cmdline.txt and fstab");
        return Ok(());
    }
    let boot_dir = root_dir.join("boot");
    info!("📝 Writing boot configuration to {}", boot_dir.display());
    fs::write(boot_dir.join("config.txt"), CONFIG_TXT)?;
    fs::write(boot_dir.join("cmdline.txt"), cmdline(&uuids.root))?;

    let etc = root_dir.join("etc");
    fs::create_dir_all(&etc)?;
    fs::write(etc.join("fstab"), fstab(&uuids.boot, &uuids.root))?;
    Ok(())
}
