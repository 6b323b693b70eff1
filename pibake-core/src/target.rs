//! Target resolution: real block device vs. loop-mounted image file.

use anyhow::{Context, Result};
use log::info;
use pibake_error::BakeError;
use pibake_hal::InstallerHal;
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};

const GIB: u64 = 1024 * 1024 * 1024;

/// A resolved provisioning target. Exactly one variant holds after
/// resolution; an image file additionally owns its loop device for the
/// lifetime of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    BlockDevice { device: PathBuf },
    ImageFile { path: PathBuf, loop_device: String },
}

impl Target {
    /// The device path the partitioner operates on.
    pub fn device_path(&self) -> String {
        match self {
            Target::BlockDevice { device } => device.display().to_string(),
            Target::ImageFile { loop_device, .. } => loop_device.clone(),
        }
    }

    pub fn loop_device(&self) -> Option<&str> {
        match self {
            Target::BlockDevice { .. } => None,
            Target::ImageFile { loop_device, .. } => Some(loop_device),
        }
    }
}

/// The typed confirmation token for a destructive run: the device's base
/// name (`sdb` for `/dev/sdb`).
pub fn confirmation_token(device: &Path) -> String {
    device
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| device.display().to_string())
}

/// Only the exact token proceeds; "", "y", "Yes" and everything else refuse.
pub fn confirmation_accepted(input: &str, device: &Path) -> bool {
    input.trim() == confirmation_token(device)
}

pub fn is_block_device(path: &Path) -> bool {
    use std::os::unix::fs::FileTypeExt;
    fs::metadata(path)
        .map(|m| m.file_type().is_block_device())
        .unwrap_or(false)
}

/// Resolve a user-supplied path, prompting on stdin for block devices.
pub fn resolve(
    hal: &dyn InstallerHal,
    path: &Path,
    image_size_gib: u64,
    dry_run: bool,
) -> Result<Target> {
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    resolve_with_input(hal, path, image_size_gib, dry_run, &mut input)
}

/// Like [`resolve`], with the confirmation input injectable for tests.
pub fn resolve_with_input(
    hal: &dyn InstallerHal,
    path: &Path,
    image_size_gib: u64,
    dry_run: bool,
    input: &mut dyn BufRead,
) -> Result<Target> {
    if is_block_device(path) {
        confirm_gate(path, input)?;
        unmount_existing(hal, path, dry_run);
        return Ok(Target::BlockDevice {
            device: path.to_path_buf(),
        });
    }
    create_image_target(hal, path, image_size_gib, dry_run)
}

fn confirm_gate(device: &Path, input: &mut dyn BufRead) -> Result<()> {
    let token = confirmation_token(device);

    println!();
    println!("⚠️  WARNING ⚠️");
    println!("You are about to ERASE {}", device.display());
    println!("This action is IRREVERSIBLE.");
    println!("Type the device name ({}) to continue:", token);

    let mut line = String::new();
    input.read_line(&mut line)?;

    if !confirmation_accepted(&line, device) {
        return Err(BakeError::ConfirmationMismatch.into());
    }
    Ok(())
}

/// Unmount anything currently mounted from the device. Best-effort:
/// already-unmounted is not an error.
fn unmount_existing(hal: &dyn InstallerHal, device: &Path, dry_run: bool) {
    let mountpoints = match hal.lsblk_mountpoints(device) {
        Ok(mps) => mps,
        Err(err) => {
            log::debug!("lsblk probe failed for {}: {}", device.display(), err);
            return;
        }
    };
    for mp in mountpoints {
        info!("🔌 Unmounting {}", mp.display());
        if let Err(err) = hal.unmount_detach(&mp, dry_run) {
            log::debug!("unmount {} failed: {}", mp.display(), err);
        }
    }
}

fn create_image_target(
    hal: &dyn InstallerHal,
    path: &Path,
    image_size_gib: u64,
    dry_run: bool,
) -> Result<Target> {
    if dry_run {
        info!(
            "DRY RUN: create {} GiB sparse image {}",
            image_size_gib,
            path.display()
        );
        return Ok(Target::ImageFile {
            path: path.to_path_buf(),
            loop_device: "/dev/loop0".to_string(),
        });
    }

    info!(
        "📀 Creating {} GiB sparse image {}",
        image_size_gib,
        path.display()
    );
    let file = fs::File::create(path)
        .with_context(|| format!("Failed to create image file {}", path.display()))?;
    file.set_len(image_size_gib * GIB)
        .context("Failed to size sparse image")?;
    drop(file);

    let loop_device = hal
        .losetup_attach(path, true)
        .map_err(anyhow::Error::new)
        .context("Failed to attach loop device")?;
    info!("🔄 Image attached at {}", loop_device);

    Ok(Target::ImageFile {
        path: path.to_path_buf(),
        loop_device,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pibake_hal::{FakeHal, Operation};

    #[test]
    fn only_exact_token_is_accepted() {
        let dev = Path::new("/dev/sdb");
        assert!(confirmation_accepted("sdb", dev));
        assert!(confirmation_accepted("sdb\n", dev));
        assert!(!confirmation_accepted("", dev));
        assert!(!confirmation_accepted("y", dev));
        assert!(!confirmation_accepted("Yes", dev));
        assert!(!confirmation_accepted("sdb1", dev));
    }

    #[test]
    fn non_device_path_creates_one_file_and_one_loop_binding() {
        let hal = FakeHal::new();
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("out.img");

        // Empty input: no prompt is consulted for image targets.
        let mut input = std::io::empty();
        let mut reader = std::io::BufReader::new(&mut input);
        let target = resolve_with_input(&hal, &img, 8, false, &mut reader).unwrap();

        assert!(img.exists());
        assert_eq!(img.metadata().unwrap().len(), 8 * GIB);
        assert_eq!(hal.attached_loop_count(), 1);
        assert!(matches!(target, Target::ImageFile { .. }));
        assert!(hal.has_operation(|op| matches!(
            op,
            Operation::LosetupAttach {
                scan_partitions: true,
                ..
            }
        )));
    }

    #[test]
    fn dry_run_creates_nothing() {
        let hal = FakeHal::new();
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("out.img");

        let mut input = std::io::empty();
        let mut reader = std::io::BufReader::new(&mut input);
        let target = resolve_with_input(&hal, &img, 8, true, &mut reader).unwrap();

        assert!(!img.exists());
        assert_eq!(hal.attached_loop_count(), 0);
        assert!(matches!(target, Target::ImageFile { .. }));
    }

    #[test]
    fn device_path_follows_target_kind() {
        let block = Target::BlockDevice {
            device: PathBuf::from("/dev/sdb"),
        };
        assert_eq!(block.device_path(), "/dev/sdb");
        assert!(block.loop_device().is_none());

        let image = Target::ImageFile {
            path: PathBuf::from("./out.img"),
            loop_device: "/dev/loop7".to_string(),
        };
        assert_eq!(image.device_path(), "/dev/loop7");
        assert_eq!(image.loop_device(), Some("/dev/loop7"));
    }
}
