//! Linux HAL implementation using real system calls and external tools.

use super::{
    ArchiveOps, ChrootOps, FormatOps, FormatOptions, LoopOps, MountOps, MountOptions, PartedOp,
    PartedOptions, PartitionOps, ProbeOps, SystemOps, WipeFsOptions,
};
use crate::{HalError, HalResult};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Real HAL implementation for Linux hosts.
#[derive(Debug, Clone, Default)]
pub struct LinuxHal;

impl LinuxHal {
    pub fn new() -> Self {
        Self
    }
}

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const SYNC_TIMEOUT: Duration = Duration::from_secs(60);
const FORMAT_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const WIPEFS_TIMEOUT: Duration = Duration::from_secs(60);
const PARTED_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const LOSETUP_TIMEOUT: Duration = Duration::from_secs(30);
const EXTRACT_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const CHROOT_TIMEOUT: Duration = Duration::from_secs(60 * 60);

fn map_command_err(program: &str, err: std::io::Error) -> HalError {
    if err.kind() == std::io::ErrorKind::NotFound {
        return HalError::CommandNotFound(program.to_string());
    }
    HalError::Io(err)
}

fn output_failed(program: &str, output: &Output) -> HalError {
    HalError::CommandFailed {
        program: program.to_string(),
        code: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

fn output_with_timeout(program: &str, cmd: &mut Command, timeout: Duration) -> HalResult<Output> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = cmd.spawn().map_err(|e| map_command_err(program, e))?;

    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();

    // Drain pipes concurrently to avoid deadlocks on large output.
    let stdout_handle = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout.take() {
            let _ = out.read_to_end(&mut buf);
        }
        buf
    });
    let stderr_handle = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr.take() {
            let _ = err.read_to_end(&mut buf);
        }
        buf
    });

    let status = match child.wait_timeout(timeout).map_err(HalError::Io)? {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            let _ = stdout_handle.join();
            let _ = stderr_handle.join();
            return Err(HalError::CommandTimeout {
                program: program.to_string(),
                timeout_secs: timeout.as_secs(),
            });
        }
    };

    let stdout = stdout_handle.join().unwrap_or_default();
    let stderr = stderr_handle.join().unwrap_or_default();
    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

fn status_with_timeout(program: &str, cmd: &mut Command, timeout: Duration) -> HalResult<()> {
    let output = output_with_timeout(program, cmd, timeout)?;
    if !output.status.success() {
        return Err(output_failed(program, &output));
    }
    Ok(())
}

fn map_nix_err(err: nix::errno::Errno) -> HalError {
    use nix::errno::Errno;
    match err {
        Errno::EBUSY => HalError::DeviceBusy,
        Errno::EACCES | Errno::EPERM => HalError::PermissionDenied,
        other => HalError::Nix(other),
    }
}

impl MountOps for LinuxHal {
    fn mount_device(
        &self,
        device: &Path,
        target: &Path,
        fstype: Option<&str>,
        options: MountOptions,
        dry_run: bool,
    ) -> HalResult<()> {
        if dry_run {
            log::info!(
                "DRY RUN: mount {} -> {}",
                device.display(),
                target.display()
            );
            return Ok(());
        }

        let flags = nix::mount::MsFlags::empty();
        let data = options.options.as_deref();

        nix::mount::mount(Some(device), target, fstype, flags, data).map_err(map_nix_err)?;

        Ok(())
    }

    fn bind_mount(&self, source: &Path, target: &Path, dry_run: bool) -> HalResult<()> {
        if dry_run {
            log::info!(
                "DRY RUN: mount --bind {} -> {}",
                source.display(),
                target.display()
            );
            return Ok(());
        }

        nix::mount::mount(
            Some(source),
            target,
            None::<&str>,
            nix::mount::MsFlags::MS_BIND,
            None::<&str>,
        )
        .map_err(map_nix_err)?;

        Ok(())
    }

    fn unmount_detach(&self, target: &Path, dry_run: bool) -> HalResult<()> {
        if dry_run {
            log::info!("DRY RUN: umount -l {}", target.display());
            return Ok(());
        }

        nix::mount::umount2(target, nix::mount::MntFlags::MNT_DETACH).map_err(map_nix_err)?;

        Ok(())
    }

    fn is_mounted(&self, path: &Path) -> HalResult<bool> {
        let content = fs::read_to_string("/proc/self/mountinfo")?;
        Ok(mountinfo_contains(&content, path))
    }
}

/// Check whether `path` appears as a mount point in `/proc/self/mountinfo`
/// content. The mount point is field 5; octal escapes cover paths with
/// whitespace.
pub fn mountinfo_contains(content: &str, path: &Path) -> bool {
    let target = path.to_string_lossy();
    let target = target.trim_end_matches('/');
    content.lines().any(|line| {
        line.split_whitespace()
            .nth(4)
            .map(unescape_mount_path)
            .is_some_and(|mp| mp.trim_end_matches('/') == target)
    })
}

fn unescape_mount_path(raw: &str) -> String {
    raw.replace("\\040", " ")
        .replace("\\011", "\t")
        .replace("\\012", "\n")
        .replace("\\134", "\\")
}

impl FormatOps for LinuxHal {
    fn format_vfat(&self, device: &Path, label: &str, opts: &FormatOptions) -> HalResult<()> {
        if opts.dry_run {
            log::info!("DRY RUN: mkfs.vfat {} ({})", device.display(), label);
            return Ok(());
        }
        if !opts.confirmed {
            return Err(HalError::NotConfirmed);
        }

        let mut args: Vec<String> = vec!["-F".to_string(), "32".to_string()];
        args.push("-n".to_string());
        args.push(label.to_string());
        args.extend(opts.extra_args.iter().cloned());
        args.push(device.display().to_string());

        let mut cmd = Command::new("mkfs.vfat");
        cmd.args(&args);
        status_with_timeout("mkfs.vfat", &mut cmd, FORMAT_TIMEOUT)
    }

    fn format_ext4(&self, device: &Path, opts: &FormatOptions) -> HalResult<()> {
        if opts.dry_run {
            log::info!("DRY RUN: mkfs.ext4 {}", device.display());
            return Ok(());
        }
        if !opts.confirmed {
            return Err(HalError::NotConfirmed);
        }

        let mut args = opts.extra_args.clone();
        args.push(device.display().to_string());

        let mut cmd = Command::new("mkfs.ext4");
        cmd.args(&args);
        status_with_timeout("mkfs.ext4", &mut cmd, FORMAT_TIMEOUT)
    }
}

impl PartitionOps for LinuxHal {
    fn wipefs_all(&self, disk: &Path, opts: &WipeFsOptions) -> HalResult<()> {
        if opts.dry_run {
            log::info!("DRY RUN: wipefs -a {}", disk.display());
            return Ok(());
        }
        if !opts.confirmed {
            return Err(HalError::NotConfirmed);
        }

        let mut cmd = Command::new("wipefs");
        cmd.args(["-a"]).arg(disk);
        status_with_timeout("wipefs", &mut cmd, WIPEFS_TIMEOUT)
    }

    fn parted(&self, disk: &Path, op: PartedOp, opts: &PartedOptions) -> HalResult<String> {
        if opts.dry_run {
            log::info!("DRY RUN: parted -s {} {:?}", disk.display(), op);
            return Ok(String::new());
        }
        if !opts.confirmed {
            return Err(HalError::NotConfirmed);
        }

        let mut args: Vec<String> = vec!["-s".to_string(), disk.display().to_string()];
        match op {
            PartedOp::MkLabel { label } => {
                args.push("mklabel".to_string());
                args.push(label);
            }
            PartedOp::MkPart {
                part_type,
                fs_type,
                start,
                end,
            } => {
                args.push("-a".to_string());
                args.push("optimal".to_string());
                args.push("mkpart".to_string());
                args.push(part_type);
                args.push(fs_type);
                args.push(start);
                args.push(end);
            }
            PartedOp::SetFlag {
                part_num,
                flag,
                state,
            } => {
                args.push("set".to_string());
                args.push(part_num.to_string());
                args.push(flag);
                args.push(state);
            }
        }

        let mut cmd = Command::new("parted");
        cmd.args(&args);
        let output = output_with_timeout("parted", &mut cmd, PARTED_TIMEOUT)?;
        if !output.status.success() {
            return Err(output_failed("parted", &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn partprobe(&self, disk: &Path, dry_run: bool) -> HalResult<()> {
        if dry_run {
            log::info!("DRY RUN: partprobe {}", disk.display());
            return Ok(());
        }

        let mut cmd = Command::new("partprobe");
        cmd.arg(disk);
        status_with_timeout("partprobe", &mut cmd, PROBE_TIMEOUT)
    }
}

impl LoopOps for LinuxHal {
    fn losetup_attach(&self, image: &Path, scan_partitions: bool) -> HalResult<String> {
        let mut args = vec!["--show".to_string(), "-f".to_string()];
        if scan_partitions {
            args.push("-P".to_string());
        }
        args.push(image.display().to_string());

        let mut cmd = Command::new("losetup");
        cmd.args(&args);
        let output = output_with_timeout("losetup", &mut cmd, LOSETUP_TIMEOUT)?;

        if !output.status.success() {
            return Err(output_failed("losetup", &output));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn losetup_detach(&self, loop_device: &str, dry_run: bool) -> HalResult<()> {
        if dry_run {
            log::info!("DRY RUN: losetup -d {}", loop_device);
            return Ok(());
        }

        let mut cmd = Command::new("losetup");
        cmd.args(["-d", loop_device]);
        status_with_timeout("losetup", &mut cmd, LOSETUP_TIMEOUT)
    }
}

impl ProbeOps for LinuxHal {
    fn lsblk_mountpoints(&self, disk: &Path) -> HalResult<Vec<PathBuf>> {
        let mut cmd = Command::new("lsblk");
        cmd.args(["-lnpo", "MOUNTPOINT"]).arg(disk);
        let output = output_with_timeout("lsblk", &mut cmd, PROBE_TIMEOUT)?;

        if !output.status.success() {
            return Err(output_failed("lsblk", &output));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(PathBuf::from)
            .collect())
    }

    fn blkid_uuid(&self, device: &Path) -> HalResult<String> {
        let mut cmd = Command::new("blkid");
        cmd.args(["-s", "UUID", "-o", "value"]).arg(device);
        let output = output_with_timeout("blkid", &mut cmd, PROBE_TIMEOUT)?;

        if !output.status.success() {
            return Err(output_failed("blkid", &output));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl ArchiveOps for LinuxHal {
    fn extract_tar(&self, archive: &Path, dest: &Path, dry_run: bool) -> HalResult<()> {
        if dry_run {
            log::info!(
                "DRY RUN: bsdtar -xpf {} -C {}",
                archive.display(),
                dest.display()
            );
            return Ok(());
        }

        let mut cmd = Command::new("bsdtar");
        cmd.arg("-xpf")
            .arg(archive)
            .arg("-C")
            .arg(dest)
            // Keep numeric uids; the target system's passwd is inside the tarball.
            .arg("--numeric-owner");
        status_with_timeout("bsdtar", &mut cmd, EXTRACT_TIMEOUT)
    }
}

impl ChrootOps for LinuxHal {
    fn chroot_exec(&self, root: &Path, argv: &[String], dry_run: bool) -> HalResult<()> {
        if dry_run {
            log::info!(
                "DRY RUN: arch-chroot {} {}",
                root.display(),
                argv.join(" ")
            );
            return Ok(());
        }

        let mut cmd = Command::new("arch-chroot");
        cmd.arg(root).args(argv);
        status_with_timeout("arch-chroot", &mut cmd, CHROOT_TIMEOUT)
    }
}

impl SystemOps for LinuxHal {
    fn sync(&self) -> HalResult<()> {
        let mut cmd = Command::new("sync");
        status_with_timeout("sync", &mut cmd, SYNC_TIMEOUT)
    }

    fn udev_settle(&self) -> HalResult<()> {
        let mut cmd = Command::new("udevadm");
        cmd.arg("settle");
        status_with_timeout("udevadm", &mut cmd, SYNC_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mountinfo_matches_mount_points() {
        let sample = "36 28 0:31 / / rw,relatime - ext4 /dev/sda3 rw\n\
                      37 28 0:32 / /boot rw,relatime - ext4 /dev/sda2 rw\n";
        assert!(mountinfo_contains(sample, Path::new("/")));
        assert!(mountinfo_contains(sample, Path::new("/boot")));
        assert!(!mountinfo_contains(sample, Path::new("/mnt")));
    }

    #[test]
    fn mountinfo_unescapes_paths() {
        let sample = "36 28 0:31 / /mnt/data\\040disk rw,relatime - ext4 /dev/sda3 rw\n";
        assert!(mountinfo_contains(sample, Path::new("/mnt/data disk")));
    }

    #[test]
    fn missing_command_maps_to_command_not_found() {
        let mut cmd = Command::new("definitely-not-a-real-command-4242");
        let err = output_with_timeout(
            "definitely-not-a-real-command-4242",
            &mut cmd,
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, HalError::CommandNotFound(_)));
    }
}
