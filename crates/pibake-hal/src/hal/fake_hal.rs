//! Fake HAL implementation for testing.
//!
//! Records every operation without executing it, so the pipeline can be
//! exercised in CI without root privileges or real block devices.

use super::{
    ArchiveOps, ChrootOps, FormatOps, FormatOptions, LoopOps, MountOps, MountOptions, PartedOp,
    PartedOptions, PartitionOps, ProbeOps, SystemOps, WipeFsOptions,
};
use crate::{HalError, HalResult};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Operation records for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Mount {
        device: PathBuf,
        target: PathBuf,
        fstype: Option<String>,
    },
    BindMount {
        source: PathBuf,
        target: PathBuf,
    },
    UnmountDetach {
        target: PathBuf,
    },
    FormatVfat {
        device: PathBuf,
        label: String,
    },
    FormatExt4 {
        device: PathBuf,
    },
    WipeFsAll {
        disk: PathBuf,
    },
    Parted {
        disk: PathBuf,
        op: PartedOp,
    },
    Partprobe {
        disk: PathBuf,
    },
    LosetupAttach {
        image: PathBuf,
        scan_partitions: bool,
        loop_device: String,
    },
    LosetupDetach {
        loop_device: String,
    },
    LsblkMountpoints {
        disk: PathBuf,
    },
    BlkidUuid {
        device: PathBuf,
    },
    ExtractTar {
        archive: PathBuf,
        dest: PathBuf,
    },
    ChrootExec {
        root: PathBuf,
        argv: Vec<String>,
    },
    Sync,
    UdevSettle,
}

#[derive(Debug, Default)]
struct FakeHalState {
    operations: Vec<Operation>,
    mounted_paths: HashSet<PathBuf>,
    attached_loops: HashSet<String>,
    uuids: HashMap<PathBuf, String>,
    mountpoints: HashMap<PathBuf, Vec<PathBuf>>,
    fail_partprobe: bool,
    fail_chroot_for: Option<String>,
}

/// Fake HAL implementation that records operations without executing them.
#[derive(Debug, Clone, Default)]
pub struct FakeHal {
    state: Arc<Mutex<FakeHalState>>,
}

impl FakeHal {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded operations, in order.
    pub fn operations(&self) -> Vec<Operation> {
        self.state.lock().unwrap().operations.clone()
    }

    pub fn operation_count(&self) -> usize {
        self.state.lock().unwrap().operations.len()
    }

    pub fn has_operation(&self, check: impl Fn(&Operation) -> bool) -> bool {
        self.state.lock().unwrap().operations.iter().any(check)
    }

    /// Canned `blkid` answer for a device.
    pub fn set_uuid(&self, device: impl Into<PathBuf>, uuid: impl Into<String>) {
        self.state
            .lock()
            .unwrap()
            .uuids
            .insert(device.into(), uuid.into());
    }

    /// Canned `lsblk` mount points for a disk.
    pub fn set_mountpoints(&self, disk: impl Into<PathBuf>, mountpoints: Vec<PathBuf>) {
        self.state
            .lock()
            .unwrap()
            .mountpoints
            .insert(disk.into(), mountpoints);
    }

    /// Make every `partprobe` call fail, simulating a busy device.
    pub fn fail_partprobe(&self) {
        self.state.lock().unwrap().fail_partprobe = true;
    }

    /// Make chroot commands whose argv contains `needle` fail.
    pub fn fail_chroot_containing(&self, needle: impl Into<String>) {
        self.state.lock().unwrap().fail_chroot_for = Some(needle.into());
    }

    pub fn is_path_mounted(&self, path: &Path) -> bool {
        self.state.lock().unwrap().mounted_paths.contains(path)
    }

    pub fn attached_loop_count(&self) -> usize {
        self.state.lock().unwrap().attached_loops.len()
    }

    fn record(&self, op: Operation) {
        self.state.lock().unwrap().operations.push(op);
    }
}

impl MountOps for FakeHal {
    fn mount_device(
        &self,
        device: &Path,
        target: &Path,
        fstype: Option<&str>,
        _options: MountOptions,
        _dry_run: bool,
    ) -> HalResult<()> {
        let mut state = self.state.lock().unwrap();
        state.operations.push(Operation::Mount {
            device: device.to_path_buf(),
            target: target.to_path_buf(),
            fstype: fstype.map(String::from),
        });
        state.mounted_paths.insert(target.to_path_buf());
        Ok(())
    }

    fn bind_mount(&self, source: &Path, target: &Path, _dry_run: bool) -> HalResult<()> {
        let mut state = self.state.lock().unwrap();
        state.operations.push(Operation::BindMount {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
        });
        state.mounted_paths.insert(target.to_path_buf());
        Ok(())
    }

    fn unmount_detach(&self, target: &Path, _dry_run: bool) -> HalResult<()> {
        let mut state = self.state.lock().unwrap();
        state.operations.push(Operation::UnmountDetach {
            target: target.to_path_buf(),
        });
        state.mounted_paths.remove(target);
        Ok(())
    }

    fn is_mounted(&self, path: &Path) -> HalResult<bool> {
        Ok(self.state.lock().unwrap().mounted_paths.contains(path))
    }
}

impl FormatOps for FakeHal {
    fn format_vfat(&self, device: &Path, label: &str, opts: &FormatOptions) -> HalResult<()> {
        if !opts.dry_run && !opts.confirmed {
            return Err(HalError::NotConfirmed);
        }
        self.record(Operation::FormatVfat {
            device: device.to_path_buf(),
            label: label.to_string(),
        });
        Ok(())
    }

    fn format_ext4(&self, device: &Path, opts: &FormatOptions) -> HalResult<()> {
        if !opts.dry_run && !opts.confirmed {
            return Err(HalError::NotConfirmed);
        }
        self.record(Operation::FormatExt4 {
            device: device.to_path_buf(),
        });
        Ok(())
    }
}

impl PartitionOps for FakeHal {
    fn wipefs_all(&self, disk: &Path, opts: &WipeFsOptions) -> HalResult<()> {
        if !opts.dry_run && !opts.confirmed {
            return Err(HalError::NotConfirmed);
        }
        self.record(Operation::WipeFsAll {
            disk: disk.to_path_buf(),
        });
        Ok(())
    }

    fn parted(&self, disk: &Path, op: PartedOp, opts: &PartedOptions) -> HalResult<String> {
        if !opts.dry_run && !opts.confirmed {
            return Err(HalError::NotConfirmed);
        }
        self.record(Operation::Parted {
            disk: disk.to_path_buf(),
            op,
        });
        Ok(String::new())
    }

    fn partprobe(&self, disk: &Path, _dry_run: bool) -> HalResult<()> {
        let fail = {
            let mut state = self.state.lock().unwrap();
            state.operations.push(Operation::Partprobe {
                disk: disk.to_path_buf(),
            });
            state.fail_partprobe
        };
        if fail {
            return Err(HalError::DeviceBusy);
        }
        Ok(())
    }
}

impl LoopOps for FakeHal {
    fn losetup_attach(&self, image: &Path, scan_partitions: bool) -> HalResult<String> {
        let mut state = self.state.lock().unwrap();
        let loop_device = format!("/dev/loop{}", 7 + state.attached_loops.len());
        state.operations.push(Operation::LosetupAttach {
            image: image.to_path_buf(),
            scan_partitions,
            loop_device: loop_device.clone(),
        });
        state.attached_loops.insert(loop_device.clone());
        Ok(loop_device)
    }

    fn losetup_detach(&self, loop_device: &str, _dry_run: bool) -> HalResult<()> {
        let mut state = self.state.lock().unwrap();
        state.operations.push(Operation::LosetupDetach {
            loop_device: loop_device.to_string(),
        });
        state.attached_loops.remove(loop_device);
        Ok(())
    }
}

impl ProbeOps for FakeHal {
    fn lsblk_mountpoints(&self, disk: &Path) -> HalResult<Vec<PathBuf>> {
        let mut state = self.state.lock().unwrap();
        state.operations.push(Operation::LsblkMountpoints {
            disk: disk.to_path_buf(),
        });
        Ok(state.mountpoints.get(disk).cloned().unwrap_or_default())
    }

    fn blkid_uuid(&self, device: &Path) -> HalResult<String> {
        let mut state = self.state.lock().unwrap();
        state.operations.push(Operation::BlkidUuid {
            device: device.to_path_buf(),
        });
        if let Some(uuid) = state.uuids.get(device) {
            return Ok(uuid.clone());
        }
        let name = device
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dev".to_string());
        Ok(format!("fake-uuid-{}", name))
    }
}

impl ArchiveOps for FakeHal {
    fn extract_tar(&self, archive: &Path, dest: &Path, _dry_run: bool) -> HalResult<()> {
        self.record(Operation::ExtractTar {
            archive: archive.to_path_buf(),
            dest: dest.to_path_buf(),
        });
        Ok(())
    }
}

impl ChrootOps for FakeHal {
    fn chroot_exec(&self, root: &Path, argv: &[String], _dry_run: bool) -> HalResult<()> {
        let fail = {
            let mut state = self.state.lock().unwrap();
            state.operations.push(Operation::ChrootExec {
                root: root.to_path_buf(),
                argv: argv.to_vec(),
            });
            state
                .fail_chroot_for
                .as_ref()
                .is_some_and(|needle| argv.iter().any(|a| a.contains(needle.as_str())))
        };
        if fail {
            return Err(HalError::CommandFailed {
                program: "arch-chroot".to_string(),
                code: Some(1),
                stderr: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

impl SystemOps for FakeHal {
    fn sync(&self) -> HalResult<()> {
        self.record(Operation::Sync);
        Ok(())
    }

    fn udev_settle(&self) -> HalResult<()> {
        self.record(Operation::UdevSettle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_operations_in_order() {
        let hal = FakeHal::new();
        hal.mount_device(
            Path::new("/dev/loop7p2"),
            Path::new("/mnt/root"),
            Some("ext4"),
            MountOptions::new(),
            false,
        )
        .unwrap();
        hal.unmount_detach(Path::new("/mnt/root"), false).unwrap();

        let ops = hal.operations();
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0], Operation::Mount { .. }));
        assert!(matches!(ops[1], Operation::UnmountDetach { .. }));
    }

    #[test]
    fn mount_state_tracks_targets() {
        let hal = FakeHal::new();
        let target = Path::new("/mnt/root");
        assert!(!hal.is_mounted(target).unwrap());
        hal.bind_mount(Path::new("/dev"), target, false).unwrap();
        assert!(hal.is_mounted(target).unwrap());
        hal.unmount_detach(target, false).unwrap();
        assert!(!hal.is_mounted(target).unwrap());
    }

    #[test]
    fn loop_attach_and_detach_balance() {
        let hal = FakeHal::new();
        let dev = hal.losetup_attach(Path::new("/tmp/out.img"), true).unwrap();
        assert_eq!(hal.attached_loop_count(), 1);
        hal.losetup_detach(&dev, false).unwrap();
        assert_eq!(hal.attached_loop_count(), 0);
    }

    #[test]
    fn format_refuses_without_confirmation() {
        let hal = FakeHal::new();
        let err = hal
            .format_ext4(Path::new("/dev/sda2"), &FormatOptions::new(false, false))
            .unwrap_err();
        assert!(matches!(err, HalError::NotConfirmed));
    }
}
