//! Full-pipeline tests against the recording fake HAL.

use pibake_core::{bake, BakeConfig};
use pibake_hal::{FakeHal, Operation};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

const GIB: u64 = 1024 * 1024 * 1024;

fn image_config(dir: &tempfile::TempDir) -> BakeConfig {
    let tarball = dir.path().join("rootfs.tar.gz");
    fs::write(&tarball, b"not a real tarball").unwrap();
    BakeConfig {
        target: dir.path().join("out.img"),
        dry_run: false,
        boot_size_mib: 256,
        image_size_gib: 8,
        rootfs_tar: Some(tarball),
        rootfs_url: String::new(),
        rootfs_sha256: None,
        download_dir: dir.path().join("downloads"),
        hostname: "pibox".to_string(),
        username: "pi".to_string(),
    }
}

fn work_dir_of(hal: &FakeHal) -> PathBuf {
    hal.operations()
        .iter()
        .find_map(|op| match op {
            Operation::Mount { target, fstype, .. } if fstype.as_deref() == Some("ext4") => {
                Some(target.clone())
            }
            _ => None,
        })
        .expect("root partition mounted")
}

fn remove_work_dir(hal: &FakeHal) {
    let _ = fs::remove_dir_all(work_dir_of(hal));
}

#[test]
fn image_bake_runs_the_full_pipeline_and_leaves_nothing_attached() {
    let dir = tempfile::tempdir().unwrap();
    let config = image_config(&dir);
    let hal = FakeHal::new();

    bake::run(&config, Arc::new(hal.clone())).unwrap();

    // Sparse image of the requested size, loop attached then detached.
    let image = dir.path().join("out.img");
    assert!(image.exists());
    assert_eq!(image.metadata().unwrap().len(), 8 * GIB);
    assert!(hal.has_operation(|op| matches!(op, Operation::LosetupAttach { .. })));
    assert_eq!(hal.attached_loop_count(), 0);

    // Partitioned, formatted, extracted, provisioned.
    assert!(hal.has_operation(|op| matches!(op, Operation::WipeFsAll { .. })));
    assert!(hal.has_operation(|op| matches!(op, Operation::FormatVfat { .. })));
    assert!(hal.has_operation(|op| matches!(op, Operation::FormatExt4 { .. })));
    assert!(hal.has_operation(|op| matches!(op, Operation::ExtractTar { .. })));
    assert!(hal.has_operation(|op| matches!(
        op,
        Operation::ChrootExec { argv, .. } if argv.first().map(String::as_str) == Some("pacman-key")
    )));
    assert!(hal.has_operation(|op| matches!(op, Operation::Sync)));

    // Boot and desktop configuration landed in the mounted tree.
    let root = work_dir_of(&hal);
    assert!(root.join("boot/config.txt").exists());
    assert!(root.join("boot/cmdline.txt").exists());
    assert!(root.join("etc/fstab").exists());
    assert!(root.join("etc/hostname").exists());
    assert!(root.join("home/pi/.config/sway/config").exists());

    // Nothing left mounted.
    assert!(!hal.is_path_mounted(&root));
    assert!(!hal.is_path_mounted(&root.join("boot")));
    for bind in ["dev", "dev/pts", "proc", "sys"] {
        assert!(!hal.is_path_mounted(&root.join(bind)));
    }

    remove_work_dir(&hal);
}

#[test]
fn mid_run_failure_still_tears_everything_down() {
    let dir = tempfile::tempdir().unwrap();
    let config = image_config(&dir);
    let hal = FakeHal::new();
    hal.fail_chroot_containing("useradd");

    let err = bake::run(&config, Arc::new(hal.clone())).unwrap_err();
    assert!(err.to_string().contains("create login user"));

    // The failure happened after mounting; teardown still ran.
    let root = work_dir_of(&hal);
    assert!(!hal.is_path_mounted(&root));
    assert!(!hal.is_path_mounted(&root.join("boot")));
    assert_eq!(hal.attached_loop_count(), 0);
    assert!(hal.has_operation(|op| matches!(op, Operation::LosetupDetach { .. })));

    remove_work_dir(&hal);
}

#[test]
fn busy_device_partprobe_does_not_fail_the_bake() {
    let dir = tempfile::tempdir().unwrap();
    let config = image_config(&dir);
    let hal = FakeHal::new();
    hal.fail_partprobe();

    bake::run(&config, Arc::new(hal.clone())).unwrap();

    assert!(hal.has_operation(|op| matches!(op, Operation::Partprobe { .. })));
    assert_eq!(hal.attached_loop_count(), 0);

    remove_work_dir(&hal);
}

#[test]
fn dry_run_touches_no_files_and_issues_no_detach_or_probe() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = image_config(&dir);
    config.dry_run = true;
    let hal = FakeHal::new();

    bake::run(&config, Arc::new(hal.clone())).unwrap();

    assert!(!dir.path().join("out.img").exists());
    assert_eq!(hal.attached_loop_count(), 0);

    // No loop device was attached, so none may be detached; the placeholder
    // handle must never reach the HAL.
    assert!(!hal.has_operation(|op| matches!(op, Operation::LosetupAttach { .. })));
    assert!(!hal.has_operation(|op| matches!(op, Operation::LosetupDetach { .. })));

    // The partitions were never created, so blkid is not consulted.
    assert!(!hal.has_operation(|op| matches!(op, Operation::BlkidUuid { .. })));

    // The work dir is never created, so nothing is left behind.
    let root = work_dir_of(&hal);
    assert!(!root.exists());
}
