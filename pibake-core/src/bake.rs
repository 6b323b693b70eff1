//! The bake pipeline: resolve, partition, format, mount, extract, provision,
//! configure, tear down.

use crate::cancel::check_cancel;
use crate::cleanup::CleanupGuard;
use crate::rootfs::RootfsSource;
use crate::target::Target;
use crate::{boot_config, desktop, mount, partition, provision, rootfs, target};
use anyhow::Result;
use log::info;
use pibake_hal::InstallerHal;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct BakeConfig {
    /// Block device path or image file path to create.
    pub target: PathBuf,
    pub dry_run: bool,
    pub boot_size_mib: u64,
    pub image_size_gib: u64,
    pub rootfs_tar: Option<PathBuf>,
    pub rootfs_url: String,
    pub rootfs_sha256: Option<String>,
    pub download_dir: PathBuf,
    pub hostname: String,
    pub username: String,
}

impl BakeConfig {
    fn rootfs_source(&self) -> RootfsSource {
        RootfsSource {
            tarball: self.rootfs_tar.clone(),
            url: self.rootfs_url.clone(),
            sha256: self.rootfs_sha256.clone(),
            download_dir: self.download_dir.clone(),
        }
    }
}

/// Run the full pipeline. Teardown runs on every exit path, so a mid-run
/// failure still leaves no mounts or loop devices behind.
pub fn run(config: &BakeConfig, hal: Arc<dyn InstallerHal>) -> Result<()> {
    let mut guard = CleanupGuard::new();
    let result = run_phases(config, hal.as_ref(), &mut guard);
    guard.teardown(hal.as_ref(), config.dry_run);
    if result.is_ok() {
        info!("✅ Done: {} is ready", config.target.display());
    }
    result
}

fn run_phases(
    config: &BakeConfig,
    hal: &dyn InstallerHal,
    guard: &mut CleanupGuard,
) -> Result<()> {
    let dry_run = config.dry_run;

    // Fetch before touching the target: a failed download must not leave a
    // half-erased disk.
    check_cancel()?;
    let tarball = rootfs::acquire(&config.rootfs_source())?;

    check_cancel()?;
    let target = target::resolve(hal, &config.target, config.image_size_gib, dry_run)?;
    // In dry-run mode the loop handle is a placeholder the run never
    // attached, so it must not be registered for detach.
    if !dry_run {
        if let Some(loop_device) = target.loop_device() {
            guard.set_loop_device(loop_device);
        }
    }
    let device = target.device_path();

    check_cancel()?;
    let layout = partition::PartitionLayout {
        boot_size_mib: config.boot_size_mib,
    };
    partition::apply(hal, &device, &layout, dry_run)?;
    let set = partition::partition_set(&device);
    partition::format(hal, &set, dry_run)?;

    check_cancel()?;
    let root = mount::mount_target(hal, &set, guard, dry_run)?;

    check_cancel()?;
    rootfs::extract(hal, &tarball, &root, dry_run)?;
    if !dry_run {
        rootfs::stage_resolv_conf(&root, dry_run)?;
        rootfs::write_hostname(&root, &config.hostname)?;
    }

    check_cancel()?;
    mount::bind_host_dirs(hal, &root, guard, dry_run)?;

    check_cancel()?;
    let plan = provision::Plan::stock(&config.username);
    provision::execute(hal, &root, &provision::plan_actions(&plan), dry_run)?;

    check_cancel()?;
    let uuids = boot_config::probe_uuids(hal, &set.boot, &set.root, dry_run)?;
    boot_config::write(&root, &uuids, dry_run)?;
    desktop::write(&root, &config.username, dry_run)?;
    provision::execute(hal, &root, &provision::finalize_actions(&plan), dry_run)?;

    if let Err(err) = hal.sync() {
        log::warn!("⚠️ sync failed: {}", err);
    }

    if let Target::ImageFile { path, .. } = &target {
        info!("💾 Image written to {}", path.display());
    }
    Ok(())
}
