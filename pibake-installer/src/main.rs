use anyhow::bail;
use clap::Parser;
use pibake_core::cli::{Cli, Command};
use pibake_core::{bake, cancel, logging, preflight, BakeConfig};
use pibake_hal::LinuxHal;
use std::path::PathBuf;
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();

    if let Some(Command::Preflight) = cli.command {
        preflight::run()?;
        return Ok(());
    }

    let Some(target) = cli.target else {
        bail!("no target given; pass a block device or an image file path (see --help)");
    };

    preflight::run()?;
    cancel::install_handler()?;

    let config = BakeConfig {
        target,
        dry_run: cli.dry_run,
        boot_size_mib: cli.boot_size_mib,
        image_size_gib: cli.image_size_gib,
        rootfs_tar: cli.rootfs_tar,
        rootfs_url: cli.rootfs_url,
        rootfs_sha256: cli.rootfs_sha256,
        download_dir: PathBuf::from("downloads"),
        hostname: cli.hostname,
        username: cli.user,
    };

    bake::run(&config, Arc::new(LinuxHal::new()))
}
