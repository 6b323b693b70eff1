//! CLI argument parsing for pibake.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_ROOTFS_URL: &str =
    "http://os.archlinuxarm.org/os/ArchLinuxARM-rpi-aarch64-latest.tar.gz";

#[derive(Parser)]
#[command(name = "pibake")]
#[command(about = "🍞 pibake - bootable Arch Linux ARM SD-card images for the Raspberry Pi")]
#[command(long_about = "🍞 pibake - bootable Arch Linux ARM SD-card images for the Raspberry Pi\n\n\
    Pass a block device (/dev/sdX, destructive, asks for confirmation) or a\n\
    path to an image file to create (loop-mounted, no confirmation needed).")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Target block device, or image file path to create
    pub target: Option<PathBuf>,

    /// Log every destructive operation without executing it
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Boot (FAT32) partition size in MiB
    #[arg(long, default_value_t = 256)]
    pub boot_size_mib: u64,

    /// Nominal size of a newly created image file in GiB
    #[arg(long, default_value_t = 8)]
    pub image_size_gib: u64,

    /// Use a pre-fetched rootfs tarball instead of downloading
    #[arg(long)]
    pub rootfs_tar: Option<PathBuf>,

    /// Rootfs tarball URL
    #[arg(long, default_value = DEFAULT_ROOTFS_URL)]
    pub rootfs_url: String,

    /// Expected SHA-256 of the rootfs tarball (hex)
    #[arg(long)]
    pub rootfs_sha256: Option<String>,

    /// Hostname written into the target system
    #[arg(long, default_value = "pibox")]
    pub hostname: String,

    /// Login user created on the target system
    #[arg(long, default_value = "pi")]
    pub user: String,
}

#[derive(Subcommand)]
pub enum Command {
    /// 🔍 Run preflight checks (verify privileges and required tools)
    Preflight,
}
