//! 🍞 pibake core library.
//!
//! Assembles a bootable Arch Linux ARM SD-card image (or provisions a real
//! block device) for the Raspberry Pi: resolve the target, partition and
//! format it, mount it, extract the base rootfs, provision it inside a
//! chroot, and write boot and desktop configuration.

pub mod bake;
pub mod boot_config;
pub mod cancel;
pub mod cleanup;
pub mod cli;
pub mod desktop;
pub mod download;
pub mod logging;
pub mod mount;
pub mod partition;
pub mod preflight;
pub mod provision;
pub mod rootfs;
pub mod target;

pub use bake::BakeConfig;
pub use pibake_error::{BakeError, BakeResult};
