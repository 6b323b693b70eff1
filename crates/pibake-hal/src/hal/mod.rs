//! HAL trait definitions and implementations.
//!
//! `LinuxHal` drives the real system tools; `FakeHal` records every operation
//! without executing it, for CI-safe tests.

pub mod archive_ops;
pub mod chroot_ops;
pub mod fake_hal;
pub mod format_ops;
pub mod linux_hal;
pub mod loop_ops;
pub mod mount_ops;
pub mod partition_ops;
pub mod probe_ops;
pub mod system_ops;

pub use archive_ops::ArchiveOps;
pub use chroot_ops::ChrootOps;
pub use fake_hal::{FakeHal, Operation};
pub use format_ops::{FormatOps, FormatOptions};
pub use linux_hal::LinuxHal;
pub use loop_ops::LoopOps;
pub use mount_ops::{MountOps, MountOptions};
pub use partition_ops::{PartedOp, PartedOptions, PartitionOps, WipeFsOptions};
pub use probe_ops::ProbeOps;
pub use system_ops::SystemOps;

/// Complete HAL combining all system operation traits.
pub trait InstallerHal:
    MountOps
    + FormatOps
    + PartitionOps
    + LoopOps
    + ProbeOps
    + ArchiveOps
    + ChrootOps
    + SystemOps
    + Send
    + Sync
{
}

impl<T> InstallerHal for T where
    T: MountOps
        + FormatOps
        + PartitionOps
        + LoopOps
        + ProbeOps
        + ArchiveOps
        + ChrootOps
        + SystemOps
        + Send
        + Sync
{
}
