//! pibake host abstraction layer.
//!
//! Every privileged or destructive interaction with the host goes through the
//! traits in [`hal`], so the build pipeline can be exercised in CI against a
//! recording fake instead of real block devices.

pub mod error;
pub mod hal;
pub mod path;

pub use error::{HalError, HalResult};
pub use hal::{
    ArchiveOps, ChrootOps, FakeHal, FormatOps, FormatOptions, InstallerHal, LinuxHal, LoopOps,
    MountOps, MountOptions, Operation, PartedOp, PartedOptions, PartitionOps, ProbeOps, SystemOps,
    WipeFsOptions,
};
