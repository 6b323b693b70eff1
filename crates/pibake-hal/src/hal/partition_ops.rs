//! Partition table operations (wipefs / parted / partprobe).

use crate::HalResult;
use std::path::Path;

/// A single parted operation in a partitioning plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartedOp {
    MkLabel {
        label: String,
    },
    MkPart {
        part_type: String,
        fs_type: String,
        start: String,
        end: String,
    },
    SetFlag {
        part_num: u32,
        flag: String,
        state: String,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct PartedOptions {
    pub dry_run: bool,
    pub confirmed: bool,
}

impl PartedOptions {
    pub fn new(dry_run: bool, confirmed: bool) -> Self {
        Self { dry_run, confirmed }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WipeFsOptions {
    pub dry_run: bool,
    pub confirmed: bool,
}

impl WipeFsOptions {
    pub fn new(dry_run: bool, confirmed: bool) -> Self {
        Self { dry_run, confirmed }
    }
}

pub trait PartitionOps {
    /// Erase all filesystem/partition-table signatures on the disk.
    fn wipefs_all(&self, disk: &Path, opts: &WipeFsOptions) -> HalResult<()>;

    /// Run one parted operation against the disk, returning parted's stdout.
    fn parted(&self, disk: &Path, op: PartedOp, opts: &PartedOptions) -> HalResult<String>;

    /// Ask the kernel to re-read the partition table. Callers treat failure
    /// as advisory; a busy device often re-reads on its own.
    fn partprobe(&self, disk: &Path, dry_run: bool) -> HalResult<()>;
}
