//! Block device probing (lsblk / blkid).

use crate::HalResult;
use std::path::{Path, PathBuf};

pub trait ProbeOps {
    /// Mount points of any mounted partitions belonging to `disk`.
    fn lsblk_mountpoints(&self, disk: &Path) -> HalResult<Vec<PathBuf>>;

    /// Filesystem UUID of a formatted partition.
    fn blkid_uuid(&self, device: &Path) -> HalResult<String>;
}
