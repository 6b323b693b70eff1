//! Miscellaneous host operations.

use crate::HalResult;

pub trait SystemOps {
    /// Flush filesystem buffers.
    fn sync(&self) -> HalResult<()>;

    /// Wait for udev to finish processing queued events.
    fn udev_settle(&self) -> HalResult<()>;
}
