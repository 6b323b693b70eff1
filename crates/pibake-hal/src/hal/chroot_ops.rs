//! Chroot execution.

use crate::HalResult;
use std::path::Path;

pub trait ChrootOps {
    /// Run a command inside the target root via `arch-chroot`.
    ///
    /// `argv[0]` is the program; the caller is responsible for having bind
    /// mounts for /dev, /proc and /sys in place.
    fn chroot_exec(&self, root: &Path, argv: &[String], dry_run: bool) -> HalResult<()>;
}
