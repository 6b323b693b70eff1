//! Rootfs archive extraction.

use crate::HalResult;
use std::path::Path;

pub trait ArchiveOps {
    /// Extract a rootfs tarball into `dest`, preserving ownership, modes and
    /// extended attributes (bsdtar `-xpf`).
    fn extract_tar(&self, archive: &Path, dest: &Path, dry_run: bool) -> HalResult<()>;
}
