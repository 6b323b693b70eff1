//! Filesystem formatting operations.

use crate::HalResult;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct FormatOptions {
    pub dry_run: bool,
    pub confirmed: bool,
    pub extra_args: Vec<String>,
}

impl FormatOptions {
    pub fn new(dry_run: bool, confirmed: bool) -> Self {
        Self {
            dry_run,
            confirmed,
            extra_args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }
}

pub trait FormatOps {
    /// Format as FAT32 with the given volume label.
    fn format_vfat(&self, device: &Path, label: &str, opts: &FormatOptions) -> HalResult<()>;

    /// Format as ext4. Pass `-F` in `extra_args` to overwrite an existing
    /// filesystem signature.
    fn format_ext4(&self, device: &Path, opts: &FormatOptions) -> HalResult<()>;
}
