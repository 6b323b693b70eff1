//! Base rootfs installation: fetch/verify the tarball, extract it into the
//! mounted root, and prepare the chroot for name resolution.

use crate::download::{self, DownloadOptions};
use anyhow::{bail, Context, Result};
use log::info;
use pibake_hal::InstallerHal;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RootfsSource {
    /// A pre-fetched tarball; when set, no download happens.
    pub tarball: Option<PathBuf>,
    pub url: String,
    pub sha256: Option<String>,
    pub download_dir: PathBuf,
}

/// Locate (or fetch) the rootfs tarball.
pub fn acquire(source: &RootfsSource) -> Result<PathBuf> {
    if let Some(tarball) = &source.tarball {
        if !tarball.exists() {
            bail!("rootfs tarball not found: {}", tarball.display());
        }
        return Ok(tarball.clone());
    }
    download::fetch(&DownloadOptions {
        url: source.url.clone(),
        sha256: source.sha256.clone(),
        download_dir: source.download_dir.clone(),
        ..DownloadOptions::default()
    })
}

/// Extract the tarball into the mounted root.
pub fn extract(hal: &dyn InstallerHal, tarball: &Path, root: &Path, dry_run: bool) -> Result<()> {
    info!("📦 Extracting {} into {}", tarball.display(), root.display());
    hal.extract_tar(tarball, root, dry_run)
        .map_err(anyhow::Error::new)
        .context("rootfs extraction failed")
}

/// Copy the host resolver configuration into the target so the chrooted
/// package manager can resolve mirrors.
pub fn stage_resolv_conf(root: &Path, dry_run: bool) -> Result<()> {
    let host = Path::new("/etc/resolv.conf");
    if dry_run {
        info!("DRY RUN: cp /etc/resolv.conf {}", root.display());
        return Ok(());
    }
    if !host.exists() {
        log::warn!("⚠️ Host has no /etc/resolv.conf; chroot will lack DNS");
        return Ok(());
    }
    let etc = root.join("etc");
    fs::create_dir_all(&etc)?;
    // resolv.conf is often a symlink on the host; copy the contents.
    let contents = fs::read(host)?;
    fs::write(etc.join("resolv.conf"), contents)?;
    Ok(())
}

/// Write the target hostname.
pub fn write_hostname(root: &Path, hostname: &str) -> Result<()> {
    let etc = root.join("etc");
    fs::create_dir_all(&etc)?;
    fs::write(etc.join("hostname"), format!("{}\n", hostname))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_prefers_prefetched_tarball() {
        let dir = tempfile::tempdir().unwrap();
        let tar = dir.path().join("rootfs.tar.gz");
        fs::write(&tar, b"").unwrap();
        let source = RootfsSource {
            tarball: Some(tar.clone()),
            url: "http://invalid.invalid/x.tar.gz".to_string(),
            sha256: None,
            download_dir: dir.path().to_path_buf(),
        };
        assert_eq!(acquire(&source).unwrap(), tar);
    }

    #[test]
    fn acquire_rejects_missing_prefetched_tarball() {
        let dir = tempfile::tempdir().unwrap();
        let source = RootfsSource {
            tarball: Some(dir.path().join("nope.tar.gz")),
            url: String::new(),
            sha256: None,
            download_dir: dir.path().to_path_buf(),
        };
        assert!(acquire(&source).is_err());
    }

    #[test]
    fn hostname_is_written_with_newline() {
        let dir = tempfile::tempdir().unwrap();
        write_hostname(dir.path(), "pibox").unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("etc/hostname")).unwrap(),
            "pibox\n"
        );
    }
}
