//! Rootfs tarball download with retries and checksum verification.

use anyhow::{bail, Context, Result};
use log::info;
use reqwest::blocking::Client;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub url: String,
    /// Expected hex SHA-256; when `None` the download is not verified.
    pub sha256: Option<String>,
    pub download_dir: PathBuf,
    pub max_retries: usize,
    pub timeout_secs: u64,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            url: crate::cli::DEFAULT_ROOTFS_URL.to_string(),
            sha256: None,
            download_dir: PathBuf::from("downloads"),
            max_retries: 3,
            timeout_secs: 600,
        }
    }
}

/// Fetch the tarball, reusing a previously downloaded copy when its checksum
/// still matches.
pub fn fetch(opts: &DownloadOptions) -> Result<PathBuf> {
    fs::create_dir_all(&opts.download_dir)?;
    let filename = filename_from_url(&opts.url)?;
    let target = opts.download_dir.join(filename);

    if target.exists() {
        match &opts.sha256 {
            Some(expected) if verify_sha256(&target, expected).is_ok() => {
                info!("📦 Reusing verified {}", target.display());
                return Ok(target);
            }
            Some(_) => {
                info!("♻️  Cached tarball failed verification, re-downloading");
                let _ = fs::remove_file(&target);
            }
            None => {
                info!("📦 Reusing cached {}", target.display());
                return Ok(target);
            }
        }
    }

    let client = Client::builder()
        .timeout(Duration::from_secs(opts.timeout_secs))
        .user_agent("pibake")
        .build()?;

    let attempts = opts.max_retries.max(1);
    let mut last_err = None;
    for attempt in 1..=attempts {
        info!("⬇️  Download attempt {}/{}: {}", attempt, attempts, opts.url);
        match download_once(&client, &opts.url, &target) {
            Ok(()) => {
                if let Some(expected) = &opts.sha256 {
                    verify_sha256(&target, expected)?;
                }
                return Ok(target);
            }
            Err(err) => {
                let _ = fs::remove_file(&target);
                last_err = Some(err);
                if attempt < attempts {
                    sleep(Duration::from_secs(1 << attempt.min(5)));
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("download failed")))
}

fn download_once(client: &Client, url: &str, target: &Path) -> Result<()> {
    let mut response = client
        .get(url)
        .send()
        .context("request failed")?
        .error_for_status()?;
    let mut file = fs::File::create(target)?;
    std::io::copy(&mut response, &mut file)?;
    file.sync_all()?;
    Ok(())
}

pub fn filename_from_url(url: &str) -> Result<String> {
    let name = url
        .rsplit('/')
        .next()
        .filter(|n| !n.is_empty())
        .map(str::to_string);
    match name {
        Some(name) => Ok(name),
        None => bail!("cannot derive a filename from {}", url),
    }
}

fn verify_sha256(path: &Path, expected: &str) -> Result<()> {
    let computed = sha256_file(path)?;
    if !computed.eq_ignore_ascii_case(expected.trim()) {
        bail!(
            "checksum mismatch for {}: {} != {}",
            path.display(),
            computed,
            expected.trim()
        );
    }
    Ok(())
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
