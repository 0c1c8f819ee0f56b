//! HTTP download and SHA-256 helpers.
//!
//! Downloads run on a single-threaded Tokio runtime and are driven to
//! completion with `block_on`, so callers see plain blocking functions.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::FetchError;

/// User-Agent header sent with release downloads.
const USER_AGENT: &str = concat!("artifact-fetch/", env!("CARGO_PKG_VERSION"));

/// Default network timeout for a download.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// `timeout` bounds connecting and each wait for data, not the whole
/// transfer, so a large asset on a slow but live connection still completes.
fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Downloads `url` into `dest_dir/filename` and returns the file path.
///
/// Redirects are followed (GitHub serves release assets from a CDN). Any
/// non-2xx status is a network error naming the status and URL, as is a
/// connection that stays silent for longer than `timeout`.
pub fn download_to_file(
    url: &str,
    dest_dir: &Path,
    filename: &str,
    timeout: Duration,
) -> Result<PathBuf> {
    let client = build_http_client(timeout)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime for HTTP request")?;

    let bytes = runtime.block_on(async move {
        let response = client.get(url).send().await.map_err(|e| {
            FetchError::network(format!("failed to connect for '{filename}': {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::network(format!(
                "download of '{filename}' failed: HTTP {status} from {url}"
            )));
        }

        response.bytes().await.map_err(|e| {
            FetchError::network(format!("failed to read response body for '{filename}': {e}"))
        })
    })?;

    let dest_path = dest_dir.join(filename);
    std::fs::write(&dest_path, &bytes)
        .with_context(|| format!("Failed to write '{filename}' to {}", dest_path.display()))?;

    Ok(dest_path)
}

/// Computes the SHA256 digest of a file and returns it as a lowercase hex string.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open file for checksum: {}", path.display()))?;

    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("Failed to read file for checksum: {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Checks a downloaded file against a pinned SHA-256 (hex, any case).
pub fn verify_sha256(path: &Path, expected: &str) -> Result<()> {
    let expected = expected.trim().to_ascii_lowercase();
    if expected.len() != 64 || !expected.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(FetchError::config(format!(
            "invalid SHA256 '{expected}' (expected 64 hex chars)"
        ))
        .into());
    }

    let actual = sha256_file(path)?;
    if actual != expected {
        return Err(FetchError::Integrity(format!(
            "checksum mismatch for {}: expected {expected}, got {actual}",
            path.display()
        ))
        .into());
    }
    Ok(())
}
