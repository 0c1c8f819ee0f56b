//! Version-gated fetch of release artifacts.
//!
//! The flow for an archive job:
//!
//! 1. Read the release descriptor (`repo`, `version`).
//! 2. Compare against the cache marker in the target directory; a match is a
//!    no-op with no network access.
//! 3. Otherwise optionally clean the target directory (only inside the project
//!    root), download the asset into a temporary directory, extract it with
//!    the strip prefix applied, and finally write the marker.
//!
//! The marker is the commit point: it is written only after everything else
//! succeeded, so an interrupted fetch is retried in full next time.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::{BinaryConfig, FetchConfig, Job};
use crate::descriptor::ReleaseDescriptor;
use crate::download::{download_to_file, verify_sha256};
use crate::error::FetchError;
use crate::extract::extract_archive;
use crate::marker;
use crate::output;
use crate::platform::Platform;

/// What a fetch did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The marker already recorded this version; nothing was touched.
    UpToDate { version: String },
    /// The asset was downloaded and `entries` archive entries were written.
    Fetched { version: String, entries: usize },
}

impl FetchOutcome {
    pub fn version(&self) -> &str {
        match self {
            Self::UpToDate { version } | Self::Fetched { version, .. } => version,
        }
    }

    pub fn was_fetched(&self) -> bool {
        matches!(self, Self::Fetched { .. })
    }
}

/// Installed-vs-requested state of a job, computed without network access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    pub label: String,
    pub requested: String,
    pub installed: Option<String>,
    pub up_to_date: bool,
}

/// Fetches and extracts an archive asset unless the marker already matches.
pub fn fetch(cfg: &FetchConfig) -> Result<FetchOutcome> {
    validate_asset_name(&cfg.asset)?;
    let descriptor = ReleaseDescriptor::load(&cfg.descriptor_path)
        .context("Failed to read release descriptor")?;
    let version = descriptor.version.clone();
    let marker_path = cfg.marker_path();

    if marker::is_up_to_date(&marker_path, &version) {
        output::success("Up to date", &format!("{} v{version}", cfg.asset));
        return Ok(FetchOutcome::UpToDate { version });
    }

    output::action("Fetching", &format!("{} v{version}", cfg.asset));

    if cfg.force_clean && cfg.target_dir.exists() {
        let target = ensure_inside_root(&cfg.project_root, &cfg.target_dir)?;
        std::fs::remove_dir_all(&target)
            .with_context(|| format!("Failed to clean {}", target.display()))?;
    }

    std::fs::create_dir_all(&cfg.target_dir)
        .with_context(|| format!("Failed to create {}", cfg.target_dir.display()))?;

    let tmp_dir = tempfile::Builder::new()
        .prefix("artifact-fetch")
        .tempdir()
        .context("Failed to create temporary directory")?;

    let url = descriptor.download_url(&cfg.asset);
    output::action("Downloading", &url);
    let archive_path = download_to_file(&url, tmp_dir.path(), &cfg.asset, cfg.timeout)
        .with_context(|| format!("Failed to download {}", cfg.asset))?;

    if let Some(expected) = &cfg.sha256 {
        verify_sha256(&archive_path, expected)?;
    }

    output::action("Extracting", &format!("{} -> {}", cfg.asset, cfg.target_dir.display()));
    let entries = extract_archive(&archive_path, &cfg.target_dir, &cfg.strip_prefix)
        .with_context(|| format!("Failed to extract {}", cfg.asset))?;

    tmp_dir
        .close()
        .context("Failed to remove temporary download directory")?;

    marker::write_marker(&marker_path, &version)?;
    output::success("Fetched", &format!("{} v{version} ({entries} entries)", cfg.asset));

    Ok(FetchOutcome::Fetched { version, entries })
}

/// Fetches a single host-specific binary asset for the running platform.
pub fn fetch_binary(cfg: &BinaryConfig) -> Result<PathBuf> {
    let host = Platform::host().ok_or_else(|| {
        FetchError::config(format!(
            "{} is not available for host '{}'",
            cfg.asset_stem,
            crate::platform::build_target()
        ))
    })?;
    fetch_binary_for(cfg, host)
}

/// Fetches `<asset_stem>-<suffix for platform>` into the target directory and
/// marks it executable. Returns the binary path.
///
/// Up to date only when the marker matches and the binary is still present.
pub fn fetch_binary_for(cfg: &BinaryConfig, platform: Platform) -> Result<PathBuf> {
    let binary_name = binary_asset_name(&cfg.asset_stem, platform)?;
    validate_asset_name(&binary_name)?;
    let descriptor = ReleaseDescriptor::load(&cfg.descriptor_path)
        .context("Failed to read release descriptor")?;
    let version = &descriptor.version;
    let binary_path = cfg.target_dir.join(&binary_name);
    let marker_path = cfg.marker_path();

    if binary_path.is_file() && marker::is_up_to_date(&marker_path, version) {
        output::success("Up to date", &format!("{} v{version}", cfg.asset_stem));
        return Ok(binary_path);
    }

    output::action("Fetching", &format!("{} v{version}", cfg.asset_stem));

    std::fs::create_dir_all(&cfg.target_dir)
        .with_context(|| format!("Failed to create {}", cfg.target_dir.display()))?;

    // Same directory as the destination so the final rename cannot cross filesystems.
    let tmp_dir = tempfile::Builder::new()
        .prefix(".artifact-fetch")
        .tempdir_in(&cfg.target_dir)
        .context("Failed to create temporary directory")?;

    let url = descriptor.download_url(&binary_name);
    output::action("Downloading", &url);
    let downloaded = download_to_file(&url, tmp_dir.path(), &binary_name, cfg.timeout)
        .with_context(|| format!("Failed to download {}", cfg.asset_stem))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&downloaded)
            .with_context(|| format!("Failed to stat {}", downloaded.display()))?
            .permissions()
            .mode();
        std::fs::set_permissions(&downloaded, std::fs::Permissions::from_mode(mode | 0o111))
            .context("Failed to set executable permissions on downloaded binary")?;
    }

    std::fs::rename(&downloaded, &binary_path)
        .with_context(|| format!("Failed to move binary into {}", binary_path.display()))?;
    tmp_dir
        .close()
        .context("Failed to remove temporary download directory")?;

    marker::write_marker(&marker_path, version)?;
    output::success("Fetched", &format!("{} v{version}", cfg.asset_stem));

    Ok(binary_path)
}

/// `wasm-split` + Linux -> `wasm-split-Linux-x86_64`
pub fn binary_asset_name(stem: &str, platform: Platform) -> Result<String> {
    let suffix = platform.host_binary_suffix().map_err(|e| FetchError::config(e.to_string()))?;
    Ok(format!("{stem}-{suffix}"))
}

/// Runs one manifest job.
pub fn run_job(job: &Job) -> Result<()> {
    match job {
        Job::Archive(cfg) => fetch(cfg).map(|_| ()),
        Job::Binary(cfg) => fetch_binary(cfg).map(|_| ()),
    }
}

/// Reports whether a job would fetch, reading only local files.
pub fn status(job: &Job) -> Result<JobStatus> {
    let (descriptor_path, marker_path, present) = match job {
        Job::Archive(cfg) => (&cfg.descriptor_path, cfg.marker_path(), true),
        Job::Binary(cfg) => {
            let present = match Platform::host() {
                Some(host) => cfg
                    .target_dir
                    .join(binary_asset_name(&cfg.asset_stem, host)?)
                    .is_file(),
                None => false,
            };
            (&cfg.descriptor_path, cfg.marker_path(), present)
        }
    };

    let descriptor = ReleaseDescriptor::load(descriptor_path)?;
    let installed = marker::read_marker(&marker_path);
    let up_to_date = present && installed.as_deref() == Some(descriptor.version.as_str());

    Ok(JobStatus {
        label: job.label().to_string(),
        requested: descriptor.version,
        installed,
        up_to_date,
    })
}

/// Canonicalizes `target` and checks it lies strictly inside `root`.
///
/// Fails with [`FetchError::UnsafeClean`] for anything else, including the
/// root itself. Both paths must exist.
pub fn ensure_inside_root(root: &Path, target: &Path) -> Result<PathBuf> {
    let root = root
        .canonicalize()
        .with_context(|| format!("Failed to resolve project root {}", root.display()))?;
    let resolved = target
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", target.display()))?;

    if resolved == root || !resolved.starts_with(&root) {
        return Err(FetchError::UnsafeClean(target.display().to_string()).into());
    }
    Ok(resolved)
}

/// Asset names are joined onto directories, so they must be a single path segment.
fn validate_asset_name(name: &str) -> Result<()> {
    let is_plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\');
    if !is_plain {
        return Err(FetchError::config(format!("invalid asset name '{name}'")).into());
    }
    Ok(())
}
