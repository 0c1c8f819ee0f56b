//! Archive extraction with prefix stripping.
//!
//! Entries whose path does not start with the strip prefix are skipped, as are
//! entries that become empty once the prefix is removed (the wrapping
//! directory itself). Entries that would land outside the target directory
//! are rejected. Tar link entries are skipped; zip entries are always written
//! as regular files.

use anyhow::{Context, Result};
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::FetchError;
use crate::output;

/// Normalizes a strip prefix to `dir/` form. An empty prefix matches every entry.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

/// Maps an archive entry name onto a path relative to the target directory.
///
/// Returns `Ok(None)` for entries outside the prefix or empty after stripping.
/// Absolute names and `..` components are archive errors.
pub fn strip_entry_path(entry_name: &str, prefix: &str) -> Result<Option<PathBuf>> {
    let Some(rel) = entry_name.strip_prefix(prefix) else {
        return Ok(None);
    };
    if rel.is_empty() {
        return Ok(None);
    }

    let mut out = PathBuf::new();
    for component in Path::new(rel).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => {
                return Err(FetchError::archive(format!(
                    "entry '{entry_name}' escapes the target directory"
                ))
                .into());
            }
        }
    }

    if out.as_os_str().is_empty() {
        return Ok(None);
    }
    Ok(Some(out))
}

/// Extracts `archive_path` into `target_dir`, stripping `strip_prefix`.
///
/// Dispatches on the file extension: `.zip`, `.tar.gz` or `.tgz`.
/// Returns the number of entries written.
pub fn extract_archive(archive_path: &Path, target_dir: &Path, strip_prefix: &str) -> Result<usize> {
    let name = archive_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    let prefix = normalize_prefix(strip_prefix);

    if name.ends_with(".zip") {
        let root = canonical_root(target_dir)?;
        extract_zip(archive_path, &root, &prefix)
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        let root = canonical_root(target_dir)?;
        extract_tar_gz(archive_path, &root, &prefix)
    } else {
        Err(FetchError::archive(format!(
            "unsupported archive format: '{}'. Expected .zip or .tar.gz",
            archive_path.display()
        ))
        .into())
    }
}

fn canonical_root(target_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(target_dir)
        .with_context(|| format!("Failed to create directory {}", target_dir.display()))?;
    target_dir
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", target_dir.display()))
}

/// Fails unless `path`, or its nearest existing ancestor, resolves inside `root`.
///
/// Catches symlinks already present in the target directory. `root` must be
/// canonical.
fn ensure_within(root: &Path, path: &Path, rel: &Path) -> Result<()> {
    let existing = path
        .ancestors()
        .find(|p| p.symlink_metadata().is_ok())
        .unwrap_or(root);
    let escapes = match existing.canonicalize() {
        Ok(resolved) => !resolved.starts_with(root),
        // dangling symlink
        Err(_) => true,
    };
    if escapes {
        return Err(FetchError::archive(format!(
            "entry '{}' resolves outside the target directory",
            rel.display()
        ))
        .into());
    }
    Ok(())
}

fn extract_zip(archive_path: &Path, root: &Path, prefix: &str) -> Result<usize> {
    let file = std::fs::File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;

    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| FetchError::archive(format!("failed to read zip archive: {e}")))?;

    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| FetchError::archive(format!("failed to read zip entry {i}: {e}")))?;

        let Some(rel) = strip_entry_path(entry.name(), prefix)? else {
            continue;
        };
        let out_path = root.join(&rel);
        ensure_within(root, &out_path, &rel)?;

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)
                .with_context(|| format!("Failed to create directory {}", out_path.display()))?;
        } else {
            create_parent(&out_path)?;
            let mut out_file = std::fs::File::create(&out_path)
                .with_context(|| format!("Failed to create {}", out_path.display()))?;
            io::copy(&mut entry, &mut out_file)
                .map_err(|e| FetchError::archive(format!("failed to extract '{}': {e}", rel.display())))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    // Owner keeps write access so the next version can overwrite.
                    let perms = std::fs::Permissions::from_mode((mode & 0o777) | 0o200);
                    std::fs::set_permissions(&out_path, perms).with_context(|| {
                        format!("Failed to set permissions on {}", out_path.display())
                    })?;
                }
            }
        }

        if output::is_verbose() {
            output::detail(&rel.display().to_string());
        }
        written += 1;
    }

    Ok(written)
}

fn extract_tar_gz(archive_path: &Path, root: &Path, prefix: &str) -> Result<usize> {
    let file = std::fs::File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;

    let decoder = flate2::read::GzDecoder::new(file);
    let mut archive = tar::Archive::new(decoder);

    let entries = archive
        .entries()
        .map_err(|e| FetchError::archive(format!("failed to read tar entries: {e}")))?;

    let mut written = 0;
    for entry_result in entries {
        let mut entry =
            entry_result.map_err(|e| FetchError::archive(format!("failed to read tar entry: {e}")))?;
        let name = entry
            .path()
            .map_err(|e| FetchError::archive(format!("failed to read tar entry path: {e}")))?
            .to_string_lossy()
            .into_owned();

        let Some(rel) = strip_entry_path(&name, prefix)? else {
            continue;
        };

        let kind = entry.header().entry_type();
        if !kind.is_dir() && !kind.is_file() {
            if output::is_verbose() {
                output::detail(&format!("skipped {} (not a regular file)", rel.display()));
            }
            continue;
        }

        let out_path = root.join(&rel);
        ensure_within(root, &out_path, &rel)?;

        if kind.is_dir() {
            std::fs::create_dir_all(&out_path)
                .with_context(|| format!("Failed to create directory {}", out_path.display()))?;
        } else {
            create_parent(&out_path)?;
            entry
                .unpack(&out_path)
                .map_err(|e| FetchError::archive(format!("failed to extract '{}': {e}", rel.display())))?;
        }

        if output::is_verbose() {
            output::detail(&rel.display().to_string());
        }
        written += 1;
    }

    Ok(written)
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}
