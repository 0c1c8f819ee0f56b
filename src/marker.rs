//! Cache marker: a plain file holding the version installed in a target
//! directory. A matching marker means the directory is trusted as-is.

use anyhow::{Context, Result};
use std::path::Path;

/// Default marker file name inside a target directory.
pub const DEFAULT_MARKER_FILE: &str = ".version";

/// Reads the installed version from a marker file.
///
/// Returns `None` if the file is missing, unreadable, or empty after trimming.
pub fn read_marker(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

/// Records `version` as installed. The file holds exactly the version string.
pub fn write_marker(path: &Path, version: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    std::fs::write(path, version)
        .with_context(|| format!("failed to write version marker {}", path.display()))?;
    Ok(())
}

/// True when the marker at `path` records exactly `version`.
pub fn is_up_to_date(path: &Path, version: &str) -> bool {
    read_marker(path).as_deref() == Some(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_missing_marker() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(read_marker(&tmp.path().join(DEFAULT_MARKER_FILE)).is_none());
    }

    #[test]
    fn read_whitespace_only_marker() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(DEFAULT_MARKER_FILE);
        std::fs::write(&path, "  \n").unwrap();
        assert!(read_marker(&path).is_none());
    }

    #[test]
    fn read_trims_trailing_newline() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(DEFAULT_MARKER_FILE);
        std::fs::write(&path, "0.9.1\n").unwrap();
        assert_eq!(read_marker(&path).as_deref(), Some("0.9.1"));
    }

    #[test]
    fn write_is_exact_and_creates_parents() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a").join("b").join(DEFAULT_MARKER_FILE);
        write_marker(&path, "2.3.1").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "2.3.1");
    }

    #[test]
    fn up_to_date_requires_exact_match() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(DEFAULT_MARKER_FILE);
        assert!(!is_up_to_date(&path, "1.0.0"));

        write_marker(&path, "1.0.0").unwrap();
        assert!(is_up_to_date(&path, "1.0.0"));
        assert!(!is_up_to_date(&path, "1.0.1"));
        assert!(!is_up_to_date(&path, "v1.0.0"));
    }
}
