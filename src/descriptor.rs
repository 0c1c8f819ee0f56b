//! Release descriptor: a small `key=value` properties file naming the
//! repository that publishes an artifact and the release version to install.
//!
//! ```text
//! repo=https://github.com/getsentry/sentry-native
//! version="0.9.1"
//! ```

use anyhow::{Context, Result};
use std::path::Path;

use crate::error::FetchError;

/// Repository URL and version tag read from a properties file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseDescriptor {
    /// Base repository URL, without a trailing slash.
    pub repo: String,
    /// Release tag, used verbatim in download URLs and the cache marker.
    pub version: String,
}

impl ReleaseDescriptor {
    /// Reads `repo` and `version` from the properties file at `path`.
    ///
    /// Both keys are required. Nothing touches the network until this succeeds.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FetchError::config(format!(
                "properties file not found at {}",
                path.display()
            ))
            .into());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read properties file {}", path.display()))?;

        let repo = property_value(&contents, "repo").ok_or_else(|| missing(path, "repo"))?;
        let version =
            property_value(&contents, "version").ok_or_else(|| missing(path, "version"))?;

        Ok(Self {
            repo: repo.trim_end_matches('/').to_string(),
            version,
        })
    }

    /// `<repo>/releases/download/<version>/<asset>`
    pub fn download_url(&self, asset: &str) -> String {
        format!("{}/releases/download/{}/{asset}", self.repo, self.version)
    }
}

fn missing(path: &Path, key: &str) -> anyhow::Error {
    FetchError::config(format!(
        "property '{key}' not found in {}",
        path.display()
    ))
    .into()
}

/// Reads a single property from a properties file.
pub fn read_property(name: &str, path: &Path) -> Result<String> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read properties file {}", path.display()))?;
    property_value(&contents, name).ok_or_else(|| missing(path, name))
}

/// Finds the first `name=value` line and returns the trimmed, unquoted value.
///
/// Comment lines (`#`, `!`) and lines without `=` are ignored. An empty value
/// counts as absent.
pub fn property_value(contents: &str, name: &str) -> Option<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| line.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"').trim().to_string())
        .filter(|value| !value.is_empty())
}
