//! Fetch job configuration.
//!
//! A job is described either directly on the command line or by an
//! `artifacts.toml` manifest at the project root:
//!
//! ```toml
//! timeout = "5m"
//!
//! [[archive]]
//! descriptor = "modules/sentry-native.properties"
//! asset = "sentry-native.zip"
//! target_dir = "modules/sentry-native"
//! strip_prefix = "sentry-native/"
//! clean = true
//!
//! [[binary]]
//! descriptor = "modules/wasm-split.properties"
//! asset_stem = "wasm-split"
//! target_dir = "modules/wasm-split"
//! ```
//!
//! Relative paths are resolved against the project root, which is also the
//! boundary that `clean` is never allowed to cross.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::download::DEFAULT_TIMEOUT;
use crate::error::FetchError;
use crate::marker::DEFAULT_MARKER_FILE;

/// Default manifest file name at the project root.
pub const MANIFEST_FILE_NAME: &str = "artifacts.toml";

/// Environment variable overriding the download timeout.
pub const TIMEOUT_ENV_VAR: &str = "ARTIFACT_FETCH_TIMEOUT";

/// One archive fetch: download `asset`, unpack it into `target_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub project_root: PathBuf,
    /// Properties file holding `repo` and `version`.
    pub descriptor_path: PathBuf,
    /// Zip (or tar.gz) asset name attached to the release.
    pub asset: String,
    pub target_dir: PathBuf,
    pub strip_prefix: String,
    /// Delete `target_dir` before extracting. Only allowed inside `project_root`.
    pub force_clean: bool,
    pub marker_file: String,
    /// Optional pinned SHA-256 of the asset.
    pub sha256: Option<String>,
    pub timeout: Duration,
}

impl FetchConfig {
    /// Builds a config with defaults; relative paths resolve against `project_root`.
    pub fn new(
        project_root: impl Into<PathBuf>,
        descriptor: impl AsRef<Path>,
        asset: impl Into<String>,
        target_dir: impl AsRef<Path>,
    ) -> Self {
        let project_root = project_root.into();
        Self {
            descriptor_path: resolve_in_root(&project_root, descriptor.as_ref()),
            target_dir: resolve_in_root(&project_root, target_dir.as_ref()),
            project_root,
            asset: asset.into(),
            strip_prefix: String::new(),
            force_clean: false,
            marker_file: DEFAULT_MARKER_FILE.to_string(),
            sha256: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn marker_path(&self) -> PathBuf {
        self.target_dir.join(&self.marker_file)
    }
}

/// One single-binary fetch: download `<asset_stem>-<host suffix>` as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryConfig {
    pub project_root: PathBuf,
    pub descriptor_path: PathBuf,
    pub asset_stem: String,
    pub target_dir: PathBuf,
    pub marker_file: String,
    pub timeout: Duration,
}

impl BinaryConfig {
    pub fn new(
        project_root: impl Into<PathBuf>,
        descriptor: impl AsRef<Path>,
        asset_stem: impl Into<String>,
        target_dir: impl AsRef<Path>,
    ) -> Self {
        let project_root = project_root.into();
        Self {
            descriptor_path: resolve_in_root(&project_root, descriptor.as_ref()),
            target_dir: resolve_in_root(&project_root, target_dir.as_ref()),
            project_root,
            asset_stem: asset_stem.into(),
            marker_file: DEFAULT_MARKER_FILE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn marker_path(&self) -> PathBuf {
        self.target_dir.join(&self.marker_file)
    }
}

/// A job from the manifest, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    Archive(FetchConfig),
    Binary(BinaryConfig),
}

impl Job {
    /// Short label for progress output.
    pub fn label(&self) -> &str {
        match self {
            Job::Archive(cfg) => &cfg.asset,
            Job::Binary(cfg) => &cfg.asset_stem,
        }
    }
}

/// `[[archive]]` table in the manifest.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ArchiveEntry {
    pub descriptor: PathBuf,
    pub asset: String,
    pub target_dir: PathBuf,
    #[serde(default)]
    pub strip_prefix: String,
    #[serde(default)]
    pub clean: bool,
    pub version_file: Option<String>,
    pub sha256: Option<String>,
}

/// `[[binary]]` table in the manifest.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BinaryEntry {
    pub descriptor: PathBuf,
    pub asset_stem: String,
    pub target_dir: PathBuf,
    pub version_file: Option<String>,
}

/// Parsed `artifacts.toml`.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Download timeout, e.g. "90s" or "5m".
    pub timeout: Option<String>,
    #[serde(default)]
    pub archive: Vec<ArchiveEntry>,
    #[serde(default)]
    pub binary: Vec<BinaryEntry>,
}

impl Manifest {
    /// Loads a manifest. A missing file is an error: manifests are always
    /// requested explicitly.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FetchError::config(format!(
                    "manifest not found at {}",
                    path.display()
                ))
                .into());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read manifest at {}", path.display()));
            }
        };
        Self::parse(&contents)
            .with_context(|| format!("failed to parse manifest at {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| FetchError::config(e.to_string()).into())
    }

    /// Expands the manifest into jobs: archives first, then binaries.
    ///
    /// `timeout` is the already-resolved download timeout.
    pub fn jobs(&self, project_root: &Path, timeout: Duration) -> Vec<Job> {
        let archives = self.archive.iter().map(|entry| {
            let mut cfg = FetchConfig::new(
                project_root,
                &entry.descriptor,
                entry.asset.clone(),
                &entry.target_dir,
            );
            cfg.strip_prefix = entry.strip_prefix.clone();
            cfg.force_clean = entry.clean;
            if let Some(name) = &entry.version_file {
                cfg.marker_file = name.clone();
            }
            cfg.sha256 = entry.sha256.clone();
            cfg.timeout = timeout;
            Job::Archive(cfg)
        });

        let binaries = self.binary.iter().map(|entry| {
            let mut cfg = BinaryConfig::new(
                project_root,
                &entry.descriptor,
                entry.asset_stem.clone(),
                &entry.target_dir,
            );
            if let Some(name) = &entry.version_file {
                cfg.marker_file = name.clone();
            }
            cfg.timeout = timeout;
            Job::Binary(cfg)
        });

        archives.chain(binaries).collect()
    }
}

/// Joins a relative path onto the project root; absolute paths pass through.
pub fn resolve_in_root(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Parses `<n>s` or `<n>m` into a `Duration`. Zero is rejected.
pub fn parse_timeout(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        bail!("Timeout string is empty");
    }

    let unit_len = s.chars().last().map_or(0, char::len_utf8);
    let (num_str, unit) = s.split_at(s.len() - unit_len);
    let multiplier: u64 = match unit {
        "s" => 1,
        "m" => 60,
        _ => bail!("Invalid timeout unit '{unit}' in '{s}'. Expected 's' (seconds) or 'm' (minutes)"),
    };

    let value: u64 = num_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid numeric value in timeout '{s}': {e}"))?;

    if value == 0 {
        bail!("Timeout must be positive, got '{s}'");
    }

    value
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| anyhow::anyhow!("Timeout overflow: '{s}'"))
}

/// Resolves the download timeout.
///
/// Priority (highest wins): `--timeout` flag, `ARTIFACT_FETCH_TIMEOUT`,
/// manifest `timeout`, then the built-in default. Empty values fall through.
pub fn resolve_timeout(cli: Option<&str>, manifest: Option<&str>) -> Result<Duration> {
    resolve_timeout_with_env(cli, std::env::var(TIMEOUT_ENV_VAR).ok(), manifest)
}

fn resolve_timeout_with_env(
    cli: Option<&str>,
    env_value: Option<String>,
    manifest: Option<&str>,
) -> Result<Duration> {
    let chosen = non_empty_trimmed(cli.map(str::to_string))
        .or_else(|| non_empty_trimmed(env_value))
        .or_else(|| non_empty_trimmed(manifest.map(str::to_string)));

    match chosen {
        Some(s) => parse_timeout(&s).map_err(|e| FetchError::config(e.to_string()).into()),
        None => Ok(DEFAULT_TIMEOUT),
    }
}

fn non_empty_trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::classify;

    // -- FetchConfig -----------------------------------------------------------

    #[test]
    fn fetch_config_resolves_relative_paths() {
        let cfg = FetchConfig::new(
            "/project",
            "modules/pkg.properties",
            "pkg.zip",
            "modules/pkg",
        );
        assert_eq!(
            cfg.descriptor_path,
            PathBuf::from("/project/modules/pkg.properties")
        );
        assert_eq!(cfg.target_dir, PathBuf::from("/project/modules/pkg"));
        assert_eq!(cfg.marker_path(), PathBuf::from("/project/modules/pkg/.version"));
        assert!(!cfg.force_clean);
        assert_eq!(cfg.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn fetch_config_keeps_absolute_paths() {
        let cfg = FetchConfig::new("/project", "/etc/pkg.properties", "pkg.zip", "/opt/pkg");
        assert_eq!(cfg.descriptor_path, PathBuf::from("/etc/pkg.properties"));
        assert_eq!(cfg.target_dir, PathBuf::from("/opt/pkg"));
    }

    // -- Manifest --------------------------------------------------------------

    #[test]
    fn manifest_parses_all_fields() {
        let manifest = Manifest::parse(
            r#"
timeout = "90s"

[[archive]]
descriptor = "modules/sentry-native.properties"
asset = "sentry-native.zip"
target_dir = "modules/sentry-native"
strip_prefix = "sentry-native/"
clean = true
version_file = ".installed"

[[binary]]
descriptor = "modules/wasm-split.properties"
asset_stem = "wasm-split"
target_dir = "modules/wasm-split"
"#,
        )
        .unwrap();

        assert_eq!(manifest.timeout.as_deref(), Some("90s"));
        assert_eq!(manifest.archive.len(), 1);
        assert!(manifest.archive[0].clean);
        assert_eq!(manifest.binary[0].asset_stem, "wasm-split");

        let jobs = manifest.jobs(Path::new("/root"), Duration::from_secs(90));
        assert_eq!(jobs.len(), 2);
        match &jobs[0] {
            Job::Archive(cfg) => {
                assert_eq!(cfg.strip_prefix, "sentry-native/");
                assert_eq!(cfg.marker_file, ".installed");
                assert_eq!(cfg.timeout, Duration::from_secs(90));
                assert_eq!(cfg.target_dir, PathBuf::from("/root/modules/sentry-native"));
            }
            other => panic!("expected archive job, got {other:?}"),
        }
        match &jobs[1] {
            Job::Binary(cfg) => assert_eq!(cfg.marker_file, DEFAULT_MARKER_FILE),
            other => panic!("expected binary job, got {other:?}"),
        }
    }

    #[test]
    fn manifest_empty_is_valid() {
        let manifest = Manifest::parse("").unwrap();
        assert_eq!(manifest, Manifest::default());
        assert!(manifest.jobs(Path::new("/root"), DEFAULT_TIMEOUT).is_empty());
    }

    #[test]
    fn manifest_rejects_unknown_fields() {
        let err = Manifest::parse(
            "[[archive]]\ndescriptor = \"a\"\nasset = \"b\"\ntarget_dir = \"c\"\nforce = true\n",
        )
        .unwrap_err();
        assert!(matches!(classify(&err), Some(FetchError::Config(_))));
    }

    #[test]
    fn manifest_missing_required_field() {
        assert!(Manifest::parse("[[archive]]\ndescriptor = \"a\"\n").is_err());
    }

    #[test]
    fn manifest_load_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Manifest::load_from(&tmp.path().join(MANIFEST_FILE_NAME)).unwrap_err();
        assert!(matches!(classify(&err), Some(FetchError::Config(_))));
        assert!(err.to_string().contains("manifest not found"), "err: {err}");
    }

    // -- parse_timeout ---------------------------------------------------------

    #[test]
    fn parse_timeout_units() {
        assert_eq!(parse_timeout("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_timeout(" 5m ").unwrap(), Duration::from_secs(300));
    }

    #[test]
    fn parse_timeout_rejects_bad_values() {
        assert!(parse_timeout("").is_err());
        assert!(parse_timeout("0s").is_err());
        assert!(parse_timeout("s").is_err());
        assert!(parse_timeout("10h").is_err());
        assert!(parse_timeout("-5s").is_err());
    }

    // -- resolve_timeout -------------------------------------------------------

    #[test]
    fn resolve_timeout_precedence() {
        let cli_wins = resolve_timeout_with_env(Some("1s"), Some("2s".into()), Some("3s"));
        assert_eq!(cli_wins.unwrap(), Duration::from_secs(1));

        let env_wins = resolve_timeout_with_env(None, Some("2s".into()), Some("3s"));
        assert_eq!(env_wins.unwrap(), Duration::from_secs(2));

        let manifest_wins = resolve_timeout_with_env(Some("  "), None, Some("3s"));
        assert_eq!(manifest_wins.unwrap(), Duration::from_secs(3));

        let default = resolve_timeout_with_env(None, Some(String::new()), None);
        assert_eq!(default.unwrap(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn resolve_timeout_invalid_is_config_error() {
        let err = resolve_timeout_with_env(Some("soon"), None, None).unwrap_err();
        assert!(matches!(classify(&err), Some(FetchError::Config(_))));
    }
}
