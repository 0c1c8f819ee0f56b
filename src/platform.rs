//! Platform capability enum and host detection.

use anyhow::{Result, bail};
use std::fmt;
use std::str::FromStr;

/// Returns the compile-time target triple (e.g., "aarch64-apple-darwin").
pub fn build_target() -> &'static str {
    env!("TARGET")
}

/// Platforms an artifact can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Mac,
    Linux,
    Android,
    Web,
}

impl Platform {
    /// The platform this binary was compiled for, if it is one we know.
    pub fn host() -> Option<Self> {
        Self::from_target_triple(build_target())
    }

    /// Maps a target triple onto a platform.
    ///
    /// Android triples also contain `linux`, so they are checked first.
    pub fn from_target_triple(target: &str) -> Option<Self> {
        let segments: Vec<&str> = target.split('-').collect();
        let has = |needle: &str| segments.iter().any(|s| s.starts_with(needle));

        if has("android") {
            Some(Self::Android)
        } else if has("darwin") || has("ios") {
            Some(Self::Mac)
        } else if has("linux") {
            Some(Self::Linux)
        } else if target.starts_with("wasm") || has("emscripten") {
            Some(Self::Web)
        } else {
            None
        }
    }

    /// Suffix of host-specific release binaries, e.g. `wasm-split-Linux-x86_64`.
    pub fn host_binary_suffix(self) -> Result<&'static str> {
        match self {
            Self::Linux => Ok("Linux-x86_64"),
            Self::Mac => Ok("Darwin-universal"),
            other => bail!("no prebuilt host binaries are published for {other}"),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mac => "macos",
            Self::Linux => "linux",
            Self::Android => "android",
            Self::Web => "web",
        };
        f.write_str(name)
    }
}

impl FromStr for Platform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mac" | "macos" | "ios" => Ok(Self::Mac),
            "linux" => Ok(Self::Linux),
            "android" => Ok(Self::Android),
            "web" => Ok(Self::Web),
            other => bail!("unknown platform '{other}' (expected macos, linux, android or web)"),
        }
    }
}
